//! Service layer module.
//!
//! This module provides the service factory and the types it works with:
//! specs, live instances, memoized init, the registry and lifecycle events.

pub mod events;
pub mod factory;
pub mod init;
pub mod instance;
pub mod registry;
pub mod spec;

pub use events::{ServiceEvent, ServiceEventBroadcaster};
pub use factory::register_service;
pub use init::{InitFailure, InitOutcome, InitPromise};
pub use instance::{APP_PROP, Component, Props, READY_KEY, ServiceInstance};
pub use registry::ServiceRegistry;
pub use spec::{Data, Mixin, ServiceSpec, is_valid_service_name};
