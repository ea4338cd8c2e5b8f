//! vitel library crate.
//!
//! Registers plain component specs as singleton services on a host
//! application: validated names, merged extensions, global exposure,
//! a registry entry and a memoized asynchronous init.

pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod mount;
pub mod services;

pub use config::{Extension, ServiceConfig, ServiceOptions};
pub use error::{Error, Result};
pub use host::HostApp;
pub use mount::{HeadlessSurface, MountSurface, MountTarget};
pub use services::{ServiceInstance, ServiceSpec, register_service};
