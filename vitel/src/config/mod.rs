//! Service configuration module.
//!
//! This module provides the registration configuration: serializable
//! options, the extension fragment and the combined [`ServiceConfig`].

pub mod extension;
pub mod options;
pub mod service;

pub use extension::Extension;
pub use options::{RESERVED_KEYS, ServiceOptions};
pub use service::ServiceConfig;
