//! Logging setup with a reloadable filter.
//!
//! Hosts that do not install their own subscriber can call
//! [`init_logging`] once at startup and adjust verbosity later through
//! [`LoggingConfig::set_filter`].

use std::sync::Arc;

use chrono::Local;
use tracing::info;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    reload::{self, Handle},
    util::SubscriberInitExt,
};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "vitel=info";

/// Environment variable consulted for the initial filter.
pub const LOG_FILTER_ENV: &str = "VITEL_LOG";

/// Timer that formats timestamps in the local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Type alias for the reload handle.
pub type FilterHandle = Handle<EnvFilter, tracing_subscriber::Registry>;

/// Handle on the installed subscriber's filter.
pub struct LoggingConfig {
    handle: FilterHandle,
}

impl LoggingConfig {
    /// Set a new filter directive, e.g. `vitel=debug`.
    pub fn set_filter(&self, directive: &str) -> crate::Result<()> {
        let new_filter = parse_filter(directive)?;

        self.handle
            .reload(new_filter)
            .map_err(|e| crate::Error::Other(format!("Failed to reload filter: {}", e)))?;

        info!(directive = %directive, "Log filter updated");
        Ok(())
    }
}

fn parse_filter(directive: &str) -> crate::Result<EnvFilter> {
    EnvFilter::try_new(directive)
        .map_err(|e| crate::Error::Other(format!("Invalid filter directive: {}", e)))
}

/// Install a console subscriber with a reloadable filter.
///
/// The initial filter is `directive` when given, else `VITEL_LOG`, else
/// [`DEFAULT_LOG_FILTER`]. Fails if a global subscriber is already set.
pub fn init_logging(directive: Option<&str>) -> crate::Result<Arc<LoggingConfig>> {
    let initial_filter = match directive {
        Some(directive) => parse_filter(directive)?,
        None => EnvFilter::try_from_env(LOG_FILTER_ENV)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };
    let (filter_layer, handle) = reload::Layer::new(initial_filter);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .try_init()
        .map_err(|e| {
            crate::Error::Other(format!("Failed to set global default subscriber: {}", e))
        })?;

    Ok(Arc::new(LoggingConfig { handle }))
}
