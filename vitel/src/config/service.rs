//! Service registration configuration.

use std::sync::Arc;

use serde_json::Value;

use super::extension::Extension;
use super::options::ServiceOptions;
use crate::host::HostApp;
use crate::services::ServiceSpec;
use crate::Result;

/// Everything `register_service` needs besides the spec itself.
#[derive(Clone, Debug, Default)]
pub struct ServiceConfig {
    /// Host application context. Registration fails without one.
    pub host: Option<Arc<HostApp>>,
    pub extend: Extension,
    pub options: ServiceOptions,
}

impl ServiceConfig {
    /// Default configuration bound to `host`.
    pub fn new(host: &Arc<HostApp>) -> Self {
        Self {
            host: Some(host.clone()),
            ..Default::default()
        }
    }

    /// Configuration with options parsed from a JSON object.
    ///
    /// Keys other than the recognised settings are kept as passthrough
    /// values and become props under `autoProps`.
    pub fn from_json(host: &Arc<HostApp>, options: Value) -> Result<Self> {
        let options: ServiceOptions = serde_json::from_value(options)?;
        Ok(Self::new(host).with_options(options))
    }

    pub fn with_options(mut self, options: ServiceOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_extend(mut self, extend: Extension) -> Self {
        self.extend = extend;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.options.name = Some(name.into());
        self
    }

    pub fn global(mut self, global: bool) -> Self {
        self.options.global = global;
        self
    }

    pub fn wrap_init(mut self, wrap_init: bool) -> Self {
        self.options.wrap_init = wrap_init;
        self
    }

    pub fn run_init(mut self, run_init: bool) -> Self {
        self.options.run_init = run_init;
        self
    }

    pub fn auto_props(mut self, auto_props: bool) -> Self {
        self.options.auto_props = auto_props;
        self
    }

    /// Add an explicit prop.
    pub fn with_prop(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.props.insert(key.into(), value);
        self
    }

    /// Add a passthrough setting.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.extra.insert(key.into(), value);
        self
    }

    /// Name the service registers under: the override, else the spec's name.
    pub fn resolved_name<'a>(&'a self, spec: &'a ServiceSpec) -> &'a str {
        self.options.name.as_deref().unwrap_or(&spec.name)
    }
}
