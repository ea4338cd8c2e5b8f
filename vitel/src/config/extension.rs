//! Extensions merged into a service component before instantiation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::services::ServiceInstance;
use crate::services::spec::{Data, Hook, Method, Mixin};

/// Fragment merged into a component at registration.
///
/// Data and methods override the component's own; mixins are appended;
/// hooks only fill names the component leaves undefined. Props act as
/// defaults beneath the registration props.
#[derive(Clone)]
pub struct Extension {
    pub data: Data,
    pub props: Data,
    pub methods: BTreeMap<String, Method>,
    pub mixins: Vec<Mixin>,
    pub hooks: BTreeMap<String, Hook>,
}

impl Default for Extension {
    /// Carries a no-op `render` hook.
    fn default() -> Self {
        Self::empty().with_hook("render", |_| Value::Null)
    }
}

impl Extension {
    pub fn new() -> Self {
        Self::default()
    }

    /// An extension without the default `render` hook.
    pub fn empty() -> Self {
        Self {
            data: Data::new(),
            props: Data::new(),
            methods: BTreeMap::new(),
            mixins: Vec::new(),
            hooks: BTreeMap::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: Value) -> Self {
        self.props.insert(key.into(), value);
        self
    }

    pub fn with_method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&ServiceInstance, &[Value]) -> Value + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(method));
        self
    }

    pub fn with_mixin(mut self, mixin: Mixin) -> Self {
        self.mixins.push(mixin);
        self
    }

    pub fn with_hook<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&ServiceInstance) -> Value + Send + Sync + 'static,
    {
        self.hooks.insert(name.into(), Arc::new(hook));
        self
    }
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("data", &self.data)
            .field("props", &self.props)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("mixins", &self.mixins.len())
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}
