//! Caller-supplied service descriptions.
//!
//! A [`ServiceSpec`] is the plain description of a service: a name, an
//! optional data factory, methods, hooks, mixins and an optional async
//! `init`. The factory never mutates a spec; it works on a clone.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, LazyLock};

use futures::FutureExt;
use futures::future::BoxFuture;
use regex::Regex;
use serde_json::{Map, Value};

use super::instance::ServiceInstance;

/// Reactive data table of a service.
pub type Data = Map<String, Value>;

/// A method callable on a live service.
pub type Method = Arc<dyn Fn(&ServiceInstance, &[Value]) -> Value + Send + Sync>;

/// A host-system hook such as `render`.
pub type Hook = Arc<dyn Fn(&ServiceInstance) -> Value + Send + Sync>;

/// Produces the initial data of a service, once per instantiation.
pub type DataFactory = Arc<dyn Fn() -> Data + Send + Sync>;

/// Asynchronous initializer of a service.
pub type InitFn =
    Arc<dyn Fn(ServiceInstance) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

static SERVICE_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$[A-Za-z0-9_]+$").unwrap());

/// Check a service name: a `$` followed by one or more word characters.
pub fn is_valid_service_name(name: &str) -> bool {
    SERVICE_NAME_REGEX.is_match(name)
}

/// Component description of a service.
#[derive(Clone, Default)]
pub struct ServiceSpec {
    /// Service name, e.g. `$session`.
    pub name: String,
    pub data: Option<DataFactory>,
    pub methods: BTreeMap<String, Method>,
    /// Applied in order before the spec's own definitions.
    pub mixins: Vec<Mixin>,
    pub init: Option<InitFn>,
    pub hooks: BTreeMap<String, Hook>,
}

impl ServiceSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_data<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Data + Send + Sync + 'static,
    {
        self.data = Some(Arc::new(factory));
        self
    }

    pub fn with_method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&ServiceInstance, &[Value]) -> Value + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(method));
        self
    }

    pub fn with_hook<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&ServiceInstance) -> Value + Send + Sync + 'static,
    {
        self.hooks.insert(name.into(), Arc::new(hook));
        self
    }

    pub fn with_mixin(mut self, mixin: Mixin) -> Self {
        self.mixins.push(mixin);
        self
    }

    /// Set the asynchronous initializer.
    pub fn with_init<F, Fut>(mut self, init: F) -> Self
    where
        F: Fn(ServiceInstance) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.init = Some(Arc::new(move |service| init(service).boxed()));
        self
    }

    /// Run the data factory, if any.
    pub fn compute_data(&self) -> Data {
        self.data.as_ref().map(|factory| factory()).unwrap_or_default()
    }
}

impl fmt::Debug for ServiceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceSpec")
            .field("name", &self.name)
            .field("data", &self.data.is_some())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("mixins", &self.mixins.len())
            .field("init", &self.init.is_some())
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Reusable fragment merged into a service at instantiation.
#[derive(Clone, Default)]
pub struct Mixin {
    pub data: Data,
    pub methods: BTreeMap<String, Method>,
    pub hooks: BTreeMap<String, Hook>,
}

impl Mixin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn with_method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&ServiceInstance, &[Value]) -> Value + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(method));
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

impl fmt::Debug for Mixin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mixin")
            .field("data", &self.data)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("$greeter")]
    #[case("$a")]
    #[case("$_private")]
    #[case("$Session2")]
    #[case("$snake_case_name")]
    fn test_valid_service_names(#[case] name: &str) {
        assert!(is_valid_service_name(name), "{name} should be valid");
    }

    #[rstest]
    #[case("")]
    #[case("$")]
    #[case("greeter")]
    #[case("$greet-er")]
    #[case("$greet er")]
    #[case("$$greeter")]
    #[case("$greeter!")]
    #[case("$grüße")]
    #[case("$greeter\n")]
    fn test_invalid_service_names(#[case] name: &str) {
        assert!(!is_valid_service_name(name), "{name:?} should be invalid");
    }

    #[test]
    fn test_compute_data_without_factory() {
        let spec = ServiceSpec::new("$empty");
        assert!(spec.compute_data().is_empty());
    }

    #[test]
    fn test_compute_data_with_factory() {
        let spec = ServiceSpec::new("$counter").with_data(|| {
            let mut data = Data::new();
            data.insert("count".to_string(), json!(0));
            data
        });

        assert_eq!(spec.compute_data().get("count"), Some(&json!(0)));
    }
}
