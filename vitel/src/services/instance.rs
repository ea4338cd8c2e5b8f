//! Live service instances.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::events::ServiceEvent;
use super::init::{InitFailure, InitOutcome, InitPromise};
use super::spec::{Data, Hook, Method, ServiceSpec};
use crate::host::HostApp;
use crate::mount::MountTarget;

/// Data key of the readiness flag installed by init wrapping.
pub const READY_KEY: &str = "ready";

/// Prop key always bound to the host application.
pub const APP_PROP: &str = "app";

/// Build copy of a [`ServiceSpec`] after all extensions were merged.
#[derive(Clone, Debug)]
pub struct Component {
    pub spec: ServiceSpec,
    /// Name the service is registered under.
    pub service_name: String,
    /// Whether `ready` and the memoized `promise()` were installed.
    pub wraps_init: bool,
}

impl Component {
    pub fn new(spec: ServiceSpec, service_name: impl Into<String>) -> Self {
        Self {
            spec,
            service_name: service_name.into(),
            wraps_init: false,
        }
    }
}

/// Finalized instantiation props.
///
/// The host application is held separately from the plain values and is
/// always present as the `app` prop.
#[derive(Clone, Debug)]
pub struct Props {
    values: Data,
    app: Weak<HostApp>,
}

impl Props {
    pub fn new(mut values: Data, app: &Arc<HostApp>) -> Self {
        if values.remove(APP_PROP).is_some() {
            debug!("Caller supplied an `app` prop, replaced by the host application");
        }
        Self {
            values,
            app: Arc::downgrade(app),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Plain prop values, without `app`.
    pub fn values(&self) -> &Data {
        &self.values
    }

    /// The `app` prop.
    pub fn app(&self) -> Option<Arc<HostApp>> {
        self.app.upgrade()
    }
}

/// Handle to a mounted service. Clones share the same instance.
#[derive(Clone)]
pub struct ServiceInstance {
    inner: Arc<InstanceInner>,
}

struct InstanceInner {
    component: Component,
    props: Props,
    target: MountTarget,
    data: RwLock<Data>,
    methods: BTreeMap<String, Method>,
    hooks: BTreeMap<String, Hook>,
    init_promise: OnceLock<InitPromise>,
    scheduled_init: Mutex<Option<JoinHandle<()>>>,
}

impl ServiceInstance {
    /// Instantiate a component.
    ///
    /// Mixins are applied in order, then the component's own data, methods
    /// and hooks override them.
    pub fn new(component: Component, props: Props, target: MountTarget) -> Self {
        let spec = &component.spec;
        let mut data = Data::new();
        let mut methods = BTreeMap::new();
        let mut hooks = BTreeMap::new();

        for mixin in &spec.mixins {
            data.extend(mixin.data.clone());
            methods.extend(mixin.methods.clone());
            hooks.extend(mixin.hooks.clone());
        }
        data.extend(spec.compute_data());
        methods.extend(spec.methods.clone());
        hooks.extend(spec.hooks.clone());

        Self {
            inner: Arc::new(InstanceInner {
                component,
                props,
                target,
                data: RwLock::new(data),
                methods,
                hooks,
                init_promise: OnceLock::new(),
                scheduled_init: Mutex::new(None),
            }),
        }
    }

    /// Registered name of the service.
    pub fn name(&self) -> &str {
        &self.inner.component.service_name
    }

    pub fn component(&self) -> &Component {
        &self.inner.component
    }

    pub fn props(&self) -> &Props {
        &self.inner.props
    }

    /// The host application the service was registered against.
    pub fn app(&self) -> Option<Arc<HostApp>> {
        self.inner.props.app()
    }

    pub fn target(&self) -> &MountTarget {
        &self.inner.target
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.data.read().get(key).cloned()
    }

    /// Set a data value, returning the previous one.
    pub fn set(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.inner.data.write().insert(key.into(), value)
    }

    /// Snapshot of the data table.
    pub fn data(&self) -> Data {
        self.inner.data.read().clone()
    }

    /// Readiness flag; `None` unless init wrapping applied.
    pub fn ready(&self) -> Option<bool> {
        if !self.inner.component.wraps_init {
            return None;
        }
        self.get(READY_KEY).and_then(|ready| ready.as_bool())
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.inner.methods.contains_key(name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.inner.methods.keys().map(String::as_str)
    }

    /// Call a method; `None` if the service has no such method.
    pub fn call(&self, name: &str, args: &[Value]) -> Option<Value> {
        let method = self.inner.methods.get(name)?;
        Some(method(self, args))
    }

    pub fn has_hook(&self, name: &str) -> bool {
        self.inner.hooks.contains_key(name)
    }

    pub fn call_hook(&self, name: &str) -> Option<Value> {
        let hook = self.inner.hooks.get(name)?;
        Some(hook(self))
    }

    /// Run the `render` hook. Services without one render nothing.
    pub fn render(&self) -> Value {
        self.call_hook("render").unwrap_or(Value::Null)
    }

    pub fn has_init(&self) -> bool {
        self.inner.component.spec.init.is_some()
    }

    /// Invoke `init` directly, bypassing memoization.
    ///
    /// Every call runs the initializer again; use [`ServiceInstance::promise`]
    /// for the at-most-once variant.
    pub async fn init(&self) -> Option<InitOutcome> {
        let init = self.inner.component.spec.init.clone()?;
        let outcome = init(self.clone())
            .await
            .map_err(|e| InitFailure::new(self.name(), &e));
        Some(outcome)
    }

    /// Memoized init accessor.
    ///
    /// The first call starts `init`; every later call returns the same
    /// promise. `ready` flips to `true` once it settles, on success or
    /// failure. `None` unless init wrapping applied.
    pub fn promise(&self) -> Option<InitPromise> {
        if !self.inner.component.wraps_init {
            return None;
        }
        let init = self.inner.component.spec.init.clone()?;

        let promise = self.inner.init_promise.get_or_init(|| {
            debug!(service = %self.name(), "Starting service init");
            let name = self.name().to_string();
            let weak = Arc::downgrade(&self.inner);
            InitPromise::start(
                async move {
                    let Some(inner) = weak.upgrade() else {
                        return Err(InitFailure::new(
                            name,
                            &anyhow::anyhow!("service dropped before init ran"),
                        ));
                    };
                    let service = ServiceInstance { inner };
                    let outcome = init(service.clone())
                        .await
                        .map_err(|e| InitFailure::new(service.name(), &e));
                    service.set(READY_KEY, Value::Bool(true));
                    service.publish(ServiceEvent::InitSettled {
                        name: service.name().to_string(),
                        ok: outcome.is_ok(),
                    });
                    outcome
                }
                .boxed(),
            )
        });

        Some(promise.clone())
    }

    /// The cached promise, if init was started through [`ServiceInstance::promise`].
    pub fn init_promise(&self) -> Option<InitPromise> {
        self.inner.init_promise.get().cloned()
    }

    /// Run init the way the deferred registration step does: through the
    /// memoized promise when wrapped, directly otherwise.
    pub(crate) async fn run_init(&self) -> Option<InitOutcome> {
        if let Some(promise) = self.promise() {
            return Some(promise.wait().await);
        }

        let outcome = self.init().await?;
        self.publish(ServiceEvent::InitSettled {
            name: self.name().to_string(),
            ok: outcome.is_ok(),
        });
        Some(outcome)
    }

    pub(crate) fn set_scheduled_init(&self, handle: JoinHandle<()>) {
        *self.inner.scheduled_init.lock() = Some(handle);
    }

    /// Wait for the init scheduled at registration to finish.
    ///
    /// Runs a host update cycle first so the deferred init is released.
    /// Returns `false` when no init was scheduled or it was already awaited.
    pub async fn wait_scheduled_init(&self) -> bool {
        let handle = self.inner.scheduled_init.lock().take();
        match handle {
            Some(handle) => {
                if let Some(app) = self.app() {
                    app.tick().await;
                }
                if let Err(e) = handle.await {
                    warn!(service = %self.name(), error = %e, "Scheduled init task failed");
                }
                true
            }
            None => false,
        }
    }

    /// Whether both handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn publish(&self, event: ServiceEvent) {
        if let Some(app) = self.app() {
            app.events().publish(event);
        }
    }
}

impl fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("name", &self.name())
            .field("target", &self.inner.target)
            .field("data", &*self.inner.data.read())
            .field("props", self.inner.props.values())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::spec::Mixin;
    use serde_json::json;

    fn instantiate(spec: ServiceSpec, host: &Arc<HostApp>) -> ServiceInstance {
        let name = spec.name.clone();
        ServiceInstance::new(
            Component::new(spec, name.clone()),
            Props::new(Data::new(), host),
            MountTarget::new(name),
        )
    }

    #[test]
    fn test_component_overrides_mixins() {
        let host = Arc::new(HostApp::headless());
        let spec = ServiceSpec::new("$mixed")
            .with_mixin(
                Mixin::new()
                    .with_data("theme", json!("dark"))
                    .with_data("locale", json!("en"))
                    .with_method("who", |_, _| json!("mixin"))
                    .with_method("shared", |_, _| json!("mixin")),
            )
            .with_data(|| {
                let mut data = Data::new();
                data.insert("theme".to_string(), json!("light"));
                data
            })
            .with_method("who", |_, _| json!("component"));

        let service = instantiate(spec, &host);

        assert_eq!(service.get("theme"), Some(json!("light")));
        assert_eq!(service.get("locale"), Some(json!("en")));
        assert_eq!(service.call("who", &[]), Some(json!("component")));
        assert_eq!(service.call("shared", &[]), Some(json!("mixin")));
        assert_eq!(service.call("missing", &[]), None);
    }

    #[test]
    fn test_later_mixins_win() {
        let host = Arc::new(HostApp::headless());
        let spec = ServiceSpec::new("$layers")
            .with_mixin(Mixin::new().with_data("layer", json!(1)))
            .with_mixin(Mixin::new().with_data("layer", json!(2)));

        assert_eq!(instantiate(spec, &host).get("layer"), Some(json!(2)));
    }

    #[test]
    fn test_methods_receive_instance() {
        let host = Arc::new(HostApp::headless());
        let spec = ServiceSpec::new("$counter")
            .with_data(|| {
                let mut data = Data::new();
                data.insert("count".to_string(), json!(0));
                data
            })
            .with_method("increment", |service, args| {
                let step = args.first().and_then(Value::as_i64).unwrap_or(1);
                let count = service.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
                service.set("count", json!(count + step));
                json!(count + step)
            });

        let service = instantiate(spec, &host);
        service.call("increment", &[]);
        assert_eq!(service.call("increment", &[json!(5)]), Some(json!(6)));
        assert_eq!(service.get("count"), Some(json!(6)));
    }

    #[test]
    fn test_props_replace_app_value() {
        let host = Arc::new(HostApp::headless());
        let mut values = Data::new();
        values.insert("app".to_string(), json!("not-the-host"));
        values.insert("foo".to_string(), json!("x"));

        let props = Props::new(values, &host);

        assert!(props.get("app").is_none());
        assert_eq!(props.get("foo"), Some(&json!("x")));
        assert!(Arc::ptr_eq(&props.app().unwrap(), &host));
    }

    #[test]
    fn test_unwrapped_instance_has_no_ready_or_promise() {
        let host = Arc::new(HostApp::headless());
        let spec = ServiceSpec::new("$plain").with_init(|_| async { Ok(json!(null)) });

        let service = instantiate(spec, &host);

        assert!(service.has_init());
        assert_eq!(service.ready(), None);
        assert!(service.promise().is_none());
        assert!(service.init_promise().is_none());
    }

    #[tokio::test]
    async fn test_raw_init_runs_every_time() {
        let host = Arc::new(HostApp::headless());
        let spec = ServiceSpec::new("$raw").with_init(|service| async move {
            let runs = service.get("runs").and_then(|v| v.as_i64()).unwrap_or(0) + 1;
            service.set("runs", json!(runs));
            Ok(json!(runs))
        });

        let service = instantiate(spec, &host);

        assert_eq!(service.init().await, Some(Ok(json!(1))));
        assert_eq!(service.init().await, Some(Ok(json!(2))));
    }

    #[test]
    fn test_pending_promise_does_not_keep_instance_alive() {
        let host = Arc::new(HostApp::headless());
        let mut component = Component::new(
            ServiceSpec::new("$leaky").with_init(|_| async { Ok(json!("done")) }),
            "$leaky",
        );
        component.wraps_init = true;
        let service = ServiceInstance::new(
            component,
            Props::new(Data::new(), &host),
            MountTarget::new("$leaky"),
        );

        let promise = service.promise().unwrap();
        let weak = Arc::downgrade(&service.inner);
        drop(service);

        assert!(weak.upgrade().is_none());
        let outcome = futures::executor::block_on(promise.wait());
        assert_eq!(
            outcome.unwrap_err().message,
            "service dropped before init ran".to_string()
        );
    }

    #[test]
    fn test_render_defaults_to_null() {
        let host = Arc::new(HostApp::headless());
        let service = instantiate(ServiceSpec::new("$quiet"), &host);
        assert_eq!(service.render(), Value::Null);

        let spec = ServiceSpec::new("$loud").with_hook("render", |s| json!(s.name()));
        assert_eq!(instantiate(spec, &host).render(), json!("$loud"));
    }
}
