//! Service factory.
//!
//! [`register_service`] turns a [`ServiceSpec`] into a live, named service:
//! it validates the registration, merges the configured extensions into a
//! copy of the spec, mounts it, exposes it on the host and schedules its
//! init. All failures happen in the precondition checks, before anything
//! is mounted or bound.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::events::ServiceEvent;
use super::instance::{Component, Props, READY_KEY, ServiceInstance};
use super::spec::{Data, Hook, Method, Mixin, ServiceSpec, is_valid_service_name};
use crate::config::{Extension, ServiceConfig, ServiceOptions};
use crate::host::HostApp;
use crate::{Error, Result};

/// Register `spec` as a singleton service on the configured host.
///
/// The caller's spec is left untouched; extensions are applied to a copy.
/// Registering a name twice replaces the earlier global binding and
/// registry entry.
///
/// # Errors
/// Returns [`Error::Configuration`] if the spec name is missing or does not
/// match `^\$[A-Za-z0-9_]+$`, if no host is configured, or if the resolved
/// name is empty.
pub fn register_service(spec: &ServiceSpec, config: ServiceConfig) -> Result<ServiceInstance> {
    if !is_valid_service_name(&spec.name) {
        return Err(Error::config(format!(
            "missing or invalid service name {:?}: names must be `$` followed by letters, digits or `_`",
            spec.name
        )));
    }
    let Some(host) = config.host.clone() else {
        return Err(Error::config(format!(
            "no host application context to register {} against",
            spec.name
        )));
    };
    let name = config.resolved_name(spec).to_string();
    if name.is_empty() {
        return Err(Error::config(format!(
            "cannot determine a usable name for service {}",
            spec.name
        )));
    }

    let ServiceConfig {
        mut extend,
        options,
        ..
    } = config;
    let mut component = Component::new(spec.clone(), name.as_str());

    if options.wrap_init && component.spec.init.is_some() {
        extend.data.insert(READY_KEY.to_string(), Value::Bool(false));
        component.wraps_init = true;
    }

    let target = host.surface().create_mount_target(&name);

    merge_data(&mut component.spec, &extend.data);
    merge_methods(&mut component.spec, &extend.methods);
    merge_mixins(&mut component.spec, &extend.mixins);
    fill_hooks(&mut component.spec, &extend.hooks);

    let props = finalize_props(&options, &extend, &host);
    debug!(
        service = %name,
        target_id = %target.id(),
        props = ?props.values(),
        "Mounting service"
    );

    let service = host.surface().mount(component, props, target);

    let mut replaced = false;
    if options.global {
        replaced |= host.set_global(name.as_str(), service.clone()).is_some();
    }
    if let Some(registry) = host.registry() {
        replaced |= registry.record(&name, service.clone()).is_some();
    }
    if replaced {
        info!(service = %name, "Replaced existing service registration");
    }

    host.events().publish(ServiceEvent::Registered {
        name: name.clone(),
        replaced,
    });
    info!(service = %name, global = options.global, "Registered service");

    if options.run_init && service.has_init() {
        schedule_init(&host, &service);
    }

    Ok(service)
}

/// Wrap the data factory so each computation returns the existing data
/// overlaid with `extension`.
fn merge_data(spec: &mut ServiceSpec, extension: &Data) {
    if extension.is_empty() {
        return;
    }

    let existing = spec.data.take();
    let extension = extension.clone();
    spec.data = Some(Arc::new(move || {
        let mut data = existing.as_ref().map(|factory| factory()).unwrap_or_default();
        data.extend(extension.clone());
        data
    }));
}

fn merge_methods(spec: &mut ServiceSpec, extension: &BTreeMap<String, Method>) {
    spec.methods
        .extend(extension.iter().map(|(name, method)| (name.clone(), method.clone())));
}

fn merge_mixins(spec: &mut ServiceSpec, extension: &[Mixin]) {
    spec.mixins.extend(extension.iter().cloned());
}

/// Hooks only fill gaps; the spec's own hooks are kept.
fn fill_hooks(spec: &mut ServiceSpec, extension: &BTreeMap<String, Hook>) {
    for (name, hook) in extension {
        spec.hooks
            .entry(name.clone())
            .or_insert_with(|| hook.clone());
    }
}

/// Extension props, then derived props, then explicit props; `app` is
/// always the host.
fn finalize_props(options: &ServiceOptions, extend: &Extension, host: &Arc<HostApp>) -> Props {
    let mut values = extend.props.clone();
    values.extend(options.derive_props());
    values.extend(options.props.clone());
    Props::new(values, host)
}

/// Spawn the service's init, gated on the host's next update cycle.
///
/// The task does nothing until [`HostApp::tick`] completes a cycle that
/// started after this registration, so init never observes the instance
/// before the registering caller has yielded to the host.
fn schedule_init(host: &HostApp, service: &ServiceInstance) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        warn!(
            service = %service.name(),
            "No async runtime available, deferred init not scheduled"
        );
        return;
    };

    let mut ticks = host.tick_receiver();
    let registered_at = *ticks.borrow_and_update();
    let task_service = service.clone();
    let handle = runtime.spawn(async move {
        let released = ticks.wait_for(|tick| *tick > registered_at).await.is_ok();
        if !released {
            debug!(service = %task_service.name(), "Host dropped before init was released");
            return;
        }
        match task_service.run_init().await {
            Some(Ok(_)) => debug!(service = %task_service.name(), "Service initialized"),
            Some(Err(e)) => warn!(service = %task_service.name(), error = %e, "Service init failed"),
            None => {}
        }
    });
    service.set_scheduled_init(handle);
}
