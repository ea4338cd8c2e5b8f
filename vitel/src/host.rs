//! Host application context.
//!
//! A [`HostApp`] is the explicit context object services are registered
//! against. It owns the global property table (services reachable by name
//! from anywhere in the host), an optional [`ServiceRegistry`], the mount
//! surface and the lifecycle event broadcaster.
//!
//! The host also drives update cycles. Init deferred at registration waits
//! for the next [`HostApp::tick`], so it never runs inside the registering
//! caller's synchronous turn.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::mount::{HeadlessSurface, MountSurface};
use crate::services::{ServiceEvent, ServiceEventBroadcaster, ServiceInstance, ServiceRegistry};

/// The enclosing application services are registered against.
pub struct HostApp {
    surface: Arc<dyn MountSurface>,
    global_properties: RwLock<HashMap<String, ServiceInstance>>,
    registry: Option<ServiceRegistry>,
    events: ServiceEventBroadcaster,
    ticks: watch::Sender<u64>,
}

impl HostApp {
    /// Create a host without a registry.
    pub fn new(surface: Arc<dyn MountSurface>) -> Self {
        Self {
            surface,
            global_properties: RwLock::new(HashMap::new()),
            registry: None,
            events: ServiceEventBroadcaster::new(),
            ticks: watch::channel(0).0,
        }
    }

    /// Create a host backed by a [`HeadlessSurface`].
    pub fn headless() -> Self {
        Self::new(Arc::new(HeadlessSurface::new()))
    }

    /// Attach a service registry.
    pub fn with_registry(mut self) -> Self {
        self.registry = Some(ServiceRegistry::new());
        self
    }

    pub fn with_events(mut self, events: ServiceEventBroadcaster) -> Self {
        self.events = events;
        self
    }

    pub fn surface(&self) -> &Arc<dyn MountSurface> {
        &self.surface
    }

    pub fn registry(&self) -> Option<&ServiceRegistry> {
        self.registry.as_ref()
    }

    pub fn events(&self) -> &ServiceEventBroadcaster {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
        self.events.subscribe()
    }

    /// Run one update cycle.
    ///
    /// Waits for the surface to flush pending work, then releases every
    /// init deferred by a registration made before this call.
    pub async fn tick(&self) {
        self.surface.next_tick().await;
        self.ticks.send_modify(|tick| *tick += 1);
        debug!(tick = *self.ticks.borrow(), "Host update cycle");
    }

    /// Number of completed update cycles.
    pub fn ticks(&self) -> u64 {
        *self.ticks.borrow()
    }

    pub(crate) fn tick_receiver(&self) -> watch::Receiver<u64> {
        self.ticks.subscribe()
    }

    /// Look up a globally exposed service.
    pub fn global(&self, name: &str) -> Option<ServiceInstance> {
        self.global_properties.read().get(name).cloned()
    }

    /// Names of all globally exposed services, sorted.
    pub fn global_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.global_properties.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Bind a service as a global property, returning the previous binding.
    pub fn set_global(
        &self,
        name: impl Into<String>,
        service: ServiceInstance,
    ) -> Option<ServiceInstance> {
        self.global_properties.write().insert(name.into(), service)
    }
}

impl std::fmt::Debug for HostApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostApp")
            .field("global_properties", &self.global_names())
            .field("registry", &self.registry)
            .field("ticks", &self.ticks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mount::MountTarget;
    use crate::services::spec::Data;
    use crate::services::{Component, Props, ServiceSpec};

    #[test]
    fn test_global_binding_overwrites() {
        let host = Arc::new(HostApp::headless());
        let make = || {
            ServiceInstance::new(
                Component::new(ServiceSpec::new("$theme"), "$theme"),
                Props::new(Data::new(), &host),
                MountTarget::new("$theme"),
            )
        };
        let first = make();
        let second = make();

        assert!(host.set_global("$theme", first.clone()).is_none());
        let previous = host.set_global("$theme", second.clone()).unwrap();

        assert!(previous.ptr_eq(&first));
        assert!(host.global("$theme").unwrap().ptr_eq(&second));
        assert_eq!(host.global_names(), vec!["$theme".to_string()]);
    }

    #[tokio::test]
    async fn test_tick_advances_update_cycle() {
        let host = HostApp::headless();
        let mut ticks = host.tick_receiver();
        assert_eq!(host.ticks(), 0);

        host.tick().await;
        host.tick().await;

        assert_eq!(host.ticks(), 2);
        assert!(ticks.has_changed().unwrap());
        assert_eq!(*ticks.borrow_and_update(), 2);
    }

    #[test]
    fn test_registry_is_optional() {
        assert!(HostApp::headless().registry().is_none());
        assert!(HostApp::headless().with_registry().registry().is_some());
    }
}
