//! Component mounting surface.
//!
//! The registry never renders anything itself. It asks a [`MountSurface`]
//! for an addressable mount point, hands it the merged component and the
//! finalized props. Each host update cycle waits on
//! [`MountSurface::next_tick`] before releasing deferred service init.

use std::fmt;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::trace;

use crate::services::{Component, Props, ServiceInstance};

/// Isolated mount point addressed by a service name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MountTarget {
    id: String,
}

impl MountTarget {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for MountTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.id)
    }
}

/// Presentation layer that services are mounted into.
#[async_trait]
pub trait MountSurface: Send + Sync {
    /// Obtain or create the mount point identified by `id`.
    fn create_mount_target(&self, id: &str) -> MountTarget;

    /// Create a live instance of `component` attached to `target`.
    fn mount(&self, component: Component, props: Props, target: MountTarget) -> ServiceInstance {
        ServiceInstance::new(component, props, target)
    }

    /// Resolves once pending update work has been flushed and freshly
    /// mounted instances are safe to initialize.
    async fn next_tick(&self) {
        tokio::task::yield_now().await;
    }
}

/// A mounted service as seen by [`HeadlessSurface`].
#[derive(Debug, Clone, PartialEq)]
pub struct MountRecord {
    pub target: MountTarget,
    pub service: String,
    /// Output of the service's `render` hook at mount time.
    pub rendered: Value,
}

/// In-memory surface for hosts without a rendering backend.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    targets: Mutex<Vec<MountTarget>>,
    mounts: Mutex<Vec<MountRecord>>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount points created so far, in creation order.
    pub fn targets(&self) -> Vec<MountTarget> {
        self.targets.lock().clone()
    }

    /// Every mount performed so far, in order.
    pub fn mounts(&self) -> Vec<MountRecord> {
        self.mounts.lock().clone()
    }
}

#[async_trait]
impl MountSurface for HeadlessSurface {
    fn create_mount_target(&self, id: &str) -> MountTarget {
        let mut targets = self.targets.lock();
        if let Some(existing) = targets.iter().find(|t| t.id() == id) {
            return existing.clone();
        }

        let target = MountTarget::new(id);
        trace!(target_id = %id, "Created mount target");
        targets.push(target.clone());
        target
    }

    fn mount(&self, component: Component, props: Props, target: MountTarget) -> ServiceInstance {
        let service = ServiceInstance::new(component, props, target.clone());
        self.mounts.lock().push(MountRecord {
            target,
            service: service.name().to_string(),
            rendered: service.render(),
        });
        service
    }
}
