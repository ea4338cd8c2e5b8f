//! Registry of live services owned by a host application.

use std::collections::HashMap;

use dashmap::DashMap;

use super::instance::ServiceInstance;

/// Name-keyed table of registered services.
///
/// Entries are reachable both through the `services` map and through
/// direct accessors; both hold the same instance. Entries are never
/// removed, only overwritten by a later registration.
#[derive(Default)]
pub struct ServiceRegistry {
    services: DashMap<String, ServiceInstance>,
    accessors: DashMap<String, ServiceInstance>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a service, returning the instance it replaced.
    pub fn record(&self, name: &str, service: ServiceInstance) -> Option<ServiceInstance> {
        self.accessors.insert(name.to_string(), service.clone());
        self.services.insert(name.to_string(), service)
    }

    /// Direct accessor lookup.
    pub fn get(&self, name: &str) -> Option<ServiceInstance> {
        self.accessors.get(name).map(|entry| entry.value().clone())
    }

    /// Snapshot of the `services` map.
    pub fn services(&self) -> HashMap<String, ServiceInstance> {
        self.services
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.names())
            .finish()
    }
}
