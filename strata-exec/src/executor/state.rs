use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use strata_core::{InstanceAddr, OutputValue, ResourceAddr, ResourceInstanceState, State};

/// State shared by every task of one walk.
///
/// Reads and writes of different addresses proceed in parallel. Anything
/// that reads then writes one address must hold that address's lock.
#[derive(Debug)]
pub struct SharedState {
    version: u32,
    serial: u64,
    lineage: Uuid,
    resources: DashMap<InstanceAddr, ResourceInstanceState>,
    deposed: DashMap<InstanceAddr, ResourceInstanceState>,
    outputs: DashMap<String, OutputValue>,
    locks: DashMap<InstanceAddr, Arc<Mutex<()>>>,
}

impl SharedState {
    pub fn new(state: State) -> Self {
        Self {
            version: state.version,
            serial: state.serial,
            lineage: state.lineage,
            resources: state.resources.into_iter().collect(),
            deposed: state.deposed.into_iter().collect(),
            outputs: state.outputs.into_iter().collect(),
            locks: DashMap::new(),
        }
    }

    /// Serializes access to one address for as long as the guard lives.
    pub async fn lock(&self, addr: &InstanceAddr) -> OwnedMutexGuard<()> {
        let mutex = self.locks.entry(addr.clone()).or_default().clone();
        mutex.lock_owned().await
    }

    /// Locks several addresses in a fixed order.
    pub async fn lock_all(&self, addrs: &[&InstanceAddr]) -> Vec<OwnedMutexGuard<()>> {
        let mut sorted: Vec<&InstanceAddr> = addrs.to_vec();
        sorted.sort();
        sorted.dedup();
        let mut guards = Vec::with_capacity(sorted.len());
        for addr in sorted {
            guards.push(self.lock(addr).await);
        }
        guards
    }

    pub fn get(&self, addr: &InstanceAddr) -> Option<ResourceInstanceState> {
        self.resources.get(addr).map(|r| r.value().clone())
    }

    pub fn contains(&self, addr: &InstanceAddr) -> bool {
        self.resources.contains_key(addr)
    }

    pub fn put(&self, addr: InstanceAddr, instance: ResourceInstanceState) {
        self.resources.insert(addr, instance);
    }

    pub fn remove(&self, addr: &InstanceAddr) -> Option<ResourceInstanceState> {
        self.resources.remove(addr).map(|(_, v)| v)
    }

    /// Instances of `resource`, sorted by address.
    pub fn instances_of(&self, resource: &ResourceAddr) -> Vec<(InstanceAddr, ResourceInstanceState)> {
        let mut out: Vec<_> = self
            .resources
            .iter()
            .filter(|e| &e.key().resource == resource)
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub fn get_deposed(&self, addr: &InstanceAddr) -> Option<ResourceInstanceState> {
        self.deposed.get(addr).map(|r| r.value().clone())
    }

    pub fn put_deposed(&self, addr: InstanceAddr, instance: ResourceInstanceState) {
        self.deposed.insert(addr, instance);
    }

    pub fn remove_deposed(&self, addr: &InstanceAddr) -> Option<ResourceInstanceState> {
        self.deposed.remove(addr).map(|(_, v)| v)
    }

    pub fn set_output(&self, name: impl Into<String>, value: OutputValue) {
        self.outputs.insert(name.into(), value);
    }

    pub fn remove_output(&self, name: &str) {
        self.outputs.remove(name);
    }

    pub fn output_names(&self) -> Vec<String> {
        self.outputs.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Point-in-time copy; call once the walk has finished.
    pub fn snapshot(&self) -> State {
        State {
            version: self.version,
            serial: self.serial,
            lineage: self.lineage,
            resources: self
                .resources
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
            deposed: self
                .deposed
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
            outputs: self
                .outputs
                .iter()
                .map(|e| (e.key().clone(), e.value().clone()))
                .collect(),
        }
    }
}
