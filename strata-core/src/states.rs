use std::collections::BTreeMap;

use uuid::Uuid;

use crate::addrs::{InstanceAddr, ResourceAddr};
use crate::config::Attributes;

pub const STATE_VERSION: u32 = 4;

/// Last-known values of one resource instance.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResourceInstanceState {
    pub attributes: Attributes,
    /// Provider configuration that manages the object, e.g. `provider.aws`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl ResourceInstanceState {
    pub fn new(attributes: Attributes) -> Self {
        Self {
            attributes,
            provider: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OutputValue {
    pub value: serde_json::Value,
    #[serde(default)]
    pub sensitive: bool,
}

/// Record of actually-existing objects.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct State {
    pub version: u32,
    /// Incremented each time a changed state is persisted.
    pub serial: u64,
    /// Identifies the history this state belongs to; fixed at creation.
    pub lineage: Uuid,
    #[serde(default)]
    pub resources: BTreeMap<InstanceAddr, ResourceInstanceState>,
    /// Objects superseded during a create-before-destroy replacement whose
    /// destroy has not been confirmed yet.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub deposed: BTreeMap<InstanceAddr, ResourceInstanceState>,
    /// Root module outputs.
    #[serde(default)]
    pub outputs: BTreeMap<String, OutputValue>,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    pub fn new() -> Self {
        Self {
            version: STATE_VERSION,
            serial: 0,
            lineage: Uuid::new_v4(),
            resources: BTreeMap::new(),
            deposed: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.deposed.is_empty() && self.outputs.is_empty()
    }

    pub fn get(&self, addr: &InstanceAddr) -> Option<&ResourceInstanceState> {
        self.resources.get(addr)
    }

    pub fn contains(&self, addr: &InstanceAddr) -> bool {
        self.resources.contains_key(addr)
    }

    pub fn insert(&mut self, addr: InstanceAddr, instance: ResourceInstanceState) {
        self.resources.insert(addr, instance);
    }

    pub fn remove(&mut self, addr: &InstanceAddr) -> Option<ResourceInstanceState> {
        self.resources.remove(addr)
    }

    /// Instances belonging to `resource`, in key order.
    pub fn instances_of<'a>(
        &'a self,
        resource: &'a ResourceAddr,
    ) -> impl Iterator<Item = (&'a InstanceAddr, &'a ResourceInstanceState)> {
        self.resources
            .iter()
            .filter(move |(addr, _)| &addr.resource == resource)
    }

    /// Content equality ignoring `serial`.
    pub fn same_content(&self, other: &State) -> bool {
        self.lineage == other.lineage
            && self.resources == other.resources
            && self.deposed == other.deposed
            && self.outputs == other.outputs
    }

    pub fn bump_serial(&mut self) {
        self.serial += 1;
    }
}
