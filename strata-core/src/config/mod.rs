//! Already-decoded configuration tree.
//!
//! Decoding from a configuration language happens upstream; these types only
//! derive serde so a host can hand over whatever tree it produced.

mod types;

pub use types::{
    Attributes, Lifecycle, Module, ModuleCall, MovedStatement, Output, ProviderConfig,
    ResourceConfig, Variable,
};

use crate::addrs::{InstanceAddr, ModulePath, ResourceAddr};

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Config {
    pub root: Module,
}

impl Config {
    pub fn new(root: Module) -> Self {
        Self { root }
    }

    pub fn module(&self, path: &ModulePath) -> Option<&Module> {
        let mut current = &self.root;
        for seg in path.segments() {
            current = &current.modules.iter().find(|m| &m.name == seg)?.module;
        }
        Some(current)
    }

    pub fn children(&self, path: &ModulePath) -> &[ModuleCall] {
        self.module(path).map(|m| m.modules.as_slice()).unwrap_or(&[])
    }

    pub fn resources(&self, path: &ModulePath) -> &[ResourceConfig] {
        self.module(path).map(|m| m.resources.as_slice()).unwrap_or(&[])
    }

    pub fn providers(&self, path: &ModulePath) -> &[ProviderConfig] {
        self.module(path).map(|m| m.providers.as_slice()).unwrap_or(&[])
    }

    pub fn variables(&self, path: &ModulePath) -> &[Variable] {
        self.module(path).map(|m| m.variables.as_slice()).unwrap_or(&[])
    }

    pub fn outputs(&self, path: &ModulePath) -> &[Output] {
        self.module(path).map(|m| m.outputs.as_slice()).unwrap_or(&[])
    }

    pub fn resource(&self, addr: &ResourceAddr) -> Option<&ResourceConfig> {
        self.resources(&addr.module)
            .iter()
            .find(|r| r.resource_type == addr.resource_type && r.name == addr.name)
    }

    /// Every module path in the tree, parents before children.
    pub fn module_paths(&self) -> Vec<ModulePath> {
        let mut out = Vec::new();
        let mut stack = vec![ModulePath::root()];
        while let Some(path) = stack.pop() {
            for call in self.children(&path).iter().rev() {
                stack.push(path.child(&call.name));
            }
            out.push(path);
        }
        out
    }

    /// Moved statements of the whole tree, resolved to absolute addresses.
    pub fn moves(&self) -> Vec<(ModulePath, &MovedStatement)> {
        self.module_paths()
            .into_iter()
            .flat_map(|path| {
                self.module(&path)
                    .map(|m| m.moved.iter().collect::<Vec<_>>())
                    .unwrap_or_default()
                    .into_iter()
                    .map(move |mv| (path.clone(), mv))
            })
            .collect()
    }

    /// Whether `addr` names an instance the configuration still declares.
    pub fn declares_instance(&self, addr: &InstanceAddr) -> bool {
        self.resource(&addr.resource)
            .map(|r| r.instance_keys().contains(&addr.key))
            .unwrap_or(false)
    }
}
