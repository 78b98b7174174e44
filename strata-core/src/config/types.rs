use std::collections::BTreeMap;

use crate::addrs::{
    AddrParseError, InstanceAddr, InstanceKey, ModulePath, ProviderAddr, ResourceAddr,
};

pub type Attributes = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Module {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<Variable>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<ProviderConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ResourceConfig>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<ModuleCall>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<Output>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub moved: Vec<MovedStatement>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Variable {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ProviderConfig {
    /// Provider type, e.g. `aws`.
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    #[serde(default)]
    pub config: Attributes,
}

impl ProviderConfig {
    pub fn addr(&self, module: &ModulePath) -> ProviderAddr {
        ProviderAddr::new(module.clone(), &self.name, self.alias.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Lifecycle {
    /// Unset defers to provider metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_before_destroy: Option<bool>,

    #[serde(default)]
    pub prevent_destroy: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResourceConfig {
    #[serde(rename = "type")]
    pub resource_type: String,

    pub name: String,

    /// Explicit provider reference, `type` or `type.alias`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub for_each: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub lifecycle: Lifecycle,

    #[serde(default)]
    pub config: Attributes,
}

impl ResourceConfig {
    pub fn addr(&self, module: &ModulePath) -> ResourceAddr {
        ResourceAddr::new(module.clone(), &self.resource_type, &self.name)
    }

    pub fn provider_addr(&self, module: &ModulePath) -> ProviderAddr {
        match &self.provider {
            Some(p) => ProviderAddr::from_local(module.clone(), p),
            None => ProviderAddr::new(
                module.clone(),
                ProviderAddr::implied_type(&self.resource_type),
                None,
            ),
        }
    }

    /// Keys this resource expands to. `for_each` wins over `count`.
    pub fn instance_keys(&self) -> Vec<Option<InstanceKey>> {
        if let Some(keys) = &self.for_each {
            return keys.iter().map(|k| Some(InstanceKey::Str(k.clone()))).collect();
        }
        if let Some(n) = self.count {
            return (0..n).map(|i| Some(InstanceKey::Int(i))).collect();
        }
        vec![None]
    }

    pub fn expands(&self) -> bool {
        self.count.is_some() || self.for_each.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModuleCall {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Values for the child module's variables, evaluated in the calling module.
    #[serde(default)]
    pub args: Attributes,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub module: Module,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Output {
    pub name: String,

    pub value: serde_json::Value,

    #[serde(default)]
    pub sensitive: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

/// Records that a resource instance changed address without its remote
/// object changing. Both sides are relative to the declaring module.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MovedStatement {
    pub from: String,
    pub to: String,
}

impl MovedStatement {
    pub fn resolve(&self, module: &ModulePath) -> Result<(InstanceAddr, InstanceAddr), AddrParseError> {
        Ok((relocate(self.from.parse()?, module), relocate(self.to.parse()?, module)))
    }
}

fn relocate(addr: InstanceAddr, module: &ModulePath) -> InstanceAddr {
    if module.is_root() {
        return addr;
    }
    let mut segments = module.segments().to_vec();
    segments.extend(addr.resource.module.segments().iter().cloned());
    InstanceAddr {
        resource: ResourceAddr {
            module: ModulePath::new(segments),
            ..addr.resource
        },
        key: addr.key,
    }
}
