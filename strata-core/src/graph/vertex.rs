use crate::addrs::{Address, InstanceAddr, ModulePath, ProviderAddr, ResourceAddr};
use crate::config::{Attributes, Output, ResourceConfig, Variable};
use crate::expressions::{references_in_value, TemplateError};
use crate::plans::Change;
use crate::states::ResourceInstanceState;

/// A raw reference string together with the module it is resolved in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScopedRef {
    pub scope: ModulePath,
    pub raw: String,
}

impl ScopedRef {
    pub fn new(scope: ModulePath, raw: impl Into<String>) -> Self {
        Self {
            scope,
            raw: raw.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceVertex {
    pub addr: ResourceAddr,
    pub config: ResourceConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderVertex {
    pub addr: ProviderAddr,
    pub config: Attributes,
    /// Added because resources need it although configuration has no block for it.
    pub synthesized: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModuleCallVertex {
    /// Module containing the call.
    pub module: ModulePath,
    pub name: String,
    pub args: Attributes,
    pub depends_on: Vec<String>,
}

impl ModuleCallVertex {
    pub fn child_path(&self) -> ModulePath {
        self.module.child(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableVertex {
    pub module: ModulePath,
    pub variable: Variable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputVertex {
    pub module: ModulePath,
    pub output: Output,
}

/// One instance with an already-computed pending change.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffResourceVertex {
    pub change: Change,
    /// Configuration of the owning resource; absent for removed resources.
    pub config: Option<ResourceConfig>,
    pub provider: ProviderAddr,
}

/// A state instance whose configuration no longer exists.
#[derive(Debug, Clone, PartialEq)]
pub struct OrphanVertex {
    pub addr: InstanceAddr,
    pub state: ResourceInstanceState,
    pub provider: ProviderAddr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovedVertex {
    pub moves: Vec<(InstanceAddr, InstanceAddr)>,
}

/// Closed set of work items the walker knows how to evaluate.
#[derive(Debug, Clone, PartialEq)]
pub enum Vertex {
    ConfigResource(ResourceVertex),
    ConfigProvider(ProviderVertex),
    ConfigModuleCall(ModuleCallVertex),
    ConfigVariable(VariableVertex),
    ConfigOutput(OutputVertex),
    DiffResource(DiffResourceVertex),
    OrphanResource(OrphanVertex),
    MovedResourceExecutor(MovedVertex),
    RootAggregator,
}

impl Vertex {
    /// Stable name for diagnostics and rendering.
    pub fn name(&self) -> String {
        match self {
            Vertex::ConfigResource(v) => v.addr.to_string(),
            Vertex::ConfigProvider(v) => v.addr.to_string(),
            Vertex::ConfigModuleCall(v) => Address::ModuleCall {
                module: v.module.clone(),
                name: v.name.clone(),
            }
            .to_string(),
            Vertex::ConfigVariable(v) => Address::Variable {
                module: v.module.clone(),
                name: v.variable.name.clone(),
            }
            .to_string(),
            Vertex::ConfigOutput(v) => Address::Output {
                module: v.module.clone(),
                name: v.output.name.clone(),
            }
            .to_string(),
            Vertex::DiffResource(v) => v.change.address.to_string(),
            Vertex::OrphanResource(v) => format!("{} (orphan)", v.addr),
            Vertex::MovedResourceExecutor(_) => "moved".to_string(),
            Vertex::RootAggregator => "root".to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Vertex::ConfigResource(_) => "resource",
            Vertex::ConfigProvider(_) => "provider",
            Vertex::ConfigModuleCall(_) => "module",
            Vertex::ConfigVariable(_) => "variable",
            Vertex::ConfigOutput(_) => "output",
            Vertex::DiffResource(_) => "diff",
            Vertex::OrphanResource(_) => "orphan",
            Vertex::MovedResourceExecutor(_) => "moved",
            Vertex::RootAggregator => "root",
        }
    }

    /// Module the vertex's own references and names live in.
    pub fn module(&self) -> ModulePath {
        match self {
            Vertex::ConfigResource(v) => v.addr.module.clone(),
            Vertex::ConfigProvider(v) => v.addr.module.clone(),
            Vertex::ConfigModuleCall(v) => v.module.clone(),
            Vertex::ConfigVariable(v) => v.module.clone(),
            Vertex::ConfigOutput(v) => v.module.clone(),
            Vertex::DiffResource(v) => v.change.address.module().clone(),
            Vertex::OrphanResource(v) => v.addr.module().clone(),
            Vertex::MovedResourceExecutor(_) | Vertex::RootAggregator => ModulePath::root(),
        }
    }

    /// Names other vertices in the same module may reference this one by.
    pub fn provides(&self) -> Vec<String> {
        match self {
            Vertex::ConfigResource(v) => vec![v.addr.local_name()],
            Vertex::ConfigProvider(v) => vec![v.addr.local_name()],
            Vertex::ConfigModuleCall(v) => vec![format!("module.{}", v.name)],
            Vertex::ConfigVariable(v) => vec![format!("var.{}", v.variable.name)],
            Vertex::ConfigOutput(v) => vec![format!("output.{}", v.output.name)],
            Vertex::DiffResource(v) => {
                let addr = &v.change.address;
                if addr.key.is_some() {
                    vec![addr.resource.local_name(), addr.local_name()]
                } else {
                    vec![addr.local_name()]
                }
            }
            Vertex::OrphanResource(_)
            | Vertex::MovedResourceExecutor(_)
            | Vertex::RootAggregator => Vec::new(),
        }
    }

    /// Raw references this vertex consumes.
    pub fn references(&self) -> Result<Vec<ScopedRef>, TemplateError> {
        let module = self.module();
        let mut raw: Vec<String> = Vec::new();
        match self {
            Vertex::ConfigResource(v) => resource_refs(&v.config, &mut raw)?,
            Vertex::DiffResource(v) => {
                if let Some(config) = &v.config {
                    resource_refs(config, &mut raw)?;
                }
            }
            Vertex::ConfigProvider(v) => {
                for value in v.config.values() {
                    raw.extend(references_in_value(value)?);
                }
            }
            Vertex::ConfigModuleCall(v) => {
                for value in v.args.values() {
                    raw.extend(references_in_value(value)?);
                }
                raw.extend(v.depends_on.iter().cloned());
            }
            Vertex::ConfigOutput(v) => {
                raw.extend(references_in_value(&v.output.value)?);
                raw.extend(v.output.depends_on.iter().cloned());
            }
            Vertex::ConfigVariable(v) => {
                // A child module variable is fed by its call in the parent module.
                if let (Some(parent), Some(call)) = (v.module.parent(), v.module.call_name()) {
                    return Ok(vec![ScopedRef::new(parent, format!("module.{call}"))]);
                }
            }
            Vertex::OrphanResource(_)
            | Vertex::MovedResourceExecutor(_)
            | Vertex::RootAggregator => {}
        }
        raw.sort();
        raw.dedup();
        Ok(raw
            .into_iter()
            .map(|r| ScopedRef::new(module.clone(), r))
            .collect())
    }

    /// Provider configuration this vertex needs, for resource vertices.
    pub fn required_provider(&self) -> Option<ProviderAddr> {
        match self {
            Vertex::ConfigResource(v) => Some(v.config.provider_addr(&v.addr.module)),
            Vertex::DiffResource(v) => Some(v.provider.clone()),
            Vertex::OrphanResource(v) => Some(v.provider.clone()),
            _ => None,
        }
    }

    /// Whether evaluating this vertex may fan out into several instances.
    pub fn expands(&self) -> bool {
        matches!(self, Vertex::ConfigResource(_) | Vertex::ConfigModuleCall(_))
    }

    pub fn is_provider(&self) -> bool {
        matches!(self, Vertex::ConfigProvider(_))
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Vertex::RootAggregator)
    }
}

fn resource_refs(config: &ResourceConfig, out: &mut Vec<String>) -> Result<(), TemplateError> {
    for value in config.config.values() {
        out.extend(references_in_value(value)?);
    }
    out.extend(config.depends_on.iter().cloned());
    Ok(())
}
