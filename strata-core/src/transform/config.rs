use std::collections::BTreeMap;

use super::reference::connect_references;
use super::GraphTransformer;
use crate::addrs::ModulePath;
use crate::config::Config;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::TransformError;
use crate::graph::{
    Graph, ModuleCallVertex, OutputVertex, ProviderVertex, ResourceVertex, VariableVertex, Vertex,
};

/// Emits one vertex per configuration object in every module, then wires the
/// references that already resolve.
///
/// Unresolved references are left on the graph rather than failing the pass.
pub struct ConfigTransformer<'a> {
    config: &'a Config,
}

impl<'a> ConfigTransformer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    fn add_module(&self, graph: &mut Graph, path: &ModulePath) -> Diagnostics {
        let mut diags = Diagnostics::new();
        let Some(module) = self.config.module(path) else {
            return diags;
        };
        let mut seen: BTreeMap<String, usize> = BTreeMap::new();
        let mut add = |graph: &mut Graph, vertex: Vertex, diags: &mut Diagnostics| {
            let name = vertex.name();
            let n = seen.entry(name.clone()).or_insert(0);
            *n += 1;
            if *n == 2 {
                diags.push(
                    Diagnostic::error("Duplicate declaration")
                        .with_detail(format!("{name} is declared more than once"))
                        .with_address(&name),
                );
            }
            if *n == 1 {
                graph.add_vertex(vertex);
            }
        };

        for variable in &module.variables {
            let vertex = Vertex::ConfigVariable(VariableVertex {
                module: path.clone(),
                variable: variable.clone(),
            });
            add(graph, vertex, &mut diags);
        }
        for provider in &module.providers {
            let vertex = Vertex::ConfigProvider(ProviderVertex {
                addr: provider.addr(path),
                config: provider.config.clone(),
                synthesized: false,
            });
            add(graph, vertex, &mut diags);
        }
        for resource in &module.resources {
            let vertex = Vertex::ConfigResource(ResourceVertex {
                addr: resource.addr(path),
                config: resource.clone(),
            });
            add(graph, vertex, &mut diags);
        }
        for call in &module.modules {
            let vertex = Vertex::ConfigModuleCall(ModuleCallVertex {
                module: path.clone(),
                name: call.name.clone(),
                args: call.args.clone(),
                depends_on: call.depends_on.clone(),
            });
            add(graph, vertex, &mut diags);
        }
        for output in &module.outputs {
            let vertex = Vertex::ConfigOutput(OutputVertex {
                module: path.clone(),
                output: output.clone(),
            });
            add(graph, vertex, &mut diags);
        }
        diags
    }
}

impl GraphTransformer for ConfigTransformer<'_> {
    fn name(&self) -> &'static str {
        "ConfigTransformer"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), TransformError> {
        let mut diags = Diagnostics::new();
        for path in self.config.module_paths() {
            diags.extend(self.add_module(graph, &path));
        }

        connect_references(graph);

        if diags.has_errors() {
            return Err(TransformError::Diagnostics {
                transformer: self.name(),
                diagnostics: diags,
            });
        }
        Ok(())
    }
}
