use std::collections::BTreeSet;

use super::GraphTransformer;
use crate::addrs::InstanceAddr;
use crate::config::Config;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::TransformError;
use crate::graph::{Graph, MovedVertex, Vertex};

/// Inserts the vertex that renames moved instances in state.
///
/// Everything that reads or writes resource instances depends on it, and it
/// depends on every provider, so renames land before any instance is touched.
pub struct MovedTransformer<'a> {
    config: &'a Config,
}

impl<'a> MovedTransformer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    fn collect(&self) -> (Vec<(InstanceAddr, InstanceAddr)>, Diagnostics) {
        let mut moves = Vec::new();
        let mut diags = Diagnostics::new();
        let mut targets: BTreeSet<InstanceAddr> = BTreeSet::new();

        for (module, stmt) in self.config.moves() {
            let (from, to) = match stmt.resolve(&module) {
                Ok(pair) => pair,
                Err(e) => {
                    diags.push(
                        Diagnostic::error("Invalid moved statement")
                            .with_detail(e.to_string())
                            .with_address(format!("{} -> {}", stmt.from, stmt.to)),
                    );
                    continue;
                }
            };
            let label = format!("{from} -> {to}");

            if from == to {
                diags.push(
                    Diagnostic::error("Redundant moved statement")
                        .with_detail("source and destination are the same address")
                        .with_address(&label),
                );
                continue;
            }
            if from.resource.resource_type != to.resource.resource_type {
                diags.push(
                    Diagnostic::error("Resource type mismatch")
                        .with_detail(format!(
                            "cannot move {} to {}",
                            from.resource.resource_type, to.resource.resource_type
                        ))
                        .with_address(&label),
                );
                continue;
            }
            if !targets.insert(to.clone()) {
                diags.push(
                    Diagnostic::error("Ambiguous move statements")
                        .with_detail(format!("more than one move targets {to}"))
                        .with_address(&label),
                );
                continue;
            }
            if self.config.declares_instance(&from) {
                diags.push(
                    Diagnostic::error("Moved object still exists")
                        .with_detail(format!("{from} is still declared in configuration"))
                        .with_address(&label),
                );
                continue;
            }
            moves.push((from, to));
        }
        (moves, diags)
    }
}

impl GraphTransformer for MovedTransformer<'_> {
    fn name(&self) -> &'static str {
        "MovedTransformer"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), TransformError> {
        if self.config.moves().is_empty() {
            return Ok(());
        }
        let (moves, diags) = self.collect();
        if diags.has_errors() {
            return Err(TransformError::Diagnostics {
                transformer: self.name(),
                diagnostics: diags,
            });
        }

        let mut touching = Vec::new();
        let mut providers = Vec::new();
        for (id, vertex) in graph.vertices() {
            match vertex {
                Vertex::ConfigResource(_)
                | Vertex::ConfigModuleCall(_)
                | Vertex::DiffResource(_)
                | Vertex::OrphanResource(_) => touching.push(id),
                Vertex::ConfigProvider(_) => providers.push(id),
                _ => {}
            }
        }

        tracing::debug!(moves = moves.len(), "adding moved resource executor");
        let moved = graph.add_vertex(Vertex::MovedResourceExecutor(MovedVertex { moves }));
        for id in touching {
            graph.add_edge(id, moved);
        }
        for id in providers {
            graph.add_edge(moved, id);
        }
        Ok(())
    }
}
