use std::collections::BTreeSet;

use super::GraphTransformer;
use crate::addrs::{InstanceAddr, ProviderAddr};
use crate::config::Config;
use crate::error::TransformError;
use crate::graph::{Graph, OrphanVertex, Vertex};
use crate::states::State;

/// Adds a vertex for every state instance the configuration no longer
/// declares, so planning can propose its destruction.
pub struct OrphanTransformer<'a> {
    config: &'a Config,
    state: &'a State,
}

impl<'a> OrphanTransformer<'a> {
    pub fn new(config: &'a Config, state: &'a State) -> Self {
        Self { config, state }
    }

    /// Sources of moves; their objects live on under the new address.
    fn moved_away(&self) -> BTreeSet<InstanceAddr> {
        self.config
            .moves()
            .into_iter()
            .filter_map(|(module, stmt)| stmt.resolve(&module).ok())
            .map(|(from, _)| from)
            .collect()
    }
}

impl GraphTransformer for OrphanTransformer<'_> {
    fn name(&self) -> &'static str {
        "OrphanTransformer"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), TransformError> {
        let moved_away = self.moved_away();
        for (addr, instance) in &self.state.resources {
            if self.config.declares_instance(addr) || moved_away.contains(addr) {
                continue;
            }
            let provider = match &instance.provider {
                Some(p) => ProviderAddr::from_local(addr.module().clone(), p),
                None => ProviderAddr::new(
                    addr.module().clone(),
                    ProviderAddr::implied_type(&addr.resource.resource_type),
                    None,
                ),
            };
            tracing::debug!(address = %addr, "orphaned resource instance");
            graph.add_vertex(Vertex::OrphanResource(OrphanVertex {
                addr: addr.clone(),
                state: instance.clone(),
                provider,
            }));
        }
        Ok(())
    }
}
