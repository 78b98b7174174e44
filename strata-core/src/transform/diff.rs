use std::collections::{BTreeMap, BTreeSet};

use super::GraphTransformer;
use crate::addrs::{ProviderAddr, ResourceAddr};
use crate::error::TransformError;
use crate::graph::{DiffResourceVertex, Graph, Vertex};
use crate::plans::{Change, Diff};

/// Replaces each configured resource with one vertex per instance the diff
/// carries a change for.
///
/// Resources without any change stay as inert placeholders so references to
/// them still resolve. Changes for resources no longer configured get a
/// vertex of their own.
pub struct DiffTransformer<'a> {
    diff: &'a Diff,
}

impl<'a> DiffTransformer<'a> {
    pub fn new(diff: &'a Diff) -> Self {
        Self { diff }
    }
}

impl GraphTransformer for DiffTransformer<'_> {
    fn name(&self) -> &'static str {
        "DiffTransformer"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), TransformError> {
        let mut by_resource: BTreeMap<&ResourceAddr, Vec<&Change>> = BTreeMap::new();
        for change in self.diff.changes() {
            by_resource
                .entry(&change.address.resource)
                .or_default()
                .push(change);
        }

        let mut configured: BTreeSet<ResourceAddr> = BTreeSet::new();
        for id in graph.vertex_ids() {
            let Some(Vertex::ConfigResource(rv)) = graph.vertex(id) else {
                continue;
            };
            configured.insert(rv.addr.clone());
            let Some(changes) = by_resource.get(&rv.addr) else {
                continue;
            };
            let config = rv.config.clone();
            let provider = config.provider_addr(&rv.addr.module);

            graph.remove_vertex(id);
            for change in changes {
                graph.add_vertex(Vertex::DiffResource(DiffResourceVertex {
                    change: (*change).clone(),
                    config: Some(config.clone()),
                    provider: provider.clone(),
                }));
            }
        }

        for (resource, changes) in &by_resource {
            if configured.contains(*resource) {
                continue;
            }
            for change in changes {
                let provider = match &change.provider {
                    Some(p) => ProviderAddr::from_local(resource.module.clone(), p),
                    None => ProviderAddr::new(
                        resource.module.clone(),
                        ProviderAddr::implied_type(&resource.resource_type),
                        None,
                    ),
                };
                graph.add_vertex(Vertex::DiffResource(DiffResourceVertex {
                    change: (*change).clone(),
                    config: None,
                    provider,
                }));
            }
        }
        Ok(())
    }
}
