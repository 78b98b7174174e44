use super::GraphTransformer;
use crate::error::TransformError;
use crate::graph::{Graph, Vertex};

/// Adds the single aggregation vertex that depends on every vertex nothing
/// else depends on.
#[derive(Debug, Default)]
pub struct RootTransformer;

impl GraphTransformer for RootTransformer {
    fn name(&self) -> &'static str {
        "RootTransformer"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), TransformError> {
        if graph.vertices().any(|(_, v)| v.is_root()) {
            return Ok(());
        }
        let sinks: Vec<_> = graph
            .vertex_ids()
            .into_iter()
            .filter(|id| graph.dependents(*id).is_empty())
            .collect();
        let root = graph.add_vertex(Vertex::RootAggregator);
        for id in sinks {
            graph.add_edge(root, id);
        }
        Ok(())
    }
}
