use super::GraphTransformer;
use crate::error::TransformError;
use crate::graph::Graph;
use crate::references::ReferenceIndex;

/// Re-resolves every vertex's references and adds the missing edges.
///
/// Earlier passes add and replace vertices, so this runs last to wire
/// dependencies against the final vertex set.
#[derive(Debug, Default)]
pub struct ReferenceTransformer;

impl GraphTransformer for ReferenceTransformer {
    fn name(&self) -> &'static str {
        "ReferenceTransformer"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), TransformError> {
        connect_references(graph);
        Ok(())
    }
}

/// Add an edge for every resolvable reference and record the rest on the graph.
pub(crate) fn connect_references(graph: &mut Graph) {
    let index = ReferenceIndex::build(graph);
    for id in graph.vertex_ids() {
        let resolved = index.resolve(graph, id);
        for dep in resolved.dependencies {
            graph.add_edge(id, dep);
        }
        graph.set_unresolved(id, resolved.missing);
    }
}
