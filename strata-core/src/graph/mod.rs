mod algo;
mod vertex;

use std::collections::BTreeMap;
use std::fmt;

use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;

pub use petgraph::stable_graph::NodeIndex as VertexId;
pub use vertex::{
    DiffResourceVertex, ModuleCallVertex, MovedVertex, OrphanVertex, OutputVertex,
    ProviderVertex, ResourceVertex, ScopedRef, VariableVertex, Vertex,
};

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::GraphError;

/// Directed work graph. An edge `a -> b` means `b` must complete before `a` may run.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    inner: StableDiGraph<Vertex, ()>,
    /// Reference problems from the most recent resolving pass, per vertex.
    unresolved: BTreeMap<VertexId, Vec<Diagnostic>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, vertex: Vertex) -> VertexId {
        self.inner.add_node(vertex)
    }

    pub fn remove_vertex(&mut self, id: VertexId) -> Option<Vertex> {
        self.unresolved.remove(&id);
        self.inner.remove_node(id)
    }

    /// `from` depends on `to`. Adding an existing edge is a no-op.
    pub fn add_edge(&mut self, from: VertexId, to: VertexId) {
        if self.inner.find_edge(from, to).is_none() {
            self.inner.add_edge(from, to, ());
        }
    }

    pub fn remove_edge(&mut self, from: VertexId, to: VertexId) {
        if let Some(e) = self.inner.find_edge(from, to) {
            self.inner.remove_edge(e);
        }
    }

    pub fn has_edge(&self, from: VertexId, to: VertexId) -> bool {
        self.inner.find_edge(from, to).is_some()
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.inner.node_weight(id)
    }

    pub fn vertex_mut(&mut self, id: VertexId) -> Option<&mut Vertex> {
        self.inner.node_weight_mut(id)
    }

    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex)> {
        self.inner
            .node_indices()
            .filter_map(move |id| self.inner.node_weight(id).map(|v| (id, v)))
    }

    pub fn vertex_ids(&self) -> Vec<VertexId> {
        self.inner.node_indices().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.node_count() == 0
    }

    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Vertices `id` depends on.
    pub fn edges_from(&self, id: VertexId) -> Vec<VertexId> {
        self.inner
            .neighbors_directed(id, Direction::Outgoing)
            .collect()
    }

    /// Vertices depending on `id`.
    pub fn dependents(&self, id: VertexId) -> Vec<VertexId> {
        self.inner
            .neighbors_directed(id, Direction::Incoming)
            .collect()
    }

    pub fn edges(&self) -> impl Iterator<Item = (VertexId, VertexId)> + '_ {
        self.inner.edge_references().map(|e| (e.source(), e.target()))
    }

    pub fn find(&self, name: &str) -> Option<VertexId> {
        self.vertices()
            .find(|(_, v)| v.name() == name)
            .map(|(id, _)| id)
    }

    pub fn name_of(&self, id: VertexId) -> String {
        self.vertex(id)
            .map(Vertex::name)
            .unwrap_or_else(|| format!("<removed {}>", id.index()))
    }

    pub(crate) fn set_unresolved(&mut self, id: VertexId, problems: Vec<Diagnostic>) {
        if problems.is_empty() {
            self.unresolved.remove(&id);
        } else {
            self.unresolved.insert(id, problems);
        }
    }

    /// Reference problems left by the latest resolving pass.
    pub fn unresolved(&self) -> Diagnostics {
        self.unresolved.values().flatten().cloned().collect()
    }

    /// Ensure the graph is one connected DAG with a single sink.
    pub fn validate(&self) -> Result<(), GraphError> {
        algo::validate(self)
    }

    /// Dependencies before dependents; ties broken by name.
    pub fn topological_order(&self) -> Result<Vec<VertexId>, GraphError> {
        algo::topological_order(self)
    }

    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        out.push_str("digraph strata {\n");
        out.push_str("  compound = \"true\";\n");
        out.push_str("  newrank = \"true\";\n");
        for (name, deps) in self.sorted_adjacency() {
            out.push_str(&format!("  \"{name}\";\n"));
            for dep in deps {
                out.push_str(&format!("  \"{name}\" -> \"{dep}\";\n"));
            }
        }
        out.push_str("}\n");
        out
    }

    fn sorted_adjacency(&self) -> Vec<(String, Vec<String>)> {
        let mut rows: Vec<(String, Vec<String>)> = self
            .vertices()
            .map(|(id, v)| {
                let mut deps: Vec<String> =
                    self.edges_from(id).into_iter().map(|d| self.name_of(d)).collect();
                deps.sort();
                (v.name(), deps)
            })
            .collect();
        rows.sort();
        rows
    }
}

/// One vertex per line, sorted, each followed by its indented dependencies.
impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, deps) in self.sorted_adjacency() {
            writeln!(f, "{name}")?;
            for dep in deps {
                writeln!(f, "  {dep}")?;
            }
        }
        Ok(())
    }
}
