use std::collections::{BTreeMap, BTreeSet, HashSet};

use petgraph::algo::tarjan_scc;

use super::{Graph, VertexId};
use crate::error::GraphError;

pub(super) fn validate(graph: &Graph) -> Result<(), GraphError> {
    if graph.is_empty() {
        return Ok(());
    }

    for (from, to) in graph.edges() {
        if from == to {
            return Err(GraphError::SelfEdge(graph.name_of(from)));
        }
    }

    let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph.inner)
        .into_iter()
        .filter(|scc| scc.len() > 1)
        .map(|scc| {
            let mut names: Vec<String> = scc.into_iter().map(|id| graph.name_of(id)).collect();
            names.sort();
            names
        })
        .collect();
    cycles.sort();
    if let Some(first) = cycles.into_iter().next() {
        return Err(GraphError::Cycle(first));
    }

    let roots: Vec<VertexId> = graph
        .vertex_ids()
        .into_iter()
        .filter(|id| graph.dependents(*id).is_empty())
        .collect();
    let root = match roots.as_slice() {
        [] => return Err(GraphError::NoRoot),
        [only] => *only,
        many => {
            let mut names: Vec<String> = many.iter().map(|id| graph.name_of(*id)).collect();
            names.sort();
            return Err(GraphError::MultipleRoots(names));
        }
    };

    let mut seen: HashSet<VertexId> = HashSet::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if seen.insert(id) {
            stack.extend(graph.edges_from(id));
        }
    }
    if seen.len() != graph.len() {
        let mut unreachable: Vec<String> = graph
            .vertex_ids()
            .into_iter()
            .filter(|id| !seen.contains(id))
            .map(|id| graph.name_of(id))
            .collect();
        unreachable.sort();
        return Err(GraphError::Disconnected {
            root: graph.name_of(root),
            unreachable,
        });
    }

    Ok(())
}

pub(super) fn topological_order(graph: &Graph) -> Result<Vec<VertexId>, GraphError> {
    let mut remaining: BTreeMap<VertexId, usize> = BTreeMap::new();
    for id in graph.vertex_ids() {
        remaining.insert(id, graph.edges_from(id).len());
    }

    let mut ready: BTreeSet<(String, VertexId)> = remaining
        .iter()
        .filter(|(_, n)| **n == 0)
        .map(|(id, _)| (graph.name_of(*id), *id))
        .collect();

    let mut out = Vec::with_capacity(remaining.len());
    while let Some(next) = ready.pop_first() {
        let (_, id) = next;
        out.push(id);
        for dependent in graph.dependents(id) {
            if let Some(n) = remaining.get_mut(&dependent) {
                *n -= 1;
                if *n == 0 {
                    ready.insert((graph.name_of(dependent), dependent));
                }
            }
        }
    }

    if out.len() != graph.len() {
        let mut stuck: Vec<String> = remaining
            .iter()
            .filter(|(_, n)| **n > 0)
            .map(|(id, _)| graph.name_of(*id))
            .collect();
        stuck.sort();
        return Err(GraphError::Cycle(stuck));
    }
    Ok(out)
}
