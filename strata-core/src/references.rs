use std::collections::{BTreeMap, BTreeSet};

use crate::addrs::ModulePath;
use crate::diagnostics::Diagnostic;
use crate::expressions::parse_reference;
use crate::graph::{Graph, VertexId};

/// Dependencies found for one vertex, plus the references that matched nothing.
#[derive(Debug, Default)]
pub struct Resolved {
    pub dependencies: BTreeSet<VertexId>,
    pub missing: Vec<Diagnostic>,
}

/// Maps every referenceable name, scoped by module, to the vertices providing it.
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    names: BTreeMap<(ModulePath, String), Vec<VertexId>>,
}

impl ReferenceIndex {
    pub fn build(graph: &Graph) -> Self {
        let mut names: BTreeMap<(ModulePath, String), Vec<VertexId>> = BTreeMap::new();
        for (id, vertex) in graph.vertices() {
            let module = vertex.module();
            for name in vertex.provides() {
                names.entry((module.clone(), name)).or_default().push(id);
            }
        }
        Self { names }
    }

    pub fn lookup(&self, module: &ModulePath, name: &str) -> &[VertexId] {
        self.names
            .get(&(module.clone(), name.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn resolve(&self, graph: &Graph, id: VertexId) -> Resolved {
        let mut out = Resolved::default();
        let Some(vertex) = graph.vertex(id) else {
            return out;
        };
        let name = vertex.name();

        let refs = match vertex.references() {
            Ok(refs) => refs,
            Err(e) => {
                out.missing.push(
                    Diagnostic::error("Invalid template")
                        .with_detail(e.to_string())
                        .with_address(&name),
                );
                return out;
            }
        };

        for scoped in refs {
            let reference = match parse_reference(&scoped.raw) {
                Ok(r) => r,
                Err(e) => {
                    out.missing.push(
                        Diagnostic::error("Invalid reference")
                            .with_detail(format!("{}: {e}", scoped.raw))
                            .with_address(&name),
                    );
                    continue;
                }
            };

            let candidates = reference.lookup_names(&scoped.scope);
            if candidates.is_empty() {
                continue;
            }
            let found = candidates
                .iter()
                .map(|(module, n)| self.lookup(module, n))
                .find(|ids| !ids.is_empty());

            match found {
                Some(ids) => {
                    out.dependencies
                        .extend(ids.iter().copied().filter(|dep| *dep != id));
                }
                None => out.missing.push(
                    Diagnostic::error("Reference to undeclared object")
                        .with_detail(describe(&scoped.scope, &scoped.raw))
                        .with_address(&name),
                ),
            }
        }
        out
    }
}

fn describe(scope: &ModulePath, raw: &str) -> String {
    if scope.is_root() {
        format!("{raw} is not declared in the root module")
    } else {
        format!("{raw} is not declared in {scope}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addrs::ResourceAddr;
    use crate::config::ResourceConfig;
    use crate::graph::{ResourceVertex, Vertex};

    fn resource(module: ModulePath, ty: &str, name: &str, refs: &[&str]) -> Vertex {
        let config = ResourceConfig {
            resource_type: ty.into(),
            name: name.into(),
            provider: None,
            count: None,
            for_each: None,
            depends_on: refs.iter().map(|s| s.to_string()).collect(),
            lifecycle: Default::default(),
            config: Default::default(),
        };
        Vertex::ConfigResource(ResourceVertex {
            addr: ResourceAddr::new(module, ty, name),
            config,
        })
    }

    #[test]
    fn resolves_within_own_module_only() {
        let mut g = Graph::new();
        let child = ModulePath::new(["child"]);
        let a_root = g.add_vertex(resource(ModulePath::root(), "null_resource", "a", &[]));
        let a_child = g.add_vertex(resource(child.clone(), "null_resource", "a", &[]));
        let b_child = g.add_vertex(resource(child, "null_resource", "b", &["null_resource.a"]));

        let index = ReferenceIndex::build(&g);
        let resolved = index.resolve(&g, b_child);
        assert!(resolved.missing.is_empty());
        assert_eq!(resolved.dependencies, BTreeSet::from([a_child]));
        assert!(!resolved.dependencies.contains(&a_root));
    }

    #[test]
    fn self_reference_is_ignored() {
        let mut g = Graph::new();
        let a = g.add_vertex(resource(ModulePath::root(), "null_resource", "a", &["null_resource.a"]));
        let resolved = ReferenceIndex::build(&g).resolve(&g, a);
        assert!(resolved.dependencies.is_empty());
        assert!(resolved.missing.is_empty());
    }

    #[test]
    fn missing_reference_is_a_diagnostic() {
        let mut g = Graph::new();
        let a = g.add_vertex(resource(ModulePath::root(), "null_resource", "a", &["null_resource.nope"]));
        let resolved = ReferenceIndex::build(&g).resolve(&g, a);
        assert_eq!(resolved.missing.len(), 1);
        assert_eq!(resolved.missing[0].address.as_deref(), Some("null_resource.a"));
    }
}
