use std::collections::{BTreeMap, BTreeSet};

use super::GraphTransformer;
use crate::addrs::{ModulePath, ProviderAddr};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::TransformError;
use crate::graph::{Graph, ProviderVertex, Vertex, VertexId};

/// Provider vertices keyed by their full address.
fn provider_vertices(graph: &Graph) -> BTreeMap<ProviderAddr, VertexId> {
    graph
        .vertices()
        .filter_map(|(id, v)| match v {
            Vertex::ConfigProvider(p) => Some((p.addr.clone(), id)),
            _ => None,
        })
        .collect()
}

/// Nearest configuration for `wanted`: its own module first, then each ancestor.
fn find_provider(
    providers: &BTreeMap<ProviderAddr, VertexId>,
    wanted: &ProviderAddr,
) -> Option<VertexId> {
    wanted
        .module
        .self_and_ancestors()
        .into_iter()
        .find_map(|module| providers.get(&wanted.in_module(module)).copied())
}

fn unsupported(provider_type: &str, address: &str) -> Diagnostic {
    Diagnostic::error("Unsupported provider")
        .with_detail(format!("no provider plugin serves type {provider_type:?}"))
        .with_address(address)
}

/// Adds a bare provider vertex at the root for every provider a resource
/// needs but no module configures. Unknown provider types are errors, whether
/// configured explicitly or not.
pub struct MissingProviderTransformer {
    /// `None` accepts any provider type.
    supported: Option<BTreeSet<String>>,
}

impl MissingProviderTransformer {
    pub fn new(supported: Option<BTreeSet<String>>) -> Self {
        Self { supported }
    }

    fn is_supported(&self, provider_type: &str) -> bool {
        self.supported
            .as_ref()
            .map(|s| s.contains(provider_type))
            .unwrap_or(true)
    }
}

impl GraphTransformer for MissingProviderTransformer {
    fn name(&self) -> &'static str {
        "MissingProviderTransformer"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), TransformError> {
        let mut providers = provider_vertices(graph);
        let mut diags = Diagnostics::new();

        for addr in providers.keys() {
            if !self.is_supported(&addr.provider_type) {
                diags.push(unsupported(&addr.provider_type, &addr.to_string()));
            }
        }

        let mut needs: Vec<(String, ProviderAddr)> = graph
            .vertices()
            .filter_map(|(_, v)| v.required_provider().map(|p| (v.name(), p)))
            .collect();
        needs.sort();

        for (owner, wanted) in needs {
            if find_provider(&providers, &wanted).is_some() {
                continue;
            }
            if !self.is_supported(&wanted.provider_type) {
                diags.push(unsupported(&wanted.provider_type, &owner));
                continue;
            }
            if wanted.alias.is_some() {
                diags.push(
                    Diagnostic::error("Provider configuration not present")
                        .with_detail(format!("{} is referenced but never configured", wanted.local_name()))
                        .with_address(&owner),
                );
                continue;
            }

            let addr = wanted.in_module(ModulePath::root());
            tracing::debug!(provider = %addr, "adding implicit provider configuration");
            let id = graph.add_vertex(Vertex::ConfigProvider(ProviderVertex {
                addr: addr.clone(),
                config: Default::default(),
                synthesized: true,
            }));
            providers.insert(addr, id);
        }

        if diags.has_errors() {
            return Err(TransformError::Diagnostics {
                transformer: self.name(),
                diagnostics: diags,
            });
        }
        Ok(())
    }
}

/// Connects every resource vertex to the provider vertex that serves it.
#[derive(Debug, Default)]
pub struct ProviderTransformer;

impl GraphTransformer for ProviderTransformer {
    fn name(&self) -> &'static str {
        "ProviderTransformer"
    }

    fn transform(&self, graph: &mut Graph) -> Result<(), TransformError> {
        let providers = provider_vertices(graph);
        let mut diags = Diagnostics::new();

        let needs: Vec<(VertexId, String, ProviderAddr)> = graph
            .vertices()
            .filter_map(|(id, v)| v.required_provider().map(|p| (id, v.name(), p)))
            .collect();

        for (id, owner, wanted) in needs {
            match find_provider(&providers, &wanted) {
                Some(provider) => graph.add_edge(id, provider),
                None => diags.push(
                    Diagnostic::error("Provider configuration not present")
                        .with_detail(format!("no configuration for {}", wanted.local_name()))
                        .with_address(&owner),
                ),
            }
        }

        if diags.has_errors() {
            return Err(TransformError::Diagnostics {
                transformer: self.name(),
                diagnostics: diags,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_module_uses_nearest_ancestor_provider() {
        let mut providers = BTreeMap::new();
        let root_aws = ProviderAddr::new(ModulePath::root(), "aws", None);
        providers.insert(root_aws, VertexId::new(0));
        let wanted = ProviderAddr::new(ModulePath::new(["net", "vpc"]), "aws", None);
        assert_eq!(find_provider(&providers, &wanted), Some(VertexId::new(0)));

        let child_aws = ProviderAddr::new(ModulePath::new(["net"]), "aws", None);
        providers.insert(child_aws, VertexId::new(1));
        assert_eq!(find_provider(&providers, &wanted), Some(VertexId::new(1)));
    }
}
