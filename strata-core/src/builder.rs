use std::collections::BTreeSet;

use crate::config::Config;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::BuildError;
use crate::graph::Graph;
use crate::plans::Diff;
use crate::states::State;
use crate::transform::{
    ConfigTransformer, DiffTransformer, GraphTransformer, MissingProviderTransformer,
    MovedTransformer, OrphanTransformer, ProviderTransformer, ReferenceTransformer,
    RootTransformer,
};

/// Runs a fixed sequence of transformers over an empty graph.
///
/// Every step runs even after an earlier one failed; all problems, plus any
/// references still unresolved at the end, are returned together.
pub struct BasicGraphBuilder<'a> {
    pub name: &'static str,
    pub steps: Vec<Box<dyn GraphTransformer + 'a>>,
    pub validate: bool,
}

impl<'a> BasicGraphBuilder<'a> {
    pub fn new(name: &'static str, steps: Vec<Box<dyn GraphTransformer + 'a>>) -> Self {
        Self {
            name,
            steps,
            validate: true,
        }
    }

    pub fn build(&self) -> Result<Graph, BuildError> {
        let mut graph = Graph::new();
        let mut diags = Diagnostics::new();

        for step in &self.steps {
            tracing::debug!(builder = self.name, step = step.name(), "running transformer");
            if let Err(e) = step.transform(&mut graph) {
                tracing::debug!(builder = self.name, step = step.name(), error = %e, "transformer failed");
                diags.extend(e.into_diagnostics());
            }
        }
        diags.extend(graph.unresolved());

        if self.validate {
            if let Err(e) = graph.validate() {
                diags.push(Diagnostic::error("Invalid dependency graph").with_detail(e.to_string()));
            }
        }

        if diags.has_errors() {
            return Err(BuildError::new(diags));
        }
        tracing::debug!(
            builder = self.name,
            vertices = graph.len(),
            edges = graph.edge_count(),
            "graph built"
        );
        Ok(graph)
    }
}

/// Graph for computing a diff from configuration and prior state.
pub struct PlanGraphBuilder<'a> {
    pub config: &'a Config,
    pub state: &'a State,
    /// Provider types that can be instantiated; `None` accepts any.
    pub providers: Option<BTreeSet<String>>,
    pub validate: bool,
}

impl<'a> PlanGraphBuilder<'a> {
    pub fn new(config: &'a Config, state: &'a State) -> Self {
        Self {
            config,
            state,
            providers: None,
            validate: true,
        }
    }

    pub fn with_providers(mut self, providers: BTreeSet<String>) -> Self {
        self.providers = Some(providers);
        self
    }

    pub fn steps(&self) -> Vec<Box<dyn GraphTransformer + 'a>> {
        vec![
            Box::new(ConfigTransformer::new(self.config)),
            Box::new(OrphanTransformer::new(self.config, self.state)),
            Box::new(MissingProviderTransformer::new(self.providers.clone())),
            Box::new(ProviderTransformer),
            Box::new(MovedTransformer::new(self.config)),
            Box::new(RootTransformer),
            Box::new(ReferenceTransformer),
        ]
    }

    pub fn build(&self) -> Result<Graph, BuildError> {
        BasicGraphBuilder {
            name: "plan",
            steps: self.steps(),
            validate: self.validate,
        }
        .build()
    }
}

/// Graph for applying a computed diff.
pub struct ApplyGraphBuilder<'a> {
    pub config: &'a Config,
    pub diff: &'a Diff,
    pub providers: Option<BTreeSet<String>>,
    pub validate: bool,
}

impl<'a> ApplyGraphBuilder<'a> {
    pub fn new(config: &'a Config, diff: &'a Diff) -> Self {
        Self {
            config,
            diff,
            providers: None,
            validate: true,
        }
    }

    pub fn with_providers(mut self, providers: BTreeSet<String>) -> Self {
        self.providers = Some(providers);
        self
    }

    pub fn steps(&self) -> Vec<Box<dyn GraphTransformer + 'a>> {
        vec![
            Box::new(ConfigTransformer::new(self.config)),
            Box::new(DiffTransformer::new(self.diff)),
            Box::new(MissingProviderTransformer::new(self.providers.clone())),
            Box::new(ProviderTransformer),
            Box::new(MovedTransformer::new(self.config)),
            Box::new(RootTransformer),
            Box::new(ReferenceTransformer),
        ]
    }

    pub fn build(&self) -> Result<Graph, BuildError> {
        BasicGraphBuilder {
            name: "apply",
            steps: self.steps(),
            validate: self.validate,
        }
        .build()
    }
}
