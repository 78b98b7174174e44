use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;

use strata_core::{
    Action, ApplyGraphBuilder, BuildError, Config, Diff, DiffError, Graph, InstanceAddr,
    ModulePath, PlanGraphBuilder, State,
};
use strata_store::{StateStore, StoreError};

use crate::executor::concurrency::ConcurrencyLimits;
use crate::executor::eval::{ContextGraphWalker, Inputs, WalkOperation};
use crate::executor::events::{EventSink, NoOpEventSink};
use crate::executor::state::SharedState;
use crate::executor::{ConfigError, EngineConfig, WalkError, WalkReport};
use crate::executor::walker::Walker;
use crate::provider::ProviderRegistry;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Walk(#[from] WalkError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Diff(#[from] DiffError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub diff: Diff,
    /// State as the plan saw it, after moves were applied.
    pub prior_state: State,
    /// Root module outputs; values that depend on pending changes are left as templates.
    pub outputs: BTreeMap<String, JsonValue>,
    pub report: WalkReport,
}

#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    /// Resulting state, including every change that completed.
    pub state: State,
    pub report: WalkReport,
    /// Actions that were carried out.
    pub applied: BTreeMap<InstanceAddr, Action>,
}

/// Builds graphs from configuration and walks them with registered providers.
pub struct Engine {
    config: EngineConfig,
    registry: ProviderRegistry,
    events: Arc<dyn EventSink>,
}

impl Engine {
    pub fn new(config: EngineConfig, registry: ProviderRegistry) -> Self {
        Self {
            config,
            registry,
            events: Arc::new(NoOpEventSink),
        }
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn supported_providers(&self) -> BTreeSet<String> {
        self.registry.types()
    }

    fn walker(&self, cancel: CancellationToken) -> Result<Walker, EngineError> {
        self.config.validate()?;
        let limits = ConcurrencyLimits::new(
            self.config.parallelism,
            &self.config.per_provider_concurrency,
        );
        Ok(Walker::new(limits)
            .with_events(self.events.clone())
            .with_cancellation(cancel))
    }

    pub fn graph_for_plan(&self, config: &Config, state: &State) -> Result<Graph, BuildError> {
        PlanGraphBuilder::new(config, state)
            .with_providers(self.supported_providers())
            .build()
    }

    pub fn graph_for_apply(&self, config: &Config, diff: &Diff) -> Result<Graph, BuildError> {
        ApplyGraphBuilder::new(config, diff)
            .with_providers(self.supported_providers())
            .build()
    }

    /// Compute the changes needed to make `state` match `config`. `state` is not modified.
    pub async fn plan(
        &self,
        config: &Config,
        state: &State,
        inputs: &Inputs,
        cancel: CancellationToken,
    ) -> Result<PlanOutcome, EngineError> {
        let graph = Arc::new(self.graph_for_plan(config, state)?);
        let shared = Arc::new(SharedState::new(state.clone()));
        let ctx = Arc::new(ContextGraphWalker::new(
            WalkOperation::Plan,
            shared.clone(),
            self.registry.clone(),
            inputs.clone(),
        ));

        let report = self.walker(cancel)?.walk(graph, ctx.clone()).await?;
        let diff = ctx.planned_diff()?;
        tracing::info!(
            status = report.status.as_str(),
            create = diff.count(Action::Create),
            update = diff.count(Action::Update),
            replace = diff.count(Action::Replace),
            delete = diff.count(Action::Delete),
            "plan finished"
        );

        Ok(PlanOutcome {
            diff,
            prior_state: shared.snapshot(),
            outputs: ctx.root_outputs(),
            report,
        })
    }

    /// Carry out `diff` against `state`. Changes that complete are kept in
    /// the returned state even when others fail.
    pub async fn apply(
        &self,
        config: &Config,
        state: State,
        diff: &Diff,
        inputs: &Inputs,
        cancel: CancellationToken,
    ) -> Result<ApplyOutcome, EngineError> {
        let graph = Arc::new(self.graph_for_apply(config, diff)?);
        let shared = Arc::new(SharedState::new(state));
        let ctx = Arc::new(ContextGraphWalker::new(
            WalkOperation::Apply,
            shared.clone(),
            self.registry.clone(),
            inputs.clone(),
        ));

        let report = self.walker(cancel)?.walk(graph, ctx.clone()).await?;

        let declared: BTreeSet<&str> = config
            .outputs(&ModulePath::root())
            .iter()
            .map(|o| o.name.as_str())
            .collect();
        for name in shared.output_names() {
            if !declared.contains(name.as_str()) {
                shared.remove_output(&name);
            }
        }

        let applied = ctx.applied();
        tracing::info!(
            status = report.status.as_str(),
            applied = applied.len(),
            failed = report.diagnostics.error_count(),
            "apply finished"
        );
        Ok(ApplyOutcome {
            state: shared.snapshot(),
            report,
            applied,
        })
    }

    /// Load state from `store`, apply `diff`, and persist the result once.
    /// Partial results are persisted too.
    pub async fn apply_with_store(
        &self,
        store: &dyn StateStore,
        config: &Config,
        diff: &Diff,
        inputs: &Inputs,
        cancel: CancellationToken,
    ) -> Result<ApplyOutcome, EngineError> {
        let prior = store.load().await?;
        let mut outcome = self.apply(config, prior.clone(), diff, inputs, cancel).await?;
        if !outcome.state.same_content(&prior) {
            outcome.state.bump_serial();
        }
        store.persist(&outcome.state).await?;
        Ok(outcome)
    }
}
