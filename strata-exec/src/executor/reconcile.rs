use strata_core::config::Lifecycle;
use strata_core::{Action, Attributes, Change, InstanceAddr, ReplaceOrder, ResourceInstanceState};

use crate::executor::state::SharedState;
use crate::provider::{Provider, ProviderError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReconcileError {
    #[error("cannot create {0}: it already exists")]
    AlreadyExists(InstanceAddr),
    #[error("cannot change {0}: it does not exist")]
    Missing(InstanceAddr),
    #[error("{0} changed after the plan was made")]
    Stale(InstanceAddr),
    #[error("{action} of {address} failed: {source}")]
    Provider {
        address: InstanceAddr,
        action: &'static str,
        #[source]
        source: ProviderError,
    },
}

/// Ordering for a replacement: explicit lifecycle setting, then provider
/// metadata, then whatever the change was planned with.
pub fn replace_order(
    lifecycle: Option<&Lifecycle>,
    provider: &dyn Provider,
    resource_type: &str,
    planned: ReplaceOrder,
) -> ReplaceOrder {
    if let Some(cbd) = lifecycle.and_then(|l| l.create_before_destroy) {
        return if cbd {
            ReplaceOrder::CreateBeforeDestroy
        } else {
            ReplaceOrder::DestroyBeforeCreate
        };
    }
    provider.replace_order(resource_type).unwrap_or(planned)
}

/// Applies single changes to shared state through a provider.
pub struct Reconciler<'a> {
    provider: &'a dyn Provider,
    state: &'a SharedState,
    /// Recorded on every object this reconciler writes.
    provider_name: Option<String>,
}

impl<'a> Reconciler<'a> {
    pub fn new(provider: &'a dyn Provider, state: &'a SharedState) -> Self {
        Self {
            provider,
            state,
            provider_name: None,
        }
    }

    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }

    fn record(&self, attributes: Attributes) -> ResourceInstanceState {
        ResourceInstanceState {
            attributes,
            provider: self.provider_name.clone(),
        }
    }

    /// Apply `change`, holding the address lock throughout.
    pub async fn apply(&self, change: &Change) -> Result<(), ReconcileError> {
        let _guard = self.state.lock(&change.address).await;
        match change.action {
            Action::NoOp => Ok(()),
            Action::Create => self.create(change).await,
            Action::Update => self.update(change).await,
            Action::Delete => self.delete(change).await,
            Action::Replace => self.replace(change).await,
        }
    }

    fn check_current(&self, change: &Change) -> Result<ResourceInstanceState, ReconcileError> {
        let current = self
            .state
            .get(&change.address)
            .ok_or_else(|| ReconcileError::Missing(change.address.clone()))?;
        if let Some(before) = &change.before {
            if before != &current.attributes {
                return Err(ReconcileError::Stale(change.address.clone()));
            }
        }
        Ok(current)
    }

    fn provider_error(change: &Change, action: Action, source: ProviderError) -> ReconcileError {
        ReconcileError::Provider {
            address: change.address.clone(),
            action: action.as_str(),
            source,
        }
    }

    async fn create(&self, change: &Change) -> Result<(), ReconcileError> {
        if self.state.contains(&change.address) {
            return Err(ReconcileError::AlreadyExists(change.address.clone()));
        }
        self.create_unchecked(change).await
    }

    async fn create_unchecked(&self, change: &Change) -> Result<(), ReconcileError> {
        let resp = self.provider.apply(change).await;
        match resp.error {
            None => {
                let attrs = resp
                    .new_state
                    .or_else(|| change.after.clone())
                    .unwrap_or_default();
                self.state.put(change.address.clone(), self.record(attrs));
                Ok(())
            }
            Some(err) => {
                if let Some(partial) = resp.new_state {
                    self.state.put(change.address.clone(), self.record(partial));
                }
                Err(Self::provider_error(change, Action::Create, err))
            }
        }
    }

    async fn update(&self, change: &Change) -> Result<(), ReconcileError> {
        self.check_current(change)?;
        let resp = self.provider.apply(change).await;
        if let Some(attrs) = resp.new_state {
            self.state.put(change.address.clone(), self.record(attrs));
        }
        match resp.error {
            None => Ok(()),
            Some(err) => Err(Self::provider_error(change, Action::Update, err)),
        }
    }

    async fn delete(&self, change: &Change) -> Result<(), ReconcileError> {
        if !self.state.contains(&change.address) {
            tracing::debug!(address = %change.address, "delete of absent instance, nothing to do");
            return Ok(());
        }
        self.check_current(change)?;
        self.delete_unchecked(change).await
    }

    async fn delete_unchecked(&self, change: &Change) -> Result<(), ReconcileError> {
        let resp = self.provider.apply(change).await;
        match resp.error {
            None => {
                self.state.remove(&change.address);
                Ok(())
            }
            Some(err) => Err(Self::provider_error(change, Action::Delete, err)),
        }
    }

    async fn replace(&self, change: &Change) -> Result<(), ReconcileError> {
        self.check_current(change)?;
        match change.replace_order {
            ReplaceOrder::DestroyBeforeCreate => {
                for op in change.sub_operations() {
                    match op.action {
                        Action::Delete => self.delete_unchecked(&op).await?,
                        _ => self.create_unchecked(&op).await?,
                    }
                }
                Ok(())
            }
            ReplaceOrder::CreateBeforeDestroy => self.replace_create_first(change).await,
        }
    }

    /// The old object is kept as deposed until the new one exists and the
    /// old one is confirmed gone.
    async fn replace_create_first(&self, change: &Change) -> Result<(), ReconcileError> {
        let mut deposed: Option<ResourceInstanceState> = None;
        for op in change.sub_operations() {
            match op.action {
                Action::Create => {
                    let old = self
                        .state
                        .remove(&change.address)
                        .ok_or_else(|| ReconcileError::Missing(change.address.clone()))?;
                    self.state.put_deposed(change.address.clone(), old.clone());
                    if let Err(e) = self.create_unchecked(&op).await {
                        if !self.state.contains(&change.address) {
                            self.state.remove_deposed(&change.address);
                            self.state.put(change.address.clone(), old);
                        }
                        return Err(e);
                    }
                    deposed = Some(old);
                }
                _ => {
                    let Some(old) = deposed.take() else {
                        continue;
                    };
                    let destroy = Change {
                        before: Some(old.attributes),
                        ..op
                    };
                    let resp = self.provider.apply(&destroy).await;
                    match resp.error {
                        None => {
                            self.state.remove_deposed(&change.address);
                        }
                        Some(err) => {
                            tracing::warn!(address = %change.address, "deposed object could not be destroyed");
                            return Err(Self::provider_error(change, Action::Delete, err));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
