//! Capability interface to resource providers.
//!
//! Provider implementations live outside the engine. The engine only needs
//! to configure an instance, ask it to plan, and ask it to apply.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;

use strata_core::{Attributes, Change, InstanceAddr, ReplaceOrder};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("provider configuration rejected: {0}")]
    Configure(String),
    #[error("no provider registered for type {0:?}")]
    Unknown(String),
    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanRequest {
    pub address: InstanceAddr,
    /// Attributes recorded in state, `None` when the instance does not exist yet.
    pub prior: Option<Attributes>,
    /// Configuration with every known value interpolated.
    pub config: Attributes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanResponse {
    pub planned_state: Attributes,
    /// The change cannot be made in place.
    pub requires_replace: bool,
}

/// Outcome of applying one change.
///
/// `new_state` is what the provider reports as existing afterwards, and is
/// recorded even when `error` is set. `None` means no object exists.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApplyResponse {
    pub new_state: Option<Attributes>,
    pub error: Option<ProviderError>,
}

impl ApplyResponse {
    pub fn ok(new_state: Option<Attributes>) -> Self {
        Self {
            new_state,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            new_state: None,
            error: Some(ProviderError::Failed(error.into())),
        }
    }

    /// Provider made some progress before failing.
    pub fn partial(new_state: Attributes, error: impl Into<String>) -> Self {
        Self {
            new_state: Some(new_state),
            error: Some(ProviderError::Failed(error.into())),
        }
    }
}

#[async_trait]
pub trait Provider: Send + Sync {
    async fn configure(&self, _config: &Attributes) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Default plan keeps prior attributes the configuration does not set
    /// (provider-computed values such as ids) and overlays the configuration.
    async fn plan(&self, request: PlanRequest) -> Result<PlanResponse, ProviderError> {
        let mut planned_state = request.prior.unwrap_or_default();
        planned_state.extend(request.config);
        Ok(PlanResponse {
            planned_state,
            requires_replace: false,
        })
    }

    async fn apply(&self, change: &Change) -> ApplyResponse;

    /// Replacement ordering this provider needs for `resource_type`, if any.
    fn replace_order(&self, _resource_type: &str) -> Option<ReplaceOrder> {
        None
    }
}

pub trait ProviderFactory: Send + Sync {
    fn create(&self) -> Arc<dyn Provider>;
}

impl<F> ProviderFactory for F
where
    F: Fn() -> Arc<dyn Provider> + Send + Sync,
{
    fn create(&self) -> Arc<dyn Provider> {
        self()
    }
}

/// Provider factories by provider type.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<String, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        provider_type: impl Into<String>,
        factory: impl ProviderFactory + 'static,
    ) -> &mut Self {
        self.factories.insert(provider_type.into(), Arc::new(factory));
        self
    }

    /// Register one shared instance for every configuration of this type.
    pub fn register_instance(
        &mut self,
        provider_type: impl Into<String>,
        provider: Arc<dyn Provider>,
    ) -> &mut Self {
        self.register(provider_type, move || provider.clone())
    }

    pub fn types(&self) -> BTreeSet<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn instantiate(&self, provider_type: &str) -> Result<Arc<dyn Provider>, ProviderError> {
        self.factories
            .get(provider_type)
            .map(|f| f.create())
            .ok_or_else(|| ProviderError::Unknown(provider_type.to_string()))
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("types", &self.types())
            .finish()
    }
}
