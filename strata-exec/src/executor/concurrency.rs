use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Bounded pool of evaluation slots, with optional tighter limits per provider type.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimits {
    global: Arc<Semaphore>,
    per_provider: Arc<HashMap<String, Arc<Semaphore>>>,
}

impl ConcurrencyLimits {
    pub fn new(global_limit: usize, per_provider_limits: &BTreeMap<String, usize>) -> Self {
        Self {
            global: Arc::new(Semaphore::new(global_limit)),
            per_provider: Arc::new(
                per_provider_limits
                    .iter()
                    .map(|(k, v)| (k.clone(), Arc::new(Semaphore::new(*v))))
                    .collect(),
            ),
        }
    }

    /// Waits for a provider slot when that provider is limited, then for a
    /// global slot. A vertex queued behind its provider holds no global slot.
    pub async fn acquire(
        &self,
        provider_type: Option<&str>,
    ) -> Result<ConcurrencyPermit, AcquireError> {
        let provider = match provider_type.and_then(|p| self.per_provider.get(p)) {
            Some(sem) => Some(sem.clone().acquire_owned().await?),
            None => None,
        };
        let global = self.global.clone().acquire_owned().await?;
        Ok(ConcurrencyPermit {
            _global: global,
            _provider: provider,
        })
    }

    pub fn available(&self) -> usize {
        self.global.available_permits()
    }
}

pub struct ConcurrencyPermit {
    _global: OwnedSemaphorePermit,
    _provider: Option<OwnedSemaphorePermit>,
}
