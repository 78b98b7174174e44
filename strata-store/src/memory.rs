use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use strata_core::State;

use crate::store::{StateStore, StoreError};

/// Keeps state in process memory. Useful for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<Option<State>>,
    persists: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: State) -> Self {
        Self {
            state: RwLock::new(Some(state)),
            persists: AtomicUsize::new(0),
        }
    }

    /// Number of successful `persist` calls.
    pub fn persist_count(&self) -> usize {
        self.persists.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> Option<State> {
        self.state.read().await.clone()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> Result<State, StoreError> {
        let mut guard = self.state.write().await;
        Ok(guard.get_or_insert_with(State::new).clone())
    }

    async fn persist(&self, state: &State) -> Result<(), StoreError> {
        let mut guard = self.state.write().await;
        if let Some(stored) = guard.as_ref() {
            if stored.lineage != state.lineage {
                return Err(StoreError::LineageMismatch {
                    stored: stored.lineage.to_string(),
                    incoming: state.lineage.to_string(),
                });
            }
            if stored.serial > state.serial {
                return Err(StoreError::StaleSerial {
                    stored: stored.serial,
                    incoming: state.serial,
                });
            }
        }
        *guard = Some(state.clone());
        self.persists.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
