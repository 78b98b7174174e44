use async_trait::async_trait;

use strata_core::State;

/// Where state lives between runs. Loaded once before a walk and persisted
/// once after it.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Current state, or a fresh empty state when nothing was persisted yet.
    async fn load(&self) -> Result<State, StoreError>;

    async fn persist(&self, state: &State) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("state version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("state lineage {incoming} does not match stored lineage {stored}")]
    LineageMismatch { stored: String, incoming: String },
    #[error("stale state: serial {incoming} is older than stored serial {stored}")]
    StaleSerial { stored: u64, incoming: u64 },
    #[error("store error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Decode(e.to_string())
    }
}
