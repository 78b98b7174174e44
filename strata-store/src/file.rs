use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use strata_core::states::STATE_VERSION;
use strata_core::State;

use crate::store::{StateStore, StoreError};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// On-disk envelope: the state plus who wrote it and when.
#[derive(Debug, Serialize, Deserialize)]
struct StateFile {
    engine_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    written_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    state: State,
}

/// Stores state as a pretty-printed JSON document.
///
/// Writes go to a sibling temporary file which then replaces the target, so a
/// crash never leaves a truncated state file behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn read(&self) -> Result<Option<StateFile>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let file: StateFile = serde_json::from_slice(&bytes)?;
        if file.state.version > STATE_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found: file.state.version,
                supported: STATE_VERSION,
            });
        }
        Ok(Some(file))
    }
}

#[async_trait]
impl StateStore for FileStore {
    async fn load(&self) -> Result<State, StoreError> {
        match self.read().await? {
            Some(file) => {
                tracing::debug!(
                    path = %self.path.display(),
                    serial = file.state.serial,
                    written_by = %file.engine_version,
                    "loaded state"
                );
                Ok(file.state)
            }
            None => Ok(State::new()),
        }
    }

    async fn persist(&self, state: &State) -> Result<(), StoreError> {
        if let Some(existing) = self.read().await? {
            if existing.state.lineage != state.lineage {
                return Err(StoreError::LineageMismatch {
                    stored: existing.state.lineage.to_string(),
                    incoming: state.lineage.to_string(),
                });
            }
            if existing.state.serial > state.serial {
                return Err(StoreError::StaleSerial {
                    stored: existing.state.serial,
                    incoming: state.serial,
                });
            }
        }

        let file = StateFile {
            engine_version: ENGINE_VERSION.to_string(),
            written_at: Some(Utc::now()),
            state: State {
                version: STATE_VERSION,
                ..state.clone()
            },
        };
        let mut bytes = serde_json::to_vec_pretty(&file)?;
        bytes.push(b'\n');

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        write_atomic(&self.path, &self.temp_path(), &bytes).await?;

        tracing::debug!(path = %self.path.display(), serial = state.serial, "persisted state");
        Ok(())
    }
}

/// Writes `bytes` to `tmp` and moves it over `path`. `tmp` never outlives a failure.
async fn write_atomic(path: &Path, tmp: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let result = match tokio::fs::write(tmp, bytes).await {
        Ok(()) => tokio::fs::rename(tmp, path).await,
        Err(e) => Err(e),
    };
    if result.is_err() {
        let _ = tokio::fs::remove_file(tmp).await;
    }
    result
}
