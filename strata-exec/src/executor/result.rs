use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use strata_core::{Diagnostic, Diagnostics, GraphError};

use crate::executor::reconcile::ReconcileError;
use crate::provider::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexStatus {
    Waiting,
    Ready,
    Running,
    Done,
    Failed,
    FailedByDependency,
    /// The walk was cancelled before this vertex was dispatched.
    NotStarted,
}

impl VertexStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VertexStatus::Waiting => "waiting",
            VertexStatus::Ready => "ready",
            VertexStatus::Running => "running",
            VertexStatus::Done => "done",
            VertexStatus::Failed => "failed",
            VertexStatus::FailedByDependency => "failed_by_dependency",
            VertexStatus::NotStarted => "not_started",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VertexStatus::Done
                | VertexStatus::Failed
                | VertexStatus::FailedByDependency
                | VertexStatus::NotStarted
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkStatus {
    Succeeded,
    Failed,
    /// Cancelled; some vertices never ran.
    Incomplete,
}

impl WalkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalkStatus::Succeeded => "succeeded",
            WalkStatus::Failed => "failed",
            WalkStatus::Incomplete => "incomplete",
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct WalkReport {
    pub walk_id: Uuid,
    pub status: WalkStatus,
    /// Final status of every vertex, by vertex name.
    pub vertices: BTreeMap<String, VertexStatus>,
    pub diagnostics: Diagnostics,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl WalkReport {
    pub fn status_of(&self, vertex: &str) -> Option<VertexStatus> {
        self.vertices.get(vertex).copied()
    }

    pub fn count(&self, status: VertexStatus) -> usize {
        self.vertices.values().filter(|s| **s == status).count()
    }

    pub fn succeeded(&self) -> bool {
        self.status == WalkStatus::Succeeded
    }
}

/// Why evaluating one vertex failed.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error("{0}")]
    Invalid(String),
    #[error("{} error(s)", .0.error_count())]
    Diagnostics(Diagnostics),
    #[error("evaluation task failed: {0}")]
    TaskJoin(String),
}

impl EvalError {
    pub fn invalid(message: impl Into<String>) -> Self {
        EvalError::Invalid(message.into())
    }

    /// Diagnostics tagged with `address` unless already tagged.
    pub fn into_diagnostics(self, address: &str) -> Diagnostics {
        match self {
            EvalError::Diagnostics(diags) => diags
                .into_iter()
                .map(|d| {
                    if d.address.is_some() {
                        d
                    } else {
                        d.with_address(address)
                    }
                })
                .collect(),
            other => Diagnostic::error(other.to_string())
                .with_address(address)
                .into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error("refusing to walk an invalid graph: {0}")]
    Graph(#[from] GraphError),
}
