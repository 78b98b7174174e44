use thiserror::Error;

use crate::diagnostics::Diagnostics;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("{transformer}: {message}")]
    Invalid {
        transformer: &'static str,
        message: String,
    },
    #[error("{transformer}: {} error(s)", .diagnostics.error_count())]
    Diagnostics {
        transformer: &'static str,
        diagnostics: Diagnostics,
    },
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl TransformError {
    pub fn invalid(transformer: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            transformer,
            message: message.into(),
        }
    }

    /// Flatten into diagnostics, keeping every collected entry.
    pub fn into_diagnostics(self) -> Diagnostics {
        match self {
            TransformError::Diagnostics { diagnostics, .. } => diagnostics,
            other => Diagnostics::error(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("cycle: {}", .0.join(", "))]
    Cycle(Vec<String>),
    #[error("self-referencing vertex: {0}")]
    SelfEdge(String),
    #[error("multiple root vertices: {}", .0.join(", "))]
    MultipleRoots(Vec<String>),
    #[error("graph has no root vertex")]
    NoRoot,
    #[error("vertices unreachable from root {root}: {}", .unreachable.join(", "))]
    Disconnected {
        root: String,
        unreachable: Vec<String>,
    },
}

/// Configuration errors collected across an entire graph build.
#[derive(Debug, Error)]
#[error("graph build failed with {} error(s)", .diagnostics.error_count())]
pub struct BuildError {
    pub diagnostics: Diagnostics,
}

impl BuildError {
    pub fn new(diagnostics: Diagnostics) -> Self {
        Self { diagnostics }
    }
}
