use async_trait::async_trait;
use uuid::Uuid;

use crate::executor::result::WalkStatus;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    WalkStarted {
        walk_id: Uuid,
        operation: &'static str,
        vertices: usize,
    },
    WalkFinished {
        walk_id: Uuid,
        status: WalkStatus,
    },
    VertexStarted {
        walk_id: Uuid,
        vertex: String,
    },
    VertexSucceeded {
        walk_id: Uuid,
        vertex: String,
    },
    VertexFailed {
        walk_id: Uuid,
        vertex: String,
        error: String,
    },
    /// Never evaluated, because a dependency failed or the walk was cancelled.
    VertexSkipped {
        walk_id: Uuid,
        vertex: String,
        reason: &'static str,
    },
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: Event);
}

pub struct CompositeEventSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl Default for CompositeEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeEventSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }
}

#[async_trait]
impl EventSink for CompositeEventSink {
    async fn emit(&self, event: Event) {
        for sink in &self.sinks {
            sink.emit(event.clone()).await;
        }
    }
}

/// Forwards events to `tracing`.
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: Event) {
        match event {
            Event::WalkStarted {
                walk_id,
                operation,
                vertices,
            } => tracing::info!(%walk_id, operation, vertices, "walk started"),
            Event::WalkFinished { walk_id, status } => {
                tracing::info!(%walk_id, status = status.as_str(), "walk finished")
            }
            Event::VertexStarted { walk_id, vertex } => {
                tracing::debug!(%walk_id, %vertex, "vertex started")
            }
            Event::VertexSucceeded { walk_id, vertex } => {
                tracing::debug!(%walk_id, %vertex, "vertex succeeded")
            }
            Event::VertexFailed {
                walk_id,
                vertex,
                error,
            } => tracing::warn!(%walk_id, %vertex, %error, "vertex failed"),
            Event::VertexSkipped {
                walk_id,
                vertex,
                reason,
            } => tracing::debug!(%walk_id, %vertex, reason, "vertex skipped"),
        }
    }
}

pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: Event) {}
}
