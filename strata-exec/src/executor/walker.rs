use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use strata_core::{Diagnostic, Diagnostics, Graph, Vertex, VertexId};

use crate::executor::concurrency::ConcurrencyLimits;
use crate::executor::events::{Event, EventSink, NoOpEventSink};
use crate::executor::result::{EvalError, VertexStatus, WalkError, WalkReport, WalkStatus};

/// Uniform evaluation contract for every vertex kind.
#[async_trait]
pub trait GraphWalker: Send + Sync {
    /// Short label for logs and events, e.g. `plan` or `apply`.
    fn operation(&self) -> &'static str {
        "walk"
    }

    async fn evaluate(&self, vertex: &Vertex) -> Result<(), EvalError>;
}

/// Evaluates nothing; every vertex succeeds. Useful for dry runs of a graph.
#[derive(Debug, Default)]
pub struct NullGraphWalker;

#[async_trait]
impl GraphWalker for NullGraphWalker {
    fn operation(&self) -> &'static str {
        "null"
    }

    async fn evaluate(&self, _vertex: &Vertex) -> Result<(), EvalError> {
        Ok(())
    }
}

/// Aborts the evaluation task when the dispatching task is dropped, so a
/// dropped walk leaves nothing running.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

enum TaskOutcome {
    Completed(Result<(), EvalError>),
    Cancelled,
}

/// Runs a validated graph, dispatching each vertex as soon as its last
/// dependency completes.
pub struct Walker {
    limits: ConcurrencyLimits,
    events: Arc<dyn EventSink>,
    cancel: CancellationToken,
}

impl Walker {
    pub fn new(limits: ConcurrencyLimits) -> Self {
        Self {
            limits,
            events: Arc::new(NoOpEventSink),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn walk(
        &self,
        graph: Arc<Graph>,
        walker: Arc<dyn GraphWalker>,
    ) -> Result<WalkReport, WalkError> {
        graph.validate()?;

        let walk_id = Uuid::new_v4();
        let started_at = Utc::now();
        self.events
            .emit(Event::WalkStarted {
                walk_id,
                operation: walker.operation(),
                vertices: graph.len(),
            })
            .await;

        let mut remaining: HashMap<VertexId, usize> = HashMap::new();
        let mut statuses: BTreeMap<VertexId, VertexStatus> = BTreeMap::new();
        let mut initial: BTreeSet<(String, VertexId)> = BTreeSet::new();
        for (id, vertex) in graph.vertices() {
            let deps = graph.edges_from(id).len();
            remaining.insert(id, deps);
            if deps == 0 {
                statuses.insert(id, VertexStatus::Ready);
                initial.insert((vertex.name(), id));
            } else {
                statuses.insert(id, VertexStatus::Waiting);
            }
        }
        let mut ready: VecDeque<VertexId> = initial.into_iter().map(|(_, id)| id).collect();

        let mut diagnostics = Diagnostics::new();
        let mut tasks: JoinSet<(VertexId, TaskOutcome)> = JoinSet::new();
        let mut cancelled = self.cancel.is_cancelled();

        loop {
            if !cancelled {
                while let Some(id) = ready.pop_front() {
                    self.dispatch(&mut tasks, walk_id, &graph, &walker, id);
                    statuses.insert(id, VertexStatus::Running);
                }
            }

            if tasks.is_empty() {
                break;
            }

            let joined = tokio::select! {
                biased;
                _ = self.cancel.cancelled(), if !cancelled => {
                    tracing::info!(%walk_id, "walk cancelled, waiting for running vertices");
                    cancelled = true;
                    continue;
                }
                joined = tasks.join_next() => joined,
            };
            let Some(joined) = joined else {
                break;
            };
            let (id, outcome) = match joined {
                Ok(pair) => pair,
                // Tasks catch their own panics, so this only happens on runtime shutdown.
                Err(e) => {
                    diagnostics.push(Diagnostic::error(format!("walk task aborted: {e}")));
                    continue;
                }
            };
            let name = graph.name_of(id);

            match outcome {
                TaskOutcome::Cancelled => {
                    statuses.insert(id, VertexStatus::NotStarted);
                    self.events
                        .emit(Event::VertexSkipped {
                            walk_id,
                            vertex: name,
                            reason: "cancelled",
                        })
                        .await;
                }
                TaskOutcome::Completed(Ok(())) => {
                    statuses.insert(id, VertexStatus::Done);
                    self.events
                        .emit(Event::VertexSucceeded {
                            walk_id,
                            vertex: name,
                        })
                        .await;
                    let mut unblocked: Vec<(String, VertexId)> = Vec::new();
                    for dependent in graph.dependents(id) {
                        let Some(n) = remaining.get_mut(&dependent) else {
                            continue;
                        };
                        *n = n.saturating_sub(1);
                        if *n == 0 && statuses.get(&dependent) == Some(&VertexStatus::Waiting) {
                            statuses.insert(dependent, VertexStatus::Ready);
                            unblocked.push((graph.name_of(dependent), dependent));
                        }
                    }
                    unblocked.sort();
                    ready.extend(unblocked.into_iter().map(|(_, id)| id));
                }
                TaskOutcome::Completed(Err(e)) => {
                    tracing::warn!(%walk_id, vertex = %name, error = %e, "vertex failed");
                    statuses.insert(id, VertexStatus::Failed);
                    self.events
                        .emit(Event::VertexFailed {
                            walk_id,
                            vertex: name.clone(),
                            error: e.to_string(),
                        })
                        .await;
                    diagnostics.extend(e.into_diagnostics(&name));
                    for skipped in self.fail_dependents(&graph, id, &mut statuses) {
                        self.events
                            .emit(Event::VertexSkipped {
                                walk_id,
                                vertex: graph.name_of(skipped),
                                reason: "dependency failed",
                            })
                            .await;
                    }
                }
            }
        }

        for (id, status) in statuses.iter_mut() {
            if !status.is_terminal() {
                *status = VertexStatus::NotStarted;
                self.events
                    .emit(Event::VertexSkipped {
                        walk_id,
                        vertex: graph.name_of(*id),
                        reason: "cancelled",
                    })
                    .await;
            }
        }

        let status = if statuses.values().any(|s| *s == VertexStatus::NotStarted) {
            WalkStatus::Incomplete
        } else if statuses
            .values()
            .any(|s| matches!(s, VertexStatus::Failed | VertexStatus::FailedByDependency))
        {
            WalkStatus::Failed
        } else {
            WalkStatus::Succeeded
        };
        self.events.emit(Event::WalkFinished { walk_id, status }).await;

        Ok(WalkReport {
            walk_id,
            status,
            vertices: statuses
                .into_iter()
                .map(|(id, s)| (graph.name_of(id), s))
                .collect(),
            diagnostics,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn dispatch(
        &self,
        tasks: &mut JoinSet<(VertexId, TaskOutcome)>,
        walk_id: Uuid,
        graph: &Arc<Graph>,
        walker: &Arc<dyn GraphWalker>,
        id: VertexId,
    ) {
        let graph = graph.clone();
        let walker = walker.clone();
        let limits = self.limits.clone();
        let cancel = self.cancel.clone();
        let events = self.events.clone();

        tasks.spawn(async move {
            let Some(vertex) = graph.vertex(id) else {
                return (id, TaskOutcome::Completed(Err(EvalError::invalid("vertex vanished"))));
            };
            let provider_type = vertex_provider_type(vertex);
            let permit = match limits.acquire(provider_type.as_deref()).await {
                Ok(p) => p,
                Err(e) => return (id, TaskOutcome::Completed(Err(EvalError::TaskJoin(e.to_string())))),
            };
            if cancel.is_cancelled() {
                return (id, TaskOutcome::Cancelled);
            }

            let name = vertex.name();
            tracing::debug!(%walk_id, vertex = %name, kind = vertex.kind(), "evaluating vertex");
            events
                .emit(Event::VertexStarted {
                    walk_id,
                    vertex: name,
                })
                .await;

            let eval_graph = graph.clone();
            // Separate task so a panic surfaces as a JoinError instead of unwinding here.
            let mut handle = AbortOnDrop(tokio::spawn(async move {
                match eval_graph.vertex(id) {
                    Some(vertex) => walker.evaluate(vertex).await,
                    None => Err(EvalError::invalid("vertex vanished")),
                }
            }));
            let result = match (&mut handle.0).await {
                Ok(r) => r,
                Err(e) => Err(EvalError::TaskJoin(e.to_string())),
            };
            drop(permit);
            (id, TaskOutcome::Completed(result))
        });
    }

    /// Marks every transitive dependent of `failed` that has not run yet.
    fn fail_dependents(
        &self,
        graph: &Graph,
        failed: VertexId,
        statuses: &mut BTreeMap<VertexId, VertexStatus>,
    ) -> Vec<VertexId> {
        let mut skipped = Vec::new();
        let mut stack = graph.dependents(failed);
        while let Some(id) = stack.pop() {
            let pending = matches!(
                statuses.get(&id),
                Some(VertexStatus::Waiting) | Some(VertexStatus::Ready)
            );
            if !pending {
                continue;
            }
            statuses.insert(id, VertexStatus::FailedByDependency);
            skipped.push(id);
            stack.extend(graph.dependents(id));
        }
        skipped
    }
}

fn vertex_provider_type(vertex: &Vertex) -> Option<String> {
    match vertex {
        Vertex::ConfigProvider(p) => Some(p.addr.provider_type.clone()),
        other => other.required_provider().map(|p| p.provider_type),
    }
}
