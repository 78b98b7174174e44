mod common;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use strata_core::{Graph, PlanGraphBuilder, State, Vertex};
use strata_exec::executor::concurrency::ConcurrencyLimits;
use strata_exec::executor::{EvalError, NullGraphWalker};
use strata_exec::{GraphWalker, VertexStatus, WalkStatus, Walker};

use common::config;

fn plan_graph(yaml: &str) -> Arc<Graph> {
    let providers: BTreeSet<String> = ["null".to_string()].into();
    Arc::new(
        PlanGraphBuilder::new(&config(yaml), &State::new())
            .with_providers(providers)
            .build()
            .unwrap(),
    )
}

fn walker(parallelism: usize) -> Walker {
    Walker::new(ConcurrencyLimits::new(parallelism, &BTreeMap::new()))
}

/// Records evaluation order and how many vertices ran at once.
#[derive(Default)]
struct Recording {
    order: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Option<Duration>,
    fail: Option<&'static str>,
    panic_on: Option<&'static str>,
    cancel_after: Option<(&'static str, CancellationToken)>,
}

impl Recording {
    fn order(&self) -> Vec<String> {
        self.order.lock().unwrap().clone()
    }

    fn position(&self, name: &str) -> usize {
        self.order()
            .iter()
            .position(|n| n == name)
            .unwrap_or_else(|| panic!("{name} never evaluated"))
    }
}

#[async_trait]
impl GraphWalker for Recording {
    async fn evaluate(&self, vertex: &Vertex) -> Result<(), EvalError> {
        let name = vertex.name();
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.order.lock().unwrap().push(name.clone());

        if self.panic_on == Some(name.as_str()) {
            panic!("boom in {name}");
        }
        if let Some((target, token)) = &self.cancel_after {
            if *target == name {
                token.cancel();
            }
        }
        if self.fail == Some(name.as_str()) {
            return Err(EvalError::invalid("simulated failure"));
        }
        Ok(())
    }
}

const DIAMOND: &str = r#"
resources:
  - type: null_resource
    name: a
  - type: null_resource
    name: b
    depends_on: [null_resource.a]
  - type: null_resource
    name: c
    depends_on: [null_resource.a]
  - type: null_resource
    name: d
    depends_on: [null_resource.b, null_resource.c]
"#;

#[tokio::test]
async fn single_resource_walk_completes() {
    let graph = plan_graph(
        r#"
providers:
  - name: "null"
resources:
  - type: null_resource
    name: web
"#,
    );
    let report = walker(10)
        .walk(graph, Arc::new(NullGraphWalker))
        .await
        .unwrap();
    assert_eq!(report.status, WalkStatus::Succeeded);
    assert_eq!(report.count(VertexStatus::Done), 3);
    assert_eq!(report.status_of("null_resource.web"), Some(VertexStatus::Done));
    assert_eq!(report.status_of("provider.null"), Some(VertexStatus::Done));
}

#[tokio::test]
async fn vertices_run_after_all_their_dependencies() {
    let rec = Arc::new(Recording::default());
    let report = walker(10).walk(plan_graph(DIAMOND), rec.clone()).await.unwrap();
    assert!(report.succeeded());

    assert!(rec.position("provider.null") < rec.position("null_resource.a"));
    assert!(rec.position("null_resource.a") < rec.position("null_resource.b"));
    assert!(rec.position("null_resource.a") < rec.position("null_resource.c"));
    assert!(rec.position("null_resource.b") < rec.position("null_resource.d"));
    assert!(rec.position("null_resource.c") < rec.position("null_resource.d"));
    assert_eq!(rec.order().last().map(String::as_str), Some("root"));
}

#[tokio::test]
async fn failure_marks_transitive_dependents() {
    let rec = Arc::new(Recording {
        fail: Some("null_resource.a"),
        ..Default::default()
    });
    let report = walker(10).walk(plan_graph(DIAMOND), rec.clone()).await.unwrap();

    assert_eq!(report.status, WalkStatus::Failed);
    assert_eq!(report.status_of("null_resource.a"), Some(VertexStatus::Failed));
    for name in ["null_resource.b", "null_resource.c", "null_resource.d", "root"] {
        assert_eq!(report.status_of(name), Some(VertexStatus::FailedByDependency), "{name}");
    }
    assert!(!rec.order().contains(&"null_resource.d".to_string()));
    assert_eq!(report.diagnostics.error_count(), 1);
}

#[tokio::test]
async fn panicking_vertex_is_reported_as_failed() {
    let rec = Arc::new(Recording {
        panic_on: Some("null_resource.b"),
        ..Default::default()
    });
    let report = walker(10).walk(plan_graph(DIAMOND), rec).await.unwrap();

    assert_eq!(report.status, WalkStatus::Failed);
    assert_eq!(report.status_of("null_resource.b"), Some(VertexStatus::Failed));
    assert_eq!(report.status_of("null_resource.c"), Some(VertexStatus::Done));
    assert_eq!(
        report.status_of("null_resource.d"),
        Some(VertexStatus::FailedByDependency)
    );
}

#[tokio::test]
async fn cancellation_stops_dispatch_and_marks_the_rest_not_started() {
    let token = CancellationToken::new();
    let rec = Arc::new(Recording {
        cancel_after: Some(("null_resource.a", token.clone())),
        ..Default::default()
    });
    let report = walker(10)
        .with_cancellation(token)
        .walk(plan_graph(DIAMOND), rec.clone())
        .await
        .unwrap();

    assert_eq!(report.status, WalkStatus::Incomplete);
    assert_eq!(report.status_of("null_resource.a"), Some(VertexStatus::Done));
    for name in ["null_resource.b", "null_resource.c", "null_resource.d", "root"] {
        assert_eq!(report.status_of(name), Some(VertexStatus::NotStarted), "{name}");
    }
    assert_eq!(rec.order().len(), 2);
}

#[tokio::test]
async fn cancelled_before_start_runs_nothing() {
    let token = CancellationToken::new();
    token.cancel();
    let rec = Arc::new(Recording::default());
    let report = walker(10)
        .with_cancellation(token)
        .walk(plan_graph(DIAMOND), rec.clone())
        .await
        .unwrap();

    assert_eq!(report.status, WalkStatus::Incomplete);
    assert_eq!(report.count(VertexStatus::NotStarted), report.vertices.len());
    assert!(rec.order().is_empty());
}

fn wide(n: usize) -> String {
    let mut yaml = String::from("resources:\n");
    for i in 0..n {
        yaml.push_str(&format!("  - type: null_resource\n    name: r{i}\n"));
    }
    yaml
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallelism_bounds_concurrent_evaluations() {
    let rec = Arc::new(Recording {
        delay: Some(Duration::from_millis(20)),
        ..Default::default()
    });
    let report = walker(10).walk(plan_graph(&wide(25)), rec.clone()).await.unwrap();
    assert!(report.succeeded());
    let max = rec.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 10, "{max} vertices ran at once");
    assert!(max > 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallelism_of_one_is_serial() {
    let rec = Arc::new(Recording {
        delay: Some(Duration::from_millis(5)),
        ..Default::default()
    });
    let report = walker(1).walk(plan_graph(&wide(5)), rec.clone()).await.unwrap();
    assert!(report.succeeded());
    assert_eq!(rec.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn invalid_graph_is_refused() {
    let mut graph = Graph::new();
    let a = graph.add_vertex(Vertex::RootAggregator);
    let b = graph.add_vertex(Vertex::RootAggregator);
    graph.add_edge(a, b);
    graph.add_edge(b, a);
    let result = walker(10).walk(Arc::new(graph), Arc::new(NullGraphWalker)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn dropping_a_walk_stops_running_evaluations() {
    let rec = Arc::new(Recording {
        delay: Some(Duration::from_millis(200)),
        ..Default::default()
    });
    let walker = walker(10);
    let walk = walker.walk(plan_graph(DIAMOND), rec.clone());
    assert!(tokio::time::timeout(Duration::from_millis(20), walk).await.is_err());
    assert_eq!(rec.in_flight.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(rec.order().is_empty());
}
