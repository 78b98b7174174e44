mod common;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use strata_core::{Action, State};
use strata_exec::executor::{CompositeEventSink, TracingEventSink};
use strata_exec::{Event, EventSink, Inputs, WalkStatus};

use common::{config, engine, Failure, MockProvider};

#[derive(Default)]
struct Collect {
    events: Arc<Mutex<Vec<Event>>>,
}

#[async_trait]
impl EventSink for Collect {
    async fn emit(&self, event: Event) {
        self.events.lock().await.push(event);
    }
}

#[tokio::test]
async fn walk_emits_lifecycle_events_in_order() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let events = Arc::new(Mutex::new(Vec::new()));
    let mut sink = CompositeEventSink::new();
    sink.add(Box::new(Collect {
        events: events.clone(),
    }));
    sink.add(Box::new(TracingEventSink));

    let provider = Arc::new(MockProvider::new());
    provider.fail_on("null_resource.a", Action::Create, Failure::Error);
    let engine = engine(provider).with_event_sink(Arc::new(sink));
    let cfg = config(
        r#"
resources:
  - type: null_resource
    name: a
  - type: null_resource
    name: b
    depends_on: [null_resource.a]
"#,
    );

    let plan = engine
        .plan(&cfg, &State::new(), &Inputs::new(), CancellationToken::new())
        .await
        .unwrap();
    events.lock().await.clear();
    engine
        .apply(&cfg, State::new(), &plan.diff, &Inputs::new(), CancellationToken::new())
        .await
        .unwrap();

    let events = events.lock().await;
    assert!(matches!(
        events.first(),
        Some(Event::WalkStarted { operation: "apply", .. })
    ));
    assert!(matches!(
        events.last(),
        Some(Event::WalkFinished {
            status: WalkStatus::Failed,
            ..
        })
    ));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::VertexFailed { vertex, .. } if vertex == "null_resource.a"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        Event::VertexSkipped { vertex, reason: "dependency failed", .. } if vertex == "null_resource.b"
    )));
    assert!(!events.iter().any(|e| matches!(
        e,
        Event::VertexStarted { vertex, .. } if vertex == "null_resource.b"
    )));

    let started = events
        .iter()
        .filter(|e| matches!(e, Event::VertexStarted { .. }))
        .count();
    let finished = events
        .iter()
        .filter(|e| matches!(e, Event::VertexSucceeded { .. } | Event::VertexFailed { .. }))
        .count();
    assert_eq!(started, finished);
}
