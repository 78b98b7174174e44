mod common;

use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use strata_core::{Action, Change, InstanceAddr, ResourceInstanceState, State};
use strata_exec::executor::{ReconcileError, Reconciler, SharedState};
use strata_exec::{Inputs, WalkStatus};
use strata_store::{MemoryStore, StateStore};

use common::{attrs, config, engine, MockProvider};

fn addr(s: &str) -> InstanceAddr {
    s.parse().unwrap()
}

fn shared_with(address: &str, value: serde_json::Value) -> SharedState {
    let mut state = State::new();
    state.insert(addr(address), ResourceInstanceState::new(attrs(value)));
    SharedState::new(state)
}

#[tokio::test]
async fn delete_of_absent_instance_is_a_no_op() {
    let provider = MockProvider::new();
    let state = SharedState::new(State::new());
    let change = Change::delete(addr("null_resource.a"), attrs(json!({"id": "x"})));

    Reconciler::new(&provider, &state).apply(&change).await.unwrap();
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn create_over_existing_object_is_refused() {
    let provider = MockProvider::new();
    let state = shared_with("null_resource.a", json!({"id": "x"}));
    let change = Change::create(addr("null_resource.a"), attrs(json!({"name": "a"})));

    let err = Reconciler::new(&provider, &state).apply(&change).await.unwrap_err();
    assert!(matches!(err, ReconcileError::AlreadyExists(_)));
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn update_against_changed_state_is_stale() {
    let provider = MockProvider::new();
    let state = shared_with("null_resource.a", json!({"id": "x", "size": 3}));
    let change = Change::update(
        addr("null_resource.a"),
        attrs(json!({"id": "x", "size": 1})),
        attrs(json!({"id": "x", "size": 2})),
    );

    let err = Reconciler::new(&provider, &state).apply(&change).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Stale(_)));
}

#[tokio::test]
async fn update_of_missing_object_fails() {
    let provider = MockProvider::new();
    let state = SharedState::new(State::new());
    let change = Change::update(
        addr("null_resource.a"),
        attrs(json!({"size": 1})),
        attrs(json!({"size": 2})),
    );

    let err = Reconciler::new(&provider, &state).apply(&change).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Missing(_)));
}

#[tokio::test]
async fn created_objects_record_their_provider() {
    let provider = MockProvider::new();
    let state = SharedState::new(State::new());
    let change = Change::create(addr("null_resource.a"), attrs(json!({"name": "a"})));

    Reconciler::new(&provider, &state)
        .with_provider_name("provider.null")
        .apply(&change)
        .await
        .unwrap();
    let stored = state.get(&addr("null_resource.a")).unwrap();
    assert_eq!(stored.provider.as_deref(), Some("provider.null"));
    assert_eq!(stored.attributes["name"], json!("a"));
    assert!(stored.attributes.contains_key("id"));
    assert_eq!(provider.calls(), vec![("null_resource.a".to_string(), Action::Create)]);
}

#[tokio::test]
async fn apply_with_store_persists_once_and_bumps_serial() {
    let provider = Arc::new(MockProvider::new());
    let engine = engine(provider);
    let store = MemoryStore::new();
    let cfg = config(
        r#"
resources:
  - type: null_resource
    name: a
"#,
    );

    let prior = store.load().await.unwrap();
    let plan = engine
        .plan(&cfg, &prior, &Inputs::new(), CancellationToken::new())
        .await
        .unwrap();
    let outcome = engine
        .apply_with_store(&store, &cfg, &plan.diff, &Inputs::new(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.report.status, WalkStatus::Succeeded);
    assert_eq!(store.persist_count(), 1);
    let stored = store.snapshot().await.unwrap();
    assert_eq!(stored.serial, prior.serial + 1);
    assert_eq!(stored.lineage, prior.lineage);
    assert!(stored.contains(&addr("null_resource.a")));

    // Nothing changes the second time, so the serial stays put.
    let replan = engine
        .plan(&cfg, &stored, &Inputs::new(), CancellationToken::new())
        .await
        .unwrap();
    assert!(replan.diff.is_no_op());
    engine
        .apply_with_store(&store, &cfg, &replan.diff, &Inputs::new(), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(store.persist_count(), 2);
    assert_eq!(store.snapshot().await.unwrap().serial, stored.serial);
}

#[tokio::test]
async fn no_op_change_leaves_state_untouched() {
    let provider = MockProvider::new();
    let state = shared_with("null_resource.a", json!({"id": "x", "size": 1}));
    let before = state.snapshot();
    let change = Change::no_op(addr("null_resource.a"), Some(attrs(json!({"id": "x", "size": 1}))));

    Reconciler::new(&provider, &state).apply(&change).await.unwrap();
    assert!(provider.calls().is_empty());
    assert_eq!(state.snapshot(), before);
}

#[tokio::test]
async fn create_then_delete_restores_the_original_state() {
    let provider = MockProvider::new();
    let state = SharedState::new(State::new());
    let before = state.snapshot();
    let reconciler = Reconciler::new(&provider, &state);

    reconciler
        .apply(&Change::create(addr("null_resource.a"), attrs(json!({"name": "a"}))))
        .await
        .unwrap();
    let created = state.get(&addr("null_resource.a")).unwrap();

    reconciler
        .apply(&Change::delete(addr("null_resource.a"), created.attributes))
        .await
        .unwrap();
    assert!(!state.contains(&addr("null_resource.a")));
    assert!(state.snapshot().same_content(&before));
    assert_eq!(
        provider.calls_for("null_resource.a"),
        vec![Action::Create, Action::Delete]
    );
}
