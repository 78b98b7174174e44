#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Barrier;

use strata_core::{Action, Attributes, Change, Config, ReplaceOrder};
use strata_exec::{
    ApplyResponse, Engine, EngineConfig, PlanRequest, PlanResponse, Provider, ProviderError,
    ProviderRegistry,
};

pub fn config(yaml: &str) -> Config {
    serde_yaml::from_str(yaml).unwrap()
}

pub fn attrs(value: serde_json::Value) -> Attributes {
    serde_json::from_value(value).unwrap()
}

#[derive(Debug, Clone)]
pub enum Failure {
    Error,
    /// Fail, but report these attributes as what now exists.
    Partial(serde_json::Value),
}

/// In-memory provider that records calls and fails on demand.
#[derive(Default)]
pub struct MockProvider {
    calls: Mutex<Vec<(String, Action)>>,
    failures: Mutex<BTreeMap<(String, Action), Failure>>,
    /// Attributes that cannot change in place.
    pub force_new: BTreeSet<String>,
    pub replace_order: Option<ReplaceOrder>,
    pub delay: Option<Duration>,
    pub barrier: Option<Arc<Barrier>>,
    next_id: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn force_new(mut self, attr: &str) -> Self {
        self.force_new.insert(attr.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_barrier(mut self, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }

    pub fn fail_on(&self, address: &str, action: Action, failure: Failure) {
        self.failures
            .lock()
            .unwrap()
            .insert((address.to_string(), action), failure);
    }

    pub fn calls(&self) -> Vec<(String, Action)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, address: &str) -> Vec<Action> {
        self.calls()
            .into_iter()
            .filter(|(a, _)| a == address)
            .map(|(_, action)| action)
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn plan(&self, request: PlanRequest) -> Result<PlanResponse, ProviderError> {
        let requires_replace = match &request.prior {
            Some(prior) => self
                .force_new
                .iter()
                .any(|k| request.config.contains_key(k) && prior.get(k) != request.config.get(k)),
            None => false,
        };
        let mut planned_state = request.prior.unwrap_or_default();
        planned_state.extend(request.config);
        Ok(PlanResponse {
            planned_state,
            requires_replace,
        })
    }

    async fn apply(&self, change: &Change) -> ApplyResponse {
        let address = change.address.to_string();
        self.calls
            .lock()
            .unwrap()
            .push((address.clone(), change.action));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let failure = self
            .failures
            .lock()
            .unwrap()
            .get(&(address.clone(), change.action))
            .cloned();
        match failure {
            Some(Failure::Error) => return ApplyResponse::failed(format!("{address} exploded")),
            Some(Failure::Partial(value)) => {
                return ApplyResponse::partial(attrs(value), format!("{address} half done"))
            }
            None => {}
        }

        match change.action {
            Action::Delete => ApplyResponse::ok(None),
            Action::Create => {
                let mut state = change.after.clone().unwrap_or_default();
                let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                state.insert("id".into(), json!(format!("id-{n}")));
                ApplyResponse::ok(Some(state))
            }
            _ => ApplyResponse::ok(change.after.clone()),
        }
    }

    fn replace_order(&self, _resource_type: &str) -> Option<ReplaceOrder> {
        self.replace_order
    }
}

pub fn registry(provider: Arc<MockProvider>) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register_instance("null", provider);
    registry
}

pub fn engine(provider: Arc<MockProvider>) -> Engine {
    Engine::new(EngineConfig::default(), registry(provider))
}
