#![forbid(unsafe_code)]

//! Concurrent execution for strata graphs.
//!
//! Graph construction lives in `strata-core`; this crate walks those graphs,
//! talks to providers and reconciles state.

pub mod engine;
pub mod executor;
pub mod provider;

pub use crate::engine::{ApplyOutcome, Engine, EngineError, PlanOutcome};
pub use crate::executor::{
    ContextGraphWalker, EngineConfig, Event, EventSink, GraphWalker, Inputs, VertexStatus,
    WalkReport, WalkStatus, Walker,
};
pub use crate::provider::{
    ApplyResponse, PlanRequest, PlanResponse, Provider, ProviderError, ProviderRegistry,
};
