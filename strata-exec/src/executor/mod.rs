pub mod concurrency;
pub mod eval;
pub mod events;
pub mod interpolate;
pub mod reconcile;
mod result;
pub mod state;
mod types;
pub mod walker;

pub use concurrency::{ConcurrencyLimits, ConcurrencyPermit};
pub use eval::{ContextGraphWalker, Inputs, WalkOperation};
pub use events::{CompositeEventSink, Event, EventSink, NoOpEventSink, TracingEventSink};
pub use reconcile::{ReconcileError, Reconciler};
pub use result::{EvalError, VertexStatus, WalkError, WalkReport, WalkStatus};
pub use state::SharedState;
pub use types::{ConfigError, EngineConfig, DEFAULT_PARALLELISM};
pub use walker::{GraphWalker, NullGraphWalker, Walker};
