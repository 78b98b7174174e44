#![forbid(unsafe_code)]

pub mod addrs;
pub mod builder;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod expressions;
pub mod graph;
pub mod plans;
pub mod references;
pub mod states;
pub mod transform;

pub use crate::addrs::{Address, InstanceAddr, InstanceKey, ModulePath, ProviderAddr, ResourceAddr};
pub use crate::builder::{ApplyGraphBuilder, BasicGraphBuilder, PlanGraphBuilder};
pub use crate::config::{Attributes, Config, Module};
pub use crate::diagnostics::{Diagnostic, Diagnostics, Severity};
pub use crate::error::{BuildError, GraphError, TransformError};
pub use crate::graph::{Graph, Vertex, VertexId};
pub use crate::plans::{Action, Change, Diff, DiffError, ReplaceOrder};
pub use crate::references::ReferenceIndex;
pub use crate::states::{OutputValue, ResourceInstanceState, State};
pub use crate::transform::GraphTransformer;
