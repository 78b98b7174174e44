//! Graph construction passes.
//!
//! Each pass mutates the graph in place. Builders run them in a fixed order
//! and keep going after a failing pass so every configuration problem is
//! reported in one build.

mod config;
mod diff;
mod moved;
mod orphan;
mod provider;
mod reference;
mod root;

pub use config::ConfigTransformer;
pub use diff::DiffTransformer;
pub use moved::MovedTransformer;
pub use orphan::OrphanTransformer;
pub use provider::{MissingProviderTransformer, ProviderTransformer};
pub use reference::ReferenceTransformer;
pub use root::RootTransformer;

use crate::error::TransformError;
use crate::graph::Graph;

pub trait GraphTransformer {
    fn name(&self) -> &'static str;

    fn transform(&self, graph: &mut Graph) -> Result<(), TransformError>;
}
