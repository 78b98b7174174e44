#![forbid(unsafe_code)]

pub mod file;
pub mod memory;
pub mod store;

pub use crate::file::{FileStore, ENGINE_VERSION};
pub use crate::memory::MemoryStore;
pub use crate::store::{StateStore, StoreError};
