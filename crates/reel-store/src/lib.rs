//! Video record persistence.
//!
//! This crate provides:
//! - The `VideoStore` trait the pipeline and API persist through
//! - A JSON-file store with atomic rewrites
//! - An in-memory store for tests and ephemeral deployments
//! - Record deletion that also removes the backing deliverable files

pub mod error;
pub mod json_file;
pub mod memory;
pub mod metrics;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use store::{delete_video, VideoStore};
