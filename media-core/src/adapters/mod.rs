//! In-process reference adapters for the port contracts.
//!
//! These back the `local` backend and the test suites. Durable equivalents
//! live in adapter crates (`media-storage-libsql` for the database and
//! queue); cloud object stores and real recognition engines are wired by
//! the deployment.

pub mod database;
pub mod object_store;
pub mod queue;

pub use database::MemoryDatabase;
pub use object_store::MemoryObjectStore;
pub use queue::MemoryQueue;
