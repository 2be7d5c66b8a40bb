#![cfg_attr(test, allow(clippy::expect_used))]

//! # Media Storage — libSQL
//!
//! Durable storage backend for the media pipeline: a [`LibsqlDatabase`]
//! implementing the core's database port over a local libSQL file, and a
//! [`LibsqlQueue`] implementing the job queue port over the
//! `transcription_jobs` table so queued work survives restarts.
//!
//! ```no_run
//! use media_storage_libsql::{LibsqlDatabase, LibsqlQueue};
//!
//! # async fn example() -> media_core::Result<()> {
//! let db = LibsqlDatabase::connect("./media.db").await?;
//! let queue = LibsqlQueue::new(db.connection());
//! # Ok(())
//! # }
//! ```

pub mod queue;
pub mod schema;
pub mod storage;

pub use queue::LibsqlQueue;
pub use storage::LibsqlDatabase;

#[cfg(test)]
mod tests;
