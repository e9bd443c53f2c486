//! # Progress Store
//!
//! Append-only per-job progress logs.
//!
//! Each log has a single writer (the orchestrator task running the job) and
//! any number of concurrent readers (status queries). A reader sees whole
//! entries only, in append order.
//!
//! Two backends:
//! - `MemoryProgressStore`: process memory
//! - `FileProgressStore`: one JSON-lines file per job

mod backend;
mod file;
mod memory;
mod store;

pub use backend::ProgressBackend;
pub use file::FileProgressStore;
pub use memory::MemoryProgressStore;
pub use store::{LocalProgressStore, ProgressStore};

pub(crate) use store::ensure_appendable;
