//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Job Model
//! - A `Job` is immutable once submitted; its only mutable shadow is the
//!   append-only progress log keyed by `JobId`
//! - Stage outputs travel between stages as `ArtifactRef` file names

mod blueprint;
mod error;
mod job;
mod job_id;
mod progress;
mod stage;

pub use blueprint::*;
pub use error::*;
pub use job::*;
pub use job_id::JobId;
pub use progress::*;
pub use stage::*;
