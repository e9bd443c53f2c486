//! # Orchestrator
//!
//! Runs chat jobs through the stage pipeline.
//!
//! ## Features
//!
//! - Asset resolution from composite ids
//! - Per-job state machine with optional parallel media stages
//! - Bounded job queue with a concurrency limit
//! - Reuse of prepared face composites
//!
//! ## Usage
//!
//! ```ignore
//! let orchestrator = PipelineOrchestrator::new(clients, store, catalog)
//!     .with_media_mode(blueprint.scheduler.media_stages);
//! let (scheduler, handle) = JobScheduler::start(&blueprint.scheduler, orchestrator);
//!
//! let job_id = scheduler.submit(messages, Some("vid1.mp4_face1.jpg_voice1.wav")).await?;
//! let snapshot = scheduler.status(&job_id).await?;
//!
//! handle.shutdown().await;
//! ```

pub mod assets;
pub mod error;
pub mod pipeline;
pub mod prepared;
pub mod scheduler;

pub use assets::{AssetCatalog, MaterialId};
pub use error::SchedulerError;
pub use pipeline::PipelineOrchestrator;
pub use prepared::PreparedComposites;
pub use scheduler::{DispatcherHandle, JobScheduler, PrepareOutcome, PrepareTask, WorkItem};
