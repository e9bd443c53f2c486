//! Layered error definitions
//!
//! Categorized by source: config / submission / stage / progress

use thiserror::Error;

use crate::{JobState, StageKind};

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Submission Errors =====
    /// A referenced input asset is not present in the source directory
    #[error("{kind} {name} not found")]
    AssetNotFound { kind: String, name: String },

    /// A mandatory request field is absent
    #[error("{field} is required")]
    MissingRequiredInput { field: String },

    /// A request field is present but malformed
    #[error("invalid {field}: {message}")]
    InvalidInput { field: String, message: String },

    /// The job queue has no free slot
    #[error("job queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    // ===== Stage Errors =====
    /// Backend answered with a failure, or could not be reached
    #[error("{}: {message}", .stage.failure_label())]
    Upstream {
        stage: StageKind,
        status: Option<u16>,
        message: String,
    },

    /// Backend did not answer within the stage deadline
    #[error("{}: timed out after {deadline_secs}s", .stage.failure_label())]
    StageTimeout { stage: StageKind, deadline_secs: u64 },

    // ===== Progress Errors =====
    /// No progress log exists for the job id
    #[error("job not found: {job_id}")]
    JobNotFound { job_id: String },

    /// Job already reached a terminal state
    #[error("job {job_id} is already {state}")]
    TerminalState { job_id: String, state: JobState },

    /// Entry would move the job backwards
    #[error("job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: JobState,
        to: JobState,
    },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create asset not found error
    pub fn asset_not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::AssetNotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create missing input error
    pub fn missing_input(field: impl Into<String>) -> Self {
        Self::MissingRequiredInput {
            field: field.into(),
        }
    }

    /// Create invalid input error
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create upstream failure without an HTTP status (transport or decode error)
    pub fn upstream(stage: StageKind, message: impl Into<String>) -> Self {
        Self::Upstream {
            stage,
            status: None,
            message: message.into(),
        }
    }

    /// Create job not found error
    pub fn job_not_found(job_id: impl Into<String>) -> Self {
        Self::JobNotFound {
            job_id: job_id.into(),
        }
    }

    /// Stage that produced this error, if it came from a stage call
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            Self::Upstream { stage, .. } | Self::StageTimeout { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// True for errors raised while validating a submission
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::AssetNotFound { .. }
                | Self::MissingRequiredInput { .. }
                | Self::InvalidInput { .. }
                | Self::JobNotFound { .. }
        )
    }
}
