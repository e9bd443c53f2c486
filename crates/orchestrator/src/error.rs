//! Scheduler error types

use contracts::ContractError;
use thiserror::Error;

/// Errors surfaced synchronously to callers of `JobScheduler`
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The dispatcher no longer accepts work
    #[error("scheduler is shutting down")]
    ShuttingDown,

    /// Validation, queue or store error (from contract)
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl SchedulerError {
    /// The underlying contract error, if any
    pub fn as_contract(&self) -> Option<&ContractError> {
        match self {
            Self::Contract(e) => Some(e),
            Self::ShuttingDown => None,
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, SchedulerError>;
