//! Store trait and the append rule shared by all backends

use contracts::{ContractError, JobId, JobState, ProgressEntry, ProgressEvent};

/// Per-job append-only log
#[trait_variant::make(ProgressStore: Send)]
pub trait LocalProgressStore {
    /// Append one entry, creating the log on first use.
    ///
    /// # Errors
    /// - `TerminalState` if the log already ends in `Completed` or `Error`
    /// - `InvalidTransition` if the event does not advance the job
    async fn append(
        &self,
        job_id: &JobId,
        event: ProgressEvent,
    ) -> Result<ProgressEntry, ContractError>;

    /// All entries of a job in append order.
    ///
    /// # Errors
    /// `JobNotFound` if no entry was ever appended for `job_id`
    async fn read(&self, job_id: &JobId) -> Result<Vec<ProgressEntry>, ContractError>;
}

/// Check that `next` may follow the current tail of a log
pub(crate) fn ensure_appendable(
    job_id: &JobId,
    last: Option<JobState>,
    next: JobState,
) -> Result<(), ContractError> {
    let Some(prev) = last else {
        return Ok(());
    };
    if prev.is_terminal() {
        return Err(ContractError::TerminalState {
            job_id: job_id.to_string(),
            state: prev,
        });
    }
    if !next.can_follow(prev) {
        return Err(ContractError::InvalidTransition {
            job_id: job_id.to_string(),
            from: prev,
            to: next,
        });
    }
    Ok(())
}
