//! In-memory progress logs
//!
//! Map of job id to a per-job log. The outer lock is held only to find or
//! create a log; appends and reads lock the one log they touch.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use contracts::{ContractError, JobId, ProgressEntry, ProgressEvent};
use tracing::debug;

use crate::{ensure_appendable, ProgressStore};

type Log = Arc<RwLock<Vec<ProgressEntry>>>;

#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    logs: RwLock<HashMap<JobId, Log>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs with at least one entry
    pub fn job_count(&self) -> usize {
        self.logs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn log(&self, job_id: &JobId) -> Option<Log> {
        self.logs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
            .cloned()
    }

    fn log_or_create(&self, job_id: &JobId) -> Log {
        if let Some(log) = self.log(job_id) {
            return log;
        }
        self.logs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(job_id.clone())
            .or_default()
            .clone()
    }
}

impl ProgressStore for MemoryProgressStore {
    async fn append(
        &self,
        job_id: &JobId,
        event: ProgressEvent,
    ) -> Result<ProgressEntry, ContractError> {
        let log = self.log_or_create(job_id);
        let mut entries = log.write().unwrap_or_else(PoisonError::into_inner);

        ensure_appendable(job_id, entries.last().map(|e| e.state()), event.state())?;

        let entry = ProgressEntry::now(event);
        entries.push(entry.clone());
        debug!(job_id = %job_id, state = %entry.state(), "progress appended");
        Ok(entry)
    }

    async fn read(&self, job_id: &JobId) -> Result<Vec<ProgressEntry>, ContractError> {
        let log = self
            .log(job_id)
            .ok_or_else(|| ContractError::job_not_found(job_id.as_str()))?;
        let entries = log.read().unwrap_or_else(PoisonError::into_inner).clone();
        if entries.is_empty() {
            return Err(ContractError::job_not_found(job_id.as_str()));
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ArtifactRef, JobState};
    use std::time::Duration;

    fn success_path() -> Vec<ProgressEvent> {
        vec![
            ProgressEvent::Started,
            ProgressEvent::LlmDone {
                text: "hi there".into(),
            },
            ProgressEvent::AudioDone {
                audio: ArtifactRef::new("a.wav"),
            },
            ProgressEvent::FaceDone {
                composed: ArtifactRef::new("f.mp4"),
                reused: false,
            },
            ProgressEvent::Completed {
                video: ArtifactRef::new("final.mp4"),
            },
        ]
    }

    #[tokio::test]
    async fn test_append_and_read_in_order() {
        let store = MemoryProgressStore::new();
        let id: JobId = "job-1".into();
        for event in success_path() {
            store.append(&id, event).await.unwrap();
        }
        let states: Vec<_> = store
            .read(&id)
            .await
            .unwrap()
            .iter()
            .map(|e| e.state())
            .collect();
        assert_eq!(
            states,
            vec![
                JobState::Started,
                JobState::LlmDone,
                JobState::AudioDone,
                JobState::FaceDone,
                JobState::Completed
            ]
        );
        assert_eq!(store.job_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let store = MemoryProgressStore::new();
        let err = store.read(&"nope".into()).await.unwrap_err();
        assert!(matches!(err, ContractError::JobNotFound { .. }));
    }

    #[tokio::test]
    async fn test_terminal_state_is_final() {
        let store = MemoryProgressStore::new();
        let id: JobId = "job-err".into();
        store.append(&id, ProgressEvent::Started).await.unwrap();
        store
            .append(
                &id,
                ProgressEvent::Error {
                    failed_stage: None,
                    message: "boom".into(),
                },
            )
            .await
            .unwrap();

        let err = store
            .append(
                &id,
                ProgressEvent::LlmDone {
                    text: "late".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::TerminalState { .. }));
        assert_eq!(store.read(&id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_backwards_transition() {
        let store = MemoryProgressStore::new();
        let id: JobId = "job-back".into();
        store.append(&id, ProgressEvent::Started).await.unwrap();
        let err = store.append(&id, ProgressEvent::Started).await.unwrap_err();
        assert!(matches!(err, ContractError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_readers_see_prefixes() {
        let store = Arc::new(MemoryProgressStore::new());
        let id: JobId = "job-race".into();
        store.append(&id, ProgressEvent::Started).await.unwrap();

        let mut readers = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            let id = id.clone();
            readers.push(tokio::spawn(async move {
                let mut last_len = 0;
                for _ in 0..200 {
                    let entries = store.read(&id).await.unwrap();
                    assert!(entries.len() >= last_len);
                    let states: Vec<_> = entries.iter().map(|e| e.state()).collect();
                    assert!(states.windows(2).all(|w| w[1].can_follow(w[0])));
                    last_len = entries.len();
                    tokio::task::yield_now().await;
                }
            }));
        }

        for event in success_path().into_iter().skip(1) {
            store.append(&id, event).await.unwrap();
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        for reader in readers {
            reader.await.unwrap();
        }
    }
}
