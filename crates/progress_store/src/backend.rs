//! Configuration-selected backend

use contracts::{
    ContractError, JobId, JobSnapshot, ProgressBackendKind, ProgressEntry, ProgressEvent,
    ServiceBlueprint,
};
use tracing::info;

use crate::{FileProgressStore, MemoryProgressStore, ProgressStore};

/// Backend selected by configuration
#[derive(Debug)]
pub enum ProgressBackend {
    Memory(MemoryProgressStore),
    File(FileProgressStore),
}

impl ProgressBackend {
    pub fn memory() -> Self {
        Self::Memory(MemoryProgressStore::new())
    }

    /// Open the backend named in `[progress]`
    pub async fn from_blueprint(blueprint: &ServiceBlueprint) -> Result<Self, ContractError> {
        let backend = match blueprint.progress.backend {
            ProgressBackendKind::Memory => Self::memory(),
            ProgressBackendKind::File => {
                Self::File(FileProgressStore::open(blueprint.progress_dir()).await?)
            }
        };
        info!(backend = backend.kind_name(), "progress store ready");
        Ok(backend)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::File(_) => "file",
        }
    }

    /// Fold the job's log into a snapshot
    pub async fn snapshot(&self, job_id: &JobId) -> Result<JobSnapshot, ContractError> {
        let entries = self.read(job_id).await?;
        JobSnapshot::from_entries(job_id.clone(), &entries)
            .ok_or_else(|| ContractError::job_not_found(job_id.as_str()))
    }
}

impl ProgressStore for ProgressBackend {
    async fn append(
        &self,
        job_id: &JobId,
        event: ProgressEvent,
    ) -> Result<ProgressEntry, ContractError> {
        match self {
            Self::Memory(store) => store.append(job_id, event).await,
            Self::File(store) => store.append(job_id, event).await,
        }
    }

    async fn read(&self, job_id: &JobId) -> Result<Vec<ProgressEntry>, ContractError> {
        match self {
            Self::Memory(store) => store.read(job_id).await,
            Self::File(store) => store.read(job_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ArtifactRef, JobState};

    #[tokio::test]
    async fn test_backend_snapshot() {
        let backend = ProgressBackend::memory();
        let id = JobId::generate();
        assert!(matches!(
            backend.snapshot(&id).await,
            Err(ContractError::JobNotFound { .. })
        ));

        backend.append(&id, ProgressEvent::Started).await.unwrap();
        backend
            .append(
                &id,
                ProgressEvent::LlmDone {
                    text: "hi there".into(),
                },
            )
            .await
            .unwrap();
        backend
            .append(
                &id,
                ProgressEvent::AudioDone {
                    audio: ArtifactRef::new("speech_0.wav"),
                },
            )
            .await
            .unwrap();

        let snapshot = backend.snapshot(&id).await.unwrap();
        assert_eq!(snapshot.state, JobState::AudioDone);
        assert_eq!(snapshot.text.as_deref(), Some("hi there"));
        assert_eq!(snapshot.entries, 3);
    }

    #[tokio::test]
    async fn test_from_blueprint_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let mut bp = ServiceBlueprint::default();
        bp.progress.backend = ProgressBackendKind::File;
        bp.progress.dir = Some(dir.path().join("progress"));

        let backend = ProgressBackend::from_blueprint(&bp).await.unwrap();
        assert_eq!(backend.kind_name(), "file");
        assert!(dir.path().join("progress").is_dir());
    }
}
