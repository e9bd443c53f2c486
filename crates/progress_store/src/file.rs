//! File-backed progress logs
//!
//! Layout: `{dir}/{job_id}.progress.jsonl`, one JSON object per line.
//! Each entry is written with a single `write_all` of the full line
//! including its newline, on a file opened in append mode. Readers only
//! trust newline-terminated lines, so a write in flight is never observed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};

use contracts::{ContractError, JobId, JobState, ProgressEntry, ProgressEvent};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::{ensure_appendable, ProgressStore};

const LOG_SUFFIX: &str = ".progress.jsonl";

/// Last known state of one job's log; `None` until loaded from disk
type Tail = Arc<Mutex<Option<Option<JobState>>>>;

#[derive(Debug)]
pub struct FileProgressStore {
    dir: PathBuf,
    tails: std::sync::Mutex<HashMap<JobId, Tail>>,
}

impl FileProgressStore {
    /// Open (and create if needed) the log directory
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, ContractError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            tails: std::sync::Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a job's log; ids unsafe as file names are rejected
    fn log_path(&self, job_id: &JobId) -> Option<PathBuf> {
        job_id
            .is_well_formed()
            .then(|| self.dir.join(format!("{job_id}{LOG_SUFFIX}")))
    }

    fn tail(&self, job_id: &JobId) -> Tail {
        self.tails
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(job_id.clone())
            .or_default()
            .clone()
    }

    /// Drop a finished job's tail; later appends reload it from disk
    fn forget(&self, job_id: &JobId) {
        self.tails
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(job_id);
    }

    async fn load(path: &Path) -> Result<Option<Vec<ProgressEntry>>, ContractError> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(Some(parse_complete_lines(path, &content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Parse every newline-terminated line; a trailing fragment is ignored
fn parse_complete_lines(path: &Path, content: &str) -> Result<Vec<ProgressEntry>, ContractError> {
    content
        .split_inclusive('\n')
        .filter(|line| line.ends_with('\n'))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str(line).map_err(|e| {
                ContractError::Other(format!("corrupt progress log {}: {e}", path.display()))
            })
        })
        .collect()
}

impl ProgressStore for FileProgressStore {
    #[instrument(name = "file_progress_append", skip_all, fields(job_id = %job_id))]
    async fn append(
        &self,
        job_id: &JobId,
        event: ProgressEvent,
    ) -> Result<ProgressEntry, ContractError> {
        let path = self.log_path(job_id).ok_or_else(|| {
            ContractError::invalid_input("job_id", format!("'{job_id}' is not a valid job id"))
        })?;

        let tail = self.tail(job_id);
        let mut tail = tail.lock().await;
        let last = match *tail {
            Some(last) => last,
            None => Self::load(&path)
                .await?
                .and_then(|entries| entries.last().map(ProgressEntry::state)),
        };

        if let Err(e) = ensure_appendable(job_id, last, event.state()) {
            if last.is_some_and(|state| state.is_terminal()) {
                self.forget(job_id);
            }
            return Err(e);
        }

        let entry = ProgressEntry::now(event);
        let mut line = serde_json::to_vec(&entry)
            .map_err(|e| ContractError::Other(format!("progress entry encode error: {e}")))?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        *tail = Some(Some(entry.state()));
        if entry.state().is_terminal() {
            self.forget(job_id);
        }
        debug!(state = %entry.state(), "progress appended");
        Ok(entry)
    }

    async fn read(&self, job_id: &JobId) -> Result<Vec<ProgressEntry>, ContractError> {
        let not_found = || ContractError::job_not_found(job_id.as_str());
        let path = self.log_path(job_id).ok_or_else(not_found)?;
        match Self::load(&path).await? {
            Some(entries) if !entries.is_empty() => Ok(entries),
            _ => Err(not_found()),
        }
    }
}
