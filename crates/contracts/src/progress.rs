//! Progress log entries and the job state machine
//!
//! A job's progress is an append-only sequence of `ProgressEntry`. The
//! state of the job is the state of its last entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ArtifactRef, JobId, StageKind};

/// Job lifecycle state
///
/// Serialized with the status names reported to polling clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    #[serde(rename = "started")]
    Started,
    #[serde(rename = "llm_response_completed")]
    LlmDone,
    #[serde(rename = "audio_completed")]
    AudioDone,
    #[serde(rename = "face_fusion_completed")]
    FaceDone,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "error")]
    Error,
}

impl JobState {
    /// Status name reported to clients
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::LlmDone => "llm_response_completed",
            Self::AudioDone => "audio_completed",
            Self::FaceDone => "face_fusion_completed",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// `Completed` and `Error` accept no further entries
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Position along the success path
    fn rank(&self) -> u8 {
        match self {
            Self::Started => 0,
            Self::LlmDone => 1,
            Self::AudioDone => 2,
            Self::FaceDone => 3,
            Self::Completed => 4,
            Self::Error => u8::MAX,
        }
    }

    /// Whether `self` may be appended after `prev`.
    ///
    /// Error may follow any non-terminal state; every other state must
    /// strictly advance along the success path.
    pub fn can_follow(&self, prev: JobState) -> bool {
        if prev.is_terminal() {
            return false;
        }
        match self {
            Self::Error => true,
            next => next.rank() > prev.rank(),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage outcome recorded in a progress entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Job accepted, nothing run yet
    Started,
    /// Reply text generated
    LlmDone { text: String },
    /// Reply synthesized into speech
    AudioDone { audio: ArtifactRef },
    /// Face composited into the source video
    FaceDone {
        composed: ArtifactRef,
        /// Taken from a previously prepared composite instead of a fresh call
        #[serde(default)]
        reused: bool,
    },
    /// Final lip-synced video rendered
    Completed { video: ArtifactRef },
    /// A stage failed; the job is over
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        failed_stage: Option<StageKind>,
        message: String,
    },
}

impl ProgressEvent {
    /// State the job enters when this event is appended
    pub fn state(&self) -> JobState {
        match self {
            Self::Started => JobState::Started,
            Self::LlmDone { .. } => JobState::LlmDone,
            Self::AudioDone { .. } => JobState::AudioDone,
            Self::FaceDone { .. } => JobState::FaceDone,
            Self::Completed { .. } => JobState::Completed,
            Self::Error { .. } => JobState::Error,
        }
    }
}

/// One append-only log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: ProgressEvent,
}

impl ProgressEntry {
    /// Stamp an event with the current time
    pub fn now(event: ProgressEvent) -> Self {
        Self {
            recorded_at: Utc::now(),
            event,
        }
    }

    pub fn state(&self) -> JobState {
        self.event.state()
    }
}

/// Everything known about a job, folded from its progress log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    /// State of the latest entry
    pub state: JobState,
    pub text: Option<String>,
    pub audio: Option<ArtifactRef>,
    pub composed: Option<ArtifactRef>,
    pub video: Option<ArtifactRef>,
    pub error: Option<String>,
    pub failed_stage: Option<StageKind>,
    pub updated_at: DateTime<Utc>,
    /// Number of entries folded
    pub entries: usize,
}

impl JobSnapshot {
    /// Fold a progress log. Returns `None` for an empty log.
    pub fn from_entries(job_id: JobId, entries: &[ProgressEntry]) -> Option<Self> {
        let last = entries.last()?;
        let mut snapshot = Self {
            job_id,
            state: last.state(),
            text: None,
            audio: None,
            composed: None,
            video: None,
            error: None,
            failed_stage: None,
            updated_at: last.recorded_at,
            entries: entries.len(),
        };

        for entry in entries {
            match &entry.event {
                ProgressEvent::Started => {}
                ProgressEvent::LlmDone { text } => snapshot.text = Some(text.clone()),
                ProgressEvent::AudioDone { audio } => snapshot.audio = Some(audio.clone()),
                ProgressEvent::FaceDone { composed, .. } => {
                    snapshot.composed = Some(composed.clone())
                }
                ProgressEvent::Completed { video } => snapshot.video = Some(video.clone()),
                ProgressEvent::Error {
                    failed_stage,
                    message,
                } => {
                    snapshot.error = Some(message.clone());
                    snapshot.failed_stage = *failed_stage;
                }
            }
        }

        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        assert!(JobState::LlmDone.can_follow(JobState::Started));
        assert!(JobState::FaceDone.can_follow(JobState::AudioDone));
        assert!(JobState::Error.can_follow(JobState::FaceDone));
        assert!(!JobState::Started.can_follow(JobState::Started));
        assert!(!JobState::AudioDone.can_follow(JobState::FaceDone));
        assert!(!JobState::Error.can_follow(JobState::Error));
        assert!(!JobState::LlmDone.can_follow(JobState::Completed));
    }

    #[test]
    fn test_entry_json_shape() {
        let entry = ProgressEntry::now(ProgressEvent::AudioDone {
            audio: ArtifactRef::new("speech.wav"),
        });
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["stage"], "audio_done");
        assert_eq!(json["audio"], "speech.wav");
        assert!(json["recorded_at"].is_string());

        let back: ProgressEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_snapshot_fold() {
        let id: JobId = "job".into();
        assert!(JobSnapshot::from_entries(id.clone(), &[]).is_none());

        let entries = vec![
            ProgressEntry::now(ProgressEvent::Started),
            ProgressEntry::now(ProgressEvent::LlmDone {
                text: "hi there".into(),
            }),
            ProgressEntry::now(ProgressEvent::AudioDone {
                audio: ArtifactRef::new("a.wav"),
            }),
            ProgressEntry::now(ProgressEvent::Error {
                failed_stage: Some(StageKind::FaceCompose),
                message: "Face composition failed: boom".into(),
            }),
        ];
        let snapshot = JobSnapshot::from_entries(id, &entries).unwrap();
        assert_eq!(snapshot.state, JobState::Error);
        assert_eq!(snapshot.text.as_deref(), Some("hi there"));
        assert_eq!(snapshot.audio, Some(ArtifactRef::new("a.wav")));
        assert_eq!(snapshot.failed_stage, Some(StageKind::FaceCompose));
        assert_eq!(snapshot.entries, 4);
    }
}
