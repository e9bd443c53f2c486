//! Request and response bodies

use contracts::{ArtifactRef, ChatMessage, JobSnapshot, JobState};
use observability::StageMetricsSummary;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Composite material id, `video_face_voice`
    #[serde(default)]
    pub video_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatAccepted {
    pub job_id: String,
    pub status: String,
    pub message: String,
}

/// Polling view of a job. Which optional fields are set depends on `status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStatusResponse {
    pub job_id: String,
    pub status: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatStatusResponse {
    pub fn from_snapshot(snapshot: JobSnapshot, output_prefix: &str) -> Self {
        let url = |artifact: Option<ArtifactRef>| {
            artifact.map(|a| format!("{}/{}", output_prefix.trim_end_matches('/'), a))
        };

        let mut response = Self {
            job_id: snapshot.job_id.to_string(),
            status: snapshot.state,
            text: None,
            audio_url: None,
            video_url: None,
            error: None,
        };
        match snapshot.state {
            JobState::Started => {}
            JobState::LlmDone => response.text = snapshot.text,
            JobState::AudioDone | JobState::FaceDone => {
                response.text = snapshot.text;
                response.audio_url = url(snapshot.audio);
            }
            JobState::Completed => response.video_url = url(snapshot.video),
            JobState::Error => {
                response.error = Some(
                    snapshot
                        .error
                        .unwrap_or_else(|| "Unknown error".to_string()),
                )
            }
        }
        response
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareRequest {
    pub source_video: String,
    pub target_face: String,
    #[serde(default)]
    pub voice_sample: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub video_id: String,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub queue_capacity: usize,
    #[serde(flatten)]
    pub metrics: StageMetricsSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{JobId, ProgressEntry, ProgressEvent};

    fn snapshot_of(events: Vec<ProgressEvent>) -> JobSnapshot {
        let entries: Vec<_> = events.into_iter().map(ProgressEntry::now).collect();
        JobSnapshot::from_entries(JobId::from("job-1"), &entries).unwrap()
    }

    #[test]
    fn test_status_fields_follow_state() {
        let started =
            ChatStatusResponse::from_snapshot(snapshot_of(vec![ProgressEvent::Started]), "/data/output");
        let json = serde_json::to_value(&started).unwrap();
        assert_eq!(json, serde_json::json!({"job_id": "job-1", "status": "started"}));

        let audio = ChatStatusResponse::from_snapshot(
            snapshot_of(vec![
                ProgressEvent::Started,
                ProgressEvent::LlmDone {
                    text: "hi there".into(),
                },
                ProgressEvent::AudioDone {
                    audio: ArtifactRef::new("speech_1.wav"),
                },
            ]),
            "/data/output/",
        );
        assert_eq!(audio.text.as_deref(), Some("hi there"));
        assert_eq!(audio.audio_url.as_deref(), Some("/data/output/speech_1.wav"));
        assert_eq!(audio.video_url, None);
    }

    #[test]
    fn test_completed_and_error_views() {
        let done = ChatStatusResponse::from_snapshot(
            snapshot_of(vec![
                ProgressEvent::Started,
                ProgressEvent::Completed {
                    video: ArtifactRef::new("final_xyz.mp4"),
                },
            ]),
            "/data/output",
        );
        let json = serde_json::to_value(&done).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["video_url"], "/data/output/final_xyz.mp4");
        assert!(json.get("text").is_none());

        let failed = ChatStatusResponse::from_snapshot(
            snapshot_of(vec![
                ProgressEvent::Started,
                ProgressEvent::Error {
                    failed_stage: None,
                    message: "Speech synthesis failed: HTTP 500".into(),
                },
            ]),
            "/data/output",
        );
        assert_eq!(failed.status, JobState::Error);
        assert_eq!(failed.error.as_deref(), Some("Speech synthesis failed: HTTP 500"));
    }
}
