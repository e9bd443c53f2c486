//! Job - one end-to-end pipeline run
//!
//! A job is created by the scheduler at submission time and handed to exactly
//! one orchestrator task, which only reads it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::JobId;

/// One conversation turn supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Speaker role ("system", "user", "assistant")
    pub role: String,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

/// Input asset file names, relative to the source directory.
///
/// Existence is checked before a `Job` is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInputs {
    /// Source video (e.g. "vid1.mp4")
    pub source_video: String,
    /// Target face image (e.g. "face1.jpg")
    pub target_face: String,
    /// Reference voice sample (e.g. "voice1.wav")
    pub voice_sample: String,
}

/// Immutable description of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub inputs: JobInputs,
    pub messages: Vec<ChatMessage>,
}

/// Reference to a media file produced by a stage.
///
/// Holds the bare file name inside the output directory, never a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Build a reference from a path reported by a stage service.
    ///
    /// Services answer with paths under their own mount point; only the last
    /// segment is meaningful to us. Returns `None` for an empty segment.
    pub fn from_service_path(path: &str) -> Option<Self> {
        let name = path
            .trim_end_matches(['/', '\\'])
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default();
        if name.is_empty() {
            None
        } else {
            Some(Self(name.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_from_service_path() {
        let a = ArtifactRef::from_service_path("/workspace/data/output/final_xyz.mp4").unwrap();
        assert_eq!(a.as_str(), "final_xyz.mp4");

        let a = ArtifactRef::from_service_path("speech_1.wav").unwrap();
        assert_eq!(a.as_str(), "speech_1.wav");

        assert!(ArtifactRef::from_service_path("").is_none());
        assert!(ArtifactRef::from_service_path("/").is_none());
    }

    #[test]
    fn test_chat_message_serde() {
        let msg: ChatMessage =
            serde_json::from_str(r#"{"role":"user","content":"hello"}"#).unwrap();
        assert_eq!(msg, ChatMessage::user("hello"));
    }
}
