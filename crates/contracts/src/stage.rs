//! Stage client traits - the typed boundary to each backend service
//!
//! Every call is exactly one request to the backend. Implementations must not
//! retry: a stage is long-running GPU work, and a retry decision belongs to
//! whoever resubmits the job.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ArtifactRef, ChatMessage, ContractError};

/// The four processing stages, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Llm,
    Tts,
    FaceCompose,
    LipSync,
}

impl StageKind {
    pub const ALL: [StageKind; 4] = [
        StageKind::Llm,
        StageKind::Tts,
        StageKind::FaceCompose,
        StageKind::LipSync,
    ];

    /// Name used in logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::Tts => "tts",
            Self::FaceCompose => "face_compose",
            Self::LipSync => "lip_sync",
        }
    }

    /// Human-readable prefix for failure messages shown to clients
    pub fn failure_label(&self) -> &'static str {
        match self {
            Self::Llm => "Failed to get response from LLM",
            Self::Tts => "Speech synthesis failed",
            Self::FaceCompose => "Face composition failed",
            Self::LipSync => "Lip sync failed",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reply generation from the conversation so far
#[trait_variant::make(LanguageModel: Send)]
pub trait LocalLanguageModel {
    /// Generate the assistant reply for `messages`
    ///
    /// # Errors
    /// `Upstream` on a non-success answer, `StageTimeout` past the deadline
    async fn generate_reply(&self, messages: &[ChatMessage]) -> Result<String, ContractError>;
}

/// Text-to-speech in the voice of a reference sample
#[trait_variant::make(SpeechSynthesizer: Send)]
pub trait LocalSpeechSynthesizer {
    /// Synthesize `text`; `voice_sample` is a file name in the source directory
    async fn synthesize(&self, text: &str, voice_sample: &str)
        -> Result<ArtifactRef, ContractError>;
}

/// Face swap of a target face into a source video
#[trait_variant::make(FaceComposer: Send)]
pub trait LocalFaceComposer {
    /// Both arguments are file names in the source directory
    async fn compose(
        &self,
        source_video: &str,
        target_face: &str,
    ) -> Result<ArtifactRef, ContractError>;
}

/// Lip-sync rendering of a video against an audio track
#[trait_variant::make(LipSyncer: Send)]
pub trait LocalLipSyncer {
    /// Both arguments are artifacts in the output directory
    async fn render(
        &self,
        video: &ArtifactRef,
        audio: &ArtifactRef,
    ) -> Result<ArtifactRef, ContractError>;
}

/// The full set of stage clients a pipeline runs against
#[derive(Debug, Clone)]
pub struct StageClients<L, T, F, S> {
    pub llm: L,
    pub tts: T,
    pub face: F,
    pub lip_sync: S,
}
