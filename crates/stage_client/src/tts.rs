//! Speech synthesis client (XTTS voice cloning)

use std::time::Duration;

use contracts::{ArtifactRef, ContractError, SpeechSynthesizer, StageKind, TtsStageConfig};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::http::{mounted_path, StageEndpoint};

#[derive(Debug, Clone)]
pub struct TtsClient {
    endpoint: StageEndpoint,
    data_root: String,
    language: String,
}

impl TtsClient {
    pub fn new(config: &TtsStageConfig) -> Result<Self, ContractError> {
        Self::with_deadline(config, config.timeout())
    }

    pub fn with_deadline(
        config: &TtsStageConfig,
        deadline: Duration,
    ) -> Result<Self, ContractError> {
        Ok(Self {
            endpoint: StageEndpoint::new(StageKind::Tts, &config.base_url, deadline)?,
            data_root: config.data_root.clone(),
            language: config.language.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    speaker_wav: String,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct SynthesizeResponse {
    output_file: String,
}

impl SpeechSynthesizer for TtsClient {
    #[instrument(name = "tts_synthesize", skip(self, text), fields(chars = text.chars().count()))]
    async fn synthesize(
        &self,
        text: &str,
        voice_sample: &str,
    ) -> Result<ArtifactRef, ContractError> {
        let body = SynthesizeRequest {
            text,
            speaker_wav: mounted_path(&self.data_root, "source", voice_sample),
            language: &self.language,
        };
        let parsed: SynthesizeResponse = self.endpoint.post_json("/synthesize", &body).await?;

        ArtifactRef::from_service_path(&parsed.output_file)
            .ok_or_else(|| ContractError::upstream(StageKind::Tts, "response carried no output file"))
    }
}
