//! Lip-sync client (Wav2Lip)

use std::time::Duration;

use contracts::{ArtifactRef, ContractError, LipSyncStageConfig, LipSyncer, StageKind};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::http::{mounted_path, StageEndpoint};

#[derive(Debug, Clone)]
pub struct LipSyncClient {
    endpoint: StageEndpoint,
    data_root: String,
}

impl LipSyncClient {
    pub fn new(config: &LipSyncStageConfig) -> Result<Self, ContractError> {
        Self::with_deadline(config, config.timeout())
    }

    pub fn with_deadline(
        config: &LipSyncStageConfig,
        deadline: Duration,
    ) -> Result<Self, ContractError> {
        Ok(Self {
            endpoint: StageEndpoint::new(StageKind::LipSync, &config.base_url, deadline)?,
            data_root: config.data_root.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    video_file: String,
    audio_file: String,
    output_file: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    output_file: String,
}

impl LipSyncer for LipSyncClient {
    #[instrument(name = "lip_sync_render", skip_all, fields(video = %video, audio = %audio))]
    async fn render(
        &self,
        video: &ArtifactRef,
        audio: &ArtifactRef,
    ) -> Result<ArtifactRef, ContractError> {
        let output_name = format!("final_{}.mp4", Uuid::new_v4());
        let body = GenerateRequest {
            video_file: mounted_path(&self.data_root, "output", video.as_str()),
            audio_file: mounted_path(&self.data_root, "output", audio.as_str()),
            output_file: mounted_path(&self.data_root, "output", &output_name),
        };
        let parsed: GenerateResponse = self.endpoint.post_json("/generate", &body).await?;

        ArtifactRef::from_service_path(&parsed.output_file).ok_or_else(|| {
            ContractError::upstream(StageKind::LipSync, "response carried no output file")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{spawn_backend, Captured};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_render_uses_lip_sync_mount() {
        let captured = Captured::default();
        let seen = captured.clone();
        let router = Router::new().route(
            "/generate",
            post(move |Json(body): Json<Value>| {
                let seen = seen.clone();
                async move {
                    seen.set(body);
                    Json(json!({
                        "output_file": "/workspace/data/output/final_xyz.mp4",
                        "status": "completed"
                    }))
                }
            }),
        );
        let base = spawn_backend(router).await;

        let client = LipSyncClient::new(&LipSyncStageConfig {
            base_url: base,
            ..LipSyncStageConfig::default()
        })
        .unwrap();
        let video = client
            .render(&ArtifactRef::new("face_1.mp4"), &ArtifactRef::new("tts_1.wav"))
            .await
            .unwrap();
        assert_eq!(video.as_str(), "final_xyz.mp4");

        let body = captured.get().unwrap();
        assert_eq!(body["video_file"], "/workspace/data/output/face_1.mp4");
        assert_eq!(body["audio_file"], "/workspace/data/output/tts_1.wav");
        assert!(body["output_file"]
            .as_str()
            .unwrap()
            .starts_with("/workspace/data/output/final_"));
    }
}
