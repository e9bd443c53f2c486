//! Face swap client (FaceFusion)
//!
//! The output file name is chosen here so that concurrent jobs never
//! collide on the shared output volume.

use std::time::Duration;

use contracts::{ArtifactRef, ContractError, FaceComposeStageConfig, FaceComposer, StageKind};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::http::{mounted_path, StageEndpoint};

#[derive(Debug, Clone)]
pub struct FaceComposeClient {
    endpoint: StageEndpoint,
    data_root: String,
}

impl FaceComposeClient {
    pub fn new(config: &FaceComposeStageConfig) -> Result<Self, ContractError> {
        Self::with_deadline(config, config.timeout())
    }

    pub fn with_deadline(
        config: &FaceComposeStageConfig,
        deadline: Duration,
    ) -> Result<Self, ContractError> {
        Ok(Self {
            endpoint: StageEndpoint::new(StageKind::FaceCompose, &config.base_url, deadline)?,
            data_root: config.data_root.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
struct SwapRequest {
    source_video: String,
    target_face: String,
    output_file: String,
}

#[derive(Debug, Deserialize)]
struct SwapResponse {
    output_path: String,
}

impl FaceComposer for FaceComposeClient {
    #[instrument(name = "face_compose", skip(self))]
    async fn compose(
        &self,
        source_video: &str,
        target_face: &str,
    ) -> Result<ArtifactRef, ContractError> {
        let output_name = format!("face_{}.mp4", Uuid::new_v4());
        let body = SwapRequest {
            source_video: mounted_path(&self.data_root, "source", source_video),
            target_face: mounted_path(&self.data_root, "source", target_face),
            output_file: mounted_path(&self.data_root, "output", &output_name),
        };
        let parsed: SwapResponse = self.endpoint.post_json("/swap", &body).await?;

        ArtifactRef::from_service_path(&parsed.output_path).ok_or_else(|| {
            ContractError::upstream(StageKind::FaceCompose, "response carried no output path")
        })
    }
}
