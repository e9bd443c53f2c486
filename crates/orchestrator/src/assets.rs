//! Input asset resolution
//!
//! Clients reference a material set with a composite id
//! `"{video}_{face}_{voice}"`. Every part is a bare file name inside the
//! source directory.

use std::path::{Path, PathBuf};

use contracts::{ArtifactRef, ContractError, JobInputs, ServiceBlueprint};

/// Parsed composite material id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialId {
    pub source_video: String,
    pub target_face: String,
    pub voice_sample: Option<String>,
}

impl MaterialId {
    /// Split a composite id. The voice part keeps any further underscores.
    pub fn parse(video_id: Option<&str>) -> Result<Self, ContractError> {
        let video_id = video_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ContractError::missing_input("video_id"))?;

        let mut parts = video_id.splitn(3, '_');
        let (Some(video), Some(face)) = (parts.next(), parts.next()) else {
            return Err(ContractError::invalid_input(
                "video_id",
                format!("'{video_id}' is not of the form video_face_voice"),
            ));
        };
        let voice = parts.next();

        check_file_name("video_id", video)?;
        check_file_name("video_id", face)?;
        if let Some(voice) = voice {
            check_file_name("video_id", voice)?;
        }

        Ok(Self {
            source_video: video.to_string(),
            target_face: face.to_string(),
            voice_sample: voice.map(str::to_string),
        })
    }

    /// Composite id form, `video_face[_voice]`
    pub fn to_video_id(&self) -> String {
        match &self.voice_sample {
            Some(voice) => format!("{}_{}_{}", self.source_video, self.target_face, voice),
            None => format!("{}_{}", self.source_video, self.target_face),
        }
    }
}

/// Reject anything that is not a plain file name
fn check_file_name(field: &str, name: &str) -> Result<(), ContractError> {
    let plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0']);
    if plain {
        Ok(())
    } else {
        Err(ContractError::invalid_input(
            field,
            format!("'{name}' is not a plain file name"),
        ))
    }
}

/// Source and output directories shared with the stage services
#[derive(Debug, Clone)]
pub struct AssetCatalog {
    source_dir: PathBuf,
    output_dir: PathBuf,
}

impl AssetCatalog {
    pub fn new(source_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn from_blueprint(blueprint: &ServiceBlueprint) -> Self {
        Self::new(&blueprint.assets.source_dir, &blueprint.assets.output_dir)
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Resolve a chat submission's composite id into job inputs.
    ///
    /// Checks existence in the order video, face, voice.
    pub async fn resolve_job_inputs(
        &self,
        video_id: Option<&str>,
    ) -> Result<JobInputs, ContractError> {
        let id = MaterialId::parse(video_id)?;
        self.require_source("source video", &id.source_video).await?;
        self.require_source("target face", &id.target_face).await?;
        let voice = id
            .voice_sample
            .ok_or_else(|| ContractError::missing_input("voice_sample"))?;
        self.require_source("voice sample", &voice).await?;

        Ok(JobInputs {
            source_video: id.source_video,
            target_face: id.target_face,
            voice_sample: voice,
        })
    }

    /// Validate a preparation request; the voice sample is optional here
    pub async fn resolve_material(
        &self,
        source_video: &str,
        target_face: &str,
        voice_sample: Option<&str>,
    ) -> Result<MaterialId, ContractError> {
        check_file_name("source_video", source_video)?;
        check_file_name("target_face", target_face)?;
        let voice_sample = voice_sample.map(str::trim).filter(|v| !v.is_empty());
        if let Some(voice) = voice_sample {
            check_file_name("voice_sample", voice)?;
        }

        self.require_source("source video", source_video).await?;
        self.require_source("target face", target_face).await?;
        if let Some(voice) = voice_sample {
            self.require_source("voice sample", voice).await?;
        }

        Ok(MaterialId {
            source_video: source_video.to_string(),
            target_face: target_face.to_string(),
            voice_sample: voice_sample.map(str::to_string),
        })
    }

    /// Whether a stage output is still present in the output directory
    pub async fn output_exists(&self, artifact: &ArtifactRef) -> bool {
        tokio::fs::try_exists(self.output_dir.join(artifact.as_str()))
            .await
            .unwrap_or(false)
    }

    async fn require_source(&self, kind: &str, name: &str) -> Result<(), ContractError> {
        let path = self.source_dir.join(name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(()),
            _ => Err(ContractError::asset_not_found(kind, name)),
        }
    }
}
