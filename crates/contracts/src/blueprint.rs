//! ServiceBlueprint - Config Loader output
//!
//! Describes the whole deployment: HTTP listener, asset directories, job
//! scheduling limits, progress storage and the four stage endpoints.
//! Every field has a default matching the reference docker-compose layout.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceBlueprint {
    #[serde(default)]
    pub version: ConfigVersion,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub assets: AssetsConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub progress: ProgressConfig,

    #[serde(default)]
    pub stages: StagesConfig,

    #[serde(default)]
    pub observability: ObservabilitySettings,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address, e.g. "0.0.0.0:8000"
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// URL prefix under which output artifacts are served to clients
    #[serde(default = "default_public_output_prefix")]
    pub public_output_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            public_output_prefix: default_public_output_prefix(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_public_output_prefix() -> String {
    "/data/output".to_string()
}

/// Where uploaded inputs live and where stage outputs land
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetsConfig {
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("/app/data/source")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("/app/data/output")
}

/// Job scheduling limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Jobs allowed to run at the same time (GPU capacity)
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Accepted jobs waiting for a slot; submissions beyond this are rejected
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// How speech synthesis and face composition are ordered
    #[serde(default)]
    pub media_stages: MediaStageMode,
}

impl SchedulerConfig {
    /// Upper bound on `max_concurrent_jobs`
    pub const MAX_CONCURRENT_JOBS: usize = 1024;
    /// Upper bound on `queue_capacity`
    pub const MAX_QUEUE_CAPACITY: usize = 65_536;
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            queue_capacity: default_queue_capacity(),
            media_stages: MediaStageMode::default(),
        }
    }
}

fn default_max_concurrent_jobs() -> usize {
    2
}

fn default_queue_capacity() -> usize {
    64
}

/// Scheduling of the two middle stages, which share no data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaStageMode {
    /// TTS, then face composition
    Sequential,
    /// TTS and face composition side by side, joined before lip sync
    #[default]
    Concurrent,
}

/// Progress log storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressConfig {
    #[serde(default)]
    pub backend: ProgressBackendKind,

    /// Directory for the file backend (defaults to the output directory)
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Progress store implementation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressBackendKind {
    /// Process memory; lost on restart
    #[default]
    Memory,
    /// One JSON-lines file per job
    File,
}

/// Endpoints of the four backend services
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StagesConfig {
    #[serde(default)]
    pub llm: LlmStageConfig,

    #[serde(default)]
    pub tts: TtsStageConfig,

    #[serde(default)]
    pub face_compose: FaceComposeStageConfig,

    #[serde(default)]
    pub lip_sync: LipSyncStageConfig,
}

/// Chat-completions backend (llama.cpp server)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmStageConfig {
    #[serde(default = "default_llm_url")]
    pub base_url: String,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmStageConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_url(),
            timeout_secs: default_llm_timeout(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl LlmStageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_llm_url() -> String {
    "http://llama:8001".to_string()
}

fn default_llm_timeout() -> u64 {
    60
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    500
}

/// Speech synthesis backend (XTTS)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsStageConfig {
    #[serde(default = "default_tts_url")]
    pub base_url: String,

    #[serde(default = "default_tts_timeout")]
    pub timeout_secs: u64,

    /// Mount point of the shared data volume inside the TTS container
    #[serde(default = "default_app_data_root")]
    pub data_root: String,

    /// Synthesis language code
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for TtsStageConfig {
    fn default() -> Self {
        Self {
            base_url: default_tts_url(),
            timeout_secs: default_tts_timeout(),
            data_root: default_app_data_root(),
            language: default_language(),
        }
    }
}

impl TtsStageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_tts_url() -> String {
    "http://coquitts:8002".to_string()
}

fn default_tts_timeout() -> u64 {
    120
}

fn default_language() -> String {
    "ja".to_string()
}

fn default_app_data_root() -> String {
    "/app/data".to_string()
}

/// Face swap backend (FaceFusion)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceComposeStageConfig {
    #[serde(default = "default_face_url")]
    pub base_url: String,

    /// Longest stage; scales with video length
    #[serde(default = "default_face_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_app_data_root")]
    pub data_root: String,
}

impl Default for FaceComposeStageConfig {
    fn default() -> Self {
        Self {
            base_url: default_face_url(),
            timeout_secs: default_face_timeout(),
            data_root: default_app_data_root(),
        }
    }
}

impl FaceComposeStageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_face_url() -> String {
    "http://facefusion:8003".to_string()
}

fn default_face_timeout() -> u64 {
    600
}

/// Lip-sync backend (Wav2Lip)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LipSyncStageConfig {
    #[serde(default = "default_lipsync_url")]
    pub base_url: String,

    #[serde(default = "default_lipsync_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_workspace_data_root")]
    pub data_root: String,
}

impl Default for LipSyncStageConfig {
    fn default() -> Self {
        Self {
            base_url: default_lipsync_url(),
            timeout_secs: default_lipsync_timeout(),
            data_root: default_workspace_data_root(),
        }
    }
}

impl LipSyncStageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_lipsync_url() -> String {
    "http://wav2lip:8004".to_string()
}

fn default_lipsync_timeout() -> u64 {
    300
}

fn default_workspace_data_root() -> String {
    "/workspace/data".to_string()
}

/// Metrics exporter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilitySettings {
    /// Prometheus listener port (0 = disabled)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            metrics_port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    9000
}

impl ServiceBlueprint {
    /// Directory used by the file progress backend
    pub fn progress_dir(&self) -> PathBuf {
        self.progress
            .dir
            .clone()
            .unwrap_or_else(|| self.assets.output_dir.clone())
    }

    /// Deadline configured for a stage
    pub fn stage_timeout(&self, stage: crate::StageKind) -> Duration {
        match stage {
            crate::StageKind::Llm => self.stages.llm.timeout(),
            crate::StageKind::Tts => self.stages.tts.timeout(),
            crate::StageKind::FaceCompose => self.stages.face_compose.timeout(),
            crate::StageKind::LipSync => self.stages.lip_sync.timeout(),
        }
    }
}
