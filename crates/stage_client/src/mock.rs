//! Scripted stage backends
//!
//! Used by unit and end-to-end tests. Supports injecting failures,
//! timeouts, panics, delays and gates that hold a stage until released.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use contracts::{
    ArtifactRef, ChatMessage, ContractError, FaceComposer, LanguageModel, LipSyncer,
    SpeechSynthesizer, StageClients, StageKind,
};
use tokio::sync::watch;

/// Mock behaviour
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// LLM reply text
    pub reply: String,
    /// Stages answering with an upstream failure (message)
    pub fail: HashMap<StageKind, String>,
    /// Stages reporting a deadline overrun
    pub timeout: HashSet<StageKind>,
    /// Stages that panic when called
    pub panic: HashSet<StageKind>,
    /// Artificial latency per stage
    pub delays: HashMap<StageKind, Duration>,
    /// When set, produced artifacts are created as empty files here
    pub output_dir: Option<PathBuf>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            reply: "hi there".to_string(),
            fail: HashMap::new(),
            timeout: HashSet::new(),
            panic: HashSet::new(),
            delays: HashMap::new(),
            output_dir: None,
        }
    }
}

/// Released with `StageGate::open`
#[derive(Debug, Clone)]
pub struct StageGate {
    tx: Arc<watch::Sender<bool>>,
}

impl StageGate {
    pub fn open(&self) {
        let _ = self.tx.send(true);
    }
}

#[derive(Debug, Default)]
struct Inner {
    config: Mutex<MockConfig>,
    calls: Mutex<Vec<StageKind>>,
    finished: Mutex<Vec<StageKind>>,
    gates: Mutex<HashMap<StageKind, watch::Receiver<bool>>>,
    next_id: AtomicU32,
}

/// All four stages in one cloneable handle; clones share state
#[derive(Debug, Clone, Default)]
pub struct MockStages {
    inner: Arc<Inner>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl MockStages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MockConfig) -> Self {
        let mock = Self::default();
        *lock(&mock.inner.config) = config;
        mock
    }

    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        lock(&self.inner.config).reply = reply.into();
        self
    }

    pub fn fail_stage(self, stage: StageKind, message: impl Into<String>) -> Self {
        lock(&self.inner.config).fail.insert(stage, message.into());
        self
    }

    pub fn timeout_stage(self, stage: StageKind) -> Self {
        lock(&self.inner.config).timeout.insert(stage);
        self
    }

    pub fn panic_stage(self, stage: StageKind) -> Self {
        lock(&self.inner.config).panic.insert(stage);
        self
    }

    pub fn delay_stage(self, stage: StageKind, delay: Duration) -> Self {
        lock(&self.inner.config).delays.insert(stage, delay);
        self
    }

    pub fn write_artifacts_to(self, dir: impl Into<PathBuf>) -> Self {
        lock(&self.inner.config).output_dir = Some(dir.into());
        self
    }

    /// Hold every call of `stage` until the returned gate is opened
    pub fn gate(&self, stage: StageKind) -> StageGate {
        let (tx, rx) = watch::channel(false);
        lock(&self.inner.gates).insert(stage, rx);
        StageGate { tx: Arc::new(tx) }
    }

    /// Stages in the order their calls started
    pub fn calls(&self) -> Vec<StageKind> {
        lock(&self.inner.calls).clone()
    }

    /// Stages in the order their calls returned successfully
    pub fn finished(&self) -> Vec<StageKind> {
        lock(&self.inner.finished).clone()
    }

    pub fn call_count(&self, stage: StageKind) -> usize {
        lock(&self.inner.calls).iter().filter(|s| **s == stage).count()
    }

    /// A `StageClients` set backed by this mock
    pub fn clients(&self) -> StageClients<Self, Self, Self, Self> {
        StageClients {
            llm: self.clone(),
            tts: self.clone(),
            face: self.clone(),
            lip_sync: self.clone(),
        }
    }

    async fn run(&self, stage: StageKind) -> Result<(), ContractError> {
        lock(&self.inner.calls).push(stage);

        let gate = lock(&self.inner.gates).get(&stage).cloned();
        if let Some(mut rx) = gate {
            // A dropped gate counts as open
            let _ = rx.wait_for(|open| *open).await;
        }

        let config = lock(&self.inner.config).clone();
        if let Some(delay) = config.delays.get(&stage) {
            tokio::time::sleep(*delay).await;
        }
        if config.panic.contains(&stage) {
            panic!("mock {stage} panicked");
        }
        if config.timeout.contains(&stage) {
            return Err(ContractError::StageTimeout {
                stage,
                deadline_secs: 1,
            });
        }
        if let Some(message) = config.fail.get(&stage) {
            return Err(ContractError::Upstream {
                stage,
                status: Some(500),
                message: message.clone(),
            });
        }

        lock(&self.inner.finished).push(stage);
        Ok(())
    }

    async fn produce(&self, prefix: &str, ext: &str) -> Result<ArtifactRef, ContractError> {
        let n = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let name = format!("{prefix}_{n}.{ext}");
        let dir = lock(&self.inner.config).output_dir.clone();
        if let Some(dir) = dir {
            tokio::fs::write(dir.join(&name), b"").await?;
        }
        Ok(ArtifactRef::new(name))
    }
}

impl LanguageModel for MockStages {
    async fn generate_reply(&self, _messages: &[ChatMessage]) -> Result<String, ContractError> {
        self.run(StageKind::Llm).await?;
        Ok(lock(&self.inner.config).reply.clone())
    }
}

impl SpeechSynthesizer for MockStages {
    async fn synthesize(
        &self,
        _text: &str,
        _voice_sample: &str,
    ) -> Result<ArtifactRef, ContractError> {
        self.run(StageKind::Tts).await?;
        self.produce("speech", "wav").await
    }
}

impl FaceComposer for MockStages {
    async fn compose(
        &self,
        _source_video: &str,
        _target_face: &str,
    ) -> Result<ArtifactRef, ContractError> {
        self.run(StageKind::FaceCompose).await?;
        self.produce("face", "mp4").await
    }
}

impl LipSyncer for MockStages {
    async fn render(
        &self,
        _video: &ArtifactRef,
        _audio: &ArtifactRef,
    ) -> Result<ArtifactRef, ContractError> {
        self.run(StageKind::LipSync).await?;
        self.produce("final", "mp4").await
    }
}
