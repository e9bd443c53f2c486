//! Per-job state machine over the four stages

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use contracts::{
    ArtifactRef, ContractError, FaceComposer, Job, JobId, JobInputs, JobState, LanguageModel,
    LipSyncer, MediaStageMode, ProgressEvent, SpeechSynthesizer, StageClients, StageKind,
};
use observability::PipelineMetrics;
use progress_store::{ProgressBackend, ProgressStore};
use tracing::{debug, info, instrument, warn};

use crate::assets::AssetCatalog;
use crate::prepared::PreparedComposites;

/// Drives jobs through LLM, TTS, face composition and lip sync,
/// appending one progress entry per completed stage.
pub struct PipelineOrchestrator<L, T, F, S> {
    stages: StageClients<L, T, F, S>,
    store: Arc<ProgressBackend>,
    catalog: AssetCatalog,
    prepared: Arc<PreparedComposites>,
    metrics: PipelineMetrics,
    media_mode: MediaStageMode,
}

impl<L, T, F, S> PipelineOrchestrator<L, T, F, S>
where
    L: LanguageModel + Sync,
    T: SpeechSynthesizer + Sync,
    F: FaceComposer + Sync,
    S: LipSyncer + Sync,
{
    pub fn new(
        stages: StageClients<L, T, F, S>,
        store: Arc<ProgressBackend>,
        catalog: AssetCatalog,
    ) -> Self {
        Self {
            stages,
            store,
            catalog,
            prepared: Arc::new(PreparedComposites::new()),
            metrics: PipelineMetrics::new(),
            media_mode: MediaStageMode::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: PipelineMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_media_mode(mut self, mode: MediaStageMode) -> Self {
        self.media_mode = mode;
        self
    }

    pub fn store(&self) -> &Arc<ProgressBackend> {
        &self.store
    }

    pub fn catalog(&self) -> &AssetCatalog {
        &self.catalog
    }

    pub fn prepared(&self) -> &Arc<PreparedComposites> {
        &self.prepared
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Run one job to a terminal state.
    ///
    /// The `Started` entry must already be in the store. Stage failures are
    /// recorded as an `Error` entry and never returned.
    #[instrument(name = "pipeline_run", skip_all, fields(job_id = %job.id))]
    pub async fn run(&self, job: &Job) -> JobState {
        let started = Instant::now();
        match self.drive(job).await {
            Ok(()) => {
                info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "job completed"
                );
                JobState::Completed
            }
            Err(e) => {
                warn!(
                    failed_stage = ?e.stage(),
                    error = %e,
                    "job failed"
                );
                self.record_failure(&job.id, e.stage(), e.to_string()).await;
                JobState::Error
            }
        }
    }

    /// Append the terminal `Error` entry; a store failure is only logged
    pub async fn record_failure(
        &self,
        job_id: &JobId,
        failed_stage: Option<StageKind>,
        message: String,
    ) {
        let event = ProgressEvent::Error {
            failed_stage,
            message,
        };
        if let Err(e) = self.store.append(job_id, event).await {
            warn!(job_id = %job_id, error = %e, "could not record job failure");
        }
    }

    async fn drive(&self, job: &Job) -> Result<(), ContractError> {
        let text = self
            .timed(StageKind::Llm, self.stages.llm.generate_reply(&job.messages))
            .await?;
        self.advance(&job.id, ProgressEvent::LlmDone { text: text.clone() })
            .await?;

        let (audio, composed) = match self.media_mode {
            MediaStageMode::Sequential => self.media_sequential(job, &text).await?,
            MediaStageMode::Concurrent => self.media_concurrent(job, &text).await?,
        };

        let video = self
            .timed(
                StageKind::LipSync,
                self.stages.lip_sync.render(&composed, &audio),
            )
            .await?;
        self.advance(&job.id, ProgressEvent::Completed { video })
            .await
    }

    async fn media_sequential(
        &self,
        job: &Job,
        text: &str,
    ) -> Result<(ArtifactRef, ArtifactRef), ContractError> {
        let audio = self.synthesize(&job.inputs, text).await?;
        self.advance(
            &job.id,
            ProgressEvent::AudioDone {
                audio: audio.clone(),
            },
        )
        .await?;

        let (composed, reused) = self.compose_or_reuse(&job.inputs).await?;
        self.advance(
            &job.id,
            ProgressEvent::FaceDone {
                composed: composed.clone(),
                reused,
            },
        )
        .await?;
        Ok((audio, composed))
    }

    /// TTS and face composition in parallel. `AudioDone` is recorded as soon
    /// as speech is ready, `FaceDone` once both branches have finished. The
    /// first error drops the other branch.
    async fn media_concurrent(
        &self,
        job: &Job,
        text: &str,
    ) -> Result<(ArtifactRef, ArtifactRef), ContractError> {
        let speech = self.synthesize(&job.inputs, text);
        let face = self.compose_or_reuse(&job.inputs);
        tokio::pin!(speech, face);

        let mut audio: Option<ArtifactRef> = None;
        let mut composed: Option<(ArtifactRef, bool)> = None;

        while audio.is_none() || composed.is_none() {
            tokio::select! {
                result = &mut speech, if audio.is_none() => {
                    let artifact = result?;
                    self.advance(&job.id, ProgressEvent::AudioDone { audio: artifact.clone() })
                        .await?;
                    audio = Some(artifact);
                }
                result = &mut face, if composed.is_none() => {
                    composed = Some(result?);
                }
            }
        }

        let (Some(audio), Some((composed, reused))) = (audio, composed) else {
            return Err(ContractError::Other("media stages ended early".into()));
        };
        self.advance(
            &job.id,
            ProgressEvent::FaceDone {
                composed: composed.clone(),
                reused,
            },
        )
        .await?;
        Ok((audio, composed))
    }

    async fn synthesize(
        &self,
        inputs: &JobInputs,
        text: &str,
    ) -> Result<ArtifactRef, ContractError> {
        self.timed(
            StageKind::Tts,
            self.stages.tts.synthesize(text, &inputs.voice_sample),
        )
        .await
    }

    /// Composite for the job's pair; `true` when a prepared one was reused
    async fn compose_or_reuse(
        &self,
        inputs: &JobInputs,
    ) -> Result<(ArtifactRef, bool), ContractError> {
        let (video, face) = (&inputs.source_video, &inputs.target_face);
        if let Some(composed) = self.prepared.lookup_existing(&self.catalog, video, face).await {
            info!(composed = %composed, "reusing prepared composite");
            return Ok((composed, true));
        }

        if self.prepared.wait_pending(video, face).await {
            if let Some(composed) = self.prepared.lookup_existing(&self.catalog, video, face).await
            {
                info!(composed = %composed, "reusing composite prepared while waiting");
                return Ok((composed, true));
            }
            debug!(video, face, "pending preparation left nothing, composing");
        }

        let composed = self.compose(&inputs.source_video, &inputs.target_face).await?;
        Ok((composed, false))
    }

    /// Run face composition and register the result for reuse
    #[instrument(name = "pipeline_compose", skip(self))]
    pub async fn compose(
        &self,
        source_video: &str,
        target_face: &str,
    ) -> Result<ArtifactRef, ContractError> {
        let composed = self
            .timed(
                StageKind::FaceCompose,
                self.stages.face.compose(source_video, target_face),
            )
            .await?;
        self.prepared
            .register(source_video, target_face, composed.clone());
        Ok(composed)
    }

    async fn advance(&self, job_id: &JobId, event: ProgressEvent) -> Result<(), ContractError> {
        let state = event.state();
        self.store.append(job_id, event).await?;
        debug!(job_id = %job_id, state = %state, "progress appended");
        Ok(())
    }

    async fn timed<R>(
        &self,
        stage: StageKind,
        call: impl Future<Output = Result<R, ContractError>>,
    ) -> Result<R, ContractError> {
        let started = Instant::now();
        let result = call.await;
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.metrics.stage_call(stage, result.is_ok(), elapsed_ms);
        match &result {
            Ok(_) => debug!(stage = %stage, elapsed_ms, "stage finished"),
            Err(e) => warn!(stage = %stage, elapsed_ms, error = %e, "stage failed"),
        }
        result
    }
}
