//! JobScheduler - bounded queue in front of the pipeline
//!
//! Submissions are validated and acknowledged synchronously. A dispatcher
//! task pulls work off the queue and runs at most `max_concurrent_jobs`
//! items at a time.

use std::any::Any;
use std::sync::Arc;

use contracts::{
    ChatMessage, ContractError, FaceComposer, Job, JobId, JobSnapshot, JobState, LanguageModel,
    LipSyncer, ProgressEvent, SchedulerConfig, SpeechSynthesizer,
};
use observability::PipelineMetrics;
use progress_store::{ProgressBackend, ProgressStore};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::assets::AssetCatalog;
use crate::error::{Result, SchedulerError};
use crate::pipeline::PipelineOrchestrator;
use crate::prepared::PreparedComposites;

/// Background face composition requested through preparation
#[derive(Debug, Clone)]
pub struct PrepareTask {
    pub request_id: JobId,
    pub source_video: String,
    pub target_face: String,
}

/// Unit of work on the queue
#[derive(Debug)]
pub enum WorkItem {
    Chat(Job),
    Prepare(PrepareTask),
}

/// Result of a preparation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrepareOutcome {
    /// A composite for the pair already exists
    Ready { video_id: String },
    /// Composition is queued or already running; `request_id` is `None` when
    /// an earlier request for the same pair is still pending
    Processing {
        request_id: Option<JobId>,
        video_id: String,
    },
}

/// Cloneable submission side of the scheduler
#[derive(Clone)]
pub struct JobScheduler {
    tx: mpsc::Sender<WorkItem>,
    store: Arc<ProgressBackend>,
    catalog: AssetCatalog,
    prepared: Arc<PreparedComposites>,
    metrics: PipelineMetrics,
    capacity: usize,
}

impl JobScheduler {
    /// Spawn the dispatcher and return the submission handle plus the
    /// dispatcher's shutdown handle
    pub fn start<L, T, F, S>(
        config: &SchedulerConfig,
        orchestrator: PipelineOrchestrator<L, T, F, S>,
    ) -> (Self, DispatcherHandle)
    where
        L: LanguageModel + Send + Sync + 'static,
        T: SpeechSynthesizer + Send + Sync + 'static,
        F: FaceComposer + Send + Sync + 'static,
        S: LipSyncer + Send + Sync + 'static,
    {
        let capacity = config
            .queue_capacity
            .clamp(1, SchedulerConfig::MAX_QUEUE_CAPACITY);
        let max_concurrent = config
            .max_concurrent_jobs
            .clamp(1, SchedulerConfig::MAX_CONCURRENT_JOBS);
        let (tx, rx) = mpsc::channel(capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let scheduler = Self {
            tx,
            store: Arc::clone(orchestrator.store()),
            catalog: orchestrator.catalog().clone(),
            prepared: Arc::clone(orchestrator.prepared()),
            metrics: orchestrator.metrics().clone(),
            capacity,
        };

        let join = tokio::spawn(dispatch_loop(
            Arc::new(orchestrator),
            rx,
            shutdown_rx,
            max_concurrent,
        ));

        (
            scheduler,
            DispatcherHandle {
                shutdown: shutdown_tx,
                join,
            },
        )
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    pub fn catalog(&self) -> &AssetCatalog {
        &self.catalog
    }

    /// Queue capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Validate and enqueue a chat job.
    ///
    /// Returns once `Started` is recorded; no stage has run yet.
    #[instrument(name = "scheduler_submit", skip(self, messages))]
    pub async fn submit(
        &self,
        messages: Vec<ChatMessage>,
        video_id: Option<&str>,
    ) -> Result<JobId> {
        let inputs = match self.catalog.resolve_job_inputs(video_id).await {
            Ok(inputs) => inputs,
            Err(e) => {
                self.metrics.job_rejected("invalid_input");
                return Err(e.into());
            }
        };

        let permit = self.reserve()?;
        let job = Job {
            id: JobId::generate(),
            inputs,
            messages,
        };
        self.store.append(&job.id, ProgressEvent::Started).await?;

        let job_id = job.id.clone();
        permit.send(WorkItem::Chat(job));
        self.metrics.job_submitted();
        info!(job_id = %job_id, "job accepted");
        Ok(job_id)
    }

    /// Latest state of a job
    pub async fn status(&self, job_id: &str) -> Result<JobSnapshot> {
        let id = JobId::from(job_id);
        if !id.is_well_formed() {
            return Err(ContractError::job_not_found(job_id).into());
        }
        Ok(self.store.snapshot(&id).await?)
    }

    /// Validate a material set and make sure a composite exists or is coming
    #[instrument(name = "scheduler_prepare", skip(self))]
    pub async fn prepare(
        &self,
        source_video: &str,
        target_face: &str,
        voice_sample: Option<&str>,
    ) -> Result<PrepareOutcome> {
        let material = self
            .catalog
            .resolve_material(source_video, target_face, voice_sample)
            .await?;
        let video_id = material.to_video_id();

        if self
            .prepared
            .lookup_existing(&self.catalog, source_video, target_face)
            .await
            .is_some()
        {
            return Ok(PrepareOutcome::Ready { video_id });
        }
        if !self.prepared.begin(source_video, target_face) {
            debug!(video_id = %video_id, "composition already pending");
            return Ok(PrepareOutcome::Processing {
                request_id: None,
                video_id,
            });
        }

        let permit = match self.reserve() {
            Ok(permit) => permit,
            Err(e) => {
                self.prepared.finish(source_video, target_face);
                return Err(e);
            }
        };
        let request_id = JobId::generate();
        permit.send(WorkItem::Prepare(PrepareTask {
            request_id: request_id.clone(),
            source_video: material.source_video,
            target_face: material.target_face,
        }));
        info!(request_id = %request_id, video_id = %video_id, "preparation queued");

        Ok(PrepareOutcome::Processing {
            request_id: Some(request_id),
            video_id,
        })
    }

    fn reserve(&self) -> Result<mpsc::Permit<'_, WorkItem>> {
        match self.tx.try_reserve() {
            Ok(permit) => Ok(permit),
            Err(mpsc::error::TrySendError::Full(())) => {
                self.metrics.job_rejected("queue_full");
                warn!(capacity = self.capacity, "job queue full");
                Err(ContractError::QueueFull {
                    capacity: self.capacity,
                }
                .into())
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                self.metrics.job_rejected("shutting_down");
                Err(SchedulerError::ShuttingDown)
            }
        }
    }
}

/// Handle to the running dispatcher task
pub struct DispatcherHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Stop accepting work, run what is queued, and wait for every job
    #[instrument(name = "dispatcher_handle_shutdown", skip(self))]
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.join.await {
            error!(error = ?e, "Dispatcher task panicked");
        }
        debug!("Dispatcher shutdown complete");
    }
}

#[instrument(name = "dispatcher_loop", skip(orchestrator, rx, shutdown))]
async fn dispatch_loop<L, T, F, S>(
    orchestrator: Arc<PipelineOrchestrator<L, T, F, S>>,
    mut rx: mpsc::Receiver<WorkItem>,
    mut shutdown: watch::Receiver<bool>,
    max_concurrent: usize,
) where
    L: LanguageModel + Send + Sync + 'static,
    T: SpeechSynthesizer + Send + Sync + 'static,
    F: FaceComposer + Send + Sync + 'static,
    S: LipSyncer + Send + Sync + 'static,
{
    info!("Dispatcher started");
    let semaphore = Arc::new(Semaphore::new(max_concurrent));
    let mut watching = true;
    let mut dispatched: u64 = 0;

    loop {
        // Waiting items stay in the queue until a slot frees up
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };

        let item = tokio::select! {
            item = rx.recv() => item,
            changed = shutdown.changed(), if watching => {
                watching = false;
                // A dropped handle is not a shutdown request
                if changed.is_ok() && *shutdown.borrow() {
                    info!("Dispatcher closing queue, draining remaining work");
                    rx.close();
                }
                continue;
            }
        };
        let Some(item) = item else { break };
        dispatched += 1;

        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            run_item(orchestrator, item).await;
            drop(permit);
        });
    }

    // Wait for in-flight work
    let all = u32::try_from(max_concurrent).unwrap_or(u32::MAX);
    let _ = semaphore.acquire_many(all).await;
    info!(dispatched, "Dispatcher shutdown complete");
}

/// Run one work item, converting a panic into a recorded failure
async fn run_item<L, T, F, S>(orchestrator: Arc<PipelineOrchestrator<L, T, F, S>>, item: WorkItem)
where
    L: LanguageModel + Send + Sync + 'static,
    T: SpeechSynthesizer + Send + Sync + 'static,
    F: FaceComposer + Send + Sync + 'static,
    S: LipSyncer + Send + Sync + 'static,
{
    match item {
        WorkItem::Chat(job) => {
            let metrics = orchestrator.metrics().clone();
            metrics.job_started();
            let job_id = job.id.clone();

            let runner = Arc::clone(&orchestrator);
            let state = match tokio::spawn(async move { runner.run(&job).await }).await {
                Ok(state) => state,
                Err(e) => {
                    let message = match e.try_into_panic() {
                        Ok(payload) => format!("internal error: {}", panic_message(&*payload)),
                        Err(e) => format!("internal error: {e}"),
                    };
                    error!(job_id = %job_id, message, "job task aborted");
                    orchestrator.record_failure(&job_id, None, message).await;
                    JobState::Error
                }
            };
            metrics.job_finished(state == JobState::Completed);
        }
        WorkItem::Prepare(task) => {
            orchestrator
                .prepared()
                .start(&task.source_video, &task.target_face);
            let runner = Arc::clone(&orchestrator);
            let (video, face) = (task.source_video.clone(), task.target_face.clone());
            let outcome =
                tokio::spawn(async move { runner.compose(&video, &face).await.map(|_| ()) }).await;
            match outcome {
                Ok(Ok(())) => info!(request_id = %task.request_id, "preparation finished"),
                Ok(Err(e)) => {
                    warn!(request_id = %task.request_id, error = %e, "preparation failed")
                }
                Err(e) => error!(request_id = %task.request_id, error = ?e, "preparation task aborted"),
            }
            orchestrator
                .prepared()
                .finish(&task.source_video, &task.target_face);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "job panicked"
    }
}
