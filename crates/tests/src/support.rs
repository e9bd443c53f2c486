//! Fake stage backends and a full service stack wired to them

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use api::ApiState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use config_loader::{ConfigFormat, ConfigLoader};
use orchestrator::{AssetCatalog, DispatcherHandle, JobScheduler, PipelineOrchestrator};
use progress_store::ProgressBackend;
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub const VIDEO_ID: &str = "vid1.mp4_face1.jpg_voice1.wav";

/// Behaviour of the fake backends
#[derive(Debug, Clone)]
pub struct Script {
    pub reply: String,
    pub llm_delay: Duration,
    pub tts_delay: Duration,
    pub face_delay: Duration,
    pub lip_sync_delay: Duration,
    /// Status and FastAPI-style detail returned by `/synthesize`
    pub tts_error: Option<(u16, String)>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            reply: "hi there".to_string(),
            llm_delay: Duration::ZERO,
            tts_delay: Duration::ZERO,
            face_delay: Duration::ZERO,
            lip_sync_delay: Duration::ZERO,
            tts_error: None,
        }
    }
}

#[derive(Clone)]
struct Backend {
    script: Arc<Script>,
    output_dir: PathBuf,
    requests: Arc<Mutex<Vec<(&'static str, Value)>>>,
}

impl Backend {
    fn record(&self, endpoint: &'static str, body: &Value) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((endpoint, body.clone()));
    }

    /// Create the artifact on the shared volume like the real containers do
    fn write_output(&self, service_path: &Value) {
        if let Some(name) = service_path.as_str().and_then(|p| p.rsplit('/').next()) {
            std::fs::write(self.output_dir.join(name), b"media").unwrap();
        }
    }
}

async fn chat_completions(
    State(backend): State<Backend>,
    Json(body): Json<Value>,
) -> Json<Value> {
    backend.record("llm", &body);
    tokio::time::sleep(backend.script.llm_delay).await;
    Json(json!({
        "choices": [{"message": {"role": "assistant", "content": backend.script.reply}}]
    }))
}

async fn synthesize(
    State(backend): State<Backend>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    backend.record("tts", &body);
    tokio::time::sleep(backend.script.tts_delay).await;
    match &backend.script.tts_error {
        Some((status, detail)) => (
            StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(json!({ "detail": detail })),
        ),
        None => (
            StatusCode::OK,
            Json(json!({
                "output_file": "/app/data/output/speech_0001.wav",
                "text": body["text"],
            })),
        ),
    }
}

async fn swap(State(backend): State<Backend>, Json(body): Json<Value>) -> Json<Value> {
    backend.record("face_compose", &body);
    tokio::time::sleep(backend.script.face_delay).await;
    backend.write_output(&body["output_file"]);
    Json(json!({ "output_path": body["output_file"], "status": "success" }))
}

async fn generate(State(backend): State<Backend>, Json(body): Json<Value>) -> Json<Value> {
    backend.record("lip_sync", &body);
    tokio::time::sleep(backend.script.lip_sync_delay).await;
    backend.write_output(&body["output_file"]);
    Json(json!({ "output_file": body["output_file"], "status": "success" }))
}

/// All four stage services behind one listener, sharing a data volume
/// with `source/` and `output/` directories
pub struct FakeBackends {
    pub base_url: String,
    pub data: tempfile::TempDir,
    backend: Backend,
}

impl FakeBackends {
    pub async fn start(script: Script) -> Self {
        let data = tempfile::tempdir().unwrap();
        let source = data.path().join("source");
        let output = data.path().join("output");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::create_dir_all(&output).unwrap();
        for f in ["vid1.mp4", "face1.jpg", "voice1.wav"] {
            std::fs::write(source.join(f), b"x").unwrap();
        }

        let backend = Backend {
            script: Arc::new(script),
            output_dir: output,
            requests: Arc::default(),
        };
        let router = Router::new()
            .route("/v1/chat/completions", post(chat_completions))
            .route("/synthesize", post(synthesize))
            .route("/swap", post(swap))
            .route("/generate", post(generate))
            .with_state(backend.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            data,
            backend,
        }
    }

    pub fn data_path(&self) -> &Path {
        self.data.path()
    }

    /// Request bodies received, in arrival order
    pub fn requests(&self) -> Vec<(&'static str, Value)> {
        self.backend
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn endpoints(&self) -> Vec<&'static str> {
        self.requests().into_iter().map(|(e, _)| e).collect()
    }
}

/// The service as `serve` assembles it, listening on an ephemeral port
pub struct Stack {
    pub progress_dir: PathBuf,
    pub base: String,
    pub client: reqwest::Client,
    dispatcher: DispatcherHandle,
}

impl Stack {
    /// `stage_timeout_secs` applies to every stage
    pub async fn start(
        backends: &FakeBackends,
        media_stages: &str,
        stage_timeout_secs: u64,
    ) -> Self {
        let data = backends.data_path();
        let progress_dir = data.join("progress");

        let stage = |extra: Value| {
            let mut cfg = json!({
                "base_url": backends.base_url,
                "timeout_secs": stage_timeout_secs,
            });
            if let (Some(cfg), Some(extra)) = (cfg.as_object_mut(), extra.as_object()) {
                cfg.extend(extra.clone());
            }
            cfg
        };
        let config = json!({
            "server": { "bind_addr": "127.0.0.1:0", "public_output_prefix": "/data/output" },
            "assets": { "source_dir": data.join("source"), "output_dir": data.join("output") },
            "scheduler": { "max_concurrent_jobs": 2, "queue_capacity": 16, "media_stages": media_stages },
            "progress": { "backend": "file", "dir": progress_dir },
            "stages": {
                "llm": stage(json!({ "temperature": 0.7, "max_tokens": 500 })),
                "tts": stage(json!({ "data_root": "/app/data", "language": "ja" })),
                "face_compose": stage(json!({ "data_root": "/app/data" })),
                "lip_sync": stage(json!({ "data_root": "/workspace/data" })),
            },
            "observability": { "metrics_port": 0 },
        });
        let blueprint =
            ConfigLoader::load_from_str(&config.to_string(), ConfigFormat::Json).unwrap();

        let store = Arc::new(ProgressBackend::from_blueprint(&blueprint).await.unwrap());
        let clients = stage_client::http_clients(&blueprint.stages).unwrap();
        let orchestrator =
            PipelineOrchestrator::new(clients, store, AssetCatalog::from_blueprint(&blueprint))
                .with_media_mode(blueprint.scheduler.media_stages);
        let (scheduler, dispatcher) = JobScheduler::start(&blueprint.scheduler, orchestrator);

        let listener = TcpListener::bind(&blueprint.server.bind_addr).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = ApiState::new(scheduler, blueprint.server.public_output_prefix.as_str());
        tokio::spawn(api::serve(listener, state, std::future::pending()));

        Self {
            progress_dir,
            base: format!("http://{addr}"),
            client: reqwest::Client::new(),
            dispatcher,
        }
    }

    pub async fn submit(&self, video_id: &str) -> (u16, Value) {
        let response = self
            .client
            .post(format!("{}/chat", self.base))
            .json(&json!({
                "messages": [{"role": "user", "content": "hello"}],
                "video_id": video_id,
            }))
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    pub async fn status(&self, job_id: &str) -> (u16, Value) {
        let response = self
            .client
            .get(format!("{}/chat/status/{job_id}", self.base))
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    /// Poll every 10ms until a terminal status, returning every distinct
    /// status seen in order and the final body
    pub async fn watch(&self, job_id: &str) -> (Vec<String>, Value) {
        let mut seen: Vec<String> = Vec::new();
        for _ in 0..1000 {
            let (code, body) = self.status(job_id).await;
            assert_eq!(code, 200, "status poll failed: {body}");
            let status = body["status"].as_str().unwrap_or_default().to_string();
            if seen.last() != Some(&status) {
                seen.push(status.clone());
            }
            if status == "completed" || status == "error" {
                return (seen, body);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} did not finish; saw {seen:?}");
    }

    pub async fn shutdown(self) {
        self.dispatcher.shutdown().await;
    }
}
