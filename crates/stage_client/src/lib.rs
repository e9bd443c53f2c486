//! # Stage Client
//!
//! Typed HTTP boundary to the four backend services.
//!
//! Responsibilities:
//! - Translate stage inputs into each service's request shape
//! - Map shared-volume file names to the service's own mount point
//! - Enforce per-stage deadlines and fold failures into `ContractError`
//! - Provide `MockStages` for tests
//!
//! Every invocation is a single request. Nothing here retries.

pub mod face;
pub mod http;
pub mod lip_sync;
pub mod llm;
pub mod mock;
pub mod tts;

pub use face::FaceComposeClient;
pub use http::StageEndpoint;
pub use lip_sync::LipSyncClient;
pub use llm::LlmClient;
pub use mock::{MockConfig, MockStages, StageGate};
pub use tts::TtsClient;

use contracts::{ContractError, StageClients, StagesConfig};

/// The production client set
pub type HttpStageClients = StageClients<LlmClient, TtsClient, FaceComposeClient, LipSyncClient>;

/// Build all four HTTP clients from configuration
pub fn http_clients(config: &StagesConfig) -> Result<HttpStageClients, ContractError> {
    Ok(StageClients {
        llm: LlmClient::new(&config.llm)?,
        tts: TtsClient::new(&config.tts)?,
        face: FaceComposeClient::new(&config.face_compose)?,
        lip_sync: LipSyncClient::new(&config.lip_sync)?,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Mutex};

    use axum::Router;
    use serde_json::Value;

    /// Serve `router` on an ephemeral local port, returning its base URL
    pub async fn spawn_backend(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// Base URL of a port nothing listens on
    pub async fn unreachable_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    /// Last JSON body seen by a fake backend
    #[derive(Clone, Default)]
    pub struct Captured(Arc<Mutex<Option<Value>>>);

    impl Captured {
        pub fn set(&self, body: Value) {
            *self.0.lock().unwrap() = Some(body);
        }

        pub fn get(&self) -> Option<Value> {
            self.0.lock().unwrap().clone()
        }
    }
}
