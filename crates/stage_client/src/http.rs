//! Shared JSON-over-HTTP plumbing for the stage clients
//!
//! One `post_json` call is one request: no retry, no redirect chasing
//! beyond reqwest defaults. Every failure is folded into `ContractError`
//! tagged with the calling stage.

use std::time::{Duration, Instant};

use contracts::{ContractError, StageKind};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

/// Longest upstream body kept in an error message
pub const MAX_ERROR_BODY_CHARS: usize = 512;

/// HTTP endpoint of one stage with its deadline
#[derive(Debug, Clone)]
pub struct StageEndpoint {
    stage: StageKind,
    base_url: String,
    deadline: Duration,
    client: reqwest::Client,
}

impl StageEndpoint {
    /// Build an endpoint whose requests are bounded by `deadline`
    pub fn new(
        stage: StageKind,
        base_url: impl Into<String>,
        deadline: Duration,
    ) -> Result<Self, ContractError> {
        let client = reqwest::Client::builder()
            .timeout(deadline)
            .build()
            .map_err(|e| ContractError::Other(format!("failed to build {stage} client: {e}")))?;
        Ok(Self {
            stage,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            deadline,
            client,
        })
    }

    pub fn stage(&self) -> StageKind {
        self.stage
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// POST `body` to `{base_url}{path}` and decode the JSON answer
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ContractError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let started = Instant::now();

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        debug!(
            stage = %self.stage,
            url = %url,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "stage responded"
        );

        if !status.is_success() {
            warn!(stage = %self.stage, status = status.as_u16(), "stage returned failure status");
            return Err(ContractError::Upstream {
                stage: self.stage,
                status: Some(status.as_u16()),
                message: upstream_message(status.as_u16(), &text),
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            ContractError::upstream(self.stage, format!("invalid response body: {e}"))
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> ContractError {
        if err.is_timeout() {
            ContractError::StageTimeout {
                stage: self.stage,
                deadline_secs: self.deadline.as_secs(),
            }
        } else {
            ContractError::upstream(self.stage, err.to_string())
        }
    }
}

/// Human-readable message for a non-success answer.
///
/// FastAPI services report failures as `{"detail": ...}`; anything else is
/// passed through, truncated.
pub fn upstream_message(status: u16, body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| match v.get("detail") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => None,
        });
    let text = detail.unwrap_or_else(|| body.trim().to_string());
    let text = truncate_chars(&text, MAX_ERROR_BODY_CHARS);
    if text.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {text}")
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Path of a file as seen from inside a stage container
pub fn mounted_path(data_root: &str, dir: &str, file: &str) -> String {
    format!("{}/{}/{}", data_root.trim_end_matches('/'), dir, file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_message_prefers_detail() {
        assert_eq!(
            upstream_message(500, r#"{"detail":"model not loaded"}"#),
            "HTTP 500: model not loaded"
        );
        assert_eq!(
            upstream_message(422, r#"{"detail":[{"loc":["body","text"]}]}"#),
            r#"HTTP 422: [{"loc":["body","text"]}]"#
        );
        assert_eq!(upstream_message(502, "bad gateway\n"), "HTTP 502: bad gateway");
        assert_eq!(upstream_message(503, ""), "HTTP 503");
    }

    #[test]
    fn test_upstream_message_is_truncated() {
        let body = "é".repeat(2000);
        let msg = upstream_message(500, &body);
        assert_eq!(msg.chars().count(), "HTTP 500: ".len() + MAX_ERROR_BODY_CHARS);
    }

    #[test]
    fn test_mounted_path() {
        assert_eq!(
            mounted_path("/app/data/", "source", "vid1.mp4"),
            "/app/data/source/vid1.mp4"
        );
        assert_eq!(
            mounted_path("/workspace/data", "output", "a.wav"),
            "/workspace/data/output/a.wav"
        );
    }

    #[test]
    fn test_endpoint_trims_base_url() {
        let ep = StageEndpoint::new(StageKind::Llm, "http://llama:8001/", Duration::from_secs(60))
            .unwrap();
        assert_eq!(ep.base_url(), "http://llama:8001");
        assert_eq!(ep.stage(), StageKind::Llm);
    }
}
