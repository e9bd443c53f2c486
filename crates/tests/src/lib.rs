//! # Integration Tests
//!
//! End-to-end tests of the assembled service.
//!
//! Covers:
//! - The full HTTP surface against fake stage backends over real sockets
//! - Status walks in both media stage modes
//! - Stage failures and timeouts as seen by polling clients
//! - Durability of the file progress backend

#[cfg(test)]
mod support;

#[cfg(test)]
mod contract_tests {
    use contracts::JobState;

    #[test]
    fn test_status_names_are_wire_names() {
        let names: Vec<String> = [
            JobState::Started,
            JobState::LlmDone,
            JobState::AudioDone,
            JobState::FaceDone,
            JobState::Completed,
            JobState::Error,
        ]
        .iter()
        .map(|s| serde_json::to_value(s).unwrap().as_str().unwrap().to_string())
        .collect();
        assert_eq!(
            names,
            [
                "started",
                "llm_response_completed",
                "audio_completed",
                "face_fusion_completed",
                "completed",
                "error"
            ]
        );
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::time::Duration;

    use contracts::{JobId, JobState};
    use progress_store::ProgressBackend;
    use serde_json::json;

    use crate::support::{FakeBackends, Script, Stack, VIDEO_ID};

    const ORDER: [&str; 5] = [
        "started",
        "llm_response_completed",
        "audio_completed",
        "face_fusion_completed",
        "completed",
    ];

    fn slow_script() -> Script {
        Script {
            llm_delay: Duration::from_millis(150),
            tts_delay: Duration::from_millis(250),
            face_delay: Duration::from_millis(250),
            lip_sync_delay: Duration::from_millis(250),
            ..Script::default()
        }
    }

    fn assert_monotonic(seen: &[String]) {
        let ranks: Vec<usize> = seen
            .iter()
            .map(|s| {
                ORDER
                    .iter()
                    .position(|o| o == s)
                    .unwrap_or_else(|| panic!("unexpected status {s}"))
            })
            .collect();
        assert!(
            ranks.windows(2).all(|w| w[0] < w[1]),
            "status went backwards: {seen:?}"
        );
    }

    #[tokio::test]
    async fn test_sequential_job_walks_every_status() {
        let backends = FakeBackends::start(slow_script()).await;
        let stack = Stack::start(&backends, "sequential", 5).await;

        let (code, body) = stack.submit(VIDEO_ID).await;
        assert_eq!(code, 202);
        assert_eq!(body["status"], "processing");
        let job_id = body["job_id"].as_str().unwrap().to_string();

        let (seen, last) = stack.watch(&job_id).await;
        assert_eq!(seen, ORDER);
        assert_eq!(last["job_id"], job_id.as_str());
        assert!(last["video_url"]
            .as_str()
            .unwrap()
            .starts_with("/data/output/final_"));
        assert!(last["video_url"].as_str().unwrap().ends_with(".mp4"));

        assert_eq!(backends.endpoints(), ["llm", "tts", "face_compose", "lip_sync"]);
        stack.shutdown().await;
    }

    #[tokio::test]
    async fn test_stage_requests_carry_job_inputs() {
        let backends = FakeBackends::start(Script::default()).await;
        let stack = Stack::start(&backends, "concurrent", 5).await;

        let (_, body) = stack.submit(VIDEO_ID).await;
        let job_id = body["job_id"].as_str().unwrap().to_string();
        let (_, last) = stack.watch(&job_id).await;
        assert_eq!(last["status"], "completed");

        let requests = backends.requests();
        let find = |endpoint: &str| {
            requests
                .iter()
                .find(|(e, _)| *e == endpoint)
                .map(|(_, body)| body.clone())
                .unwrap_or_else(|| panic!("{endpoint} never called"))
        };

        let llm = find("llm");
        assert_eq!(llm["messages"], json!([{"role": "user", "content": "hello"}]));
        assert_eq!(llm["max_tokens"], 500);

        let tts = find("tts");
        assert_eq!(tts["text"], "hi there");
        assert_eq!(tts["speaker_wav"], "/app/data/source/voice1.wav");
        assert_eq!(tts["language"], "ja");

        let face = find("face_compose");
        assert_eq!(face["source_video"], "/app/data/source/vid1.mp4");
        assert_eq!(face["target_face"], "/app/data/source/face1.jpg");

        let lip = find("lip_sync");
        assert_eq!(lip["audio_file"], "/workspace/data/output/speech_0001.wav");
        let face_output = face["output_file"].as_str().unwrap();
        let face_name = face_output.rsplit('/').next().unwrap();
        assert_eq!(
            lip["video_file"],
            format!("/workspace/data/output/{face_name}")
        );
        stack.shutdown().await;
    }

    #[tokio::test]
    async fn test_concurrent_job_reports_llm_text() {
        let backends = FakeBackends::start(slow_script()).await;
        let stack = Stack::start(&backends, "concurrent", 5).await;

        let (_, body) = stack.submit(VIDEO_ID).await;
        let job_id = body["job_id"].as_str().unwrap().to_string();

        let mut text_seen = false;
        for _ in 0..500 {
            let (_, status) = stack.status(&job_id).await;
            if status["status"] == "llm_response_completed" {
                assert_eq!(status["text"], "hi there");
                text_seen = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(text_seen, "never observed llm_response_completed");

        let (seen, last) = stack.watch(&job_id).await;
        assert_monotonic(&seen);
        assert_eq!(last["status"], "completed");
        stack.shutdown().await;
    }

    #[tokio::test]
    async fn test_tts_failure_reported_to_client() {
        let backends = FakeBackends::start(Script {
            tts_error: Some((500, "CUDA out of memory".into())),
            ..Script::default()
        })
        .await;
        let stack = Stack::start(&backends, "sequential", 5).await;

        let (_, body) = stack.submit(VIDEO_ID).await;
        let job_id = body["job_id"].as_str().unwrap().to_string();

        let (seen, last) = stack.watch(&job_id).await;
        assert_eq!(last["status"], "error");
        let error = last["error"].as_str().unwrap();
        assert!(error.contains("Speech synthesis failed"), "{error}");
        assert!(error.contains("CUDA out of memory"), "{error}");
        assert!(!seen.iter().any(|s| s == "face_fusion_completed"));
        assert!(!backends.endpoints().contains(&"lip_sync"));

        for _ in 0..100 {
            let (code, again) = stack.status(&job_id).await;
            assert_eq!(code, 200);
            assert_eq!(again, last);
        }
        stack.shutdown().await;
    }

    #[tokio::test]
    async fn test_llm_timeout_becomes_error() {
        let backends = FakeBackends::start(Script {
            llm_delay: Duration::from_secs(5),
            ..Script::default()
        })
        .await;
        let stack = Stack::start(&backends, "concurrent", 1).await;

        let (_, body) = stack.submit(VIDEO_ID).await;
        let job_id = body["job_id"].as_str().unwrap().to_string();

        let (seen, last) = stack.watch(&job_id).await;
        assert_eq!(seen.last().map(String::as_str), Some("error"));
        let error = last["error"].as_str().unwrap();
        assert!(error.contains("Failed to get response from LLM"), "{error}");
        assert!(error.contains("timed out"), "{error}");
        assert_eq!(backends.endpoints(), ["llm"]);
        stack.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_asset_rejected_without_job() {
        let backends = FakeBackends::start(Script::default()).await;
        let stack = Stack::start(&backends, "concurrent", 5).await;

        let (code, body) = stack.submit("nope.mp4_face1.jpg_voice1.wav").await;
        assert_eq!(code, 404);
        assert_eq!(body["detail"], "source video nope.mp4 not found");
        assert!(backends.endpoints().is_empty());

        let files = std::fs::read_dir(&stack.progress_dir)
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(files, 0);
        stack.shutdown().await;
    }

    #[tokio::test]
    async fn test_file_progress_survives_reopen() {
        let backends = FakeBackends::start(Script::default()).await;
        let stack = Stack::start(&backends, "concurrent", 5).await;

        let (_, body) = stack.submit(VIDEO_ID).await;
        let job_id = body["job_id"].as_str().unwrap().to_string();
        let (_, last) = stack.watch(&job_id).await;
        assert_eq!(last["status"], "completed");

        let config = json!({
            "progress": { "backend": "file", "dir": stack.progress_dir },
        });
        let blueprint = config_loader::ConfigLoader::load_from_str(
            &config.to_string(),
            config_loader::ConfigFormat::Json,
        )
        .unwrap();
        let reopened = ProgressBackend::from_blueprint(&blueprint).await.unwrap();
        let snapshot = reopened.snapshot(&JobId::from(job_id)).await.unwrap();
        assert_eq!(snapshot.state, JobState::Completed);
        assert_eq!(snapshot.text.as_deref(), Some("hi there"));
        assert_eq!(snapshot.entries, 5);
        stack.shutdown().await;
    }

    #[tokio::test]
    async fn test_prepare_then_chat_skips_face_stage() {
        let backends = FakeBackends::start(Script::default()).await;
        let stack = Stack::start(&backends, "concurrent", 5).await;

        let prepare = json!({ "source_video": "vid1.mp4", "target_face": "face1.jpg" });
        let response = stack
            .client
            .post(format!("{}/prepare", stack.base))
            .json(&prepare)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 202);

        let mut ready = false;
        for _ in 0..500 {
            let body: serde_json::Value = stack
                .client
                .post(format!("{}/prepare", stack.base))
                .json(&prepare)
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if body["status"] == "ready" {
                ready = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(ready, "prepared material never became ready");
        assert_eq!(
            backends.endpoints().iter().filter(|e| **e == "face_compose").count(),
            1
        );

        let (_, body) = stack.submit(VIDEO_ID).await;
        let job_id = body["job_id"].as_str().unwrap().to_string();
        let (_, last) = stack.watch(&job_id).await;
        assert_eq!(last["status"], "completed");
        assert_eq!(
            backends.endpoints().iter().filter(|e| **e == "face_compose").count(),
            1
        );
        stack.shutdown().await;
    }
}
