//! `serve` command implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use contracts::ServiceBlueprint;
use observability::PipelineMetrics;
use orchestrator::{AssetCatalog, JobScheduler, PipelineOrchestrator};
use progress_store::ProgressBackend;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::cli::ServeArgs;
use crate::error::CliError;

/// Upper bound on waiting for in-flight jobs at shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Execute the `serve` command
pub async fn run_serve(args: &ServeArgs) -> Result<()> {
    let blueprint = load_blueprint(args)?;

    info!(
        bind = %blueprint.server.bind_addr,
        source_dir = %blueprint.assets.source_dir.display(),
        output_dir = %blueprint.assets.output_dir.display(),
        max_concurrent_jobs = blueprint.scheduler.max_concurrent_jobs,
        media_stages = ?blueprint.scheduler.media_stages,
        "Configuration loaded"
    );

    let metrics_port = args
        .metrics_port
        .unwrap_or(blueprint.observability.metrics_port);
    observability::install_prometheus(metrics_port)?;

    if !blueprint.assets.source_dir.is_dir() {
        warn!(
            source_dir = %blueprint.assets.source_dir.display(),
            "Source directory does not exist, every submission will fail"
        );
    }
    tokio::fs::create_dir_all(&blueprint.assets.output_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create output directory {}",
                blueprint.assets.output_dir.display()
            )
        })?;

    let store = Arc::new(
        ProgressBackend::from_blueprint(&blueprint)
            .await
            .context("Failed to open progress store")?,
    );
    let clients = stage_client::http_clients(&blueprint.stages)
        .context("Failed to build stage clients")?;
    let orchestrator = PipelineOrchestrator::new(
        clients,
        store,
        AssetCatalog::from_blueprint(&blueprint),
    )
    .with_metrics(PipelineMetrics::new())
    .with_media_mode(blueprint.scheduler.media_stages);

    let (scheduler, dispatcher) = JobScheduler::start(&blueprint.scheduler, orchestrator);

    let listener = TcpListener::bind(&blueprint.server.bind_addr)
        .await
        .map_err(|e| CliError::bind(&blueprint.server.bind_addr, e))?;
    let state = api::ApiState::new(scheduler, blueprint.server.public_output_prefix.as_str());

    api::serve(listener, state, shutdown_signal())
        .await
        .context("API server failed")?;

    info!(
        timeout_secs = DRAIN_TIMEOUT.as_secs(),
        "Waiting for in-flight jobs"
    );
    if tokio::time::timeout(DRAIN_TIMEOUT, dispatcher.shutdown())
        .await
        .is_err()
    {
        warn!("Drain timed out, abandoning remaining jobs");
    }

    info!("Avatar chat finished");
    Ok(())
}

/// File config (or defaults when the file is missing) with CLI overrides
fn load_blueprint(args: &ServeArgs) -> Result<ServiceBlueprint> {
    let mut blueprint = if args.config.exists() {
        config_loader::ConfigLoader::load_from_path(&args.config)
            .with_context(|| format!("Failed to load config from {}", args.config.display()))?
    } else {
        warn!(
            config = %args.config.display(),
            "Configuration file not found, using defaults"
        );
        ServiceBlueprint::default()
    };

    apply_overrides(&mut blueprint, args);
    config_loader::ConfigLoader::validate(&blueprint).context("Invalid configuration")?;
    Ok(blueprint)
}

fn apply_overrides(blueprint: &mut ServiceBlueprint, args: &ServeArgs) {
    if let Some(ref bind) = args.bind {
        info!(bind = %bind, "Overriding bind address from CLI");
        blueprint.server.bind_addr = bind.clone();
    }
    if let Some(ref url) = args.llm_url {
        blueprint.stages.llm.base_url = url.clone();
    }
    if let Some(ref url) = args.tts_url {
        blueprint.stages.tts.base_url = url.clone();
    }
    if let Some(ref url) = args.face_url {
        blueprint.stages.face_compose.base_url = url.clone();
    }
    if let Some(ref url) = args.lipsync_url {
        blueprint.stages.lip_sync.base_url = url.clone();
    }
    if let Some(ref dir) = args.source_dir {
        blueprint.assets.source_dir = dir.clone();
    }
    if let Some(ref dir) = args.output_dir {
        blueprint.assets.output_dir = dir.clone();
    }
    if let Some(jobs) = args.max_concurrent_jobs {
        blueprint.scheduler.max_concurrent_jobs = jobs;
    }
    if let Some(port) = args.metrics_port {
        blueprint.observability.metrics_port = port;
    }
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("Received shutdown signal, no longer accepting requests");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let args = ServeArgs {
            config: dir.path().join("absent.toml"),
            ..Default::default()
        };
        let blueprint = load_blueprint(&args).unwrap();
        assert_eq!(blueprint.server.bind_addr, "0.0.0.0:8000");
        assert_eq!(blueprint.stages.llm.base_url, "http://llama:8001");
    }

    #[test]
    fn test_overrides_win_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[server]\nbind_addr = \"127.0.0.1:9100\"\n[stages.tts]\nbase_url = \"http://tts:1\"\n",
        )
        .unwrap();

        let args = ServeArgs {
            config: path,
            tts_url: Some("http://override:8002".into()),
            source_dir: Some(PathBuf::from("/srv/source")),
            max_concurrent_jobs: Some(4),
            ..Default::default()
        };
        let blueprint = load_blueprint(&args).unwrap();
        assert_eq!(blueprint.server.bind_addr, "127.0.0.1:9100");
        assert_eq!(blueprint.stages.tts.base_url, "http://override:8002");
        assert_eq!(blueprint.assets.source_dir, PathBuf::from("/srv/source"));
        assert_eq!(blueprint.scheduler.max_concurrent_jobs, 4);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let args = ServeArgs {
            config: dir.path().join("absent.toml"),
            llm_url: Some("llama:8001".into()),
            ..Default::default()
        };
        let err = load_blueprint(&args).unwrap_err();
        assert!(format!("{err:#}").contains("stages.llm.base_url"));
    }
}
