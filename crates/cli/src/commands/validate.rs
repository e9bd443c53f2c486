//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{MediaStageMode, ProgressBackendKind, ServiceBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Above this many concurrent jobs the GPU backends usually thrash
const MAX_RECOMMENDED_JOBS: usize = 8;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    bind_addr: String,
    max_concurrent_jobs: usize,
    queue_capacity: usize,
    media_stages: MediaStageMode,
    progress_backend: ProgressBackendKind,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    match super::load_existing(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    bind_addr: blueprint.server.bind_addr.clone(),
                    max_concurrent_jobs: blueprint.scheduler.max_concurrent_jobs,
                    queue_capacity: blueprint.scheduler.queue_capacity,
                    media_stages: blueprint.scheduler.media_stages,
                    progress_backend: blueprint.progress.backend,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &ServiceBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.scheduler.max_concurrent_jobs > MAX_RECOMMENDED_JOBS {
        warnings.push(format!(
            "scheduler.max_concurrent_jobs = {} exceeds {} - stage backends may run out of GPU memory",
            blueprint.scheduler.max_concurrent_jobs, MAX_RECOMMENDED_JOBS
        ));
    }

    if blueprint.progress.backend == ProgressBackendKind::Memory {
        warnings.push("progress.backend is memory - job status is lost on restart".to_string());
    }

    if !blueprint.assets.source_dir.is_dir() {
        warnings.push(format!(
            "assets.source_dir {} does not exist",
            blueprint.assets.source_dir.display()
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Bind: {}", summary.bind_addr);
            println!(
                "  Jobs: {} concurrent, queue of {}",
                summary.max_concurrent_jobs, summary.queue_capacity
            );
            println!("  Media stages: {:?}", summary.media_stages);
            println!("  Progress backend: {:?}", summary.progress_backend);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
