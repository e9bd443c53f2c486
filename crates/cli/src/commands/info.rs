//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::ServiceBlueprint;
use tracing::info;

use crate::cli::InfoArgs;

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let blueprint = super::load_existing(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let json = config_loader::ConfigLoader::to_json(&blueprint)
            .context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint);
    }

    Ok(())
}

fn print_config_info(blueprint: &ServiceBlueprint) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Avatar Chat Configuration                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🌐 Server");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Bind: {}", blueprint.server.bind_addr);
    println!(
        "   └─ Public output prefix: {}",
        blueprint.server.public_output_prefix
    );

    println!("\n📁 Assets");
    println!("   ├─ Source: {}", blueprint.assets.source_dir.display());
    println!("   └─ Output: {}", blueprint.assets.output_dir.display());

    let scheduler = &blueprint.scheduler;
    println!("\n⚙️  Scheduler");
    println!("   ├─ Concurrent jobs: {}", scheduler.max_concurrent_jobs);
    println!("   ├─ Queue capacity: {}", scheduler.queue_capacity);
    println!("   └─ Media stages: {:?}", scheduler.media_stages);

    println!("\n📝 Progress");
    println!("   ├─ Backend: {:?}", blueprint.progress.backend);
    println!("   └─ Directory: {}", blueprint.progress_dir().display());

    let stages = &blueprint.stages;
    println!("\n🎬 Stages");
    println!(
        "   ├─ LLM: {} ({}s, temperature {}, max_tokens {})",
        stages.llm.base_url, stages.llm.timeout_secs, stages.llm.temperature, stages.llm.max_tokens
    );
    println!(
        "   ├─ TTS: {} ({}s, language {})",
        stages.tts.base_url, stages.tts.timeout_secs, stages.tts.language
    );
    println!(
        "   ├─ Face compose: {} ({}s)",
        stages.face_compose.base_url, stages.face_compose.timeout_secs
    );
    println!(
        "   └─ Lip sync: {} ({}s)",
        stages.lip_sync.base_url, stages.lip_sync.timeout_secs
    );

    match blueprint.observability.metrics_port {
        0 => println!("\n📊 Metrics: disabled"),
        port => println!("\n📊 Metrics: port {}", port),
    }

    println!();
}
