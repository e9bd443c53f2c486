//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Avatar Chat - talking-head video replies from a chat conversation
#[derive(Parser, Debug)]
#[command(
    name = "avatar-chat",
    author,
    version,
    about = "Avatar video chat service",
    long_about = "Accepts chat turns over HTTP and turns each reply into a lip-synced \n\
                  avatar video by chaining LLM, speech synthesis, face composition \n\
                  and lip-sync backends."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "AVATAR_CHAT_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "AVATAR_CHAT_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP service
    Serve(ServeArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the effective configuration
    Info(InfoArgs),
}

/// Arguments for the `serve` command
#[derive(Parser, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Path to configuration file (TOML or JSON); defaults apply if missing
    #[arg(
        short,
        long,
        default_value = "config.toml",
        env = "AVATAR_CHAT_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "AVATAR_CHAT_BIND")]
    pub bind: Option<String>,

    /// Override the LLM backend URL
    #[arg(long, env = "LLAMA_API_URL")]
    pub llm_url: Option<String>,

    /// Override the speech synthesis backend URL
    #[arg(long, env = "COQUI_API_URL")]
    pub tts_url: Option<String>,

    /// Override the face composition backend URL
    #[arg(long, env = "FACEFUSION_API_URL")]
    pub face_url: Option<String>,

    /// Override the lip-sync backend URL
    #[arg(long, env = "WAV2LIP_API_URL")]
    pub lipsync_url: Option<String>,

    /// Override the source asset directory
    #[arg(long, env = "DATA_SOURCE_DIR")]
    pub source_dir: Option<PathBuf>,

    /// Override the output directory
    #[arg(long, env = "DATA_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Override the number of jobs run at once
    #[arg(long, env = "AVATAR_CHAT_MAX_JOBS")]
    pub max_concurrent_jobs: Option<usize>,

    /// Metrics server port (0 = disabled)
    #[arg(long, env = "AVATAR_CHAT_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
