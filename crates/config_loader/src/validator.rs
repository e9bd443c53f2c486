//! Configuration validation
//!
//! Rules:
//! - bind_addr parses as a socket address
//! - public_output_prefix is an absolute URL path
//! - asset directories are non-empty
//! - scheduler limits are positive and within their upper bounds
//! - every stage has an http(s) base_url and a positive timeout
//! - LLM sampling parameters are in range

use std::net::SocketAddr;
use std::path::Path;

use contracts::{ContractError, SchedulerConfig, ServiceBlueprint};

/// Validate a ServiceBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    validate_server(blueprint)?;
    validate_assets(blueprint)?;
    validate_scheduler(blueprint)?;
    validate_stages(blueprint)?;
    validate_llm_sampling(blueprint)?;
    Ok(())
}

fn validate_server(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    let server = &blueprint.server;
    if server.bind_addr.parse::<SocketAddr>().is_err() {
        return Err(ContractError::config_validation(
            "server.bind_addr",
            format!("'{}' is not a valid socket address", server.bind_addr),
        ));
    }
    if !server.public_output_prefix.starts_with('/') {
        return Err(ContractError::config_validation(
            "server.public_output_prefix",
            "must start with '/'",
        ));
    }
    Ok(())
}

fn validate_assets(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    check_dir("assets.source_dir", &blueprint.assets.source_dir)?;
    check_dir("assets.output_dir", &blueprint.assets.output_dir)?;
    if let Some(dir) = &blueprint.progress.dir {
        check_dir("progress.dir", dir)?;
    }
    Ok(())
}

fn check_dir(field: &str, dir: &Path) -> Result<(), ContractError> {
    if dir.as_os_str().is_empty() {
        return Err(ContractError::config_validation(
            field,
            "directory cannot be empty",
        ));
    }
    Ok(())
}

fn validate_scheduler(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    let scheduler = &blueprint.scheduler;
    if scheduler.max_concurrent_jobs == 0 {
        return Err(ContractError::config_validation(
            "scheduler.max_concurrent_jobs",
            "max_concurrent_jobs must be > 0",
        ));
    }
    if scheduler.max_concurrent_jobs > SchedulerConfig::MAX_CONCURRENT_JOBS {
        return Err(ContractError::config_validation(
            "scheduler.max_concurrent_jobs",
            format!(
                "max_concurrent_jobs must be <= {}",
                SchedulerConfig::MAX_CONCURRENT_JOBS
            ),
        ));
    }
    if scheduler.queue_capacity == 0 {
        return Err(ContractError::config_validation(
            "scheduler.queue_capacity",
            "queue_capacity must be > 0",
        ));
    }
    if scheduler.queue_capacity > SchedulerConfig::MAX_QUEUE_CAPACITY {
        return Err(ContractError::config_validation(
            "scheduler.queue_capacity",
            format!(
                "queue_capacity must be <= {}",
                SchedulerConfig::MAX_QUEUE_CAPACITY
            ),
        ));
    }
    Ok(())
}

/// Endpoint and deadline of every stage
fn validate_stages(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    let stages = &blueprint.stages;
    let endpoints = [
        ("llm", stages.llm.base_url.as_str(), stages.llm.timeout_secs),
        ("tts", stages.tts.base_url.as_str(), stages.tts.timeout_secs),
        (
            "face_compose",
            stages.face_compose.base_url.as_str(),
            stages.face_compose.timeout_secs,
        ),
        (
            "lip_sync",
            stages.lip_sync.base_url.as_str(),
            stages.lip_sync.timeout_secs,
        ),
    ];

    for (name, base_url, timeout_secs) in endpoints {
        if !is_http_url(base_url) {
            return Err(ContractError::config_validation(
                format!("stages.{name}.base_url"),
                format!("'{base_url}' must be an http(s) URL"),
            ));
        }
        if timeout_secs == 0 {
            return Err(ContractError::config_validation(
                format!("stages.{name}.timeout_secs"),
                "timeout_secs must be > 0",
            ));
        }
    }
    Ok(())
}

fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.starts_with('/'))
}

fn validate_llm_sampling(blueprint: &ServiceBlueprint) -> Result<(), ContractError> {
    let llm = &blueprint.stages.llm;
    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ContractError::config_validation(
            "stages.llm.temperature",
            format!("temperature must be within [0, 2], got {}", llm.temperature),
        ));
    }
    if llm.max_tokens == 0 {
        return Err(ContractError::config_validation(
            "stages.llm.max_tokens",
            "max_tokens must be > 0",
        ));
    }
    Ok(())
}
