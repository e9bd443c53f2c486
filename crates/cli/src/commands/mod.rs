//! Command implementations.

mod info;
mod serve;
mod validate;

use std::path::Path;

use contracts::ServiceBlueprint;

use crate::error::{CliError, Result};

pub use info::run_info;
pub use serve::run_serve;
pub use validate::run_validate;

/// Load and validate a configuration file that must exist
pub(crate) fn load_existing(path: &Path) -> Result<ServiceBlueprint> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()));
    }
    Ok(config_loader::ConfigLoader::load_from_path(path)?)
}
