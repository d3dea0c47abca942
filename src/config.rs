// src/config.rs

//! Configuration loading utilities.
//!
//! Combines the TOML file with environment overrides so the backend
//! credentials can live outside the checked-in config.

use std::path::Path;

use crate::error::Result;
use crate::models::Config;

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file is missing or unreadable.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::load_or_default(path);
    config.apply_env();
    Ok(config)
}

/// Load configuration and reject it unless the backend is reachable in
/// principle (endpoint and key present, values sane).
pub fn load_validated(path: &Path) -> Result<Config> {
    let config = load_config(path)?;
    config.validate()?;
    log::debug!(
        "Loaded configuration for {} (table {})",
        config.backend.url,
        config.backend.table
    );
    Ok(config)
}
