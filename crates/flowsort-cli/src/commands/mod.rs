pub mod config;
pub mod maintain;
pub mod run;
pub mod segment;

use std::path::Path;

use anyhow::{Context, Result};
use flowsort_core::config::SortConfig;

/// Read a TOML sort config, or fall back to the defaults.
pub fn load_config(path: Option<&Path>) -> Result<SortConfig> {
    let Some(path) = path else {
        return Ok(SortConfig::default());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&contents).context("Invalid sort config")
}
