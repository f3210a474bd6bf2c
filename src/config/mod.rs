// Configuration management module
// Handles TOML settings, the configuration directory and printing the effective config

pub mod display;
pub mod settings;


use std::path::{Path, PathBuf};

pub use display::show_config;
pub use settings::{AssistantConfig, CacheConfig, Config, ConfigError, OllamaConfig};

/// Get the configuration directory path, preferring an explicit override
#[inline]
pub fn get_config_dir(override_dir: Option<&Path>) -> Result<PathBuf, ConfigError> {
    override_dir.map_or_else(Config::default_dir, |dir| Ok(dir.to_path_buf()))
}
