pub mod chat;
pub mod config_cmd;
pub mod doctor;
pub mod serve;

use std::path::{Path, PathBuf};

use biochat_config::{AppConfig, ConfigError, DEFAULT_CONFIG_FILE};

/// The config file in effect: `--config`/`BIOCHAT_CONFIG`, else `biochat.toml`.
pub fn config_file(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load the file, then apply environment overrides, then validate.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut config = AppConfig::load_from(&config_file(path))?;
    config.apply_env_overrides_from(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}
