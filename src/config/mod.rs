mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./config.toml",
        "./vidladder.toml",
        "~/.config/vidladder/config.toml",
        "/etc/vidladder/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.server.ws_ping_interval_secs == 0 {
        anyhow::bail!("WebSocket ping interval must be at least 1 second");
    }

    if config.transcode.max_upload_bytes == 0 {
        anyhow::bail!("Upload size limit cannot be 0");
    }

    if config.transcode.shell.trim().is_empty() {
        anyhow::bail!("Transcode shell cannot be empty");
    }

    if config.transcode.script.as_os_str().is_empty() {
        anyhow::bail!("Transcode script path cannot be empty");
    }

    if config.events.listener_buffer == 0 {
        anyhow::bail!("Listener buffer must hold at least one event");
    }

    // The script may be deployed after the config; jobs fail loudly if it is still missing
    if !config.transcode.script.exists() {
        tracing::warn!("Transcode script does not exist: {:?}", config.transcode.script);
    }

    Ok(())
}

/// Create the upload and output directories if they are missing
pub fn ensure_directories(config: &Config) -> Result<()> {
    for dir in [&config.paths.upload_dir, &config.paths.output_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {:?}", dir))?;
    }
    Ok(())
}
