//! Initialize the configuration directory: create ~/.scribe, a default config, and the
//! transcripts directory.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config;

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with `{}` if missing.
/// - Creates the transcripts directory resolved from the (possibly existing) config.
///
/// Returns the config directory.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, b"{}")
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let (config, _) = config::load_config(Some(config_path.to_path_buf()))?;
    let transcripts = config::resolve_transcripts_dir(&config, config_path);
    if !transcripts.exists() {
        std::fs::create_dir_all(&transcripts).with_context(|| {
            format!("creating transcripts directory {}", transcripts.display())
        })?;
        log::info!("created transcripts directory at {}", transcripts.display());
    } else {
        log::debug!(
            "transcripts directory already exists at {}, skipping",
            transcripts.display()
        );
    }

    Ok(config_dir.to_path_buf())
}
