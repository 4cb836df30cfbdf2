use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_CONFIG_PATH: &str = "mixtape.env";
pub const DEFAULT_SAVE_ROOT: &str = "sounds";
pub const DEFAULT_WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

/// Settings injected into a run: where downloads land and how canonical
/// watch urls are built from video ids.
#[derive(Debug, Clone)]
pub struct Settings {
    pub save_root: PathBuf,
    pub watch_url_prefix: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            save_root: PathBuf::from(DEFAULT_SAVE_ROOT),
            watch_url_prefix: DEFAULT_WATCH_URL_PREFIX.to_string(),
        }
    }
}

/// Reads `KEY=VALUE` settings from `path`. A missing file yields the
/// defaults; comments, malformed lines and unknown keys are skipped; values
/// may be double-quoted.
pub fn read_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let mut settings = Settings::default();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((key, value_raw)) = trimmed.split_once('=') {
            let value = value_raw.trim().trim_matches('"');
            match key {
                "SAVE_ROOT" => {
                    if !value.is_empty() {
                        settings.save_root = PathBuf::from(value);
                    }
                }
                "WATCH_URL_PREFIX" => {
                    if !value.is_empty() {
                        settings.watch_url_prefix = value.to_string();
                    }
                }
                _ => {}
            }
        }
    }
    Ok(settings)
}
