use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

/// 2 GB, the original deployment's delivery ceiling.
const DEFAULT_MAX_FILE_SIZE: u64 = 2_097_152_000;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DiscordConfig {
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    #[serde(default = "default_alt_root_dir")]
    pub alt_root_dir: PathBuf,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_audio_quality")]
    pub default_audio_quality: String,
    #[serde(default = "default_video_quality")]
    pub default_video_quality: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_alt_root_dir() -> PathBuf {
    PathBuf::from("/app")
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

fn default_audio_quality() -> String {
    "192".to_string()
}

fn default_video_quality() -> String {
    "480".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            alt_root_dir: default_alt_root_dir(),
            max_file_size: default_max_file_size(),
            default_audio_quality: default_audio_quality(),
            default_video_quality: default_video_quality(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("could not read config file {path}"))?;
        toml::from_str(&raw).with_context(|| format!("could not parse config file {path}"))
    }

    /// Token from the config file, overridden by DISCORD_TOKEN.
    pub fn discord_token(&self) -> Option<String> {
        std::env::var("DISCORD_TOKEN")
            .ok()
            .or_else(|| self.discord.token.clone())
    }

    pub fn logging_format(&self) -> &str {
        &self.logging.format
    }

    pub fn default_quality(&self, kind: crate::media::OutputKind) -> &str {
        match kind {
            crate::media::OutputKind::Audio => &self.download.default_audio_quality,
            crate::media::OutputKind::Video => &self.download.default_video_quality,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::OutputKind;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.download.scratch_dir, PathBuf::from("/tmp"));
        assert_eq!(config.download.alt_root_dir, PathBuf::from("/app"));
        assert_eq!(config.download.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(config.logging.format, "json");
        assert!(config.discord.token.is_none());
    }

    #[test]
    fn test_partial_config_overrides() {
        let config: Config = toml::from_str(
            r#"
            [download]
            scratch_dir = "/var/scratch"
            max_file_size = 1000

            [logging]
            format = "plain"
            "#,
        )
        .unwrap();
        assert_eq!(config.download.scratch_dir, PathBuf::from("/var/scratch"));
        assert_eq!(config.download.max_file_size, 1000);
        assert_eq!(config.download.default_audio_quality, "192");
        assert_eq!(config.logging.format, "plain");
    }

    #[test]
    fn test_default_quality_per_kind() {
        let config = Config::default();
        assert_eq!(config.default_quality(OutputKind::Audio), "192");
        assert_eq!(config.default_quality(OutputKind::Video), "480");
    }
}
