use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Explicit path to the player binary. When unset, `cvlc`/`vlc` is
    /// looked up beside the executable and on PATH at launch time.
    #[serde(default)]
    pub binary: Option<PathBuf>,
    /// Pass `--no-video` to playback invocations (headless operation).
    #[serde(default = "default_no_video")]
    pub no_video: bool,
    /// Extra arguments appended to every invocation.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of scheduled retries after the initial attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Fixed wait between a failed/ended attempt and the next one.
    /// Plain bounded sleep, not exponential backoff.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl RetryConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Directory for finished recordings, created on demand.
    #[serde(default = "platform::default_recordings_dir")]
    pub directory: PathBuf,
    /// Fixed label prefixed to every recording filename.
    #[serde(default = "default_recording_label")]
    pub label: String,
    /// MP3 bitrate handed to the transcode chain.
    #[serde(default = "default_bitrate_kbps")]
    pub bitrate_kbps: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            binary: None,
            no_video: default_no_video(),
            extra_args: Vec::new(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            directory: platform::default_recordings_dir(),
            label: default_recording_label(),
            bitrate_kbps: default_bitrate_kbps(),
        }
    }
}

fn default_no_video() -> bool {
    true
}

fn default_max_retries() -> u32 {
    10
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_recording_label() -> String {
    "Opname".to_string()
}

fn default_bitrate_kbps() -> u32 {
    192
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.retry.max_retries, 10);
        assert_eq!(config.retry.retry_delay_secs, 5);
        assert_eq!(config.retry.retry_delay(), Duration::from_secs(5));
        assert!(config.player.no_video);
        assert!(config.player.binary.is_none());
        assert_eq!(config.recording.bitrate_kbps, 192);
        assert!(config.recording.directory.ends_with("Opnames"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [retry]
            max_retries = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.retry_delay_secs, 5);
        assert_eq!(config.recording.label, "Opname");
    }
}
