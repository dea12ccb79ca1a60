use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path of the append-only JSONL log produced by the cron job wrapper
    #[serde(default = "default_source_path")]
    pub source: PathBuf,

    /// Directory holding the record database and the read cursor
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub web: WebConfig,

    #[serde(default)]
    pub notify: NotifyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: default_source_path(),
            data_dir: default_data_dir(),
            ingest: IngestConfig::default(),
            web: WebConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

impl Config {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("cronwatch.db")
    }

    pub fn cursor_path(&self) -> PathBuf {
        self.data_dir.join("cursor")
    }
}

fn default_source_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("logs/jobs.jsonl")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cronwatch")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// How often the source log is polled for new lines
    #[serde(with = "humantime_serde", default = "default_check_interval")]
    pub check_interval: Duration,

    /// How often aggregate statistics are recomputed and cached
    #[serde(with = "humantime_serde", default = "default_stats_interval")]
    pub stats_interval: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            check_interval: default_check_interval(),
            stats_interval: default_stats_interval(),
        }
    }
}

fn default_check_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_stats_interval() -> Duration {
    Duration::from_secs(300)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_web_enabled")]
    pub enabled: bool,

    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: default_web_enabled(),
            listen: default_listen(),
        }
    }
}

fn default_web_enabled() -> bool {
    true
}

fn default_listen() -> String {
    "127.0.0.1:5001".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default = "default_notify_enabled")]
    pub enabled: bool,

    /// Command invoked as `<command> -u <urgency> <title> <body>`
    #[serde(default = "default_notify_command")]
    pub command: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: default_notify_enabled(),
            command: default_notify_command(),
        }
    }
}

fn default_notify_enabled() -> bool {
    true
}

fn default_notify_command() -> String {
    "notify-send".to_string()
}
