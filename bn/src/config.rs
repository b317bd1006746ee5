//! Botnet configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main botnet configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Mailbox hub location
    pub mailbox: MailboxConfig,

    /// Coordinator timing
    pub coordinator: CoordinatorConfig,

    /// Worker timing
    pub worker: WorkerConfig,

    /// Known worker registry storage
    pub registry: RegistryConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let (config, skipped) = Self::load_with_warnings(config_path)?;
        for warning in skipped {
            tracing::warn!("{}", warning);
        }
        Ok(config)
    }

    /// Load configuration, returning skipped-file warnings instead of logging them
    ///
    /// For callers that set up logging from the loaded config.
    pub fn load_with_warnings(config_path: Option<&PathBuf>) -> Result<(Self, Vec<String>)> {
        if let Some(path) = config_path {
            let config =
                Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()))?;
            return Ok((config, Vec::new()));
        }

        // Project-local config: ./botnet.yml, then user config: ~/.config/botnet/botnet.yml
        let mut candidates = vec![PathBuf::from("botnet.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("botnet").join("botnet.yml"));
        }
        Ok(Self::load_first(&candidates))
    }

    fn load_first(candidates: &[PathBuf]) -> (Self, Vec<String>) {
        let mut skipped = Vec::new();
        for candidate in candidates.iter().filter(|path| path.exists()) {
            match Self::load_from_file(candidate) {
                Ok(config) => return (config, skipped),
                Err(e) => skipped.push(format!("Failed to load config from {}: {:#}", candidate.display(), e)),
            }
        }

        tracing::debug!("No config file found, using defaults");
        (Self::default(), skipped)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::debug!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Base directory for botnet runtime files
fn runtime_base_dir() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("botnet")
}

/// Mailbox hub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailboxConfig {
    /// Unix socket served by `bn hub`
    #[serde(rename = "socket-path")]
    pub socket_path: PathBuf,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            socket_path: runtime_base_dir().join("mailbox.sock"),
        }
    }
}

/// Coordinator timing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Overall window for collecting broadcast answers, in milliseconds
    #[serde(rename = "broadcast-window-ms")]
    pub broadcast_window_ms: u64,

    /// How long a single-target command waits for its answer, in milliseconds
    #[serde(rename = "response-timeout-ms")]
    pub response_timeout_ms: u64,

    /// Per-attempt wait inside a broadcast window, in milliseconds
    #[serde(rename = "broadcast-attempt-timeout-ms")]
    pub broadcast_attempt_timeout_ms: u64,

    /// Upper bound between re-checks of the response mailbox, in milliseconds
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            broadcast_window_ms: 30_000,
            response_timeout_ms: 5_000,
            broadcast_attempt_timeout_ms: 1_000,
            poll_interval_ms: 500,
        }
    }
}

impl CoordinatorConfig {
    pub fn broadcast_window(&self) -> Duration {
        Duration::from_millis(self.broadcast_window_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn broadcast_attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.broadcast_attempt_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Worker timing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Delay between attempts to post into a full response mailbox, in milliseconds
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    /// Give up posting a response after this long, in milliseconds
    #[serde(rename = "response-post-timeout-ms")]
    pub response_post_timeout_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            response_post_timeout_ms: 10_000,
        }
    }
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn response_post_timeout(&self) -> Duration {
        Duration::from_millis(self.response_post_timeout_ms)
    }
}

/// Registry storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// JSON key-value file holding the known worker list
    #[serde(rename = "store-path")]
    pub store_path: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            store_path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("botnet")
                .join(datastore::DEFAULT_FILE_NAME),
        }
    }
}
