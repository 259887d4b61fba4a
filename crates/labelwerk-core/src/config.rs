// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration, loaded from a JSON file.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LabelwerkError, Result};

/// Accepted values for `logger.level`.
pub const LOG_LEVELS: &[&str] = &["debug", "info", "warn", "error"];

/// Accepted values for `logger.format`.
pub const LOG_FORMATS: &[&str] = &["text", "json"];

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Capacity of every per-printer task buffer.
    pub queue_buffer_size: usize,
    /// Timeout for opening a printer connection, in milliseconds.
    pub connect_timeout_ms: u64,
    /// How long shutdown waits for the queues to drain.
    pub graceful_timeout_secs: u64,
    pub server: ServerConfig,
    pub logger: LoggerConfig,
    pub database: DatabaseConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            queue_buffer_size: 16,
            connect_timeout_ms: 5_000,
            graceful_timeout_secs: 15,
            server: ServerConfig::default(),
            logger: LoggerConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `host:port` the API listens on.
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".into(),
        }
    }
}

/// Logging sink settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// `stdout` or a file path (appended to).
    pub destination: String,
    pub level: String,
    pub format: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            destination: "stdout".into(),
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// SQLite database settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file. `None` keeps everything in memory.
    pub path: Option<PathBuf>,
}

impl AppConfig {
    /// Parse configuration from a JSON reader and validate it.
    pub fn load(mut reader: impl Read) -> Result<Self> {
        let mut data = String::new();
        reader.read_to_string(&mut data)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Open and parse a configuration file.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref()).map_err(|e| {
            LabelwerkError::Config(format!("open {}: {e}", path.as_ref().display()))
        })?;
        Self::load(file)
    }

    pub fn validate(&self) -> Result<()> {
        if self.queue_buffer_size == 0 {
            return Err(LabelwerkError::Config(
                "queue_buffer_size must be at least 1".into(),
            ));
        }
        let listen_port = self
            .server
            .addr
            .rsplit_once(':')
            .filter(|(host, _)| !host.is_empty())
            .and_then(|(_, port)| port.parse::<u16>().ok());
        if listen_port.is_none() {
            return Err(LabelwerkError::Config(format!(
                "server.addr {:?} is not host:port",
                self.server.addr
            )));
        }
        if !LOG_LEVELS.contains(&self.logger.level.as_str()) {
            return Err(LabelwerkError::Config(format!(
                "unknown logging level {:?}, supported: {}",
                self.logger.level,
                LOG_LEVELS.join(", ")
            )));
        }
        if !LOG_FORMATS.contains(&self.logger.format.as_str()) {
            return Err(LabelwerkError::Config(format!(
                "unknown logger format {:?}, supported: {}",
                self.logger.format,
                LOG_FORMATS.join(", ")
            )));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn graceful_timeout(&self) -> Duration {
        Duration::from_secs(self.graceful_timeout_secs)
    }
}
