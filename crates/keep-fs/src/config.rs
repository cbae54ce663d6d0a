use crate::workspace::WorkspacePaths;
use keep_core::{KeepError, KeepResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

pub const CONFIG_VERSION: u32 = 1;
pub const DEFAULT_SERVER_URL: &str = "https://keep.kevindupas.com/api";
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub server: String,
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_sync_interval() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl WorkspaceConfig {
    pub fn with_server(server: impl Into<String>) -> Self {
        Self {
            version: CONFIG_VERSION,
            server: server.into(),
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }

    pub fn ensure_defaults(&mut self) {
        if self.version == 0 {
            self.version = CONFIG_VERSION;
        }
        if self.server.trim().is_empty() {
            self.server = DEFAULT_SERVER_URL.to_string();
        }
        if self.sync_interval_secs == 0 {
            self.sync_interval_secs = DEFAULT_SYNC_INTERVAL_SECS;
        }
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = DEFAULT_REQUEST_TIMEOUT_SECS;
        }
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Server to talk to, with a command-line override taking precedence.
    pub fn resolve_server(&self, server_override: Option<&str>) -> String {
        server_override
            .map(str::trim)
            .filter(|server| !server.is_empty())
            .unwrap_or(self.server.as_str())
            .to_string()
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self::with_server(DEFAULT_SERVER_URL)
    }
}

pub fn load_config(paths: &WorkspacePaths) -> KeepResult<WorkspaceConfig> {
    let contents = fs::read_to_string(&paths.config_path).map_err(|err| {
        KeepError::io(format!(
            "failed to read workspace config '{}': {}",
            paths.config_path.display(),
            err
        ))
    })?;

    let mut config: WorkspaceConfig = toml::from_str(&contents).map_err(|err| {
        KeepError::io(format!(
            "failed to parse workspace config '{}': {}",
            paths.config_path.display(),
            err
        ))
    })?;
    config.ensure_defaults();
    Ok(config)
}

pub fn save_config(paths: &WorkspacePaths, config: &WorkspaceConfig) -> KeepResult<()> {
    let serialized = toml::to_string_pretty(config)
        .map_err(|err| KeepError::io(format!("failed to encode config.toml: {err}")))?;

    fs::write(&paths.config_path, serialized).map_err(|err| {
        KeepError::io(format!(
            "failed to write workspace config '{}': {}",
            paths.config_path.display(),
            err
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let mut config: WorkspaceConfig = toml::from_str("").expect("parse empty config");
        config.ensure_defaults();

        assert_eq!(config, WorkspaceConfig::default());
        assert_eq!(config.sync_interval(), Duration::from_secs(60));
    }

    #[test]
    fn server_override_wins_unless_blank() {
        let config = WorkspaceConfig::with_server("https://notes.example.com/api");
        assert_eq!(
            config.resolve_server(Some("http://localhost:8000/api")),
            "http://localhost:8000/api"
        );
        assert_eq!(
            config.resolve_server(Some("  ")),
            "https://notes.example.com/api"
        );
        assert_eq!(config.resolve_server(None), "https://notes.example.com/api");
    }
}
