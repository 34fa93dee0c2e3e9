//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Settings file
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8080"
//! system_name = "VariDial 1.0"
//! banner = "login.txt"
//! channels = true
//! login_timeout_secs = 120
//! idle_timeout_secs = 0      # 0 disables
//!
//! [directory]
//! users = "users.toml"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Every key is optional.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use varidial_service::{DEFAULT_SYSTEM_NAME, ServerConfig};

/// Whole settings file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Listener and session behavior
    pub server: ServerSettings,
    /// Where accounts come from
    pub directory: DirectorySettings,
    /// Log output
    pub logging: LoggingSettings,
}

/// `[server]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: SocketAddr,
    pub max_connections: usize,
    pub system_name: String,
    pub banner: Option<PathBuf>,
    pub channels: bool,
    /// Seconds per login answer, 0 disables
    pub login_timeout_secs: u64,
    /// Seconds of silence before a logged-in session is dropped, 0 disables
    pub idle_timeout_secs: u64,
    pub write_timeout_ms: u64,
    pub delivery_timeout_ms: u64,
    pub shutdown_timeout_secs: u64,
    pub outbound_buffer: usize,
    pub max_line_length: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        let config = ServerConfig::default();
        Self {
            bind: config.bind_address,
            max_connections: config.max_connections,
            system_name: DEFAULT_SYSTEM_NAME.to_string(),
            banner: None,
            channels: config.channels_enabled,
            login_timeout_secs: config.login_timeout.map_or(0, |t| t.as_secs()),
            idle_timeout_secs: 0,
            write_timeout_ms: config.write_timeout.as_millis() as u64,
            delivery_timeout_ms: config.delivery_timeout.as_millis() as u64,
            shutdown_timeout_secs: config.shutdown_timeout.as_secs(),
            outbound_buffer: config.outbound_buffer,
            max_line_length: config.max_line_length,
        }
    }
}

/// `[directory]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorySettings {
    /// Path of the user file
    pub users: PathBuf,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            users: PathBuf::from("users.toml"),
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn optional_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl Settings {
    /// Parse settings from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("invalid settings file")
    }

    /// Read a settings file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Read a settings file, falling back to defaults when it does not exist
    ///
    /// The flag tells whether the file was found.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<(Self, bool)> {
        let path = path.as_ref();
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            Ok((Self::load(path).await?, true))
        } else {
            Ok((Self::default(), false))
        }
    }

    /// Write these settings as TOML
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = toml::to_string_pretty(self).context("failed to serialize settings")?;
        tokio::fs::write(path, text)
            .await
            .with_context(|| format!("failed to write settings file {}", path.display()))
    }

    /// Build the server configuration
    pub fn server_config(&self) -> ServerConfig {
        let s = &self.server;
        let mut config = ServerConfig::new(s.bind)
            .with_max_connections(s.max_connections)
            .with_system_name(s.system_name.clone())
            .with_channels(s.channels)
            .with_login_timeout(optional_secs(s.login_timeout_secs))
            .with_idle_timeout(optional_secs(s.idle_timeout_secs))
            .with_write_timeout(Duration::from_millis(s.write_timeout_ms))
            .with_delivery_timeout(Duration::from_millis(s.delivery_timeout_ms))
            .with_shutdown_timeout(Duration::from_secs(s.shutdown_timeout_secs))
            .with_outbound_buffer(s.outbound_buffer)
            .with_max_line_length(s.max_line_length);
        if let Some(banner) = &s.banner {
            config = config.with_banner_path(banner.clone());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());

        let config = settings.server_config();
        let defaults = ServerConfig::default();
        assert_eq!(config.bind_address, defaults.bind_address);
        assert_eq!(config.system_name, "VariDial 1.0");
        assert_eq!(config.login_timeout, defaults.login_timeout);
        assert_eq!(config.idle_timeout, None);
        assert_eq!(config.delivery_timeout, defaults.delivery_timeout);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections() {
        let settings = Settings::from_toml(
            r#"
            [server]
            bind = "127.0.0.1:2323"
            banner = "login.txt"
            channels = false
            login_timeout_secs = 0
            idle_timeout_secs = 900

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(settings.directory.users, PathBuf::from("users.toml"));
        assert_eq!(settings.logging.level, "debug");

        let config = settings.server_config();
        assert_eq!(config.bind_address, "127.0.0.1:2323".parse().unwrap());
        assert_eq!(config.banner_path, Some(PathBuf::from("login.txt")));
        assert!(!config.channels_enabled);
        assert_eq!(config.login_timeout, None);
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(900)));
    }

    #[test]
    fn test_bad_values_are_reported() {
        assert!(Settings::from_toml("[server]\nbind = \"nowhere\"").is_err());
        assert!(Settings::from_toml("[server]\nmax_connections = -1").is_err());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("varidial.toml");

        let (settings, found) = Settings::load_or_default(&path).await.unwrap();
        assert!(!found);

        let mut custom = settings;
        custom.server.system_name = "Night Owl BBS".to_string();
        custom.save(&path).await.unwrap();

        let (loaded, found) = Settings::load_or_default(&path).await.unwrap();
        assert!(found);
        assert_eq!(loaded, custom);
    }
}
