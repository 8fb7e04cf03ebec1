// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Data server configuration.
//!
//! The configuration lives in the data directory, either as `dserver.toml`:
//!
//! ```toml
//! [server]
//! port = 9572
//! environment = "SVT"
//!
//! [[sources]]
//! name = "Address"
//! type = "CSV"
//! delimiter = "|"
//! ```
//!
//! or as a legacy `dserver.ini` (see [`legacy`]).

pub mod legacy;

use dserver_proto::{SourceKind, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PORT};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Preferred config file name inside the data directory.
pub const CONFIG_FILE: &str = "dserver.toml";

/// Legacy config file name inside the data directory.
pub const LEGACY_CONFIG_FILE: &str = "dserver.ini";

/// Environment variable naming the data directory.
pub const DATA_DIR_ENV: &str = "DSERVER_DIR";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("no {CONFIG_FILE} or {LEGACY_CONFIG_FILE} in {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,

    /// Data sources, in handle order.
    #[serde(default)]
    pub sources: Vec<SourceDefinition>,
}

/// Listener and environment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Address to bind to (default: 0.0.0.0)
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// TCP port to listen on; 0 picks an ephemeral port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Sub-directory of the data directory holding the `.dat` files
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Maximum request line length (bytes)
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

/// One data source entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDefinition {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: SourceKind,

    /// Field delimiter reported to clients
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Separator between tag and value in keyed sequence and hashed files
    #[serde(default = "default_tag_delimiter")]
    pub tag_delimiter: String,
}

impl SourceDefinition {
    pub fn new(name: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            delimiter: default_delimiter(),
            tag_delimiter: default_tag_delimiter(),
        }
    }
}

fn default_bind_address() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

pub(crate) fn default_environment() -> String {
    "SVT".to_string()
}

fn default_max_message_size() -> usize {
    DEFAULT_MAX_MESSAGE_SIZE
}

pub(crate) fn default_delimiter() -> String {
    ",".to_string()
}

pub(crate) fn default_tag_delimiter() -> String {
    ":".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            environment: default_environment(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = read(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a legacy INI file.
    pub fn from_ini<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = read(path)?;
        let config = legacy::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Locate and load the configuration for a data directory.
    ///
    /// An explicit path wins; otherwise `dserver.toml`, then `dserver.ini`.
    /// Files ending in `.ini` are read with the legacy parser.
    pub fn discover(data_dir: &Path, explicit: Option<&Path>) -> Result<(Self, PathBuf), ConfigError> {
        let candidates: Vec<PathBuf> = match explicit {
            Some(path) => vec![path.to_path_buf()],
            None => vec![data_dir.join(CONFIG_FILE), data_dir.join(LEGACY_CONFIG_FILE)],
        };

        for path in candidates {
            if explicit.is_none() && !path.is_file() {
                continue;
            }
            let is_ini = path.extension().is_some_and(|ext| ext == "ini");
            let config = if is_ini {
                Self::from_ini(&path)?
            } else {
                Self::from_file(&path)?
            };
            return Ok((config, path));
        }

        Err(ConfigError::NotFound(data_dir.to_path_buf()))
    }

    /// Socket address to listen on.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.bind_address, self.server.port)
    }

    /// Directory holding the `.dat` files.
    pub fn environment_dir(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.server.environment)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.environment.trim().is_empty() {
            return Err(ConfigError::Invalid("environment cannot be empty".into()));
        }
        if self.server.max_message_size == 0 {
            return Err(ConfigError::Invalid(
                "max_message_size cannot be 0".into(),
            ));
        }

        let mut seen = HashSet::new();
        for (i, source) in self.sources.iter().enumerate() {
            if source.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("Source {} has no name", i)));
            }
            if source.name.contains(dserver_proto::FIELD_SEPARATOR) {
                return Err(ConfigError::Invalid(format!(
                    "Source name '{}' contains '|'",
                    source.name
                )));
            }
            if !seen.insert(source.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "Duplicate source name '{}'",
                    source.name
                )));
            }
            if source.delimiter.is_empty() || source.tag_delimiter.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "Source '{}' has an empty delimiter",
                    source.name
                )));
            }
        }
        Ok(())
    }
}

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.server.port, 9572);
        assert_eq!(config.server.environment, "SVT");
        assert!(config.sources.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let config: ServerConfig = toml::from_str(
            r#"
            [server]
            port = 9600
            environment = "PROD"

            [[sources]]
            name = "Address"
            type = "CSV"
            delimiter = "|"

            [[sources]]
            name = "Accounts"
            type = "Keyed"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9600);
        assert_eq!(config.server.environment, "PROD");
        assert_eq!(config.sources.len(), 2);
        assert_eq!(config.sources[0].kind, SourceKind::Csv);
        assert_eq!(config.sources[0].delimiter, "|");
        assert_eq!(config.sources[1].kind, SourceKind::Keyed);
        assert_eq!(config.sources[1].delimiter, ",");
        assert_eq!(config.sources[1].tag_delimiter, ":");
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let result: Result<ServerConfig, _> = toml::from_str(
            r#"
            [[sources]]
            name = "Barcodes"
            type = "Barcodes"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_duplicate_names() {
        let config = ServerConfig {
            sources: vec![
                SourceDefinition::new("Seq", SourceKind::Sequence),
                SourceDefinition::new("Seq", SourceKind::Counter),
            ],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_empty_environment() {
        let mut config = ServerConfig::default();
        config.server.environment = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_discover_prefers_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "[server]\nport = 9001\n").unwrap();
        std::fs::write(dir.path().join(LEGACY_CONFIG_FILE), "Port=9002\n").unwrap();

        let (config, path) = ServerConfig::discover(dir.path(), None).unwrap();
        assert_eq!(config.server.port, 9001);
        assert_eq!(path, dir.path().join(CONFIG_FILE));
    }

    #[test]
    fn test_discover_falls_back_to_ini() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(LEGACY_CONFIG_FILE),
            "[Config]\nPort=9002\n[Data]\nDescription=Seq:Sequence:{}\n",
        )
        .unwrap();

        let (config, _) = ServerConfig::discover(dir.path(), None).unwrap();
        assert_eq!(config.server.port, 9002);
        assert_eq!(config.sources.len(), 1);
    }

    #[test]
    fn test_discover_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ServerConfig::discover(dir.path(), None),
            Err(ConfigError::NotFound(_))
        ));
    }
}
