//! TOML-based configuration for the responder daemon.
//!
//! Every field has a serde default so a missing file, or an older file
//! missing newer fields, still yields a working configuration.  Example:
//!
//! ```toml
//! log_level = "info"
//!
//! [network]
//! bind_address = "0.0.0.0"
//! port = 1234
//!
//! [sessions]
//! extension = "slsess"
//!
//! [probe]
//! enabled = true
//! interval_secs = 1
//! ```
//!
//! CLI flags override whatever the file says; see `main.rs`.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    /// `RUST_LOG` overrides this when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
}

/// Bind-address and port settings for the discovery socket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// IP address to bind the discovery socket to.  `"0.0.0.0"` binds all
    /// interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
    /// UDP port for discovery requests.  0 asks the OS for an ephemeral port.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Settings for the session-directory scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionsConfig {
    /// Filename extension (without the dot) that marks a session file.
    #[serde(default = "default_extension")]
    pub extension: String,
}

/// Settings for the periodic self-test prober.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeConfig {
    /// Whether the prober runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between self-test requests.
    #[serde(default = "default_probe_interval")]
    pub interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            network: NetworkConfig::default(),
            sessions: SessionsConfig::default(),
            probe: ProbeConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_secs: default_probe_interval(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from `path`, or returns defaults when no path is
    /// given or the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file exists but cannot be read or
    /// parsed; both are fatal at startup.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_bind_address() -> IpAddr {
    "0.0.0.0".parse().expect("valid literal")
}

fn default_port() -> u16 {
    // The port the reference responder has always listened on.
    1234
}

fn default_extension() -> String {
    crate::sessions::SESSION_EXTENSION.to_string()
}

fn default_true() -> bool {
    true
}

fn default_probe_interval() -> u64 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_path_yields_defaults() {
        let cfg = AppConfig::load(None).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.network.port, 1234);
        assert!(cfg.probe.enabled);
    }

    #[test]
    fn test_nonexistent_file_yields_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = AppConfig::load(Some(&dir.path().join("slsd.toml"))).unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[network]\nport = 7777").unwrap();

        let cfg = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.network.port, 7777);
        assert_eq!(cfg.network.bind_address, default_bind_address());
        assert_eq!(cfg.sessions.extension, "slsess");
        assert_eq!(cfg.probe.interval_secs, 1);
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn test_session_extension_is_configurable() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sessions]\nextension = \"sl2sess\"").unwrap();

        let cfg = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.sessions.extension, "sl2sess");
        // Unrelated sections keep their defaults.
        assert_eq!(cfg.network.port, 1234);
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "network = 'not a table'").unwrap();

        assert!(matches!(
            AppConfig::load(Some(file.path())),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let cfg = AppConfig::default();
        let text = toml::to_string(&cfg).unwrap();
        let back: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, cfg);
    }
}
