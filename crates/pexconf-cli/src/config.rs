//! CLI configuration.
//!
//! All settings live in `~/.config/pexconf/config.toml` by default:
//!
//! ```toml
//! [identity]
//! display_name = "Alice"
//!
//! [conference]
//! address = "room@example.com"
//! pin = "env::ROOM_PIN"
//!
//! [network]
//! request_timeout_secs = 30
//!
//! [logging]
//! format = "json"
//! ```
//!
//! `pin` supports secret references (see [`crate::secret`]).

use std::path::{Path, PathBuf};
use std::time::Duration;

use pexconf_client::HttpConfig;
use pexconf_core::{TracingConfig, TracingOutputFormat};
use pexconf_session::SessionConfig;
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::error::{CliError, CliResult};

/// Configuration for the `pexconf` binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub identity: IdentitySettings,
    pub conference: ConferenceSettings,
    pub network: NetworkSettings,
    pub logging: LoggingSettings,
}

/// Who we are in conferences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySettings {
    pub display_name: String,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            display_name: "pexconf".to_string(),
        }
    }
}

/// Default conference to use when none is given on the command line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConferenceSettings {
    pub address: Option<String>,

    /// PIN (supports `pass::` and `env::` prefixes).
    pub pin: Option<String>,

    pub conference_extension: Option<String>,
}

/// Timeouts and reconnect tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub request_timeout_secs: u64,
    pub token_timeout_secs: u64,
    pub min_reconnect_delay_ms: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            token_timeout_secs: 30,
            min_reconnect_delay_ms: 500,
        }
    }
}

impl NetworkSettings {
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig::default().with_request_timeout(Duration::from_secs(self.request_timeout_secs))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_token_timeout(Duration::from_secs(self.token_timeout_secs))
            .with_min_reconnect_delay(Duration::from_millis(self.min_reconnect_delay_ms))
    }
}

/// Log output when `--debug` is not given.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `pretty`, `compact` or `json`.
    pub format: String,

    /// Default level; `RUST_LOG` still wins.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: "compact".to_string(),
            level: "warn".to_string(),
        }
    }
}

impl LoggingSettings {
    pub fn tracing_config(&self) -> CliResult<TracingConfig> {
        let format: TracingOutputFormat = self
            .format
            .parse()
            .map_err(|e| CliError::Config(format!("[logging] format: {e}")))?;
        let level: Level = self
            .level
            .parse()
            .map_err(|_| CliError::Config(format!("[logging] level: unknown level {:?}", self.level)))?;
        Ok(TracingConfig::default().with_format(format).with_level(level))
    }
}

impl CliConfig {
    /// Loads configuration from the default path, or defaults if it does
    /// not exist.
    pub fn load() -> CliResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CliError::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| CliError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pexconf")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_sections_use_defaults() {
        let config: CliConfig = toml::from_str("[conference]\naddress = \"room@example.com\"\n").unwrap();
        assert_eq!(config.conference.address.as_deref(), Some("room@example.com"));
        assert_eq!(config.identity.display_name, "pexconf");
        assert_eq!(config.network.request_timeout_secs, 30);
        assert_eq!(config.logging.format, "compact");
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[identity]
display_name = "Alice"

[conference]
address = "room@example.com"
pin = "env::ROOM_PIN"

[network]
token_timeout_secs = 5
min_reconnect_delay_ms = 250

[logging]
format = "json"
level = "debug"
"#
        )
        .unwrap();

        let config = CliConfig::load_from(file.path()).unwrap();
        assert_eq!(config.identity.display_name, "Alice");
        assert_eq!(config.conference.pin.as_deref(), Some("env::ROOM_PIN"));

        let session = config.network.session_config();
        assert_eq!(session.token_timeout, Duration::from_secs(5));
        assert_eq!(session.min_reconnect_delay, Duration::from_millis(250));
        assert_eq!(session.request_timeout, Duration::from_secs(30));

        let tracing = config.logging.tracing_config().unwrap();
        assert_eq!(tracing.output_format, TracingOutputFormat::Json);
        assert_eq!(tracing.default_level, Level::DEBUG);
    }

    #[test]
    fn rejects_bad_logging_values() {
        let logging = LoggingSettings {
            format: "xml".to_string(),
            ..LoggingSettings::default()
        };
        assert!(matches!(logging.tracing_config(), Err(CliError::Config(_))));
    }

    #[test]
    fn unreadable_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = CliConfig::load_from(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(CliError::Config(ref msg)) if msg.contains("failed to read")));
    }

    #[test]
    fn dumps_as_toml() {
        let text = toml::to_string_pretty(&CliConfig::default()).unwrap();
        assert!(text.contains("[network]"));
        assert!(text.contains("request_timeout_secs = 30"));
    }
}
