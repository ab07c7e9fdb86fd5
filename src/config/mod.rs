//! # Configuration Management Module
//!
//! Typed TOML configuration for the daemon. Every section has defaults so a
//! starter file can be produced with `arcomd init`, and values from the
//! command line (device, listen port, simulation, PID file) override what
//! the file says.
//!
//! ## Configuration Structure
//!
//! - [`ServerConfig`] - identity, listen address, credential store, TLS
//! - [`SerialConfig`] - controller device and line settings
//! - [`CommandCodes`] - literal code strings for each [`Command`]
//! - [`StorageConfig`] - history persistence
//! - [`LoggingConfig`] - log level and log files
//! - [`WeblogConfig`] - interference web-form reporter
//!
//! ## Configuration File Format
//!
//! ```toml
//! [server]
//! identity = "W1ABC/R"
//! port = 45000
//!
//! [serial]
//! device = "/dev/ttyUSB0"
//!
//! [commands]
//! port1_disable = "4321"
//! port1_enable = "1234"
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::fs;

use crate::controller::Command;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub serial: SerialConfig,
    pub commands: CommandCodes,
    #[serde(default)]
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub weblog: WeblogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Label reported by `getIdentity` and `status`, usually the repeater call.
    pub identity: String,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_listen_port")]
    pub port: u16,
    /// `user:hash` credential store read at startup.
    #[serde(default = "default_password_file")]
    pub password_file: String,
    /// Directory served to authenticated GET requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid_file: Option<String>,
    /// Serve HTTPS instead of HTTP when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    45000
}

fn default_password_file() -> String {
    "arcom.passwd".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub certificate: String,
    pub private_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    pub device: String,
    /// The RC210 serial settings are fixed at 9600 8N1.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Run without a device; every command reports success.
    #[serde(default)]
    pub simulate: bool,
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_read_timeout_ms() -> u64 {
    100
}

/// Literal controller codes, as programmed into the RC210.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandCodes {
    pub port1_disable: String,
    pub port1_enable: String,
    pub port3_unbridge: String,
    pub port3_bridge: String,
    pub restart: String,
    /// Prefix; `MMDDYY` is appended.
    pub set_date: String,
    /// Prefix; `HHMMSS` is appended.
    pub set_time: String,
}

impl CommandCodes {
    pub fn code(&self, command: Command) -> &str {
        match command {
            Command::Port1Disable => &self.port1_disable,
            Command::Port1Enable => &self.port1_enable,
            Command::Port3Unbridge => &self.port3_unbridge,
            Command::Port3Bridge => &self.port3_bridge,
            Command::Restart => &self.restart,
            Command::SetDate => &self.set_date,
            Command::SetTime => &self.set_time,
        }
    }
}

impl Default for CommandCodes {
    fn default() -> Self {
        Self {
            port1_disable: "4321".to_string(),
            port1_enable: "1234".to_string(),
            port3_unbridge: "2222".to_string(),
            port3_bridge: "3333".to_string(),
            restart: "44444".to_string(),
            set_date: "5555".to_string(),
            set_time: "6666".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub history_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            history_file: "arcom.history".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    #[serde(default)]
    pub security_file: Option<String>,
}

/// Interference report posted to a web form (a Google Form in practice).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeblogConfig {
    pub enabled: bool,
    /// Form URL without the trailing `/formResponse` or `/viewform`.
    pub url_base: String,
    pub call_field: String,
    pub location_field: String,
    pub duration_field: String,
    pub timeout_seconds: u32,
    /// Browser agent string sent with the form POST; some form hosts
    /// refuse unknown clients.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Constant answers submitted with every report.
    #[serde(default)]
    pub extra_fields: BTreeMap<String, String>,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36"
        .to_string()
}

impl Default for WeblogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url_base: String::new(),
            call_field: "entry.1984381604".to_string(),
            location_field: "entry.773252163".to_string(),
            duration_field: "entry.530211156".to_string(),
            timeout_seconds: 10,
            user_agent: default_user_agent(),
            extra_fields: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let content = toml::to_string_pretty(&Config::default())
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Semantic checks that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.server.identity.trim().is_empty() {
            return Err(anyhow!("[server] identity must not be empty"));
        }
        if self.serial.baud_rate == 0 {
            return Err(anyhow!("[serial] baud_rate must be non-zero"));
        }
        if self.serial.device.trim().is_empty() && !self.serial.simulate {
            return Err(anyhow!("[serial] device must be set unless simulate = true"));
        }
        for command in Command::ALL {
            if self.commands.code(command).trim().is_empty() {
                return Err(anyhow!("[commands] code for {} is empty", command.label()));
            }
        }
        if self.weblog.enabled && self.weblog.url_base.trim().is_empty() {
            return Err(anyhow!("[weblog] url_base is required when enabled"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                identity: "W1ABC/R".to_string(),
                bind_address: default_bind_address(),
                port: default_listen_port(),
                password_file: default_password_file(),
                static_dir: None,
                pid_file: None,
                tls: None,
            },
            serial: SerialConfig {
                device: "/dev/ttyUSB0".to_string(),
                baud_rate: default_baud_rate(),
                read_timeout_ms: default_read_timeout_ms(),
                simulate: false,
            },
            commands: CommandCodes::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file: Some("arcom.log".to_string()),
                security_file: Some("arcom-security.log".to_string()),
            },
            weblog: WeblogConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_survives_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.server.identity, config.server.identity);
        assert_eq!(parsed.server.port, 45000);
        assert_eq!(parsed.serial.baud_rate, 9600);
        assert_eq!(parsed.commands, config.commands);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn minimal_file_fills_defaults() {
        let text = r#"
            [server]
            identity = "KG7AUL"

            [serial]
            device = "/dev/ttyS1"

            [commands]
            port1_disable = "11"
            port1_enable = "12"
            port3_unbridge = "13"
            port3_bridge = "14"
            restart = "15"
            set_date = "16"
            set_time = "17"

            [logging]
            level = "debug"
        "#;
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.server.password_file, "arcom.passwd");
        assert_eq!(config.serial.read_timeout_ms, 100);
        assert!(!config.serial.simulate);
        assert_eq!(config.storage.history_file, "arcom.history");
        assert!(!config.weblog.enabled);
        assert_eq!(config.commands.code(Command::Restart), "15");
        assert_eq!(config.commands.code(Command::SetTime), "17");
    }

    #[test]
    fn validate_rejects_empty_code() {
        let mut config = Config::default();
        config.commands.port3_bridge = "  ".to_string();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("port3Bridge"), "{err}");
    }

    #[test]
    fn weblog_section_without_agent_uses_browser_default() {
        let text = r#"
            enabled = true
            url_base = "https://docs.example.com/forms/d/abc123"
            call_field = "entry.1"
            location_field = "entry.2"
            duration_field = "entry.3"
            timeout_seconds = 5
        "#;
        let weblog: WeblogConfig = toml::from_str(text).unwrap();
        assert_eq!(weblog.user_agent, default_user_agent());
        assert!(weblog.extra_fields.is_empty());
    }

    #[test]
    fn validate_rejects_enabled_weblog_without_url() {
        let mut config = Config::default();
        config.weblog.enabled = true;
        assert!(config.validate().is_err());
    }
}
