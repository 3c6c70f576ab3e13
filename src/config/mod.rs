//! Configuration module for the Arduino bridge
//!
//! Configuration is a single TOML file. Every field has a default, so an
//! empty or partial file is valid.
//!
//! # Lookup Order
//!
//! 1. An explicit path (the `--config` flag)
//! 2. The `ARDUINO_BRIDGE_CONFIG` environment variable
//! 3. `<config dir>/arduino-bridge/config.toml`:
//!    - **Linux**: `~/.config/arduino-bridge/config.toml`
//!    - **macOS**: `~/Library/Application Support/arduino-bridge/config.toml`
//!    - **Windows**: `%APPDATA%\arduino-bridge\config.toml`
//! 4. Built-in defaults
//!
//! An explicitly named file must exist; the default location may be absent.
//!
//! # Example
//!
//! ```toml
//! [controller]
//! endpoint = "tcp://*:38782"
//! probe_retry_delay_ms = 500
//!
//! [controller.simulator]
//! failed_probes = 2
//! analog_pattern = { kind = "sine", frequency_hz = 0.5, amplitude = 400.0 }
//!
//! [bridge]
//! topic = "eim/arduino"
//! ```

use crate::bridge::BridgeSettings;
use crate::controller::ControllerSettings;
use crate::error::{BridgeError, Result};
use crate::hardware::{AnalogPattern, SimulatedConnector};
use crate::supervisor::ControllerCommand;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier used for the config directory
pub const APP_ID: &str = "arduino-bridge";

/// Config file name inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "ARDUINO_BRIDGE_CONFIG";

/// Default config file location, if the platform has a config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub bridge: ClientConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[controller]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Reply endpoint to bind
    #[serde(default = "default_controller_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_probe_retry_delay_ms")]
    pub probe_retry_delay_ms: u64,
    #[serde(default = "default_status_pin")]
    pub status_pin: u8,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

fn default_controller_endpoint() -> String {
    "tcp://*:38782".to_string()
}

fn default_poll_interval_ms() -> u64 {
    50
}

fn default_probe_retry_delay_ms() -> u64 {
    500
}

fn default_status_pin() -> u8 {
    13
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_controller_endpoint(),
            poll_interval_ms: default_poll_interval_ms(),
            probe_retry_delay_ms: default_probe_retry_delay_ms(),
            status_pin: default_status_pin(),
            simulator: SimulatorConfig::default(),
        }
    }
}

impl ControllerConfig {
    pub fn settings(&self) -> ControllerSettings {
        ControllerSettings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            probe_retry_delay: Duration::from_millis(self.probe_retry_delay_ms),
            status_pin: self.status_pin,
        }
    }
}

/// `[controller.simulator]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Probes that fail before the simulated board appears
    #[serde(default)]
    pub failed_probes: u32,
    #[serde(default)]
    pub analog_pattern: AnalogPattern,
}

impl SimulatorConfig {
    pub fn connector(&self) -> SimulatedConnector {
        SimulatedConnector::new(self.failed_probes, self.analog_pattern)
    }
}

/// `[bridge]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Controller endpoint to connect to
    #[serde(default = "default_client_endpoint")]
    pub controller_endpoint: String,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_init_topic")]
    pub init_topic: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How long the bus receiver waits per read before rechecking its stop flag
    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,
}

fn default_client_endpoint() -> String {
    "tcp://localhost:38782".to_string()
}

fn default_topic() -> String {
    "eim/arduino".to_string()
}

fn default_init_topic() -> String {
    "eim/arduino/init".to_string()
}

fn default_receive_timeout_ms() -> u64 {
    100
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            controller_endpoint: default_client_endpoint(),
            topic: default_topic(),
            init_topic: default_init_topic(),
            poll_interval_ms: default_poll_interval_ms(),
            receive_timeout_ms: default_receive_timeout_ms(),
        }
    }
}

impl ClientConfig {
    pub fn settings(&self) -> BridgeSettings {
        BridgeSettings {
            topic: self.topic.clone(),
            init_topic: self.init_topic.clone(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

/// `[bus]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_subscribe_endpoint")]
    pub subscribe_endpoint: String,
    #[serde(default = "default_publish_endpoint")]
    pub publish_endpoint: String,
}

fn default_subscribe_endpoint() -> String {
    "tcp://127.0.0.1:16103".to_string()
}

fn default_publish_endpoint() -> String {
    "tcp://127.0.0.1:16130".to_string()
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            subscribe_endpoint: default_subscribe_endpoint(),
            publish_endpoint: default_publish_endpoint(),
        }
    }
}

/// `[supervisor]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Controller executable; the running executable when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<PathBuf>,
    #[serde(default = "default_controller_args")]
    pub args: Vec<String>,
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

fn default_controller_args() -> Vec<String> {
    vec!["controller".to_string()]
}

fn default_shutdown_timeout_ms() -> u64 {
    3000
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: default_controller_args(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

impl SupervisorConfig {
    /// Command that launches the controller
    pub fn command(&self) -> Result<ControllerCommand> {
        let program = match &self.program {
            Some(program) => program.clone(),
            None => std::env::current_exe().map_err(|e| {
                BridgeError::Config(format!("Could not determine current executable: {}", e))
            })?,
        };
        Ok(ControllerCommand::new(program).args(self.args.iter().cloned()))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Directory for daily rolling log files; stderr only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

fn default_log_filter() -> String {
    "info,arduino_bridge=debug".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            directory: None,
        }
    }
}

/// Where a configuration was (or would be) read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Named by flag or environment; must exist
    Explicit(PathBuf),
    /// Platform default location; may be absent
    Default(PathBuf),
    /// No location available
    BuiltIn,
}

impl ConfigSource {
    /// Resolve the config location following the lookup order
    pub fn resolve(explicit: Option<&Path>) -> Self {
        if let Some(path) = explicit {
            return ConfigSource::Explicit(path.to_path_buf());
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            return ConfigSource::Explicit(PathBuf::from(path));
        }
        match default_config_path() {
            Some(path) => ConfigSource::Default(path),
            None => ConfigSource::BuiltIn,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::Explicit(path) | ConfigSource::Default(path) => Some(path.as_path()),
            ConfigSource::BuiltIn => None,
        }
    }
}

impl BridgeConfig {
    /// Load from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::parse(&content)
            .map_err(|e| e.with_context(format!("Failed to parse config file {:?}", path)))
    }

    /// Parse TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| BridgeError::Config(e.to_string()))
    }

    /// Load following the lookup order
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, ConfigSource)> {
        let source = ConfigSource::resolve(explicit);
        let config = match &source {
            ConfigSource::Explicit(path) => Self::load(path)?,
            ConfigSource::Default(path) if path.exists() => Self::load(path)?,
            ConfigSource::Default(_) | ConfigSource::BuiltIn => Self::default(),
        };
        Ok((config, source))
    }

    /// Load from a file, returning defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Render as TOML text
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| BridgeError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Save to a file, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                BridgeError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        std::fs::write(path, self.to_toml()?).map_err(|e| {
            BridgeError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_is_defaults() {
        assert_eq!(BridgeConfig::parse("").unwrap(), BridgeConfig::default());
    }

    #[test]
    fn test_defaults_match_wire_constants() {
        let config = BridgeConfig::default();
        assert_eq!(config.controller.endpoint, "tcp://*:38782");
        assert_eq!(config.bridge.controller_endpoint, "tcp://localhost:38782");
        assert_eq!(config.bridge.topic, "eim/arduino");
        assert_eq!(config.bridge.init_topic, "eim/arduino/init");
        assert_eq!(config.controller.settings(), ControllerSettings::default());
        assert_eq!(config.bridge.settings(), BridgeSettings::default());
        assert_eq!(config.supervisor.args, ["controller"]);
    }

    #[test]
    fn test_partial_sections() {
        let config = BridgeConfig::parse(
            r#"
[controller]
probe_retry_delay_ms = 10

[controller.simulator]
failed_probes = 3
analog_pattern = { kind = "counter", step = 8 }

[bridge]
topic = "eim/nano"
"#,
        )
        .unwrap();

        assert_eq!(config.controller.probe_retry_delay_ms, 10);
        assert_eq!(config.controller.poll_interval_ms, 50);
        assert_eq!(config.controller.simulator.failed_probes, 3);
        assert_eq!(
            config.controller.simulator.analog_pattern,
            AnalogPattern::Counter { step: 8 }
        );
        assert_eq!(config.bridge.topic, "eim/nano");
        assert_eq!(config.bridge.init_topic, "eim/arduino/init");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        assert!(matches!(
            BridgeConfig::parse("[controller\n"),
            Err(BridgeError::Config(_))
        ));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = BridgeConfig::default();
        config.logging.directory = Some(dir.path().join("logs"));
        config.supervisor.program = Some(PathBuf::from("/usr/local/bin/arduino-bridge"));
        config.save(&path).unwrap();

        assert_eq!(BridgeConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let dir = TempDir::new().unwrap();
        let config = BridgeConfig::load_or_default(dir.path().join("missing.toml"));
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_supervisor_command_uses_configured_program() {
        let config = SupervisorConfig {
            program: Some(PathBuf::from("/opt/controller")),
            args: vec!["controller".into(), "--endpoint".into(), "tcp://*:5000".into()],
            shutdown_timeout_ms: 10,
        };
        let command = config.command().unwrap();
        assert_eq!(command.program, PathBuf::from("/opt/controller"));
        assert_eq!(command.args.len(), 3);
    }

    #[test]
    #[serial]
    fn test_explicit_path_wins_over_env() {
        std::env::set_var(CONFIG_ENV, "/from/env.toml");
        let source = ConfigSource::resolve(Some(Path::new("/from/flag.toml")));
        std::env::remove_var(CONFIG_ENV);
        assert_eq!(source, ConfigSource::Explicit(PathBuf::from("/from/flag.toml")));
    }

    #[test]
    #[serial]
    fn test_env_path_is_used_and_must_exist() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent.toml");
        std::env::set_var(CONFIG_ENV, &missing);
        let result = BridgeConfig::discover(None);
        std::env::remove_var(CONFIG_ENV);
        assert!(result.is_err());

        let present = dir.path().join("present.toml");
        std::fs::write(&present, "[bridge]\ntopic = \"eim/uno\"\n").unwrap();
        std::env::set_var(CONFIG_ENV, &present);
        let (config, source) = BridgeConfig::discover(None).unwrap();
        std::env::remove_var(CONFIG_ENV);
        assert_eq!(config.bridge.topic, "eim/uno");
        assert_eq!(source, ConfigSource::Explicit(present));
    }
}
