//! Configuration management for the MagicQ gateway
//!
//! Handles loading, parsing, and hot-reloading of YAML configuration files.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::GatewayError;

pub use watcher::ConfigWatcher;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub console: ConsoleConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiConfig>,
}

/// Console OSC connection
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConsoleConfig {
    /// Console IP or hostname; sends are refused without it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Console OSC port; 0 disables sending. Kept wide so out-of-range values
    /// load and are refused at send time.
    #[serde(default = "default_port")]
    pub port: u32,
    /// Local port for console status messages
    #[serde(default = "default_rx_port")]
    pub rx_port: u16,
    #[serde(default)]
    pub enable_feedback: bool,
    /// Re-send every inbound datagram to 127.0.0.1:forward_port
    #[serde(default)]
    pub forward_osc: bool,
    #[serde(default = "default_forward_port")]
    pub forward_port: u16,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_port(),
            rx_port: default_rx_port(),
            enable_feedback: false,
            forward_osc: false,
            forward_port: default_forward_port(),
        }
    }
}

impl ConsoleConfig {
    /// Destination for outbound messages, or why there is none
    pub fn send_target(&self) -> std::result::Result<(String, u16), GatewayError> {
        let host = self
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| GatewayError::ConfigIncomplete("no console host configured".into()))?;

        match u16::try_from(self.port) {
            Ok(port) if port > 0 => Ok((host.to_string(), port)),
            _ => Err(GatewayError::ConfigIncomplete(format!(
                "console port {} outside 1..65535",
                self.port
            ))),
        }
    }

    /// Whether a change requires rebinding the transport
    pub fn transport_changed(&self, other: &ConsoleConfig) -> bool {
        self.rx_port != other.rx_port
            || self.enable_feedback != other.enable_feedback
            || self.forward_osc != other.forward_osc
            || self.forward_port != other.forward_port
    }
}

/// HTTP API configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_api_port(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_yaml(&contents).with_context(|| format!("Invalid config file: {}", path))
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    ///
    /// A missing host or send port is not an error here: the gateway still
    /// starts, reports a bad config status and refuses to send.
    pub fn validate(&self) -> Result<()> {
        let console = &self.console;
        if console.enable_feedback && console.rx_port == 0 {
            anyhow::bail!("console.rx_port must be 1..65535 when feedback is enabled");
        }
        if console.forward_osc && console.forward_port == 0 {
            anyhow::bail!("console.forward_port must be 1..65535 when forwarding is enabled");
        }
        if let Some(api) = &self.api {
            if api.enabled && api.port == 0 {
                anyhow::bail!("api.port cannot be 0");
            }
        }
        Ok(())
    }

    /// API settings if the API is enabled
    pub fn api_enabled(&self) -> Option<&ApiConfig> {
        self.api.as_ref().filter(|api| api.enabled)
    }
}

// Default value functions
fn default_port() -> u32 { 8000 }
fn default_rx_port() -> u16 { 9000 }
fn default_forward_port() -> u16 { 9001 }
fn default_api_port() -> u16 { crate::api::DEFAULT_API_PORT }
fn default_true() -> bool { true }
