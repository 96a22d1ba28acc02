pub mod env;

use serde::Deserialize;

// Re-export section types owned by their components
pub use crate::alias::AliasConfig;
pub use crate::bus::BusConfig;

/// Complete gateway configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub alias: AliasConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// WebSocket server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3004
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default level for the crate when RUST_LOG is unset
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl LoggingConfig {
    /// EnvFilter directive used when RUST_LOG is unset
    pub fn directive(&self) -> String {
        format!("knot_gateway={}", self.level)
    }
}

const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

impl GatewayConfig {
    /// Check every section, reporting all problems in one message.
    pub fn validate(&self) -> Result<(), String> {
        let mut reasons = Vec::new();

        if self.server.port == 0 {
            reasons.push("server.port must be a valid port".to_string());
        }
        if self.bus.url.is_empty() {
            reasons.push("bus.url is required".to_string());
        }
        if self.bus.request_timeout_ms == 0 {
            reasons.push("bus.request_timeout_ms must be positive".to_string());
        }
        if self.alias.server_uri.is_empty() {
            reasons.push("alias.server_uri is required".to_string());
        }
        if self.alias.request_timeout_ms == 0 {
            reasons.push("alias.request_timeout_ms must be positive".to_string());
        }
        if !LEVELS.contains(&self.logging.level.as_str()) {
            reasons.push(format!(
                "logging.level must be one of [{}]",
                LEVELS.join(", ")
            ));
        }

        match reasons.len() {
            0 => Ok(()),
            1 => Err(reasons.remove(0)),
            _ => Err(format!(
                "\n{}",
                reasons
                    .iter()
                    .map(|r| format!("- {}", r))
                    .collect::<Vec<_>>()
                    .join("\n")
            )),
        }
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<GatewayConfig, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)?;
    let config: GatewayConfig = toml::from_str(&contents)?;
    Ok(config)
}
