//! Configuration for connui.
//!
//! TOML file + `CONNUI_` environment layering via figment, validation,
//! translation to [`connui_core::SessionConfig`], and tracing subscriber
//! setup for the embedding application.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use connui_core::SessionConfig;
use connui_core::protocol;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to install tracing subscriber: {0}")]
    Tracing(String),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub bus: BusConfig,
    pub agent: AgentConfig,
    pub refresh: RefreshConfig,
    pub logging: LoggingConfig,
}

/// Where the connection manager lives on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BusConfig {
    /// Well-known bus name (e.g. "net.connman").
    pub service_name: String,
    pub manager_path: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            service_name: protocol::SERVICE.into(),
            manager_path: protocol::MANAGER_PATH.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Object path the agent is exported at.
    pub path: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            path: protocol::AGENT_PATH.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Scan an unpowered wifi technology while refreshing services.
    pub scan_on_refresh: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            scan_on_refresh: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            json: false,
        }
    }
}

impl Config {
    /// Check names and paths before they reach the bus.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_bus_name(&self.bus.service_name) {
            return Err(invalid(
                "bus.service_name",
                format!("'{}' is not a well-known bus name", self.bus.service_name),
            ));
        }
        if !is_object_path(&self.bus.manager_path) {
            return Err(invalid(
                "bus.manager_path",
                format!("'{}' is not an object path", self.bus.manager_path),
            ));
        }
        if !is_object_path(&self.agent.path) || self.agent.path == "/" {
            return Err(invalid(
                "agent.path",
                format!("'{}' is not an object path below the root", self.agent.path),
            ));
        }
        if let Err(e) = EnvFilter::try_new(&self.logging.level) {
            return Err(invalid("logging.level", e.to_string()));
        }
        Ok(())
    }

    pub fn to_session_config(&self) -> SessionConfig {
        SessionConfig {
            service_name: self.bus.service_name.clone(),
            manager_path: self.bus.manager_path.clone(),
            agent_path: self.agent.path.clone(),
            scan_on_refresh: self.refresh.scan_on_refresh,
        }
    }
}

/// Dot-separated elements of `[A-Za-z0-9_-]`, at least two, none
/// starting with a digit.
fn is_bus_name(name: &str) -> bool {
    let elements: Vec<&str> = name.split('.').collect();
    elements.len() >= 2
        && elements.iter().all(|element| {
            element
                .chars()
                .next()
                .is_some_and(|c| !c.is_ascii_digit())
                && element
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        })
}

fn is_object_path(path: &str) -> bool {
    if path == "/" {
        return true;
    }
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };
    rest.split('/').all(|segment| {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "connui", "connui").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("connui");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

fn figment_for(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CONNUI_").split("__"))
}

/// Load and validate the config at the canonical path plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load and validate the config at `path` plus environment. A missing
/// file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment_for(path).extract()?;
    config.validate()?;
    Ok(config)
}

/// Load config, returning a default if it is missing or invalid.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_else(|e| {
        warn!(error = %e, "falling back to default config");
        Config::default()
    })
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Logging ─────────────────────────────────────────────────────────

/// Install the global fmt subscriber. `RUST_LOG` takes precedence over
/// the configured level.
pub fn init_tracing(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)
            .map_err(|e| invalid("logging.level", e.to_string()))?,
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    let installed = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| ConfigError::Tracing(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_connection_manager() {
        let config = Config::default();
        assert!(config.validate().is_ok());

        let session = config.to_session_config();
        assert_eq!(session, SessionConfig::default());
    }

    #[test]
    fn bus_names_need_two_elements() {
        assert!(is_bus_name("net.connman"));
        assert!(is_bus_name("org.example.Net_Manager-2"));
        assert!(!is_bus_name("connman"));
        assert!(!is_bus_name("net..connman"));
        assert!(!is_bus_name("net.1connman"));
    }

    #[test]
    fn object_paths() {
        assert!(is_object_path("/"));
        assert!(is_object_path("/net/connman/agent_1"));
        assert!(!is_object_path("net/connman"));
        assert!(!is_object_path("/net/connman/"));
        assert!(!is_object_path("/net//connman"));
        assert!(!is_object_path("/net/conn-man"));
    }

    #[test]
    fn agent_may_not_sit_at_the_root() {
        let mut config = Config::default();
        config.agent.path = "/".into();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "agent.path"));
    }
}
