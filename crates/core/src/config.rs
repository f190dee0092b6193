use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub mode: OperatingMode,
    pub addressing: AddressingConfig,
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Naming scheme used to build and validate entity addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressingConfig {
    pub scheme: String,
    pub naming_authority: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Data source name preferred when a query does not list sources.
    pub default_preferred: String,
}

/// Deployment mode. Only `Play` allows stored meter data to be replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingMode {
    Play,
    #[default]
    Demo,
    Live,
}

impl OperatingMode {
    #[must_use]
    pub const fn permits_replay(self) -> bool {
        matches!(self, Self::Play)
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Play => "play",
            Self::Demo => "demo",
            Self::Live => "live",
        };
        f.write_str(name)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            mode: OperatingMode::default(),
            addressing: AddressingConfig::default(),
            sources: SourcesConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://bvp.db".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for AddressingConfig {
    fn default() -> Self {
        Self {
            scheme: "ea1".to_string(),
            naming_authority: "2018-06.com.a1-bvp".to_string(),
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            default_preferred: "MDC".to_string(),
        }
    }
}
