use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use tether_net::Limits;

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProtocolConfig {
    /// URL schemes this protocol claims, compared case-insensitively.
    pub schemes: Vec<String>,
    pub timeouts: TimeoutConfig,
    pub auth: AuthConfig,
    pub limits: LimitsConfig,
    pub headers: HeaderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    pub connect_ms: u64,
    pub read_ms: u64,
    pub write_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthConfig {
    /// Additional attempts allowed after the first one for a single logical request.
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_header_bytes: usize,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HeaderConfig {
    /// Sent when the request has no `User-Agent`; empty disables it.
    pub user_agent: String,
    pub accept_compressed: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            schemes: vec!["http".to_string(), "https".to_string()],
            timeouts: TimeoutConfig::default(),
            auth: AuthConfig::default(),
            limits: LimitsConfig::default(),
            headers: HeaderConfig::default(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 30_000,
            read_ms: 60_000,
            write_ms: 60_000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { max_retries: 2 }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            max_header_bytes: limits.max_header_bytes,
            max_body_bytes: limits.max_body_bytes,
        }
    }
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("tether/", env!("CARGO_PKG_VERSION")).to_string(),
            accept_compressed: true,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_ms)
    }

    pub fn write(&self) -> Duration {
        Duration::from_millis(self.write_ms)
    }
}

impl LimitsConfig {
    pub fn to_limits(&self) -> Limits {
        Limits {
            max_header_bytes: self.max_header_bytes,
            max_body_bytes: self.max_body_bytes,
        }
    }
}

impl ProtocolConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            Self::from_toml_str(&raw)
        } else {
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn claims_scheme(&self, scheme: &str) -> bool {
        self.schemes
            .iter()
            .any(|claimed| claimed.eq_ignore_ascii_case(scheme))
    }
}
