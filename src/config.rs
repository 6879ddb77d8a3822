//! Connection settings for a Mythic server.
//!
//! Settings come from a JSON file or from environment variables. When a
//! file is given but can't be read, environment values are used instead.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MythicError, Result};

pub const DEFAULT_SERVER_PORT: u16 = 7443;
pub const SCRIPTING_VERSION: &str = "0.1.4";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MythicConfig {
    pub server_ip: String,
    #[serde(default = "default_port")]
    pub server_port: u16,
    #[serde(default = "default_ssl")]
    pub ssl: bool,
    /// Long-lived API token, sent as the `apitoken` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    /// JWT access token, used when no API token is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Default timeout for waits and HTTP requests. `None` waits forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_timeout_secs: Option<u64>,
    #[serde(default = "default_scripting_version")]
    pub scripting_version: String,
}

fn default_port() -> u16 {
    DEFAULT_SERVER_PORT
}

fn default_ssl() -> bool {
    true
}

fn default_scripting_version() -> String {
    SCRIPTING_VERSION.to_string()
}

impl MythicConfig {
    pub fn new(server_ip: impl Into<String>, server_port: u16, ssl: bool) -> Self {
        Self {
            server_ip: server_ip.into(),
            server_port,
            ssl,
            api_token: None,
            access_token: None,
            global_timeout_secs: None,
            scripting_version: default_scripting_version(),
        }
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_global_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.global_timeout_secs = timeout.map(|t| t.as_secs());
        self
    }

    /// Build settings from environment variables:
    /// - `MYTHIC_SERVER_IP` (required)
    /// - `MYTHIC_SERVER_PORT` (default 7443)
    /// - `MYTHIC_SSL` (default true)
    /// - `MYTHIC_API_TOKEN` / `MYTHIC_ACCESS_TOKEN`
    /// - `MYTHIC_TIMEOUT` in seconds; negative means no timeout
    pub fn from_env() -> Result<Self> {
        let server_ip = std::env::var("MYTHIC_SERVER_IP")
            .map_err(|_| MythicError::Config("MYTHIC_SERVER_IP is not set".to_string()))?;

        let server_port = match std::env::var("MYTHIC_SERVER_PORT") {
            Ok(raw) => raw.parse::<u16>().map_err(|e| {
                MythicError::Config(format!("invalid MYTHIC_SERVER_PORT '{}': {}", raw, e))
            })?,
            Err(_) => DEFAULT_SERVER_PORT,
        };

        let ssl = match std::env::var("MYTHIC_SSL") {
            Ok(raw) => parse_bool(&raw).ok_or_else(|| {
                MythicError::Config(format!("invalid MYTHIC_SSL '{}'", raw))
            })?,
            Err(_) => true,
        };

        let global_timeout_secs = match std::env::var("MYTHIC_TIMEOUT") {
            Ok(raw) => {
                let secs = raw.parse::<i64>().map_err(|e| {
                    MythicError::Config(format!("invalid MYTHIC_TIMEOUT '{}': {}", raw, e))
                })?;
                u64::try_from(secs).ok()
            }
            Err(_) => None,
        };

        Ok(Self {
            server_ip,
            server_port,
            ssl,
            api_token: non_empty_env("MYTHIC_API_TOKEN"),
            access_token: non_empty_env("MYTHIC_ACCESS_TOKEN"),
            global_timeout_secs,
            scripting_version: default_scripting_version(),
        })
    }

    /// Load settings from a JSON file, falling back to the environment.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(
                "No config file found at {}, using environment",
                path.display()
            );
            return Self::from_env();
        }
        match Self::load_from_path(path) {
            Ok(config) => {
                tracing::info!("Loaded Mythic config from {}", path.display());
                Ok(config)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to load config from {}: {}, using environment",
                    path.display(),
                    e
                );
                Self::from_env()
            }
        }
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            MythicError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn host(&self) -> String {
        format!("{}:{}", self.server_ip, self.server_port)
    }

    /// GraphQL endpoint for queries and mutations.
    pub fn http_url(&self) -> String {
        let scheme = if self.ssl { "https" } else { "http" };
        format!("{}://{}/graphql/", scheme, self.host())
    }

    /// GraphQL endpoint for subscriptions.
    pub fn ws_url(&self) -> String {
        let scheme = if self.ssl { "wss" } else { "ws" };
        format!("{}://{}/graphql", scheme, self.host())
    }

    /// Header carrying the session credentials.
    pub fn auth_header(&self) -> Result<(&'static str, String)> {
        if let Some(token) = self.api_token.as_deref().filter(|t| !t.is_empty()) {
            return Ok(("apitoken", token.to_string()));
        }
        if let Some(token) = self.access_token.as_deref().filter(|t| !t.is_empty()) {
            return Ok(("Authorization", format!("Bearer {}", token)));
        }
        Err(MythicError::Config(
            "either an API token or an access token is required".to_string(),
        ))
    }

    pub fn global_timeout(&self) -> Option<Duration> {
        self.global_timeout_secs.map(Duration::from_secs)
    }

    /// Explicit timeout if given, else the global default.
    pub fn resolve_timeout(&self, timeout: Option<Duration>) -> Option<Duration> {
        timeout.or_else(|| self.global_timeout())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
