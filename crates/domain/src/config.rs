//! Configuration structures
//!
//! Populated by the infra loader from environment variables; kept here so
//! every crate can consume configuration without depending on the loader.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::SegmentifyError;

/// Deployment environment; affects log verbosity only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Env {
    Test,
    Dev,
    Prod,
}

impl Env {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Dev => "dev",
            Self::Prod => "prod",
        }
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Env {
    type Err = SegmentifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "test" => Ok(Self::Test),
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            other => Err(SegmentifyError::InvalidRequest(format!(
                "ENV must be one of test|dev|prod, got {other}"
            ))),
        }
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub env: Env,
    pub postgres: DatabaseConfig,
    pub http_server: HttpServerConfig,
    pub reaper: ReaperConfig,
}

/// Connection-pool settings for the relational backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Backend DSN (`POSTGRES_URI`)
    pub uri: String,
    /// Pool capacity
    pub max_connections: u32,
    /// How long a request may wait for a pooled connection
    pub acquire_timeout: Duration,
    /// Startup ping attempts before giving up (one-second spacing)
    pub ping_retries: u32,
}

impl DatabaseConfig {
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
    pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_PING_RETRIES: u32 = 5;
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpServerConfig {
    pub address: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Keep-alive idle timeout
    pub idle_timeout: Duration,
}

/// Expiry reaper cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaperConfig {
    pub interval: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self { interval: Duration::from_secs(3600) }
    }
}
