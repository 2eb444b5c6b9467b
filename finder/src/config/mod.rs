//! Finder configuration management

use std::env;

use anyhow::{Context, Result};

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, multi-line output
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("unknown log format '{}', expected 'pretty' or 'json'", other),
        }
    }
}

/// Configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite URL (`sqlite://...`, `sqlite::memory:`) or database file path
    pub database_url: String,

    /// Maximum pool size (always 1 for in-memory databases)
    pub max_connections: u32,

    /// `tracing` env-filter directive
    pub log_filter: String,

    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
            log_filter: "finder=info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from the process environment, reading `.env` first
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Prefer DATABASE_URL, fall back to a bare DATABASE_PATH
        let database_url = lookup("DATABASE_URL")
            .or_else(|| lookup("DATABASE_PATH"))
            .unwrap_or_else(|| "sqlite::memory:".to_string());

        let max_connections = if is_in_memory(&database_url) {
            // Every connection to :memory: opens its own empty database
            1
        } else {
            lookup("DATABASE_MAX_CONNECTIONS")
                .map(|value| value.parse::<u32>())
                .transpose()
                .context("Invalid DATABASE_MAX_CONNECTIONS")?
                .unwrap_or(5)
                .max(1)
        };

        let log_format = lookup("FINDER_LOG_FORMAT")
            .map(|value| value.parse::<LogFormat>())
            .transpose()
            .context("Invalid FINDER_LOG_FORMAT")?
            .unwrap_or_default();

        Ok(Self {
            database_url,
            max_connections,
            log_filter: lookup("FINDER_LOG")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or_else(|| "finder=info".to_string()),
            log_format,
        })
    }

    pub fn is_in_memory(&self) -> bool {
        is_in_memory(&self.database_url)
    }
}

fn is_in_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}
