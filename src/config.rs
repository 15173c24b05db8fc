//! Environment-driven configuration.
//!
//! Every binary calls `dotenvy::dotenv()` first and then builds the part of
//! the configuration it needs. Parsing goes through a lookup closure so the
//! same code is exercised by tests without touching the process environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_COINGECKO_BASE_URL: &str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_API_KEY_HEADER: &str = "x-cg-pro-api-key";

/// Upper bound the feed accepts for `per_page`
pub const MAX_PER_PAGE: u32 = 250;

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub base_url: String,
    /// `None` when unset or empty; no key header is sent then
    pub api_key: Option<String>,
    pub api_key_header: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Zero means a single run
    pub update_interval: Duration,
    pub pages: u32,
    pub per_page: u32,
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub batch_max_retries: u32,
    pub batch_retry_delay: Duration,
    pub rate_limit_delay: Duration,
}

impl IngestConfig {
    pub fn is_one_shot(&self) -> bool {
        self.update_interval.is_zero()
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            update_interval: Duration::from_secs(300),
            pages: 1,
            per_page: MAX_PER_PAGE,
            batch_size: 100,
            max_retries: 5,
            retry_base_delay: Duration::from_millis(10_000),
            batch_max_retries: 3,
            batch_retry_delay: Duration::from_millis(1_000),
            rate_limit_delay: Duration::from_millis(1_200),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub run_ingestion: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub feed: FeedConfig,
    pub ingest: IngestConfig,
    pub server: ServerConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        Ok(Self {
            database_url,
            feed: FeedConfig::from_lookup(&lookup)?,
            ingest: IngestConfig::from_lookup(&lookup)?,
            server: ServerConfig::from_lookup(&lookup)?,
        })
    }
}

impl FeedConfig {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("COINGECKO_BASE_URL")
            .unwrap_or_else(|| DEFAULT_COINGECKO_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            base_url,
            api_key: lookup("COINGECKO_API_KEY").filter(|k| !k.trim().is_empty()),
            api_key_header: lookup("COINGECKO_API_KEY_HEADER")
                .unwrap_or_else(|| DEFAULT_API_KEY_HEADER.to_string()),
            request_timeout: Duration::from_secs(parse_or(lookup, "REQUEST_TIMEOUT_SECS", 30)?),
        })
    }
}

impl IngestConfig {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let per_page: u32 = parse_or(lookup, "MARKET_PER_PAGE", defaults.per_page)?;
        if per_page == 0 || per_page > MAX_PER_PAGE {
            return Err(ConfigError::Invalid {
                name: "MARKET_PER_PAGE",
                value: per_page.to_string(),
            });
        }

        let pages: u32 = parse_or(lookup, "MARKET_PAGES", defaults.pages)?;
        if pages == 0 {
            return Err(ConfigError::Invalid {
                name: "MARKET_PAGES",
                value: pages.to_string(),
            });
        }

        let batch_size: usize = parse_or(lookup, "BATCH_SIZE", defaults.batch_size)?;
        if batch_size == 0 {
            return Err(ConfigError::Invalid {
                name: "BATCH_SIZE",
                value: batch_size.to_string(),
            });
        }

        Ok(Self {
            update_interval: Duration::from_secs(parse_or(lookup, "UPDATE_INTERVAL_SECS", 300)?),
            pages,
            per_page,
            batch_size,
            max_retries: parse_or(lookup, "MAX_RETRIES", defaults.max_retries)?.max(1),
            retry_base_delay: Duration::from_millis(parse_or(lookup, "RETRY_BASE_DELAY_MS", 10_000)?),
            batch_max_retries: parse_or(lookup, "BATCH_MAX_RETRIES", defaults.batch_max_retries)?
                .max(1),
            batch_retry_delay: Duration::from_millis(parse_or(lookup, "BATCH_RETRY_DELAY_MS", 1_000)?),
            rate_limit_delay: Duration::from_millis(parse_or(lookup, "RATE_LIMIT_DELAY_MS", 1_200)?),
        })
    }
}

impl ServerConfig {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            cors_origins,
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            run_ingestion: parse_bool(lookup, "RUN_INGESTION")?,
        })
    }
}

/// Settings for the terminal dashboard client
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub api_url: String,
    pub refresh_interval: Duration,
    pub rows: usize,
    pub request_timeout: Duration,
}

impl DashboardConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let refresh_secs: u64 = parse_or(lookup, "DASHBOARD_REFRESH_SECS", 60)?;
        if refresh_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "DASHBOARD_REFRESH_SECS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            api_url: lookup("DASHBOARD_API_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            refresh_interval: Duration::from_secs(refresh_secs),
            rows: parse_or(lookup, "DASHBOARD_ROWS", 50)?,
            request_timeout: Duration::from_secs(parse_or(lookup, "REQUEST_TIMEOUT_SECS", 30)?),
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}

fn parse_bool<F>(lookup: &F, name: &'static str) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name).map(|v| v.trim().to_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "" | "false" | "0" | "no" => Ok(false),
            "true" | "1" | "yes" => Ok(true),
            _ => Err(ConfigError::Invalid { name, value: v }),
        },
    }
}
