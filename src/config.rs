//! Service configuration
//!
//! Read from environment variables (after `.env` is loaded by the binary):
//!   SANKEY_DATABASE_URL        : analytic store connection string (required)
//!   SANKEY_REDIS_URL           : shared cache; unset uses an in-process cache
//!   SANKEY_BIND_ADDR           : listen address (default: 0.0.0.0:3000)
//!   SANKEY_ORDERFLOW_TABLE     : default: prodof_aggregated
//!   SANKEY_LIQUIDITY_TABLE     : default: prodlq_aggregated
//!   SANKEY_TOP_N               : labels kept per column (default: 20)
//!   SANKEY_FETCH_ATTEMPTS      : executions per query (default: 3)
//!   SANKEY_FETCH_RETRY_DELAY_MS: pause between attempts (default: 100)
//!   SANKEY_CACHE_PERIOD_SECS   : cache period; entries expire at its end (default: 3600)
//!   SANKEY_CACHE_MAX_ENTRIES   : entry cap of the in-process cache (default: 10000)
//!   SANKEY_REQUEST_TIMEOUT_MS  : deadline for fetching a request's data (default: 30000)
//!   SANKEY_PALETTE_PATH        : optional YAML map of label to color
//!   SANKEY_MAX_DB_CONNECTIONS  : pool size (default: 10)

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use crate::cache::DEFAULT_MAX_ENTRIES;
use crate::columns::Taxonomies;
use crate::error::ConfigError;
use crate::fetcher::RetryPolicy;
use crate::graph::{GraphSettings, Palette, DEFAULT_TOP_N};

#[derive(Debug, Clone)]
pub struct SankeyConfig {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub bind_addr: String,
    pub orderflow_table: String,
    pub liquidity_table: String,
    pub top_n: usize,
    pub retry: RetryPolicy,
    pub cache_period_secs: u64,
    pub cache_max_entries: usize,
    pub request_timeout: Duration,
    pub palette: Palette,
    pub max_db_connections: u32,
}

impl SankeyConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let database_url =
            get("SANKEY_DATABASE_URL").ok_or(ConfigError::Missing("SANKEY_DATABASE_URL"))?;
        let orderflow_table = table_name(
            "SANKEY_ORDERFLOW_TABLE",
            get("SANKEY_ORDERFLOW_TABLE").unwrap_or_else(|| "prodof_aggregated".into()),
        )?;
        let liquidity_table = table_name(
            "SANKEY_LIQUIDITY_TABLE",
            get("SANKEY_LIQUIDITY_TABLE").unwrap_or_else(|| "prodlq_aggregated".into()),
        )?;

        let top_n: usize = parse_or("SANKEY_TOP_N", get("SANKEY_TOP_N"), DEFAULT_TOP_N)?;
        if top_n == 0 {
            return Err(invalid("SANKEY_TOP_N", "0", "must be at least 1"));
        }
        let max_attempts: u32 =
            parse_or("SANKEY_FETCH_ATTEMPTS", get("SANKEY_FETCH_ATTEMPTS"), 3)?;
        if max_attempts == 0 {
            return Err(invalid("SANKEY_FETCH_ATTEMPTS", "0", "must be at least 1"));
        }
        let delay_ms: u64 = parse_or(
            "SANKEY_FETCH_RETRY_DELAY_MS",
            get("SANKEY_FETCH_RETRY_DELAY_MS"),
            100,
        )?;
        // expiry timestamps are i64 seconds
        let cache_period_secs: i64 =
            parse_or("SANKEY_CACHE_PERIOD_SECS", get("SANKEY_CACHE_PERIOD_SECS"), 3600)?;
        if cache_period_secs < 1 {
            return Err(invalid(
                "SANKEY_CACHE_PERIOD_SECS",
                &cache_period_secs.to_string(),
                "must be at least 1",
            ));
        }
        let cache_max_entries: usize = parse_or(
            "SANKEY_CACHE_MAX_ENTRIES",
            get("SANKEY_CACHE_MAX_ENTRIES"),
            DEFAULT_MAX_ENTRIES,
        )?;
        if cache_max_entries == 0 {
            return Err(invalid("SANKEY_CACHE_MAX_ENTRIES", "0", "must be at least 1"));
        }
        let timeout_ms: u64 = parse_or(
            "SANKEY_REQUEST_TIMEOUT_MS",
            get("SANKEY_REQUEST_TIMEOUT_MS"),
            30_000,
        )?;
        let max_db_connections: u32 =
            parse_or("SANKEY_MAX_DB_CONNECTIONS", get("SANKEY_MAX_DB_CONNECTIONS"), 10)?;

        let palette = match get("SANKEY_PALETTE_PATH") {
            Some(path) => Palette::builtin().with_overrides(load_palette(&path)?),
            None => Palette::builtin(),
        };

        Ok(Self {
            database_url,
            redis_url: get("SANKEY_REDIS_URL"),
            bind_addr: get("SANKEY_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into()),
            orderflow_table,
            liquidity_table,
            top_n,
            retry: RetryPolicy {
                max_attempts,
                delay: Duration::from_millis(delay_ms),
            },
            cache_period_secs: cache_period_secs.unsigned_abs(),
            cache_max_entries,
            request_timeout: Duration::from_millis(timeout_ms),
            palette,
            max_db_connections,
        })
    }

    pub fn taxonomies(&self) -> Taxonomies {
        Taxonomies::new(&self.orderflow_table, &self.liquidity_table)
    }

    pub fn graph_settings(&self) -> GraphSettings {
        GraphSettings {
            top_n: self.top_n,
            palette: self.palette.clone(),
        }
    }
}

fn invalid(var: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(var, &value, &e.to_string())),
        None => Ok(default),
    }
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
            .expect("valid identifier regex")
    })
}

/// Table names are written into query text, so they must be plain
/// (optionally schema-qualified) identifiers.
fn table_name(var: &'static str, value: String) -> Result<String, ConfigError> {
    if identifier_pattern().is_match(&value) {
        Ok(value)
    } else {
        Err(invalid(var, &value, "not a valid table identifier"))
    }
}

/// Load a YAML map of `label: "#rrggbb"`.
pub fn load_palette(path: &str) -> Result<HashMap<String, String>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::PaletteIo {
        path: path.to_string(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(|source| ConfigError::PaletteParse {
        path: path.to_string(),
        source,
    })
}
