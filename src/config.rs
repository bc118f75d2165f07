//! Runtime configuration
//!
//! Every field has a default, so an empty JSON object or a bare environment
//! yields a working setup for the 24/7 crypto bundle.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::accessor::CachePolicy;
use crate::error::{AnalyticsError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Directory whose subdirectories are the registered bundles
    pub bundle_root: PathBuf,
    pub bundle: String,
    pub coins: Vec<String>,
    pub calendar: String,
    pub cache: CachePolicy,
    pub log_filter: String,
    pub server_addr: String,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        AnalyticsConfig {
            bundle_root: PathBuf::from("./bundles"),
            bundle: "cryptocompare_daily".to_string(),
            coins: vec!["BTC".to_string()],
            calendar: "24/7".to_string(),
            cache: CachePolicy::Keyed,
            log_filter: "info".to_string(),
            server_addr: "127.0.0.1:3030".to_string(),
        }
    }
}

impl AnalyticsConfig {
    /// Defaults overridden by `BUNDLE_ROOT`, `ANALYTICS_BUNDLE`,
    /// `ANALYTICS_COINS` (comma separated), `ANALYTICS_CALENDAR`,
    /// `ANALYTICS_CACHE`, `RUST_LOG` and `ANALYTICS_ADDR`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self> {
        let mut config = AnalyticsConfig::default();

        if let Some(root) = lookup("BUNDLE_ROOT") {
            config.bundle_root = PathBuf::from(root);
        }
        if let Some(bundle) = lookup("ANALYTICS_BUNDLE") {
            config.bundle = bundle;
        }
        if let Some(coins) = lookup("ANALYTICS_COINS") {
            config.coins = parse_coins(&coins);
        }
        if let Some(calendar) = lookup("ANALYTICS_CALENDAR") {
            config.calendar = calendar;
        }
        if let Some(cache) = lookup("ANALYTICS_CACHE") {
            config.cache = parse_cache_policy(&cache)?;
        }
        if let Some(filter) = lookup("RUST_LOG") {
            config.log_filter = filter;
        }
        if let Some(addr) = lookup("ANALYTICS_ADDR") {
            config.server_addr = addr;
        }
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn parse_coins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .collect()
}

fn parse_cache_policy(raw: &str) -> Result<CachePolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "keyed" => Ok(CachePolicy::Keyed),
        "disabled" | "off" | "none" => Ok(CachePolicy::Disabled),
        other => Err(AnalyticsError::InvalidConfig(format!("unknown cache policy '{}'", other))),
    }
}
