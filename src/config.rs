use crate::cache::{DEFAULT_MAX_ENTRIES, DEFAULT_TTL_SECS};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_WORKSPACE: &str = "PPSD_WORKSPACE";
pub const ENV_LOG_JSON: &str = "PPSD_LOG_JSON";
pub const ENV_CACHE_TTL_SECS: &str = "PPSD_CACHE_TTL_SECS";
pub const ENV_CACHE_MAX_ENTRIES: &str = "PPSD_CACHE_MAX_ENTRIES";

/// Settings key holding a JSON array of convocatoria statuses that never
/// count as an enrollment.
pub const SETTING_EXCLUSION_STATUSES: &str = "metrics.exclusionStatuses";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub workspace: Option<PathBuf>,
    pub log_json: bool,
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            log_json: false,
            cache_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            cache_max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        Self {
            workspace: lookup(ENV_WORKSPACE)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            log_json: parse_bool(lookup(ENV_LOG_JSON)).unwrap_or(defaults.log_json),
            cache_ttl: lookup(ENV_CACHE_TTL_SECS)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            cache_max_entries: lookup(ENV_CACHE_MAX_ENTRIES)
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.cache_max_entries),
        }
    }
}

fn parse_bool(raw: Option<String>) -> Option<bool> {
    match raw?.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
        _ => None,
    }
}
