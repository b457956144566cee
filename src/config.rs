use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache_store::{CacheBackend, CachePolicy};
use crate::codeforces;
use crate::fetcher::{DEFAULT_RETRIES, RetryPolicy};
use crate::history::{DEFAULT_DATE_FORMAT, is_valid_date_format};
use crate::leaderboard::fetch_parallelism_from;
use crate::leetcode;

/// Runtime settings, read from the environment (and `.env` files loaded by
/// the binaries).
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub cf_api_base: String,
    pub leetcode_graphql_url: String,
    pub retry: RetryPolicy,
    pub fetch_parallelism: usize,
    pub request_timeout: Duration,
    pub cache_backend: CacheBackend,
    pub cache_policy: CachePolicy,
    pub roster_path: Option<PathBuf>,
    pub date_format: String,
    pub offline: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let retries = non_empty("FETCH_RETRIES")
            .and_then(|val| val.trim().parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES)
            .min(10);
        let delay_ms = non_empty("RETRY_DELAY_MS")
            .and_then(|val| val.trim().parse::<u64>().ok())
            .unwrap_or(1000)
            .min(60_000);
        let timeout_secs = non_empty("REQUEST_TIMEOUT_SECS")
            .and_then(|val| val.trim().parse::<u64>().ok())
            .unwrap_or(10)
            .clamp(1, 120);
        let ttl_secs =
            non_empty("CACHE_TTL_SECS").and_then(|val| val.trim().parse::<u64>().ok());
        let date_format = non_empty("DATE_FORMAT")
            .filter(|fmt| is_valid_date_format(fmt))
            .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());

        Self {
            cf_api_base: non_empty("CF_API_BASE")
                .unwrap_or_else(|| codeforces::DEFAULT_API_BASE.to_string()),
            leetcode_graphql_url: non_empty("LEETCODE_GRAPHQL_URL")
                .unwrap_or_else(|| leetcode::DEFAULT_GRAPHQL_URL.to_string()),
            retry: RetryPolicy {
                retries,
                delay: Duration::from_millis(delay_ms),
            },
            fetch_parallelism: fetch_parallelism_from(non_empty("FETCH_PARALLELISM").as_deref()),
            request_timeout: Duration::from_secs(timeout_secs),
            cache_backend: non_empty("CACHE_BACKEND")
                .and_then(|val| CacheBackend::parse(&val))
                .unwrap_or(CacheBackend::Json),
            cache_policy: CachePolicy::from_ttl_secs(ttl_secs),
            roster_path: non_empty("ROSTER_PATH").map(PathBuf::from),
            date_format,
            offline: non_empty("OFFLINE").is_some_and(|val| is_truthy(&val)),
        }
    }
}

fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_match_provider_behaviour() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.retry.retries, 3);
        assert_eq!(cfg.retry.delay, Duration::from_millis(1000));
        assert_eq!(cfg.cache_policy, CachePolicy::Forever);
        assert_eq!(cfg.cache_backend, CacheBackend::Json);
        assert_eq!(cfg.fetch_parallelism, 6);
        assert_eq!(cfg.date_format, DEFAULT_DATE_FORMAT);
        assert!(!cfg.offline);
    }

    #[test]
    fn overrides_are_parsed_and_clamped() {
        let cfg = config_from(&[
            ("FETCH_RETRIES", "50"),
            ("RETRY_DELAY_MS", "250"),
            ("CACHE_TTL_SECS", "3600"),
            ("CACHE_BACKEND", "sqlite"),
            ("DATE_FORMAT", "%Q"),
            ("OFFLINE", "yes"),
            ("CF_API_BASE", "http://localhost:9000/api"),
        ]);
        assert_eq!(cfg.retry.retries, 10);
        assert_eq!(cfg.retry.delay, Duration::from_millis(250));
        assert_eq!(cfg.cache_policy, CachePolicy::Ttl(Duration::from_secs(3600)));
        assert_eq!(cfg.cache_backend, CacheBackend::Sqlite);
        assert_eq!(cfg.date_format, DEFAULT_DATE_FORMAT);
        assert!(cfg.offline);
        assert_eq!(cfg.cf_api_base, "http://localhost:9000/api");
    }

    #[test]
    fn date_format_with_time_fields_is_replaced() {
        let cfg = config_from(&[("DATE_FORMAT", "%Y-%m-%d %H:%M")]);
        assert_eq!(cfg.date_format, DEFAULT_DATE_FORMAT);
        let cfg = config_from(&[("DATE_FORMAT", "%d.%m.%Y")]);
        assert_eq!(cfg.date_format, "%d.%m.%Y");
    }
}
