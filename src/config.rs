use std::time::Duration;

/// Runtime configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the search/risk backend, without trailing slash.
    pub api_base: String,
    pub debounce_ms: u64,
    /// Minimum trimmed query length before a search is scheduled.
    pub min_query_len: usize,
    pub http_timeout_secs: u64,
    /// Caller-side retries for risk lookups. Zero disables the retry layer.
    pub retry_max: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8080".to_string(),
            debounce_ms: 250,
            min_query_len: 2,
            http_timeout_secs: 10,
            retry_max: 0,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            api_base: std::env::var("RISKDASH_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(d.api_base),
            debounce_ms: std::env::var("DEBOUNCE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.debounce_ms),
            min_query_len: std::env::var("MIN_QUERY_LEN").ok().and_then(|v| v.parse().ok()).unwrap_or(d.min_query_len),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.http_timeout_secs),
            retry_max: std::env::var("RETRY_MAX").ok().and_then(|v| v.parse().ok()).unwrap_or(d.retry_max),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.debounce_ms, 250);
        assert_eq!(cfg.min_query_len, 2);
        assert_eq!(cfg.retry_max, 0);
        assert_eq!(cfg.http_timeout(), Duration::from_secs(10));
    }
}
