use std::time::Duration;

use serde::Deserialize;

/// Default site host announced to IndexNow.
pub const DEFAULT_SITE_HOST: &str = "energie-profis.de";

/// Shared IndexNow submission endpoint (forwards to all participating engines).
pub const DEFAULT_INDEXNOW_ENDPOINT: &str = "https://api.indexnow.org/indexnow";

/// IndexNow client configuration.
///
/// A missing or blank `key` is not an error: the notifier degrades into a
/// disabled state and the host application keeps running.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexNowConfig {
    /// Site host used as the submission `host` and as the enqueue allow-list.
    pub host: String,

    /// IndexNow key proving the caller may announce URLs for `host`.
    pub key: Option<String>,

    /// Public URL of the key file. Derived from `host` and `key` when unset.
    pub key_location: Option<String>,

    /// Submission endpoint.
    pub endpoint: String,

    /// Development mode also accepts loopback hosts.
    pub dev_mode: bool,

    /// Attempts after which an entry is dropped (default: 3).
    pub max_attempts: u32,

    /// Backoff base; attempt `k` waits `base_delay * 2^(k-1)` (default: 1s).
    pub base_delay: Duration,

    /// Period of the background flush timer (default: 5s).
    pub flush_interval: Duration,

    /// Per-request timeout for a submission call (default: 10s).
    pub submit_timeout: Duration,

    /// Query parameters whose name starts with one of these are stripped.
    pub tracking_prefixes: Vec<String>,

    /// Kick off a background flush right after `enqueue` accepts a target.
    pub flush_on_enqueue: bool,
}

impl IndexNowConfig {
    /// Configuration with defaults for everything except host and key.
    pub fn new(host: impl Into<String>, key: Option<String>) -> Self {
        Self {
            host: host.into().trim().to_ascii_lowercase(),
            key,
            key_location: None,
            endpoint: DEFAULT_INDEXNOW_ENDPOINT.to_string(),
            dev_mode: false,
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            flush_interval: Duration::from_millis(5000),
            submit_timeout: Duration::from_millis(10_000),
            tracking_prefixes: vec!["utm_".to_string()],
            flush_on_enqueue: true,
        }
    }

    /// Load configuration from environment variables (and `.env`, if present).
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("SITE_HOST")
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SITE_HOST.to_string());

        let mut config = Self::new(host, lookup("INDEXNOW_KEY"));

        config.key_location = lookup("INDEXNOW_KEY_LOCATION").filter(|l| !l.trim().is_empty());
        if let Some(endpoint) = lookup("INDEXNOW_ENDPOINT").filter(|e| !e.trim().is_empty()) {
            config.endpoint = endpoint;
        }

        let app_env = lookup("APP_ENV").unwrap_or_default();
        let dev_flag = lookup("DEV_MODE").unwrap_or_default();
        config.dev_mode = app_env.eq_ignore_ascii_case("development")
            || matches!(dev_flag.to_ascii_lowercase().as_str(), "1" | "true" | "yes");

        if let Some(raw) = lookup("INDEXNOW_MAX_ATTEMPTS") {
            config.max_attempts = raw
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("INDEXNOW_MAX_ATTEMPTS must be a valid u32"))?;
        }
        if let Some(ms) = parse_millis(&lookup, "INDEXNOW_BASE_DELAY_MS")? {
            config.base_delay = ms;
        }
        if let Some(ms) = parse_millis(&lookup, "INDEXNOW_FLUSH_INTERVAL_MS")? {
            if ms.is_zero() {
                anyhow::bail!("INDEXNOW_FLUSH_INTERVAL_MS must be greater than zero");
            }
            config.flush_interval = ms;
        }
        if let Some(ms) = parse_millis(&lookup, "INDEXNOW_SUBMIT_TIMEOUT_MS")? {
            config.submit_timeout = ms;
        }
        if let Some(raw) = lookup("INDEXNOW_TRACKING_PREFIXES") {
            config.tracking_prefixes = raw
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }

        tracing::debug!(
            host = %config.host,
            enabled = config.is_enabled(),
            dev_mode = config.dev_mode,
            "IndexNow configuration loaded"
        );

        Ok(config)
    }

    /// Whether a usable key is configured.
    pub fn is_enabled(&self) -> bool {
        self.key().is_some()
    }

    /// The key, if present and non-blank.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    /// Key file location: configured value, or `https://{host}/{key}.txt`.
    pub fn key_location(&self) -> String {
        match &self.key_location {
            Some(location) => location.clone(),
            None => format!("https://{}/{}.txt", self.host, self.key().unwrap_or_default()),
        }
    }

    /// File name under which the key is served from the site root.
    pub fn key_file_name(&self) -> Option<String> {
        self.key().map(|k| format!("{k}.txt"))
    }
}

fn parse_millis<F>(lookup: &F, name: &str) -> anyhow::Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => {
            let ms: u64 = raw
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("{name} must be a valid u64"))?;
            Ok(Some(Duration::from_millis(ms)))
        }
        None => Ok(None),
    }
}

/// Application-level configuration for the API service.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub indexnow: IndexNowConfig,

    /// Socket address the API server binds to (default: 0.0.0.0:3000)
    pub api_bind_addr: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let indexnow = IndexNowConfig::from_env()?;

        Ok(Self {
            indexnow,
            api_bind_addr: std::env::var("API_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<IndexNowConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        IndexNowConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = load(&[]).unwrap();
        assert_eq!(config.host, "energie-profis.de");
        assert!(!config.is_enabled());
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay, Duration::from_millis(1000));
        assert_eq!(config.flush_interval, Duration::from_millis(5000));
        assert_eq!(config.endpoint, DEFAULT_INDEXNOW_ENDPOINT);
        assert_eq!(config.tracking_prefixes, vec!["utm_".to_string()]);
        assert!(!config.dev_mode);
    }

    #[test]
    fn test_blank_key_is_disabled() {
        let config = load(&[("INDEXNOW_KEY", "   ")]).unwrap();
        assert!(!config.is_enabled());
        assert_eq!(config.key_file_name(), None);
    }

    #[test]
    fn test_key_location_derived_from_host() {
        let config = load(&[("INDEXNOW_KEY", "abc123"), ("SITE_HOST", "Example.org")]).unwrap();
        assert!(config.is_enabled());
        assert_eq!(config.host, "example.org");
        assert_eq!(config.key_location(), "https://example.org/abc123.txt");
        assert_eq!(config.key_file_name().as_deref(), Some("abc123.txt"));
    }

    #[test]
    fn test_explicit_key_location_wins() {
        let config = load(&[
            ("INDEXNOW_KEY", "abc123"),
            ("INDEXNOW_KEY_LOCATION", "https://cdn.example.org/k.txt"),
        ])
        .unwrap();
        assert_eq!(config.key_location(), "https://cdn.example.org/k.txt");
    }

    #[test]
    fn test_dev_mode_flags() {
        assert!(load(&[("APP_ENV", "development")]).unwrap().dev_mode);
        assert!(load(&[("DEV_MODE", "true")]).unwrap().dev_mode);
        assert!(!load(&[("APP_ENV", "production")]).unwrap().dev_mode);
    }

    #[test]
    fn test_numeric_overrides() {
        let config = load(&[
            ("INDEXNOW_MAX_ATTEMPTS", "5"),
            ("INDEXNOW_BASE_DELAY_MS", "250"),
            ("INDEXNOW_FLUSH_INTERVAL_MS", "2000"),
            ("INDEXNOW_TRACKING_PREFIXES", "utm_, fbclid ,,gclid"),
        ])
        .unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay, Duration::from_millis(250));
        assert_eq!(config.flush_interval, Duration::from_millis(2000));
        assert_eq!(config.tracking_prefixes, vec!["utm_", "fbclid", "gclid"]);
    }

    #[test]
    fn test_malformed_numbers_are_errors() {
        let err = load(&[("INDEXNOW_BASE_DELAY_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("INDEXNOW_BASE_DELAY_MS"));
        assert!(load(&[("INDEXNOW_MAX_ATTEMPTS", "-1")]).is_err());
        assert!(load(&[("INDEXNOW_FLUSH_INTERVAL_MS", "0")]).is_err());
    }
}
