//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use crate::browser::BrowserConfig;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:9080").
    pub bind_addr: String,

    /// External domain used to build absolute image URLs in cards,
    /// e.g., "cards.example.org" or "localhost:9080".
    pub domain: String,

    /// Freshness bound for cached cards and images.
    pub cache_ttl: Duration,

    /// Directory holding rendered `<hash>.png` images.
    pub images_dir: PathBuf,

    /// Directory holding generated `<hash>_card.html` documents.
    pub cache_dir: PathBuf,

    /// Scratch directory for the staged snippet and the render marker.
    pub scratch_dir: PathBuf,

    /// Directory holding the bad-request log.
    pub logs_dir: PathBuf,

    /// WebDriver binary spawned for the rendering engine.
    pub webdriver: String,

    /// Port the spawned driver listens on.
    pub webdriver_port: u16,

    /// Browser binary override; the driver's platform default otherwise.
    pub browser: Option<String>,

    /// How long a render marker may persist before it is treated as
    /// abandoned and force-reclaimed.
    pub gate_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - None (all have defaults for local development)
    ///
    /// Optional:
    /// - `POST2CARD_BIND_ADDR`: Server bind address (default: "0.0.0.0:9080")
    /// - `POST2CARD_DOMAIN`: External domain for image URLs (default: "localhost:9080")
    /// - `POST2CARD_CACHE_TTL_HOURS`: Cache freshness bound (default: 24)
    /// - `POST2CARD_IMAGES_DIR`: Image directory (default: "images")
    /// - `POST2CARD_CACHE_DIR`: Card directory (default: "cache")
    /// - `POST2CARD_SCRATCH_DIR`: Scratch directory (default: "tmp")
    /// - `POST2CARD_LOGS_DIR`: Bad-request log directory (default: "logs")
    /// - `POST2CARD_WEBDRIVER`: WebDriver binary (default: "chromedriver")
    /// - `POST2CARD_WEBDRIVER_PORT`: Driver port (default: 9515)
    /// - `POST2CARD_BROWSER`: Browser binary override (default: unset)
    /// - `POST2CARD_GATE_TIMEOUT_SECS`: Abandoned-marker bound (default: 30)
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr =
            std::env::var("POST2CARD_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:9080".to_string());

        let domain = std::env::var("POST2CARD_DOMAIN")
            .unwrap_or_else(|_| "localhost:9080".to_string())
            .trim_end_matches('/')
            .to_string();

        let cache_ttl_hours = parse_var("POST2CARD_CACHE_TTL_HOURS", 24u64)?;
        let cache_ttl = Duration::from_secs(cache_ttl_hours * 3600);

        let images_dir = PathBuf::from(
            std::env::var("POST2CARD_IMAGES_DIR").unwrap_or_else(|_| "images".to_string()),
        );
        let cache_dir = PathBuf::from(
            std::env::var("POST2CARD_CACHE_DIR").unwrap_or_else(|_| "cache".to_string()),
        );
        let scratch_dir = PathBuf::from(
            std::env::var("POST2CARD_SCRATCH_DIR").unwrap_or_else(|_| "tmp".to_string()),
        );
        let logs_dir = PathBuf::from(
            std::env::var("POST2CARD_LOGS_DIR").unwrap_or_else(|_| "logs".to_string()),
        );

        let webdriver = std::env::var("POST2CARD_WEBDRIVER")
            .unwrap_or_else(|_| "chromedriver".to_string());
        let webdriver_port = parse_var("POST2CARD_WEBDRIVER_PORT", 9515u16)?;
        let browser = std::env::var("POST2CARD_BROWSER").ok().filter(|s| !s.is_empty());

        let gate_timeout_secs = parse_var("POST2CARD_GATE_TIMEOUT_SECS", 30u64)?;
        let gate_timeout = Duration::from_secs(gate_timeout_secs);

        tracing::info!(
            bind_addr = %bind_addr,
            domain = %domain,
            cache_ttl_hours,
            images_dir = %images_dir.display(),
            cache_dir = %cache_dir.display(),
            scratch_dir = %scratch_dir.display(),
            webdriver = %webdriver,
            webdriver_port,
            "configuration loaded"
        );

        Ok(Self {
            bind_addr,
            domain,
            cache_ttl,
            images_dir,
            cache_dir,
            scratch_dir,
            logs_dir,
            webdriver,
            webdriver_port,
            browser,
            gate_timeout,
        })
    }

    /// How the rendering engine gets launched.
    pub fn browser_config(&self) -> BrowserConfig {
        BrowserConfig {
            webdriver: self.webdriver.clone(),
            port: self.webdriver_port,
            browser: self.browser.clone(),
        }
    }
}

fn parse_var<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{key} is not a valid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize config tests that manipulate env vars.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "POST2CARD_BIND_ADDR",
        "POST2CARD_DOMAIN",
        "POST2CARD_CACHE_TTL_HOURS",
        "POST2CARD_IMAGES_DIR",
        "POST2CARD_CACHE_DIR",
        "POST2CARD_SCRATCH_DIR",
        "POST2CARD_LOGS_DIR",
        "POST2CARD_WEBDRIVER",
        "POST2CARD_WEBDRIVER_PORT",
        "POST2CARD_BROWSER",
        "POST2CARD_GATE_TIMEOUT_SECS",
    ];

    /// Helper to run config tests with isolated env vars.
    /// Uses a mutex to prevent concurrent env var races.
    fn with_env_vars<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let _guard = ENV_MUTEX.lock().unwrap();

        let saved: Vec<_> = ENV_KEYS
            .iter()
            .map(|k| (*k, std::env::var(k).ok()))
            .collect();

        // SAFETY: Serialized by mutex; only test code touches these vars.
        unsafe {
            for k in ENV_KEYS {
                std::env::remove_var(k);
            }
            for (k, v) in vars {
                std::env::set_var(k, v);
            }
        }

        f();

        // SAFETY: Restoring original env state.
        unsafe {
            for (k, v) in &saved {
                match v {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }
    }

    #[test]
    fn config_defaults() {
        with_env_vars(&[], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.bind_addr, "0.0.0.0:9080");
            assert_eq!(config.domain, "localhost:9080");
            assert_eq!(config.cache_ttl, Duration::from_secs(24 * 3600));
            assert_eq!(config.images_dir, PathBuf::from("images"));
            assert_eq!(config.cache_dir, PathBuf::from("cache"));
            assert_eq!(config.scratch_dir, PathBuf::from("tmp"));
            assert_eq!(config.logs_dir, PathBuf::from("logs"));
            assert_eq!(config.webdriver, "chromedriver");
            assert_eq!(config.webdriver_port, 9515);
            assert_eq!(config.browser, None);
            assert_eq!(config.gate_timeout, Duration::from_secs(30));
        });
    }

    #[test]
    fn config_custom_values() {
        with_env_vars(
            &[
                ("POST2CARD_BIND_ADDR", "127.0.0.1:9999"),
                ("POST2CARD_DOMAIN", "cards.example.org"),
                ("POST2CARD_CACHE_TTL_HOURS", "1"),
                ("POST2CARD_WEBDRIVER", "geckodriver"),
                ("POST2CARD_WEBDRIVER_PORT", "4444"),
                ("POST2CARD_BROWSER", "/usr/bin/chromium"),
                ("POST2CARD_GATE_TIMEOUT_SECS", "5"),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.bind_addr, "127.0.0.1:9999");
                assert_eq!(config.domain, "cards.example.org");
                assert_eq!(config.cache_ttl, Duration::from_secs(3600));
                assert_eq!(config.webdriver, "geckodriver");
                assert_eq!(config.webdriver_port, 4444);
                assert_eq!(config.browser.as_deref(), Some("/usr/bin/chromium"));
                assert_eq!(config.gate_timeout, Duration::from_secs(5));
            },
        );
    }

    #[test]
    fn config_domain_trailing_slash_stripped() {
        with_env_vars(&[("POST2CARD_DOMAIN", "cards.example.org/")], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.domain, "cards.example.org");
        });
    }

    #[test]
    fn config_empty_browser_treated_as_unset() {
        with_env_vars(&[("POST2CARD_BROWSER", "")], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.browser, None);
        });
    }

    #[test]
    fn config_rejects_unparseable_numbers() {
        with_env_vars(&[("POST2CARD_CACHE_TTL_HOURS", "soon")], || {
            assert!(Config::from_env().is_err());
        });
        with_env_vars(&[("POST2CARD_WEBDRIVER_PORT", "not-a-port")], || {
            assert!(Config::from_env().is_err());
        });
    }

    #[test]
    fn config_browser_config_mirrors_driver_settings() {
        with_env_vars(
            &[
                ("POST2CARD_WEBDRIVER", "chromedriver"),
                ("POST2CARD_WEBDRIVER_PORT", "9600"),
            ],
            || {
                let config = Config::from_env().unwrap();
                let browser = config.browser_config();
                assert_eq!(browser.webdriver, "chromedriver");
                assert_eq!(browser.port, 9600);
                assert_eq!(browser.browser, None);
            },
        );
    }
}
