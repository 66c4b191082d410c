use std::{env, path::PathBuf, time::Duration};

use crate::{errors::Error, Result};

pub const DEFAULT_API_BASE_URL: &str = "https://api.mmbump.pro";
pub const DEFAULT_PROXY_CHECK_URL: &str = "https://httpbin.org/ip";

/// Fixed delays of the farming loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopTimings {
    /// Assumed token lifetime; the token is refreshed once it is this old.
    pub token_ttl: Duration,
    /// Sleep after a completed claim-and-restart iteration.
    pub idle_sleep: Duration,
    /// Sleep after a failed iteration.
    pub error_backoff: Duration,
    /// Delay before every `/farming/start` call.
    pub start_farming_delay: Duration,
}

impl Default for LoopTimings {
    fn default() -> Self {
        Self {
            token_ttl: Duration::from_secs(3_600),
            idle_sleep: Duration::from_secs(60),
            error_backoff: Duration::from_secs(3),
            start_farming_delay: Duration::from_secs(6),
        }
    }
}

/// Typed configuration, read from the environment (and an optional `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Sessions
    pub sessions_dir: PathBuf,

    // Proxies
    pub use_proxy_from_file: bool,
    pub proxies_file: PathBuf,

    // Remote endpoints
    pub api_base_url: String,
    pub proxy_check_url: String,

    // Loop behavior
    pub timings: LoopTimings,
    pub start_jitter: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Existing environment variables take precedence over `.env`.
        dotenvy::dotenv().ok();

        let sessions_dir = env_path("SESSIONS_DIR").unwrap_or_else(|| PathBuf::from("sessions"));
        if !sessions_dir.is_dir() {
            return Err(Error::Config(format!(
                "sessions directory {} does not exist (set SESSIONS_DIR)",
                sessions_dir.display()
            )));
        }

        let use_proxy_from_file = env_bool("USE_PROXY_FROM_FILE").unwrap_or(false);
        let proxies_file =
            env_path("PROXIES_FILE").unwrap_or_else(|| PathBuf::from("proxies.txt"));
        if use_proxy_from_file && !proxies_file.is_file() {
            return Err(Error::Config(format!(
                "USE_PROXY_FROM_FILE is set but {} is missing",
                proxies_file.display()
            )));
        }

        let api_base_url = env_str("API_BASE_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let proxy_check_url = env_str("PROXY_CHECK_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_PROXY_CHECK_URL.to_string());

        let defaults = LoopTimings::default();
        let timings = LoopTimings {
            token_ttl: env_secs("TOKEN_TTL_SECS").unwrap_or(defaults.token_ttl),
            idle_sleep: env_secs("IDLE_SLEEP_SECS").unwrap_or(defaults.idle_sleep),
            error_backoff: env_secs("ERROR_BACKOFF_SECS").unwrap_or(defaults.error_backoff),
            start_farming_delay: env_secs("START_FARMING_DELAY_SECS")
                .unwrap_or(defaults.start_farming_delay),
        };
        if timings.token_ttl.is_zero() {
            return Err(Error::Config("TOKEN_TTL_SECS must be positive".to_string()));
        }

        let start_jitter = env_secs("START_JITTER_SECS").unwrap_or(Duration::ZERO);

        Ok(Self {
            sessions_dir,
            use_proxy_from_file,
            proxies_file,
            api_base_url,
            proxy_check_url,
            timings,
            start_jitter,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_secs(key: &str) -> Option<Duration> {
    env_str(key)
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
