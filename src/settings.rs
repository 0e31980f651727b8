use once_cell::sync::Lazy;
use std::{env, time::Duration};

/// Holds all tunables, read-once from ENV with fallbacks.
#[derive(Debug, Clone)]
pub struct Settings {
    pub event_buffer_capacity: usize,
    pub request_timeout: Duration,
    /// Upper bound on how long a correlator registration waits for its response.
    pub response_timeout: Duration,
    pub polling_interval: Duration,
    pub landing_page_base: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            event_buffer_capacity: 100,
            request_timeout: Duration::from_secs(10),
            response_timeout: Duration::from_secs(30),
            polling_interval: Duration::from_millis(4000),
            landing_page_base: "https://www.netflix.com/nl-en/".to_string(),
        }
    }
}

impl Settings {
    fn from_env() -> Self {
        // optionally load .env
        let _ = dotenvy::dotenv();
        let defaults = Settings::default();

        fn parse_usize(var: &str, default: usize) -> usize {
            env::var(var)
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        }

        // Durations are whole units; `unit` turns the number into a Duration
        fn parse_duration(var: &str, default: Duration, unit: fn(u64) -> Duration) -> Duration {
            env::var(var)
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(unit)
                .unwrap_or(default)
        }

        Settings {
            event_buffer_capacity: parse_usize(
                "EVENT_BUFFER_CAPACITY",
                defaults.event_buffer_capacity,
            ),
            request_timeout: parse_duration(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout,
                Duration::from_secs,
            ),
            response_timeout: parse_duration(
                "RESPONSE_TIMEOUT_SECS",
                defaults.response_timeout,
                Duration::from_secs,
            ),
            polling_interval: parse_duration(
                "POLLING_INTERVAL_MS",
                defaults.polling_interval,
                Duration::from_millis,
            ),
            landing_page_base: env::var("LANDING_PAGE_BASE")
                .unwrap_or(defaults.landing_page_base),
        }
    }
}

/// Global settings instance
pub static SETTINGS: Lazy<Settings> = Lazy::new(Settings::from_env);
