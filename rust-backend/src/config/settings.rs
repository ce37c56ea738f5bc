use dotenv::dotenv;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_port: u16,
    pub upstream_base_url: String,
    pub request_timeout_secs: u64,
    pub cache_ttl_secs: i64,
    pub cache_max_entries: usize,
    /// 0 disables the background sweep.
    pub cache_sweep_secs: u64,
    pub candle_concurrency: usize,
}

/// Read `key`, falling back to `default` when unset. Set-but-unparseable
/// values are an error naming the variable.
fn var_or<T: FromStr>(key: &str, default: T) -> Result<T, String> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| format!("{key} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}

impl Settings {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        dotenv().ok(); // loads `.env` file automatically
        Ok(Self::from_env()?)
    }

    /// Environment only, no `.env` loading.
    pub fn from_env() -> Result<Self, String> {
        let settings = Self {
            server_port: var_or("SERVER_PORT", 8080)?,
            upstream_base_url: env::var("UPSTREAM_BASE_URL")
                .unwrap_or_else(|_| "https://api.binance.com".into()),
            request_timeout_secs: var_or("REQUEST_TIMEOUT_SECS", 10)?,
            cache_ttl_secs: var_or("CACHE_TTL_SECS", 60)?,
            cache_max_entries: var_or("CACHE_MAX_ENTRIES", 64)?,
            cache_sweep_secs: var_or("CACHE_SWEEP_SECS", 0)?,
            candle_concurrency: var_or("CANDLE_CONCURRENCY", 4)?,
        };

        if settings.request_timeout_secs == 0 {
            return Err("REQUEST_TIMEOUT_SECS must be at least 1".into());
        }
        if settings.cache_ttl_secs <= 0 {
            return Err("CACHE_TTL_SECS must be positive".into());
        }
        Ok(settings)
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache_ttl_secs)
    }
}
