// =============================================================================
// Configuration — environment-driven settings, loaded once at process start
// =============================================================================
//
// Every tunable the system needs lives here so that no subsystem reads
// `std::env` directly. Every field carries a sensible default so that running
// with an empty environment still produces a usable (if unconfigured)
// `Config`.
// =============================================================================

use serde::{Deserialize, Serialize};

fn default_mexc_base_url() -> String {
    "https://api.mexc.com".to_string()
}

fn default_calendar_endpoint() -> String {
    "/api/operation/new_coin_calendar".to_string()
}

fn default_symbols_v2_endpoint() -> String {
    "/api/platform/spot/market-v2/web/symbolsV2".to_string()
}

fn default_order_endpoint() -> String {
    "/api/v3/order".to_string()
}

fn default_cache_ttl_symbols() -> u64 {
    5
}

fn default_cache_ttl_calendar() -> u64 {
    30
}

fn default_cache_ttl_account() -> u64 {
    60
}

fn default_cache_ttl_server_time() -> u64 {
    10
}

fn default_ready_state_pattern() -> (i32, i32, i32) {
    (2, 2, 4)
}

fn default_target_advance_hours() -> f64 {
    3.5
}

fn default_calendar_poll_interval_seconds() -> u64 {
    300
}

fn default_calendar_poll_cron() -> String {
    "*/5 * * * *".to_string()
}

fn default_symbols_poll_interval_seconds_default() -> u64 {
    30
}

fn default_symbols_poll_interval_seconds_near_launch() -> u64 {
    5
}

fn default_symbols_poll_near_launch_threshold_minutes() -> u64 {
    60
}

fn default_buy_amount_usdt() -> f64 {
    100.0
}

fn default_max_concurrent_snipes() -> u32 {
    3
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

/// Process-wide configuration, loaded once from the environment at startup.
///
/// All fields carry `#[serde(default)]` so that a partially-populated source
/// (e.g. a test fixture JSON) still deserialises without error; in normal
/// operation it is populated via [`Config::from_env`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mexc_api_key: Option<String>,
    #[serde(default)]
    pub mexc_secret_key: Option<String>,
    #[serde(default = "default_mexc_base_url")]
    pub mexc_base_url: String,
    #[serde(default = "default_calendar_endpoint")]
    pub mexc_calendar_endpoint: String,
    #[serde(default = "default_symbols_v2_endpoint")]
    pub mexc_symbols_v2_endpoint: String,
    #[serde(default = "default_order_endpoint")]
    pub mexc_order_endpoint: String,

    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default)]
    pub valkey_url: Option<String>,
    #[serde(default = "default_cache_ttl_symbols")]
    pub cache_ttl_symbols: u64,
    #[serde(default = "default_cache_ttl_calendar")]
    pub cache_ttl_calendar: u64,
    #[serde(default = "default_cache_ttl_account")]
    pub cache_ttl_account: u64,
    #[serde(default = "default_cache_ttl_server_time")]
    pub cache_ttl_server_time: u64,

    #[serde(default = "default_ready_state_pattern")]
    pub ready_state_pattern: (i32, i32, i32),
    #[serde(default = "default_target_advance_hours")]
    pub target_advance_hours: f64,

    #[serde(default = "default_calendar_poll_interval_seconds")]
    pub calendar_poll_interval_seconds: u64,
    #[serde(default = "default_calendar_poll_cron")]
    pub calendar_poll_cron: String,
    #[serde(default = "default_symbols_poll_interval_seconds_default")]
    pub symbols_poll_interval_seconds_default: u64,
    #[serde(default = "default_symbols_poll_interval_seconds_near_launch")]
    pub symbols_poll_interval_seconds_near_launch: u64,
    #[serde(default = "default_symbols_poll_near_launch_threshold_minutes")]
    pub symbols_poll_near_launch_threshold_minutes: u64,

    #[serde(default = "default_buy_amount_usdt")]
    pub default_buy_amount_usdt: f64,
    #[serde(default = "default_max_concurrent_snipes")]
    pub max_concurrent_snipes: u32,

    #[serde(default)]
    pub encryption_key: Option<String>,

    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mexc_api_key: None,
            mexc_secret_key: None,
            mexc_base_url: default_mexc_base_url(),
            mexc_calendar_endpoint: default_calendar_endpoint(),
            mexc_symbols_v2_endpoint: default_symbols_v2_endpoint(),
            mexc_order_endpoint: default_order_endpoint(),
            database_url: None,
            redis_url: None,
            valkey_url: None,
            cache_ttl_symbols: default_cache_ttl_symbols(),
            cache_ttl_calendar: default_cache_ttl_calendar(),
            cache_ttl_account: default_cache_ttl_account(),
            cache_ttl_server_time: default_cache_ttl_server_time(),
            ready_state_pattern: default_ready_state_pattern(),
            target_advance_hours: default_target_advance_hours(),
            calendar_poll_interval_seconds: default_calendar_poll_interval_seconds(),
            calendar_poll_cron: default_calendar_poll_cron(),
            symbols_poll_interval_seconds_default: default_symbols_poll_interval_seconds_default(),
            symbols_poll_interval_seconds_near_launch:
                default_symbols_poll_interval_seconds_near_launch(),
            symbols_poll_near_launch_threshold_minutes:
                default_symbols_poll_near_launch_threshold_minutes(),
            default_buy_amount_usdt: default_buy_amount_usdt(),
            max_concurrent_snipes: default_max_concurrent_snipes(),
            encryption_key: None,
            log_level: default_log_level(),
            environment: default_environment(),
            debug: false,
        }
    }
}

impl Config {
    /// Load configuration from the process environment, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        cfg.mexc_api_key = env_string("MEXC_API_KEY");
        cfg.mexc_secret_key = env_string("MEXC_SECRET_KEY");
        if let Some(v) = env_string("MEXC_BASE_URL") {
            cfg.mexc_base_url = v;
        }
        cfg.database_url = env_string("DATABASE_URL");
        cfg.redis_url = env_string("REDIS_URL");
        cfg.valkey_url = env_string("VALKEY_URL");
        if let Some(v) = env_parse("CACHE_TTL_SYMBOLS") {
            cfg.cache_ttl_symbols = v;
        }
        if let Some(v) = env_parse("CACHE_TTL_CALENDAR") {
            cfg.cache_ttl_calendar = v;
        }
        if let Some(v) = env_parse("CACHE_TTL_ACCOUNT") {
            cfg.cache_ttl_account = v;
        }
        if let Some(v) = env_parse("CACHE_TTL_SERVER_TIME") {
            cfg.cache_ttl_server_time = v;
        }
        if let Some(v) = env_parse("TARGET_ADVANCE_HOURS") {
            cfg.target_advance_hours = v;
        }
        if let Some(v) = env_parse("CALENDAR_POLL_INTERVAL_SECONDS") {
            cfg.calendar_poll_interval_seconds = v;
        }
        if let Some(v) = env_string("CALENDAR_POLL_CRON") {
            cfg.calendar_poll_cron = v;
        }
        if let Some(v) = env_parse("SYMBOLS_POLL_INTERVAL_SECONDS_DEFAULT") {
            cfg.symbols_poll_interval_seconds_default = v;
        }
        if let Some(v) = env_parse("SYMBOLS_POLL_INTERVAL_SECONDS_NEAR_LAUNCH") {
            cfg.symbols_poll_interval_seconds_near_launch = v;
        }
        if let Some(v) = env_parse("SYMBOLS_POLL_NEAR_LAUNCH_THRESHOLD_MINUTES") {
            cfg.symbols_poll_near_launch_threshold_minutes = v;
        }
        if let Some(v) = env_parse("DEFAULT_BUY_AMOUNT_USDT") {
            cfg.default_buy_amount_usdt = v;
        }
        if let Some(v) = env_parse("MAX_CONCURRENT_SNIPES") {
            cfg.max_concurrent_snipes = v;
        }
        cfg.encryption_key = env_string("ENCRYPTION_KEY");
        if let Some(v) = env_string("LOG_LEVEL") {
            cfg.log_level = v;
        }
        if let Some(v) = env_string("ENVIRONMENT") {
            cfg.environment = v;
        }
        if let Some(v) = env_parse("DEBUG") {
            cfg.debug = v;
        }

        tracing::info!(
            environment = %cfg.environment,
            mexc_api_configured = cfg.mexc_api_configured(),
            database_configured = cfg.database_configured(),
            redis_configured = cfg.redis_configured(),
            "configuration loaded"
        );

        cfg
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn mexc_api_configured(&self) -> bool {
        self.mexc_api_key.as_deref().is_some_and(|s| !s.is_empty())
            && self
                .mexc_secret_key
                .as_deref()
                .is_some_and(|s| !s.is_empty())
    }

    pub fn database_configured(&self) -> bool {
        self.database_url.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn redis_configured(&self) -> bool {
        self.cache_url().is_some()
    }

    /// Redis URL if set, else Valkey URL (either is accepted).
    pub fn cache_url(&self) -> Option<&str> {
        self.redis_url
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.valkey_url.as_deref().filter(|s| !s.is_empty()))
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = Config::default();
        assert_eq!(cfg.mexc_base_url, "https://api.mexc.com");
        assert_eq!(cfg.ready_state_pattern, (2, 2, 4));
        assert!((cfg.target_advance_hours - 3.5).abs() < f64::EPSILON);
        assert_eq!(cfg.calendar_poll_interval_seconds, 300);
        assert_eq!(cfg.calendar_poll_cron, "*/5 * * * *");
        assert!((cfg.default_buy_amount_usdt - 100.0).abs() < f64::EPSILON);
        assert_eq!(cfg.max_concurrent_snipes, 3);
        assert!(!cfg.mexc_api_configured());
        assert!(!cfg.database_configured());
        assert!(!cfg.redis_configured());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.cache_ttl_symbols, 5);
        assert_eq!(cfg.cache_ttl_calendar, 30);
        assert_eq!(cfg.cache_ttl_account, 60);
        assert_eq!(cfg.cache_ttl_server_time, 10);
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "mexc_base_url": "https://testnet.example.com" }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.mexc_base_url, "https://testnet.example.com");
        assert_eq!(cfg.target_advance_hours, 3.5);
    }

    #[test]
    fn roundtrip_serialisation() {
        let cfg = Config::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let cfg2: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.mexc_base_url, cfg2.mexc_base_url);
        assert_eq!(cfg.ready_state_pattern, cfg2.ready_state_pattern);
    }

    #[test]
    fn cache_url_prefers_redis_over_valkey() {
        let mut cfg = Config::default();
        cfg.redis_url = Some("redis://a".into());
        cfg.valkey_url = Some("redis://b".into());
        assert_eq!(cfg.cache_url(), Some("redis://a"));

        cfg.redis_url = None;
        assert_eq!(cfg.cache_url(), Some("redis://b"));
    }
}
