//! Configuration module for the coupon board backend.
//!
//! All configuration is loaded from environment variables with sensible defaults,
//! once at startup, and handed to the components that need it.

use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::AppError;

/// Default vendor endpoint that redeems a coupon code.
pub const DEFAULT_VERIFY_URL: &str = "https://event.withhive.com/ci/smon/evt_coupon/useCoupon";

/// Default base URL of the vendor's public coupon landing page.
pub const DEFAULT_EXPIRY_PROBE_URL: &str = "http://withhive.me/313";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key guarding the admin routes
    pub admin_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Vendor account id sent along with verification requests
    pub hive_id: String,
    pub verify_url: String,
    pub expiry_probe_url: String,
    /// When false, submitted codes are stored without asking the vendor
    pub require_verification: bool,
    /// Upper bound for a single reward amount
    pub max_reward_amount: f64,
    /// Interval of the background expiry sweep; `None` disables it
    pub expiry_sweep_interval: Option<Duration>,
    /// Pause between two expiry probes during a sweep
    pub expiry_probe_delay: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let admin_psk = env::var("COUPONS_ADMIN_PSK").ok();

        let db_path = env::var("COUPONS_DB_PATH")
            .unwrap_or_else(|_| "./data/coupons.sqlite".to_string())
            .into();

        let bind_addr = parse_var("COUPONS_BIND_ADDR", "127.0.0.1:8080")?;

        let log_level = env::var("COUPONS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let hive_id = env::var("COUPONS_HIVE_ID").unwrap_or_else(|_| "test_hive_id".to_string());

        let verify_url =
            env::var("COUPONS_VERIFY_URL").unwrap_or_else(|_| DEFAULT_VERIFY_URL.to_string());

        let expiry_probe_url = env::var("COUPONS_EXPIRY_PROBE_URL")
            .unwrap_or_else(|_| DEFAULT_EXPIRY_PROBE_URL.to_string());

        let require_verification = parse_var("COUPONS_REQUIRE_VERIFICATION", "true")?;

        let max_reward_amount: f64 = parse_var("COUPONS_MAX_REWARD_AMOUNT", "1000000")?;
        if !(max_reward_amount > 0.0) {
            return Err(AppError::Internal(
                "COUPONS_MAX_REWARD_AMOUNT must be positive".to_string(),
            ));
        }

        let expiry_sweep_interval = match env::var("COUPONS_EXPIRY_SWEEP_SECS") {
            Ok(raw) => {
                let secs: u64 = parse_value("COUPONS_EXPIRY_SWEEP_SECS", &raw)?;
                (secs > 0).then(|| Duration::from_secs(secs))
            }
            Err(_) => None,
        };

        let probe_delay_ms: u64 = parse_var("COUPONS_EXPIRY_PROBE_DELAY_MS", "1000")?;

        Ok(Self {
            admin_psk,
            db_path,
            bind_addr,
            log_level,
            hive_id,
            verify_url,
            expiry_probe_url,
            require_verification,
            max_reward_amount,
            expiry_sweep_interval,
            expiry_probe_delay: Duration::from_millis(probe_delay_ms),
        })
    }
}

fn parse_var<T>(key: &str, default: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    parse_value(key, &raw)
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AppError::Internal(format!("Invalid {key} value {raw:?}: {e}")))
}
