use std::net::SocketAddr;
use std::time::Duration;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;
use url::Url;

use crate::domain::entities::payment::LateFeePolicy;

pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: SecretString,
    /// Clock skew tolerated when checking token expiry.
    pub jwt_leeway_secs: u64,
    pub stripe_secret_key: SecretString,
    pub stripe_webhook_secret: SecretString,
    pub stripe_api_base: Url,
    /// Budget for a single gateway call. A timeout counts as a gateway failure.
    pub gateway_timeout: Duration,
    /// Maximum age of a webhook signature timestamp.
    pub webhook_tolerance_secs: i64,
    pub late_fee_policy: LateFeePolicy,
    /// Used when a payment request names no currency.
    pub default_currency: String,
    pub bind_addr: SocketAddr,
    pub cors_origin: HeaderValue,
    pub db_max_connections: u32,
    pub run_migrations: bool,
    pub log_file: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url: String = get_env("DATABASE_URL");
        let jwt_secret: SecretString = SecretString::new(get_env::<String>("JWT_SECRET").into());
        let jwt_leeway_secs: u64 = get_env_default("JWT_LEEWAY_SECS", 30);

        let stripe_secret_key: SecretString =
            SecretString::new(get_env::<String>("STRIPE_SECRET_KEY").into());
        let stripe_webhook_secret: SecretString =
            SecretString::new(get_env::<String>("STRIPE_WEBHOOK_SECRET").into());
        let stripe_api_base: Url = get_env_default(
            "STRIPE_API_BASE",
            "https://api.stripe.com/v1"
                .parse()
                .expect("default Stripe API base is a valid URL"),
        );

        let gateway_timeout_secs: u64 = get_env_default("GATEWAY_TIMEOUT_SECS", 10);
        let webhook_tolerance_secs: i64 = get_env_default("WEBHOOK_TOLERANCE_SECS", 300);

        let defaults = LateFeePolicy::default();
        let late_fee_policy = LateFeePolicy {
            grace_days: get_env_default("LATE_FEE_GRACE_DAYS", defaults.grace_days),
            rate_bps: get_env_default("LATE_FEE_RATE_BPS", defaults.rate_bps),
        };

        let default_currency: String =
            get_env_default::<String>("DEFAULT_CURRENCY", "usd".to_string()).to_lowercase();

        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", "127.0.0.1:3001".parse().unwrap());
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .expect("CORS_ORIGIN must be a valid header value");

        let db_max_connections: u32 = get_env_default("DB_MAX_CONNECTIONS", 5);
        let run_migrations: bool = get_env_default("RUN_MIGRATIONS", true);
        let log_file: String = get_env_default("LOG_FILE", "app.log".to_string());

        Self {
            database_url,
            jwt_secret,
            jwt_leeway_secs,
            stripe_secret_key,
            stripe_webhook_secret,
            stripe_api_base,
            gateway_timeout: Duration::from_secs(gateway_timeout_secs),
            webhook_tolerance_secs,
            late_fee_policy,
            default_currency,
            bind_addr,
            cors_origin,
            db_max_connections,
            run_migrations,
            log_file,
        }
    }
}
