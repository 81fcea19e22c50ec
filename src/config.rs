use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    pub dev_mode: bool,
    /// Secret for signing session tokens (HS256).
    pub token_secret: String,
    /// Session token lifetime in hours.
    pub token_ttl_hours: u64,
    /// Seconds between payment provider polling ticks.
    pub poll_interval_secs: u64,
    /// Hours a payment may stay PENDING before the sweep marks it EXPIRED.
    pub payment_staleness_hours: i64,
    /// Days an account must wait between hardware resets.
    pub hwid_reset_cooldown_days: i64,
    /// Whether an admin-forced hardware reset skips the cooldown window.
    pub admin_reset_bypass: bool,
    pub provider_base_url: String,
    pub provider_api_key: String,
    pub provider_webhook_secret: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("KEYGATE_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "keygate.db".to_string()),
            base_url,
            dev_mode,
            token_secret: env::var("KEYGATE_TOKEN_SECRET")
                .unwrap_or_else(|_| "dev-only-token-secret".to_string()),
            token_ttl_hours: env::var("KEYGATE_TOKEN_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(12),
            poll_interval_secs: env::var("KEYGATE_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
            payment_staleness_hours: env::var("KEYGATE_PAYMENT_STALENESS_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(24),
            hwid_reset_cooldown_days: env::var("KEYGATE_HWID_RESET_COOLDOWN_DAYS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
            admin_reset_bypass: env::var("KEYGATE_ADMIN_RESET_BYPASS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            provider_base_url: env::var("KEYGATE_PROVIDER_URL")
                .unwrap_or_else(|_| "https://api.pix-provider.example".to_string()),
            provider_api_key: env::var("KEYGATE_PROVIDER_API_KEY").unwrap_or_default(),
            provider_webhook_secret: env::var("KEYGATE_PROVIDER_WEBHOOK_SECRET")
                .unwrap_or_default(),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
