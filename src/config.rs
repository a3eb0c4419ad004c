use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBackend {
    Mongo,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub mongodb_uri: String,
    pub mongodb_db: String,
    pub host: String,
    pub port: u16,

    pub jwt_secret: String,
    pub jwt_cookie_name: String,

    pub finnhub_api_key: String,
    pub finnhub_base_url: String,

    // background-job event ingest; empty key => notifications are only logged
    pub event_key: String,
    pub event_api_url: String,
    pub app_url: String,

    // shared secret for /internal/* (empty => internal endpoints disabled)
    pub cron_secret: String,

    pub alert_check_interval_secs: u64,
    pub digest_hour_utc: u32,
    pub http_timeout_secs: u64,
    pub data_backend: DataBackend,
    pub scheduler_enabled: bool,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}

pub fn load() -> Settings {
    // Loads .env if present (no crash if missing)
    dotenvy::dotenv().ok();

    let data_backend = match var_or("DATA_BACKEND", "mongo").to_lowercase().as_str() {
        "memory" => DataBackend::Memory,
        _ => DataBackend::Mongo,
    };

    let digest_hour_utc = parsed_or("DIGEST_HOUR_UTC", 9u32).min(23);

    Settings {
        mongodb_uri: var_or("MONGODB_URI", "mongodb://localhost:27017"),
        mongodb_db: var_or("MONGODB_DB", "stockwatch"),
        host: var_or("HOST", "127.0.0.1"),
        port: parsed_or("PORT", 3000u16),

        jwt_secret: var_or("JWT_SECRET", "change-me-dev-secret"),
        jwt_cookie_name: var_or("JWT_COOKIE_NAME", "auth"),

        finnhub_api_key: var_or("FINNHUB_API_KEY", ""),
        finnhub_base_url: var_or("FINNHUB_BASE_URL", "https://finnhub.io/api/v1"),

        event_key: var_or("EVENT_KEY", ""),
        event_api_url: var_or("EVENT_API_URL", "https://inn.gs/e"),
        app_url: var_or("APP_URL", "http://localhost:3000"),

        cron_secret: var_or("CRON_SECRET", ""),

        alert_check_interval_secs: parsed_or("ALERT_CHECK_INTERVAL_SECS", 300u64).max(1),
        digest_hour_utc,
        http_timeout_secs: parsed_or("HTTP_TIMEOUT_SECS", 10u64).max(1),
        data_backend,
        scheduler_enabled: parsed_or("SCHEDULER_ENABLED", true),
    }
}
