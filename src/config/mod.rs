use std::env;
use std::time::Duration;

/// Process-wide configuration, loaded once at startup. Mirrors the
/// fail-fast posture the rest of the stack expects: a missing or
/// implausible `DATABASE_URL`/`JWT_SECRET`-equivalent should abort startup
/// rather than limp along with a default that silently misbehaves in
/// production.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub is_dev: bool,

    /// Admission controller (§4.3).
    pub max_connections: usize,
    pub max_attempts_per_minute_per_address: u32,
    pub stale_entry_age: Duration,

    /// Slow-mode upper bound a channel may configure (§6 "slow-mode max value").
    pub slow_mode_max_seconds: i64,

    /// Attachment policy (§4.6).
    pub max_attachment_bytes: u64,
    pub attachment_allow_list: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenvy::dotenv().ok();

        let is_dev = env::var("APP_ENV").as_deref() != Ok("production");

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
            is_dev,
            max_connections: env::var("MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10_000),
            max_attempts_per_minute_per_address: env::var("MAX_ATTEMPTS_PER_MINUTE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            stale_entry_age: Duration::from_secs(
                env::var("STALE_ENTRY_AGE_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(300),
            ),
            slow_mode_max_seconds: env::var("SLOW_MODE_MAX_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(21_600),
            max_attachment_bytes: env::var("MAX_ATTACHMENT_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10 * 1024 * 1024),
            attachment_allow_list: env::var("ATTACHMENT_ALLOW_LIST")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_lowercase()).collect())
                .unwrap_or_else(default_allow_list),
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn default_allow_list() -> Vec<String> {
    [
        ".jpg", ".jpeg", ".png", ".gif", ".pdf", ".doc", ".docx", ".txt", ".zip", ".rar",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
