use std::time::Duration;

use shelf_db::DbConfig;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8787/";
pub const DEFAULT_UPGRADE_PROTOCOL: &str = "shelf-progress/1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Postgres,
}

#[derive(Clone, Debug)]
pub struct ShelfConfig {
    pub backend_url: String,
    pub http_timeout_secs: u64, // 10
    pub rate_window_secs: u64,  // 60
    /// Seconds; validated by the waiter, not here.
    pub connect_timeout_secs: f64, // 10.0
    pub upgrade_protocol: String,
    pub store: StoreKind, // memory
    pub db: DbConfig,
}

impl Default for ShelfConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            http_timeout_secs: 10,
            rate_window_secs: 60,
            connect_timeout_secs: 10.0,
            upgrade_protocol: DEFAULT_UPGRADE_PROTOCOL.to_string(),
            store: StoreKind::Memory,
            db: DbConfig::default(),
        }
    }
}

impl ShelfConfig {
    /// - SHELF_BACKEND_URL (default http://127.0.0.1:8787/)
    /// - SHELF_HTTP_TIMEOUT_SECS (default 10)
    /// - SHELF_RATE_WINDOW_SECS (default 60)
    /// - SHELF_CONNECT_TIMEOUT_SECS (float, default 10.0)
    /// - SHELF_UPGRADE_PROTOCOL (default shelf-progress/1)
    /// - SHELF_STORE (memory|postgres, default memory)
    /// - DATABASE_URL and DB_* (see shelf_db::DbConfig)
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(url) = env_string("SHELF_BACKEND_URL") {
            cfg.backend_url = url;
        }
        cfg.http_timeout_secs = parse_env_u64("SHELF_HTTP_TIMEOUT_SECS", cfg.http_timeout_secs);
        cfg.rate_window_secs = parse_env_u64("SHELF_RATE_WINDOW_SECS", cfg.rate_window_secs);
        cfg.connect_timeout_secs =
            parse_env_f64("SHELF_CONNECT_TIMEOUT_SECS", cfg.connect_timeout_secs);
        if let Some(p) = env_string("SHELF_UPGRADE_PROTOCOL") {
            cfg.upgrade_protocol = p;
        }
        cfg.store = match env_string("SHELF_STORE").map(|s| s.to_ascii_lowercase()).as_deref() {
            Some("postgres") | Some("pg") => StoreKind::Postgres,
            _ => StoreKind::Memory,
        };
        cfg.db = DbConfig::from_env();
        cfg
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs.max(1))
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_env_u64(key: &str, default: u64) -> u64 {
    env_string(key).and_then(|s| s.parse::<u64>().ok()).unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    env_string(key).and_then(|s| s.parse::<f64>().ok()).unwrap_or(default)
}
