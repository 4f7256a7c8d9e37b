use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

pub use sqlx::PgPool;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Clone, Debug)]
pub struct DbConfig {
    pub database_url: Option<String>,

    pub max_connections: u32,      // 5
    pub connect_timeout_secs: u64, // 5
    pub acquire_timeout_secs: u64, // 5

    pub retry_max_attempts: u32,    // 3
    pub retry_base_backoff_ms: u64, // 200

    /// Apply embedded migrations after the first successful connect.
    pub migrate_on_start: bool, // true
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 5,
            connect_timeout_secs: 5,
            acquire_timeout_secs: 5,
            retry_max_attempts: 3,
            retry_base_backoff_ms: 200,
            migrate_on_start: true,
        }
    }
}

impl DbConfig {
    /// - DATABASE_URL (optional)
    /// - DB_MAX_CONNECTIONS (default 5)
    /// - DB_CONNECT_TIMEOUT_SECS (default 5)
    /// - DB_ACQUIRE_TIMEOUT_SECS (default 5)
    /// - DB_RETRY_MAX_ATTEMPTS (default 3)
    /// - DB_RETRY_BASE_BACKOFF_MS (default 200)
    /// - DB_MIGRATE_ON_START (bool, default true)
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty()),
            max_connections: parse_env("DB_MAX_CONNECTIONS", d.max_connections),
            connect_timeout_secs: parse_env("DB_CONNECT_TIMEOUT_SECS", d.connect_timeout_secs),
            acquire_timeout_secs: parse_env("DB_ACQUIRE_TIMEOUT_SECS", d.acquire_timeout_secs),
            retry_max_attempts: parse_env("DB_RETRY_MAX_ATTEMPTS", d.retry_max_attempts),
            retry_base_backoff_ms: parse_env("DB_RETRY_BASE_BACKOFF_MS", d.retry_base_backoff_ms),
            migrate_on_start: parse_env_bool("DB_MIGRATE_ON_START", d.migrate_on_start),
        }
    }
}

/// Lazily connected pool. The first `pool()` call connects (with retry) and
/// migrates; later calls reuse the same pool.
pub struct Db {
    cfg: DbConfig,
    pool: OnceCell<PgPool>,
}

impl Db {
    pub fn new(cfg: DbConfig) -> Self {
        Self { cfg, pool: OnceCell::new() }
    }

    pub async fn pool(&self) -> Result<&PgPool, DbInitError> {
        self.pool
            .get_or_try_init(|| async {
                let pool = self.connect_with_retry().await?;
                if self.cfg.migrate_on_start {
                    info!(target: "shelf_db", "applying migrations");
                    MIGRATOR
                        .run(&pool)
                        .await
                        .map_err(|e| DbInitError::Migrate(e.to_string()))?;
                }
                Ok(pool)
            })
            .await
    }

    /// Short-timeout probe; never initializes the pool.
    pub async fn health_check(&self) -> HealthStatus {
        if self.cfg.database_url.is_none() {
            return HealthStatus::NoUrl;
        }
        let Some(pool) = self.pool.get() else {
            return HealthStatus::NotInitialized;
        };
        match tokio::time::timeout(Duration::from_secs(1), sqlx::query("SELECT 1").execute(pool))
            .await
        {
            Ok(Ok(_)) => HealthStatus::Ok,
            Ok(Err(e)) => HealthStatus::Error(e.to_string()),
            Err(_) => HealthStatus::Error("health check timed out".to_string()),
        }
    }

    async fn connect_with_retry(&self) -> Result<PgPool, DbInitError> {
        let url = self.cfg.database_url.as_deref().ok_or(DbInitError::MissingUrl)?;
        let attempts = self.cfg.retry_max_attempts.max(1);
        let mut last_error = String::from("unknown error");

        for attempt in 1..=attempts {
            let connect = PgPoolOptions::new()
                .max_connections(self.cfg.max_connections)
                .acquire_timeout(Duration::from_secs(self.cfg.acquire_timeout_secs))
                .connect(url);
            let outcome =
                tokio::time::timeout(Duration::from_secs(self.cfg.connect_timeout_secs), connect)
                    .await;
            match outcome {
                Ok(Ok(pool)) => {
                    debug!(target: "shelf_db", attempt, "connected");
                    return Ok(pool);
                }
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => {
                    last_error =
                        format!("connect timed out after {}s", self.cfg.connect_timeout_secs)
                }
            }
            if attempt < attempts {
                let delay = backoff_ms(self.cfg.retry_base_backoff_ms, attempt);
                warn!(
                    target: "shelf_db",
                    "connect attempt {}/{} failed: {} ; retrying in {} ms",
                    attempt, attempts, last_error, delay
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        Err(DbInitError::Connect { attempts, last_error })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DbInitError {
    #[error("DATABASE_URL is not set")]
    MissingUrl,

    #[error("failed to connect after {attempts} attempt(s): {last_error}")]
    Connect { attempts: u32, last_error: String },

    #[error("migrations failed: {0}")]
    Migrate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    NoUrl,
    NotInitialized,
    Ok,
    Error(String),
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

/// Exponential backoff capped at 10s, plus up to half a base step of jitter.
fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    let exp = base_ms.saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
    exp.min(10_000)
        .saturating_add(fastrand::u64(0..=base_ms / 2))
}
