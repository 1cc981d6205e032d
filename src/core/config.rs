use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::shared::constants::{DEFAULT_MAX_DOWNLOADS, DEFAULT_MAX_UPLOAD_SIZE};

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub notification: NotificationConfig,
    pub purge: PurgeConfig,
    pub swagger: SwaggerConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub max_request_body_size: usize,
    pub default_max_downloads: i64,
    pub public_base_url: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
}

/// Local blob storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory that holds uploaded blobs
    pub upload_dir: PathBuf,
    /// Per-file size ceiling in bytes
    pub max_upload_size: u64,
}

/// Upload notification configuration
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    /// Webhook receiving upload notices; notices are only logged when unset
    pub webhook_url: Option<String>,
    /// Bounded queue depth between request handlers and the notifier worker
    pub queue_capacity: usize,
    pub timeout: Duration,
}

/// Deferred purge configuration
#[derive(Debug, Clone)]
pub struct PurgeConfig {
    pub sweep_interval: Duration,
    pub sweep_batch_size: i64,
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        let storage = StorageConfig::from_env()?;
        Ok(Config {
            app: AppConfig::from_env(storage.max_upload_size)?,
            database: DatabaseConfig::from_env()?,
            storage,
            notification: NotificationConfig::from_env()?,
            purge: PurgeConfig::from_env()?,
            swagger: SwaggerConfig::from_env()?,
        })
    }
}

/// Read a numeric variable, falling back to `default` when unset
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, String> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| format!("{} must be a valid number", name)),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env(max_upload_size: u64) -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "5003".to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT: {}", e))?;

        // Parse CORS allowed origins from comma-separated string
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Room for a full-size file plus the rest of a multi-file form
        let default_body = usize::try_from(max_upload_size.saturating_mul(2)).unwrap_or(usize::MAX);
        let max_request_body_size = parse_env("MAX_REQUEST_BODY_SIZE", default_body)?;

        let default_max_downloads = parse_env("DEFAULT_MAX_DOWNLOADS", DEFAULT_MAX_DOWNLOADS)?;
        if default_max_downloads == 0 || default_max_downloads < -1 {
            return Err("DEFAULT_MAX_DOWNLOADS must be -1 or a positive number".to_string());
        }

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", host, port))
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            host,
            port,
            cors_allowed_origins,
            max_request_body_size,
            default_max_downloads,
            public_base_url,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    const DEFAULT_MAX_CONNECTIONS: u32 = 5;
    const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 5;

    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:files.db".to_string());

        Ok(Self {
            url,
            max_connections: parse_env("DB_MAX_CONNECTIONS", Self::DEFAULT_MAX_CONNECTIONS)?,
            busy_timeout_secs: parse_env("DB_BUSY_TIMEOUT_SECS", Self::DEFAULT_BUSY_TIMEOUT_SECS)?,
        })
    }
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, String> {
        let upload_dir = env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());
        let max_upload_size = parse_env("MAX_UPLOAD_SIZE", DEFAULT_MAX_UPLOAD_SIZE)?;

        Ok(Self {
            upload_dir: PathBuf::from(upload_dir),
            max_upload_size,
        })
    }
}

impl NotificationConfig {
    const DEFAULT_QUEUE_CAPACITY: usize = 100;
    const DEFAULT_TIMEOUT_SECS: u64 = 10;

    pub fn from_env() -> Result<Self, String> {
        let webhook_url = env::var("NOTIFY_WEBHOOK_URL")
            .ok()
            .filter(|s| !s.is_empty());

        let queue_capacity = parse_env("NOTIFY_QUEUE_CAPACITY", Self::DEFAULT_QUEUE_CAPACITY)?;
        if queue_capacity == 0 {
            return Err("NOTIFY_QUEUE_CAPACITY must be greater than zero".to_string());
        }

        let timeout_secs = parse_env("NOTIFY_TIMEOUT_SECS", Self::DEFAULT_TIMEOUT_SECS)?;

        Ok(Self {
            webhook_url,
            queue_capacity,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl PurgeConfig {
    const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
    const DEFAULT_SWEEP_BATCH_SIZE: i64 = 100;
    const DEFAULT_MAX_ATTEMPTS: u32 = 5;
    const DEFAULT_RETRY_DELAY_MS: u64 = 500;

    pub fn from_env() -> Result<Self, String> {
        let sweep_interval_secs =
            parse_env("PURGE_SWEEP_INTERVAL_SECS", Self::DEFAULT_SWEEP_INTERVAL_SECS)?;
        let retry_delay_ms = parse_env("PURGE_RETRY_DELAY_MS", Self::DEFAULT_RETRY_DELAY_MS)?;

        Ok(Self {
            sweep_interval: Duration::from_secs(sweep_interval_secs.max(1)),
            sweep_batch_size: parse_env("PURGE_SWEEP_BATCH_SIZE", Self::DEFAULT_SWEEP_BATCH_SIZE)?,
            max_attempts: parse_env("PURGE_MAX_ATTEMPTS", Self::DEFAULT_MAX_ATTEMPTS)?.max(1),
            retry_delay: Duration::from_millis(retry_delay_ms),
        })
    }
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(Self::DEFAULT_SWEEP_INTERVAL_SECS),
            sweep_batch_size: Self::DEFAULT_SWEEP_BATCH_SIZE,
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            retry_delay: Duration::from_millis(Self::DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl SwaggerConfig {
    pub fn from_env() -> Result<Self, String> {
        // Only use credentials if they are non-empty
        let username = env::var("SWAGGER_USERNAME").ok().filter(|s| !s.is_empty());
        let password = env::var("SWAGGER_PASSWORD").ok().filter(|s| !s.is_empty());
        let title = env::var("SWAGGER_TITLE").unwrap_or_else(|_| "Filedrop API".to_string());
        let version = env::var("SWAGGER_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let description = env::var("SWAGGER_DESCRIPTION")
            .unwrap_or_else(|_| "Upload files and share them for a limited number of downloads".to_string());

        Ok(Self {
            username,
            password,
            title,
            version,
            description,
        })
    }

    /// Returns credentials in "username:password" format if auth is enabled
    pub fn credentials(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some(format!("{}:{}", user, pass)),
            _ => None,
        }
    }
}
