//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Credentials for the admin account created at startup when absent.
#[derive(Clone, Debug)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// When set, snapshots go to Postgres instead of `data_dir`.
    pub database_url: Option<String>,
    pub data_dir: PathBuf,
    pub log_level: Level,
    pub session_expiry_hours: i64,
    pub auth_session_days: i64,
    pub frontend_url: String,
    pub sweep_interval_secs: u64,
    pub admin: Option<AdminBootstrap>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Storage Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:5000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Session Settings ---
        let session_expiry_hours = positive_var("SESSION_EXPIRY_HOURS", 24)?;
        let auth_session_days = positive_var("AUTH_SESSION_DAYS", 30)?;
        let sweep_interval_secs = positive_var("SWEEP_INTERVAL_SECS", 300)? as u64;

        let frontend_url = std::env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:5173".to_string());

        // --- Load the optional bootstrap admin ---
        let admin = match (std::env::var("ADMIN_EMAIL"), std::env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) => Some(AdminBootstrap {
                email,
                password,
                display_name: std::env::var("ADMIN_NAME").unwrap_or_else(|_| "Admin".to_string()),
            }),
            (Ok(_), Err(_)) => return Err(ConfigError::MissingVar("ADMIN_PASSWORD".to_string())),
            _ => None,
        };

        Ok(Self {
            bind_address,
            database_url,
            data_dir,
            log_level,
            session_expiry_hours,
            auth_session_days,
            frontend_url,
            sweep_interval_secs,
            admin,
        })
    }
}

fn positive_var(name: &str, default: i64) -> Result<i64, ConfigError> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(default);
    };
    match raw.trim().parse::<i64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("'{}' is not a positive integer", raw),
        )),
    }
}
