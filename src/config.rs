use std::{collections::HashMap, net::SocketAddr, str::FromStr, time::Duration};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} is set to {value:?}, which is not valid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("{0} must be set when using a persistent database")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseBackend {
    Memory,
    Postgres(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database: DatabaseBackend,
    pub database_max_connections: u32,
    pub redis_url: Option<String>,
    pub jwt_secret: Option<String>,
    pub access_token_lifetime: chrono::Duration,
    pub refresh_token_lifetime: chrono::Duration,
    pub mail_max_retries: u32,
    pub mail_retry_backoff: Duration,
    pub mail_from: String,
    pub superuser: Option<(String, String)>,
    /// How often the server queues a login count report. `None` leaves it to
    /// an external scheduler.
    pub login_report_interval: Option<Duration>,
}

impl Config {
    /// Reads `.env` (when present) and then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| vars.get(key).filter(|v| !v.is_empty()).cloned();

        let database = match get("DATABASE_URL") {
            None => DatabaseBackend::Memory,
            Some(url) if url.starts_with("memory:") => DatabaseBackend::Memory,
            Some(url) if url.starts_with("postgres://") || url.starts_with("postgresql://") => {
                DatabaseBackend::Postgres(url)
            }
            Some(url) => {
                return Err(ConfigError::Invalid {
                    key: "DATABASE_URL",
                    value: url,
                    reason: String::from("expected a memory:// or postgres:// URL"),
                })
            }
        };

        let jwt_secret = get("JWT_SECRET");
        if jwt_secret.is_none() && database != DatabaseBackend::Memory {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }

        let superuser = match (get("SUPERUSER_EMAIL"), get("SUPERUSER_PASSWORD")) {
            (Some(email), Some(password)) => Some((email, password)),
            _ => None,
        };

        let report_hours: u64 = parse(&vars, "LOGIN_REPORT_INTERVAL_HOURS", "0")?;
        let login_report_interval =
            (report_hours > 0).then(|| Duration::from_secs(report_hours * 60 * 60));

        Ok(Self {
            bind_addr: parse(&vars, "BIND_ADDR", "0.0.0.0:8000")?,
            database,
            database_max_connections: parse(&vars, "DATABASE_MAX_CONNECTIONS", "5")?,
            redis_url: get("REDIS_URL"),
            jwt_secret,
            access_token_lifetime: chrono::Duration::minutes(parse(
                &vars,
                "ACCESS_TOKEN_MINUTES",
                "60",
            )?),
            refresh_token_lifetime: chrono::Duration::hours(parse(
                &vars,
                "REFRESH_TOKEN_HOURS",
                "24",
            )?),
            mail_max_retries: parse(&vars, "MAIL_MAX_RETRIES", "3")?,
            mail_retry_backoff: Duration::from_secs(parse(&vars, "MAIL_RETRY_BACKOFF_SECS", "5")?),
            mail_from: get("MAIL_FROM").unwrap_or_else(|| String::from("noreply@recipe-api.local")),
            superuser,
            login_report_interval,
        })
    }
}

fn parse<T>(vars: &HashMap<String, String>, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let value = vars
        .get(key)
        .filter(|v| !v.is_empty())
        .map(String::as_str)
        .unwrap_or(default);

    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: value.to_owned(),
        reason: e.to_string(),
    })
}
