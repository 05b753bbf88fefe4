use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub integration_rps: u32,
    pub public_rps: u32,
    pub dispatch_batch_size: i64,
    pub dispatch_interval_ms: u64,
    pub dispatch_timeout_secs: u64,
    pub connector_base_url: Option<String>,
    pub replay_retention_days: i64,
    pub custom_webhook_allow: Vec<String>,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            jwt_secret: get_env("JWT_SECRET")?,
            integration_rps: get_env_parse_or("INTEGRATION_RPS", 100)?,
            public_rps: get_env_parse_or("PUBLIC_RPS", 100)?,
            dispatch_batch_size: get_env_parse_or("DISPATCH_BATCH_SIZE", 50)?,
            dispatch_interval_ms: get_env_parse_or("DISPATCH_INTERVAL_MS", 1_000)?,
            dispatch_timeout_secs: get_env_parse_or("DISPATCH_TIMEOUT_SECS", 60)?,
            connector_base_url: env::var("CONNECTOR_BASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            replay_retention_days: get_env_parse_or("REPLAY_RETENTION_DAYS", 7)?,
            custom_webhook_allow: env::var("CUSTOM_WEBHOOK_ALLOW")
                .map(|raw| {
                    raw.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
