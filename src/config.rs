// src/config.rs
use crate::error::AppError;
use log::LevelFilter;
use std::collections::HashMap;
use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub scylla_node: String,
    pub alphavantage_url: String,
    pub alphavantage_api_key: String,
    pub openai_url: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub jwt_secret: String,
    pub log_level: LevelFilter,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, AppError> {
        let get = |key: &str| vars.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
        let required =
            |key: &str| get(key).ok_or_else(|| AppError::Config(format!("{} must be set", key)));

        let bind_addr = or_default("BIND_ADDR", "127.0.0.1:3030")
            .parse::<SocketAddr>()
            .map_err(|e| AppError::Config(format!("BIND_ADDR: {}", e)))?;
        let log_level = or_default("LOG_LEVEL", "info")
            .parse::<LevelFilter>()
            .map_err(|_| AppError::Config("LOG_LEVEL: unknown level".to_string()))?;

        Ok(Config {
            bind_addr,
            scylla_node: or_default("SCYLLA_NODE", "127.0.0.1:9042"),
            alphavantage_url: or_default("ALPHAVANTAGE_URL", "https://www.alphavantage.co"),
            alphavantage_api_key: required("ALPHAVANTAGE_API_KEY")?,
            openai_url: or_default("OPENAI_URL", "https://api.openai.com"),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: or_default("OPENAI_MODEL", "gpt-4o"),
            jwt_secret: required("JWT_SECRET")?,
            log_level,
        })
    }
}
