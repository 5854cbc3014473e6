use std::{net::SocketAddr, str::FromStr};

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
    pub session_inactivity: time::Duration,
    pub event_capacity: usize,
}

impl Config {
    /// Reads the process environment, after loading `.env` if there is one.
    pub fn from_env() -> anyhow::Result<Config> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
        where
            T: FromStr,
            T::Err: std::error::Error + Send + Sync + 'static,
        {
            match lookup(key) {
                Some(raw) => raw.parse().with_context(|| format!("invalid {key}: {raw:?}")),
                None => Ok(default),
            }
        }

        let session_minutes: i64 = parsed(&lookup, "SESSION_INACTIVITY_MINUTES", 5)?;
        let max_connections: u32 = parsed(&lookup, "DB_MAX_CONNECTIONS", 16)?;
        // clearing holds a transaction while settings are read on another connection
        anyhow::ensure!(max_connections >= 2, "DB_MAX_CONNECTIONS must be at least 2, got {max_connections}");

        let event_capacity: usize = parsed(&lookup, "EVENT_CAPACITY", 64)?;
        anyhow::ensure!(event_capacity > 0, "EVENT_CAPACITY must be positive");

        Ok(Config {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://votes.db".to_owned()),
            bind_addr: parsed(&lookup, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            max_connections,
            session_inactivity: time::Duration::minutes(session_minutes),
            event_capacity,
        })
    }
}
