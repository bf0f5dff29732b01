use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::recommend::GenreStrategy;

pub const DEFAULT_TMDB_BASE: &str = "https://api.themoviedb.org/3";
pub const DEFAULT_LANGUAGE: &str = "it-IT";
pub const DEFAULT_STORE_URL: &str = "http://localhost:3000";
pub const DEFAULT_SESSION_FILE: &str = ".labtv/session.json";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:4300";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone)]
pub struct Config {
    pub tmdb_api_key: String,
    pub tmdb_base_url: String,
    pub language: String,
    pub store_url: String,
    pub session_file: PathBuf,
    pub bind_addr: SocketAddr,
    pub http_timeout: Duration,
    pub genre_strategy: GenreStrategy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let tmdb_api_key = env::var("TMDB_API_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .context("TMDB_API_KEY not set")?;

        let bind_raw = var_or("BIND_ADDR", DEFAULT_BIND_ADDR);
        let bind_addr: SocketAddr = bind_raw
            .parse()
            .with_context(|| format!("BIND_ADDR '{}' is not a socket address", bind_raw))?;

        let timeout_raw = var_or("HTTP_TIMEOUT_SECS", &DEFAULT_HTTP_TIMEOUT_SECS.to_string());
        let timeout_secs: u64 = timeout_raw
            .parse()
            .with_context(|| format!("HTTP_TIMEOUT_SECS '{}' is not a number", timeout_raw))?;

        let genre_strategy = if parse_flag(&var_or("RECOMMEND_BY_GENRE", "false")) {
            GenreStrategy::Discover
        } else {
            GenreStrategy::Disabled
        };

        let config = Self {
            tmdb_api_key,
            tmdb_base_url: var_or("TMDB_BASE_URL", DEFAULT_TMDB_BASE)
                .trim_end_matches('/')
                .to_string(),
            language: var_or("TMDB_LANGUAGE", DEFAULT_LANGUAGE),
            store_url: var_or("STORE_URL", DEFAULT_STORE_URL)
                .trim_end_matches('/')
                .to_string(),
            session_file: PathBuf::from(var_or("SESSION_FILE", DEFAULT_SESSION_FILE)),
            bind_addr,
            http_timeout: Duration::from_secs(timeout_secs.max(1)),
            genre_strategy,
        };
        info!(
            store = %config.store_url,
            language = %config.language,
            genre_strategy = ?config.genre_strategy,
            "Configuration loaded"
        );
        Ok(config)
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_truthy_flags() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" ON "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }
}
