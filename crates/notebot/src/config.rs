// notebot/crates/notebot/src/config.rs

use anyhow::{Context, Result};
use std::env;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub db_path: String,
    pub weather_base_url: String,
    pub weather_latitude: f64,
    pub weather_longitude: f64,
    pub weather_timeout_seconds: u64,
    /// How many notes a list reply fetches.
    pub list_fetch_limit: i64,
    /// How many of the fetched notes are rendered inline.
    pub list_preview_count: usize,
    /// How many search hits are rendered inline.
    pub search_preview_count: usize,
    pub poll_timeout_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            warn!("Failed to load .env file: {}. Using system environment variables.", e);
        } else {
            info!("Loaded environment variables from .env file");
        }

        // The only credential the bot needs; startup fails without it.
        let bot_token = env::var("BOT_TOKEN")
            .context("BOT_TOKEN environment variable not set. Please set it in your .env file")?;

        Ok(Self {
            bot_token,
            db_path: env::var("NOTES_DB_PATH").unwrap_or_else(|_| "notes.db".into()),
            weather_base_url: env::var("WEATHER_BASE_URL")
                .unwrap_or_else(|_| "https://api.open-meteo.com".into()),
            weather_latitude: env::var("WEATHER_LATITUDE")
                .unwrap_or_else(|_| "55.7558".into())
                .parse()?,
            weather_longitude: env::var("WEATHER_LONGITUDE")
                .unwrap_or_else(|_| "37.6173".into())
                .parse()?,
            weather_timeout_seconds: env::var("WEATHER_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "10".into())
                .parse()?,
            list_fetch_limit: env::var("LIST_FETCH_LIMIT")
                .unwrap_or_else(|_| "20".into())
                .parse()?,
            list_preview_count: env::var("LIST_PREVIEW_COUNT")
                .unwrap_or_else(|_| "10".into())
                .parse()?,
            search_preview_count: env::var("SEARCH_PREVIEW_COUNT")
                .unwrap_or_else(|_| "5".into())
                .parse()?,
            poll_timeout_seconds: env::var("POLL_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "60".into())
                .parse()?,
        })
    }

    /// Log the effective configuration. The token is never logged.
    pub fn log_summary(&self) {
        info!("Configuration:");
        info!("- Database path: {}", self.db_path);
        info!("- Weather endpoint: {}", self.weather_base_url);
        info!(
            "- Weather coordinates: {}, {}",
            self.weather_latitude, self.weather_longitude
        );
        info!("- Weather timeout: {}s", self.weather_timeout_seconds);
        info!("- List preview: {} of {}", self.list_preview_count, self.list_fetch_limit);
        info!("- Poll timeout: {}s", self.poll_timeout_seconds);
    }
}

/// Helper to build a Config without touching the process environment.
#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        bot_token: "test-token".to_string(),
        db_path: ":memory:".to_string(),
        weather_base_url: "http://127.0.0.1:9".to_string(),
        weather_latitude: 55.7558,
        weather_longitude: 37.6173,
        weather_timeout_seconds: 1,
        list_fetch_limit: 20,
        list_preview_count: 10,
        search_preview_count: 5,
        poll_timeout_seconds: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation_with_default_values() {
        let config = test_config();
        assert_eq!(config.list_fetch_limit, 20);
        assert_eq!(config.list_preview_count, 10);
        assert_eq!(config.search_preview_count, 5);
    }

    #[test]
    fn test_config_clone() {
        let config1 = test_config();
        let config2 = config1.clone();
        assert_eq!(config1.db_path, config2.db_path);
        assert_eq!(config1.weather_base_url, config2.weather_base_url);
    }
}
