//! Configuration module for handling environment variables and .env files

use crate::client::RedditClient;
use crate::error::Result;
use dotenv::dotenv;
use log::{info, warn};
use std::collections::BTreeSet;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Statuses retried by default on idempotent requests
pub const DEFAULT_RETRY_ERROR_CODES: [u16; 4] = [502, 503, 504, 522];

/// Application configuration, passed explicitly to the client and every component it owns
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Reddit API credentials
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub refresh_token: Option<String>,
    pub device_id: Option<String>,
    pub scope: Option<String>,

    // OAuth token (if provided directly)
    pub access_token: Option<String>,
    /// Lifetime of `access_token` in seconds; `None` means the token is never considered expired
    pub token_expires_in: Option<u64>,

    // Reddit API settings
    pub user_agent: String,
    pub endpoint_domain: String,
    pub request_timeout: Duration,

    // Request pipeline behaviour
    pub request_delay: Duration,
    pub continue_after_ratelimit_error: bool,
    pub retry_error_codes: BTreeSet<u16>,
    pub max_retry_attempts: u32,
    pub stale_token_threshold: Duration,

    // CLI display
    pub display_timezone: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            username: None,
            password: None,
            refresh_token: None,
            device_id: None,
            scope: None,
            access_token: None,
            token_expires_in: None,
            user_agent: format!("redpage/{}", env!("CARGO_PKG_VERSION")),
            endpoint_domain: "reddit.com".to_string(),
            request_timeout: Duration::from_secs(30),
            request_delay: Duration::ZERO,
            continue_after_ratelimit_error: false,
            retry_error_codes: DEFAULT_RETRY_ERROR_CODES.into_iter().collect(),
            max_retry_attempts: 3,
            stale_token_threshold: Duration::from_secs(10),
            display_timezone: "America/Los_Angeles".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and .env file
    pub fn load() -> Self {
        // Try to load .env file, but continue even if it doesn't exist
        match dotenv() {
            Ok(_) => info!("Loaded environment from .env file"),
            Err(_) => info!("No .env file found, using system environment variables only"),
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup (environment-style `REDDIT_*` keys)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.client_id = lookup("REDDIT_CLIENT_ID");
        config.client_secret = lookup("REDDIT_CLIENT_SECRET");
        config.username = lookup("REDDIT_USERNAME");
        config.password = lookup("REDDIT_PASSWORD");
        config.refresh_token = lookup("REDDIT_REFRESH_TOKEN");
        config.device_id = lookup("REDDIT_DEVICE_ID");
        config.scope = lookup("REDDIT_SCOPE");
        config.access_token = lookup("REDDIT_ACCESS_TOKEN");
        config.token_expires_in = parsed(&lookup, "REDDIT_TOKEN_EXPIRES_IN");

        if let Some(user_agent) = lookup("REDDIT_USER_AGENT") {
            config.user_agent = user_agent;
        }
        if let Some(domain) = lookup("REDDIT_ENDPOINT_DOMAIN") {
            config.endpoint_domain = domain;
        }
        if let Some(secs) = parsed::<u64, _>(&lookup, "REDDIT_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(millis) = parsed::<u64, _>(&lookup, "REDDIT_REQUEST_DELAY_MS") {
            config.request_delay = Duration::from_millis(millis);
        }
        if let Some(queue) = parsed(&lookup, "REDDIT_CONTINUE_AFTER_RATELIMIT") {
            config.continue_after_ratelimit_error = queue;
        }
        if let Some(attempts) = parsed(&lookup, "REDDIT_MAX_RETRY_ATTEMPTS") {
            config.max_retry_attempts = attempts;
        }
        if let Some(secs) = parsed::<u64, _>(&lookup, "REDDIT_STALE_TOKEN_THRESHOLD_SECS") {
            config.stale_token_threshold = Duration::from_secs(secs);
        }
        if let Some(codes) = lookup("REDDIT_RETRY_ERROR_CODES") {
            match parse_status_list(&codes) {
                Some(set) => config.retry_error_codes = set,
                None => warn!("Ignoring unparseable REDDIT_RETRY_ERROR_CODES: {}", codes),
            }
        }
        if let Some(tz) = lookup("REDDIT_DISPLAY_TIMEZONE") {
            config.display_timezone = tz;
        }

        config
    }

    /// Base URL for authenticated API calls
    pub fn oauth_base_url(&self) -> String {
        format!("https://oauth.{}/", self.endpoint_domain)
    }

    /// Token endpoint URL
    pub fn token_url(&self) -> String {
        format!("https://www.{}/api/v1/access_token", self.endpoint_domain)
    }

    /// Create a RedditClient from this configuration
    pub fn create_client(&self) -> Result<RedditClient> {
        RedditClient::new(self.clone())
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparseable {}: {}", key, raw);
            None
        }
    }
}

fn parse_status_list(raw: &str) -> Option<BTreeSet<u16>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u16>().ok())
        .collect()
}
