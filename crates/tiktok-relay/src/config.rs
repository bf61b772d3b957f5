//! Relay client configuration.
//!
//! Values are supplied by the host as plain settings; the core never reads
//! files or assets on its own.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigurationError;

/// Default relay endpoint; the username is appended as the last path segment.
pub const DEFAULT_BASE_URL: &str = "wss://tiktok-live-server-2.onrender.com/ws/";

/// Placeholder username that must never be used to connect.
pub const DEFAULT_USERNAME: &str = "default";

/// Placeholder API key written when no real key was configured.
pub const API_KEY_PLACEHOLDER: &str = "xxxxxxxxxxx";

/// Default number of gift streak entries kept in history.
pub const DEFAULT_MAX_LOG_ITEMS: usize = 50;

/// Default cumulative-like milestone step.
pub const DEFAULT_LIKE_THRESHOLD: u64 = 100;

/// Configuration for a [`RelayClient`](crate::RelayClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Relay WebSocket base URL (`ws://` or `wss://`)
    pub base_url: String,
    /// API key sent in the handshake frame
    pub api_key: String,
    /// TikTok username whose live stream is relayed
    pub username: String,
    /// Log every processed payload and unknown message types
    pub verbose_logging: bool,
    /// Upper bound on gift streak history
    pub max_log_items: usize,
    /// Like milestone step
    pub like_threshold: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            username: DEFAULT_USERNAME.to_string(),
            verbose_logging: false,
            max_log_items: DEFAULT_MAX_LOG_ITEMS,
            like_threshold: DEFAULT_LIKE_THRESHOLD,
        }
    }
}

impl RelayConfig {
    /// Create a config with credentials and defaults for everything else.
    pub fn new(api_key: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            username: username.into(),
            ..Self::default()
        }
    }

    /// Set the relay base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Set the username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Enable or disable verbose message logging.
    pub fn with_verbose_logging(mut self, verbose: bool) -> Self {
        self.verbose_logging = verbose;
        self
    }

    /// Set the gift streak history bound.
    pub fn with_max_log_items(mut self, max_log_items: usize) -> Self {
        self.max_log_items = max_log_items;
        self
    }

    /// Set the like milestone step.
    pub fn with_like_threshold(mut self, threshold: u64) -> Self {
        self.like_threshold = threshold;
        self
    }

    /// Validate construction-time settings.
    ///
    /// Credentials are not checked here; see [`validate_credentials`](Self::validate_credentials).
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_log_items == 0 {
            return Err(ConfigurationError::invalid_setting(
                "max_log_items",
                "must be at least 1",
            ));
        }
        if self.like_threshold == 0 {
            return Err(ConfigurationError::invalid_setting(
                "like_threshold",
                "must be at least 1",
            ));
        }
        self.parse_base_url().map(|_| ())
    }

    /// Gate applied on every connect attempt.
    pub fn validate_credentials(&self) -> Result<(), ConfigurationError> {
        let api_key = self.api_key.trim();
        if api_key.is_empty() || api_key == API_KEY_PLACEHOLDER {
            return Err(ConfigurationError::MissingApiKey);
        }

        let username = self.username.trim();
        if username.is_empty() {
            return Err(ConfigurationError::EmptyUsername);
        }
        if username == DEFAULT_USERNAME {
            return Err(ConfigurationError::DefaultUsername(DEFAULT_USERNAME.to_string()));
        }
        Ok(())
    }

    /// Build `<base-url>/<username>`.
    pub fn endpoint_url(&self) -> Result<String, ConfigurationError> {
        let mut url = self.parse_base_url()?;
        url.path_segments_mut()
            .map_err(|_| ConfigurationError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: "URL cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .push(self.username.trim());
        Ok(url.into())
    }

    fn parse_base_url(&self) -> Result<Url, ConfigurationError> {
        let url = Url::parse(&self.base_url).map_err(|e| ConfigurationError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(ConfigurationError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: format!("unsupported scheme '{other}', expected ws or wss"),
            }),
        }
    }
}
