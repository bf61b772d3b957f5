use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tiktok_relay::RelayConfig;

use crate::cli::WatchArgs;

const DEFAULT_TICK_MS: u64 = 50;
const DEFAULT_TOP_VIEWERS: usize = 3;

/// `config.toml` contents.
///
/// ```toml
/// [relay]
/// api_key = "..."
/// username = "some_streamer"
/// like_threshold = 100
///
/// [display]
/// tick_ms = 50
/// top_viewers = 3
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub relay: RelayConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub tick_ms: u64,
    pub top_viewers: usize,
    pub colored: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            top_viewers: DEFAULT_TOP_VIEWERS,
            colored: true,
        }
    }
}

impl AppConfig {
    /// `<config dir>/tikrelay/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tikrelay").join("config.toml"))
    }

    /// Load from `path`, or from the default location if it exists.
    ///
    /// An explicitly given path must exist; a missing default file yields the
    /// defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Layer command-line flags (and their env fallbacks) over the file.
    pub fn apply_watch_args(&mut self, args: &WatchArgs) {
        if let Some(username) = &args.username {
            self.relay.username = username.clone();
        }
        if let Some(api_key) = &args.api_key {
            self.relay.api_key = api_key.clone();
        }
        if let Some(base_url) = &args.base_url {
            self.relay.base_url = base_url.clone();
        }
        if let Some(threshold) = args.threshold {
            self.relay.like_threshold = threshold;
        }
        if let Some(max_log_items) = args.max_log_items {
            self.relay.max_log_items = max_log_items;
        }
        if let Some(tick_ms) = args.tick_ms {
            self.display.tick_ms = tick_ms;
        }
        if let Some(top_viewers) = args.top_viewers {
            self.display.top_viewers = top_viewers;
        }
        if args.verbose_messages {
            self.relay.verbose_logging = true;
        }
    }

    /// Render as TOML with the API key masked.
    pub fn show(&self) -> Result<String> {
        let mut masked = self.clone();
        masked.relay.api_key = mask_secret(&self.relay.api_key);
        Ok(toml::to_string_pretty(&masked)?)
    }
}

fn mask_secret(secret: &str) -> String {
    let secret = secret.trim();
    if secret.is_empty() {
        return String::new();
    }
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    format!("{head}{}", "*".repeat(chars.len() - 4))
}
