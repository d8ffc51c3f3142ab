//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Document source and timing behavior
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Webhook endpoint URLs
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Ledger retention and maintenance cadence
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// CSS selectors for the timeline markup
    #[serde(default)]
    pub selectors: SelectorConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.watcher.source_url.trim().is_empty() {
            return Err(AppError::validation("watcher.source_url is empty"));
        }
        if self.watcher.user_agent.trim().is_empty() {
            return Err(AppError::validation("watcher.user_agent is empty"));
        }
        if self.watcher.timeout_secs == 0 {
            return Err(AppError::validation("watcher.timeout_secs must be > 0"));
        }
        if self.watcher.debounce_ms == 0 {
            return Err(AppError::validation("watcher.debounce_ms must be > 0"));
        }
        if self.watcher.container_retry_ms == 0 {
            return Err(AppError::validation(
                "watcher.container_retry_ms must be > 0",
            ));
        }
        if self.watcher.poll_interval_ms == 0 {
            return Err(AppError::validation("watcher.poll_interval_ms must be > 0"));
        }
        if self.endpoints.mention_url.trim().is_empty() {
            return Err(AppError::validation("endpoints.mention_url is empty"));
        }
        if self.endpoints.reply_url.trim().is_empty() {
            return Err(AppError::validation("endpoints.reply_url is empty"));
        }
        if self.ledger.retention_days == 0 {
            return Err(AppError::validation("ledger.retention_days must be > 0"));
        }
        if self.watcher.account.trim().is_empty() {
            log::warn!("watcher.account is empty; mention detection is disabled");
        }
        Ok(())
    }
}

/// Document source and timing behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// URL serving the current rendered timeline document
    #[serde(default)]
    pub source_url: String,

    /// Handle of the watched account, without the leading @
    #[serde(default)]
    pub account: String,

    /// Base URL for resolving post permalinks
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Interval between document polls in milliseconds
    #[serde(default = "defaults::poll_interval")]
    pub poll_interval_ms: u64,

    /// Debounce window for change bursts in milliseconds
    #[serde(default = "defaults::debounce")]
    pub debounce_ms: u64,

    /// Retry delay while waiting for the container in milliseconds
    #[serde(default = "defaults::container_retry")]
    pub container_retry_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            source_url: String::new(),
            account: String::new(),
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            poll_interval_ms: defaults::poll_interval(),
            debounce_ms: defaults::debounce(),
            container_retry_ms: defaults::container_retry(),
        }
    }
}

/// Webhook endpoint settings. One endpoint per post kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Endpoint receiving mention notifications
    #[serde(default)]
    pub mention_url: String,

    /// Endpoint receiving reply notifications
    #[serde(default)]
    pub reply_url: String,
}

/// Ledger retention and maintenance cadence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Age in days after which ledger records are pruned
    #[serde(default = "defaults::retention_days")]
    pub retention_days: u64,

    /// Interval between prune sweeps in seconds
    #[serde(default = "defaults::prune_interval")]
    pub prune_interval_secs: u64,

    /// Interval between session cache clears in seconds
    #[serde(default = "defaults::session_clear_interval")]
    pub session_clear_interval_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            retention_days: defaults::retention_days(),
            prune_interval_secs: defaults::prune_interval(),
            session_clear_interval_secs: defaults::session_clear_interval(),
        }
    }
}

/// CSS selectors for the timeline markup.
///
/// Defaults match the observed timeline layout; override per deployment when
/// the markup shifts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Container element watched for structural changes
    #[serde(default = "defaults::container")]
    pub container: String,

    /// Post elements within the container
    #[serde(default = "defaults::post")]
    pub post: String,

    /// Permalink anchor within a post
    #[serde(default = "defaults::permalink")]
    pub permalink: String,

    /// Post text element
    #[serde(default = "defaults::text")]
    pub text: String,

    /// Author display name element
    #[serde(default = "defaults::author_name")]
    pub author_name: String,

    /// Author handle element
    #[serde(default = "defaults::author_handle")]
    pub author_handle: String,

    /// Author avatar image
    #[serde(default = "defaults::avatar")]
    pub avatar: String,

    /// Reply action button (counter in aria-label)
    #[serde(default = "defaults::reply_button")]
    pub reply_button: String,

    /// Retweet action button (counter in aria-label)
    #[serde(default = "defaults::retweet_button")]
    pub retweet_button: String,

    /// Like action button (counter in aria-label)
    #[serde(default = "defaults::like_button")]
    pub like_button: String,

    /// Attached photo element
    #[serde(default = "defaults::photo")]
    pub photo: String,

    /// Attached video player element
    #[serde(default = "defaults::video")]
    pub video: String,

    /// Timestamp element (datetime attribute)
    #[serde(default = "defaults::time")]
    pub time: String,

    /// Element carrying the reply context line
    #[serde(default = "defaults::reply_marker")]
    pub reply_marker: String,

    /// Text the reply context line must contain
    #[serde(default = "defaults::replying_to_text")]
    pub replying_to_text: String,

    /// Anchor elements inside the post text (mention link check)
    #[serde(default = "defaults::mention_link")]
    pub mention_link: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            container: defaults::container(),
            post: defaults::post(),
            permalink: defaults::permalink(),
            text: defaults::text(),
            author_name: defaults::author_name(),
            author_handle: defaults::author_handle(),
            avatar: defaults::avatar(),
            reply_button: defaults::reply_button(),
            retweet_button: defaults::retweet_button(),
            like_button: defaults::like_button(),
            photo: defaults::photo(),
            video: defaults::video(),
            time: defaults::time(),
            reply_marker: defaults::reply_marker(),
            replying_to_text: defaults::replying_to_text(),
            mention_link: defaults::mention_link(),
        }
    }
}

mod defaults {
    // Watcher defaults
    pub fn base_url() -> String {
        "https://twitter.com".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; watcher/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn poll_interval() -> u64 {
        1000
    }
    pub fn debounce() -> u64 {
        500
    }
    pub fn container_retry() -> u64 {
        1000
    }

    // Ledger defaults
    pub fn retention_days() -> u64 {
        30
    }
    pub fn prune_interval() -> u64 {
        3600
    }
    pub fn session_clear_interval() -> u64 {
        3600
    }

    // Selector defaults
    pub fn container() -> String {
        r#"[data-testid="primaryColumn"]"#.into()
    }
    pub fn post() -> String {
        r#"[data-testid="cellInnerDiv"] article[data-testid="tweet"]"#.into()
    }
    pub fn permalink() -> String {
        r#"a[href*="/status/"][role="link"]"#.into()
    }
    pub fn text() -> String {
        r#"[data-testid="tweetText"]"#.into()
    }
    pub fn author_name() -> String {
        r#"[data-testid="User-Name"] a"#.into()
    }
    pub fn author_handle() -> String {
        r#"[data-testid="User-Name"] div[dir="ltr"]"#.into()
    }
    pub fn avatar() -> String {
        r#"[data-testid="Tweet-User-Avatar"] img"#.into()
    }
    pub fn reply_button() -> String {
        r#"[data-testid="reply"]"#.into()
    }
    pub fn retweet_button() -> String {
        r#"[data-testid="retweet"]"#.into()
    }
    pub fn like_button() -> String {
        r#"[data-testid="like"]"#.into()
    }
    pub fn photo() -> String {
        r#"[data-testid="tweetPhoto"]"#.into()
    }
    pub fn video() -> String {
        r#"[data-testid="videoPlayer"]"#.into()
    }
    pub fn time() -> String {
        "time".into()
    }
    pub fn reply_marker() -> String {
        r#"div[id^="id__"]"#.into()
    }
    pub fn replying_to_text() -> String {
        "Replying to".into()
    }
    pub fn mention_link() -> String {
        r#"[data-testid="tweetText"] a[href^="/"][role="link"]"#.into()
    }
}
