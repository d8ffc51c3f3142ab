//! Post record structures sent to the notification endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of an observed post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    /// Post mentions the watched account (takes precedence over Reply)
    Mention,
    /// Post is a reply in a thread
    Reply,
    /// Neither a mention nor a reply; recorded but never delivered
    Other,
}

impl PostKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostKind::Mention => "mention",
            PostKind::Reply => "reply",
            PostKind::Other => "other",
        }
    }
}

/// Post author details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Display name
    pub name: String,

    /// Handle without the leading @
    pub username: String,

    /// Avatar image URL, if present
    pub avatar: Option<String>,
}

/// Engagement counters scraped from the post's action bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub replies: u64,
    pub retweets: u64,
    pub likes: u64,
}

/// Media attachment flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub has_images: bool,
    pub has_video: bool,
}

/// A structured post record, extracted from a rendered post element.
///
/// Missing fields default to empty/zero/None; extraction is never fatal once
/// the post identifier is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostRecord {
    /// Post identifier (dedup key)
    pub id: String,

    /// Absolute permalink URL
    pub url: Option<String>,

    /// Post text content
    pub text: String,

    /// Author details
    pub author: Author,

    /// Engagement counters
    pub metrics: Metrics,

    /// Media attachment flags
    pub media: Media,

    /// Classification result
    pub kind: PostKind,

    /// Language tag of the post text, if declared
    pub lang: Option<String>,

    /// Post creation time as rendered (ISO 8601), if present
    pub created_at: Option<String>,

    /// When this record was extracted
    pub timestamp: DateTime<Utc>,

    /// Whether test mode was active for this record
    pub test_mode: bool,

    /// Result of the ledger lookup at processing time
    pub reprocessed: bool,
}
