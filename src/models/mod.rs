// src/models/mod.rs

//! Domain models for the watcher application.

mod config;
mod post;

// Re-export all public types
pub use config::{
    Config, EndpointsConfig, LedgerConfig, SelectorConfig, WatcherConfig,
};
pub use post::{Author, Media, Metrics, PostKind, PostRecord};

/// A unit of pending work: a post identifier plus the element it was
/// observed on. The element handle is the post's outer HTML fragment and is
/// re-parsed when the entry is processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// Post identifier extracted from the permalink
    pub id: String,

    /// Outer HTML of the post element at observation time
    pub element: String,
}
