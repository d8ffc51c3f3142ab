//! Document sources and the polling change feed.
//!
//! A [`DocumentSource`] yields the current serialized HTML of the watched
//! page. The default production source fetches it over HTTP from whatever
//! renders the timeline (typically a headless-browser bridge exposing the
//! live DOM). `watch_changes` turns a source into a stream of change
//! notifications by fingerprinting the container subtree on a fixed poll
//! interval; external bridges that see real mutation events can feed the
//! same channel instead.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::extract::Extractor;

/// Source of the current rendered page document.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch the current serialized HTML of the page.
    async fn fetch(&self) -> Result<String>;
}

/// Fetches the rendered document over HTTP.
pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl DocumentSource for HttpSource {
    async fn fetch(&self) -> Result<String> {
        let text = self.client.get(&self.url).send().await?.text().await?;
        Ok(text)
    }
}

/// Poll the source and emit a change notification whenever the container
/// subtree differs from the last observation.
///
/// The first observation establishes the baseline without emitting (the
/// observer's bootstrap scan already covered it). Runs until the receiving
/// side of the channel is dropped.
pub async fn watch_changes(
    source: Arc<dyn DocumentSource>,
    extractor: Arc<Extractor>,
    poll_interval: Duration,
    changes: mpsc::UnboundedSender<()>,
) {
    let mut last_fingerprint: Option<String> = None;
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let html = match source.fetch().await {
            Ok(html) => html,
            Err(e) => {
                log::debug!("Change poll failed: {}", e);
                continue;
            }
        };
        let Some(container) = extractor.container_html(&html) else {
            continue;
        };

        let digest = fingerprint(&container);
        if last_fingerprint.as_deref() != Some(digest.as_str()) {
            let is_baseline = last_fingerprint.is_none();
            last_fingerprint = Some(digest);
            if !is_baseline && changes.send(()).is_err() {
                return;
            }
        }
    }
}

fn fingerprint(html: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(html.as_bytes());
    hex::encode(hasher.finalize())
}
