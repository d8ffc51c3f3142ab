//! Webhook notification delivery.
//!
//! Delivers structured post records to one of two configured endpoints,
//! selected by post kind. Fire-and-forget: any transport error or non-2xx
//! response is a failure, and failures are never retried.

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{EndpointsConfig, PostKind, PostRecord};

/// Trait for notification backends.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one record. At most one attempt per call.
    async fn deliver(&self, record: &PostRecord, kind: PostKind) -> Result<()>;
}

/// HTTP webhook notifier with per-kind endpoints.
pub struct WebhookNotifier {
    client: reqwest::Client,
    mention_url: String,
    reply_url: String,
}

impl WebhookNotifier {
    pub fn new(client: reqwest::Client, endpoints: &EndpointsConfig) -> Self {
        Self {
            client,
            mention_url: endpoints.mention_url.clone(),
            reply_url: endpoints.reply_url.clone(),
        }
    }

    fn endpoint(&self, kind: PostKind) -> &str {
        match kind {
            PostKind::Mention => &self.mention_url,
            _ => &self.reply_url,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(&self, record: &PostRecord, kind: PostKind) -> Result<()> {
        let endpoint = self.endpoint(kind);

        let response = self
            .client
            .post(endpoint)
            .json(record)
            .send()
            .await
            .map_err(|e| AppError::delivery(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::delivery(endpoint, format!("HTTP status {status}")));
        }

        log::info!(
            "Delivered {} notification for post {} ({})",
            kind.as_str(),
            record.id,
            status
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::models::{Author, Media, Metrics};

    fn make_record(id: &str, kind: PostKind) -> PostRecord {
        PostRecord {
            id: id.to_string(),
            url: Some(format!("https://twitter.com/u/status/{id}")),
            text: "hello".to_string(),
            author: Author::default(),
            metrics: Metrics::default(),
            media: Media::default(),
            kind,
            lang: None,
            created_at: None,
            timestamp: Utc::now(),
            test_mode: false,
            reprocessed: false,
        }
    }

    fn notifier_for(server: &mockito::ServerGuard) -> WebhookNotifier {
        WebhookNotifier::new(
            reqwest::Client::new(),
            &EndpointsConfig {
                mention_url: format!("{}/mention", server.url()),
                reply_url: format!("{}/reply", server.url()),
            },
        )
    }

    #[tokio::test]
    async fn test_mention_goes_to_mention_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mention = server
            .mock("POST", "/mention")
            .with_status(200)
            .create_async()
            .await;
        let reply = server
            .mock("POST", "/reply")
            .expect(0)
            .create_async()
            .await;

        let notifier = notifier_for(&server);
        notifier
            .deliver(&make_record("1", PostKind::Mention), PostKind::Mention)
            .await
            .unwrap();

        mention.assert_async().await;
        reply.assert_async().await;
    }

    #[tokio::test]
    async fn test_reply_goes_to_reply_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let reply = server
            .mock("POST", "/reply")
            .match_header("content-type", "application/json")
            .with_status(200)
            .create_async()
            .await;

        let notifier = notifier_for(&server);
        notifier
            .deliver(&make_record("2", PostKind::Reply), PostKind::Reply)
            .await
            .unwrap();

        reply.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_2xx_is_a_delivery_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/reply")
            .with_status(500)
            .create_async()
            .await;

        let notifier = notifier_for(&server);
        let err = notifier
            .deliver(&make_record("3", PostKind::Reply), PostKind::Reply)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Delivery { .. }));
    }
}
