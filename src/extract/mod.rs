//! Post extraction and classification.
//!
//! Turns a rendered post element into a structured [`PostRecord`] using the
//! configured CSS selectors, and classifies it as a mention, a reply, or
//! neither. Extraction is tolerant: missing fields default to empty values,
//! only a missing permalink drops the element.

use chrono::Utc;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{
    Author, Media, Metrics, PostKind, PostRecord, QueueEntry, SelectorConfig,
};
use crate::utils::{absolute_url, extract_post_id};

/// Selector-driven extractor for post elements.
pub struct Extractor {
    container: Selector,
    post: Selector,
    permalink: Selector,
    text: Selector,
    author_name: Selector,
    author_handle: Selector,
    avatar: Selector,
    reply_button: Selector,
    retweet_button: Selector,
    like_button: Selector,
    photo: Selector,
    video: Selector,
    time: Selector,
    reply_marker: Selector,
    mention_link: Selector,
    replying_to_text: String,
    account: String,
    mention_pattern: Option<Regex>,
    base_url: String,
    digits: Regex,
}

impl Extractor {
    /// Build an extractor, parsing every configured selector up front.
    pub fn new(selectors: &SelectorConfig, account: &str, base_url: &str) -> Result<Self> {
        let mention_pattern = if account.trim().is_empty() {
            None
        } else {
            let pattern = format!(r"@{}\b", regex::escape(account.trim()));
            Some(Regex::new(&pattern).map_err(|e| {
                AppError::config(format!("cannot build mention pattern: {e}"))
            })?)
        };

        Ok(Self {
            container: parse_selector(&selectors.container)?,
            post: parse_selector(&selectors.post)?,
            permalink: parse_selector(&selectors.permalink)?,
            text: parse_selector(&selectors.text)?,
            author_name: parse_selector(&selectors.author_name)?,
            author_handle: parse_selector(&selectors.author_handle)?,
            avatar: parse_selector(&selectors.avatar)?,
            reply_button: parse_selector(&selectors.reply_button)?,
            retweet_button: parse_selector(&selectors.retweet_button)?,
            like_button: parse_selector(&selectors.like_button)?,
            photo: parse_selector(&selectors.photo)?,
            video: parse_selector(&selectors.video)?,
            time: parse_selector(&selectors.time)?,
            reply_marker: parse_selector(&selectors.reply_marker)?,
            mention_link: parse_selector(&selectors.mention_link)?,
            replying_to_text: selectors.replying_to_text.clone(),
            account: account.trim().to_string(),
            mention_pattern,
            base_url: base_url.to_string(),
            digits: Regex::new(r"\d+").expect("digit pattern is valid"),
        })
    }

    /// Scan a full document for post elements inside the container.
    ///
    /// Returns `None` while the container is absent (page shell not mounted
    /// yet, or torn down by client-side navigation). Elements without a
    /// resolvable post id are dropped silently.
    pub fn scan(&self, document_html: &str) -> Option<Vec<QueueEntry>> {
        let document = Html::parse_document(document_html);
        let container = document.select(&self.container).next()?;

        let mut batch = Vec::new();
        for post in container.select(&self.post) {
            if let Some(id) = self.post_id(&post) {
                batch.push(QueueEntry {
                    id,
                    element: post.html(),
                });
            }
        }
        Some(batch)
    }

    /// Locate the container in a document and return its outer HTML.
    ///
    /// Used by the change poller to fingerprint the watched subtree.
    pub fn container_html(&self, document_html: &str) -> Option<String> {
        let document = Html::parse_document(document_html);
        document
            .select(&self.container)
            .next()
            .map(|el| el.html())
    }

    /// Extract a structured record from a stored post element fragment.
    ///
    /// Returns `None` if the permalink (and therefore the post id) cannot be
    /// resolved.
    pub fn extract(&self, element_html: &str) -> Option<PostRecord> {
        let fragment = Html::parse_fragment(element_html);
        let root = fragment.root_element();

        let permalink = root
            .select(&self.permalink)
            .next()
            .and_then(|el| el.value().attr("href"))?;
        let id = extract_post_id(permalink)?;
        let url = absolute_url(&self.base_url, permalink);

        let text_elem = root.select(&self.text).next();
        let text = text_elem
            .map(|el| el.text().collect::<String>())
            .unwrap_or_default();
        let lang = text_elem
            .and_then(|el| el.value().attr("lang"))
            .map(str::to_string);

        let author = Author {
            name: root
                .select(&self.author_name)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .unwrap_or_default(),
            username: root
                .select(&self.author_handle)
                .next()
                .map(|el| {
                    el.text()
                        .collect::<String>()
                        .trim()
                        .trim_start_matches('@')
                        .to_string()
                })
                .unwrap_or_default(),
            avatar: root
                .select(&self.avatar)
                .next()
                .and_then(|el| el.value().attr("src"))
                .map(str::to_string),
        };

        let metrics = Metrics {
            replies: self.counter(&root, &self.reply_button),
            retweets: self.counter(&root, &self.retweet_button),
            likes: self.counter(&root, &self.like_button),
        };

        let media = Media {
            has_images: root.select(&self.photo).next().is_some(),
            has_video: root.select(&self.video).next().is_some(),
        };

        let created_at = root
            .select(&self.time)
            .next()
            .and_then(|el| el.value().attr("datetime"))
            .map(str::to_string);

        let kind = self.classify(&root, &text);

        Some(PostRecord {
            id,
            url,
            text,
            author,
            metrics,
            media,
            kind,
            lang,
            created_at,
            timestamp: Utc::now(),
            test_mode: false,
            reprocessed: false,
        })
    }

    /// Classify a post element. Mention takes precedence over reply.
    fn classify(&self, root: &ElementRef<'_>, text: &str) -> PostKind {
        if self.is_mention(root, text) {
            PostKind::Mention
        } else if self.is_reply(root) {
            PostKind::Reply
        } else {
            PostKind::Other
        }
    }

    /// A mention requires both the @handle in the text and an anchor linking
    /// to the account's profile, so plain-text lookalikes don't qualify.
    fn is_mention(&self, root: &ElementRef<'_>, text: &str) -> bool {
        let Some(pattern) = &self.mention_pattern else {
            return false;
        };
        if !pattern.is_match(text) {
            return false;
        }

        let profile_href = format!("/{}", self.account);
        root.select(&self.mention_link)
            .any(|link| link.value().attr("href") == Some(profile_href.as_str()))
    }

    fn is_reply(&self, root: &ElementRef<'_>) -> bool {
        root.select(&self.reply_marker)
            .any(|el| el.text().collect::<String>().contains(&self.replying_to_text))
    }

    fn post_id(&self, post: &ElementRef<'_>) -> Option<String> {
        let href = post
            .select(&self.permalink)
            .next()
            .and_then(|el| el.value().attr("href"))?;
        extract_post_id(href)
    }

    fn counter(&self, root: &ElementRef<'_>, selector: &Selector) -> u64 {
        root.select(selector)
            .next()
            .and_then(|el| el.value().attr("aria-label"))
            .and_then(|label| self.digits.find(label))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SelectorConfig;

    fn extractor() -> Extractor {
        Extractor::new(&SelectorConfig::default(), "watched", "https://twitter.com").unwrap()
    }

    fn post_html(id: &str, text_html: &str, replying_to: bool) -> String {
        let reply_line = if replying_to {
            r#"<div id="id__ctx1">Replying to <a href="/watched">@watched</a></div>"#
        } else {
            ""
        };
        format!(
            r#"<article data-testid="tweet">
                 <div data-testid="User-Name"><a href="/alice">Alice</a><div dir="ltr">@alice</div></div>
                 <div data-testid="Tweet-User-Avatar"><img src="https://img.example/alice.png"></div>
                 {reply_line}
                 <div data-testid="tweetText" lang="en">{text_html}</div>
                 <a href="/alice/status/{id}" role="link"><time datetime="2026-01-05T10:00:00.000Z">Jan 5</time></a>
                 <button data-testid="reply" aria-label="3 Replies"></button>
                 <button data-testid="retweet" aria-label="5 reposts"></button>
                 <button data-testid="like" aria-label="9 Likes"></button>
               </article>"#
        )
    }

    fn document_html(posts: &[String]) -> String {
        let cells: String = posts
            .iter()
            .map(|p| format!(r#"<div data-testid="cellInnerDiv">{p}</div>"#))
            .collect();
        format!(
            r#"<html><body><main data-testid="primaryColumn">{cells}</main></body></html>"#
        )
    }

    #[test]
    fn test_scan_finds_posts_in_container() {
        let doc = document_html(&[
            post_html("1", "first", false),
            post_html("2", "second", false),
        ]);
        let batch = extractor().scan(&doc).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].id, "1");
        assert_eq!(batch[1].id, "2");
    }

    #[test]
    fn test_scan_without_container_is_none() {
        let doc = "<html><body><div>loading shell</div></body></html>";
        assert!(extractor().scan(doc).is_none());
    }

    #[test]
    fn test_scan_drops_posts_without_permalink() {
        let orphan = r#"<article data-testid="tweet">
            <div data-testid="tweetText">no link here</div>
        </article>"#
            .to_string();
        let doc = document_html(&[orphan, post_html("7", "ok", false)]);
        let batch = extractor().scan(&doc).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, "7");
    }

    #[test]
    fn test_extract_fields() {
        let record = extractor()
            .extract(&post_html("123", "hello world", false))
            .unwrap();

        assert_eq!(record.id, "123");
        assert_eq!(
            record.url.as_deref(),
            Some("https://twitter.com/alice/status/123")
        );
        assert_eq!(record.text, "hello world");
        assert_eq!(record.author.name, "Alice");
        assert_eq!(record.author.username, "alice");
        assert_eq!(
            record.author.avatar.as_deref(),
            Some("https://img.example/alice.png")
        );
        assert_eq!(record.metrics.replies, 3);
        assert_eq!(record.metrics.retweets, 5);
        assert_eq!(record.metrics.likes, 9);
        assert!(!record.media.has_images);
        assert_eq!(record.lang.as_deref(), Some("en"));
        assert_eq!(
            record.created_at.as_deref(),
            Some("2026-01-05T10:00:00.000Z")
        );
        assert_eq!(record.kind, PostKind::Other);
    }

    #[test]
    fn test_extract_without_permalink_is_none() {
        let html = r#"<article data-testid="tweet"><div data-testid="tweetText">x</div></article>"#;
        assert!(extractor().extract(html).is_none());
    }

    #[test]
    fn test_classify_reply() {
        let record = extractor()
            .extract(&post_html("1", "sure thing", true))
            .unwrap();
        assert_eq!(record.kind, PostKind::Reply);
    }

    #[test]
    fn test_classify_mention_requires_profile_link() {
        // Text lookalike without a profile anchor is not a mention
        let record = extractor()
            .extract(&post_html("1", "cc @watched", false))
            .unwrap();
        assert_eq!(record.kind, PostKind::Other);

        let linked = r#"cc <a href="/watched" role="link">@watched</a>"#;
        let record = extractor().extract(&post_html("1", linked, false)).unwrap();
        assert_eq!(record.kind, PostKind::Mention);
    }

    #[test]
    fn test_mention_takes_precedence_over_reply() {
        let linked = r#"thanks <a href="/watched" role="link">@watched</a>"#;
        let record = extractor().extract(&post_html("1", linked, true)).unwrap();
        assert_eq!(record.kind, PostKind::Mention);
    }

    #[test]
    fn test_empty_account_disables_mentions() {
        let ex = Extractor::new(&SelectorConfig::default(), "", "https://twitter.com").unwrap();
        let linked = r#"cc <a href="/watched" role="link">@watched</a>"#;
        let record = ex.extract(&post_html("1", linked, true)).unwrap();
        assert_eq!(record.kind, PostKind::Reply);
    }

    #[test]
    fn test_missing_metrics_default_to_zero() {
        let html = r#"<article data-testid="tweet">
                 <a href="/alice/status/5" role="link">permalink</a>
               </article>"#;
        let record = extractor().extract(html).unwrap();
        assert_eq!(record.metrics, Metrics::default());
        assert_eq!(record.text, "");
        assert!(record.lang.is_none());
    }
}
