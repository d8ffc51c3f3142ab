//! Serialized processing loop.
//!
//! Drains the ingestion queue one id at a time: dedup checks against the
//! session cache and the ledger, extraction, classification, delivery, then
//! the ledger write. A drain cycle works on the insertion-order snapshot
//! taken when the cycle starts; ids enqueued mid-cycle are picked up by the
//! immediately-following cycle. The `draining` guard keeps at most one drain
//! active per processor, so no two deliveries for the same id can race.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::extract::Extractor;
use crate::ledger::{Ledger, SessionCache};
use crate::models::{PostKind, QueueEntry};
use crate::notify::Notifier;
use crate::pipeline::queue::IngestionQueue;
use crate::settings::Settings;

/// Counters for one processor instance.
#[derive(Debug, Default)]
pub struct PipelineStats {
    /// Completed drain cycles
    pub drains: AtomicU64,
    /// Posts that went through extraction
    pub processed: AtomicU64,
    /// Successful webhook deliveries
    pub delivered: AtomicU64,
    /// Failed webhook deliveries (not retried)
    pub delivery_failures: AtomicU64,
    /// Posts skipped via the session cache
    pub skipped_session: AtomicU64,
    /// Posts skipped via the ledger
    pub skipped_ledger: AtomicU64,
    /// Elements dropped because no post id could be resolved
    pub dropped: AtomicU64,
}

/// Point-in-time view of [`PipelineStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub drains: u64,
    pub processed: u64,
    pub delivered: u64,
    pub delivery_failures: u64,
    pub skipped_session: u64,
    pub skipped_ledger: u64,
    pub dropped: u64,
}

impl PipelineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            drains: self.drains.load(Ordering::SeqCst),
            processed: self.processed.load(Ordering::SeqCst),
            delivered: self.delivered.load(Ordering::SeqCst),
            delivery_failures: self.delivery_failures.load(Ordering::SeqCst),
            skipped_session: self.skipped_session.load(Ordering::SeqCst),
            skipped_ledger: self.skipped_ledger.load(Ordering::SeqCst),
            dropped: self.dropped.load(Ordering::SeqCst),
        }
    }
}

/// Owner of the queue, the session cache, and the drain state machine.
pub struct Processor {
    queue: Mutex<IngestionQueue>,
    session: Mutex<SessionCache>,
    draining: AtomicBool,
    ledger: Ledger,
    settings: Settings,
    extractor: Arc<Extractor>,
    notifier: Arc<dyn Notifier>,
    stats: PipelineStats,
}

impl Processor {
    pub fn new(
        ledger: Ledger,
        settings: Settings,
        extractor: Arc<Extractor>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            queue: Mutex::new(IngestionQueue::new()),
            session: Mutex::new(SessionCache::new()),
            draining: AtomicBool::new(false),
            ledger,
            settings,
            extractor,
            notifier,
            stats: PipelineStats::default(),
        }
    }

    /// Enqueue a batch of observed elements and drain if idle.
    ///
    /// If a drain is already in progress the entries just land in the queue;
    /// the running drain picks them up in its next cycle.
    pub async fn enqueue(&self, batch: Vec<QueueEntry>) {
        {
            let mut queue = self.queue.lock().unwrap();
            for entry in batch {
                queue.enqueue(entry);
            }
        }

        if self.draining.swap(true, Ordering::SeqCst) {
            return;
        }

        loop {
            self.drain().await;
            self.draining.store(false, Ordering::SeqCst);

            // Entries can land between the final empty check inside drain()
            // and the flag reset above; their enqueue saw the flag still set.
            if self.queue.lock().unwrap().is_empty() {
                break;
            }
            if self.draining.swap(true, Ordering::SeqCst) {
                break;
            }
        }
    }

    /// Run drain cycles until the queue is empty.
    async fn drain(&self) {
        loop {
            let snapshot = self.queue.lock().unwrap().snapshot();
            if snapshot.is_empty() {
                break;
            }

            self.stats.drains.fetch_add(1, Ordering::SeqCst);
            log::info!("Draining {} queued post(s)", snapshot.len());

            for id in snapshot {
                // Re-read the element: a later observation of the same id may
                // have replaced the handle since the snapshot was taken.
                let element = self.queue.lock().unwrap().element(&id);
                if let Some(element) = element {
                    self.process_one(&id, &element).await;
                }
                self.queue.lock().unwrap().remove(&id);
            }
        }
    }

    /// Handle a single queued post. Never propagates errors: a failure here
    /// must not abort the drain of the remaining ids.
    async fn process_one(&self, id: &str, element: &str) {
        // Read through on every decision so an external toggle applies mid-run.
        let test_mode = self.settings.test_mode().await;

        if !test_mode && self.session.lock().unwrap().contains(id) {
            log::debug!("Post {} already processed this session, skipping", id);
            self.stats.skipped_session.fetch_add(1, Ordering::SeqCst);
            return;
        }

        let already = self.ledger.has(id).await;
        if already && !test_mode {
            log::debug!("Post {} already in ledger, skipping", id);
            self.session.lock().unwrap().add(id);
            self.stats.skipped_ledger.fetch_add(1, Ordering::SeqCst);
            return;
        }

        let Some(mut record) = self.extractor.extract(element) else {
            self.stats.dropped.fetch_add(1, Ordering::SeqCst);
            return;
        };
        record.test_mode = test_mode;
        record.reprocessed = already;

        self.stats.processed.fetch_add(1, Ordering::SeqCst);

        match record.kind {
            PostKind::Mention | PostKind::Reply => {
                match self.notifier.deliver(&record, record.kind).await {
                    Ok(()) => {
                        self.stats.delivered.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => {
                        // At-most-one-attempt: log and move on, never requeue.
                        log::warn!("Delivery failed for post {}: {}", id, e);
                        self.stats.delivery_failures.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
            PostKind::Other => {
                log::debug!(
                    "Post {} is neither mention nor reply; recording without delivery",
                    id
                );
            }
        }

        if !test_mode {
            match self.ledger.put(id).await {
                Ok(()) => self.session.lock().unwrap().add(id),
                Err(e) => log::warn!("Failed to record post {} in ledger: {}", id, e),
            }
        }
    }

    /// Clear the session cache (hourly maintenance).
    pub fn clear_session(&self) {
        let mut session = self.session.lock().unwrap();
        let cleared = session.len();
        session.clear();
        log::info!("Cleared session cache ({} ids)", cleared);
    }

    pub fn session_contains(&self, id: &str) -> bool {
        self.session.lock().unwrap().contains(id)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }
}
