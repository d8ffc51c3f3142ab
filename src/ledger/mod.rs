//! Persistent ledger of processed post identifiers.
//!
//! Backed by a JSON file under the data directory that is re-read on every
//! operation, so restarts and external inspection need no coordination.
//! Records are persisted sorted ascending by `(processed_at, id)`, which is
//! the time index the prune sweep scans.
//!
//! Reads fail open: a missing or unreadable file behaves as an empty ledger.
//! Reprocessing a post is recoverable downstream; silently skipping one is
//! not.

pub mod session;

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};

// Re-export for convenience
pub use session::SessionCache;

const LEDGER_FILE: &str = "ledger.json";

/// One processed-post record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Post identifier
    pub id: String,

    /// When the post completed the pipeline
    pub processed_at: DateTime<Utc>,
}

/// Durable record of which post ids have completed the pipeline.
#[derive(Debug, Clone)]
pub struct Ledger {
    dir: PathBuf,
}

impl Ledger {
    /// Create a ledger rooted at the given data directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self) -> PathBuf {
        self.dir.join(LEDGER_FILE)
    }

    /// Idempotently ensure the data directory and ledger file exist.
    ///
    /// Fails with `StorageUnavailable` if the store cannot be created or
    /// read. The caller treats this as fatal for ledger operations of that
    /// call only, not process-fatal.
    pub async fn open(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(AppError::storage_unavailable)?;

        let path = self.path();
        match tokio::fs::metadata(&path).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                self.write_records(&[]).await.map_err(|e| {
                    AppError::storage_unavailable(format!("cannot initialize ledger: {e}"))
                })
            }
            Err(e) => Err(AppError::storage_unavailable(e)),
        }
    }

    /// Check whether a record exists for the given id.
    ///
    /// Never errors: an internal read failure logs and resolves `false`, so
    /// the pipeline reprocesses rather than wrongly skips.
    pub async fn has(&self, id: &str) -> bool {
        match self.load_records().await {
            Ok(records) => records.iter().any(|r| r.id == id),
            Err(e) => {
                log::warn!("Ledger read failed for {}: {}; treating as unseen", id, e);
                false
            }
        }
    }

    /// Insert or overwrite the record for `id` with the current timestamp.
    ///
    /// Idempotent. Write errors propagate; the notification for this post has
    /// already been sent when `put` is called, so the caller only logs them.
    pub async fn put(&self, id: &str) -> Result<()> {
        // Reads during put follow the same fail-open policy as `has`.
        let mut by_id: HashMap<String, LedgerRecord> = self
            .load_records()
            .await
            .unwrap_or_default()
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();

        by_id.insert(
            id.to_string(),
            LedgerRecord {
                id: id.to_string(),
                processed_at: Utc::now(),
            },
        );

        self.write_records(&sorted(by_id)).await
    }

    /// Delete all records whose timestamp is strictly before `cutoff`.
    ///
    /// Best-effort housekeeping: errors are logged and swallowed, never
    /// surfaced to the hot path.
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) {
        let records = match self.load_records().await {
            Ok(records) => records,
            Err(e) => {
                log::warn!("Prune sweep skipped: {}", e);
                return;
            }
        };

        let mut by_id: HashMap<String, LedgerRecord> = records
            .iter()
            .map(|r| (r.id.clone(), r.clone()))
            .collect();

        // Ascending scan over the time index, deleting as we go.
        let index: BTreeSet<(DateTime<Utc>, String)> = records
            .iter()
            .map(|r| (r.processed_at, r.id.clone()))
            .collect();

        let mut removed = 0usize;
        for (processed_at, id) in &index {
            if *processed_at >= cutoff {
                break;
            }
            by_id.remove(id);
            removed += 1;
        }

        if removed == 0 {
            return;
        }

        match self.write_records(&sorted(by_id)).await {
            Ok(()) => log::info!("Pruned {} ledger records older than {}", removed, cutoff),
            Err(e) => log::warn!("Prune sweep failed to write ledger: {}", e),
        }
    }

    /// Number of records currently in the ledger.
    pub async fn count(&self) -> usize {
        match self.load_records().await {
            Ok(records) => records.len(),
            Err(e) => {
                log::warn!("Ledger read failed: {}", e);
                0
            }
        }
    }

    async fn load_records(&self) -> Result<Vec<LedgerRecord>> {
        let bytes = match tokio::fs::read(self.path()).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::storage_read(e)),
        };
        serde_json::from_slice(&bytes).map_err(AppError::storage_read)
    }

    /// Write records atomically (write to temp, then rename).
    async fn write_records(&self, records: &[LedgerRecord]) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(records).map_err(AppError::storage_write)?;

        let path = self.path();
        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(AppError::storage_write)?;
        file.write_all(&bytes)
            .await
            .map_err(AppError::storage_write)?;
        file.flush().await.map_err(AppError::storage_write)?;
        drop(file);

        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(AppError::storage_write)
    }
}

/// Materialize the time index: sorted ascending by `(processed_at, id)`.
fn sorted(by_id: HashMap<String, LedgerRecord>) -> Vec<LedgerRecord> {
    let mut records: Vec<LedgerRecord> = by_id.into_values().collect();
    records.sort_by(|a, b| {
        a.processed_at
            .cmp(&b.processed_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    records
}
