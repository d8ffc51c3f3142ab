//! Pipeline entry points and wiring.
//!
//! `run` assembles the full watch pipeline — ledger, settings, extractor,
//! webhook notifier, change poller, observer — and runs it until the process
//! is torn down.

pub mod processor;
pub mod queue;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::extract::Extractor;
use crate::ledger::Ledger;
use crate::models::{Config, LedgerConfig};
use crate::notify::{Notifier, WebhookNotifier};
use crate::observer::{ChangeObserver, DocumentSource, HttpSource, watch_changes};
use crate::settings::Settings;
use crate::utils::http;

pub use processor::{PipelineStats, Processor, StatsSnapshot};
pub use queue::IngestionQueue;

/// Run the watch pipeline until torn down.
pub async fn run(config: &Config, data_dir: &Path) -> Result<()> {
    config.validate()?;

    let ledger = Ledger::new(data_dir);
    if let Err(e) = ledger.open().await {
        // Not process-fatal: reads fail open and writes surface per call, so
        // the pipeline degrades toward reprocessing until storage recovers.
        log::warn!("Ledger unavailable: {}", e);
    }

    let settings = Settings::new(data_dir);
    let extractor = Arc::new(Extractor::new(
        &config.selectors,
        &config.watcher.account,
        &config.watcher.base_url,
    )?);

    let client = http::create_client(&config.watcher)?;
    let notifier: Arc<dyn Notifier> =
        Arc::new(WebhookNotifier::new(client.clone(), &config.endpoints));
    let source: Arc<dyn DocumentSource> = Arc::new(HttpSource::new(
        client,
        config.watcher.source_url.clone(),
    ));

    let processor = Arc::new(Processor::new(
        ledger.clone(),
        settings,
        Arc::clone(&extractor),
        notifier,
    ));

    spawn_maintenance(ledger, Arc::clone(&processor), &config.ledger);

    let (changes_tx, changes_rx) = mpsc::unbounded_channel();
    tokio::spawn(watch_changes(
        Arc::clone(&source),
        Arc::clone(&extractor),
        Duration::from_millis(config.watcher.poll_interval_ms),
        changes_tx,
    ));

    log::info!(
        "Watching {} for account @{}",
        config.watcher.source_url,
        config.watcher.account
    );

    let observer = ChangeObserver::new(source, extractor, processor, &config.watcher);
    observer.run(changes_rx).await;

    Ok(())
}

/// Spawn the hourly housekeeping timers: the ledger prune sweep and the
/// session cache clear. Independent timers, never cancelled.
fn spawn_maintenance(ledger: Ledger, processor: Arc<Processor>, config: &LedgerConfig) {
    let retention = chrono::Duration::days(config.retention_days as i64);
    let prune_every = Duration::from_secs(config.prune_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(prune_every);
        // The first tick fires immediately; housekeeping waits a full period.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            ledger.prune_older_than(Utc::now() - retention).await;
        }
    });

    let clear_every = Duration::from_secs(config.session_clear_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(clear_every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            processor.clear_session();
        }
    });
}
