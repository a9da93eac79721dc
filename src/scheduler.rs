use crate::config::Config;
use crate::discovery::browser::{HeavyFetcher, SessionFactory};
use crate::discovery::fetch::PageFetcher;
use crate::discovery::DiscoveryPipeline;
use crate::models::{DiscoveryError, Result};
use crate::store::RecordStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Bounded worker pool. Each worker owns one lazy render session for its
/// whole lifetime and loops: pull a record, run the pipeline, write the
/// outcome back. The pool drains when the store runs out of records or the
/// shutdown flag is raised; either way every session is released with its
/// worker.
pub struct Scheduler<F: SessionFactory + 'static> {
    workers: usize,
    ready_timeout: Duration,
    store: Arc<dyn RecordStore>,
    fetcher: Arc<dyn PageFetcher>,
    factory: Arc<F>,
    pipeline: Arc<DiscoveryPipeline>,
    shutdown: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
struct WorkerReport {
    processed: usize,
    found: usize,
    retired: bool,
}

impl<F: SessionFactory + 'static> Scheduler<F> {
    pub fn new(
        config: &Config,
        store: Arc<dyn RecordStore>,
        fetcher: Arc<dyn PageFetcher>,
        factory: Arc<F>,
    ) -> Self {
        Self {
            workers: config.crawler.workers.max(1),
            ready_timeout: Duration::from_secs(config.crawler.render_ready_timeout_seconds),
            store,
            fetcher,
            factory,
            pipeline: Arc::new(DiscoveryPipeline::new(&config.discovery)),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops workers from taking new records. In-flight pipelines
    /// run to completion.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub async fn run(&self) -> Result<()> {
        let total = self.store.count().await;
        info!("🕷️  Starting {} workers over {} records", self.workers, total);

        let mut handles = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let store = Arc::clone(&self.store);
            let fetcher = Arc::clone(&self.fetcher);
            let factory = Arc::clone(&self.factory);
            let pipeline = Arc::clone(&self.pipeline);
            let shutdown = Arc::clone(&self.shutdown);
            let ready_timeout = self.ready_timeout;
            handles.push(tokio::spawn(async move {
                worker_loop(worker_id, store, fetcher, factory, pipeline, ready_timeout, shutdown)
                    .await
            }));
        }

        let mut processed = 0;
        let mut found = 0;
        let mut retired = 0;
        for handle in handles {
            match handle.await {
                Ok(report) => {
                    processed += report.processed;
                    found += report.found;
                    if report.retired {
                        retired += 1;
                    }
                }
                Err(e) => {
                    error!("A worker task failed to join: {}", e);
                    retired += 1;
                }
            }
        }

        info!(
            "🏁 Pool drained: {}/{} records processed, {} emails found",
            processed, total, found
        );
        // Retirements alone are survivable as long as siblings picked up the
        // requeued work; unprocessed records left behind are not.
        let remaining = total.saturating_sub(processed);
        if retired > 0 && remaining > 0 && !self.shutdown.load(Ordering::Relaxed) {
            return Err(format!(
                "{} workers retired on session failures with {} records unprocessed",
                retired, remaining
            )
            .into());
        }
        Ok(())
    }
}

async fn worker_loop<F: SessionFactory>(
    worker_id: usize,
    store: Arc<dyn RecordStore>,
    fetcher: Arc<dyn PageFetcher>,
    factory: Arc<F>,
    pipeline: Arc<DiscoveryPipeline>,
    ready_timeout: Duration,
    shutdown: Arc<AtomicBool>,
) -> WorkerReport {
    let mut report = WorkerReport::default();
    // Owned by this worker alone; dropped (and the session with it) when the
    // loop ends, whether by drain, shutdown, or session failure.
    let mut renderer = HeavyFetcher::new(factory, ready_timeout);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("[worker {}] Shutdown requested, stopping intake", worker_id);
            break;
        }
        let Some(record) = store.next().await else {
            break;
        };

        let website = record.website_url();
        match pipeline.discover(fetcher.as_ref(), &mut renderer, website).await {
            Ok(Some(email)) => {
                info!(
                    "[worker {}] Record {}: {} -> {}",
                    worker_id,
                    record.id,
                    website.unwrap_or("?"),
                    email
                );
                if let Err(e) = store.update(record.id, &email).await {
                    error!("[worker {}] Failed to store record {}: {}", worker_id, record.id, e);
                }
                report.found += 1;
            }
            Ok(None) => {
                info!(
                    "[worker {}] Record {}: no email found ({})",
                    worker_id,
                    record.id,
                    website.unwrap_or("no url")
                );
            }
            Err(DiscoveryError::Session(reason)) => {
                warn!(
                    "[worker {}] Retiring, render session unavailable: {}",
                    worker_id, reason
                );
                // The in-hand record goes back for a sibling to finish.
                store.requeue(record).await;
                report.retired = true;
                break;
            }
        }
        report.processed += 1;
    }

    info!(
        "[worker {}] Done: {} records, {} emails",
        worker_id, report.processed, report.found
    );
    report
}
