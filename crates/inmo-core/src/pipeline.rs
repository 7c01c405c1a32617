//! Detail-enrichment pipeline.
//!
//! N worker tasks pull pending properties from a shared queue, call the
//! agency's site adapter under a deadline, and push one [`ExtractionResult`]
//! per property onto a small bounded channel. A single [`EnrichmentWriter`]
//! drains that channel and performs every write, one transaction at a time.
//! Workers block on `send` when the writer falls behind.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Property, PropertyDetails};
use crate::traits::{AdapterFactory, EnrichmentStore, PendingScope, SiteAdapter};
use crate::writer::EnrichmentWriter;

/// Tuning knobs for an enrichment run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub workers: usize,
    /// Deadline for the first adapter call.
    pub request_timeout: Duration,
    /// Deadline for the single retry after a timeout.
    pub escalated_timeout: Duration,
    /// Pause after each adapter call, per worker.
    pub request_delay: Duration,
    /// Capacity of the results channel feeding the writer.
    pub result_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 15,
            request_timeout: Duration::from_secs(120),
            escalated_timeout: Duration::from_secs(300),
            request_delay: Duration::from_secs(1),
            result_capacity: 16,
        }
    }
}

impl PipelineConfig {
    /// Reduced concurrency for diagnostic runs.
    pub fn test_mode() -> Self {
        Self {
            workers: 2,
            ..Self::default()
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

/// Classified result of extracting one property.
#[derive(Debug)]
pub enum Extracted {
    Success(Box<PropertyDetails>),
    NotAvailable,
    Failed(AppError),
}

impl Extracted {
    pub fn label(&self) -> &'static str {
        match self {
            Extracted::Success(_) => "success",
            Extracted::NotAvailable => "not_available",
            Extracted::Failed(_) => "failed",
        }
    }
}

/// One message on the results channel.
#[derive(Debug)]
pub struct ExtractionResult {
    pub property_id: i64,
    pub code: String,
    pub extracted: Extracted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Succeeded,
    Failed,
    NotAvailable,
    /// The property left `pending` before the write landed; nothing changed.
    Skipped,
}

/// What the writer did with one property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichmentOutcome {
    pub property_id: i64,
    pub code: String,
    pub kind: OutcomeKind,
    pub error: Option<String>,
}

/// Aggregate counts of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub succeeded: u64,
    pub failed: u64,
    pub not_available: u64,
    pub skipped: u64,
}

impl RunSummary {
    pub fn record(&mut self, kind: OutcomeKind) {
        match kind {
            OutcomeKind::Succeeded => self.succeeded += 1,
            OutcomeKind::Failed => self.failed += 1,
            OutcomeKind::NotAvailable => self.not_available += 1,
            OutcomeKind::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.succeeded + self.failed + self.not_available + self.skipped
    }
}

/// Events emitted by the pipeline for monitoring/logging.
#[derive(Debug, Clone)]
pub enum EnrichmentEvent<'a> {
    RunStarted {
        run_id: Uuid,
        properties: usize,
        workers: usize,
    },
    WorkerStarted {
        worker: usize,
    },
    Extracting {
        worker: usize,
        property_id: i64,
        url: &'a str,
    },
    TimeoutEscalated {
        worker: usize,
        property_id: i64,
        timeout_secs: u64,
    },
    Extracted {
        worker: usize,
        property_id: i64,
        result: &'a Extracted,
    },
    WorkerStopped {
        worker: usize,
        processed: u64,
    },
    Written {
        outcome: &'a EnrichmentOutcome,
    },
    RunFinished {
        run_id: Uuid,
        summary: &'a RunSummary,
    },
}

/// Trait for receiving pipeline events (decoupled logging).
pub trait EnrichmentReporter: Send + Sync {
    fn report(&self, event: EnrichmentEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEnrichmentReporter;

impl EnrichmentReporter for TracingEnrichmentReporter {
    fn report(&self, event: EnrichmentEvent<'_>) {
        match event {
            EnrichmentEvent::RunStarted {
                run_id,
                properties,
                workers,
            } => {
                tracing::info!(%run_id, properties, workers, "Enrichment run started");
            }
            EnrichmentEvent::WorkerStarted { worker } => {
                tracing::debug!(worker, "Worker started");
            }
            EnrichmentEvent::Extracting {
                worker,
                property_id,
                url,
            } => {
                tracing::info!(worker, property_id, %url, "Extracting property details");
            }
            EnrichmentEvent::TimeoutEscalated {
                worker,
                property_id,
                timeout_secs,
            } => {
                tracing::warn!(worker, property_id, timeout_secs, "Timed out, retrying with longer deadline");
            }
            EnrichmentEvent::Extracted {
                worker,
                property_id,
                result,
            } => match result {
                Extracted::Failed(error) => {
                    tracing::warn!(worker, property_id, %error, "Extraction failed");
                }
                other => {
                    tracing::debug!(worker, property_id, result = other.label(), "Extraction finished");
                }
            },
            EnrichmentEvent::WorkerStopped { worker, processed } => {
                tracing::debug!(worker, processed, "Worker stopped");
            }
            EnrichmentEvent::Written { outcome } => match &outcome.error {
                Some(error) => {
                    tracing::warn!(property_id = outcome.property_id, code = %outcome.code, %error, "Property left pending");
                }
                None if outcome.kind == OutcomeKind::Skipped => {
                    tracing::info!(property_id = outcome.property_id, code = %outcome.code, "Property no longer pending, skipped");
                }
                None => {
                    tracing::info!(property_id = outcome.property_id, code = %outcome.code, kind = ?outcome.kind, "Property written");
                }
            },
            EnrichmentEvent::RunFinished { run_id, summary } => {
                tracing::info!(
                    %run_id,
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    not_available = summary.not_available,
                    skipped = summary.skipped,
                    "Enrichment run finished"
                );
            }
        }
    }
}

/// Bounded worker pool plus single writer.
pub struct EnrichmentPipeline<F, S>
where
    F: AdapterFactory,
    S: EnrichmentStore,
{
    factory: F,
    store: S,
    config: PipelineConfig,
}

impl<F, S> EnrichmentPipeline<F, S>
where
    F: AdapterFactory + 'static,
    S: EnrichmentStore + 'static,
{
    pub fn new(factory: F, store: S, config: PipelineConfig) -> Self {
        Self {
            factory,
            store,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fetch pending properties from the store and enrich them.
    pub async fn run_pending<R: EnrichmentReporter + 'static>(
        &self,
        scope: &PendingScope,
        cancel_token: CancellationToken,
        reporter: Arc<R>,
    ) -> Result<RunSummary, AppError> {
        let properties = self.store.pending_properties(scope).await?;
        Ok(self.run(properties, cancel_token, reporter, None).await)
    }

    /// Enrich the given properties, returning aggregate counts.
    ///
    /// When `outcomes` is set, every per-property outcome is forwarded to it
    /// as the writer produces it. The channel is unbounded so the writer never
    /// waits on the caller; outcomes can be read during or after the run.
    pub async fn run<R: EnrichmentReporter + 'static>(
        &self,
        properties: Vec<Property>,
        cancel_token: CancellationToken,
        reporter: Arc<R>,
        outcomes: Option<mpsc::UnboundedSender<EnrichmentOutcome>>,
    ) -> RunSummary {
        let run_id = Uuid::new_v4();
        let workers = self.config.workers.max(1).min(properties.len().max(1));
        reporter.report(EnrichmentEvent::RunStarted {
            run_id,
            properties: properties.len(),
            workers,
        });

        let (result_tx, result_rx) = mpsc::channel(self.config.result_capacity.max(1));
        let writer = EnrichmentWriter::new(self.store.clone(), reporter.clone());
        let writer_handle = tokio::spawn(writer.run(result_rx, outcomes));

        let (work_tx, work_rx) = mpsc::channel(workers);
        let work_rx = Arc::new(Mutex::new(work_rx));

        let feeder_cancel = cancel_token.clone();
        let feeder = tokio::spawn(async move {
            for property in properties {
                tokio::select! {
                    sent = work_tx.send(property) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                    () = feeder_cancel.cancelled() => break,
                }
            }
        });

        let mut pool = JoinSet::new();
        for id in 0..workers {
            let worker = Worker {
                id,
                factory: self.factory.clone(),
                store: self.store.clone(),
                config: self.config.clone(),
                queue: work_rx.clone(),
                results: result_tx.clone(),
                cancel_token: cancel_token.clone(),
                reporter: reporter.clone(),
            };
            pool.spawn(async move { worker.run().await });
        }
        // The writer stops once the last worker drops its sender.
        drop(result_tx);

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Enrichment worker panicked");
            }
        }
        if let Err(e) = feeder.await {
            tracing::error!(error = %e, "Enrichment feeder panicked");
        }

        let summary = match writer_handle.await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, "Enrichment writer panicked");
                RunSummary::default()
            }
        };

        reporter.report(EnrichmentEvent::RunFinished {
            run_id,
            summary: &summary,
        });
        summary
    }
}

struct Worker<F, S, R>
where
    F: AdapterFactory,
    S: EnrichmentStore,
    R: EnrichmentReporter,
{
    id: usize,
    factory: F,
    store: S,
    config: PipelineConfig,
    queue: Arc<Mutex<mpsc::Receiver<Property>>>,
    results: mpsc::Sender<ExtractionResult>,
    cancel_token: CancellationToken,
    reporter: Arc<R>,
}

impl<F, S, R> Worker<F, S, R>
where
    F: AdapterFactory,
    S: EnrichmentStore,
    R: EnrichmentReporter,
{
    async fn run(self) {
        self.reporter
            .report(EnrichmentEvent::WorkerStarted { worker: self.id });

        let mut adapters: HashMap<i64, F::Adapter> = HashMap::new();
        let mut processed = 0u64;

        loop {
            let next = {
                let mut queue = self.queue.lock().await;
                tokio::select! {
                    property = queue.recv() => property,
                    () = self.cancel_token.cancelled() => None,
                }
            };
            let Some(property) = next else { break };

            let extracted = self.extract(&property, &mut adapters).await;
            self.reporter.report(EnrichmentEvent::Extracted {
                worker: self.id,
                property_id: property.id,
                result: &extracted,
            });
            processed += 1;

            let result = ExtractionResult {
                property_id: property.id,
                code: property.code,
                extracted,
            };
            if self.results.send(result).await.is_err() {
                tracing::error!(worker = self.id, "Writer stopped, worker exiting");
                break;
            }

            tokio::select! {
                () = tokio::time::sleep(self.config.request_delay) => {}
                () = self.cancel_token.cancelled() => break,
            }
        }

        self.reporter.report(EnrichmentEvent::WorkerStopped {
            worker: self.id,
            processed,
        });
    }

    async fn extract(
        &self,
        property: &Property,
        adapters: &mut HashMap<i64, F::Adapter>,
    ) -> Extracted {
        if !adapters.contains_key(&property.agency_id) {
            match self.build_adapter(property.agency_id).await {
                Ok(adapter) => {
                    adapters.insert(property.agency_id, adapter);
                }
                Err(e) => return Extracted::Failed(e),
            }
        }
        let Some(adapter) = adapters.get(&property.agency_id) else {
            return Extracted::Failed(AppError::UnsupportedSystem(format!(
                "no adapter for agency {}",
                property.agency_id
            )));
        };

        self.reporter.report(EnrichmentEvent::Extracting {
            worker: self.id,
            property_id: property.id,
            url: &property.url,
        });

        let first = self
            .call_adapter(adapter, &property.url, self.config.request_timeout)
            .await;
        let result = match first {
            Err(e) if e.is_timeout() => {
                self.reporter.report(EnrichmentEvent::TimeoutEscalated {
                    worker: self.id,
                    property_id: property.id,
                    timeout_secs: self.config.escalated_timeout.as_secs(),
                });
                self.call_adapter(adapter, &property.url, self.config.escalated_timeout)
                    .await
            }
            other => other,
        };

        match result {
            Ok(details) => Extracted::Success(Box::new(details)),
            Err(AppError::NotFound(_)) => Extracted::NotAvailable,
            Err(e) => Extracted::Failed(e),
        }
    }

    async fn build_adapter(&self, agency_id: i64) -> Result<F::Adapter, AppError> {
        let agency = self
            .store
            .agency(agency_id)
            .await?
            .ok_or_else(|| AppError::DatabaseError(format!("agency {} not found", agency_id)))?;
        self.factory.for_agency(&agency)
    }

    async fn call_adapter(
        &self,
        adapter: &F::Adapter,
        url: &str,
        timeout: Duration,
    ) -> Result<PropertyDetails, AppError> {
        tokio::select! {
            res = tokio::time::timeout(timeout, adapter.property_details(url)) => match res {
                Ok(inner) => inner,
                Err(_) => Err(AppError::Timeout(timeout.as_secs())),
            },
            () = self.cancel_token.cancelled() => Err(AppError::Cancelled),
        }
    }
}
