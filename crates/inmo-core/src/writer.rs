use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::AppError;
use crate::models::EnrichmentUpdate;
use crate::pipeline::{
    EnrichmentEvent, EnrichmentOutcome, EnrichmentReporter, Extracted, ExtractionResult,
    OutcomeKind, RunSummary,
};
use crate::property_type::normalize_property_type;
use crate::traits::EnrichmentStore;

/// The single consumer of extraction results.
///
/// Applies results strictly one at a time, so the pipeline never runs two
/// store transactions concurrently. A failed item is counted and skipped;
/// it never stops the loop.
pub struct EnrichmentWriter<S, R>
where
    S: EnrichmentStore,
    R: EnrichmentReporter,
{
    store: S,
    reporter: Arc<R>,
}

impl<S, R> EnrichmentWriter<S, R>
where
    S: EnrichmentStore,
    R: EnrichmentReporter,
{
    pub fn new(store: S, reporter: Arc<R>) -> Self {
        Self { store, reporter }
    }

    /// Drain `results` until every sender is dropped.
    pub async fn run(
        self,
        mut results: mpsc::Receiver<ExtractionResult>,
        outcomes: Option<mpsc::UnboundedSender<EnrichmentOutcome>>,
    ) -> RunSummary {
        let mut summary = RunSummary::default();

        while let Some(result) = results.recv().await {
            let outcome = self.write(result).await;
            summary.record(outcome.kind);
            self.reporter
                .report(EnrichmentEvent::Written { outcome: &outcome });

            if let Some(tx) = &outcomes
                && tx.send(outcome).is_err()
            {
                tracing::debug!("Outcome receiver dropped");
            }
        }

        summary
    }

    async fn write(&self, result: ExtractionResult) -> EnrichmentOutcome {
        let ExtractionResult {
            property_id,
            code,
            extracted,
        } = result;

        let written = match extracted {
            Extracted::Success(details) => {
                let update = EnrichmentUpdate {
                    property_type: details
                        .property_type
                        .as_deref()
                        .and_then(normalize_property_type),
                    details: *details,
                };
                self.store
                    .apply_enrichment(property_id, &update)
                    .await
                    .map(|written| unless_skipped(written, OutcomeKind::Succeeded))
            }
            Extracted::NotAvailable => self
                .store
                .mark_not_available(property_id)
                .await
                .map(|written| unless_skipped(written, OutcomeKind::NotAvailable)),
            Extracted::Failed(e) => Err(e),
        };

        match written {
            Ok(kind) => EnrichmentOutcome {
                property_id,
                code,
                kind,
                error: None,
            },
            Err(e) => failed(property_id, code, &e),
        }
    }
}

fn unless_skipped(written: bool, kind: OutcomeKind) -> OutcomeKind {
    if written { kind } else { OutcomeKind::Skipped }
}

fn failed(property_id: i64, code: String, error: &AppError) -> EnrichmentOutcome {
    EnrichmentOutcome {
        property_id,
        code,
        kind: OutcomeKind::Failed,
        error: Some(error.to_string()),
    }
}
