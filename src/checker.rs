//! Consistency checker orchestration
//!
//! Ties the fetchers, the reconciliation engine and the notifier together:
//! sample entity IDs, fetch both sides for each, reconcile, and deliver a
//! report for anything that is not clean. One entity's infrastructure
//! failure aborts only that entity's check.

use crate::error::CheckResult;
use crate::fetch::{DocumentFetcher, SourceFetcher};
use crate::notify::WebhookNotifier;
use crate::reconcile::{CheckOutcome, MissingSide, ReconcileEngine};
use crate::report::format_report;
use chrono::Local;
use serde::Serialize;
use tracing::{info, warn};

/// Result of one entity check, handed to downstream consumers
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationResult {
    pub entity_id: i64,
    pub outcome: CheckOutcome,
}

/// Aggregate counts for one batch run
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckSummary {
    pub checked: usize,
    pub inconsistent: usize,
    pub incomparable: usize,
}

pub struct ConsistencyChecker {
    source: SourceFetcher,
    documents: DocumentFetcher,
    engine: ReconcileEngine,
    notifier: WebhookNotifier,
    sample_size: usize,
}

impl ConsistencyChecker {
    pub fn new(
        source: SourceFetcher,
        documents: DocumentFetcher,
        engine: ReconcileEngine,
        notifier: WebhookNotifier,
        sample_size: usize,
    ) -> Self {
        Self {
            source,
            documents,
            engine,
            notifier,
            sample_size,
        }
    }

    /// Check one entity: fetch both sides, reconcile, notify on anything
    /// that is not clean. An incomparable outcome is never reported as
    /// consistent.
    pub async fn check_entity(&self, entity_id: i64) -> CheckResult<ReconciliationResult> {
        let source_graph = self.source.fetch(entity_id).await?;
        let document = self.documents.fetch(entity_id).await?;

        let outcome = self
            .engine
            .reconcile(source_graph.as_ref(), document.as_ref());

        match &outcome {
            CheckOutcome::Consistent => {
                info!(entity_id, "entity is consistent");
            }
            CheckOutcome::Inconsistent { discrepancies } => {
                warn!(
                    entity_id,
                    count = discrepancies.len(),
                    "entity has discrepancies"
                );
                let body = format_report(entity_id, discrepancies);
                self.notifier
                    .notify("Consistency check - divergence found", &body)
                    .await?;
            }
            CheckOutcome::Incomparable { missing } => {
                let side = match missing {
                    MissingSide::Source => "source database",
                    MissingSide::Document => "document store",
                    MissingSide::Both => "both stores",
                };
                warn!(entity_id, side, "entity could not be compared");
                let body = format!(
                    "Work order ID: {}\n\nRecord absent from the {}; comparison skipped.",
                    entity_id, side
                );
                self.notifier
                    .notify("Consistency check - entity not comparable", &body)
                    .await?;
            }
        }

        Ok(ReconciliationResult { entity_id, outcome })
    }

    /// Run one full batch: sample, check each entity, summarize. One
    /// entity's failure is logged and skipped; the batch carries on.
    pub async fn run_once(&self) -> CheckResult<CheckSummary> {
        info!("starting consistency check run");

        let entity_ids = self.source.sample_entity_ids(self.sample_size).await?;
        if entity_ids.is_empty() {
            warn!("no entities matched the sampling window");
            return Ok(CheckSummary::default());
        }
        info!(sampled = entity_ids.len(), "sampled entities for checking");

        let mut summary = CheckSummary::default();
        for entity_id in entity_ids {
            match self.check_entity(entity_id).await {
                Ok(result) => {
                    summary.checked += 1;
                    match result.outcome {
                        CheckOutcome::Inconsistent { .. } => summary.inconsistent += 1,
                        CheckOutcome::Incomparable { .. } => summary.incomparable += 1,
                        CheckOutcome::Consistent => {}
                    }
                }
                Err(e) => {
                    warn!(entity_id, error = %e, "entity check aborted");
                }
            }
        }

        info!(
            checked = summary.checked,
            inconsistent = summary.inconsistent,
            incomparable = summary.incomparable,
            "consistency check run complete"
        );

        if summary.checked > 0 && summary.inconsistent == 0 && summary.incomparable == 0 {
            let body = format!(
                "All {} sampled work orders are consistent.\n\nChecked at: {}",
                summary.checked,
                Local::now().format("%Y-%m-%d %H:%M:%S")
            );
            self.notifier
                .notify("Consistency check - all consistent", &body)
                .await?;
        }

        Ok(summary)
    }
}
