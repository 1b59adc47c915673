use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use procura_core::StatusGuard;
use procura_purchasing::{Agent, NewDecision};

use super::intent::{IntentStatus, SagaIntent};
use crate::ledger::DecisionLedger;
use crate::store::{ProcurementStore, StoreError};

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    /// Intents moved to NEEDS_REVIEW by this run.
    pub flagged: Vec<SagaIntent>,
}

/// Flag intents stuck in ATTEMPTING for longer than `older_than`.
///
/// A stuck intent means a process stopped between a send and its persist; whether the
/// message went out is unknown, so the intent is handed to an operator rather than
/// retried.
#[instrument(skip(store, ledger), err)]
pub async fn reconcile(
    store: &dyn ProcurementStore,
    ledger: &DecisionLedger,
    older_than: Duration,
) -> Result<ReconcileReport, StoreError> {
    let window = chrono::Duration::from_std(older_than).unwrap_or(chrono::Duration::MAX);
    let cutoff = Utc::now()
        .checked_sub_signed(window)
        .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
    let guard = StatusGuard::new(IntentStatus::Attempting, IntentStatus::NeedsReview)?;

    let mut report = ReconcileReport::default();
    for mut intent in store.stale_intents(cutoff).await? {
        let note = format!(
            "no outcome recorded since {}; verify whether the {} message was delivered",
            intent.updated_at.to_rfc3339(),
            intent.kind
        );
        if !store.close_intent(intent.id, guard, Some(note.clone())).await? {
            continue;
        }
        warn!(intent = %intent.id, kind = %intent.kind, key = %intent.key, "intent needs review");
        ledger
            .record(NewDecision::new(
                Agent::Reconciliation,
                format!("Flagged {} intent {} ({}) for manual review", intent.kind, intent.id, intent.key),
            ))
            .await;
        intent.status = IntentStatus::NeedsReview;
        intent.note = Some(note);
        report.flagged.push(intent);
    }
    info!(flagged = report.flagged.len(), "reconciliation finished");
    Ok(report)
}
