//! Append-only audit trail of automated actions.

use std::sync::Arc;

use tracing::warn;

use procura_purchasing::{DecisionRecord, NewDecision};

use crate::retry::{RetryPolicy, retry};
use crate::store::ProcurementStore;

/// Writes decision records on behalf of the pipeline stages.
///
/// Recording is best effort: a failed append is logged and swallowed, and never undoes
/// the state change it describes.
#[derive(Clone)]
pub struct DecisionLedger {
    store: Arc<dyn ProcurementStore>,
    retry: RetryPolicy,
}

impl DecisionLedger {
    pub fn new(store: Arc<dyn ProcurementStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub async fn record(&self, decision: NewDecision) -> Option<DecisionRecord> {
        let agent = decision.agent_name.clone();
        match retry(&self.retry, "append_decision", move || {
            self.store.append_decision(decision.clone())
        })
        .await
        {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(agent = %agent, error = %err, "decision not recorded");
                None
            }
        }
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<DecisionRecord>, crate::store::StoreError> {
        self.store.recent_decisions(limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryProcurementStore;
    use procura_purchasing::Agent;

    #[tokio::test]
    async fn records_are_returned_newest_first() {
        let store = Arc::new(InMemoryProcurementStore::new());
        let ledger = DecisionLedger::new(store.clone(), RetryPolicy::no_retry());

        ledger.record(NewDecision::new(Agent::Rfq, "first")).await.unwrap();
        let second = ledger
            .record(NewDecision::new(Agent::PoFinalization, "second").human_approved())
            .await
            .unwrap();
        assert!(second.human_approved);
        assert_eq!(second.agent_name, "Procurement Agent - PO Finalization");

        let recent = ledger.recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].summary, "second");
    }

    #[tokio::test]
    async fn store_failure_is_swallowed() {
        let store = Arc::new(InMemoryProcurementStore::new());
        store.set_unavailable(true);
        let ledger = DecisionLedger::new(store, RetryPolicy::no_retry());

        assert!(ledger.record(NewDecision::new(Agent::Rfq, "lost")).await.is_none());
    }
}
