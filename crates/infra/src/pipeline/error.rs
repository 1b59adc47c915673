use serde::{Deserialize, Serialize};
use thiserror::Error;

use procura_ai::AiError;
use procura_core::DomainError;

use crate::retry::{Disposition, Transient};
use crate::store::StoreError;
use crate::transport::TransportError;

/// Pipeline step a failure belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    RequirementIntake,
    Dispatch,
    QuoteIntake,
    Ranking,
    Approval,
    PurchaseOrder,
    Logistics,
}

/// Any collaborator failure a stage can run into.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StageError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Text(#[from] AiError),
}

impl From<DomainError> for StageError {
    fn from(err: DomainError) -> Self {
        StageError::Store(err.into())
    }
}

impl Transient for StageError {
    fn is_transient(&self) -> bool {
        match self {
            StageError::Store(e) => e.is_transient(),
            StageError::Transport(e) => e.is_transient(),
            StageError::Text(e) => e.is_transient(),
        }
    }
}

/// One unit of work that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFailure {
    pub stage: Stage,
    /// e.g. `item:3/vendor:7`, `rfq:12`, `quote:40`.
    pub unit: String,
    pub error: String,
    pub disposition: Disposition,
}

impl UnitFailure {
    pub fn new(stage: Stage, unit: impl Into<String>, err: &StageError) -> Self {
        Self {
            stage,
            unit: unit.into(),
            error: err.to_string(),
            disposition: Disposition::for_error(err),
        }
    }

    /// The outcome of a side effect is uncertain; only an operator can resolve it.
    pub fn needs_manual_intervention(mut self) -> Self {
        self.disposition = Disposition::ManualIntervention;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_follows_transience() {
        let outage = UnitFailure::new(
            Stage::Dispatch,
            "item:1/vendor:2",
            &TransportError::Unavailable("smtp down".into()).into(),
        );
        assert_eq!(outage.disposition, Disposition::RetryNextCycle);

        let rejected = UnitFailure::new(
            Stage::Dispatch,
            "item:1/vendor:2",
            &TransportError::Rejected {
                to: "v@example.com".into(),
                reason: "no such mailbox".into(),
            }
            .into(),
        );
        assert_eq!(rejected.disposition, Disposition::ManualIntervention);
        assert_eq!(
            outage.needs_manual_intervention().disposition,
            Disposition::ManualIntervention
        );
    }
}
