//! Audit trail entries for automated decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procura_core::{DecisionId, ValueObject};

/// Confidence score, always within `[0, 1]`.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Confidence(f64);

impl ValueObject for Confidence {}

impl Confidence {
    pub const CERTAIN: Confidence = Confidence(1.0);

    /// Clamps into `[0, 1]`; NaN becomes 0.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

/// The automated actors that write to the ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Agent {
    Rfq,
    QuoteAnalysis,
    Approval,
    PoFinalization,
    LogisticsHandoff,
    ApprovalDecision,
    ShipmentTracking,
    Reconciliation,
}

impl Agent {
    pub fn name(self) -> &'static str {
        match self {
            Agent::Rfq => "Procurement Agent - RFQ",
            Agent::QuoteAnalysis => "Procurement Agent - Quote Analysis",
            Agent::Approval => "Procurement Agent - Approval",
            Agent::PoFinalization => "Procurement Agent - PO Finalization",
            Agent::LogisticsHandoff => "Procurement Agent - Logistics Handoff",
            Agent::ApprovalDecision => "Procurement Agent - Approval Decision",
            Agent::ShipmentTracking => "Procurement Agent - Shipment Tracking",
            Agent::Reconciliation => "Procurement Agent - Reconciliation",
        }
    }

    pub fn confidence(self) -> Confidence {
        match self {
            Agent::Rfq => Confidence::new(0.90),
            Agent::QuoteAnalysis => Confidence::new(0.92),
            Agent::Approval => Confidence::new(0.95),
            Agent::PoFinalization => Confidence::new(0.98),
            Agent::LogisticsHandoff => Confidence::new(0.97),
            Agent::ApprovalDecision | Agent::ShipmentTracking | Agent::Reconciliation => {
                Confidence::CERTAIN
            }
        }
    }
}

/// A persisted ledger row (`ai_decision_log`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: DecisionId,
    pub agent_name: String,
    pub summary: String,
    pub confidence: Confidence,
    pub human_approved: bool,
    pub created_at: DateTime<Utc>,
}

/// A ledger entry about to be appended; the store stamps the time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDecision {
    pub agent_name: String,
    pub summary: String,
    pub confidence: Confidence,
    pub human_approved: bool,
}

impl NewDecision {
    pub fn new(agent: Agent, summary: impl Into<String>) -> Self {
        Self {
            agent_name: agent.name().to_string(),
            summary: summary.into(),
            confidence: agent.confidence(),
            human_approved: false,
        }
    }

    pub fn human_approved(mut self) -> Self {
        self.human_approved = true;
        self
    }
}
