//! Persisted send-then-persist intents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use procura_core::{DomainError, IntentId, StateMachine};

/// The side-effecting step an intent guards.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    RfqDispatch,
    ApprovalRequest,
    PurchaseOrderIssue,
    LogisticsHandoff,
}

impl IntentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IntentKind::RfqDispatch => "rfq_dispatch",
            IntentKind::ApprovalRequest => "approval_request",
            IntentKind::PurchaseOrderIssue => "purchase_order_issue",
            IntentKind::LogisticsHandoff => "logistics_handoff",
        }
    }
}

impl core::fmt::Display for IntentKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for IntentKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            IntentKind::RfqDispatch,
            IntentKind::ApprovalRequest,
            IntentKind::PurchaseOrderIssue,
            IntentKind::LogisticsHandoff,
        ]
        .into_iter()
        .find(|k| k.as_str() == s.trim())
        .ok_or_else(|| DomainError::validation(format!("unknown intent kind '{s}'")))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentStatus {
    Attempting,
    Completed,
    Failed,
    NeedsReview,
}

impl StateMachine for IntentStatus {
    const ENTITY: &'static str = "saga_intent";
    const STATES: &'static [Self] = &[
        IntentStatus::Attempting,
        IntentStatus::Completed,
        IntentStatus::Failed,
        IntentStatus::NeedsReview,
    ];

    fn as_str(self) -> &'static str {
        match self {
            IntentStatus::Attempting => "ATTEMPTING",
            IntentStatus::Completed => "COMPLETED",
            IntentStatus::Failed => "FAILED",
            IntentStatus::NeedsReview => "NEEDS_REVIEW",
        }
    }

    fn can_transition_to(self, next: Self) -> bool {
        self == IntentStatus::Attempting && next != IntentStatus::Attempting
    }
}

impl core::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted intent.
///
/// `legs` lists the side effects already performed (e.g. `vendor`, `finance`), so a
/// retry can skip them. `payload` carries whatever the retry must reuse verbatim
/// (document numbers, amounts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaIntent {
    pub id: IntentId,
    pub kind: IntentKind,
    pub key: String,
    pub legs: Vec<String>,
    pub payload: JsonValue,
    pub status: IntentStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SagaIntent {
    pub fn has_leg(&self, leg: &str) -> bool {
        self.legs.iter().any(|l| l == leg)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewIntent {
    pub kind: IntentKind,
    pub key: String,
    pub legs: Vec<String>,
    pub payload: JsonValue,
}

impl NewIntent {
    pub fn new(kind: IntentKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
            legs: Vec::new(),
            payload: JsonValue::Null,
        }
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_legs(mut self, legs: Vec<String>) -> Self {
        self.legs = legs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempting_is_the_only_open_state() {
        assert!(IntentStatus::Attempting.transition(IntentStatus::NeedsReview).is_ok());
        assert!(IntentStatus::Completed.is_terminal());
        assert!(IntentStatus::Failed.is_terminal());
        assert!(IntentStatus::Attempting.transition(IntentStatus::Attempting).is_err());
    }

    #[test]
    fn kind_parses_its_own_text() {
        for kind in [IntentKind::RfqDispatch, IntentKind::PurchaseOrderIssue] {
            assert_eq!(kind.as_str().parse::<IntentKind>().unwrap(), kind);
        }
        assert!("nope".parse::<IntentKind>().is_err());
    }
}
