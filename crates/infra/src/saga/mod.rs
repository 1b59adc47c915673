//! Saga intents: a persisted record written before each external side effect and
//! closed once its outcome is persisted.

pub mod intent;
pub mod reconcile;

pub use intent::{IntentKind, IntentStatus, NewIntent, SagaIntent};
pub use reconcile::{ReconcileReport, reconcile};
