//! Infrastructure layer: stores, transports, external clients, configuration, and the
//! procurement pipeline that ties them together.

pub mod config;
pub mod external;
pub mod ledger;
pub mod pipeline;
pub mod retry;
pub mod saga;
pub mod store;
pub mod transport;


pub use config::{Channels, ConfigError, ProcuraConfig};
pub use external::OllamaTextGenerator;
pub use ledger::DecisionLedger;
pub use pipeline::{CycleOrchestrator, CycleOutcome, CycleStatus, PipelineContext, PipelineSettings};
pub use retry::{Disposition, RetryPolicy, Transient};
pub use saga::{ReconcileReport, reconcile};
pub use store::{InMemoryProcurementStore, PostgresProcurementStore, ProcurementStore, StoreError};
pub use transport::{
    HttpRelayTransport, LogTransport, MessageTransport, OutboundMessage, RecordingTransport,
    TransportError,
};
