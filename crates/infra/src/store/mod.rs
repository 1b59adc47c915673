//! Procurement persistence: the store boundary plus in-memory and Postgres adapters.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryProcurementStore;
pub use postgres::PostgresProcurementStore;
pub use r#trait::{ProcurementStore, StoreError, StoreResult};
