use serde::{Deserialize, Serialize};
use uuid::Uuid;

use procura_core::CycleId;

/// Envelope for an event published during a procurement cycle.
///
/// `sequence_number` is monotonically increasing within one cycle, so subscribers can
/// restore publication order even when stages run concurrently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    cycle_id: CycleId,
    sequence_number: u64,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(cycle_id: CycleId, sequence_number: u64, payload: E) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            cycle_id,
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn cycle_id(&self) -> CycleId {
        self.cycle_id
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
