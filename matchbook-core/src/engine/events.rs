use crate::engine::types::{Address, CancelAgent, OrderID, OrderMetadata};
use crate::fixed_point::FixedPoint;

/// Emitted once when an order is accepted into the book.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct CreateEvent {
    pub order_id: OrderID,
    pub owner: Address,
    pub metadata: OrderMetadata,
}

/// Emitted twice per trade, once from each participant's perspective with
/// `order_id`/`opposite_order_id` swapped. `price` and `qty` record the
/// cleared price and executed quantity; the metadata fields are snapshots
/// taken after the fill was applied.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct ExecutionEvent {
    pub order_id: OrderID,
    pub owner: Address,
    pub metadata: OrderMetadata,
    pub opposite_order_id: OrderID,
    pub opposite_owner: Address,
    pub opposite_metadata: OrderMetadata,
    pub price: FixedPoint,
    pub qty: FixedPoint,
}

/// Emitted once when an order reaches a terminal status.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct FinalizeEvent {
    pub order_id: OrderID,
    pub owner: Address,
    pub metadata: OrderMetadata,
    pub cancel_agent: CancelAgent,
}

/// EventLog is the book's append-only event stream. Sinks drain it
/// externally; the engine only appends.
#[derive(Default, Debug)]
pub struct EventLog {
    creates: Vec<CreateEvent>,
    executions: Vec<ExecutionEvent>,
    finalizations: Vec<FinalizeEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        EventLog::default()
    }

    pub(crate) fn emit_create(&mut self, event: CreateEvent) {
        self.creates.push(event);
    }

    pub(crate) fn emit_execution(&mut self, event: ExecutionEvent) {
        self.executions.push(event);
    }

    pub(crate) fn emit_finalize(&mut self, event: FinalizeEvent) {
        self.finalizations.push(event);
    }

    pub fn creates(&self) -> &[CreateEvent] {
        &self.creates
    }

    pub fn executions(&self) -> &[ExecutionEvent] {
        &self.executions
    }

    pub fn finalizations(&self) -> &[FinalizeEvent] {
        &self.finalizations
    }
}
