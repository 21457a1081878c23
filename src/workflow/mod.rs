// Reconciliation Workflow Module
//
// The state machine is pure transition logic over a booking snapshot; the
// controller layers the reentrancy guard and the single remote commit on
// top of it.

pub mod controller;
pub mod state_machine;

pub use controller::{ReconciliationController, WorkflowHandle};
pub use state_machine::{
    requires_disambiguation, ReconciliationEvent, ReconciliationMachine, ReconciliationState,
    TransitionRecord, WorkflowError,
};
