// front-desk Library - Appointment Status & Payment Reconciliation
// This exposes the core components for testing and integration

pub mod booking;
pub mod config;
pub mod policy;
pub mod remote;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use booking::{
    Booking, BookingId, BookingStatus, PaymentClass, PaymentDetail, PaymentMethod, UpiApp,
};
pub use config::FrontDeskConfig;
pub use policy::{allowed_targets, allowed_targets_for, is_locked};
pub use remote::{CommitError, CommitReceipt, HttpStatusCommitter, StatusCommitter};
pub use telemetry::{generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use workflow::{
    ReconciliationController, ReconciliationEvent, ReconciliationMachine, ReconciliationState,
    WorkflowError, WorkflowHandle,
};
