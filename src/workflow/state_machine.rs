use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::booking::{Booking, BookingId, BookingStatus, PaymentClass, PaymentDetail, UpiApp};
use crate::policy;

/// States of the reconciliation workflow for a single booking action.
///
/// `TargetSelected` and `DisambiguationResolved` are pass-through: selecting
/// a target advances automatically to the disambiguation or confirmation
/// gate, and choosing a UPI app advances straight to `ConfirmationPending`.
/// The intermediate states are still recorded so the audit trail shows each
/// decision point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconciliationState {
    Idle,
    TargetSelected {
        target: BookingStatus,
    },
    NeedsDisambiguation {
        target: BookingStatus,
    },
    DisambiguationResolved {
        target: BookingStatus,
        app: UpiApp,
    },
    ConfirmationPending {
        target: BookingStatus,
        detail: Option<PaymentDetail>,
    },
    Committing {
        target: BookingStatus,
        detail: Option<PaymentDetail>,
    },
    Committed {
        booking: Booking,
    },
    CommitFailed {
        message: String,
    },
}

impl ReconciliationState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Short name for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::TargetSelected { .. } => "TargetSelected",
            Self::NeedsDisambiguation { .. } => "NeedsDisambiguation",
            Self::DisambiguationResolved { .. } => "DisambiguationResolved",
            Self::ConfirmationPending { .. } => "ConfirmationPending",
            Self::Committing { .. } => "Committing",
            Self::Committed { .. } => "Committed",
            Self::CommitFailed { .. } => "CommitFailed",
        }
    }
}

/// Events that drive the reconciliation workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconciliationEvent {
    SelectTarget { target: BookingStatus },
    ChooseUpiApp { app: UpiApp },
    Confirm,
    CommitSucceeded { booking: Booking },
    CommitRejected { message: String },
    Cancel,
}

/// Errors raised by the reconciliation workflow.
///
/// Only `CommitFailed` is surfaced to end users; the gate errors are
/// recovered locally and `ConcurrentProposalIgnored` is logged only.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("target '{target}' is not reachable from '{from}' for payment method '{method}'")]
    InvalidTransition {
        from: BookingStatus,
        target: BookingStatus,
        method: String,
    },
    #[error("a UPI app must be selected before confirming")]
    MissingDisambiguation,
    #[error("status commit failed: {message}")]
    CommitFailed { message: String },
    #[error("booking {booking} already has a transition in flight")]
    ConcurrentProposalIgnored { booking: BookingId },
    #[error("event {event:?} not allowed in workflow state {state}")]
    UnexpectedEvent {
        state: &'static str,
        event: ReconciliationEvent,
    },
}

/// One recorded transition, kept for the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from_state: ReconciliationState,
    pub to_state: ReconciliationState,
    pub event: ReconciliationEvent,
    pub timestamp: DateTime<Utc>,
}

/// Per-booking reconciliation state machine.
///
/// Owns a snapshot of the booking taken at proposal time; the caller's copy
/// is never touched. All policy checks happen here so the machine cannot be
/// driven into a state the policy engine would reject.
#[derive(Debug, Clone)]
pub struct ReconciliationMachine {
    booking: Booking,
    state: ReconciliationState,
    history: Vec<TransitionRecord>,
}

impl ReconciliationMachine {
    pub fn new(booking: Booking) -> Self {
        Self {
            booking,
            state: ReconciliationState::Idle,
            history: Vec::new(),
        }
    }

    pub fn booking(&self) -> &Booking {
        &self.booking
    }

    pub fn state(&self) -> &ReconciliationState {
        &self.state
    }

    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    /// The target status carried by the current state, if one is selected.
    pub fn pending_target(&self) -> Option<BookingStatus> {
        match &self.state {
            ReconciliationState::TargetSelected { target }
            | ReconciliationState::NeedsDisambiguation { target }
            | ReconciliationState::DisambiguationResolved { target, .. }
            | ReconciliationState::ConfirmationPending { target, .. }
            | ReconciliationState::Committing { target, .. } => Some(*target),
            _ => None,
        }
    }

    /// The payment detail that will be written by the commit, if resolved.
    pub fn pending_detail(&self) -> Option<&PaymentDetail> {
        match &self.state {
            ReconciliationState::ConfirmationPending { detail, .. }
            | ReconciliationState::Committing { detail, .. } => detail.as_ref(),
            _ => None,
        }
    }

    fn record_transition(&mut self, to: ReconciliationState, event: ReconciliationEvent) {
        let record = TransitionRecord {
            from_state: self.state.clone(),
            to_state: to.clone(),
            event,
            timestamp: Utc::now(),
        };

        info!(
            booking = %self.booking.id,
            from_state = record.from_state.name(),
            to_state = record.to_state.name(),
            event = ?record.event,
            "Reconciliation state transition"
        );

        self.history.push(record);
        self.state = to;
    }

    /// Handle a workflow event — main state transition logic.
    ///
    /// Pass-through states mean some events produce two recorded hops; the
    /// match computes the hop sequence and the recording happens after it.
    pub fn handle_event(&mut self, event: ReconciliationEvent) -> Result<(), WorkflowError> {
        let steps: Vec<ReconciliationState> = match (&self.state, &event) {
            (ReconciliationState::Idle, ReconciliationEvent::SelectTarget { target }) => {
                // Re-validate against the policy at selection time; the
                // offered set in the UI may be stale.
                let allowed = policy::allowed_targets_for(&self.booking);
                if !allowed.contains(target) {
                    warn!(
                        booking = %self.booking.id,
                        from = %self.booking.status,
                        target = %target,
                        "Rejected stale or illegal transition target"
                    );
                    return Err(WorkflowError::InvalidTransition {
                        from: self.booking.status,
                        target: *target,
                        method: self.booking.payment_method.to_string(),
                    });
                }

                // Selection advances automatically: either the payment
                // channel must be pinned down first, or we go straight to
                // the confirmation gate.
                let target = *target;
                let gate = if requires_disambiguation(&self.booking, target) {
                    ReconciliationState::NeedsDisambiguation { target }
                } else {
                    ReconciliationState::ConfirmationPending {
                        target,
                        detail: None,
                    }
                };
                vec![ReconciliationState::TargetSelected { target }, gate]
            }

            (
                ReconciliationState::NeedsDisambiguation { target },
                ReconciliationEvent::ChooseUpiApp { app },
            ) => {
                // Resolution advances automatically, carrying the chosen
                // sub-channel forward as the pending payment detail.
                let target = *target;
                let app = *app;
                let detail = PaymentDetail::with_upi(self.booking.payment_method.clone(), app);
                vec![
                    ReconciliationState::DisambiguationResolved { target, app },
                    ReconciliationState::ConfirmationPending {
                        target,
                        detail: Some(detail),
                    },
                ]
            }

            (ReconciliationState::NeedsDisambiguation { .. }, ReconciliationEvent::Confirm) => {
                debug!(
                    booking = %self.booking.id,
                    "Confirm attempted before a UPI app was selected"
                );
                return Err(WorkflowError::MissingDisambiguation);
            }

            (
                ReconciliationState::ConfirmationPending { target, detail },
                ReconciliationEvent::Confirm,
            ) => vec![ReconciliationState::Committing {
                target: *target,
                detail: detail.clone(),
            }],

            (
                ReconciliationState::Committing { .. },
                ReconciliationEvent::CommitSucceeded { booking },
            ) => vec![ReconciliationState::Committed {
                booking: booking.clone(),
            }],

            (
                ReconciliationState::Committing { .. },
                ReconciliationEvent::CommitRejected { message },
            ) => vec![ReconciliationState::CommitFailed {
                message: message.clone(),
            }],

            // The user may abort at any gate before the commit begins.
            (
                ReconciliationState::TargetSelected { .. }
                | ReconciliationState::NeedsDisambiguation { .. }
                | ReconciliationState::DisambiguationResolved { .. }
                | ReconciliationState::ConfirmationPending { .. },
                ReconciliationEvent::Cancel,
            ) => vec![ReconciliationState::Idle],

            (ReconciliationState::Idle, ReconciliationEvent::Cancel) => Vec::new(),

            (state, _) => {
                return Err(WorkflowError::UnexpectedEvent {
                    state: state.name(),
                    event: event.clone(),
                });
            }
        };

        for to in steps {
            self.record_transition(to, event.clone());
        }
        Ok(())
    }
}

/// True iff marking this booking paid needs the real-world payment channel
/// recorded first: cash-class money arriving while the booking is still
/// unpaid may actually have come in through a UPI app.
pub fn requires_disambiguation(booking: &Booking, target: BookingStatus) -> bool {
    target == BookingStatus::Paid
        && matches!(
            booking.status,
            BookingStatus::Pending | BookingStatus::Waiting
        )
        && booking.payment_method.class() == PaymentClass::Cash
}
