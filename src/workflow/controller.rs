// Reconciliation Workflow Controller
//
// Drives the propose -> disambiguate -> confirm -> commit sequence for one
// booking at a time. Either the remote commit succeeds and the caller gets
// the authoritative new snapshot, or it fails and no local state changes.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info};

use crate::booking::{Booking, BookingId, BookingStatus, PaymentDetail, UpiApp};
use crate::policy;
use crate::remote::StatusCommitter;
use crate::workflow::state_machine::{
    ReconciliationEvent, ReconciliationMachine, ReconciliationState, WorkflowError,
};

/// Orchestrates reconciliation workflows across bookings.
///
/// Workflows for different bookings are independent; the in-flight set
/// guarantees at most one live workflow per booking id, so a double-click in
/// the UI can never produce two commit calls for the same booking.
pub struct ReconciliationController<C: StatusCommitter> {
    committer: Arc<C>,
    in_flight: Arc<Mutex<HashSet<BookingId>>>,
}

impl<C: StatusCommitter> ReconciliationController<C> {
    pub fn new(committer: Arc<C>) -> Self {
        Self {
            committer,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// The statuses this booking may be moved to right now. Empty means the
    /// booking is locked and the action should be disabled, not invoked.
    pub fn allowed_targets(&self, booking: &Booking) -> Vec<BookingStatus> {
        policy::allowed_targets_for(booking).into_iter().collect()
    }

    /// Start a workflow: validate the target and reserve the booking id.
    ///
    /// The target is re-checked against the policy engine here rather than
    /// trusted from whatever set the UI rendered. A second proposal for a
    /// booking already mid-workflow is ignored, not queued.
    pub fn propose(
        &self,
        booking: &Booking,
        target: BookingStatus,
    ) -> Result<WorkflowHandle<C>, WorkflowError> {
        // Membership test and reservation happen under one lock acquisition;
        // insert's return value is the test. Two racing proposals cannot both
        // see the id as free.
        let reserved = self
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(booking.id.clone());
        if !reserved {
            debug!(
                booking = %booking.id,
                target = %target,
                "Ignoring proposal: booking already has a transition in flight"
            );
            return Err(WorkflowError::ConcurrentProposalIgnored {
                booking: booking.id.clone(),
            });
        }

        let mut machine = ReconciliationMachine::new(booking.clone());
        if let Err(e) = machine.handle_event(ReconciliationEvent::SelectTarget { target }) {
            // A rejected proposal must not leave the booking reserved.
            self.in_flight
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&booking.id);
            return Err(e);
        }

        Ok(WorkflowHandle {
            machine,
            committer: Arc::clone(&self.committer),
            in_flight: Arc::clone(&self.in_flight),
            released: false,
        })
    }
}

/// A live workflow for one booking, handed to the caller to drive through
/// the remaining gates. Dropping the handle (or cancelling) releases the
/// booking with no side effects; only [`WorkflowHandle::confirm`] talks to
/// the remote collaborator, and it does so exactly once.
#[derive(Debug)]
pub struct WorkflowHandle<C: StatusCommitter> {
    machine: ReconciliationMachine,
    committer: Arc<C>,
    in_flight: Arc<Mutex<HashSet<BookingId>>>,
    released: bool,
}

impl<C: StatusCommitter> WorkflowHandle<C> {
    pub fn booking(&self) -> &Booking {
        self.machine.booking()
    }

    pub fn state(&self) -> &ReconciliationState {
        self.machine.state()
    }

    /// True while the workflow is waiting for the real-world payment channel
    /// to be recorded.
    pub fn needs_disambiguation(&self) -> bool {
        matches!(
            self.machine.state(),
            ReconciliationState::NeedsDisambiguation { .. }
        )
    }

    /// Record which UPI app the customer actually paid through.
    pub fn choose_upi_app(&mut self, app: UpiApp) -> Result<(), WorkflowError> {
        self.machine
            .handle_event(ReconciliationEvent::ChooseUpiApp { app })
    }

    /// The payment detail the commit will write, once disambiguation is
    /// resolved.
    pub fn pending_detail(&self) -> Option<&PaymentDetail> {
        self.machine.pending_detail()
    }

    /// The "are you sure" text shown before the commit. Always names the
    /// booking, both statuses in human-readable form, and the payment detail
    /// annotation when one will be written.
    pub fn confirmation_prompt(&self) -> String {
        let booking = self.machine.booking();
        let target = self
            .machine
            .pending_target()
            .map(|t| t.label())
            .unwrap_or("?");
        let mut prompt = format!(
            "Change booking {} from {} to {}?",
            booking.id,
            booking.status.label(),
            target,
        );
        if let Some(detail) = self.machine.pending_detail() {
            prompt.push_str(&format!(
                " Payment will be recorded as {}.",
                detail.to_legacy_string()
            ));
        }
        prompt
    }

    /// Confirm and commit. The single suspension point of the workflow: the
    /// remote call runs to completion and is not user-cancellable.
    ///
    /// On success the returned snapshot carries the authoritative status and
    /// detail; the caller merges it into its own state. On failure nothing
    /// is mutated and the booking held by this handle keeps its prior
    /// status. A [`WorkflowError::MissingDisambiguation`] rejection leaves
    /// the handle live so the caller can re-prompt.
    pub async fn confirm(&mut self) -> Result<Booking, WorkflowError> {
        self.machine.handle_event(ReconciliationEvent::Confirm)?;

        let booking = self.machine.booking().clone();
        let target = match self.machine.pending_target() {
            Some(target) => target,
            None => {
                // Unreachable once Confirm succeeded; guard anyway.
                return Err(WorkflowError::CommitFailed {
                    message: "no pending target after confirmation".to_string(),
                });
            }
        };
        let detail = self.machine.pending_detail().cloned();

        info!(
            booking = %booking.id,
            from = %booking.status,
            target = %target,
            detail = ?detail.as_ref().map(|d| d.to_legacy_string()),
            "Committing status transition"
        );

        let outcome = self
            .committer
            .commit_status(&booking.id, target, detail.as_ref())
            .await;

        match outcome {
            Ok(receipt) => {
                let mut updated = booking;
                updated.status = receipt.new_status;
                // A detail already on the booking was written by an earlier
                // commit and stays; a commit that records no detail must not
                // blank it out.
                if let Some(new_detail) = receipt
                    .payment_method_detail
                    .as_deref()
                    .and_then(PaymentDetail::from_legacy_str)
                    .or(detail)
                {
                    updated.payment_method_detail = Some(new_detail);
                }

                self.machine
                    .handle_event(ReconciliationEvent::CommitSucceeded {
                        booking: updated.clone(),
                    })?;
                self.release();

                info!(
                    booking = %updated.id,
                    status = %updated.status,
                    "Status transition committed"
                );
                Ok(updated)
            }
            Err(e) => {
                let message = e.to_string();
                error!(
                    booking = %booking.id,
                    target = %target,
                    error = %message,
                    "Status commit failed; local state unchanged"
                );
                self.machine
                    .handle_event(ReconciliationEvent::CommitRejected {
                        message: message.clone(),
                    })?;
                self.release();
                Err(WorkflowError::CommitFailed { message })
            }
        }
    }

    /// Abort the workflow with no side effects.
    pub fn cancel(mut self) {
        // Ignore gate errors on the way out; cancellation always succeeds.
        let _ = self.machine.handle_event(ReconciliationEvent::Cancel);
        self.release();
        debug!(booking = %self.machine.booking().id, "Workflow cancelled");
    }

    fn release(&mut self) {
        if !self.released {
            self.in_flight
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&self.machine.booking().id);
            self.released = true;
        }
    }
}

impl<C: StatusCommitter> Drop for WorkflowHandle<C> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::mocks::MockStatusCommitter;

    fn controller() -> ReconciliationController<MockStatusCommitter> {
        ReconciliationController::new(Arc::new(MockStatusCommitter::new()))
    }

    #[test]
    fn allowed_targets_wraps_policy() {
        let ctrl = controller();
        let booking = Booking::new("bk-1", BookingStatus::Pending, "cash");
        let targets = ctrl.allowed_targets(&booking);
        assert_eq!(targets, vec![BookingStatus::Paid, BookingStatus::Cancelled]);
    }

    #[test]
    fn second_proposal_for_same_booking_is_ignored() {
        let ctrl = controller();
        let booking = Booking::new("bk-1", BookingStatus::Pending, "cash");

        let first = ctrl.propose(&booking, BookingStatus::Paid).unwrap();
        let second = ctrl.propose(&booking, BookingStatus::Cancelled);
        assert!(matches!(
            second,
            Err(WorkflowError::ConcurrentProposalIgnored { .. })
        ));
        drop(first);

        // Released on drop: a fresh proposal goes through again.
        assert!(ctrl.propose(&booking, BookingStatus::Cancelled).is_ok());
    }

    #[test]
    fn racing_proposals_admit_exactly_one_workflow() {
        use std::sync::Barrier;
        use std::thread;

        let ctrl = Arc::new(controller());
        let booking = Booking::new("bk-race", BookingStatus::Pending, "cash");

        for _ in 0..1_000 {
            let barrier = Arc::new(Barrier::new(2));
            let threads: Vec<_> = (0..2)
                .map(|_| {
                    let ctrl = Arc::clone(&ctrl);
                    let booking = booking.clone();
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        ctrl.propose(&booking, BookingStatus::Paid)
                    })
                })
                .collect();

            // Hold every accepted handle until both threads have joined so a
            // double acceptance cannot hide behind an early release.
            let results: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();
            let accepted = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(accepted, 1, "both concurrent proposals were accepted");
        }
    }

    #[test]
    fn proposals_for_different_bookings_are_independent() {
        let ctrl = controller();
        let a = Booking::new("bk-a", BookingStatus::Pending, "cash");
        let b = Booking::new("bk-b", BookingStatus::Pending, "cash");

        let _first = ctrl.propose(&a, BookingStatus::Paid).unwrap();
        assert!(ctrl.propose(&b, BookingStatus::Paid).is_ok());
    }

    #[test]
    fn cancel_releases_the_booking_without_commit_calls() {
        let committer = Arc::new(MockStatusCommitter::new());
        let ctrl = ReconciliationController::new(Arc::clone(&committer));
        let booking = Booking::new("bk-1", BookingStatus::Pending, "cash");

        let handle = ctrl.propose(&booking, BookingStatus::Paid).unwrap();
        handle.cancel();

        assert!(committer.calls().is_empty());
        assert!(ctrl.propose(&booking, BookingStatus::Paid).is_ok());
    }

    #[test]
    fn invalid_target_never_reserves_the_booking() {
        let ctrl = controller();
        let booking = Booking::new("bk-1", BookingStatus::Refunded, "cash");

        let err = ctrl.propose(&booking, BookingStatus::Paid).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));

        // The failed proposal must not leave a stale in-flight entry.
        let pending = Booking::new("bk-1", BookingStatus::Pending, "cash");
        assert!(ctrl.propose(&pending, BookingStatus::Paid).is_ok());
    }

    #[test]
    fn confirmation_prompt_names_booking_and_statuses() {
        let ctrl = controller();
        let booking = Booking::new("bk-42", BookingStatus::Waiting, "coh");

        let mut handle = ctrl.propose(&booking, BookingStatus::Paid).unwrap();
        handle.choose_upi_app(UpiApp::Phonepe).unwrap();

        let prompt = handle.confirmation_prompt();
        assert!(prompt.contains("bk-42"));
        assert!(prompt.contains("Waiting"));
        assert!(prompt.contains("Paid"));
        assert!(prompt.contains("coh{upi:phonepe}"));
    }
}
