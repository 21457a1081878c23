// Transition Policy Engine
//
// Pure decision logic: which statuses a booking may legally move to next,
// keyed on its current status and the class of its payment channel. No I/O,
// no side effects; the workflow controller re-validates against this at
// proposal time so stale UI state can never smuggle in an illegal target.

use std::collections::BTreeSet;

use crate::booking::{Booking, BookingStatus, PaymentClass, PaymentMethod};

/// Compute the set of statuses `current` may transition to for a booking
/// paid through `method`.
///
/// Electronic channels have money captured up front, so a paid booking can
/// only be refunded and an unpaid one can only be marked paid. Cash-class
/// channels lag the real-world event, so manual cancellation stays available
/// on both sides of `Paid`. Terminal statuses yield the empty set: the
/// booking is locked and callers disable the action instead of invoking the
/// workflow.
pub fn allowed_targets(current: BookingStatus, method: &PaymentMethod) -> BTreeSet<BookingStatus> {
    use BookingStatus::*;

    let mut targets = BTreeSet::new();
    match (current, method.class()) {
        (Cancelled | Refunded, _) => {}
        (Paid, PaymentClass::Electronic) => {
            targets.insert(Refunded);
        }
        (Paid, PaymentClass::Cash) => {
            targets.insert(Refunded);
            targets.insert(Cancelled);
        }
        (Pending | Waiting, PaymentClass::Electronic) => {
            targets.insert(Paid);
        }
        (Pending | Waiting, PaymentClass::Cash) => {
            targets.insert(Paid);
            targets.insert(Cancelled);
        }
    }
    // A no-op transition is never offered.
    targets.remove(&current);
    targets
}

/// Allowed targets for a booking value (convenience over [`allowed_targets`]).
pub fn allowed_targets_for(booking: &Booking) -> BTreeSet<BookingStatus> {
    allowed_targets(booking.status, &booking.payment_method)
}

/// True when no status change is currently legal for the booking.
pub fn is_locked(booking: &Booking) -> bool {
    allowed_targets_for(booking).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::Waiting,
        BookingStatus::Paid,
        BookingStatus::Cancelled,
        BookingStatus::Refunded,
    ];

    #[test]
    fn never_offers_the_current_status() {
        for status in ALL_STATUSES {
            for method in ["razorpay", "phonepe", "payu", "upi", "cash", "coh", "cod", "stripe"] {
                let targets = allowed_targets(status, &PaymentMethod::from(method));
                assert!(
                    !targets.contains(&status),
                    "{status:?}/{method} offered a no-op transition"
                );
            }
        }
    }

    #[test]
    fn electronic_paid_can_only_be_refunded() {
        let targets = allowed_targets(BookingStatus::Paid, &PaymentMethod::from("razorpay"));
        assert_eq!(targets.into_iter().collect::<Vec<_>>(), vec![BookingStatus::Refunded]);
    }

    #[test]
    fn cash_pending_offers_paid_and_cancelled() {
        let targets = allowed_targets(BookingStatus::Pending, &PaymentMethod::from("cash"));
        assert!(targets.contains(&BookingStatus::Paid));
        assert!(targets.contains(&BookingStatus::Cancelled));
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn cash_paid_offers_refund_and_cancel() {
        let targets = allowed_targets(BookingStatus::Paid, &PaymentMethod::from("cod"));
        assert!(targets.contains(&BookingStatus::Refunded));
        assert!(targets.contains(&BookingStatus::Cancelled));
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn waiting_behaves_like_pending() {
        for method in ["razorpay", "cash"] {
            let method = PaymentMethod::from(method);
            assert_eq!(
                allowed_targets(BookingStatus::Pending, &method),
                allowed_targets(BookingStatus::Waiting, &method),
            );
        }
    }

    #[test]
    fn terminal_statuses_are_locked() {
        for status in [BookingStatus::Cancelled, BookingStatus::Refunded] {
            for method in ["razorpay", "cash"] {
                assert!(allowed_targets(status, &PaymentMethod::from(method)).is_empty());
            }
        }
    }

    #[test]
    fn is_locked_mirrors_the_empty_target_set() {
        assert!(is_locked(&Booking::new("bk-1", BookingStatus::Refunded, "cash")));
        assert!(is_locked(&Booking::new("bk-2", BookingStatus::Cancelled, "razorpay")));
        assert!(!is_locked(&Booking::new("bk-3", BookingStatus::Pending, "cash")));
    }

    #[test]
    fn unknown_gateway_falls_back_to_electronic_rules() {
        let targets = allowed_targets(BookingStatus::Waiting, &PaymentMethod::from("somepay"));
        assert_eq!(targets.into_iter().collect::<Vec<_>>(), vec![BookingStatus::Paid]);
    }

    #[test]
    fn paid_and_refunded_are_never_offered_together() {
        for status in ALL_STATUSES {
            for method in ["razorpay", "cash", "coh", "upi"] {
                let targets = allowed_targets(status, &PaymentMethod::from(method));
                assert!(
                    !(targets.contains(&BookingStatus::Paid)
                        && targets.contains(&BookingStatus::Refunded)),
                    "{status:?}/{method} offered Paid and Refunded simultaneously"
                );
            }
        }
    }
}
