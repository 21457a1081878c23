// Mock commit collaborators for testing - no side effects

use std::sync::Mutex;

use async_trait::async_trait;

use crate::booking::{BookingId, BookingStatus, PaymentDetail};
use crate::remote::{CommitError, CommitReceipt, StatusCommitter};

/// One recorded commit call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommit {
    pub booking: BookingId,
    pub new_status: BookingStatus,
    pub detail: Option<String>,
}

/// Recording committer: echoes the requested status back as the receipt,
/// optionally failing scripted calls first.
///
/// Interior mutability is behind `Mutex` rather than `RefCell` because the
/// committer trait is `Send + Sync`.
#[derive(Debug, Default)]
pub struct MockStatusCommitter {
    calls: Mutex<Vec<RecordedCommit>>,
    fail_messages: Mutex<Vec<String>>,
}

impl MockStatusCommitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next commit call to fail with an API rejection.
    pub fn fail_next(&self, message: &str) {
        self.fail_messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.to_string());
    }

    pub fn calls(&self) -> Vec<RecordedCommit> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl StatusCommitter for MockStatusCommitter {
    async fn commit_status(
        &self,
        booking: &BookingId,
        new_status: BookingStatus,
        detail: Option<&PaymentDetail>,
    ) -> Result<CommitReceipt, CommitError> {
        let detail = detail.map(PaymentDetail::to_legacy_string);
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCommit {
                booking: booking.clone(),
                new_status,
                detail: detail.clone(),
            });

        let scripted_failure = self
            .fail_messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop();
        if let Some(message) = scripted_failure {
            return Err(CommitError::Api {
                status: 500,
                message,
            });
        }

        Ok(CommitReceipt {
            new_status,
            payment_method_detail: detail,
        })
    }
}
