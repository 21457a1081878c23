// Remote Status Commit Collaborator
//
// The durable status write lives behind this trait so the workflow can be
// tested without a network and so transports can be swapped. The controller
// never retries; a timeout is just another failed commit.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::booking::{BookingId, BookingStatus, PaymentDetail};

pub mod http;

#[cfg(test)]
pub mod mocks;

pub use http::HttpStatusCommitter;

/// What the remote service reports back for a successful commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitReceipt {
    #[serde(rename = "status")]
    pub new_status: BookingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method_detail: Option<String>,
}

/// Errors reported by the commit collaborator. `Display` output is shown to
/// end users verbatim, so every variant carries a human-readable message.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("status update rejected (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("network error while committing status: {0}")]
    Network(String),
    #[error("{operation} timed out after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },
    #[error("unexpected response from status endpoint: {0}")]
    InvalidResponse(String),
}

/// The external collaborator that performs the durable status update.
///
/// Implementations must be safe for the caller to retry (the workflow
/// itself never does) and must distinguish failure from success with a
/// human-readable message.
#[async_trait]
pub trait StatusCommitter: Send + Sync {
    async fn commit_status(
        &self,
        booking: &BookingId,
        new_status: BookingStatus,
        detail: Option<&PaymentDetail>,
    ) -> Result<CommitReceipt, CommitError>;
}
