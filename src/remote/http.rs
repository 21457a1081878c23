use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use serde::Serialize;
use tracing::debug;

use crate::booking::{BookingId, BookingStatus, PaymentDetail};
use crate::config::ApiConfig;
use crate::remote::{CommitError, CommitReceipt, StatusCommitter};

/// Rate-limited HTTP commit client for the dashboard API.
///
/// Write-only by design: status commits are never cached and never retried
/// here. The quota keeps a burst of row actions from one operator within
/// what the backend tolerates.
#[derive(Debug)]
pub struct HttpStatusCommitter {
    client: reqwest::Client,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct CommitRequest<'a> {
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    payment_method_detail: Option<String>,
}

impl HttpStatusCommitter {
    pub fn new(config: &ApiConfig) -> Result<Self, CommitError> {
        let per_second = NonZeroU32::new(config.rate_limit.requests_per_second.max(1))
            .unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.rate_limit.burst_capacity.max(1))
            .unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(per_second).allow_burst(burst);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        let timeout = Duration::from_secs(config.timeout_seconds);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CommitError::Network(e.to_string()))?;

        Ok(Self {
            client,
            rate_limiter,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            timeout,
        })
    }

    fn commit_url(&self, booking: &BookingId) -> String {
        format!("{}/bookings/{}/status", self.base_url, booking)
    }

    fn map_transport_error(&self, e: reqwest::Error) -> CommitError {
        if e.is_timeout() {
            CommitError::Timeout {
                operation: "status commit".to_string(),
                duration_ms: self.timeout.as_millis() as u64,
            }
        } else {
            CommitError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl StatusCommitter for HttpStatusCommitter {
    async fn commit_status(
        &self,
        booking: &BookingId,
        new_status: BookingStatus,
        detail: Option<&PaymentDetail>,
    ) -> Result<CommitReceipt, CommitError> {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
            .await;

        let body = CommitRequest {
            status: new_status.as_wire_str(),
            payment_method_detail: detail.map(PaymentDetail::to_legacy_string),
        };

        debug!(
            booking = %booking,
            status = body.status,
            "Issuing status commit request"
        );

        let mut request = self.client.post(self.commit_url(booking)).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let message = if message.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request rejected")
                    .to_string()
            } else {
                message
            };
            return Err(CommitError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<CommitReceipt>()
            .await
            .map_err(|e| CommitError::InvalidResponse(e.to_string()))
    }
}
