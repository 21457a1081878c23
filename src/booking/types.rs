// Core types for the reconciliation domain

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Opaque stable booking identifier assigned by the scheduling service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(String);

impl BookingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BookingId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Canonical booking status.
///
/// The legacy API round-trips short wire strings (`cancel`, `refund`) and a
/// handful of free-text synonyms; those are absorbed by [`BookingStatus::from_wire`]
/// and never leak past this type. `Pending` and `Waiting` are distinct wire
/// values but are treated identically by the transition policy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum BookingStatus {
    #[serde(rename = "pending", alias = "bending")]
    Pending,
    #[serde(rename = "waiting")]
    Waiting,
    #[serde(rename = "paid")]
    Paid,
    #[serde(rename = "cancel", alias = "cancelled")]
    Cancelled,
    #[serde(rename = "refund", alias = "refunded")]
    Refunded,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized booking status '{0}'")]
pub struct StatusParseError(pub String);

impl BookingStatus {
    /// Normalize a wire-format status string, including the synonyms the
    /// legacy dashboard emits (`bending` is an observed typo for `pending`).
    pub fn from_wire(raw: &str) -> Result<Self, StatusParseError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "bending" => Ok(Self::Pending),
            "waiting" => Ok(Self::Waiting),
            "paid" => Ok(Self::Paid),
            "cancel" | "cancelled" => Ok(Self::Cancelled),
            "refund" | "refunded" => Ok(Self::Refunded),
            other => Err(StatusParseError(other.to_string())),
        }
    }

    /// The short string the remote API expects.
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Waiting => "waiting",
            Self::Paid => "paid",
            Self::Cancelled => "cancel",
            Self::Refunded => "refund",
        }
    }

    /// Human-readable label for prompts and log output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Waiting => "Waiting",
            Self::Paid => "Paid",
            Self::Cancelled => "Cancelled",
            Self::Refunded => "Refunded",
        }
    }

    /// Terminal statuses never offer further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }
}

impl FromStr for BookingStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire(s)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Policy class of a payment channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentClass {
    /// Money captured by a gateway before the booking ever shows `paid`.
    Electronic,
    /// Money changes hands outside the system; status lags reality.
    Cash,
}

/// A payment channel tag as recorded on the booking (`razorpay`, `cash`, ...).
///
/// The set is open: tenants onboard new gateways without a schema change, so
/// this stays a string with classification logic rather than an enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentMethod(String);

const CASH_CLASS_METHODS: &[&str] = &["cash", "coh", "cod"];

impl PaymentMethod {
    pub fn new(method: impl Into<String>) -> Self {
        Self(method.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn class(&self) -> PaymentClass {
        let normalized = self.0.trim().to_ascii_lowercase();
        if CASH_CLASS_METHODS.contains(&normalized.as_str()) {
            PaymentClass::Cash
        } else {
            PaymentClass::Electronic
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PaymentMethod {
    fn from(method: &str) -> Self {
        Self(method.to_string())
    }
}

/// UPI app recorded when a cash-class booking is retroactively marked paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpiApp {
    #[serde(rename = "gpay")]
    Gpay,
    #[serde(rename = "paytm")]
    Paytm,
    #[serde(rename = "phonepe")]
    Phonepe,
    #[serde(rename = "others")]
    Others,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized UPI app '{0}' (expected gpay, paytm, phonepe or others)")]
pub struct UpiAppParseError(pub String);

impl UpiApp {
    pub const ALL: [UpiApp; 4] = [UpiApp::Gpay, UpiApp::Paytm, UpiApp::Phonepe, UpiApp::Others];

    pub fn as_wire_str(&self) -> &'static str {
        match self {
            Self::Gpay => "gpay",
            Self::Paytm => "paytm",
            Self::Phonepe => "phonepe",
            Self::Others => "others",
        }
    }
}

impl FromStr for UpiApp {
    type Err = UpiAppParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpay" => Ok(Self::Gpay),
            "paytm" => Ok(Self::Paytm),
            "phonepe" => Ok(Self::Phonepe),
            "others" => Ok(Self::Others),
            other => Err(UpiAppParseError(other.to_string())),
        }
    }
}

impl fmt::Display for UpiApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire_str())
    }
}

/// Structured replacement for the legacy `method{upi:app}` detail string.
///
/// Constructed once during disambiguation and written by a successful commit;
/// never re-derived afterwards. The legacy string form exists only at the
/// wire boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetail {
    pub channel: PaymentMethod,
    pub subchannel: Option<UpiApp>,
}

impl PaymentDetail {
    pub fn with_upi(channel: PaymentMethod, app: UpiApp) -> Self {
        Self {
            channel,
            subchannel: Some(app),
        }
    }

    /// Emit the legacy wire form, e.g. `cash{upi:gpay}`.
    pub fn to_legacy_string(&self) -> String {
        match self.subchannel {
            Some(app) => format!("{}{{upi:{}}}", self.channel, app),
            None => self.channel.to_string(),
        }
    }

    /// Parse the legacy wire form. A bare channel tag is accepted as a
    /// detail with no subchannel.
    pub fn from_legacy_str(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.split_once('{') {
            None => Some(Self {
                channel: PaymentMethod::new(raw),
                subchannel: None,
            }),
            Some((channel, rest)) => {
                let inner = rest.strip_suffix('}')?;
                let app = inner.strip_prefix("upi:")?;
                let app = app.parse().ok()?;
                Some(Self::with_upi(PaymentMethod::new(channel), app))
            }
        }
    }
}

impl fmt::Display for PaymentDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_legacy_string())
    }
}

/// The reservation entity whose status and payment state this crate manages.
///
/// Mutated only through a successful reconciliation commit; the workflow
/// returns a fresh snapshot rather than editing the caller's copy in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub status: BookingStatus,
    pub payment_method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method_detail: Option<PaymentDetail>,
}

impl Booking {
    pub fn new(
        id: impl Into<BookingId>,
        status: BookingStatus,
        payment_method: impl Into<PaymentMethod>,
    ) -> Self {
        Self {
            id: id.into(),
            status,
            payment_method: payment_method.into(),
            payment_method_detail: None,
        }
    }
}

impl From<String> for BookingId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_synonyms_normalize() {
        assert_eq!(BookingStatus::from_wire("bending"), Ok(BookingStatus::Pending));
        assert_eq!(BookingStatus::from_wire("Cancelled"), Ok(BookingStatus::Cancelled));
        assert_eq!(BookingStatus::from_wire("cancel"), Ok(BookingStatus::Cancelled));
        assert_eq!(BookingStatus::from_wire("refund"), Ok(BookingStatus::Refunded));
        assert_eq!(BookingStatus::from_wire("REFUNDED"), Ok(BookingStatus::Refunded));
        assert_eq!(BookingStatus::from_wire(" waiting "), Ok(BookingStatus::Waiting));
        assert!(BookingStatus::from_wire("unknown").is_err());
    }

    #[test]
    fn status_round_trips_through_short_wire_form() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Waiting,
            BookingStatus::Paid,
            BookingStatus::Cancelled,
            BookingStatus::Refunded,
        ] {
            assert_eq!(BookingStatus::from_wire(status.as_wire_str()), Ok(status));
        }
    }

    #[test]
    fn payment_method_classification() {
        assert_eq!(PaymentMethod::from("cash").class(), PaymentClass::Cash);
        assert_eq!(PaymentMethod::from("COH").class(), PaymentClass::Cash);
        assert_eq!(PaymentMethod::from("cod").class(), PaymentClass::Cash);
        assert_eq!(PaymentMethod::from("razorpay").class(), PaymentClass::Electronic);
        assert_eq!(PaymentMethod::from("phonepay").class(), PaymentClass::Electronic);
        // Unknown gateway tags default to electronic.
        assert_eq!(PaymentMethod::from("stripe").class(), PaymentClass::Electronic);
    }

    #[test]
    fn payment_detail_legacy_form() {
        let detail = PaymentDetail::with_upi(PaymentMethod::from("cash"), UpiApp::Gpay);
        assert_eq!(detail.to_legacy_string(), "cash{upi:gpay}");

        let parsed = PaymentDetail::from_legacy_str("coh{upi:phonepe}").unwrap();
        assert_eq!(parsed.channel.as_str(), "coh");
        assert_eq!(parsed.subchannel, Some(UpiApp::Phonepe));

        let bare = PaymentDetail::from_legacy_str("cash").unwrap();
        assert_eq!(bare.subchannel, None);

        assert!(PaymentDetail::from_legacy_str("").is_none());
        assert!(PaymentDetail::from_legacy_str("cash{upi:").is_none());
        assert!(PaymentDetail::from_legacy_str("cash{cheque:x}").is_none());
    }

    #[test]
    fn status_serde_uses_wire_form() {
        let json = serde_json::to_string(&BookingStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancel\"");
        let status: BookingStatus = serde_json::from_str("\"refunded\"").unwrap();
        assert_eq!(status, BookingStatus::Refunded);
    }
}
