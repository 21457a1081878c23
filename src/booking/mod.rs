// Booking Domain Module - Entities and Boundary Normalization
//
// The remote dashboard API speaks a loose string dialect (status synonyms,
// `method{upi:app}` detail strings). Everything in this module normalizes
// that dialect into typed values at the boundary.

pub mod types;

pub use types::{
    Booking, BookingId, BookingStatus, PaymentClass, PaymentDetail, PaymentMethod,
    StatusParseError, UpiApp, UpiAppParseError,
};
