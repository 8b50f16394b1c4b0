//! Inbound NOTIFY endpoint.
//!
//! Devices push GENA event notifications at the callback URL handed to them
//! at SUBSCRIBE time. This crate owns that HTTP surface: it validates the
//! NOTIFY method and UPnP headers, extracts the subscription ID and
//! sequence number, and forwards the raw body over a channel. It knows
//! nothing about subscriptions themselves; unknown SIDs are someone else's
//! decision.

mod server;

pub use server::{CallbackError, CallbackServer, CallbackUrls};

/// One received NOTIFY, exactly as it arrived.
#[derive(Debug, Clone)]
pub struct NotifyPayload {
    /// Subscription ID from the `SID` header
    pub sid: String,
    /// Event sequence number from the `SEQ` header
    pub seq: Option<u32>,
    /// Service-kind path suffix, when the device hit a suffixed callback URL
    pub service_hint: Option<String>,
    /// Raw XML body
    pub body: String,
}
