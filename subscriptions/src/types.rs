//! Subscription records and the timing policies that govern them.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use soap_client::Service;

/// Maximum backoff between subscribe attempts against a refusing device.
const BACKOFF_CAP: Duration = Duration::from_secs(600);
/// Renewal is never scheduled closer than this, whatever the device grants.
const RENEWAL_FLOOR: Duration = Duration::from_secs(60);

/// One live GENA subscription.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub sid: String,
    pub device_address: String,
    pub device_identity: String,
    pub service: Service,
    pub callback_url: String,
    /// Timeout last granted by the device, in seconds
    pub timeout_seconds: u32,
    pub subscribed_at: Instant,
    /// When the renewal sweep should renew this subscription
    pub renew_at: Instant,
    /// Last `SEQ` observed on a NOTIFY for this subscription
    pub last_seen_seq: Option<u32>,
}

/// Per-device aggregate: which service kinds are covered, and the backoff
/// bookkeeping for subscribe attempts.
#[derive(Debug, Clone, Default)]
pub struct DeviceSubscriptionState {
    pub identity: String,
    /// service kind → SID of the live subscription covering it
    pub services: HashMap<Service, String>,
    pub last_attempt: Option<Instant>,
    pub consecutive_failures: u32,
}

impl DeviceSubscriptionState {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            ..Default::default()
        }
    }

    /// Whether a subscribe attempt is currently gated by backoff.
    pub fn backoff_active(&self, now: Instant) -> bool {
        if self.consecutive_failures == 0 {
            return false;
        }
        match self.last_attempt {
            Some(last) => now.duration_since(last) < backoff_delay(self.consecutive_failures),
            None => false,
        }
    }
}

/// Required wait after `failures` consecutive fully-failed subscribe
/// attempts: `30 · 2^failures` seconds, capped at ten minutes.
pub fn backoff_delay(failures: u32) -> Duration {
    let seconds = 2u64
        .checked_pow(failures)
        .and_then(|factor| factor.checked_mul(30))
        .unwrap_or(BACKOFF_CAP.as_secs());
    Duration::from_secs(seconds).min(BACKOFF_CAP)
}

/// Delay until renewal for a granted timeout: `timeout − buffer`, floored
/// at 60s so a degenerate device-reported timeout cannot cause a tight
/// renewal loop.
pub fn renewal_delay(timeout_seconds: u32, renewal_buffer_seconds: u32) -> Duration {
    let delay = timeout_seconds.saturating_sub(renewal_buffer_seconds);
    Duration::from_secs(u64::from(delay)).max(RENEWAL_FLOOR)
}
