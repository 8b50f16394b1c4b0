//! GENA subscription lifecycle for the device fleet.
//!
//! Push notifications only flow while subscriptions are alive, and devices
//! expire them aggressively. This crate keeps one subscription per device
//! per configured service kind alive: idempotent subscribe, a periodic
//! renewal sweep, exponential backoff for devices that refuse, automatic
//! resubscription when a device forgets us, and dispatch of inbound NOTIFY
//! payloads into the state and topology caches.

mod error;
mod gena;
mod manager;
mod types;

pub use error::{SubscriptionError, SubscriptionResult};
pub use gena::{GenaError, GenaTransport, HttpGenaTransport, SubscribeResponse};
pub use manager::{SubscriptionConfig, SubscriptionManager};
pub use types::{backoff_delay, renewal_delay, DeviceSubscriptionState, Subscription};
