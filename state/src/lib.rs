//! Push-driven state for the device fleet.
//!
//! GENA notifications keep a per-device state cache warm; readers get
//! cache-first answers with a transparent SOAP-poll fallback for devices
//! whose cached state has gone stale. A second, singleton cache holds the
//! zone-group topology, invalidated whenever a topology event arrives.

mod device_state;
mod hybrid;
mod state_cache;
mod topology_cache;

pub use device_state::{DeviceState, StateSource};
pub use hybrid::{DevicePoller, PlaybackReader, PlaybackSnapshot};
pub use state_cache::{CacheStats, StateCache};
pub use topology_cache::TopologyCache;
