//! Per-device playback/volume state.

use std::time::Instant;

/// How a state value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateSource {
    /// Written by a GENA notification
    Event,
    /// Assembled from a SOAP poll
    Poll,
}

/// The merged view of one device's playback and rendering state.
///
/// String fields use `""` for "never reported"; partial event updates only
/// ever overwrite fields they actually carried.
#[derive(Debug, Clone)]
pub struct DeviceState {
    pub address: String,
    pub identity: String,

    pub transport_state: String,
    pub transport_status: String,
    pub current_track_uri: String,
    pub track_duration: String,
    pub relative_time: String,
    pub track_metadata: String,
    /// The AVTransport URI the device is bound to (queue, container, or
    /// an external-input stream)
    pub container_uri: String,
    pub container_metadata: String,

    pub volume: Option<u8>,
    pub muted: Option<bool>,

    pub source: StateSource,

    /// Master freshness timestamp. `None` until the entry has seen an
    /// update that actually refreshes it.
    pub updated_at: Option<Instant>,
    pub transport_updated_at: Option<Instant>,
    pub volume_updated_at: Option<Instant>,
}

impl DeviceState {
    /// A blank entry for a device that has not reported anything yet.
    pub fn new(address: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            identity: identity.into(),
            transport_state: String::new(),
            transport_status: String::new(),
            current_track_uri: String::new(),
            track_duration: String::new(),
            relative_time: String::new(),
            track_metadata: String::new(),
            container_uri: String::new(),
            container_metadata: String::new(),
            volume: None,
            muted: None,
            source: StateSource::Event,
            updated_at: None,
            transport_updated_at: None,
            volume_updated_at: None,
        }
    }

    /// Age of the entry relative to its master freshness timestamp.
    pub fn age(&self) -> Option<std::time::Duration> {
        self.updated_at.map(|t| t.elapsed())
    }

    /// Whether the device reports being fed by a physical input.
    pub fn is_external_input(&self) -> bool {
        self.container_uri.starts_with("x-rincon-stream:")
            || self.container_uri.starts_with("x-sonos-htastream:")
    }
}
