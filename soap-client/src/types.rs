//! Typed SOAP action responses.

use maestro_parser::didl::DidlLite;
use serde::Serialize;

/// `GetTransportInfo` response.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransportInfo {
    pub current_transport_state: String,
    pub current_transport_status: String,
    pub current_speed: String,
}

impl TransportInfo {
    /// Exactly stopped. `TRANSITIONING` does not count: a track may be
    /// mid-load and position info is still meaningful.
    pub fn is_stopped(&self) -> bool {
        self.current_transport_state == "STOPPED"
    }
}

/// `GetPositionInfo` response.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PositionInfo {
    pub track: u32,
    pub track_duration: String,
    pub track_metadata: String,
    pub track_uri: String,
    pub rel_time: String,
}

/// `GetMediaInfo` response.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MediaInfo {
    pub nr_tracks: u32,
    pub current_uri: String,
    pub current_uri_metadata: String,
}

impl MediaInfo {
    /// Whether the device is fed by a local physical input (line-in or a
    /// home-theater HDMI/optical feed) rather than network content.
    pub fn is_external_input(&self) -> bool {
        self.current_uri.starts_with("x-rincon-stream:")
            || self.current_uri.starts_with("x-sonos-htastream:")
    }
}

/// `Browse` response with the `Result` document already parsed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BrowseResponse {
    pub result: DidlLite,
    pub number_returned: u32,
    pub total_matches: u32,
    pub update_id: u32,
}

/// `GetZoneGroupAttributes` response.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ZoneAttributes {
    pub current_zone_group_name: String,
    pub current_zone_group_id: String,
}

/// `ListAlarms` response. The alarm list itself is a nested XML document;
/// it is carried raw because this control plane only relays it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AlarmList {
    pub current_alarm_list: String,
    pub current_alarm_list_version: String,
}

/// `AddURIToQueue` response.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueuePosition {
    pub first_track_number_enqueued: u32,
    pub num_tracks_added: u32,
    pub new_queue_length: u32,
}
