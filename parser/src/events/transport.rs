//! AVTransport `LastChange` decoding.

use serde::{Deserialize, Serialize};

use crate::error::ParseResult;
use crate::xml::{self, ValueAttribute};

/// State carried by an AVTransport event.
///
/// Every field is `Some` only when the event carried a non-empty value for
/// it; partial updates are the norm, and absent fields must leave existing
/// cached state untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransportEvent {
    pub transport_state: Option<String>,
    pub transport_status: Option<String>,
    pub current_track_uri: Option<String>,
    /// Raw DIDL-Lite metadata for the current track
    pub track_metadata: Option<String>,
    pub track_duration: Option<String>,
    pub relative_time: Option<String>,
    pub av_transport_uri: Option<String>,
    pub av_transport_metadata: Option<String>,
}

impl TransportEvent {
    /// True when the event carried nothing this crate extracts.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename = "Event")]
struct RawChange {
    #[serde(rename = "InstanceID")]
    instance: RawInstance,
}

#[derive(Debug, Deserialize)]
struct RawInstance {
    #[serde(rename = "TransportState", default)]
    transport_state: Option<ValueAttribute>,
    #[serde(rename = "TransportStatus", default)]
    transport_status: Option<ValueAttribute>,
    #[serde(rename = "CurrentTrackURI", default)]
    current_track_uri: Option<ValueAttribute>,
    #[serde(rename = "CurrentTrackMetaData", default)]
    current_track_metadata: Option<ValueAttribute>,
    #[serde(rename = "CurrentTrackDuration", default)]
    current_track_duration: Option<ValueAttribute>,
    #[serde(rename = "RelativeTimePosition", default)]
    relative_time_position: Option<ValueAttribute>,
    #[serde(rename = "RelTime", default)]
    rel_time: Option<ValueAttribute>,
    #[serde(rename = "AVTransportURI", default)]
    av_transport_uri: Option<ValueAttribute>,
    #[serde(rename = "AVTransportURIMetaData", default)]
    av_transport_metadata: Option<ValueAttribute>,
}

fn non_empty(attr: Option<ValueAttribute>) -> Option<String> {
    attr.map(|a| a.val).filter(|v| !v.is_empty())
}

/// Parse an unescaped AVTransport `LastChange` document.
pub fn parse(last_change: &str) -> ParseResult<TransportEvent> {
    let raw: RawChange = xml::parse(last_change)?;
    let instance = raw.instance;
    Ok(TransportEvent {
        transport_state: non_empty(instance.transport_state),
        transport_status: non_empty(instance.transport_status),
        current_track_uri: non_empty(instance.current_track_uri),
        track_metadata: non_empty(instance.current_track_metadata),
        track_duration: non_empty(instance.current_track_duration),
        relative_time: non_empty(instance.relative_time_position)
            .or_else(|| non_empty(instance.rel_time)),
        av_transport_uri: non_empty(instance.av_transport_uri),
        av_transport_metadata: non_empty(instance.av_transport_metadata),
    })
}
