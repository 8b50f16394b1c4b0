//! GENA NOTIFY body decoding.
//!
//! Event bodies arrive as a `propertyset` envelope. For AVTransport and
//! RenderingControl the interesting payload is the `LastChange` property,
//! whose value is an escaped XML document of its own. ZoneGroupTopology
//! events instead carry a `ZoneGroupState` property; that document is kept
//! raw, because topology events are consumed as an invalidation signal
//! rather than parsed inline.

pub mod fast;
mod rendering;
mod transport;

pub use rendering::RenderingEvent;
pub use transport::TransportEvent;

use serde::Deserialize;

use crate::error::{ParseError, ParseResult};
use crate::xml;

/// Raw topology-change signal.
#[derive(Debug, Clone)]
pub struct TopologyEvent {
    /// The unparsed `ZoneGroupState` document carried by the event
    pub zone_group_state: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename = "propertyset")]
struct PropertySet {
    #[serde(rename = "property", default)]
    properties: Vec<Property>,
}

#[derive(Debug, Default, Deserialize)]
struct Property {
    #[serde(rename = "LastChange", default)]
    last_change: Option<String>,
    #[serde(rename = "ZoneGroupState", default)]
    zone_group_state: Option<String>,
}

/// Pull the `LastChange` document out of a propertyset envelope.
///
/// The returned string is the inner event XML with one level of entity
/// escaping already removed.
fn last_change(body: &str) -> ParseResult<String> {
    let envelope: PropertySet = xml::parse(body)?;
    envelope
        .properties
        .into_iter()
        .find_map(|p| p.last_change)
        .filter(|lc| !lc.is_empty())
        .ok_or(ParseError::MissingElement("LastChange"))
}

/// Decode an AVTransport NOTIFY body.
pub fn parse_transport(body: &str) -> ParseResult<TransportEvent> {
    transport::parse(&last_change(body)?)
}

/// Decode a RenderingControl NOTIFY body.
pub fn parse_rendering(body: &str) -> ParseResult<RenderingEvent> {
    rendering::parse(&last_change(body)?)
}

/// Decode a ZoneGroupTopology NOTIFY body.
pub fn parse_topology(body: &str) -> ParseResult<TopologyEvent> {
    let envelope: PropertySet = xml::parse(body)?;
    envelope
        .properties
        .into_iter()
        .find_map(|p| p.zone_group_state)
        .filter(|zs| !zs.is_empty())
        .map(|zone_group_state| TopologyEvent { zone_group_state })
        .ok_or(ParseError::MissingElement("ZoneGroupState"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_last_change_from_envelope() {
        let body = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"><e:property><LastChange>&lt;Event&gt;&lt;InstanceID val="0"/&gt;&lt;/Event&gt;</LastChange></e:property></e:propertyset>"#;
        let inner = last_change(body).unwrap();
        assert_eq!(inner, r#"<Event><InstanceID val="0"/></Event>"#);
    }

    #[test]
    fn missing_last_change_is_an_error() {
        let body = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"><e:property><SomethingElse>1</SomethingElse></e:property></e:propertyset>"#;
        assert!(matches!(
            last_change(body),
            Err(ParseError::MissingElement("LastChange"))
        ));
    }

    #[test]
    fn topology_event_keeps_raw_document() {
        let body = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"><e:property><ZoneGroupState>&lt;ZoneGroupState&gt;&lt;ZoneGroups/&gt;&lt;/ZoneGroupState&gt;</ZoneGroupState></e:property></e:propertyset>"#;
        let event = parse_topology(body).unwrap();
        assert!(event.zone_group_state.contains("<ZoneGroups/>"));
    }
}
