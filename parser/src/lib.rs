//! XML parsing for the maestro control plane.
//!
//! Sonos devices speak several layered XML dialects: SOAP response bodies,
//! GENA `propertyset` event envelopes whose `LastChange` payload is itself
//! escaped XML, DIDL-Lite media metadata, and the zone-group topology
//! document. This crate owns the typed models and decoders for all of them,
//! plus regex fast paths for the two event shapes that arrive often enough
//! to be worth skipping the XML parser for.

mod error;
pub mod didl;
pub mod events;
pub mod topology;
pub mod xml;

pub use error::{ParseError, ParseResult};
pub use events::{RenderingEvent, TopologyEvent, TransportEvent};
