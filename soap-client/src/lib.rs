//! SOAP action client for Sonos-dialect UPnP devices.
//!
//! This crate owns the wire side of device control: SOAP 1.1 envelope
//! construction, fault classification, and one typed async method per UPnP
//! action across the AVTransport, RenderingControl, ContentDirectory,
//! ZoneGroupTopology, DeviceProperties, and AlarmClock services.

mod client;
mod envelope;
mod error;
mod service;
pub mod types;

pub use client::SoapClient;
pub use envelope::{build_envelope, extract_text, parse_fault, SoapFault};
pub use error::{SoapError, SoapResult};
pub use service::Service;
