//! Regex fast paths for high-frequency NOTIFY shapes.
//!
//! Transport-state flips and volume nudges dominate event traffic, and both
//! can be answered without unescaping and parsing the nested `LastChange`
//! document. The extractors below run against the raw NOTIFY body; a `None`
//! means "shape not recognized, use the full parser", never "value absent".
//!
//! The extractors must agree with the full XML path on every value they do
//! return. Devices emit attributes in `channel` then `val` order; bodies
//! that deviate fall through to the full parser.

use regex::Regex;
use std::sync::LazyLock;

// Attribute quotes inside LastChange arrive either entity-escaped or raw,
// depending on firmware.
const Q: &str = r#"(?:&quot;|")"#;

static TRANSPORT_STATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"TransportState\s+val={Q}([A-Z_]+){Q}")).expect("transport-state regex")
});

static MASTER_VOLUME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"Volume\s+channel={Q}Master{Q}\s+val={Q}(\d+){Q}"))
        .expect("master-volume regex")
});

static MASTER_MUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"Mute\s+channel={Q}Master{Q}\s+val={Q}([01]){Q}"))
        .expect("master-mute regex")
});

/// Extract the transport state from a raw AVTransport NOTIFY body.
pub fn transport_state(body: &str) -> Option<String> {
    TRANSPORT_STATE
        .captures(body)
        .map(|c| c[1].to_string())
}

/// Extract the `Master` channel volume from a raw RenderingControl body.
pub fn volume(body: &str) -> Option<u8> {
    MASTER_VOLUME
        .captures(body)
        .and_then(|c| c[1].parse().ok())
}

/// Extract the `Master` channel mute flag from a raw RenderingControl body.
pub fn mute(body: &str) -> Option<bool> {
    MASTER_MUTE.captures(body).map(|c| &c[1] == "1")
}
