//! RenderingControl `LastChange` decoding.
//!
//! Rendering events report one entry per audio channel. Only the `Master`
//! channel (or an entry with no channel attribute) is extracted; LF/RF and
//! subwoofer channels are device-internal.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ParseResult;
use crate::xml::{self, ChannelValue};

/// Volume/mute carried by a RenderingControl event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RenderingEvent {
    pub volume: Option<u8>,
    pub mute: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename = "Event")]
struct RawChange {
    #[serde(rename = "InstanceID")]
    instance: RawInstance,
}

#[derive(Debug, Deserialize)]
struct RawInstance {
    #[serde(rename = "Volume", default)]
    volume: Vec<ChannelValue>,
    #[serde(rename = "Mute", default)]
    mute: Vec<ChannelValue>,
}

fn master_value(entries: &[ChannelValue]) -> Option<&str> {
    entries
        .iter()
        .find(|e| matches!(e.channel.as_deref(), None | Some("Master")))
        .map(|e| e.val.as_str())
        .filter(|v| !v.is_empty())
}

/// Parse an unescaped RenderingControl `LastChange` document.
pub fn parse(last_change: &str) -> ParseResult<RenderingEvent> {
    let raw: RawChange = xml::parse(last_change)?;
    let instance = raw.instance;

    let volume = master_value(&instance.volume).and_then(|v| match v.parse::<u8>() {
        Ok(level) => Some(level),
        Err(_) => {
            debug!(value = v, "discarding non-numeric master volume");
            None
        }
    });
    let mute = master_value(&instance.mute).map(|v| v == "1");

    Ok(RenderingEvent { volume, mute })
}
