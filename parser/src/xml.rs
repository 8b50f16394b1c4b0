//! Shared XML decoding helpers.
//!
//! UPnP XML arrives with inconsistent namespace prefixes (`e:`, `dc:`,
//! `upnp:`, `r:`, or none at all, depending on firmware). Serde struct
//! definitions stay simple by stripping prefixes and `xmlns` declarations
//! before deserialization.

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::{ParseError, ParseResult};

static ELEMENT_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(/?)[A-Za-z_][A-Za-z0-9._-]*:").expect("element prefix regex"));
static XMLNS_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\s+xmlns(?::[A-Za-z0-9._-]+)?="[^"]*""#).expect("xmlns regex"));

/// An XML element whose payload lives in a `val` attribute.
///
/// Sonos state variables are empty elements of the form
/// `<TransportState val="PLAYING"/>`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ValueAttribute {
    /// The value from the `val` attribute
    #[serde(rename = "@val", default)]
    pub val: String,
}

/// An XML element carrying both a `channel` and a `val` attribute,
/// e.g. `<Volume channel="Master" val="23"/>`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChannelValue {
    #[serde(rename = "@channel", default)]
    pub channel: Option<String>,
    #[serde(rename = "@val", default)]
    pub val: String,
}

/// Deserialize `xml` into `T` after stripping namespace prefixes.
pub fn parse<T: DeserializeOwned>(xml: &str) -> ParseResult<T> {
    let stripped = strip_namespaces(xml);
    quick_xml::de::from_str(&stripped).map_err(|e| ParseError::XmlDecode(e.to_string()))
}

/// Remove namespace prefixes from element names and drop `xmlns` declarations.
///
/// Prefixes on attribute names are left alone; none of the documents this
/// crate consumes qualify the attributes we read.
pub fn strip_namespaces(xml: &str) -> String {
    let stripped = ELEMENT_PREFIX.replace_all(xml, "<$1");
    XMLNS_DECL.replace_all(&stripped, "").into_owned()
}

/// Unescape XML entities in `text` (`&lt;` and friends).
pub fn unescape(text: &str) -> ParseResult<String> {
    quick_xml::escape::unescape(text)
        .map(|cow| cow.into_owned())
        .map_err(|e| ParseError::XmlDecode(e.to_string()))
}

/// Escape `text` for embedding as XML character data or an attribute value.
pub fn escape(text: &str) -> String {
    quick_xml::escape::escape(text).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_element_prefixes() {
        let input = r#"<e:propertyset><e:property>test</e:property></e:propertyset>"#;
        assert_eq!(
            strip_namespaces(input),
            r#"<propertyset><property>test</property></propertyset>"#
        );
    }

    #[test]
    fn strips_xmlns_declarations_and_keeps_attributes() {
        let input = r#"<dc:title xmlns:dc="http://purl.org/dc/elements/1.1/" id="1">Song</dc:title>"#;
        assert_eq!(strip_namespaces(input), r#"<title id="1">Song</title>"#);
    }

    #[test]
    fn leaves_unprefixed_markup_alone() {
        let input = r#"<Event><InstanceID val="0"><TransportState val="PLAYING"/></InstanceID></Event>"#;
        assert_eq!(strip_namespaces(input), input);
    }

    #[test]
    fn does_not_touch_colons_in_attribute_values() {
        let input = r#"<res protocolInfo="sonos.com-spotify:*:audio/vnd:*">x-sonos-spotify:track</res>"#;
        assert_eq!(strip_namespaces(input), input);
    }

    #[test]
    fn parses_value_attribute() {
        #[derive(Debug, Deserialize)]
        struct Root {
            #[serde(rename = "TransportState")]
            transport_state: ValueAttribute,
        }

        let xml = r#"<Root><TransportState val="PLAYING"/></Root>"#;
        let root: Root = parse(xml).unwrap();
        assert_eq!(root.transport_state.val, "PLAYING");
    }

    #[test]
    fn escape_round_trips() {
        let raw = r#"Tom & Jerry <live> "loud""#;
        let escaped = escape(raw);
        assert!(!escaped.contains('<'));
        assert_eq!(unescape(&escaped).unwrap(), raw);
    }
}
