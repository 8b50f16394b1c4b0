//! DIDL-Lite metadata model.
//!
//! Browse responses and track metadata both arrive as DIDL-Lite documents.
//! Favorites carry two extra pieces this crate preserves verbatim: the
//! `resMD` descriptor (escaped DIDL describing the favorited object, where
//! music-service account tokens live) and the `desc` element.

use serde::{Deserialize, Serialize};

use crate::error::ParseResult;
use crate::xml;

/// A parsed DIDL-Lite document.
///
/// Both `item` and `container` entries can appear; favorites containers
/// return items, music-service browses may return either.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename = "DIDL-Lite")]
pub struct DidlLite {
    #[serde(rename = "item", default)]
    pub items: Vec<DidlObject>,
    #[serde(rename = "container", default)]
    pub containers: Vec<DidlObject>,
}

impl DidlLite {
    /// Parse a raw DIDL-Lite document.
    pub fn from_xml(didl: &str) -> ParseResult<Self> {
        xml::parse(didl)
    }

    /// All objects in document order, items before containers.
    pub fn objects(&self) -> impl Iterator<Item = &DidlObject> {
        self.items.iter().chain(self.containers.iter())
    }
}

/// A single DIDL item or container.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DidlObject {
    #[serde(rename = "@id", default)]
    pub id: String,

    #[serde(rename = "@parentID", default)]
    pub parent_id: String,

    #[serde(rename = "title", default)]
    pub title: Option<String>,

    /// UPnP class string, e.g. `object.itemobject.item.sonos-favorite`
    #[serde(rename = "class", default)]
    pub class: Option<String>,

    #[serde(rename = "res", default)]
    pub res: Option<DidlResource>,

    /// Escaped DIDL metadata descriptor carried by favorites
    #[serde(rename = "resMD", default)]
    pub res_md: Option<String>,

    #[serde(rename = "albumArtURI", default)]
    pub album_art_uri: Option<String>,

    #[serde(rename = "creator", default)]
    pub creator: Option<String>,

    #[serde(rename = "album", default)]
    pub album: Option<String>,

    /// Favorite description, e.g. the owning service's display name
    #[serde(rename = "description", default)]
    pub description: Option<String>,
}

impl DidlObject {
    /// The resource URI, if the object carries one.
    pub fn resource_uri(&self) -> Option<&str> {
        self.res.as_ref().and_then(|r| r.uri.as_deref()).filter(|u| !u.is_empty())
    }
}

/// The `res` element: a playable URI plus transport hints.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DidlResource {
    #[serde(rename = "@duration", default)]
    pub duration: Option<String>,

    #[serde(rename = "@protocolInfo", default)]
    pub protocol_info: Option<String>,

    #[serde(rename = "$value", default)]
    pub uri: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_track_metadata() {
        let didl = r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/"><item id="-1" parentID="-1"><dc:title>Harvest Moon</dc:title><dc:creator>Neil Young</dc:creator><upnp:album>Harvest Moon</upnp:album><res duration="0:05:03" protocolInfo="http-get:*:audio/mpeg:*">http://example.com/t.mp3</res></item></DIDL-Lite>"#;

        let parsed = DidlLite::from_xml(didl).unwrap();
        assert_eq!(parsed.items.len(), 1);
        let item = &parsed.items[0];
        assert_eq!(item.title.as_deref(), Some("Harvest Moon"));
        assert_eq!(item.creator.as_deref(), Some("Neil Young"));
        assert_eq!(item.resource_uri(), Some("http://example.com/t.mp3"));
        assert_eq!(
            item.res.as_ref().unwrap().duration.as_deref(),
            Some("0:05:03")
        );
    }

    #[test]
    fn parses_favorite_with_res_md() {
        let didl = r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/" xmlns:r="urn:schemas-rinconnetworks-com:metadata-1-0/"><item id="FV:2/13" parentID="FV:2"><dc:title>Deep Focus</dc:title><upnp:class>object.itemobject.item.sonos-favorite</upnp:class><r:description>Spotify</r:description><res protocolInfo="x-rincon-cpcontainer:*:*:*">x-rincon-cpcontainer:1006206cspotify%3aplaylist%3a37i9dQZF1DWZeKCadgRdKQ?sid=12&amp;flags=8300&amp;sn=5</res><r:resMD>&lt;DIDL-Lite&gt;&lt;item&gt;&lt;desc id="cdudn"&gt;SA_RINCON2311_X_#Svc2311-6a54dae0-Token&lt;/desc&gt;&lt;/item&gt;&lt;/DIDL-Lite&gt;</r:resMD></item></DIDL-Lite>"#;

        let parsed = DidlLite::from_xml(didl).unwrap();
        let fav = &parsed.items[0];
        assert_eq!(fav.id, "FV:2/13");
        assert_eq!(fav.description.as_deref(), Some("Spotify"));
        assert!(fav.resource_uri().unwrap().starts_with("x-rincon-cpcontainer:"));
        assert!(fav.res_md.as_ref().unwrap().contains("SA_RINCON2311"));
    }

    #[test]
    fn parses_containers() {
        let didl = r#"<DIDL-Lite><container id="A:ALBUM/1" parentID="A:ALBUM"><dc:title>Blue</dc:title><upnp:class>object.container.album.musicAlbum</upnp:class></container></DIDL-Lite>"#;

        let parsed = DidlLite::from_xml(didl).unwrap();
        assert!(parsed.items.is_empty());
        assert_eq!(parsed.containers.len(), 1);
        assert_eq!(parsed.containers[0].title.as_deref(), Some("Blue"));
    }

    #[test]
    fn empty_document_yields_no_objects() {
        let parsed = DidlLite::from_xml("<DIDL-Lite></DIDL-Lite>").unwrap();
        assert_eq!(parsed.objects().count(), 0);
    }
}
