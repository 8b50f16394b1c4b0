//! The music-service registry.
//!
//! Everything service-specific is data: the numeric service ID, the
//! keywords that identify a service's favorites, and one URI rule per
//! supported content type. Adding a service is a table addition; a missing
//! entry is a typed "unsupported" answer, never a guessed fallback.

use serde::{Deserialize, Serialize};

use crate::error::ContentError;

/// Token descriptor prefix shared by the vendor dialect.
pub const TOKEN_PREFIX: &str = "SA_RINCON";

/// Supported external music services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MusicService {
    Spotify,
    AppleMusic,
    AmazonMusic,
    Deezer,
    Tidal,
}

impl MusicService {
    pub const ALL: [MusicService; 5] = [
        MusicService::Spotify,
        MusicService::AppleMusic,
        MusicService::AmazonMusic,
        MusicService::Deezer,
        MusicService::Tidal,
    ];

    /// Human-readable service name.
    pub fn name(&self) -> &'static str {
        match self {
            MusicService::Spotify => "Spotify",
            MusicService::AppleMusic => "Apple Music",
            MusicService::AmazonMusic => "Amazon Music",
            MusicService::Deezer => "Deezer",
            MusicService::Tidal => "Tidal",
        }
    }

    /// Parse a service name as it would arrive from an API surface.
    pub fn parse(name: &str) -> Result<MusicService, ContentError> {
        let normalized: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "spotify" => Ok(MusicService::Spotify),
            "applemusic" | "apple" => Ok(MusicService::AppleMusic),
            "amazonmusic" | "amazon" => Ok(MusicService::AmazonMusic),
            "deezer" => Ok(MusicService::Deezer),
            "tidal" => Ok(MusicService::Tidal),
            _ => Err(ContentError::UnsupportedService {
                name: name.to_string(),
            }),
        }
    }

    /// The numeric service ID carried in `sid=` URI parameters.
    pub fn service_id(&self) -> u32 {
        self.config().service_id
    }

    /// Resolve a numeric service ID from a resource URI.
    pub fn from_service_id(id: u32) -> Option<MusicService> {
        Self::ALL.into_iter().find(|s| s.service_id() == id)
    }

    /// Classify a favorite by keyword, given its URI and metadata.
    pub fn from_keywords(haystack: &str) -> Option<MusicService> {
        let lower = haystack.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|s| s.config().keywords.iter().any(|k| lower.contains(k)))
    }

    pub(crate) fn config(&self) -> &'static ServiceConfig {
        match self {
            MusicService::Spotify => &SPOTIFY,
            MusicService::AppleMusic => &APPLE_MUSIC,
            MusicService::AmazonMusic => &AMAZON_MUSIC,
            MusicService::Deezer => &DEEZER,
            MusicService::Tidal => &TIDAL,
        }
    }

    /// The URI rule for a content type, when the service supports it.
    pub fn rule(&self, content_type: ContentType) -> Option<&'static UriRule> {
        self.config()
            .rules
            .iter()
            .find(|(ct, _)| *ct == content_type)
            .map(|(_, rule)| rule)
    }

    /// Content types this service supports.
    pub fn supported_content(&self) -> Vec<ContentType> {
        self.config().rules.iter().map(|(ct, _)| *ct).collect()
    }
}

impl std::fmt::Display for MusicService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Kinds of content a resolution request can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    Playlist,
    Album,
    Podcast,
    Track,
    Episode,
    Station,
}

/// Wire URI families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriKind {
    /// `x-rincon-cpcontainer:` — playlists, albums, podcasts
    Container,
    /// `x-sonos-http:` — individual tracks and episodes
    Stream,
    /// `x-sonosapi-radio:` — stations
    Radio,
}

impl UriKind {
    pub fn scheme(&self) -> &'static str {
        match self {
            UriKind::Container => "x-rincon-cpcontainer",
            UriKind::Stream => "x-sonos-http",
            UriKind::Radio => "x-sonosapi-radio",
        }
    }
}

/// How to build a URI and metadata for one `(service, content type)` pair.
#[derive(Debug, Clone)]
pub struct UriRule {
    pub kind: UriKind,
    /// Item-ID hex prefix in front of the encoded content ID
    pub hex_prefix: &'static str,
    /// Textual prefix applied to the content ID before URL-encoding
    pub id_prefix: &'static str,
    /// Textual suffix applied to the content ID before URL-encoding
    pub id_suffix: &'static str,
    /// Default playback flags
    pub flags: u32,
    /// UPnP class used in DIDL-Lite metadata
    pub upnp_class: &'static str,
}

pub(crate) struct ServiceConfig {
    pub service_id: u32,
    pub keywords: &'static [&'static str],
    pub rules: &'static [(ContentType, UriRule)],
}

const CLASS_PLAYLIST: &str = "object.container.playlistContainer";
const CLASS_ALBUM: &str = "object.container.album.musicAlbum";
const CLASS_TRACK: &str = "object.item.audioItem.musicTrack";
const CLASS_STATION: &str = "object.item.audioItem.audioBroadcast";
const CLASS_PODCAST: &str = "object.container.playlistContainer.epgContainer";

const FLAGS_CONTAINER: u32 = 8300;
const FLAGS_STREAM: u32 = 8224;
const FLAGS_RADIO: u32 = 8296;

macro_rules! rule {
    ($kind:ident, $hex:literal, $prefix:literal, $flags:ident, $class:ident) => {
        UriRule {
            kind: UriKind::$kind,
            hex_prefix: $hex,
            id_prefix: $prefix,
            id_suffix: "",
            flags: $flags,
            upnp_class: $class,
        }
    };
}

static SPOTIFY: ServiceConfig = ServiceConfig {
    service_id: 12,
    keywords: &["spotify"],
    rules: &[
        (
            ContentType::Playlist,
            rule!(Container, "1006206c", "spotify:playlist:", FLAGS_CONTAINER, CLASS_PLAYLIST),
        ),
        (
            ContentType::Album,
            rule!(Container, "1004206c", "spotify:album:", FLAGS_CONTAINER, CLASS_ALBUM),
        ),
        (
            ContentType::Podcast,
            rule!(Container, "1006206c", "spotify:show:", FLAGS_CONTAINER, CLASS_PODCAST),
        ),
        (
            ContentType::Track,
            rule!(Stream, "10032020", "spotify:track:", FLAGS_STREAM, CLASS_TRACK),
        ),
        (
            ContentType::Episode,
            rule!(Stream, "10032020", "spotify:episode:", FLAGS_STREAM, CLASS_TRACK),
        ),
        (
            ContentType::Station,
            rule!(Radio, "000c206c", "spotify:artistRadio:", FLAGS_RADIO, CLASS_STATION),
        ),
    ],
};

static APPLE_MUSIC: ServiceConfig = ServiceConfig {
    service_id: 204,
    keywords: &["applemusic", "apple music", "itunes"],
    rules: &[
        (
            ContentType::Playlist,
            rule!(Container, "1006206c", "playlist:", FLAGS_CONTAINER, CLASS_PLAYLIST),
        ),
        (
            ContentType::Album,
            rule!(Container, "1004206c", "album:", FLAGS_CONTAINER, CLASS_ALBUM),
        ),
        (
            ContentType::Track,
            rule!(Stream, "10032020", "song:", FLAGS_STREAM, CLASS_TRACK),
        ),
        (
            ContentType::Station,
            rule!(Radio, "000c206c", "radio:ra.", FLAGS_RADIO, CLASS_STATION),
        ),
    ],
};

static AMAZON_MUSIC: ServiceConfig = ServiceConfig {
    service_id: 201,
    keywords: &["amazonmusic", "amazon music", "amzn"],
    rules: &[
        (
            ContentType::Playlist,
            rule!(Container, "1006206c", "catalog/playlists/", FLAGS_CONTAINER, CLASS_PLAYLIST),
        ),
        (
            ContentType::Album,
            rule!(Container, "1004206c", "catalog/albums/", FLAGS_CONTAINER, CLASS_ALBUM),
        ),
        (
            ContentType::Track,
            rule!(Stream, "10032020", "catalog/tracks/", FLAGS_STREAM, CLASS_TRACK),
        ),
        (
            ContentType::Station,
            rule!(Radio, "000c206c", "stations/", FLAGS_RADIO, CLASS_STATION),
        ),
    ],
};

static DEEZER: ServiceConfig = ServiceConfig {
    service_id: 2,
    keywords: &["deezer"],
    rules: &[
        (
            ContentType::Playlist,
            rule!(Container, "1006206c", "playlist-", FLAGS_CONTAINER, CLASS_PLAYLIST),
        ),
        (
            ContentType::Album,
            rule!(Container, "1004206c", "album-", FLAGS_CONTAINER, CLASS_ALBUM),
        ),
        (
            ContentType::Track,
            rule!(Stream, "10032020", "track-", FLAGS_STREAM, CLASS_TRACK),
        ),
        (
            ContentType::Station,
            rule!(Radio, "000c206c", "radio-", FLAGS_RADIO, CLASS_STATION),
        ),
    ],
};

static TIDAL: ServiceConfig = ServiceConfig {
    service_id: 174,
    keywords: &["tidal", "wimp"],
    rules: &[
        (
            ContentType::Playlist,
            rule!(Container, "1006206c", "playlist/", FLAGS_CONTAINER, CLASS_PLAYLIST),
        ),
        (
            ContentType::Album,
            rule!(Container, "1004206c", "album/", FLAGS_CONTAINER, CLASS_ALBUM),
        ),
        (
            ContentType::Track,
            rule!(Stream, "10032020", "track/", FLAGS_STREAM, CLASS_TRACK),
        ),
        (
            ContentType::Station,
            rule!(Radio, "000c206c", "station/", FLAGS_RADIO, CLASS_STATION),
        ),
    ],
};
