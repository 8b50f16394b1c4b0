//! Content resolution for third-party music services.
//!
//! Devices cannot be handed a bare "play this playlist" request: each music
//! service needs a service-specific wire URI, DIDL-Lite metadata, and the
//! account token the device itself uses for that service. The only place
//! those tokens can be read from is the device's saved favorites, so this
//! crate extracts credentials from browsed favorites, keeps them cached,
//! and builds playable URI/metadata pairs from a per-service rule table.

mod credentials;
mod error;
mod registry;
mod resolver;
mod uri;

pub use credentials::{CredentialExtractor, FavoriteSource, MusicServiceCredentials};
pub use error::{ContentError, ContentResult};
pub use registry::{ContentType, MusicService, UriKind, UriRule};
pub use resolver::{ContentResolver, MusicContent, PlayableContent};
pub use uri::{build_didl_metadata, build_uri};
