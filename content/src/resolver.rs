//! The content resolver.
//!
//! Turns an abstract content reference into a `(uri, metadata)` pair a
//! device will actually play. Favorite references resolve by browsing the
//! favorites container; direct references require credentials for the
//! service to already be extractable from favorites somewhere on the
//! device.

use std::sync::Arc;

use tracing::debug;

use maestro_parser::didl::DidlObject;

use crate::credentials::{CredentialExtractor, FavoriteSource};
use crate::error::{ContentError, ContentResult};
use crate::registry::{ContentType, MusicService};
use crate::uri;

/// An abstract "play this" request.
#[derive(Debug, Clone)]
pub enum MusicContent {
    /// A saved favorite, referenced by its object ID
    Favorite { favorite_id: String },
    /// Service content addressed directly
    Direct {
        service: MusicService,
        content_type: ContentType,
        content_id: String,
        title: String,
    },
}

/// A resolved, playable answer.
#[derive(Debug, Clone)]
pub struct PlayableContent {
    pub uri: String,
    pub metadata: String,
    pub title: String,
    pub content_type: ContentType,
    /// `None` for favorites owned by a service outside the registry
    pub service: Option<MusicService>,
    /// Whether playback must go through the device queue
    pub requires_queue: bool,
}

/// Resolves content references against a device's content directory.
pub struct ContentResolver<S: FavoriteSource> {
    source: Arc<S>,
    extractor: CredentialExtractor,
}

impl<S: FavoriteSource> ContentResolver<S> {
    pub fn new(source: Arc<S>, extractor: CredentialExtractor) -> Self {
        Self { source, extractor }
    }

    /// Access to the underlying credential cache.
    pub fn extractor(&self) -> &CredentialExtractor {
        &self.extractor
    }

    /// Resolve `content`, browsing favorites on the device at `address`.
    pub async fn resolve(
        &self,
        address: &str,
        content: &MusicContent,
    ) -> ContentResult<PlayableContent> {
        match content {
            MusicContent::Favorite { favorite_id } => {
                self.resolve_favorite(address, favorite_id).await
            }
            MusicContent::Direct {
                service,
                content_type,
                content_id,
                title,
            } => {
                self.resolve_direct(address, *service, *content_type, content_id, title)
                    .await
            }
        }
    }

    async fn resolve_favorite(
        &self,
        address: &str,
        favorite_id: &str,
    ) -> ContentResult<PlayableContent> {
        let favorites = self.source.favorites(address).await?;
        // Every browse is a credential-bootstrap opportunity.
        self.extractor.scan_favorites(&favorites);

        let favorite = favorites
            .iter()
            .find(|f| f.id == favorite_id)
            .ok_or_else(|| ContentError::FavoriteNotFound {
                favorite_id: favorite_id.to_string(),
            })?;
        let uri = favorite
            .resource_uri()
            .ok_or_else(|| ContentError::FavoriteUnplayable {
                favorite_id: favorite_id.to_string(),
            })?;

        let requires_queue = uri.starts_with("x-rincon-cpcontainer:");
        let content_type = favorite_content_type(favorite, requires_queue);
        let service = classify_favorite(favorite);
        debug!(favorite_id, ?service, ?content_type, "favorite resolved");

        Ok(PlayableContent {
            uri: uri.to_string(),
            metadata: favorite.res_md.clone().unwrap_or_default(),
            title: favorite.title.clone().unwrap_or_default(),
            content_type,
            service,
            requires_queue,
        })
    }

    async fn resolve_direct(
        &self,
        address: &str,
        service: MusicService,
        content_type: ContentType,
        content_id: &str,
        title: &str,
    ) -> ContentResult<PlayableContent> {
        let credentials = self
            .extractor
            .credentials_for(self.source.as_ref(), address, service)
            .await?;

        Ok(PlayableContent {
            uri: uri::build_uri(service, content_type, content_id, &credentials)?,
            metadata: uri::build_didl_metadata(
                service,
                content_type,
                content_id,
                title,
                &credentials,
            )?,
            title: title.to_string(),
            content_type,
            service: Some(service),
            requires_queue: uri::requires_queue(service, content_type)?,
        })
    }
}

/// Derive the content type of a favorite from its UPnP class, falling back
/// to the resource scheme when the class is uninformative.
fn favorite_content_type(favorite: &DidlObject, container_scheme: bool) -> ContentType {
    let class = favorite
        .res_md
        .as_deref()
        .and_then(extract_class)
        .or_else(|| favorite.class.clone())
        .unwrap_or_default();

    if class.contains("playlistContainer.epgContainer") || class.contains("podcast") {
        ContentType::Podcast
    } else if class.contains("playlistContainer") {
        ContentType::Playlist
    } else if class.contains("album.musicAlbum") {
        ContentType::Album
    } else if class.contains("audioBroadcast") {
        ContentType::Station
    } else if class.contains("musicTrack") {
        ContentType::Track
    } else if container_scheme {
        ContentType::Playlist
    } else {
        ContentType::Track
    }
}

/// The class of the favorited object lives inside its metadata descriptor.
fn extract_class(res_md: &str) -> Option<String> {
    soap_client::extract_text(res_md, "class").filter(|c| !c.is_empty())
}

fn classify_favorite(favorite: &DidlObject) -> Option<MusicService> {
    let haystack = format!(
        "{} {} {}",
        favorite.resource_uri().unwrap_or_default(),
        favorite.res_md.as_deref().unwrap_or_default(),
        favorite.description.as_deref().unwrap_or_default(),
    );
    MusicService::from_keywords(&haystack)
}
