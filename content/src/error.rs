//! Content and credential errors.
//!
//! These are terminal, named, and written for direct user display; the
//! layer above maps them to remediation text.

use crate::registry::{ContentType, MusicService};
use soap_client::SoapError;

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("favorite {favorite_id:?} not found on the device")]
    FavoriteNotFound { favorite_id: String },

    #[error("favorite {favorite_id:?} carries no playable resource")]
    FavoriteUnplayable { favorite_id: String },

    #[error("unknown music service {name:?}")]
    UnsupportedService { name: String },

    /// No favorite for the service exists anywhere we can see, so there is
    /// nothing to pull account credentials from.
    #[error("no {service} favorite available to bootstrap credentials")]
    CredentialsRequired { service: MusicService },

    #[error("{service} does not support {content_type:?} content")]
    UnsupportedContent {
        service: MusicService,
        content_type: ContentType,
    },

    #[error(transparent)]
    Soap(#[from] SoapError),
}

pub type ContentResult<T> = std::result::Result<T, ContentError>;
