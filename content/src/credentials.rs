//! Credential extraction from saved favorites.
//!
//! The account tokens a device uses with a music service appear in exactly
//! one browsable place: the resource URIs and metadata descriptors of saved
//! favorites. Extraction scans every favorite, classifies its owning
//! service, and pulls the numeric IDs and token out with fixed expressions.
//! Results are cached per service; the first favorite matching a
//! not-yet-cached service wins and stays authoritative until the TTL
//! lapses.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

use maestro_parser::didl::DidlObject;
use soap_client::{SoapClient, SoapError};

use crate::error::{ContentError, ContentResult};
use crate::registry::MusicService;

/// Favorites live in this container on every device.
const FAVORITES_CONTAINER: &str = "FV:2";
const BROWSE_PAGE_SIZE: u32 = 100;
const BROWSE_MAX_OBJECTS: u32 = 500;

const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

static SID_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]sid=(\d+)").expect("sid regex"));
static SN_PARAM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[?&]sn=(\d+)").expect("sn regex"));
static TOKEN_DESCRIPTOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"SA_RINCON(\d+)_(.*?)_?#Svc(\d+)-([0-9A-Za-z]+)-Token").expect("token regex")
});

/// Account credentials for one music service, derived from a favorite.
#[derive(Debug, Clone)]
pub struct MusicServiceCredentials {
    pub service: MusicService,
    /// Account identifier segment of the token descriptor (often a
    /// placeholder `X`)
    pub account_id: String,
    /// Numeric service ID from the `sid=` URI parameter
    pub service_id: u32,
    /// Account serial number from the `sn=` URI parameter
    pub serial_number: u32,
    /// Numeric service token from the `SA_RINCON` descriptor
    pub token: u32,
    /// Opaque session segment of the token descriptor
    pub session_suffix: String,
    pub extracted_at: Instant,
}

/// Where favorites come from.
#[async_trait]
pub trait FavoriteSource: Send + Sync {
    async fn favorites(&self, address: &str) -> Result<Vec<DidlObject>, SoapError>;
}

#[async_trait]
impl FavoriteSource for SoapClient {
    async fn favorites(&self, address: &str) -> Result<Vec<DidlObject>, SoapError> {
        let mut favorites = Vec::new();
        let mut index = 0u32;
        loop {
            let page = self
                .browse(address, FAVORITES_CONTAINER, index, BROWSE_PAGE_SIZE)
                .await?;
            let returned = page.number_returned;
            favorites.extend(page.result.items);
            index += returned;
            if returned == 0 || index >= page.total_matches || index >= BROWSE_MAX_OBJECTS {
                break;
            }
        }
        Ok(favorites)
    }
}

/// Per-service credential cache with favorite-scanning population.
pub struct CredentialExtractor {
    cache: RwLock<HashMap<MusicService, MusicServiceCredentials>>,
    ttl: Duration,
}

impl CredentialExtractor {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Cached credentials for `service`, if still within TTL.
    pub fn cached(&self, service: MusicService) -> Option<MusicServiceCredentials> {
        let cache = self.cache.read();
        cache
            .get(&service)
            .filter(|c| c.extracted_at.elapsed() <= self.ttl)
            .cloned()
    }

    /// Credentials for `service`, re-deriving from favorites when the cache
    /// is stale or empty.
    pub async fn credentials_for<S: FavoriteSource + ?Sized>(
        &self,
        source: &S,
        address: &str,
        service: MusicService,
    ) -> ContentResult<MusicServiceCredentials> {
        if let Some(credentials) = self.cached(service) {
            return Ok(credentials);
        }
        let favorites = source.favorites(address).await?;
        self.scan_favorites(&favorites);
        self.cached(service)
            .ok_or(ContentError::CredentialsRequired { service })
    }

    /// Scan browsed favorites and cache credentials for every service that
    /// does not already hold fresh ones. First favorite per service wins.
    pub fn scan_favorites(&self, favorites: &[DidlObject]) {
        for favorite in favorites {
            let Some((service, credentials)) = extract_from_favorite(favorite) else {
                continue;
            };
            if self.cached(service).is_some() {
                continue;
            }
            debug!(%service, favorite = %favorite.id, "credentials extracted");
            self.cache.write().insert(service, credentials);
        }
    }

    /// Drop everything; the next lookup re-scans.
    pub fn clear(&self) {
        self.cache.write().clear();
    }
}

impl Default for CredentialExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull service classification and credentials out of one favorite.
///
/// Needs both halves to be present: `sid`/`sn` from the resource URI and
/// the `SA_RINCON` token descriptor from the metadata.
pub fn extract_from_favorite(
    favorite: &DidlObject,
) -> Option<(MusicService, MusicServiceCredentials)> {
    let uri = favorite.resource_uri()?;
    let metadata = favorite.res_md.as_deref().unwrap_or_default();

    let service_id = capture_u32(&SID_PARAM, uri)?;
    let service = classify(favorite, service_id)?;
    let serial_number = capture_u32(&SN_PARAM, uri).unwrap_or(0);

    let descriptor = TOKEN_DESCRIPTOR.captures(metadata)?;
    let token = descriptor[1].parse().ok()?;
    let account_id = descriptor[2].to_string();
    if descriptor[1] != descriptor[3] {
        warn!(
            favorite = %favorite.id,
            "token descriptor halves disagree; using the prefix value"
        );
    }
    let session_suffix = descriptor[4].to_string();

    Some((
        service,
        MusicServiceCredentials {
            service,
            account_id,
            service_id,
            serial_number,
            token,
            session_suffix,
            extracted_at: Instant::now(),
        },
    ))
}

/// A favorite belongs to the service its keywords name, or failing that,
/// to the vendor owning the numeric service ID in its resource URI.
fn classify(favorite: &DidlObject, service_id: u32) -> Option<MusicService> {
    let haystack = format!(
        "{} {} {}",
        favorite.resource_uri().unwrap_or_default(),
        favorite.res_md.as_deref().unwrap_or_default(),
        favorite.description.as_deref().unwrap_or_default(),
    );
    MusicService::from_keywords(&haystack).or_else(|| MusicService::from_service_id(service_id))
}

fn capture_u32(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text).and_then(|c| c[1].parse().ok())
}
