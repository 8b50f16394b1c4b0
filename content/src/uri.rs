//! Wire URI and DIDL-Lite metadata construction.
//!
//! Both are driven entirely by the registry rule for the requested
//! `(service, content type)` pair. An unsupported pair is a hard error;
//! nothing here guesses a default scheme.

use maestro_parser::xml;

use crate::credentials::MusicServiceCredentials;
use crate::error::{ContentError, ContentResult};
use crate::registry::{ContentType, MusicService, UriKind, UriRule, TOKEN_PREFIX};

/// Build the playback URI for a content ID.
///
/// Shape: `{scheme}:{hexPrefix}{urlEncodedID}?sid={n}&flags={n}&sn={n}`.
pub fn build_uri(
    service: MusicService,
    content_type: ContentType,
    content_id: &str,
    credentials: &MusicServiceCredentials,
) -> ContentResult<String> {
    let rule = rule_for(service, content_type)?;
    let full_id = format!("{}{}{}", rule.id_prefix, content_id, rule.id_suffix);
    Ok(format!(
        "{}:{}{}?sid={}&flags={}&sn={}",
        rule.kind.scheme(),
        rule.hex_prefix,
        urlencoding::encode(&full_id),
        credentials.service_id,
        rule.flags,
        credentials.serial_number,
    ))
}

/// Build the DIDL-Lite metadata fragment for a content ID.
///
/// Carries the escaped title, the rule's UPnP class, and a `cdudn`
/// descriptor embedding the account token in the form
/// `SA_RINCON{token}_{account}_#Svc{token}-{suffix}-Token`.
pub fn build_didl_metadata(
    service: MusicService,
    content_type: ContentType,
    content_id: &str,
    title: &str,
    credentials: &MusicServiceCredentials,
) -> ContentResult<String> {
    let rule = rule_for(service, content_type)?;
    let full_id = format!("{}{}{}", rule.id_prefix, content_id, rule.id_suffix);
    let item_id = format!("{}{}", rule.hex_prefix, urlencoding::encode(&full_id));
    let descriptor = token_descriptor(credentials);

    Ok(format!(
        r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/" xmlns:r="urn:schemas-rinconnetworks-com:metadata-1-0/" xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/"><item id="{}" parentID="-1" restricted="true"><dc:title>{}</dc:title><upnp:class>{}</upnp:class><desc id="cdudn" nameSpace="urn:schemas-rinconnetworks-com:metadata-1-0/">{}</desc></item></DIDL-Lite>"#,
        item_id,
        xml::escape(title),
        rule.upnp_class,
        descriptor,
    ))
}

/// Whether playing this content type goes through the device queue.
pub fn requires_queue(service: MusicService, content_type: ContentType) -> ContentResult<bool> {
    let rule = rule_for(service, content_type)?;
    Ok(matches!(rule.kind, UriKind::Container))
}

fn rule_for(service: MusicService, content_type: ContentType) -> ContentResult<&'static UriRule> {
    service
        .rule(content_type)
        .ok_or(ContentError::UnsupportedContent {
            service,
            content_type,
        })
}

fn token_descriptor(credentials: &MusicServiceCredentials) -> String {
    format!(
        "{}{}_{}_#Svc{}-{}-Token",
        TOKEN_PREFIX,
        credentials.token,
        credentials.account_id,
        credentials.token,
        credentials.session_suffix,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::extract_from_favorite;
    use maestro_parser::didl::{DidlLite, DidlObject, DidlResource};
    use std::time::Instant;

    fn credentials() -> MusicServiceCredentials {
        MusicServiceCredentials {
            service: MusicService::Spotify,
            account_id: "X".to_string(),
            service_id: 12,
            serial_number: 5,
            token: 2311,
            session_suffix: "6a54dae0".to_string(),
            extracted_at: Instant::now(),
        }
    }

    #[test]
    fn builds_container_uri() {
        let uri = build_uri(
            MusicService::Spotify,
            ContentType::Playlist,
            "37i9dQZF1DWZeKCadgRdKQ",
            &credentials(),
        )
        .unwrap();
        assert_eq!(
            uri,
            "x-rincon-cpcontainer:1006206cspotify%3Aplaylist%3A37i9dQZF1DWZeKCadgRdKQ?sid=12&flags=8300&sn=5"
        );
    }

    #[test]
    fn unsupported_pair_is_a_hard_error() {
        let err = build_uri(
            MusicService::Tidal,
            ContentType::Episode,
            "ep1",
            &credentials(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ContentError::UnsupportedContent {
                service: MusicService::Tidal,
                content_type: ContentType::Episode,
            }
        ));
    }

    #[test]
    fn every_known_pair_round_trips_through_its_scheme() {
        let creds = credentials();
        for service in MusicService::ALL {
            for content_type in service.supported_content() {
                let rule = service.rule(content_type).unwrap();
                let uri = build_uri(service, content_type, "some-id", &creds).unwrap();

                let (scheme, rest) = uri.split_once(':').unwrap();
                assert_eq!(scheme, rule.kind.scheme(), "{service} {content_type:?}");
                assert!(rest.starts_with(rule.hex_prefix));
                let query = uri.split_once('?').unwrap().1;
                assert!(query.contains(&format!("sid={}", creds.service_id)));
                assert!(query.contains(&format!("flags={}", rule.flags)));
                assert!(query.contains(&format!("sn={}", creds.serial_number)));
            }
        }
    }

    #[test]
    fn metadata_is_well_formed_and_carries_escaped_title() {
        let creds = credentials();
        let title = r#"Bops & Bangers <vol. 2>"#;
        let metadata = build_didl_metadata(
            MusicService::Spotify,
            ContentType::Playlist,
            "37i9dQZF1DWZeKCadgRdKQ",
            title,
            &creds,
        )
        .unwrap();

        assert!(metadata.contains("Bops &amp; Bangers &lt;vol. 2&gt;"));
        assert!(metadata.contains("object.container.playlistContainer"));
        assert!(metadata.contains("SA_RINCON2311_X_#Svc2311-6a54dae0-Token"));

        let parsed = DidlLite::from_xml(&metadata).unwrap();
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items[0].title.as_deref(), Some(title));
        assert_eq!(
            parsed.items[0].class.as_deref(),
            Some("object.container.playlistContainer")
        );
    }

    #[test]
    fn metadata_for_every_known_pair_is_well_formed() {
        let creds = credentials();
        for service in MusicService::ALL {
            for content_type in service.supported_content() {
                let metadata =
                    build_didl_metadata(service, content_type, "some-id", "Title", &creds).unwrap();
                let parsed = DidlLite::from_xml(&metadata)
                    .unwrap_or_else(|e| panic!("{service} {content_type:?}: {e}"));
                let rule = service.rule(content_type).unwrap();
                assert_eq!(parsed.items[0].class.as_deref(), Some(rule.upnp_class));
            }
        }
    }

    #[test]
    fn built_descriptor_survives_credential_extraction() {
        // What the builder emits is exactly what the extractor consumes
        // when the content later appears inside a favorite.
        let creds = credentials();
        let metadata = build_didl_metadata(
            MusicService::Spotify,
            ContentType::Playlist,
            "37i9dQZF1DWZeKCadgRdKQ",
            "Deep Focus",
            &creds,
        )
        .unwrap();
        let uri = build_uri(
            MusicService::Spotify,
            ContentType::Playlist,
            "37i9dQZF1DWZeKCadgRdKQ",
            &creds,
        )
        .unwrap();

        let favorite = DidlObject {
            id: "FV:2/99".to_string(),
            res: Some(DidlResource {
                uri: Some(uri),
                ..Default::default()
            }),
            res_md: Some(metadata),
            ..Default::default()
        };
        let (service, extracted) = extract_from_favorite(&favorite).unwrap();
        assert_eq!(service, MusicService::Spotify);
        assert_eq!(extracted.token, creds.token);
        assert_eq!(extracted.serial_number, creds.serial_number);
        assert_eq!(extracted.session_suffix, creds.session_suffix);
    }

    #[test]
    fn queue_requirement_follows_the_scheme() {
        assert!(requires_queue(MusicService::Spotify, ContentType::Playlist).unwrap());
        assert!(requires_queue(MusicService::Spotify, ContentType::Album).unwrap());
        assert!(!requires_queue(MusicService::Spotify, ContentType::Track).unwrap());
        assert!(!requires_queue(MusicService::Spotify, ContentType::Station).unwrap());
    }
}
