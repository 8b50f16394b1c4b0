//! The SOAP action client.
//!
//! One method per UPnP action. All calls share a single pooled HTTP client
//! so that steady-state control traffic across a large fleet reuses warm
//! connections, and every call carries a deadline.

use std::time::Duration;

use tracing::debug;

use maestro_parser::didl::DidlLite;
use maestro_parser::topology::ZoneGroupState;

use crate::envelope::{build_envelope, extract_text, parse_fault};
use crate::error::{SoapError, SoapResult};
use crate::service::Service;
use crate::types::{
    AlarmList, BrowseResponse, MediaInfo, PositionInfo, QueuePosition, TransportInfo,
    ZoneAttributes,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEVICE_PORT: u16 = 1400;

/// Async SOAP client for device control.
#[derive(Debug, Clone)]
pub struct SoapClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl SoapClient {
    /// Create a client with the default per-call deadline.
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom per-call deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .connect_timeout(Duration::from_secs(2))
            .build()
            .expect("failed to build HTTP client");
        Self { http, timeout }
    }

    /// Issue `action` against `service` on the device at `address`.
    ///
    /// `address` is normally a bare IP; an explicit `host:port` form is
    /// honored as-is (the fleet listens on 1400).
    pub async fn call(
        &self,
        address: &str,
        service: Service,
        action: &'static str,
        args: &[(&str, String)],
    ) -> SoapResult<String> {
        let url = format!("{}{}", base_url(address), service.control_path());
        let body = build_envelope(service.service_type(), action, args);
        let soap_action = format!("\"{}#{}\"", service.service_type(), action);

        debug!(address, action, "soap call");

        let response = self
            .http
            .post(&url)
            .header("Content-Type", "text/xml; charset=\"utf-8\"")
            .header("SOAPACTION", soap_action)
            .timeout(self.timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| classify_send_error(action, &e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SoapError::Unreachable {
                action,
                message: e.to_string(),
            })?;

        if let Some(fault) = parse_fault(&text) {
            return Err(SoapError::Rejected {
                action,
                fault_code: fault.code,
                description: fault.description,
            });
        }
        if !status.is_success() {
            return Err(SoapError::Unreachable {
                action,
                message: format!("HTTP {status}"),
            });
        }
        Ok(text)
    }

    // ---- AVTransport ----

    pub async fn get_transport_info(&self, address: &str) -> SoapResult<TransportInfo> {
        let body = self
            .call(address, Service::AVTransport, "GetTransportInfo", &instance())
            .await?;
        Ok(TransportInfo {
            current_transport_state: text(&body, "CurrentTransportState"),
            current_transport_status: text(&body, "CurrentTransportStatus"),
            current_speed: text(&body, "CurrentSpeed"),
        })
    }

    pub async fn get_position_info(&self, address: &str) -> SoapResult<PositionInfo> {
        let body = self
            .call(address, Service::AVTransport, "GetPositionInfo", &instance())
            .await?;
        Ok(PositionInfo {
            track: number(&body, "Track"),
            track_duration: text(&body, "TrackDuration"),
            track_metadata: text(&body, "TrackMetaData"),
            track_uri: text(&body, "TrackURI"),
            rel_time: text(&body, "RelTime"),
        })
    }

    pub async fn get_media_info(&self, address: &str) -> SoapResult<MediaInfo> {
        let body = self
            .call(address, Service::AVTransport, "GetMediaInfo", &instance())
            .await?;
        Ok(MediaInfo {
            nr_tracks: number(&body, "NrTracks"),
            current_uri: text(&body, "CurrentURI"),
            current_uri_metadata: text(&body, "CurrentURIMetaData"),
        })
    }

    pub async fn set_av_transport_uri(
        &self,
        address: &str,
        uri: &str,
        metadata: &str,
    ) -> SoapResult<()> {
        self.call(
            address,
            Service::AVTransport,
            "SetAVTransportURI",
            &[
                ("InstanceID", "0".to_string()),
                ("CurrentURI", uri.to_string()),
                ("CurrentURIMetaData", metadata.to_string()),
            ],
        )
        .await
        .map(drop)
    }

    pub async fn add_uri_to_queue(
        &self,
        address: &str,
        uri: &str,
        metadata: &str,
        enqueue_as_next: bool,
    ) -> SoapResult<QueuePosition> {
        let body = self
            .call(
                address,
                Service::AVTransport,
                "AddURIToQueue",
                &[
                    ("InstanceID", "0".to_string()),
                    ("EnqueuedURI", uri.to_string()),
                    ("EnqueuedURIMetaData", metadata.to_string()),
                    ("DesiredFirstTrackNumberEnqueued", "0".to_string()),
                    ("EnqueueAsNext", u8::from(enqueue_as_next).to_string()),
                ],
            )
            .await?;
        Ok(QueuePosition {
            first_track_number_enqueued: number(&body, "FirstTrackNumberEnqueued"),
            num_tracks_added: number(&body, "NumTracksAdded"),
            new_queue_length: number(&body, "NewQueueLength"),
        })
    }

    pub async fn remove_all_tracks_from_queue(&self, address: &str) -> SoapResult<()> {
        self.call(
            address,
            Service::AVTransport,
            "RemoveAllTracksFromQueue",
            &instance(),
        )
        .await
        .map(drop)
    }

    pub async fn play(&self, address: &str) -> SoapResult<()> {
        self.call(
            address,
            Service::AVTransport,
            "Play",
            &[("InstanceID", "0".to_string()), ("Speed", "1".to_string())],
        )
        .await
        .map(drop)
    }

    pub async fn pause(&self, address: &str) -> SoapResult<()> {
        self.call(address, Service::AVTransport, "Pause", &instance())
            .await
            .map(drop)
    }

    pub async fn stop(&self, address: &str) -> SoapResult<()> {
        self.call(address, Service::AVTransport, "Stop", &instance())
            .await
            .map(drop)
    }

    pub async fn next(&self, address: &str) -> SoapResult<()> {
        self.call(address, Service::AVTransport, "Next", &instance())
            .await
            .map(drop)
    }

    pub async fn previous(&self, address: &str) -> SoapResult<()> {
        self.call(address, Service::AVTransport, "Previous", &instance())
            .await
            .map(drop)
    }

    /// Seek to an absolute `H:MM:SS` position within the current track.
    pub async fn seek(&self, address: &str, target: &str) -> SoapResult<()> {
        self.call(
            address,
            Service::AVTransport,
            "Seek",
            &[
                ("InstanceID", "0".to_string()),
                ("Unit", "REL_TIME".to_string()),
                ("Target", target.to_string()),
            ],
        )
        .await
        .map(drop)
    }

    /// Detach the device from its group, making it its own coordinator.
    pub async fn become_standalone_coordinator(&self, address: &str) -> SoapResult<()> {
        self.call(
            address,
            Service::AVTransport,
            "BecomeCoordinatorOfStandaloneGroup",
            &instance(),
        )
        .await
        .map(drop)
    }

    // ---- RenderingControl ----

    pub async fn get_volume(&self, address: &str) -> SoapResult<u8> {
        let body = self
            .call(address, Service::RenderingControl, "GetVolume", &master())
            .await?;
        Ok(number(&body, "CurrentVolume") as u8)
    }

    pub async fn set_volume(&self, address: &str, level: u8) -> SoapResult<()> {
        self.call(
            address,
            Service::RenderingControl,
            "SetVolume",
            &[
                ("InstanceID", "0".to_string()),
                ("Channel", "Master".to_string()),
                ("DesiredVolume", level.to_string()),
            ],
        )
        .await
        .map(drop)
    }

    pub async fn get_mute(&self, address: &str) -> SoapResult<bool> {
        let body = self
            .call(address, Service::RenderingControl, "GetMute", &master())
            .await?;
        Ok(text(&body, "CurrentMute").trim() == "1")
    }

    pub async fn set_mute(&self, address: &str, muted: bool) -> SoapResult<()> {
        self.call(
            address,
            Service::RenderingControl,
            "SetMute",
            &[
                ("InstanceID", "0".to_string()),
                ("Channel", "Master".to_string()),
                ("DesiredMute", u8::from(muted).to_string()),
            ],
        )
        .await
        .map(drop)
    }

    // ---- ContentDirectory ----

    /// Browse the direct children of `object_id`.
    pub async fn browse(
        &self,
        address: &str,
        object_id: &str,
        starting_index: u32,
        requested_count: u32,
    ) -> SoapResult<BrowseResponse> {
        let body = self
            .call(
                address,
                Service::ContentDirectory,
                "Browse",
                &[
                    ("ObjectID", object_id.to_string()),
                    ("BrowseFlag", "BrowseDirectChildren".to_string()),
                    ("Filter", "*".to_string()),
                    ("StartingIndex", starting_index.to_string()),
                    ("RequestedCount", requested_count.to_string()),
                    ("SortCriteria", String::new()),
                ],
            )
            .await?;

        let didl = extract_text(&body, "Result").ok_or(SoapError::InvalidResponse {
            action: "Browse",
            message: "missing Result element".to_string(),
        })?;
        let result = DidlLite::from_xml(&didl).map_err(|e| SoapError::InvalidResponse {
            action: "Browse",
            message: e.to_string(),
        })?;

        Ok(BrowseResponse {
            result,
            number_returned: number(&body, "NumberReturned"),
            total_matches: number(&body, "TotalMatches"),
            update_id: number(&body, "UpdateID"),
        })
    }

    // ---- ZoneGroupTopology ----

    pub async fn get_zone_group_state(&self, address: &str) -> SoapResult<ZoneGroupState> {
        let body = self
            .call(address, Service::ZoneGroupTopology, "GetZoneGroupState", &[])
            .await?;
        let raw = extract_text(&body, "ZoneGroupState").ok_or(SoapError::InvalidResponse {
            action: "GetZoneGroupState",
            message: "missing ZoneGroupState element".to_string(),
        })?;
        ZoneGroupState::from_xml(&raw).map_err(|e| SoapError::InvalidResponse {
            action: "GetZoneGroupState",
            message: e.to_string(),
        })
    }

    pub async fn get_zone_group_attributes(&self, address: &str) -> SoapResult<ZoneAttributes> {
        let body = self
            .call(
                address,
                Service::ZoneGroupTopology,
                "GetZoneGroupAttributes",
                &[],
            )
            .await?;
        Ok(ZoneAttributes {
            current_zone_group_name: text(&body, "CurrentZoneGroupName"),
            current_zone_group_id: text(&body, "CurrentZoneGroupID"),
        })
    }

    // ---- AlarmClock ----

    pub async fn list_alarms(&self, address: &str) -> SoapResult<AlarmList> {
        let body = self
            .call(address, Service::AlarmClock, "ListAlarms", &[])
            .await?;
        Ok(AlarmList {
            current_alarm_list: text(&body, "CurrentAlarmList"),
            current_alarm_list_version: text(&body, "CurrentAlarmListVersion"),
        })
    }
}

impl Default for SoapClient {
    fn default() -> Self {
        Self::new()
    }
}

fn base_url(address: &str) -> String {
    if address.contains(':') {
        format!("http://{address}")
    } else {
        format!("http://{address}:{DEVICE_PORT}")
    }
}

fn classify_send_error(action: &'static str, err: &reqwest::Error) -> SoapError {
    if err.is_timeout() {
        SoapError::Timeout { action }
    } else {
        SoapError::Unreachable {
            action,
            message: err.to_string(),
        }
    }
}

fn instance() -> [(&'static str, String); 1] {
    [("InstanceID", "0".to_string())]
}

fn master() -> [(&'static str, String); 2] {
    [
        ("InstanceID", "0".to_string()),
        ("Channel", "Master".to_string()),
    ]
}

fn text(body: &str, element: &str) -> String {
    extract_text(body, element).unwrap_or_default()
}

fn number(body: &str, element: &str) -> u32 {
    text(body, element).trim().parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(inner: &str) -> String {
        format!(
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body>{inner}</s:Body></s:Envelope>"#
        )
    }

    #[tokio::test]
    async fn get_volume_parses_scalar() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/MediaRenderer/RenderingControl/Control")
            .match_header(
                "SOAPACTION",
                "\"urn:schemas-upnp-org:service:RenderingControl:1#GetVolume\"",
            )
            .with_status(200)
            .with_body(response(
                r#"<u:GetVolumeResponse xmlns:u="urn:schemas-upnp-org:service:RenderingControl:1"><CurrentVolume>23</CurrentVolume></u:GetVolumeResponse>"#,
            ))
            .create_async()
            .await;

        let client = SoapClient::new();
        let volume = client.get_volume(&server.host_with_port()).await.unwrap();
        assert_eq!(volume, 23);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn soap_fault_classifies_as_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/MediaRenderer/AVTransport/Control")
            .with_status(500)
            .with_body(response(
                r#"<s:Fault><faultcode>s:Client</faultcode><faultstring>UPnPError</faultstring><detail><UPnPError><errorCode>701</errorCode><errorDescription>Transition not available</errorDescription></UPnPError></detail></s:Fault>"#,
            ))
            .create_async()
            .await;

        let client = SoapClient::new();
        let err = client.play(&server.host_with_port()).await.unwrap_err();
        match err {
            SoapError::Rejected {
                action,
                fault_code,
                description,
            } => {
                assert_eq!(action, "Play");
                assert_eq!(fault_code, 701);
                assert_eq!(description, "Transition not available");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn connection_failure_classifies_as_unreachable() {
        let client = SoapClient::new();
        let err = client.get_transport_info("127.0.0.1:1").await.unwrap_err();
        assert!(matches!(err, SoapError::Unreachable { action: "GetTransportInfo", .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn browse_parses_nested_didl() {
        let didl = r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/"><item id="FV:2/1" parentID="FV:2"><dc:title>Morning Jazz</dc:title></item></DIDL-Lite>"#;
        let inner = format!(
            r#"<u:BrowseResponse xmlns:u="urn:schemas-upnp-org:service:ContentDirectory:1"><Result>{}</Result><NumberReturned>1</NumberReturned><TotalMatches>1</TotalMatches><UpdateID>3</UpdateID></u:BrowseResponse>"#,
            maestro_parser::xml::escape(didl)
        );

        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/MediaServer/ContentDirectory/Control")
            .with_status(200)
            .with_body(response(&inner))
            .create_async()
            .await;

        let client = SoapClient::new();
        let browse = client
            .browse(&server.host_with_port(), "FV:2", 0, 100)
            .await
            .unwrap();
        assert_eq!(browse.number_returned, 1);
        assert_eq!(browse.result.items.len(), 1);
        assert_eq!(
            browse.result.items[0].title.as_deref(),
            Some("Morning Jazz")
        );
    }

    #[tokio::test]
    async fn zone_group_state_parses_topology() {
        let topology = r#"<ZoneGroupState><ZoneGroups><ZoneGroup Coordinator="RINCON_AA" ID="RINCON_AA:3"><ZoneGroupMember UUID="RINCON_AA" Location="http://192.168.4.21:1400/xml/device_description.xml" ZoneName="Den"/></ZoneGroup></ZoneGroups></ZoneGroupState>"#;
        let inner = format!(
            r#"<u:GetZoneGroupStateResponse xmlns:u="urn:schemas-upnp-org:service:ZoneGroupTopology:1"><ZoneGroupState>{}</ZoneGroupState></u:GetZoneGroupStateResponse>"#,
            maestro_parser::xml::escape(topology)
        );

        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/ZoneGroupTopology/Control")
            .with_status(200)
            .with_body(response(&inner))
            .create_async()
            .await;

        let client = SoapClient::new();
        let state = client
            .get_zone_group_state(&server.host_with_port())
            .await
            .unwrap();
        assert_eq!(state.groups.len(), 1);
        assert_eq!(state.groups[0].members[0].name, "Den");
    }
}
