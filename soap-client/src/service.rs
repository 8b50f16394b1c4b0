//! UPnP service catalog.

use serde::{Deserialize, Serialize};

/// The UPnP services this control plane speaks to.
///
/// Each service pins a `(service type, control path, event path)` triple;
/// the paths are fixed across the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Service {
    AVTransport,
    RenderingControl,
    ContentDirectory,
    ZoneGroupTopology,
    DeviceProperties,
    AlarmClock,
}

impl Service {
    /// Every service, in a stable order.
    pub const ALL: [Service; 6] = [
        Service::AVTransport,
        Service::RenderingControl,
        Service::ContentDirectory,
        Service::ZoneGroupTopology,
        Service::DeviceProperties,
        Service::AlarmClock,
    ];

    /// The URN used in SOAP envelopes and `SOAPACTION` headers.
    pub fn service_type(&self) -> &'static str {
        match self {
            Service::AVTransport => "urn:schemas-upnp-org:service:AVTransport:1",
            Service::RenderingControl => "urn:schemas-upnp-org:service:RenderingControl:1",
            Service::ContentDirectory => "urn:schemas-upnp-org:service:ContentDirectory:1",
            Service::ZoneGroupTopology => "urn:schemas-upnp-org:service:ZoneGroupTopology:1",
            Service::DeviceProperties => "urn:schemas-upnp-org:service:DeviceProperties:1",
            Service::AlarmClock => "urn:schemas-upnp-org:service:AlarmClock:1",
        }
    }

    /// Path POSTed to for action calls.
    pub fn control_path(&self) -> &'static str {
        match self {
            Service::AVTransport => "/MediaRenderer/AVTransport/Control",
            Service::RenderingControl => "/MediaRenderer/RenderingControl/Control",
            Service::ContentDirectory => "/MediaServer/ContentDirectory/Control",
            Service::ZoneGroupTopology => "/ZoneGroupTopology/Control",
            Service::DeviceProperties => "/DeviceProperties/Control",
            Service::AlarmClock => "/AlarmClock/Control",
        }
    }

    /// Path GENA SUBSCRIBE requests are sent to.
    pub fn event_path(&self) -> &'static str {
        match self {
            Service::AVTransport => "/MediaRenderer/AVTransport/Event",
            Service::RenderingControl => "/MediaRenderer/RenderingControl/Event",
            Service::ContentDirectory => "/MediaServer/ContentDirectory/Event",
            Service::ZoneGroupTopology => "/ZoneGroupTopology/Event",
            Service::DeviceProperties => "/DeviceProperties/Event",
            Service::AlarmClock => "/AlarmClock/Event",
        }
    }

    /// Short slug used as the per-service callback path suffix, so the
    /// originating service kind can be recovered from the NOTIFY path alone.
    pub fn callback_suffix(&self) -> &'static str {
        match self {
            Service::AVTransport => "transport",
            Service::RenderingControl => "rendering",
            Service::ContentDirectory => "directory",
            Service::ZoneGroupTopology => "topology",
            Service::DeviceProperties => "properties",
            Service::AlarmClock => "alarms",
        }
    }

    /// Inverse of [`Service::callback_suffix`].
    pub fn from_callback_suffix(suffix: &str) -> Option<Service> {
        Service::ALL
            .into_iter()
            .find(|s| s.callback_suffix() == suffix)
    }
}
