//! Maestro: a control plane for fleets of Sonos-dialect audio devices.
//!
//! The crates underneath do the protocol work — SOAP actions, GENA
//! subscriptions, event decoding, state caching, content resolution. This
//! crate wires them into one [`ControlPlane`] with a single configuration
//! surface and the narrow interfaces outer layers consume: a discovery
//! hook, an identity→address resolver, a playback-state read surface, and
//! content resolution/playback.

mod config;
mod control_plane;
mod registry;

pub use config::MaestroConfig;
pub use control_plane::{ControlPlane, MaestroError};
pub use registry::{DeviceRegistry, DeviceResolver};

pub use maestro_content::{ContentType, MusicContent, MusicService, PlayableContent};
pub use maestro_parser::topology::ZoneGroupState;
pub use maestro_state::{DeviceState, PlaybackSnapshot, StateSource};
pub use soap_client::{Service, SoapClient, SoapError};
