//! Cache-first, poll-fallback playback reads.
//!
//! "What is this device doing right now" is answered from the event cache
//! whenever the entry is fresh; otherwise a SOAP poll assembles the answer.
//! Polls are shaped by the transport state: position info is skipped only
//! when the device is exactly stopped (a transitioning device may be
//! mid-load), and media info is always fetched because it carries the
//! external-input signal.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::warn;

use soap_client::types::{MediaInfo, PositionInfo, TransportInfo};
use soap_client::{SoapClient, SoapResult};

use crate::device_state::{DeviceState, StateSource};
use crate::state_cache::StateCache;

/// The SOAP reads the hybrid layer performs.
///
/// A seam over [`SoapClient`] so that read strategies are observable in
/// tests without a device on the network.
#[async_trait]
pub trait DevicePoller: Send + Sync {
    async fn transport_info(&self, address: &str) -> SoapResult<TransportInfo>;
    async fn position_info(&self, address: &str) -> SoapResult<PositionInfo>;
    async fn media_info(&self, address: &str) -> SoapResult<MediaInfo>;
    async fn volume(&self, address: &str) -> SoapResult<u8>;
    async fn mute(&self, address: &str) -> SoapResult<bool>;
}

#[async_trait]
impl DevicePoller for SoapClient {
    async fn transport_info(&self, address: &str) -> SoapResult<TransportInfo> {
        self.get_transport_info(address).await
    }
    async fn position_info(&self, address: &str) -> SoapResult<PositionInfo> {
        self.get_position_info(address).await
    }
    async fn media_info(&self, address: &str) -> SoapResult<MediaInfo> {
        self.get_media_info(address).await
    }
    async fn volume(&self, address: &str) -> SoapResult<u8> {
        self.get_volume(address).await
    }
    async fn mute(&self, address: &str) -> SoapResult<bool> {
        self.get_mute(address).await
    }
}

/// A playback answer plus its provenance age (zero for fresh polls).
#[derive(Debug, Clone)]
pub struct PlaybackSnapshot {
    pub state: DeviceState,
    pub age: Duration,
}

/// Cache-first reader over coordinator devices.
pub struct PlaybackReader<P: DevicePoller> {
    cache: Arc<StateCache>,
    poller: Arc<P>,
}

impl<P: DevicePoller> PlaybackReader<P> {
    pub fn new(cache: Arc<StateCache>, poller: Arc<P>) -> Self {
        Self { cache, poller }
    }

    /// Playback state for a single coordinator.
    ///
    /// Returns `None` when the cache misses and the device cannot be
    /// polled; one unreachable device is an omission, not an error.
    pub async fn playback(&self, address: &str, identity: &str) -> Option<PlaybackSnapshot> {
        if let Some(state) = self.cache.get(address) {
            let age = state.age().unwrap_or_default();
            return Some(PlaybackSnapshot { state, age });
        }
        self.poll(address, identity).await
    }

    /// Playback state for many coordinators.
    ///
    /// Phase 1 checks the cache for every coordinator; phase 2 polls only
    /// the misses, all concurrently. Results land in position-indexed slots
    /// so callers can line them up with their input; unreachable devices
    /// leave their slot `None`.
    pub async fn playback_many(
        &self,
        coordinators: &[(String, String)],
    ) -> Vec<Option<PlaybackSnapshot>> {
        let mut slots: Vec<Option<PlaybackSnapshot>> = vec![None; coordinators.len()];
        let mut missed: Vec<usize> = Vec::new();

        for (index, (address, _)) in coordinators.iter().enumerate() {
            match self.cache.get(address) {
                Some(state) => {
                    let age = state.age().unwrap_or_default();
                    slots[index] = Some(PlaybackSnapshot { state, age });
                }
                None => missed.push(index),
            }
        }

        let polls = missed.iter().map(|&index| {
            let (address, identity) = &coordinators[index];
            async move { (index, self.poll(address, identity).await) }
        });
        for (index, snapshot) in join_all(polls).await {
            slots[index] = snapshot;
        }

        slots
    }

    async fn poll(&self, address: &str, identity: &str) -> Option<PlaybackSnapshot> {
        let transport = match self.poller.transport_info(address).await {
            Ok(info) => info,
            Err(e) => {
                warn!(address, error = %e, "transport poll failed; omitting device");
                return None;
            }
        };

        let want_position = !transport.is_stopped();
        let (volume, mute, media, position) = tokio::join!(
            self.poller.volume(address),
            self.poller.mute(address),
            self.poller.media_info(address),
            async {
                if want_position {
                    Some(self.poller.position_info(address).await)
                } else {
                    None
                }
            },
        );

        let mut state = DeviceState::new(address, identity);
        state.source = StateSource::Poll;
        state.updated_at = Some(std::time::Instant::now());
        state.transport_state = transport.current_transport_state;
        state.transport_status = transport.current_transport_status;

        match volume {
            Ok(level) => state.volume = Some(level),
            Err(e) => warn!(address, error = %e, "volume poll failed"),
        }
        match mute {
            Ok(muted) => state.muted = Some(muted),
            Err(e) => warn!(address, error = %e, "mute poll failed"),
        }
        match media {
            Ok(info) => {
                state.container_uri = info.current_uri;
                state.container_metadata = info.current_uri_metadata;
            }
            Err(e) => warn!(address, error = %e, "media poll failed"),
        }
        if let Some(result) = position {
            match result {
                Ok(info) => {
                    state.current_track_uri = info.track_uri;
                    state.track_duration = info.track_duration;
                    state.relative_time = info.rel_time;
                    state.track_metadata = info.track_metadata;
                }
                Err(e) => warn!(address, error = %e, "position poll failed"),
            }
        }

        Some(PlaybackSnapshot {
            state,
            age: Duration::ZERO,
        })
    }
}
