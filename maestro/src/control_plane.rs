//! The assembled control plane.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use callback_server::{CallbackError, CallbackServer};
use maestro_content::{
    ContentError, ContentResolver, CredentialExtractor, MusicContent, PlayableContent,
};
use maestro_parser::topology::ZoneGroupState;
use maestro_state::{PlaybackReader, PlaybackSnapshot, StateCache, TopologyCache};
use soap_client::{SoapClient, SoapError};
use subscriptions::{
    HttpGenaTransport, SubscriptionConfig, SubscriptionError, SubscriptionManager,
};

use crate::config::MaestroConfig;
use crate::registry::{DeviceRegistry, DeviceResolver};

/// Top-level control-plane failures.
#[derive(Debug, thiserror::Error)]
pub enum MaestroError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Callback(#[from] CallbackError),

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    #[error(transparent)]
    Soap(#[from] SoapError),

    #[error(transparent)]
    Content(#[from] ContentError),

    /// Fleet-wide queries need at least one known device to ask.
    #[error("no devices known yet")]
    NoDevices,
}

/// The running control plane: caches, subscription lifecycle, callback
/// endpoint, and the read/control surfaces outer layers consume.
pub struct ControlPlane {
    config: MaestroConfig,
    soap: Arc<SoapClient>,
    state_cache: Arc<StateCache>,
    topology_cache: Arc<TopologyCache>,
    registry: Arc<DeviceRegistry>,
    reader: PlaybackReader<SoapClient>,
    content: ContentResolver<SoapClient>,
    callback: Option<CallbackServer>,
    manager: Option<SubscriptionManager<HttpGenaTransport>>,
    prune_handle: Option<JoinHandle<()>>,
    prune_shutdown: Option<mpsc::Sender<()>>,
}

impl std::fmt::Debug for ControlPlane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlPlane").finish_non_exhaustive()
    }
}

impl ControlPlane {
    /// Validate the config, bind the callback endpoint, and start the
    /// subscription manager and prune task.
    pub async fn start(config: MaestroConfig) -> Result<Self, MaestroError> {
        config.validate().map_err(MaestroError::Config)?;

        let soap = Arc::new(SoapClient::with_timeout(config.call_timeout));
        let state_cache = Arc::new(StateCache::new(config.state_ttl));
        let topology_cache = Arc::new(TopologyCache::new(config.topology_ttl));
        let registry = Arc::new(DeviceRegistry::new());

        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let callback = CallbackServer::start(config.callback_port_range, notify_tx).await?;

        let manager = SubscriptionManager::start(
            Arc::new(HttpGenaTransport::new(config.call_timeout)),
            callback.urls(),
            Arc::clone(&state_cache),
            Arc::clone(&topology_cache),
            SubscriptionConfig {
                services: config.subscribed_services.clone(),
                requested_timeout_seconds: config.subscription_timeout_seconds,
                renewal_buffer_seconds: config.renewal_buffer_seconds,
                sweep_interval: config.renewal_sweep_interval,
            },
            notify_rx,
        );

        let (prune_shutdown, mut prune_rx) = mpsc::channel::<()>(1);
        let prune_cache = Arc::clone(&state_cache);
        let prune_interval = config.prune_interval;
        let prune_handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(prune_interval);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let dropped = prune_cache.prune();
                        if dropped > 0 {
                            debug!(dropped, "pruned lapsed state entries");
                        }
                    }
                    _ = prune_rx.recv() => break,
                }
            }
        });

        let reader = PlaybackReader::new(Arc::clone(&state_cache), Arc::clone(&soap));
        let content = ContentResolver::new(
            Arc::clone(&soap),
            CredentialExtractor::with_ttl(config.credentials_ttl),
        );

        info!(callback = %callback.callback_url(), "control plane started");
        Ok(Self {
            config,
            soap,
            state_cache,
            topology_cache,
            registry,
            reader,
            content,
            callback: Some(callback),
            manager: Some(manager),
            prune_handle: Some(prune_handle),
            prune_shutdown: Some(prune_shutdown),
        })
    }

    /// Discovery hook: a device was seen at `address`.
    ///
    /// Records the address and brings the device's subscriptions up to the
    /// configured set. Safe to call repeatedly.
    pub async fn device_discovered(&self, address: &str, identity: &str) {
        self.registry.upsert(identity, address);
        if let Some(manager) = &self.manager {
            manager.subscribe_device(address, identity).await;
        }
    }

    /// A device left the network; drop its subscriptions.
    pub async fn device_removed(&self, address: &str) {
        if let Some(manager) = &self.manager {
            manager.unsubscribe_device(address).await;
        }
    }

    /// The identity→address resolver handed to outer layers.
    pub fn device_resolver(&self) -> Arc<dyn DeviceResolver> {
        Arc::clone(&self.registry) as Arc<dyn DeviceResolver>
    }

    /// Cache-first playback state for one device address.
    pub async fn playback_state(&self, address: &str) -> Option<PlaybackSnapshot> {
        let identity = self.registry.identity_of(address).unwrap_or_default();
        self.reader.playback(address, &identity).await
    }

    /// Playback state for every visible group coordinator, in topology
    /// order. Unreachable coordinators are omitted from their slot.
    pub async fn group_playback_states(&self) -> Result<Vec<Option<PlaybackSnapshot>>, MaestroError> {
        let topology = self.topology().await?;
        let coordinators: Vec<(String, String)> = topology
            .coordinators()
            .into_iter()
            .map(|(identity, address)| (address.to_string(), identity.to_string()))
            .collect();
        Ok(self.reader.playback_many(&coordinators).await)
    }

    /// The current zone topology, cached until invalidated or expired.
    pub async fn topology(&self) -> Result<ZoneGroupState, MaestroError> {
        let entry_point = self.registry.any_address().ok_or(MaestroError::NoDevices)?;
        let soap = Arc::clone(&self.soap);
        let topology = self
            .topology_cache
            .get_or_fetch(|| async move { soap.get_zone_group_state(&entry_point).await })
            .await?;
        self.registry.update_from_topology(&topology);
        Ok(topology)
    }

    /// Resolve an abstract content reference into a playable URI/metadata
    /// pair, browsing favorites on any known device.
    pub async fn resolve_content(
        &self,
        content: &MusicContent,
    ) -> Result<PlayableContent, MaestroError> {
        let entry_point = self.registry.any_address().ok_or(MaestroError::NoDevices)?;
        Ok(self.content.resolve(&entry_point, content).await?)
    }

    /// Resolve `content` and start playback on the coordinator at
    /// `address`.
    pub async fn play_content(
        &self,
        address: &str,
        content: &MusicContent,
    ) -> Result<(), MaestroError> {
        let playable = self.content.resolve(address, content).await?;

        if playable.requires_queue {
            let identity = self
                .registry
                .identity_of(address)
                .ok_or(MaestroError::NoDevices)?;
            self.soap.remove_all_tracks_from_queue(address).await?;
            self.soap
                .add_uri_to_queue(address, &playable.uri, &playable.metadata, false)
                .await?;
            let queue_uri = format!("x-rincon-queue:{identity}#0");
            self.soap.set_av_transport_uri(address, &queue_uri, "").await?;
        } else {
            self.soap
                .set_av_transport_uri(address, &playable.uri, &playable.metadata)
                .await?;
        }
        self.soap.play(address).await?;
        info!(address, title = %playable.title, "playback started");
        Ok(())
    }

    /// Direct access to the SOAP action client for control actions the
    /// facade does not wrap.
    pub fn soap(&self) -> &SoapClient {
        &self.soap
    }

    /// State cache counters, for observability surfaces.
    pub fn cache_stats(&self) -> maestro_state::CacheStats {
        self.state_cache.stats()
    }

    pub fn config(&self) -> &MaestroConfig {
        &self.config
    }

    /// Stop background work and release the callback endpoint. Cleanup is
    /// best-effort and bounded; unreachable devices cannot stall shutdown.
    pub async fn stop(mut self) -> Result<(), MaestroError> {
        if let Some(tx) = self.prune_shutdown.take() {
            let _ = tx.send(()).await;
        }
        if let Some(handle) = self.prune_handle.take() {
            if tokio::time::timeout(Duration::from_secs(5), handle).await.is_err() {
                warn!("prune task did not stop in time");
            }
        }
        if let Some(manager) = self.manager.take() {
            manager.stop().await?;
        }
        if let Some(callback) = self.callback.take() {
            callback.shutdown().await?;
        }
        info!("control plane stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_and_stops_cleanly() {
        let plane = ControlPlane::start(MaestroConfig::default()).await.unwrap();
        assert_eq!(plane.cache_stats().entries, 0);
        plane.stop().await.unwrap();
    }

    #[tokio::test]
    async fn rejects_invalid_config() {
        let config = MaestroConfig::default().with_callback_ports(4100, 4000);
        let err = ControlPlane::start(config).await.unwrap_err();
        assert!(matches!(err, MaestroError::Config(_)));
    }

    #[tokio::test]
    async fn fleet_queries_need_a_device() {
        let plane = ControlPlane::start(MaestroConfig::default()).await.unwrap();
        let err = plane.topology().await.unwrap_err();
        assert!(matches!(err, MaestroError::NoDevices));

        let err = plane
            .resolve_content(&MusicContent::Favorite {
                favorite_id: "FV:2/1".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MaestroError::NoDevices));

        plane.stop().await.unwrap();
    }

    #[tokio::test]
    async fn playback_state_for_unknown_device_is_absent() {
        // 127.0.0.1:1 refuses connections, so the poll fallback comes back
        // empty rather than erroring.
        let config = MaestroConfig::default().with_call_timeout(Duration::from_millis(200));
        let plane = ControlPlane::start(config).await.unwrap();
        assert!(plane.playback_state("127.0.0.1:1").await.is_none());
        plane.stop().await.unwrap();
    }
}
