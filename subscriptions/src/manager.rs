//! The subscription lifecycle manager.
//!
//! Owns the subscription table, the per-device backoff slots, the periodic
//! renewal sweep, and the NOTIFY consumer that feeds the state caches.
//! Locking discipline: the subscription table and the device slots are
//! guarded independently, and neither lock is ever held while the other —
//! or the state cache — is being acquired.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use callback_server::{CallbackUrls, NotifyPayload};
use maestro_parser::events::{self, fast};
use maestro_parser::{RenderingEvent, TransportEvent};
use maestro_state::{StateCache, TopologyCache};
use soap_client::Service;

use crate::error::{SubscriptionError, SubscriptionResult};
use crate::gena::{GenaError, GenaTransport};
use crate::types::{renewal_delay, DeviceSubscriptionState, Subscription};

const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(5);
const DEVICE_PORT: u16 = 1400;

/// Tunables for the subscription manager.
#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    /// Service kinds every device should hold a subscription for
    pub services: Vec<Service>,
    /// Timeout requested on SUBSCRIBE/RENEW, in seconds
    pub requested_timeout_seconds: u32,
    /// How long before device-reported expiry the renewal is scheduled
    pub renewal_buffer_seconds: u32,
    /// Cadence of the renewal sweep
    pub sweep_interval: Duration,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            services: vec![
                Service::AVTransport,
                Service::RenderingControl,
                Service::ZoneGroupTopology,
            ],
            requested_timeout_seconds: 1800,
            renewal_buffer_seconds: 60,
            sweep_interval: Duration::from_secs(30),
        }
    }
}

struct Inner<T: GenaTransport> {
    transport: Arc<T>,
    urls: CallbackUrls,
    config: SubscriptionConfig,
    /// SID → live subscription
    subscriptions: RwLock<HashMap<String, Subscription>>,
    /// device address → aggregate subscribe state
    devices: DashMap<String, DeviceSubscriptionState>,
    state_cache: Arc<StateCache>,
    topology_cache: Arc<TopologyCache>,
}

/// Orchestrates per-device, per-service subscription lifecycles.
pub struct SubscriptionManager<T: GenaTransport + 'static> {
    inner: Arc<Inner<T>>,
    sweep_handle: Option<JoinHandle<()>>,
    notify_handle: Option<JoinHandle<()>>,
    sweep_shutdown: Option<mpsc::Sender<()>>,
    notify_shutdown: Option<mpsc::Sender<()>>,
}

impl<T: GenaTransport + 'static> SubscriptionManager<T> {
    /// Start the manager: spawns the renewal sweep and the NOTIFY consumer.
    ///
    /// Both tasks are owned by this value and are joined by [`Self::stop`].
    pub fn start(
        transport: Arc<T>,
        urls: CallbackUrls,
        state_cache: Arc<StateCache>,
        topology_cache: Arc<TopologyCache>,
        config: SubscriptionConfig,
        mut notify_rx: mpsc::UnboundedReceiver<NotifyPayload>,
    ) -> Self {
        let inner = Arc::new(Inner {
            transport,
            urls,
            config,
            subscriptions: RwLock::new(HashMap::new()),
            devices: DashMap::new(),
            state_cache,
            topology_cache,
        });

        let (sweep_shutdown, mut sweep_rx) = mpsc::channel::<()>(1);
        let sweep_inner = Arc::clone(&inner);
        let sweep_handle = tokio::spawn(async move {
            let mut tick = tokio::time::interval(sweep_inner.config.sweep_interval);
            loop {
                tokio::select! {
                    _ = tick.tick() => sweep_inner.renew_due().await,
                    _ = sweep_rx.recv() => break,
                }
            }
        });

        let (notify_shutdown, mut notify_sd_rx) = mpsc::channel::<()>(1);
        let notify_inner = Arc::clone(&inner);
        let notify_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    payload = notify_rx.recv() => match payload {
                        Some(payload) => notify_inner.handle_notify(payload).await,
                        None => break,
                    },
                    _ = notify_sd_rx.recv() => break,
                }
            }
        });

        Self {
            inner,
            sweep_handle: Some(sweep_handle),
            notify_handle: Some(notify_handle),
            sweep_shutdown: Some(sweep_shutdown),
            notify_shutdown: Some(notify_shutdown),
        }
    }

    /// Ensure the device holds one subscription per configured service.
    ///
    /// Idempotent: a fully-subscribed device is a no-op; a partially
    /// subscribed one only gets the missing service kinds. Devices inside
    /// their backoff window are skipped.
    pub async fn subscribe_device(&self, address: &str, identity: &str) {
        self.inner.subscribe_device(address, identity).await;
    }

    /// Drop and best-effort cancel every subscription held by `address`.
    pub async fn unsubscribe_device(&self, address: &str) {
        self.inner.unsubscribe_device(address).await;
    }

    /// Whether the device holds a live subscription for every configured
    /// service kind.
    pub async fn is_fully_subscribed(&self, address: &str) -> bool {
        match self.inner.devices.get(address) {
            Some(slot) => self
                .inner
                .config
                .services
                .iter()
                .all(|s| slot.services.contains_key(s)),
            None => false,
        }
    }

    /// Snapshot of all live subscriptions.
    pub async fn subscriptions(&self) -> Vec<Subscription> {
        self.inner.subscriptions.read().await.values().cloned().collect()
    }

    /// Stop both background tasks, then best-effort UNSUBSCRIBE everything.
    ///
    /// Cleanup never blocks shutdown on unreachable devices: the transport
    /// carries its own deadline and treats unreachable as done.
    pub async fn stop(mut self) -> SubscriptionResult<()> {
        for tx in [self.sweep_shutdown.take(), self.notify_shutdown.take()]
            .into_iter()
            .flatten()
        {
            let _ = tx.send(()).await;
        }

        let mut join_error = None;
        for handle in [self.sweep_handle.take(), self.notify_handle.take()]
            .into_iter()
            .flatten()
        {
            match tokio::time::timeout(SHUTDOWN_JOIN_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    join_error
                        .get_or_insert_with(|| format!("manager task panicked: {e}"));
                }
                Err(_) => {
                    join_error.get_or_insert_with(|| "manager task shutdown timed out".to_string());
                }
            }
        }

        let drained: Vec<Subscription> = {
            let mut subs = self.inner.subscriptions.write().await;
            subs.drain().map(|(_, sub)| sub).collect()
        };
        for sub in drained {
            let endpoint = event_endpoint(&sub.device_address, sub.service);
            if let Err(e) = self.inner.transport.unsubscribe(&endpoint, &sub.sid).await {
                debug!(sid = %sub.sid, error = %e, "shutdown unsubscribe failed");
            }
        }
        self.inner.devices.clear();

        match join_error {
            Some(message) => Err(SubscriptionError::ShutdownError(message)),
            None => Ok(()),
        }
    }
}

impl<T: GenaTransport> Inner<T> {
    async fn subscribe_device(&self, address: &str, identity: &str) {
        let now = Instant::now();
        // Decide under the slot lock, subscribe after releasing it.
        let missing: Vec<Service> = {
            let mut slot = self
                .devices
                .entry(address.to_string())
                .or_insert_with(|| DeviceSubscriptionState::new(identity));
            if slot.backoff_active(now) {
                debug!(
                    address,
                    failures = slot.consecutive_failures,
                    "subscribe gated by backoff"
                );
                return;
            }
            let missing: Vec<Service> = self
                .config
                .services
                .iter()
                .copied()
                .filter(|service| !slot.services.contains_key(service))
                .collect();
            if !missing.is_empty() {
                slot.last_attempt = Some(now);
            }
            missing
        };

        if missing.is_empty() {
            debug!(address, "already fully subscribed");
            return;
        }

        let mut successes = 0usize;
        for service in missing {
            let endpoint = event_endpoint(address, service);
            let callback = self.urls.for_service(service.callback_suffix());
            match self
                .transport
                .subscribe(&endpoint, &callback, self.config.requested_timeout_seconds)
                .await
            {
                Ok(response) => {
                    let subscription = Subscription {
                        sid: response.sid.clone(),
                        device_address: address.to_string(),
                        device_identity: identity.to_string(),
                        service,
                        callback_url: callback,
                        timeout_seconds: response.timeout_seconds,
                        subscribed_at: Instant::now(),
                        renew_at: Instant::now()
                            + renewal_delay(
                                response.timeout_seconds,
                                self.config.renewal_buffer_seconds,
                            ),
                        last_seen_seq: None,
                    };
                    info!(address, ?service, sid = %response.sid, "subscribed");
                    self.subscriptions
                        .write()
                        .await
                        .insert(response.sid.clone(), subscription);
                    if let Some(mut slot) = self.devices.get_mut(address) {
                        slot.services.insert(service, response.sid);
                    }
                    successes += 1;
                }
                Err(e) => {
                    warn!(address, ?service, error = %e, "subscribe failed");
                }
            }
        }

        if let Some(mut slot) = self.devices.get_mut(address) {
            if successes == 0 {
                slot.consecutive_failures += 1;
                warn!(
                    address,
                    failures = slot.consecutive_failures,
                    "no subscriptions established"
                );
            } else {
                slot.consecutive_failures = 0;
            }
        }
    }

    async fn unsubscribe_device(&self, address: &str) {
        let Some((_, slot)) = self.devices.remove(address) else {
            return;
        };
        for (service, sid) in slot.services {
            self.subscriptions.write().await.remove(&sid);
            let endpoint = event_endpoint(address, service);
            if let Err(e) = self.transport.unsubscribe(&endpoint, &sid).await {
                debug!(address, sid, error = %e, "unsubscribe failed");
            }
        }
    }

    /// One pass of the renewal sweep: renew every subscription whose
    /// `renew_at` has passed.
    async fn renew_due(&self) {
        let now = Instant::now();
        let due: Vec<Subscription> = {
            let subs = self.subscriptions.read().await;
            subs.values()
                .filter(|sub| sub.renew_at <= now)
                .cloned()
                .collect()
        };

        for sub in due {
            let endpoint = event_endpoint(&sub.device_address, sub.service);
            match self
                .transport
                .renew(&endpoint, &sub.sid, sub.timeout_seconds)
                .await
            {
                Ok(granted) => {
                    let mut subs = self.subscriptions.write().await;
                    if let Some(live) = subs.get_mut(&sub.sid) {
                        live.timeout_seconds = granted;
                        live.renew_at = Instant::now()
                            + renewal_delay(granted, self.config.renewal_buffer_seconds);
                    }
                    debug!(sid = %sub.sid, granted, "renewed");
                }
                // The device forgot us: renewing again is pointless, a
                // fresh SUBSCRIBE is the fix.
                Err(GenaError::NotFound) => {
                    info!(sid = %sub.sid, address = %sub.device_address, "subscription gone; resubscribing");
                    self.remove_subscription(&sub.sid).await;
                    self.subscribe_device(&sub.device_address, &sub.device_identity)
                        .await;
                }
                Err(e) => {
                    warn!(sid = %sub.sid, address = %sub.device_address, error = %e, "renewal failed; retrying next sweep");
                }
            }
        }
    }

    async fn remove_subscription(&self, sid: &str) {
        let removed = self.subscriptions.write().await.remove(sid);
        if let Some(sub) = removed {
            if let Some(mut slot) = self.devices.get_mut(&sub.device_address) {
                slot.services.retain(|_, live_sid| live_sid != sid);
            }
        }
    }

    /// Apply one inbound NOTIFY.
    ///
    /// Unknown SIDs are dropped quietly (the device will stop sending once
    /// its subscription lapses). Sequence gaps are diagnostics, not errors:
    /// GENA delivery is not gap-free and the newest values still win.
    async fn handle_notify(&self, payload: NotifyPayload) {
        let (address, identity, service) = {
            let mut subs = self.subscriptions.write().await;
            let Some(sub) = subs.get_mut(&payload.sid) else {
                debug!(sid = %payload.sid, "NOTIFY for unknown subscription; dropped");
                return;
            };
            if let (Some(last), Some(seq)) = (sub.last_seen_seq, payload.seq) {
                if seq != last.wrapping_add(1) {
                    warn!(sid = %payload.sid, last, seq, "NOTIFY sequence gap; applying anyway");
                }
            }
            if payload.seq.is_some() {
                sub.last_seen_seq = payload.seq;
            }
            (
                sub.device_address.clone(),
                sub.device_identity.clone(),
                sub.service,
            )
        };

        if let Some(hint) = payload
            .service_hint
            .as_deref()
            .and_then(Service::from_callback_suffix)
        {
            if hint != service {
                debug!(sid = %payload.sid, ?hint, ?service, "callback path disagrees with subscription; trusting the subscription");
            }
        }

        match service {
            Service::AVTransport => self.apply_transport(&address, &identity, &payload.body),
            Service::RenderingControl => self.apply_rendering(&address, &identity, &payload.body),
            Service::ZoneGroupTopology => {
                // Topology events are an invalidation signal; the next
                // topology read refetches authoritative state.
                self.topology_cache.invalidate();
            }
            other => debug!(?other, "NOTIFY for unhandled service kind"),
        }
    }

    fn apply_transport(&self, address: &str, identity: &str, body: &str) {
        match events::parse_transport(body) {
            Ok(event) => {
                if !event.is_empty() {
                    self.state_cache.update_transport(address, identity, &event);
                }
            }
            Err(e) => {
                // Salvage the state flip from locally-malformed documents.
                if let Some(state) = fast::transport_state(body) {
                    let event = TransportEvent {
                        transport_state: Some(state),
                        ..Default::default()
                    };
                    self.state_cache.update_transport(address, identity, &event);
                } else {
                    warn!(address, error = %e, "undecodable transport NOTIFY");
                }
            }
        }
    }

    fn apply_rendering(&self, address: &str, identity: &str, body: &str) {
        // Volume and mute are the entire extraction for rendering events,
        // so the regex fast path answers most bodies without XML work.
        let event = match (fast::volume(body), fast::mute(body)) {
            (None, None) => match events::parse_rendering(body) {
                Ok(event) => event,
                Err(e) => {
                    warn!(address, error = %e, "undecodable rendering NOTIFY");
                    return;
                }
            },
            (volume, mute) => RenderingEvent { volume, mute },
        };
        self.state_cache.update_volume(address, identity, &event);
    }
}

fn event_endpoint(address: &str, service: Service) -> String {
    if address.contains(':') {
        format!("http://{address}{}", service.event_path())
    } else {
        format!("http://{address}:{DEVICE_PORT}{}", service.event_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gena::SubscribeResponse;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const ADDR: &str = "192.168.4.21";
    const UDN: &str = "RINCON_AA";

    #[derive(Default)]
    struct FakeGena {
        subscribe_calls: AtomicUsize,
        renew_calls: AtomicUsize,
        unsubscribe_calls: AtomicUsize,
        fail_all_subscribes: AtomicBool,
        fail_transport_subscribes: AtomicBool,
        renew_not_found: AtomicBool,
        next_sid: AtomicUsize,
    }

    #[async_trait]
    impl GenaTransport for FakeGena {
        async fn subscribe(
            &self,
            endpoint_url: &str,
            _callback_url: &str,
            timeout_seconds: u32,
        ) -> Result<SubscribeResponse, GenaError> {
            self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_all_subscribes.load(Ordering::SeqCst) {
                return Err(GenaError::Unreachable("refused".to_string()));
            }
            if self.fail_transport_subscribes.load(Ordering::SeqCst)
                && endpoint_url.contains("AVTransport")
            {
                return Err(GenaError::Unreachable("refused".to_string()));
            }
            let n = self.next_sid.fetch_add(1, Ordering::SeqCst);
            Ok(SubscribeResponse {
                sid: format!("uuid:sub-{n}"),
                timeout_seconds,
            })
        }

        async fn renew(
            &self,
            _endpoint_url: &str,
            _sid: &str,
            timeout_seconds: u32,
        ) -> Result<u32, GenaError> {
            self.renew_calls.fetch_add(1, Ordering::SeqCst);
            if self.renew_not_found.load(Ordering::SeqCst) {
                return Err(GenaError::NotFound);
            }
            Ok(timeout_seconds)
        }

        async fn unsubscribe(&self, _endpoint_url: &str, _sid: &str) -> Result<(), GenaError> {
            self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Fixture {
        manager: SubscriptionManager<FakeGena>,
        transport: Arc<FakeGena>,
        state_cache: Arc<StateCache>,
        topology_cache: Arc<TopologyCache>,
        _notify_tx: mpsc::UnboundedSender<NotifyPayload>,
    }

    fn fixture() -> Fixture {
        let transport = Arc::new(FakeGena::default());
        let state_cache = Arc::new(StateCache::new(Duration::from_secs(60)));
        let topology_cache = Arc::new(TopologyCache::new(Duration::from_secs(60)));
        let (tx, rx) = mpsc::unbounded_channel();
        let urls = test_urls();
        let manager = SubscriptionManager::start(
            Arc::clone(&transport),
            urls,
            Arc::clone(&state_cache),
            Arc::clone(&topology_cache),
            SubscriptionConfig::default(),
            rx,
        );
        Fixture {
            manager,
            transport,
            state_cache,
            topology_cache,
            _notify_tx: tx,
        }
    }

    fn test_urls() -> CallbackUrls {
        CallbackUrls::new("http://192.168.4.2:3400", "testtoken")
    }

    fn transport_notify(sid: &str, seq: u32, state: &str) -> NotifyPayload {
        let last_change = format!(
            r#"<Event xmlns="urn:schemas-upnp-org:metadata-1-0/AVT/"><InstanceID val="0"><TransportState val="{state}"/><CurrentTrackURI val="x-sonos-http:song"/></InstanceID></Event>"#
        );
        NotifyPayload {
            sid: sid.to_string(),
            seq: Some(seq),
            service_hint: Some("transport".to_string()),
            body: format!(
                r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"><e:property><LastChange>{}</LastChange></e:property></e:propertyset>"#,
                maestro_parser::xml::escape(&last_change)
            ),
        }
    }

    fn rendering_notify(sid: &str, seq: u32, volume: u8) -> NotifyPayload {
        let last_change = format!(
            r#"<Event xmlns="urn:schemas-upnp-org:metadata-1-0/RCS/"><InstanceID val="0"><Volume channel="Master" val="{volume}"/><Mute channel="Master" val="0"/></InstanceID></Event>"#
        );
        NotifyPayload {
            sid: sid.to_string(),
            seq: Some(seq),
            service_hint: Some("rendering".to_string()),
            body: format!(
                r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"><e:property><LastChange>{}</LastChange></e:property></e:propertyset>"#,
                maestro_parser::xml::escape(&last_change)
            ),
        }
    }

    async fn sid_for(manager: &SubscriptionManager<FakeGena>, service: Service) -> String {
        manager
            .subscriptions()
            .await
            .into_iter()
            .find(|s| s.service == service)
            .map(|s| s.sid)
            .expect("subscription for service")
    }

    #[tokio::test]
    async fn subscribe_device_is_idempotent() {
        let f = fixture();
        f.manager.subscribe_device(ADDR, UDN).await;
        assert_eq!(f.transport.subscribe_calls.load(Ordering::SeqCst), 3);
        assert!(f.manager.is_fully_subscribed(ADDR).await);

        f.manager.subscribe_device(ADDR, UDN).await;
        assert_eq!(
            f.transport.subscribe_calls.load(Ordering::SeqCst),
            3,
            "second subscribe for a fully-subscribed device must be a no-op"
        );
    }

    #[tokio::test]
    async fn partial_subscribe_fills_only_missing_services() {
        let f = fixture();
        f.transport.fail_transport_subscribes.store(true, Ordering::SeqCst);
        f.manager.subscribe_device(ADDR, UDN).await;
        assert_eq!(f.transport.subscribe_calls.load(Ordering::SeqCst), 3);
        assert!(!f.manager.is_fully_subscribed(ADDR).await);
        assert_eq!(f.manager.subscriptions().await.len(), 2);

        // One success means no backoff; the retry attempts only AVTransport.
        f.transport.fail_transport_subscribes.store(false, Ordering::SeqCst);
        f.manager.subscribe_device(ADDR, UDN).await;
        assert_eq!(f.transport.subscribe_calls.load(Ordering::SeqCst), 4);
        assert!(f.manager.is_fully_subscribed(ADDR).await);
    }

    #[tokio::test]
    async fn fully_failed_subscribe_gates_the_next_attempt() {
        let f = fixture();
        f.transport.fail_all_subscribes.store(true, Ordering::SeqCst);
        f.manager.subscribe_device(ADDR, UDN).await;
        assert_eq!(f.transport.subscribe_calls.load(Ordering::SeqCst), 3);

        // Still inside the backoff window: not a single SUBSCRIBE goes out.
        f.transport.fail_all_subscribes.store(false, Ordering::SeqCst);
        f.manager.subscribe_device(ADDR, UDN).await;
        assert_eq!(f.transport.subscribe_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn renewal_updates_renew_at() {
        let f = fixture();
        f.manager.subscribe_device(ADDR, UDN).await;
        let sid = sid_for(&f.manager, Service::AVTransport).await;

        {
            let mut subs = f.manager.inner.subscriptions.write().await;
            subs.get_mut(&sid).unwrap().renew_at = Instant::now() - Duration::from_secs(1);
        }
        f.manager.inner.renew_due().await;

        assert_eq!(f.transport.renew_calls.load(Ordering::SeqCst), 1);
        let renewed = f
            .manager
            .subscriptions()
            .await
            .into_iter()
            .find(|s| s.sid == sid)
            .unwrap();
        assert!(renewed.renew_at > Instant::now());
    }

    #[tokio::test]
    async fn renewal_not_found_triggers_resubscribe() {
        let f = fixture();
        f.manager.subscribe_device(ADDR, UDN).await;
        let sid = sid_for(&f.manager, Service::AVTransport).await;
        let calls_before = f.transport.subscribe_calls.load(Ordering::SeqCst);

        f.transport.renew_not_found.store(true, Ordering::SeqCst);
        {
            let mut subs = f.manager.inner.subscriptions.write().await;
            subs.get_mut(&sid).unwrap().renew_at = Instant::now() - Duration::from_secs(1);
        }
        f.manager.inner.renew_due().await;

        // The dead subscription was replaced by a fresh SUBSCRIBE, not a
        // renew retry.
        assert_eq!(
            f.transport.subscribe_calls.load(Ordering::SeqCst),
            calls_before + 1
        );
        assert!(f.manager.is_fully_subscribed(ADDR).await);
        let replacement = sid_for(&f.manager, Service::AVTransport).await;
        assert_ne!(replacement, sid);
    }

    #[tokio::test]
    async fn notify_events_merge_into_one_device_state() {
        let f = fixture();
        f.manager.subscribe_device(ADDR, UDN).await;
        let avt_sid = sid_for(&f.manager, Service::AVTransport).await;
        let rcs_sid = sid_for(&f.manager, Service::RenderingControl).await;

        f.manager
            .inner
            .handle_notify(transport_notify(&avt_sid, 0, "PLAYING"))
            .await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        f.manager
            .inner
            .handle_notify(rendering_notify(&rcs_sid, 0, 41))
            .await;

        let state = f.state_cache.get(ADDR).expect("cached state");
        assert_eq!(state.transport_state, "PLAYING");
        assert_eq!(state.current_track_uri, "x-sonos-http:song");
        assert_eq!(state.volume, Some(41));
        assert_eq!(state.muted, Some(false));
        let transport_at = state.transport_updated_at.unwrap();
        let volume_at = state.volume_updated_at.unwrap();
        assert!(volume_at > transport_at);
    }

    #[tokio::test]
    async fn sequence_gaps_are_applied_anyway() {
        let f = fixture();
        f.manager.subscribe_device(ADDR, UDN).await;
        let sid = sid_for(&f.manager, Service::AVTransport).await;

        f.manager
            .inner
            .handle_notify(transport_notify(&sid, 5, "PLAYING"))
            .await;
        f.manager
            .inner
            .handle_notify(transport_notify(&sid, 7, "PAUSED_PLAYBACK"))
            .await;

        let state = f.state_cache.get(ADDR).unwrap();
        assert_eq!(state.transport_state, "PAUSED_PLAYBACK");
        let sub = f
            .manager
            .subscriptions()
            .await
            .into_iter()
            .find(|s| s.sid == sid)
            .unwrap();
        assert_eq!(sub.last_seen_seq, Some(7));
    }

    #[tokio::test]
    async fn unknown_sid_is_dropped() {
        let f = fixture();
        f.manager
            .inner
            .handle_notify(transport_notify("uuid:stranger", 0, "PLAYING"))
            .await;
        assert!(f.state_cache.get(ADDR).is_none());
    }

    #[tokio::test]
    async fn topology_notify_invalidates_cache() {
        let f = fixture();
        f.manager.subscribe_device(ADDR, UDN).await;
        let sid = sid_for(&f.manager, Service::ZoneGroupTopology).await;

        f.topology_cache
            .set(maestro_parser::topology::ZoneGroupState::default());
        assert!(f.topology_cache.get().is_some());

        let payload = NotifyPayload {
            sid,
            seq: Some(0),
            service_hint: Some("topology".to_string()),
            body: r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"><e:property><ZoneGroupState>&lt;ZoneGroupState/&gt;</ZoneGroupState></e:property></e:propertyset>"#.to_string(),
        };
        f.manager.inner.handle_notify(payload).await;
        assert!(f.topology_cache.get().is_none());
    }

    #[tokio::test]
    async fn stop_unsubscribes_everything() {
        let f = fixture();
        f.manager.subscribe_device(ADDR, UDN).await;
        assert_eq!(f.manager.subscriptions().await.len(), 3);

        f.manager.stop().await.unwrap();
        assert_eq!(f.transport.unsubscribe_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unsubscribe_device_clears_tables() {
        let f = fixture();
        f.manager.subscribe_device(ADDR, UDN).await;
        f.manager.unsubscribe_device(ADDR).await;

        assert_eq!(f.transport.unsubscribe_calls.load(Ordering::SeqCst), 3);
        assert!(f.manager.subscriptions().await.is_empty());
        assert!(!f.manager.is_fully_subscribed(ADDR).await);
    }
}
