//! TTL-scoped, event-populated device state cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::trace;

use maestro_parser::{RenderingEvent, TransportEvent};

use crate::device_state::{DeviceState, StateSource};

/// Counters exposed for observability.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Concurrent map of device address → [`DeviceState`], guarded by a single
/// reader/writer lock. Reads hand out defensive copies; writers merge
/// field-by-field.
pub struct StateCache {
    entries: RwLock<HashMap<String, DeviceState>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl StateCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn is_fresh(&self, state: &DeviceState, now: Instant) -> bool {
        state
            .updated_at
            .is_some_and(|t| now.duration_since(t) <= self.ttl)
    }

    /// Copy of the entry for `address`, only while it is fresh.
    pub fn get(&self, address: &str) -> Option<DeviceState> {
        let now = Instant::now();
        let entries = self.entries.read();
        match entries.get(address) {
            Some(state) if self.is_fresh(state, now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(state.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Freshness-scoped lookup by stable device identity.
    pub fn get_by_udn(&self, identity: &str) -> Option<DeviceState> {
        let now = Instant::now();
        let entries = self.entries.read();
        match entries
            .values()
            .find(|s| s.identity == identity)
            .filter(|s| self.is_fresh(s, now))
        {
            Some(state) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(state.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Merge a transport event into the entry for `address`, creating it on
    /// first write.
    ///
    /// The master freshness timestamp advances only when the event carried
    /// an actual transport state; position-only and metadata-only fragments
    /// must not make a stale transport reading look current.
    pub fn update_transport(&self, address: &str, identity: &str, event: &TransportEvent) {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let state = entries
            .entry(address.to_string())
            .or_insert_with(|| DeviceState::new(address, identity));

        merge(&mut state.transport_status, &event.transport_status);
        merge(&mut state.current_track_uri, &event.current_track_uri);
        merge(&mut state.track_metadata, &event.track_metadata);
        merge(&mut state.track_duration, &event.track_duration);
        merge(&mut state.relative_time, &event.relative_time);
        merge(&mut state.container_uri, &event.av_transport_uri);
        merge(&mut state.container_metadata, &event.av_transport_metadata);

        if let Some(transport_state) = &event.transport_state {
            state.transport_state = transport_state.clone();
            state.source = StateSource::Event;
            state.updated_at = Some(now);
            state.transport_updated_at = Some(now);
        } else {
            trace!(address, "transport fragment without state; freshness unchanged");
        }
    }

    /// Merge a rendering event into the entry for `address`, creating it on
    /// first write. Carrying either a volume or a mute value refreshes the
    /// entry.
    pub fn update_volume(&self, address: &str, identity: &str, event: &RenderingEvent) {
        if event.volume.is_none() && event.mute.is_none() {
            return;
        }
        let now = Instant::now();
        let mut entries = self.entries.write();
        let state = entries
            .entry(address.to_string())
            .or_insert_with(|| DeviceState::new(address, identity));

        if let Some(volume) = event.volume {
            state.volume = Some(volume);
        }
        if let Some(muted) = event.mute {
            state.muted = Some(muted);
        }
        state.source = StateSource::Event;
        state.updated_at = Some(now);
        state.volume_updated_at = Some(now);
    }

    /// Drop every entry whose freshness has lapsed. Run on a slow timer to
    /// bound memory on large fleets.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, state| self.is_fresh(state, now));
        before - entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.read().len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

fn merge(target: &mut String, incoming: &Option<String>) {
    if let Some(value) = incoming {
        if !value.is_empty() {
            target.clone_from(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "192.168.4.21";
    const UDN: &str = "RINCON_AA";

    fn transport_event(state: Option<&str>) -> TransportEvent {
        TransportEvent {
            transport_state: state.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn get_returns_fresh_entry_copy() {
        let cache = StateCache::new(Duration::from_secs(60));
        cache.update_transport(ADDR, UDN, &transport_event(Some("PLAYING")));

        let state = cache.get(ADDR).unwrap();
        assert_eq!(state.transport_state, "PLAYING");
        assert_eq!(state.identity, UDN);
        assert!(state.age().unwrap() < Duration::from_secs(1));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn stale_entry_is_a_miss() {
        let cache = StateCache::new(Duration::ZERO);
        cache.update_transport(ADDR, UDN, &transport_event(Some("PLAYING")));
        std::thread::sleep(Duration::from_millis(5));

        assert!(cache.get(ADDR).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn position_only_update_never_refreshes_empty_transport() {
        let cache = StateCache::new(Duration::from_secs(60));
        let fragment = TransportEvent {
            relative_time: Some("0:01:02".to_string()),
            ..Default::default()
        };
        cache.update_transport(ADDR, UDN, &fragment);

        // The fragment was merged but the entry is not fresh.
        assert!(cache.get(ADDR).is_none());

        // A real transport state makes it fresh, and the earlier fragment
        // is still there.
        cache.update_transport(ADDR, UDN, &transport_event(Some("PLAYING")));
        let state = cache.get(ADDR).unwrap();
        assert_eq!(state.relative_time, "0:01:02");
        assert_eq!(state.transport_state, "PLAYING");
    }

    #[test]
    fn partial_update_leaves_absent_fields_untouched() {
        let cache = StateCache::new(Duration::from_secs(60));
        let full = TransportEvent {
            transport_state: Some("PLAYING".to_string()),
            current_track_uri: Some("x-sonos-http:song".to_string()),
            track_duration: Some("0:03:00".to_string()),
            ..Default::default()
        };
        cache.update_transport(ADDR, UDN, &full);

        cache.update_transport(ADDR, UDN, &transport_event(Some("PAUSED_PLAYBACK")));
        let state = cache.get(ADDR).unwrap();
        assert_eq!(state.transport_state, "PAUSED_PLAYBACK");
        assert_eq!(state.current_track_uri, "x-sonos-http:song");
        assert_eq!(state.track_duration, "0:03:00");
    }

    #[test]
    fn volume_and_transport_timestamps_advance_independently() {
        let cache = StateCache::new(Duration::from_secs(60));
        cache.update_transport(ADDR, UDN, &transport_event(Some("PLAYING")));
        std::thread::sleep(Duration::from_millis(5));
        cache.update_volume(
            ADDR,
            UDN,
            &RenderingEvent {
                volume: Some(31),
                mute: Some(false),
            },
        );

        let state = cache.get(ADDR).unwrap();
        assert_eq!(state.volume, Some(31));
        assert_eq!(state.muted, Some(false));
        assert_eq!(state.transport_state, "PLAYING");
        let transport_at = state.transport_updated_at.unwrap();
        let volume_at = state.volume_updated_at.unwrap();
        assert!(volume_at > transport_at);
        assert_eq!(state.updated_at, Some(volume_at));
    }

    #[test]
    fn empty_rendering_event_does_not_refresh() {
        let cache = StateCache::new(Duration::from_secs(60));
        cache.update_volume(ADDR, UDN, &RenderingEvent::default());
        assert!(cache.get(ADDR).is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn get_by_udn_scans_identities() {
        let cache = StateCache::new(Duration::from_secs(60));
        cache.update_transport(ADDR, UDN, &transport_event(Some("PLAYING")));
        assert!(cache.get_by_udn(UDN).is_some());
        assert!(cache.get_by_udn("RINCON_ZZ").is_none());
    }

    #[test]
    fn prune_drops_lapsed_entries() {
        let cache = StateCache::new(Duration::ZERO);
        cache.update_transport(ADDR, UDN, &transport_event(Some("PLAYING")));
        cache.update_transport("192.168.4.22", "RINCON_BB", &transport_event(Some("STOPPED")));
        std::thread::sleep(Duration::from_millis(5));

        assert_eq!(cache.prune(), 2);
        assert_eq!(cache.stats().entries, 0);
    }
}
