//! Device identity → network address resolution.
//!
//! Device identities (RINCON UDNs) are stable; addresses drift with DHCP.
//! The registry is fed by discovery and by every topology capture, and is
//! the one place the rest of the system turns an identity into an address.

use std::collections::HashMap;

use parking_lot::RwLock;

use maestro_parser::topology::ZoneGroupState;

/// Resolve a stable device identity to its current network address.
pub trait DeviceResolver: Send + Sync {
    fn resolve(&self, identity: &str) -> Option<String>;
}

/// In-memory identity↔address table.
#[derive(Default)]
pub struct DeviceRegistry {
    addresses: RwLock<HashMap<String, String>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or refresh) a device's current address.
    pub fn upsert(&self, identity: &str, address: &str) {
        self.addresses
            .write()
            .insert(identity.to_string(), address.to_string());
    }

    /// Absorb every member of a topology capture.
    pub fn update_from_topology(&self, topology: &ZoneGroupState) {
        let mut addresses = self.addresses.write();
        for group in &topology.groups {
            for member in &group.members {
                if !member.address.is_empty() {
                    addresses.insert(member.identity.clone(), member.address.clone());
                }
            }
        }
    }

    /// Reverse lookup: the identity currently living at `address`.
    pub fn identity_of(&self, address: &str) -> Option<String> {
        self.addresses
            .read()
            .iter()
            .find(|(_, a)| a.as_str() == address)
            .map(|(identity, _)| identity.clone())
    }

    /// Any known device address; used to pick a fleet entry point for
    /// fleet-wide queries like topology and favorites.
    pub fn any_address(&self) -> Option<String> {
        self.addresses.read().values().next().cloned()
    }

    pub fn len(&self) -> usize {
        self.addresses.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.read().is_empty()
    }
}

impl DeviceResolver for DeviceRegistry {
    fn resolve(&self, identity: &str) -> Option<String> {
        self.addresses.read().get(identity).cloned()
    }
}
