//! Zone-group topology model.
//!
//! `GetZoneGroupState` and ZoneGroupTopology events both carry a
//! `ZoneGroupState` document describing every playback group, its
//! coordinator, and the members (including invisible bonded players and
//! home-theater satellites).

use serde::{Deserialize, Serialize};

use crate::error::ParseResult;
use crate::xml;

/// Snapshot of the fleet's group topology.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ZoneGroupState {
    pub groups: Vec<ZoneGroup>,
}

/// One playback group: a coordinator plus zero or more joined members.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneGroup {
    pub id: String,
    pub coordinator: String,
    pub members: Vec<ZoneMember>,
}

/// A device within a group.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneMember {
    /// Stable device identity (RINCON UDN)
    pub identity: String,
    pub name: String,
    /// Current network address, extracted from the device's Location URL
    pub address: String,
    pub is_coordinator: bool,
    pub is_visible: bool,
    pub is_satellite: bool,
    pub is_subwoofer: bool,
    /// Home-theater channel maps imply a TV/optical input on the member
    pub has_av_input: bool,
}

impl ZoneGroupState {
    /// Parse the `ZoneGroupState` XML document.
    pub fn from_xml(raw: &str) -> ParseResult<Self> {
        let doc: RawZoneGroupState = xml::parse(raw)?;
        let groups = doc
            .zone_groups
            .groups
            .into_iter()
            .map(RawZoneGroup::into_group)
            .collect();
        Ok(Self { groups })
    }

    /// Coordinators of all visible groups, as `(identity, address)` pairs.
    pub fn coordinators(&self) -> Vec<(&str, &str)> {
        self.groups
            .iter()
            .filter_map(|g| {
                g.members
                    .iter()
                    .find(|m| m.is_coordinator && m.is_visible)
                    .map(|m| (m.identity.as_str(), m.address.as_str()))
            })
            .collect()
    }

    /// Look up the member carrying `identity` across all groups.
    pub fn find_member(&self, identity: &str) -> Option<&ZoneMember> {
        self.groups
            .iter()
            .flat_map(|g| g.members.iter())
            .find(|m| m.identity == identity)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename = "ZoneGroupState")]
struct RawZoneGroupState {
    #[serde(rename = "ZoneGroups", default)]
    zone_groups: RawZoneGroups,
}

#[derive(Debug, Default, Deserialize)]
struct RawZoneGroups {
    #[serde(rename = "ZoneGroup", default)]
    groups: Vec<RawZoneGroup>,
}

#[derive(Debug, Deserialize)]
struct RawZoneGroup {
    #[serde(rename = "@ID", default)]
    id: String,
    #[serde(rename = "@Coordinator", default)]
    coordinator: String,
    #[serde(rename = "ZoneGroupMember", default)]
    members: Vec<RawMember>,
}

#[derive(Debug, Deserialize)]
struct RawMember {
    #[serde(rename = "@UUID", default)]
    uuid: String,
    #[serde(rename = "@ZoneName", default)]
    zone_name: String,
    #[serde(rename = "@Location", default)]
    location: String,
    #[serde(rename = "@Invisible", default)]
    invisible: Option<String>,
    #[serde(rename = "@HTSatChanMapSet", default)]
    ht_sat_chan_map: Option<String>,
    #[serde(rename = "Satellite", default)]
    satellites: Vec<RawSatellite>,
}

#[derive(Debug, Deserialize)]
struct RawSatellite {
    #[serde(rename = "@UUID", default)]
    uuid: String,
    #[serde(rename = "@ZoneName", default)]
    zone_name: String,
    #[serde(rename = "@Location", default)]
    location: String,
    #[serde(rename = "@Invisible", default)]
    invisible: Option<String>,
    #[serde(rename = "@HTSatChanMapSet", default)]
    ht_sat_chan_map: Option<String>,
}

impl RawZoneGroup {
    fn into_group(self) -> ZoneGroup {
        let coordinator = self.coordinator;
        let mut members = Vec::new();
        for raw in self.members {
            let is_coordinator = raw.uuid == coordinator;
            for sat in &raw.satellites {
                members.push(ZoneMember {
                    identity: sat.uuid.clone(),
                    name: sat.zone_name.clone(),
                    address: host_of(&sat.location),
                    is_coordinator: false,
                    is_visible: !flag(&sat.invisible),
                    is_satellite: true,
                    is_subwoofer: is_subwoofer(&sat.ht_sat_chan_map, &sat.uuid),
                    has_av_input: false,
                });
            }
            members.push(ZoneMember {
                identity: raw.uuid.clone(),
                name: raw.zone_name,
                address: host_of(&raw.location),
                is_coordinator,
                is_visible: !flag(&raw.invisible),
                is_satellite: false,
                is_subwoofer: false,
                has_av_input: raw.ht_sat_chan_map.is_some(),
            });
        }
        ZoneGroup {
            id: self.id,
            coordinator,
            members,
        }
    }
}

fn flag(attr: &Option<String>) -> bool {
    attr.as_deref() == Some("1")
}

/// A satellite whose channel map assigns it the `SW` role is a subwoofer.
fn is_subwoofer(map: &Option<String>, uuid: &str) -> bool {
    let Some(map) = map else { return false };
    map.split(';')
        .any(|entry| entry.starts_with(uuid) && entry.ends_with(":SW"))
}

/// Extract the host from a Location URL like
/// `http://192.168.4.21:1400/xml/device_description.xml`.
fn host_of(location: &str) -> String {
    let rest = location
        .strip_prefix("http://")
        .or_else(|| location.strip_prefix("https://"))
        .unwrap_or(location);
    rest.split(['/', ':'])
        .next()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPOLOGY: &str = r#"<ZoneGroupState><ZoneGroups>
        <ZoneGroup Coordinator="RINCON_AA" ID="RINCON_AA:12">
            <ZoneGroupMember UUID="RINCON_AA" Location="http://192.168.4.21:1400/xml/device_description.xml" ZoneName="Living Room" HTSatChanMapSet="RINCON_AA:LF,RF">
                <Satellite UUID="RINCON_SW" Location="http://192.168.4.24:1400/xml/device_description.xml" ZoneName="Living Room" Invisible="1" HTSatChanMapSet="RINCON_SW:SW"/>
            </ZoneGroupMember>
            <ZoneGroupMember UUID="RINCON_BB" Location="http://192.168.4.22:1400/xml/device_description.xml" ZoneName="Kitchen"/>
        </ZoneGroup>
        <ZoneGroup Coordinator="RINCON_CC" ID="RINCON_CC:7">
            <ZoneGroupMember UUID="RINCON_CC" Location="http://192.168.4.23:1400/xml/device_description.xml" ZoneName="Office"/>
        </ZoneGroup>
    </ZoneGroups></ZoneGroupState>"#;

    #[test]
    fn parses_groups_and_members() {
        let state = ZoneGroupState::from_xml(TOPOLOGY).unwrap();
        assert_eq!(state.groups.len(), 2);

        let living = &state.groups[0];
        assert_eq!(living.coordinator, "RINCON_AA");
        assert_eq!(living.members.len(), 3);

        let coordinator = living.members.iter().find(|m| m.is_coordinator).unwrap();
        assert_eq!(coordinator.identity, "RINCON_AA");
        assert_eq!(coordinator.address, "192.168.4.21");
        assert!(coordinator.has_av_input);
        assert!(coordinator.is_visible);
    }

    #[test]
    fn classifies_satellites_and_subwoofers() {
        let state = ZoneGroupState::from_xml(TOPOLOGY).unwrap();
        let sw = state.find_member("RINCON_SW").unwrap();
        assert!(sw.is_satellite);
        assert!(sw.is_subwoofer);
        assert!(!sw.is_visible);
        assert_eq!(sw.address, "192.168.4.24");
    }

    #[test]
    fn lists_visible_coordinators() {
        let state = ZoneGroupState::from_xml(TOPOLOGY).unwrap();
        let coordinators = state.coordinators();
        assert_eq!(
            coordinators,
            vec![
                ("RINCON_AA", "192.168.4.21"),
                ("RINCON_CC", "192.168.4.23"),
            ]
        );
    }

    #[test]
    fn empty_document_parses() {
        let state = ZoneGroupState::from_xml("<ZoneGroupState></ZoneGroupState>").unwrap();
        assert!(state.groups.is_empty());
    }
}
