use std::collections::BTreeSet;

use hue::api::{GroupReply, GroupType, LightReply};
use hue::scale::bri_to_percent;

use crate::bridge::BridgeClient;
use crate::error::ApiResult;

/// One light as decoded from the bridge; immutable per catalog snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Light {
    pub id: String,
    pub name: String,
    pub on: bool,
    pub brightness_percent: u8,
    pub supports_color: bool,
    pub supports_color_temperature: bool,
}

impl Light {
    #[must_use]
    pub fn from_reply(id: String, reply: &LightReply) -> Self {
        Self {
            supports_color: reply.supports_color(),
            supports_color_temperature: reply.supports_color_temperature(),
            name: reply.name.clone(),
            on: reply.state.on,
            brightness_percent: bri_to_percent(reply.state.bri),
            id,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GroupKind {
    Room,
    Zone,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub kind: GroupKind,
    /// Member light ids in bridge order.
    pub member_light_ids: Vec<String>,
    pub average_brightness_percent: Option<u8>,
}

impl Group {
    /// Decode a group reply; groups that are neither rooms nor zones
    /// (entertainment areas, legacy luminaires) are not selectable targets.
    #[must_use]
    pub fn from_reply(id: String, reply: &GroupReply) -> Option<Self> {
        let kind = match reply.group_type {
            GroupType::Room => GroupKind::Room,
            GroupType::Zone => GroupKind::Zone,
            GroupType::LightGroup | GroupType::Entertainment | GroupType::Other => return None,
        };

        Some(Self {
            name: reply.name.clone(),
            kind,
            member_light_ids: reply.lights.clone(),
            average_brightness_percent: reply.action.bri.map(bri_to_percent),
            id,
        })
    }
}

/// In-memory snapshot of the bridge's lights and groups.
///
/// `refresh` replaces both collections at once: if either fetch fails, the
/// previous snapshot stays in place, so readers never observe a half-updated
/// catalog.
#[derive(Clone, Debug, Default)]
pub struct LightGroupCatalog {
    lights: Vec<Light>,
    groups: Vec<Group>,
}

impl LightGroupCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn refresh(&mut self, client: &BridgeClient) -> ApiResult<()> {
        let lights = client.fetch_lights().await?;
        let groups = client.fetch_groups().await?;
        self.replace(lights, groups);
        Ok(())
    }

    pub fn replace(&mut self, lights: Vec<Light>, groups: Vec<Group>) {
        self.lights = lights;
        self.groups = groups;
    }

    #[must_use]
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    #[must_use]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    #[must_use]
    pub fn find_light(&self, id: &str) -> Option<&Light> {
        self.lights.iter().find(|light| light.id == id)
    }

    #[must_use]
    pub fn find_group(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|group| group.id == id)
    }

    /// Member light ids of a group; empty for unknown groups.
    #[must_use]
    pub fn resolve_group_members(&self, group_id: &str) -> BTreeSet<String> {
        self.find_group(group_id)
            .map(|group| group.member_light_ids.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use serde_json::json;

    use super::*;

    pub(crate) fn light(id: &str, on: bool, percent: u8) -> Light {
        Light {
            id: id.to_string(),
            name: format!("Light {id}"),
            on,
            brightness_percent: percent,
            supports_color: true,
            supports_color_temperature: true,
        }
    }

    pub(crate) fn group(id: &str, members: &[&str]) -> Group {
        Group {
            id: id.to_string(),
            name: format!("Room {id}"),
            kind: GroupKind::Room,
            member_light_ids: members.iter().map(ToString::to_string).collect(),
            average_brightness_percent: None,
        }
    }

    pub(crate) fn catalog(lights: Vec<Light>, groups: Vec<Group>) -> LightGroupCatalog {
        let mut cat = LightGroupCatalog::new();
        cat.replace(lights, groups);
        cat
    }

    #[test]
    fn light_decodes_brightness_to_percent() {
        let reply: LightReply = serde_json::from_value(json!({
            "state": { "on": true, "bri": 254, "reachable": true },
            "name": "Desk",
            "type": "Dimmable light",
        }))
        .unwrap();

        let light = Light::from_reply("1".to_string(), &reply);
        assert_eq!(light.brightness_percent, 100);
        assert!(!light.supports_color);
    }

    #[test]
    fn non_room_groups_are_skipped() {
        let reply: GroupReply = serde_json::from_value(json!({
            "name": "Screen sync",
            "lights": ["1"],
            "type": "Entertainment",
        }))
        .unwrap();
        assert!(Group::from_reply("200".to_string(), &reply).is_none());

        let reply: GroupReply = serde_json::from_value(json!({
            "name": "Office",
            "lights": ["1", "2"],
            "type": "Room",
            "action": { "on": true, "bri": 127 },
        }))
        .unwrap();
        let group = Group::from_reply("3".to_string(), &reply).unwrap();
        assert_eq!(group.kind, GroupKind::Room);
        assert_eq!(group.average_brightness_percent, Some(50));
    }

    #[test]
    fn lookups_return_none_for_unknown_ids() {
        let cat = catalog(vec![light("1", true, 50)], vec![group("g1", &["1"])]);

        assert!(cat.find_light("1").is_some());
        assert!(cat.find_light("99").is_none());
        assert!(cat.find_group("g1").is_some());
        assert!(cat.find_group("nope").is_none());
        assert!(cat.resolve_group_members("nope").is_empty());
        assert_eq!(cat.resolve_group_members("g1").len(), 1);
    }
}
