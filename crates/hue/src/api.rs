use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(rename = "type")]
    pub typ: u32,
    #[serde(default)]
    pub address: String,
    pub description: String,
}

/// One entry of the success/error array the v1 api wraps every reply in.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HueApiResult<T> {
    Success(T),
    Error(ApiErrorDetail),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewUser {
    pub devicetype: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewUserReply {
    pub username: String,
}

/// One candidate from `https://discovery.meethue.com/`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiscoveryEndpoint {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "internalipaddress")]
    pub internal_ip_address: String,
}

fn default_bri() -> u8 {
    crate::DEFAULT_BRI_RAW
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LightState {
    pub on: bool,
    #[serde(default = "default_bri")]
    pub bri: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hue: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sat: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ct: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xy: Option<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colormode: Option<String>,
    #[serde(default)]
    pub reachable: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LightReply {
    pub state: LightState,
    pub name: String,
    #[serde(rename = "type", default)]
    pub light_type: String,
    #[serde(default)]
    pub modelid: String,
    #[serde(default)]
    pub manufacturername: String,
}

impl LightReply {
    /// Whether the light accepts hue/sat (or xy) color commands.
    ///
    /// The v1 api has no dedicated capability flag; color support shows up as
    /// hue/sat fields in the state and a "color" product type.
    #[must_use]
    pub fn supports_color(&self) -> bool {
        self.state.hue.is_some()
            || self.state.xy.is_some()
            || self.light_type.to_ascii_lowercase().contains("color light")
    }

    #[must_use]
    pub fn supports_color_temperature(&self) -> bool {
        self.state.ct.is_some()
            || self
                .light_type
                .to_ascii_lowercase()
                .contains("temperature light")
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum GroupType {
    Room,
    Zone,
    #[default]
    LightGroup,
    Entertainment,
    #[serde(other)]
    Other,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GroupAction {
    #[serde(default)]
    pub on: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bri: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hue: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sat: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ct: Option<u16>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroupReply {
    pub name: String,
    #[serde(default)]
    pub lights: Vec<String>,
    #[serde(rename = "type", default)]
    pub group_type: GroupType,
    #[serde(default)]
    pub action: GroupAction,
}

/// PUT body for `/lights/<id>/state`.
///
/// Also the PUT body for `/groups/<id>/action` — the v1 api accepts the same
/// fields on both endpoints.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LightStateUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bri: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hue: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sat: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ct: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xy: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transitiontime: Option<u16>,
}

impl LightStateUpdate {
    #[must_use]
    pub fn on(self, on: bool) -> Self {
        Self {
            on: Some(on),
            ..self
        }
    }

    #[must_use]
    pub fn with_bri(self, bri: u8) -> Self {
        Self {
            bri: Some(bri),
            ..self
        }
    }

    #[must_use]
    pub fn with_hue_sat(self, hue: u16, sat: u8) -> Self {
        Self {
            hue: Some(hue),
            sat: Some(sat),
            ..self
        }
    }

    #[must_use]
    pub fn with_ct(self, ct: u16) -> Self {
        Self {
            ct: Some(ct),
            ..self
        }
    }

    /// Rebuild a state update from a raw `/lights/<id>` state payload, for
    /// exact restoration after a preview.
    ///
    /// Read-only members (`colormode`, `reachable`, ..) are not writable, so
    /// only the settable fields are carried over. When the payload names a
    /// colormode, color fields belonging to the other modes are dropped:
    /// replaying all of them would let the bridge's own precedence pick the
    /// final color instead of the one the light was actually in.
    #[must_use]
    pub fn from_raw(raw: &Value) -> Option<Self> {
        let state: LightState = serde_json::from_value(raw.clone()).ok()?;

        let mut upd = Self {
            on: Some(state.on),
            bri: Some(state.bri),
            hue: state.hue,
            sat: state.sat,
            ct: state.ct,
            xy: state.xy,
            transitiontime: None,
        };

        match state.colormode.as_deref() {
            Some("xy") => {
                upd.hue = None;
                upd.sat = None;
                upd.ct = None;
            }
            Some("hs") => {
                upd.xy = None;
                upd.ct = None;
            }
            Some("ct") => {
                upd.hue = None;
                upd.sat = None;
                upd.xy = None;
            }
            _ => {}
        }

        Some(upd)
    }
}

pub type LightsReply = BTreeMap<String, LightReply>;
pub type GroupsReply = BTreeMap<String, GroupReply>;
