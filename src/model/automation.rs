use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use hue::color::Argb;

/// How the automation colors its targets.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum ColorMode {
    /// Recall a bridge scene; previews use `scene_preview_argb` when set.
    #[default]
    Scene,
    /// Explicit color from the companion app's color wheel.
    CustomColor,
    /// Tunable white via color temperature.
    CustomWhite,
}

fn default_brightness() -> u8 {
    100
}

fn default_color() -> Argb {
    Argb::WHITE
}

fn default_mired() -> u16 {
    366
}

/// The draft automation being edited on the companion device.
///
/// Serialized as-is to the settings file and mirrored to the wearable;
/// fields missing from older files take the stated defaults.
///
/// Invariant: every id in `group_ids` names a group with at least one member
/// in `light_ids` (see `selection::prune_empty_groups`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationConfig {
    #[serde(default)]
    pub light_ids: BTreeSet<String>,
    #[serde(default)]
    pub group_ids: BTreeSet<String>,
    #[serde(default = "default_brightness")]
    pub brightness_percent: u8,
    #[serde(default = "default_color")]
    pub color_argb: Argb,
    #[serde(default = "default_mired")]
    pub color_temperature_mired: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<String>,
    #[serde(default)]
    pub color_mode: ColorMode,
    #[serde(default)]
    pub scene_preview_argb: Argb,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            light_ids: BTreeSet::new(),
            group_ids: BTreeSet::new(),
            brightness_percent: default_brightness(),
            color_argb: default_color(),
            color_temperature_mired: default_mired(),
            scene_id: None,
            color_mode: ColorMode::default(),
            scene_preview_argb: Argb::default(),
        }
    }
}
