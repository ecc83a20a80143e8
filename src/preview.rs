//! The preview workflow: temporarily apply the draft automation to the real
//! lights so the user can see it, then put everything back.
//!
//! One run moves through `Computing -> Applying -> Holding -> Restoring` and
//! back to `Idle`. Runs are independent and must not overlap; the stage
//! channel lets the UI disable the trigger while a run is in flight. Callers
//! should drive `run_preview` on its own task so that tearing down the
//! triggering UI does not strand lights in the held state.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use futures::future::{BoxFuture, join_all};
use itertools::Itertools;
use serde_json::Value;
use tokio::sync::watch;

use hue::api::LightStateUpdate;
use hue::color::clamp_mired;
use hue::scale::percent_to_bri;

use crate::bridge::BridgeCommands;
use crate::error::{ApiError, ApiResult};
use crate::model::{AutomationConfig, ColorMode, Light, LightGroupCatalog};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PreviewStage {
    #[default]
    Idle,
    Computing,
    Applying,
    Holding,
    Restoring,
}

/// Snapshot taken before the trial state goes out; consumed once by restore.
pub struct PreviewSession {
    pub affected: Vec<Light>,
    /// The bridge's native state payload per light, captured for exact
    /// restoration. `None` when the snapshot fetch failed.
    pub raw_state_by_id: HashMap<String, Option<Value>>,
    /// Coarse (on, brightness-percent) fallback per light.
    pub original_on_brightness: HashMap<String, (bool, u8)>,
    pub source: AutomationConfig,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PreviewReport {
    pub affected: usize,
    /// Writes that failed during apply or restore. Partial success is fine;
    /// the UI can surface this as a note.
    pub failed_writes: usize,
}

pub struct PreviewEngine<B> {
    bridge: B,
    dwell: Duration,
    stage: watch::Sender<PreviewStage>,
}

impl<B: BridgeCommands> PreviewEngine<B> {
    pub fn new(bridge: B, dwell: Duration) -> Self {
        Self {
            bridge,
            dwell,
            stage: watch::Sender::new(PreviewStage::Idle),
        }
    }

    #[must_use]
    pub fn stage(&self) -> watch::Receiver<PreviewStage> {
        self.stage.subscribe()
    }

    fn set_stage(&self, stage: PreviewStage) {
        self.stage.send_replace(stage);
    }

    /// Resolve the lights a preview of `config` would touch.
    ///
    /// Explicit light ids win; group expansion only kicks in when no light is
    /// individually selected. `require_on` filters to lights currently on —
    /// previews themselves pass `false`, since demonstrating an automation
    /// must be able to turn on a light that is off.
    pub fn compute_affected(
        config: &AutomationConfig,
        catalog: &LightGroupCatalog,
        require_on: bool,
    ) -> ApiResult<Vec<Light>> {
        let ids: BTreeSet<String> = if config.light_ids.is_empty() {
            if config.group_ids.is_empty() {
                return Err(ApiError::NoTargets);
            }
            config
                .group_ids
                .iter()
                .flat_map(|group_id| catalog.resolve_group_members(group_id))
                .collect()
        } else {
            config.light_ids.clone()
        };

        Ok(ids
            .iter()
            .filter_map(|id| catalog.find_light(id))
            .filter(|light| !require_on || light.on)
            .cloned()
            .collect())
    }

    /// Run one full preview: snapshot, apply, hold, restore.
    pub async fn run_preview(
        &self,
        config: &AutomationConfig,
        catalog: &LightGroupCatalog,
    ) -> ApiResult<PreviewReport> {
        self.set_stage(PreviewStage::Computing);

        let affected = match Self::compute_affected(config, catalog, false) {
            Ok(affected) if !affected.is_empty() => affected,
            Ok(_) => {
                self.set_stage(PreviewStage::Idle);
                return Err(ApiError::NoTargets);
            }
            Err(err) => {
                self.set_stage(PreviewStage::Idle);
                return Err(err);
            }
        };

        // Snapshot every target before touching anything.
        let raw_state_by_id: HashMap<String, Option<Value>> =
            join_all(affected.iter().map(|light| async move {
                (light.id.clone(), self.bridge.raw_state(&light.id).await)
            }))
            .await
            .into_iter()
            .collect();

        let original_on_brightness = affected
            .iter()
            .map(|light| (light.id.clone(), (light.on, light.brightness_percent)))
            .collect();

        let session = PreviewSession {
            affected,
            raw_state_by_id,
            original_on_brightness,
            source: config.clone(),
        };

        self.set_stage(PreviewStage::Applying);
        let mut failed_writes = self.apply(&session.affected, config, catalog).await;

        self.set_stage(PreviewStage::Holding);
        tokio::time::sleep(self.dwell).await;

        self.set_stage(PreviewStage::Restoring);
        failed_writes += self.restore(&session).await;

        self.set_stage(PreviewStage::Idle);

        Ok(PreviewReport {
            affected: session.affected.len(),
            failed_writes,
        })
    }

    /// Push the trial state to every affected light, collapsing fully-covered
    /// explicit groups into single group-level writes.
    ///
    /// Greedy, largest group first. This assumes a group action is
    /// observably identical to writing each member light — vendor firmware
    /// behavior that has held up so far but is not guaranteed; restore never
    /// relies on it and always writes per-light.
    async fn apply(
        &self,
        affected: &[Light],
        config: &AutomationConfig,
        catalog: &LightGroupCatalog,
    ) -> usize {
        let mut unclaimed: BTreeSet<&str> = affected.iter().map(|l| l.id.as_str()).collect();
        let mut group_writes: Vec<(String, LightStateUpdate)> = vec![];

        for group in config
            .group_ids
            .iter()
            .filter_map(|id| catalog.find_group(id))
            .sorted_by_key(|group| std::cmp::Reverse(group.member_light_ids.len()))
        {
            if group.member_light_ids.is_empty() {
                continue;
            }
            let fully_covered = group
                .member_light_ids
                .iter()
                .all(|member| unclaimed.contains(member.as_str()));
            if fully_covered {
                for member in &group.member_light_ids {
                    unclaimed.remove(member.as_str());
                }
                // capabilities are per-light; at group level the bridge
                // applies what each member supports
                group_writes.push((group.id.clone(), target_update(config, true, true)));
            }
        }

        let light_writes: Vec<(String, LightStateUpdate)> = affected
            .iter()
            .filter(|light| unclaimed.contains(light.id.as_str()))
            .map(|light| {
                (
                    light.id.clone(),
                    target_update(
                        config,
                        light.supports_color,
                        light.supports_color_temperature,
                    ),
                )
            })
            .collect();

        let mut writes: Vec<BoxFuture<(String, ApiResult<()>)>> = vec![];
        for (id, upd) in &group_writes {
            writes.push(Box::pin(async move {
                (
                    format!("group {id}"),
                    self.bridge.set_group_action(id, upd).await,
                )
            }));
        }
        for (id, upd) in &light_writes {
            writes.push(Box::pin(async move {
                (
                    format!("light {id}"),
                    self.bridge.set_light_state(id, upd).await,
                )
            }));
        }

        tally_failures("apply", join_all(writes).await)
    }

    /// Put every affected light back. Raw snapshots replay verbatim; lights
    /// without one fall back to coarse on/brightness restoration. Per-light
    /// independent and best-effort.
    async fn restore(&self, session: &PreviewSession) -> usize {
        let writes = session.affected.iter().map(|light| async move {
            let raw = session
                .raw_state_by_id
                .get(&light.id)
                .and_then(Option::as_ref);

            let upd = match raw.and_then(LightStateUpdate::from_raw) {
                Some(upd) => upd,
                None => {
                    let (on, percent) = session
                        .original_on_brightness
                        .get(&light.id)
                        .copied()
                        .unwrap_or((light.on, light.brightness_percent));
                    let upd = LightStateUpdate::default().on(on);
                    if on {
                        upd.with_bri(percent_to_bri(percent))
                    } else {
                        upd
                    }
                }
            };

            (
                format!("light {}", light.id),
                self.bridge.set_light_state(&light.id, &upd).await,
            )
        });

        tally_failures("restore", join_all(writes).await)
    }
}

fn tally_failures(phase: &str, results: Vec<(String, ApiResult<()>)>) -> usize {
    let mut failed = 0;
    for (target, result) in results {
        if let Err(err) = result {
            log::warn!("Preview {phase} write to {target} failed: {err}");
            failed += 1;
        }
    }
    failed
}

/// The trial state for one target, honoring the color mode and the target's
/// capabilities. Targets lacking the needed capability degrade to
/// brightness-only (product decision carried over from the companion app).
fn target_update(
    config: &AutomationConfig,
    supports_color: bool,
    supports_color_temperature: bool,
) -> LightStateUpdate {
    let upd = LightStateUpdate::default()
        .on(true)
        .with_bri(percent_to_bri(config.brightness_percent));

    let color = match config.color_mode {
        ColorMode::CustomColor => Some(config.color_argb),
        ColorMode::Scene if !config.scene_preview_argb.is_unset() => {
            Some(config.scene_preview_argb)
        }
        ColorMode::Scene | ColorMode::CustomWhite => None,
    };

    if let Some(argb) = color {
        if supports_color {
            let (hue, sat) = argb.to_hue_sat();
            return upd.with_hue_sat(hue, sat);
        }
        log::debug!("Target lacks color support, falling back to brightness-only");
        return upd;
    }

    if config.color_mode == ColorMode::CustomWhite {
        if supports_color_temperature {
            return upd.with_ct(clamp_mired(config.color_temperature_mired));
        }
        log::debug!("Target lacks color temperature support, falling back to brightness-only");
    }

    upd
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::model::catalog::tests::{catalog, group, light};

    /// In-memory bridge: stores one raw state object per light, applies
    /// updates field-wise, and records every write.
    #[derive(Default)]
    struct FakeBridge {
        states: Mutex<HashMap<String, Value>>,
        writes: Mutex<Vec<String>>,
        fail_lights: HashSet<String>,
        group_members: HashMap<String, Vec<String>>,
        raw_unavailable: bool,
    }

    impl FakeBridge {
        fn with_state(mut self, id: &str, state: Value) -> Self {
            self.states.get_mut().unwrap().insert(id.to_string(), state);
            self
        }

        fn state(&self, id: &str) -> Value {
            self.states.lock().unwrap().get(id).cloned().unwrap()
        }

        fn writes(&self) -> Vec<String> {
            self.writes.lock().unwrap().clone()
        }

        fn merge(state: &mut Value, upd: &LightStateUpdate) {
            let obj = state.as_object_mut().unwrap();
            if let Some(on) = upd.on {
                obj.insert("on".into(), json!(on));
            }
            if let Some(bri) = upd.bri {
                obj.insert("bri".into(), json!(bri));
            }
            if let Some(hue) = upd.hue {
                obj.insert("hue".into(), json!(hue));
            }
            if let Some(sat) = upd.sat {
                obj.insert("sat".into(), json!(sat));
            }
            if let Some(ct) = upd.ct {
                obj.insert("ct".into(), json!(ct));
            }
            if let Some(xy) = upd.xy {
                obj.insert("xy".into(), json!(xy));
            }
        }
    }

    #[async_trait]
    impl BridgeCommands for FakeBridge {
        async fn raw_state(&self, light_id: &str) -> Option<Value> {
            if self.raw_unavailable {
                return None;
            }
            self.states.lock().unwrap().get(light_id).cloned()
        }

        async fn set_light_state(
            &self,
            light_id: &str,
            upd: &LightStateUpdate,
        ) -> ApiResult<()> {
            self.writes.lock().unwrap().push(format!("light:{light_id}"));
            if self.fail_lights.contains(light_id) {
                return Err(ApiError::Protocol {
                    typ: 901,
                    description: "internal error".to_string(),
                });
            }
            let mut states = self.states.lock().unwrap();
            if let Some(state) = states.get_mut(light_id) {
                Self::merge(state, upd);
            }
            Ok(())
        }

        async fn set_group_action(
            &self,
            group_id: &str,
            upd: &LightStateUpdate,
        ) -> ApiResult<()> {
            self.writes.lock().unwrap().push(format!("group:{group_id}"));
            let members = self.group_members.get(group_id).cloned().unwrap_or_default();
            let mut states = self.states.lock().unwrap();
            for member in members {
                if let Some(state) = states.get_mut(&member) {
                    Self::merge(state, upd);
                }
            }
            Ok(())
        }
    }

    fn config_with_lights(ids: &[&str]) -> AutomationConfig {
        let mut config = AutomationConfig::default();
        config.light_ids = ids.iter().map(ToString::to_string).collect();
        config.color_mode = ColorMode::CustomColor;
        config.brightness_percent = 80;
        config
    }

    #[test]
    fn affected_prefers_explicit_lights_over_groups() {
        let cat = catalog(
            vec![light("1", true, 50), light("2", false, 0)],
            vec![group("g1", &["1", "2"])],
        );

        let mut config = config_with_lights(&["1"]);
        config.group_ids.insert("g1".to_string());

        let affected =
            PreviewEngine::<FakeBridge>::compute_affected(&config, &cat, false).unwrap();
        assert_eq!(affected.len(), 1);
        assert_eq!(affected[0].id, "1");
    }

    #[test]
    fn affected_expands_groups_when_no_lights_selected() {
        let cat = catalog(
            vec![light("1", true, 50), light("2", false, 0)],
            vec![group("g1", &["1", "2"])],
        );

        let mut config = AutomationConfig::default();
        config.group_ids.insert("g1".to_string());

        let affected =
            PreviewEngine::<FakeBridge>::compute_affected(&config, &cat, false).unwrap();
        assert_eq!(affected.len(), 2);
    }

    #[test]
    fn affected_empty_selection_is_no_targets() {
        let cat = catalog(vec![], vec![]);
        let config = AutomationConfig::default();

        let result = PreviewEngine::<FakeBridge>::compute_affected(&config, &cat, false);
        assert!(matches!(result, Err(ApiError::NoTargets)));
    }

    #[test]
    fn require_on_filters_to_lit_lights() {
        let cat = catalog(vec![light("1", true, 50), light("2", false, 0)], vec![]);
        let config = config_with_lights(&["1", "2"]);

        let on_only =
            PreviewEngine::<FakeBridge>::compute_affected(&config, &cat, true).unwrap();
        assert_eq!(on_only.len(), 1);
        assert_eq!(on_only[0].id, "1");

        let all = PreviewEngine::<FakeBridge>::compute_affected(&config, &cat, false).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn preview_turns_light_on_then_restores_off() {
        let bridge = FakeBridge::default().with_state(
            "1",
            json!({ "on": false, "bri": 50, "colormode": "ct", "ct": 366 }),
        );

        let cat = catalog(vec![light("1", false, 19)], vec![]);
        let config = config_with_lights(&["1"]);

        let engine = PreviewEngine::new(bridge, Duration::ZERO);
        let report = engine.run_preview(&config, &cat).await.unwrap();

        assert_eq!(report.affected, 1);
        assert_eq!(report.failed_writes, 0);

        // restored exactly: off again, original brightness and temperature
        let state = engine.bridge.state("1");
        assert_eq!(state["on"], json!(false));
        assert_eq!(state["bri"], json!(50));
        assert_eq!(state["ct"], json!(366));
        // two writes to the light: the trial state and the restore
        assert_eq!(engine.bridge.writes(), vec!["light:1", "light:1"]);
    }

    #[tokio::test]
    async fn fully_covered_group_collapses_to_one_write() {
        let mut bridge = FakeBridge::default()
            .with_state("1", json!({ "on": true, "bri": 100 }))
            .with_state("2", json!({ "on": true, "bri": 100 }))
            .with_state("3", json!({ "on": true, "bri": 100 }));
        bridge.group_members.insert(
            "g1".to_string(),
            vec!["1".to_string(), "2".to_string()],
        );

        let cat = catalog(
            vec![
                light("1", true, 39),
                light("2", true, 39),
                light("3", true, 39),
            ],
            vec![group("g1", &["1", "2"])],
        );

        let mut config = config_with_lights(&["1", "2", "3"]);
        config.group_ids.insert("g1".to_string());

        let engine = PreviewEngine::new(bridge, Duration::ZERO);
        let report = engine.run_preview(&config, &cat).await.unwrap();
        assert_eq!(report.failed_writes, 0);

        let writes = engine.bridge.writes();
        // apply: one group write plus the uncovered light
        assert_eq!(&writes[..2], &["group:g1", "light:3"]);
        // restore is always per-light
        assert_eq!(writes[2..].len(), 3);
        assert!(writes[2..].iter().all(|w| w.starts_with("light:")));
    }

    #[tokio::test]
    async fn failing_write_does_not_cancel_siblings() {
        let mut bridge = FakeBridge::default()
            .with_state("1", json!({ "on": true, "bri": 100 }))
            .with_state("2", json!({ "on": true, "bri": 100 }));
        bridge.fail_lights.insert("2".to_string());

        let cat = catalog(vec![light("1", true, 39), light("2", true, 39)], vec![]);
        let config = config_with_lights(&["1", "2"]);

        let engine = PreviewEngine::new(bridge, Duration::ZERO);
        let report = engine.run_preview(&config, &cat).await.unwrap();

        // light 2 fails on apply and on restore; light 1 is unaffected
        assert_eq!(report.failed_writes, 2);
        let state = engine.bridge.state("1");
        assert_eq!(state["on"], json!(true));
        assert_eq!(state["bri"], json!(100));
    }

    #[tokio::test]
    async fn missing_raw_snapshot_falls_back_to_coarse_restore() {
        let bridge = FakeBridge {
            raw_unavailable: true,
            ..FakeBridge::default()
        }
        .with_state("1", json!({ "on": true, "bri": 200, "ct": 250 }));

        let cat = catalog(vec![light("1", true, 78)], vec![]);
        let config = config_with_lights(&["1"]);

        let engine = PreviewEngine::new(bridge, Duration::ZERO);
        engine.run_preview(&config, &cat).await.unwrap();

        let state = engine.bridge.state("1");
        assert_eq!(state["on"], json!(true));
        // 78% re-encoded, within one percent of the original 200
        assert_eq!(state["bri"], json!(percent_to_bri(78)));
    }

    #[tokio::test]
    async fn custom_white_sets_clamped_temperature() {
        let bridge = FakeBridge::default().with_state("1", json!({ "on": true, "bri": 100 }));
        let cat = catalog(vec![light("1", true, 39)], vec![]);

        let mut config = config_with_lights(&["1"]);
        config.color_mode = ColorMode::CustomWhite;
        config.color_temperature_mired = 9999;

        let engine = PreviewEngine::new(bridge, Duration::ZERO);

        // peek at the held state by checking the update builder directly
        let upd = target_update(&config, true, true);
        assert_eq!(upd.ct, Some(hue::color::MIRED_MAX));
        assert_eq!(upd.hue, None);

        engine.run_preview(&config, &cat).await.unwrap();
    }

    #[test]
    fn capability_fallback_degrades_to_brightness_only() {
        let mut config = config_with_lights(&["1"]);
        config.color_mode = ColorMode::CustomColor;

        let upd = target_update(&config, false, false);
        assert_eq!(upd.on, Some(true));
        assert!(upd.bri.is_some());
        assert_eq!(upd.hue, None);
        assert_eq!(upd.ct, None);
    }

    #[test]
    fn scene_mode_uses_preview_color_when_set() {
        let mut config = config_with_lights(&["1"]);
        config.color_mode = ColorMode::Scene;

        let upd = target_update(&config, true, true);
        assert_eq!(upd.hue, None, "no preview color means brightness-only");

        config.scene_preview_argb = hue::color::Argb(0xFFFF_0000);
        let upd = target_update(&config, true, true);
        assert_eq!(upd.hue, Some(0));
        assert_eq!(upd.sat, Some(254));
    }

    #[tokio::test]
    async fn stage_returns_to_idle_after_run() {
        let bridge = FakeBridge::default().with_state("1", json!({ "on": true, "bri": 100 }));
        let cat = catalog(vec![light("1", true, 39)], vec![]);
        let config = config_with_lights(&["1"]);

        let engine = PreviewEngine::new(bridge, Duration::ZERO);
        let stage = engine.stage();
        assert_eq!(*stage.borrow(), PreviewStage::Idle);

        engine.run_preview(&config, &cat).await.unwrap();
        assert_eq!(*stage.borrow(), PreviewStage::Idle);

        let err = engine
            .run_preview(&AutomationConfig::default(), &cat)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NoTargets));
        assert_eq!(*stage.borrow(), PreviewStage::Idle);
    }
}
