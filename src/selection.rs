//! Selection state for the draft automation.
//!
//! Two related but distinct notions of "selected group" live here:
//!
//! - the *explicit* set (`AutomationConfig::group_ids`), written by the group
//!   toggle and read by the preview engine's group-write optimization;
//! - the *displayed* set (`checked_groups`), derived from light membership
//!   alone, which shows a group as checked as soon as any member light is
//!   selected (partial selection).
//!
//! The group list checkbox renders `checked_groups`; the group-detail toggle
//! writes through `toggle_group`. Keeping the two apart is load-bearing.

use std::collections::BTreeSet;

use crate::model::{AutomationConfig, LightGroupCatalog};

/// Select or deselect a whole group. Cascades to its member lights in both
/// directions: selecting adds all members, deselecting removes all members.
pub fn toggle_group(
    config: &mut AutomationConfig,
    catalog: &LightGroupCatalog,
    group_id: &str,
    selected: bool,
) {
    let members = catalog.resolve_group_members(group_id);

    if selected {
        config.group_ids.insert(group_id.to_string());
        config.light_ids.extend(members);
    } else {
        config.group_ids.remove(group_id);
        for member in &members {
            config.light_ids.remove(member);
        }
        // removing this group's lights may have emptied *other* explicit
        // groups that overlapped with it
        prune_empty_groups(config, catalog);
    }
}

/// Select or deselect one light. Never touches the explicit group set
/// directly; instead the cleanup pass drops any explicit group left with no
/// selected members.
pub fn toggle_light(
    config: &mut AutomationConfig,
    catalog: &LightGroupCatalog,
    light_id: &str,
    selected: bool,
) {
    if selected {
        config.light_ids.insert(light_id.to_string());
    } else {
        config.light_ids.remove(light_id);
    }

    prune_empty_groups(config, catalog);
}

/// Drop explicit group selections whose member set no longer intersects the
/// selected lights. Idempotent; also re-run when leaving a group detail view.
///
/// Groups unknown to the catalog are kept: a stale catalog snapshot must not
/// silently erase a selection made against a fresher one.
pub fn prune_empty_groups(config: &mut AutomationConfig, catalog: &LightGroupCatalog) {
    let light_ids = &config.light_ids;
    config.group_ids.retain(|group_id| {
        catalog.find_group(group_id).is_none_or(|group| {
            group
                .member_light_ids
                .iter()
                .any(|member| light_ids.contains(member))
        })
    });
}

/// The display-only checked set: a group shows as checked when *any* member
/// light is selected, regardless of the explicit group set.
#[must_use]
pub fn checked_groups(
    catalog: &LightGroupCatalog,
    light_ids: &BTreeSet<String>,
) -> BTreeSet<String> {
    catalog
        .groups()
        .iter()
        .filter(|group| {
            group
                .member_light_ids
                .iter()
                .any(|member| light_ids.contains(member))
        })
        .map(|group| group.id.clone())
        .collect()
}
