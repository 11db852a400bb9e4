//! Three-way metadata merge (§4.D), grounded field-for-field on
//! `metadata_merger.py`'s `MetadataMerger`: pure, immutable, no event
//! emission (that's the use case's job).

use crate::domain::game_mode::GameMode;
use crate::domain::judgement::Judgement;
use crate::domain::metadata::{field, RecordingMetadata};
use crate::domain::rate::Rate;
use crate::domain::result::{BattleOrSalmonResult, BattleResult, SalmonResult};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Default, Clone, Copy)]
pub struct MetadataMerger;

fn is_result_field(name: &str) -> bool {
    field::BATTLE_RESULT_FIELDS.contains(&name) || field::SALMON_RESULT_FIELDS.contains(&name)
}

/// Applies whichever of the recognized base fields are present in `updates`
/// onto `current`, tolerating unparseable values by leaving that field
/// untouched. Returns the fields that were actually applied.
fn parse_base_field_updates(current: &RecordingMetadata, updates: &BTreeMap<String, String>) -> (RecordingMetadata, HashSet<String>) {
    let mut merged = current.clone();
    let mut applied = HashSet::new();

    if let Some(value) = updates.get(field::GAME_MODE) {
        if let Some(mode) = GameMode::parse(value) {
            merged.game_mode = mode;
            applied.insert(field::GAME_MODE.to_string());
        }
    }
    if let Some(value) = updates.get(field::STARTED_AT) {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
            merged.started_at = Some(parsed.with_timezone(&Utc));
            applied.insert(field::STARTED_AT.to_string());
        }
    }
    if let Some(value) = updates.get(field::RATE) {
        if let Ok(rate) = Rate::create(value) {
            merged.rate = Some(rate);
            applied.insert(field::RATE.to_string());
        }
    }
    if let Some(value) = updates.get(field::JUDGEMENT) {
        merged.judgement = Some(Judgement::parse(value));
        applied.insert(field::JUDGEMENT.to_string());
    }
    if let Some(value) = updates.get(field::ALLIES) {
        if let Ok(labels) = value.split(',').map(str::to_string).collect::<Vec<_>>().try_into() {
            merged.allies = Some(labels);
            applied.insert(field::ALLIES.to_string());
        }
    }
    if let Some(value) = updates.get(field::ENEMIES) {
        if let Ok(labels) = value.split(',').map(str::to_string).collect::<Vec<_>>().try_into() {
            merged.enemies = Some(labels);
            applied.insert(field::ENEMIES.to_string());
        }
    }

    (merged, applied)
}

/// Constructs a `result` object from `updates` when none exists yet and the
/// full set of required fields for one variant is present.
fn apply_result_updates(metadata: &RecordingMetadata, updates: &BTreeMap<String, String>) -> (RecordingMetadata, HashSet<String>) {
    if metadata.result.is_some() {
        return (metadata.clone(), HashSet::new());
    }

    let has_battle = field::BATTLE_RESULT_FIELDS.iter().all(|f| updates.contains_key(*f));
    if has_battle {
        if let Ok(result) = BattleResult::from_dict(updates) {
            let mut merged = metadata.clone();
            merged.result = Some(BattleOrSalmonResult::Battle(result));
            return (merged, field::BATTLE_RESULT_FIELDS.iter().map(|s| s.to_string()).collect());
        }
    }

    let has_salmon = field::SALMON_RESULT_FIELDS.iter().all(|f| updates.contains_key(*f));
    if has_salmon {
        if let Ok(result) = SalmonResult::from_dict(updates) {
            let mut merged = metadata.clone();
            merged.result = Some(BattleOrSalmonResult::Salmon(result));
            return (merged, field::SALMON_RESULT_FIELDS.iter().map(|s| s.to_string()).collect());
        }
    }

    (metadata.clone(), HashSet::new())
}

impl MetadataMerger {
    /// Applies a batch of manual edits. Returns the updated metadata and the
    /// set of field names that were actually applied (to be unioned into the
    /// context's accumulated `manual_fields`).
    pub fn apply_manual_updates(&self, current: &RecordingMetadata, updates: &BTreeMap<String, String>) -> (RecordingMetadata, HashSet<String>) {
        let (updated, mut applied) = parse_base_field_updates(current, updates);
        let (updated, result_fields) = apply_result_updates(&updated, updates);
        applied.extend(result_fields);
        (updated, applied)
    }

    /// Applies manual result-subfield edits received before any result had
    /// been recognized, now that one has appeared. Only fields not already
    /// claimed as manual are eligible (§4.D "pending result updates").
    pub fn apply_pending_result_updates(
        &self,
        current: &RecordingMetadata,
        pending_updates: &BTreeMap<String, String>,
        manual_fields: &HashSet<String>,
    ) -> (RecordingMetadata, HashSet<String>) {
        if current.result.is_none() || pending_updates.is_empty() {
            return (current.clone(), HashSet::new());
        }

        let filtered: BTreeMap<String, String> = pending_updates
            .iter()
            .filter(|(key, _)| !manual_fields.contains(key.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if filtered.is_empty() {
            return (current.clone(), HashSet::new());
        }

        let (updated, applied) = parse_base_field_updates(current, &filtered);
        let result_fields: HashSet<String> = applied.into_iter().filter(|f| is_result_field(f)).collect();
        (updated, result_fields)
    }

    /// Three-way merges `auto_update` into `current`, taking `base` as the
    /// common ancestor and protecting any field named in `manual_fields`.
    pub fn merge_with_auto_update(
        &self,
        base: &RecordingMetadata,
        auto_update: &RecordingMetadata,
        current: &RecordingMetadata,
        manual_fields: &HashSet<String>,
    ) -> RecordingMetadata {
        let merged = merge_basic_fields(base, auto_update, current, manual_fields);
        merge_result(base, auto_update, &merged, manual_fields)
    }

    /// Overwrites `updated` with `current`'s values for every field named in
    /// `manual_fields`, protecting manual edits from an automatic pass that
    /// ran after they were made.
    pub fn apply_manual_overrides(&self, current: &RecordingMetadata, updated: &RecordingMetadata, manual_fields: &HashSet<String>) -> RecordingMetadata {
        if manual_fields.is_empty() {
            return updated.clone();
        }

        let mut merged = updated.clone();
        if manual_fields.contains(field::GAME_MODE) {
            merged.game_mode = current.game_mode;
        }
        if manual_fields.contains(field::STARTED_AT) {
            merged.started_at = current.started_at;
        }
        if manual_fields.contains(field::RATE) {
            merged.rate = current.rate;
        }
        if manual_fields.contains(field::JUDGEMENT) {
            merged.judgement = current.judgement;
        }
        if manual_fields.contains(field::ALLIES) {
            merged.allies = current.allies.clone();
        }
        if manual_fields.contains(field::ENEMIES) {
            merged.enemies = current.enemies.clone();
        }

        let touches_result = manual_fields.iter().any(|f| is_result_field(f));
        if touches_result {
            merged.result = apply_manual_result_overrides(current.result, updated.result, manual_fields);
        }

        merged
    }
}

fn merge_basic_fields(base: &RecordingMetadata, auto_update: &RecordingMetadata, current: &RecordingMetadata, manual_fields: &HashSet<String>) -> RecordingMetadata {
    let mut merged = current.clone();

    if !manual_fields.contains(field::GAME_MODE) && auto_update.game_mode != base.game_mode && current.game_mode == base.game_mode {
        merged.game_mode = auto_update.game_mode;
    }
    if !manual_fields.contains(field::STARTED_AT) && auto_update.started_at != base.started_at && current.started_at == base.started_at {
        merged.started_at = auto_update.started_at;
    }
    if !manual_fields.contains(field::RATE) && auto_update.rate != base.rate && current.rate == base.rate {
        merged.rate = auto_update.rate;
    }
    if !manual_fields.contains(field::JUDGEMENT) && auto_update.judgement != base.judgement && current.judgement == base.judgement {
        merged.judgement = auto_update.judgement;
    }
    if !manual_fields.contains(field::ALLIES) && auto_update.allies != base.allies && current.allies == base.allies {
        merged.allies = auto_update.allies.clone();
    }
    if !manual_fields.contains(field::ENEMIES) && auto_update.enemies != base.enemies && current.enemies == base.enemies {
        merged.enemies = auto_update.enemies.clone();
    }

    merged
}

fn merge_result(base: &RecordingMetadata, auto_update: &RecordingMetadata, current: &RecordingMetadata, manual_fields: &HashSet<String>) -> RecordingMetadata {
    if auto_update.result == base.result {
        return current.clone();
    }
    if current.result == base.result {
        let mut merged = current.clone();
        merged.result = auto_update.result;
        return merged;
    }

    match (&base.result, &auto_update.result, &current.result) {
        (
            Some(BattleOrSalmonResult::Battle(base_r)),
            Some(BattleOrSalmonResult::Battle(auto_r)),
            Some(BattleOrSalmonResult::Battle(current_r)),
        ) => {
            let mut merged = current.clone();
            merged.result = Some(BattleOrSalmonResult::Battle(merge_battle_result(base_r, auto_r, current_r, manual_fields)));
            merged
        }
        (
            Some(BattleOrSalmonResult::Salmon(base_r)),
            Some(BattleOrSalmonResult::Salmon(auto_r)),
            Some(BattleOrSalmonResult::Salmon(current_r)),
        ) => {
            let mut merged = current.clone();
            merged.result = Some(BattleOrSalmonResult::Salmon(merge_salmon_result(base_r, auto_r, current_r, manual_fields)));
            merged
        }
        _ => current.clone(),
    }
}

fn merge_battle_result(base: &BattleResult, auto_update: &BattleResult, current: &BattleResult, manual_fields: &HashSet<String>) -> BattleResult {
    let mut merged = *current;
    if !manual_fields.contains("match") && auto_update.match_kind != base.match_kind && current.match_kind == base.match_kind {
        merged.match_kind = auto_update.match_kind;
    }
    if !manual_fields.contains("rule") && auto_update.rule != base.rule && current.rule == base.rule {
        merged.rule = auto_update.rule;
    }
    if !manual_fields.contains("stage") && auto_update.stage != base.stage && current.stage == base.stage {
        merged.stage = auto_update.stage;
    }
    if !manual_fields.contains("kill") && auto_update.kill != base.kill && current.kill == base.kill {
        merged.kill = auto_update.kill;
    }
    if !manual_fields.contains("death") && auto_update.death != base.death && current.death == base.death {
        merged.death = auto_update.death;
    }
    if !manual_fields.contains("special") && auto_update.special != base.special && current.special == base.special {
        merged.special = auto_update.special;
    }
    merged
}

fn merge_salmon_result(base: &SalmonResult, auto_update: &SalmonResult, current: &SalmonResult, manual_fields: &HashSet<String>) -> SalmonResult {
    let mut merged = *current;
    if !manual_fields.contains("hazard") && auto_update.hazard != base.hazard && current.hazard == base.hazard {
        merged.hazard = auto_update.hazard;
    }
    if !manual_fields.contains("stage") && auto_update.stage != base.stage && current.stage == base.stage {
        merged.stage = auto_update.stage;
    }
    if !manual_fields.contains("golden_egg") && auto_update.golden_egg != base.golden_egg && current.golden_egg == base.golden_egg {
        merged.golden_egg = auto_update.golden_egg;
    }
    if !manual_fields.contains("power_egg") && auto_update.power_egg != base.power_egg && current.power_egg == base.power_egg {
        merged.power_egg = auto_update.power_egg;
    }
    if !manual_fields.contains("rescue") && auto_update.rescue != base.rescue && current.rescue == base.rescue {
        merged.rescue = auto_update.rescue;
    }
    if !manual_fields.contains("rescued") && auto_update.rescued != base.rescued && current.rescued == base.rescued {
        merged.rescued = auto_update.rescued;
    }
    merged
}

fn apply_manual_result_overrides(
    current: Option<BattleOrSalmonResult>,
    updated: Option<BattleOrSalmonResult>,
    manual_fields: &HashSet<String>,
) -> Option<BattleOrSalmonResult> {
    let current = match current {
        None => return updated,
        Some(c) => c,
    };
    let updated = match updated {
        None => {
            let touches_result = manual_fields.iter().any(|f| is_result_field(f));
            return if touches_result { Some(current) } else { None };
        }
        Some(u) => u,
    };

    match (current, updated) {
        (BattleOrSalmonResult::Battle(current_r), BattleOrSalmonResult::Battle(updated_r)) => {
            Some(BattleOrSalmonResult::Battle(apply_manual_battle_overrides(current_r, updated_r, manual_fields)))
        }
        (BattleOrSalmonResult::Salmon(current_r), BattleOrSalmonResult::Salmon(updated_r)) => {
            Some(BattleOrSalmonResult::Salmon(apply_manual_salmon_overrides(current_r, updated_r, manual_fields)))
        }
        // Variant mismatch: the freshly-updated result wins.
        (_, updated) => Some(updated),
    }
}

fn apply_manual_battle_overrides(current: BattleResult, updated: BattleResult, manual_fields: &HashSet<String>) -> BattleResult {
    let mut merged = updated;
    if manual_fields.contains("match") {
        merged.match_kind = current.match_kind;
    }
    if manual_fields.contains("rule") {
        merged.rule = current.rule;
    }
    if manual_fields.contains("stage") {
        merged.stage = current.stage;
    }
    if manual_fields.contains("kill") {
        merged.kill = current.kill;
    }
    if manual_fields.contains("death") {
        merged.death = current.death;
    }
    if manual_fields.contains("special") {
        merged.special = current.special;
    }
    merged
}

fn apply_manual_salmon_overrides(current: SalmonResult, updated: SalmonResult, manual_fields: &HashSet<String>) -> SalmonResult {
    let mut merged = updated;
    if manual_fields.contains("hazard") {
        merged.hazard = current.hazard;
    }
    if manual_fields.contains("stage") {
        merged.stage = current.stage;
    }
    if manual_fields.contains("golden_egg") {
        merged.golden_egg = current.golden_egg;
    }
    if manual_fields.contains("power_egg") {
        merged.power_egg = current.power_egg;
    }
    if manual_fields.contains("rescue") {
        merged.rescue = current.rescue;
    }
    if manual_fields.contains("rescued") {
        merged.rescued = current.rescued;
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::match_kind::MatchKind;
    use crate::domain::rule::Rule;
    use crate::domain::stage::Stage;

    fn battle(kill: u32) -> BattleResult {
        BattleResult {
            match_kind: MatchKind::Regular,
            rule: Rule::TurfWar,
            stage: Stage::ScorchGorge,
            kill,
            death: 1,
            special: 1,
        }
    }

    #[test]
    fn auto_update_adopted_when_current_unchanged_from_base() {
        let merger = MetadataMerger;
        let base = RecordingMetadata::default();
        let mut auto_update = base.clone();
        auto_update.rate = Some(Rate::xp(2000.0).unwrap());
        let current = base.clone();

        let merged = merger.merge_with_auto_update(&base, &auto_update, &current, &HashSet::new());
        assert_eq!(merged.rate, Some(Rate::xp(2000.0).unwrap()));
    }

    #[test]
    fn manual_field_blocks_auto_update() {
        let merger = MetadataMerger;
        let base = RecordingMetadata::default();
        let mut auto_update = base.clone();
        auto_update.rate = Some(Rate::xp(2000.0).unwrap());
        let mut current = base.clone();
        current.rate = Some(Rate::udemae("S+").unwrap());

        let mut manual_fields = HashSet::new();
        manual_fields.insert(field::RATE.to_string());

        let merged = merger.merge_with_auto_update(&base, &auto_update, &current, &manual_fields);
        assert_eq!(merged.rate, Some(Rate::udemae("S+").unwrap()));
    }

    #[test]
    fn manually_edited_current_value_is_protected_even_without_explicit_manual_field() {
        let merger = MetadataMerger;
        let base = RecordingMetadata::default();
        let auto_update = base.clone();
        let mut current = base.clone();
        current.judgement = Some(Judgement::Win);

        let merged = merger.merge_with_auto_update(&base, &auto_update, &current, &HashSet::new());
        assert_eq!(merged.judgement, Some(Judgement::Win));
    }

    #[test]
    fn battle_result_field_merges_independently() {
        let merger = MetadataMerger;
        let mut base = RecordingMetadata::default();
        base.result = Some(BattleOrSalmonResult::Battle(battle(0)));
        let mut auto_update = base.clone();
        auto_update.result = Some(BattleOrSalmonResult::Battle(battle(5)));
        let mut current = base.clone();
        if let Some(BattleOrSalmonResult::Battle(r)) = &mut current.result {
            r.death = 9;
        }

        let mut manual_fields = HashSet::new();
        manual_fields.insert("death".to_string());

        let merged = merger.merge_with_auto_update(&base, &auto_update, &current, &manual_fields);
        let BattleOrSalmonResult::Battle(result) = merged.result.unwrap() else {
            panic!("expected battle result");
        };
        assert_eq!(result.kill, 5, "kill should adopt the auto update");
        assert_eq!(result.death, 9, "death is manually protected");
    }

    #[test]
    fn apply_manual_updates_creates_result_once_all_required_fields_present() {
        let merger = MetadataMerger;
        let current = RecordingMetadata::default();
        let mut updates = BTreeMap::new();
        updates.insert("match".to_string(), "regular".to_string());
        updates.insert("rule".to_string(), "turf_war".to_string());
        updates.insert("stage".to_string(), "scorch_gorge".to_string());
        updates.insert("kill".to_string(), "4".to_string());
        updates.insert("death".to_string(), "2".to_string());
        updates.insert("special".to_string(), "1".to_string());

        let (updated, applied) = merger.apply_manual_updates(&current, &updates);
        assert!(updated.result.is_some());
        assert!(applied.contains("kill"));
    }

    #[test]
    fn pending_result_updates_apply_once_result_appears_and_skip_manual_fields() {
        let merger = MetadataMerger;
        let mut current = RecordingMetadata::default();
        current.result = Some(BattleOrSalmonResult::Battle(battle(0)));

        let mut pending = BTreeMap::new();
        pending.insert("kill".to_string(), "7".to_string());
        pending.insert("death".to_string(), "3".to_string());

        let mut manual_fields = HashSet::new();
        manual_fields.insert("death".to_string());

        let (updated, newly_applied) = merger.apply_pending_result_updates(&current, &pending, &manual_fields);
        let BattleOrSalmonResult::Battle(result) = updated.result.unwrap() else {
            panic!("expected battle result");
        };
        assert_eq!(result.kill, 7);
        assert_eq!(result.death, 0, "death was already manual, pending update ignored");
        assert!(newly_applied.contains("kill"));
        assert!(!newly_applied.contains("death"));
    }

    #[test]
    fn apply_manual_overrides_restores_current_values_over_fresh_auto_result() {
        let merger = MetadataMerger;
        let mut current = RecordingMetadata::default();
        current.result = Some(BattleOrSalmonResult::Battle(battle(0)));
        if let Some(BattleOrSalmonResult::Battle(r)) = &mut current.result {
            r.kill = 99;
        }
        let mut updated = current.clone();
        updated.result = Some(BattleOrSalmonResult::Battle(battle(5)));

        let mut manual_fields = HashSet::new();
        manual_fields.insert("kill".to_string());

        let merged = merger.apply_manual_overrides(&current, &updated, &manual_fields);
        let BattleOrSalmonResult::Battle(result) = merged.result.unwrap() else {
            panic!("expected battle result");
        };
        assert_eq!(result.kill, 99);
    }
}
