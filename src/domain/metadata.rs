//! `RecordingMetadata`: the per-session metadata aggregate.
//!
//! Grounded on the source's `RecordingMetadata` dataclass: immutable, every
//! field optional except `game_mode`. Field names here (`"game_mode"`,
//! `"started_at"`, `"rate"`, `"judgement"`, `"allies"`, `"enemies"`, plus the
//! battle/salmon result subfields) are the exact strings `metadata_merger.py`
//! tests membership in `manual_fields` against; keep them in lockstep with
//! [`crate::recording::merger`].

use crate::domain::game_mode::GameMode;
use crate::domain::judgement::Judgement;
use crate::domain::rate::Rate;
use crate::domain::result::BattleOrSalmonResult;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Field names recognized by the three-way merger. A plain string (not an
/// enum) because result subfields are shared across the `BattleResult`/
/// `SalmonResult` variants and the set must intersect cleanly with either.
pub mod field {
    pub const GAME_MODE: &str = "game_mode";
    pub const STARTED_AT: &str = "started_at";
    pub const RATE: &str = "rate";
    pub const JUDGEMENT: &str = "judgement";
    pub const ALLIES: &str = "allies";
    pub const ENEMIES: &str = "enemies";

    pub const BATTLE_RESULT_FIELDS: [&str; 6] =
        ["match", "rule", "stage", "kill", "death", "special"];
    pub const SALMON_RESULT_FIELDS: [&str; 6] = [
        "hazard",
        "stage",
        "golden_egg",
        "power_egg",
        "rescue",
        "rescued",
    ];
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordingMetadata {
    pub game_mode: GameMode,
    pub started_at: Option<DateTime<Utc>>,
    pub rate: Option<Rate>,
    pub judgement: Option<Judgement>,
    pub result: Option<BattleOrSalmonResult>,
    /// Four weapon labels for the player's team, filled in by weapon detection.
    pub allies: Option<[String; 4]>,
    /// Four weapon labels for the opposing team.
    pub enemies: Option<[String; 4]>,
}

impl RecordingMetadata {
    /// A fresh metadata record for a new session, preserving the prior
    /// session's game mode (used when the context resets after `stop`).
    pub fn reset_keeping_mode(game_mode: GameMode) -> Self {
        RecordingMetadata {
            game_mode,
            ..Default::default()
        }
    }

    /// Serialize into the flat string map persisted as `STEM.json`.
    pub fn to_dict(&self) -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert(field::GAME_MODE.to_string(), self.game_mode.as_str().to_string());
        if let Some(started_at) = self.started_at {
            m.insert(field::STARTED_AT.to_string(), started_at.to_rfc3339());
        }
        if let Some(rate) = &self.rate {
            m.insert(field::RATE.to_string(), rate.to_string());
        }
        if let Some(judgement) = self.judgement {
            m.insert(field::JUDGEMENT.to_string(), judgement.as_str().to_string());
        }
        if let Some(allies) = &self.allies {
            m.insert(field::ALLIES.to_string(), allies.join(","));
        }
        if let Some(enemies) = &self.enemies {
            m.insert(field::ENEMIES.to_string(), enemies.join(","));
        }
        if let Some(result) = &self.result {
            m.extend(result.to_dict());
        }
        m
    }

    /// Rehydrate from the flat string map. Missing optional fields round-trip
    /// as absent; an unparseable `result` block is dropped rather than
    /// failing the whole record (matching the merger's tolerant
    /// `_apply_result_updates`, which swallows malformed result constructions).
    pub fn from_dict(data: &BTreeMap<String, String>) -> RecordingMetadata {
        use crate::domain::result::{BattleResult, SalmonResult};

        let game_mode = data
            .get(field::GAME_MODE)
            .and_then(|s| GameMode::parse(s))
            .unwrap_or_default();
        let started_at = data
            .get(field::STARTED_AT)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let rate = data.get(field::RATE).and_then(|s| Rate::create(s).ok());
        let judgement = data.get(field::JUDGEMENT).map(|s| Judgement::parse(s));
        let allies = data
            .get(field::ALLIES)
            .and_then(|s| four_tuple(s.split(',').map(str::to_string).collect()));
        let enemies = data
            .get(field::ENEMIES)
            .and_then(|s| four_tuple(s.split(',').map(str::to_string).collect()));

        let has_battle_fields = field::BATTLE_RESULT_FIELDS.iter().all(|f| data.contains_key(*f));
        let has_salmon_fields = field::SALMON_RESULT_FIELDS.iter().all(|f| data.contains_key(*f));
        let result = if has_battle_fields {
            BattleResult::from_dict(data).ok().map(BattleOrSalmonResult::Battle)
        } else if has_salmon_fields {
            SalmonResult::from_dict(data).ok().map(BattleOrSalmonResult::Salmon)
        } else {
            None
        };

        RecordingMetadata {
            game_mode,
            started_at,
            rate,
            judgement,
            result,
            allies,
            enemies,
        }
    }
}

fn four_tuple(labels: Vec<String>) -> Option<[String; 4]> {
    labels.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_missing_optional_fields_as_missing() {
        let metadata = RecordingMetadata::default();
        let dict = metadata.to_dict();
        assert!(!dict.contains_key(field::STARTED_AT));
        let restored = RecordingMetadata::from_dict(&dict);
        assert_eq!(restored.started_at, None);
        assert_eq!(restored.game_mode, GameMode::Battle);
    }

    #[test]
    fn round_trips_full_battle_metadata() {
        use crate::domain::match_kind::MatchKind;
        use crate::domain::result::BattleResult;
        use crate::domain::rule::Rule;
        use crate::domain::stage::Stage;

        let metadata = RecordingMetadata {
            game_mode: GameMode::Battle,
            started_at: Some(Utc::now()),
            rate: Some(Rate::xp(2400.0).unwrap()),
            judgement: Some(Judgement::Win),
            result: Some(BattleOrSalmonResult::Battle(BattleResult {
                match_kind: MatchKind::XMatch,
                rule: Rule::Rainmaker,
                stage: Stage::MakoMart,
                kill: 10,
                death: 3,
                special: 4,
            })),
            allies: Some([
                "splattershot".into(),
                "roller".into(),
                "charger".into(),
                "brella".into(),
            ]),
            enemies: Some(["dualie".into(), "slosher".into(), "brush".into(), "blaster".into()]),
        };
        let dict = metadata.to_dict();
        let restored = RecordingMetadata::from_dict(&dict);
        assert_eq!(metadata, restored);
    }
}
