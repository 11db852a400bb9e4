//! Battle and salmon run results.
//!
//! Grounded on the source's `BattleResult`/`SalmonResult` value objects:
//! immutable, field-by-field `to_dict`/`from_dict` round-trip, and a tagged
//! union (`Result`) over the two.

use crate::domain::match_kind::MatchKind;
use crate::domain::rule::Rule;
use crate::domain::stage::Stage;
use crate::error::AppError;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BattleResult {
    pub match_kind: MatchKind,
    pub rule: Rule,
    pub stage: Stage,
    pub kill: u32,
    pub death: u32,
    pub special: u32,
}

impl BattleResult {
    pub fn to_dict(&self) -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert("match".into(), self.match_kind.value().to_string());
        m.insert("rule".into(), self.rule.value().to_string());
        m.insert("stage".into(), self.stage.value().to_string());
        m.insert("kill".into(), self.kill.to_string());
        m.insert("death".into(), self.death.to_string());
        m.insert("special".into(), self.special.to_string());
        m
    }

    pub fn from_dict(data: &BTreeMap<String, String>) -> Result<BattleResult, AppError> {
        let get = |key: &str| -> Result<&String, AppError> {
            data.get(key)
                .ok_or_else(|| AppError::Validation(format!("missing field: {key}")))
        };
        let parse_u32 = |key: &str, value: &str| -> Result<u32, AppError> {
            value
                .parse()
                .map_err(|_| AppError::Validation(format!("{key} must be an integer")))
        };
        Ok(BattleResult {
            match_kind: MatchKind::parse(get("match")?)
                .ok_or_else(|| AppError::Validation("unknown match".into()))?,
            rule: Rule::parse(get("rule")?).ok_or_else(|| AppError::Validation("unknown rule".into()))?,
            stage: Stage::parse(get("stage")?)
                .ok_or_else(|| AppError::Validation("unknown stage".into()))?,
            kill: parse_u32("kill", get("kill")?)?,
            death: parse_u32("death", get("death")?)?,
            special: parse_u32("special", get("special")?)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SalmonResult {
    pub hazard: u32,
    pub stage: Stage,
    pub golden_egg: u32,
    pub power_egg: u32,
    pub rescue: u32,
    pub rescued: u32,
}

impl SalmonResult {
    pub fn to_dict(&self) -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert("hazard".into(), self.hazard.to_string());
        m.insert("stage".into(), self.stage.name().to_string());
        m.insert("golden_egg".into(), self.golden_egg.to_string());
        m.insert("power_egg".into(), self.power_egg.to_string());
        m.insert("rescue".into(), self.rescue.to_string());
        m.insert("rescued".into(), self.rescued.to_string());
        m
    }

    pub fn from_dict(data: &BTreeMap<String, String>) -> Result<SalmonResult, AppError> {
        let get = |key: &str| -> Result<&String, AppError> {
            data.get(key)
                .ok_or_else(|| AppError::Validation(format!("missing field: {key}")))
        };
        let parse_u32 = |key: &str, value: &str| -> Result<u32, AppError> {
            value
                .parse()
                .map_err(|_| AppError::Validation(format!("{key} must be an integer")))
        };
        Ok(SalmonResult {
            hazard: parse_u32("hazard", get("hazard")?)?,
            stage: Stage::parse(get("stage")?)
                .ok_or_else(|| AppError::Validation("unknown stage".into()))?,
            golden_egg: parse_u32("golden_egg", get("golden_egg")?)?,
            power_egg: parse_u32("power_egg", get("power_egg")?)?,
            rescue: parse_u32("rescue", get("rescue")?)?,
            rescued: parse_u32("rescued", get("rescued")?)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleOrSalmonResult {
    Battle(BattleResult),
    Salmon(SalmonResult),
}

impl BattleOrSalmonResult {
    pub fn to_dict(&self) -> BTreeMap<String, String> {
        match self {
            BattleOrSalmonResult::Battle(r) => r.to_dict(),
            BattleOrSalmonResult::Salmon(r) => r.to_dict(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn battle_result_round_trips_through_dict() {
        let result = BattleResult {
            match_kind: MatchKind::XMatch,
            rule: Rule::SplatZones,
            stage: Stage::ScorchGorge,
            kill: 7,
            death: 2,
            special: 3,
        };
        let dict = result.to_dict();
        let restored = BattleResult::from_dict(&dict).unwrap();
        assert_eq!(result, restored);
    }

    #[test]
    fn salmon_result_keys_stage_by_variant_name() {
        let result = SalmonResult {
            hazard: 3,
            stage: Stage::MakoMart,
            golden_egg: 20,
            power_egg: 120,
            rescue: 1,
            rescued: 0,
        };
        let dict = result.to_dict();
        assert_eq!(dict.get("stage").unwrap(), "mako_mart");
        assert_eq!(SalmonResult::from_dict(&dict).unwrap(), result);
    }
}
