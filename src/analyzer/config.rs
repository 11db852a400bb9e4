//! Maps each predicate/extraction query to the named matchers or ROIs that
//! answer it. Loaded from the runtime TOML config (`[analyzer]` table)
//! alongside the YAML matcher definitions the names refer to.

use crate::domain::frame::Roi;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzerConfig {
    pub power_off: String,
    pub matching_start: String,
    pub battle_start: String,
    pub salmon_start: String,
    pub session_finish: String,
    pub session_abort: String,
    pub loading: String,
    pub loading_end: String,
    pub session_result: String,
    pub session_judgement: String,
    pub communication_error: String,
    pub schedule_changed: String,

    /// Matcher group name whose members' own names parse as `GameMode`s.
    pub game_mode_group: String,
    /// Matcher group name whose members' own names parse as `Judgement`s.
    pub judgement_group: String,
    pub rate_roi: Roi,

    pub battle_match_kind_group: String,
    pub battle_rule_group: String,
    pub battle_stage_group: String,
    pub battle_kill_roi: Roi,
    pub battle_death_roi: Roi,
    pub battle_special_roi: Roi,

    pub salmon_stage_group: String,
    pub salmon_hazard_roi: Roi,
    pub salmon_golden_egg_roi: Roi,
    pub salmon_power_egg_roi: Roi,
    pub salmon_rescue_roi: Roi,
    pub salmon_rescued_roi: Roi,
}

impl Default for AnalyzerConfig {
    fn default() -> AnalyzerConfig {
        let zero = Roi::new(0, 0, 0, 0);
        AnalyzerConfig {
            power_off: "power_off".into(),
            matching_start: "matching_start".into(),
            battle_start: "battle_start".into(),
            salmon_start: "salmon_start".into(),
            session_finish: "session_finish".into(),
            session_abort: "session_abort".into(),
            loading: "loading".into(),
            loading_end: "loading_end".into(),
            session_result: "session_result".into(),
            session_judgement: "session_judgement".into(),
            communication_error: "communication_error".into(),
            schedule_changed: "schedule_changed".into(),
            game_mode_group: "game_mode".into(),
            judgement_group: "judgement".into(),
            rate_roi: zero,
            battle_match_kind_group: "battle_match_kind".into(),
            battle_rule_group: "battle_rule".into(),
            battle_stage_group: "battle_stage".into(),
            battle_kill_roi: zero,
            battle_death_roi: zero,
            battle_special_roi: zero,
            salmon_stage_group: "salmon_stage".into(),
            salmon_hazard_roi: zero,
            salmon_golden_egg_roi: zero,
            salmon_power_egg_roi: zero,
            salmon_rescue_roi: zero,
            salmon_rescued_roi: zero,
        }
    }
}
