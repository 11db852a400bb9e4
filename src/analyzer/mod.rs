//! Frame analyzer (§4.B): a finite set of predicate and extraction queries
//! over a single frame, each resolved by looking up one or more named
//! composite matchers (or, for free text, an OCR call over a named ROI)
//! in the matcher registry. Never touches any mutable session state -
//! callers combine its answers with the state machine and metadata merger.

pub mod config;

use crate::domain::frame::Frame;
use crate::domain::game_mode::GameMode;
use crate::domain::judgement::Judgement;
use crate::domain::match_kind::MatchKind;
use crate::domain::rate::Rate;
use crate::domain::result::{BattleOrSalmonResult, BattleResult, SalmonResult};
use crate::domain::rule::Rule;
use crate::domain::stage::Stage;
use crate::matcher::registry::MatcherRegistry;
use crate::ports::Ocr;
use config::AnalyzerConfig;
use std::sync::Arc;

pub struct FrameAnalyzer {
    registry: Arc<MatcherRegistry>,
    ocr: Arc<dyn Ocr>,
    config: AnalyzerConfig,
}

impl FrameAnalyzer {
    pub fn new(registry: Arc<MatcherRegistry>, ocr: Arc<dyn Ocr>, config: AnalyzerConfig) -> FrameAnalyzer {
        FrameAnalyzer { registry, ocr, config }
    }

    pub async fn detect_power_off(&self, frame: &Frame) -> bool {
        self.registry.evaluate_composite(&self.config.power_off, frame).await
    }

    pub async fn detect_matching_start(&self, frame: &Frame) -> bool {
        self.registry.evaluate_composite(&self.config.matching_start, frame).await
    }

    pub async fn detect_session_start(&self, frame: &Frame, game_mode: GameMode) -> bool {
        let name = match game_mode {
            GameMode::Battle => &self.config.battle_start,
            GameMode::Salmon => &self.config.salmon_start,
        };
        self.registry.evaluate_composite(name, frame).await
    }

    pub async fn detect_session_finish(&self, frame: &Frame) -> bool {
        self.registry.evaluate_composite(&self.config.session_finish, frame).await
    }

    pub async fn detect_loading(&self, frame: &Frame) -> bool {
        self.registry.evaluate_composite(&self.config.loading, frame).await
    }

    pub async fn detect_loading_end(&self, frame: &Frame) -> bool {
        self.registry.evaluate_composite(&self.config.loading_end, frame).await
    }

    pub async fn detect_session_abort(&self, frame: &Frame) -> bool {
        self.registry.evaluate_composite(&self.config.session_abort, frame).await
    }

    pub async fn detect_session_result(&self, frame: &Frame) -> bool {
        self.registry.evaluate_composite(&self.config.session_result, frame).await
    }

    pub async fn detect_session_judgement(&self, frame: &Frame) -> bool {
        self.registry.evaluate_composite(&self.config.session_judgement, frame).await
    }

    pub async fn detect_communication_error(&self, frame: &Frame) -> bool {
        self.registry
            .evaluate_composite(&self.config.communication_error, frame)
            .await
    }

    pub async fn detect_schedule_change(&self, frame: &Frame) -> bool {
        self.registry.evaluate_composite(&self.config.schedule_changed, frame).await
    }

    /// Tries every matcher named in the `game_mode` group; the first whose
    /// name parses as a `GameMode` and matches the frame wins.
    pub async fn extract_game_mode(&self, frame: &Frame) -> Option<GameMode> {
        self.extract_enum_by_group(frame, &self.config.game_mode_group, GameMode::parse)
            .await
    }

    pub async fn extract_session_judgement(&self, frame: &Frame) -> Option<Judgement> {
        self.extract_enum_by_group(frame, &self.config.judgement_group, |s| match Judgement::parse(s) {
            Judgement::Unknown => None,
            judgement => Some(judgement),
        })
        .await
    }

    pub async fn extract_rate(&self, frame: &Frame) -> Option<Rate> {
        let text = self.ocr.recognize(frame, self.config.rate_roi).await.ok().flatten()?;
        Rate::create(text.trim()).ok()
    }

    /// Requires the caller's current `game_mode` since the result shape
    /// (battle vs. salmon) depends on it; called once per session, post-stop
    /// (§4.B's performance note).
    pub async fn extract_session_result(&self, frame: &Frame, game_mode: GameMode) -> Option<BattleOrSalmonResult> {
        match game_mode {
            GameMode::Battle => self.extract_battle_result(frame).await.map(BattleOrSalmonResult::Battle),
            GameMode::Salmon => self.extract_salmon_result(frame).await.map(BattleOrSalmonResult::Salmon),
        }
    }

    async fn extract_battle_result(&self, frame: &Frame) -> Option<BattleResult> {
        let match_kind = self
            .extract_enum_by_group(frame, &self.config.battle_match_kind_group, MatchKind::parse)
            .await?;
        let rule = self.extract_enum_by_group(frame, &self.config.battle_rule_group, Rule::parse).await?;
        let stage = self
            .extract_enum_by_group(frame, &self.config.battle_stage_group, Stage::parse)
            .await?;
        let kill = self.extract_ocr_u32(frame, self.config.battle_kill_roi).await?;
        let death = self.extract_ocr_u32(frame, self.config.battle_death_roi).await?;
        let special = self.extract_ocr_u32(frame, self.config.battle_special_roi).await?;
        Some(BattleResult {
            match_kind,
            rule,
            stage,
            kill,
            death,
            special,
        })
    }

    async fn extract_salmon_result(&self, frame: &Frame) -> Option<SalmonResult> {
        let stage = self
            .extract_enum_by_group(frame, &self.config.salmon_stage_group, Stage::parse)
            .await?;
        let hazard = self.extract_ocr_u32(frame, self.config.salmon_hazard_roi).await?;
        let golden_egg = self.extract_ocr_u32(frame, self.config.salmon_golden_egg_roi).await?;
        let power_egg = self.extract_ocr_u32(frame, self.config.salmon_power_egg_roi).await?;
        let rescue = self.extract_ocr_u32(frame, self.config.salmon_rescue_roi).await?;
        let rescued = self.extract_ocr_u32(frame, self.config.salmon_rescued_roi).await?;
        Some(SalmonResult {
            hazard,
            stage,
            golden_egg,
            power_egg,
            rescue,
            rescued,
        })
    }

    async fn extract_enum_by_group<T>(&self, frame: &Frame, group: &str, parse: impl Fn(&str) -> Option<T>) -> Option<T> {
        let names = self.registry.group(group)?.to_vec();
        for name in names {
            if self.registry.is_match_async(&name, frame.clone()).await {
                if let Some(value) = parse(&name) {
                    return Some(value);
                }
            }
        }
        None
    }

    async fn extract_ocr_u32(&self, frame: &Frame, roi: crate::domain::frame::Roi) -> Option<u32> {
        let text = self.ocr.recognize(frame, roi).await.ok().flatten()?;
        text.trim().parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::frame::Roi;
    use crate::matcher::{brightness::BrightnessMatcher, Matcher};
    use crate::ports::Ocr;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct FixedOcr(Option<String>);

    #[async_trait]
    impl Ocr for FixedOcr {
        async fn recognize(&self, _frame: &Frame, _roi: Roi) -> Result<Option<String>, crate::error::AppError> {
            Ok(self.0.clone())
        }
    }

    fn solid_frame(bgr: (u8, u8, u8)) -> Frame {
        Frame::from_bgr(vec![bgr.0, bgr.1, bgr.2].repeat(4), 2, 2)
    }

    fn registry_with_game_mode_group() -> Arc<MatcherRegistry> {
        let mut simple: HashMap<String, Arc<dyn Matcher>> = HashMap::new();
        // A dark frame matches "salmon", a bright threshold never matches on
        // the dark test frame, so the group resolves to exactly one member.
        simple.insert("battle".into(), Arc::new(BrightnessMatcher::new(1.0, None, None)));
        simple.insert("salmon".into(), Arc::new(BrightnessMatcher::new(10.0, None, None)));
        let mut groups = HashMap::new();
        groups.insert("game_mode".to_string(), vec!["battle".to_string(), "salmon".to_string()]);
        Arc::new(MatcherRegistry::from_parts(simple, HashMap::new(), groups))
    }

    #[tokio::test]
    async fn extract_game_mode_picks_matching_group_member() {
        let registry = registry_with_game_mode_group();
        let analyzer = FrameAnalyzer::new(registry, Arc::new(FixedOcr(None)), AnalyzerConfig::default());
        let frame = solid_frame((5, 5, 5));
        assert_eq!(analyzer.extract_game_mode(&frame).await, Some(GameMode::Salmon));
    }

    #[tokio::test]
    async fn extract_rate_parses_ocr_text_as_xp() {
        let registry = Arc::new(MatcherRegistry::from_parts(HashMap::new(), HashMap::new(), HashMap::new()));
        let ocr = Arc::new(FixedOcr(Some(" 2200 ".to_string())));
        let analyzer = FrameAnalyzer::new(registry, ocr, AnalyzerConfig::default());
        let frame = solid_frame((0, 0, 0));
        assert_eq!(analyzer.extract_rate(&frame).await, Some(Rate::Xp(2200.0)));
    }

    #[tokio::test]
    async fn extract_rate_returns_none_when_ocr_finds_nothing() {
        let registry = Arc::new(MatcherRegistry::from_parts(HashMap::new(), HashMap::new(), HashMap::new()));
        let analyzer = FrameAnalyzer::new(registry, Arc::new(FixedOcr(None)), AnalyzerConfig::default());
        let frame = solid_frame((0, 0, 0));
        assert!(analyzer.extract_rate(&frame).await.is_none());
    }
}
