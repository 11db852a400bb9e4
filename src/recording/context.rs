//! `RecordingContext`: the single mutable record the recording use case
//! owns exclusively (§5 "single owner" rule — no other task mutates it).
//! Phase handlers read it and return an updated copy; the use case applies
//! it between handler calls.

use crate::domain::frame::Frame;
use crate::domain::game_mode::GameMode;
use crate::domain::metadata::RecordingMetadata;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};

/// Running state for the 20-second weapon detection window (§4.G). Weapon
/// labels themselves live on `RecordingMetadata.allies`/`.enemies`, mirroring
/// the source's best score only being tracked alongside the context, not the
/// persisted metadata.
#[derive(Debug, Clone)]
pub struct WeaponDetectionState {
    pub done: bool,
    pub attempts: u32,
    /// Best match score seen so far per slot (four allies then four
    /// enemies); a fresh window starts every slot at `-1.0`.
    pub best_scores: [f64; 8],
    /// The last frame on which the weapon HUD was visible, kept around so
    /// `finalize` can run one more high-confidence pass over it.
    pub last_visible_frame: Option<Frame>,
}

impl Default for WeaponDetectionState {
    fn default() -> WeaponDetectionState {
        WeaponDetectionState {
            done: false,
            attempts: 0,
            best_scores: [-1.0; 8],
            last_visible_frame: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordingContext {
    /// Metadata as it currently stands, possibly including manual edits.
    pub metadata: RecordingMetadata,
    /// Snapshot taken the last time an automatic pass merged cleanly; the
    /// three-way merge's common ancestor.
    pub base_metadata: RecordingMetadata,
    /// Field names the user has edited since the last `stop`.
    pub manual_fields: HashSet<String>,
    /// Manual result-subfield edits received before a result existed.
    pub pending_result_updates: BTreeMap<String, String>,
    pub battle_started_at: Option<DateTime<Utc>>,
    pub finish_detected: bool,
    /// Set once `detectSessionJudgement` has fired for the current pause
    /// (§4.E PAUSED: judgement is captured once, then the handler waits for
    /// a loading transition rather than re-extracting every frame).
    pub judgement_captured: bool,
    /// The frame captured as the definitive result frame, if any.
    pub result_frame: Option<Frame>,
    pub weapon_detection: WeaponDetectionState,
}

impl RecordingContext {
    pub fn new(game_mode: GameMode) -> RecordingContext {
        let metadata = RecordingMetadata::reset_keeping_mode(game_mode);
        RecordingContext {
            metadata: metadata.clone(),
            base_metadata: metadata,
            manual_fields: HashSet::new(),
            pending_result_updates: BTreeMap::new(),
            battle_started_at: None,
            finish_detected: false,
            judgement_captured: false,
            result_frame: None,
            weapon_detection: WeaponDetectionState::default(),
        }
    }

    /// Resets for the next session, keeping the current game mode (§4.F
    /// `stop` "resets the context keeping gameMode").
    pub fn reset_keeping_mode(&mut self) {
        *self = RecordingContext::new(self.metadata.game_mode);
    }

    pub fn elapsed_since_battle_start(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.battle_started_at.map(|started| now - started)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_keeping_mode_preserves_game_mode_and_clears_everything_else() {
        let mut context = RecordingContext::new(GameMode::Salmon);
        context.manual_fields.insert("rate".to_string());
        context.finish_detected = true;

        context.reset_keeping_mode();

        assert_eq!(context.metadata.game_mode, GameMode::Salmon);
        assert!(context.manual_fields.is_empty());
        assert!(!context.finish_detected);
    }
}
