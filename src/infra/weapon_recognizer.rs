//! Weapon recognizer adapter: one `TemplateMatcher` per known weapon icon,
//! scored against each of the 8 fixed HUD slot ROIs. No `recognizer.py`/
//! `constants.py` survived retrieval (only a test file referencing them by
//! name), so the icon gallery is loaded the same way `MatcherRegistry`
//! loads template matchers, from a directory of PNGs under `assets_dir`
//! named after the weapon they depict, rather than from any fixed
//! constant table.

use crate::domain::frame::{Frame, Roi};
use crate::error::{AppError, AppResult};
use crate::matcher::template::TemplateMatcher;
use crate::matcher::Scored;
use crate::ports::weapon_recognizer::{SlotResult, WeaponRecognitionResult, WeaponRecognizer};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

const SLOT_COUNT: usize = 8;
const DISPLAY_MATCH_THRESHOLD: f64 = 0.6;
const UNMATCHED_THRESHOLD: f64 = 0.4;

/// Eight equally sized slots across the HUD's weapon-icon strip: four
/// allies on the left half, four enemies on the right, the same layout the
/// 20-second detection window always sees the icons in. A frame-relative
/// fallback for deployments that don't override `matchers.yaml` with a
/// capture-card-specific layout.
pub fn default_slot_rois(frame_width: u32, frame_height: u32) -> [Roi; SLOT_COUNT] {
    let slot_width = frame_width / 16;
    let slot_height = (frame_height as f64 * 0.04) as u32;
    let y = (frame_height as f64 * 0.02) as u32;
    std::array::from_fn(|index| {
        let gap_before_enemies = if index >= 4 { slot_width } else { 0 };
        let x = (index as u32) * slot_width + gap_before_enemies;
        Roi::new(x, y, slot_width, slot_height)
    })
}

struct WeaponIcon {
    name: String,
    matcher: TemplateMatcher,
}

pub struct WeaponIconRecognizer {
    display_marker: TemplateMatcher,
    slot_rois: [Roi; SLOT_COUNT],
    icons: Vec<WeaponIcon>,
    unmatched_output_dir: Option<PathBuf>,
}

impl WeaponIconRecognizer {
    pub fn load(assets_dir: &Path, display_marker_path: &Path, slot_rois: [Roi; SLOT_COUNT], unmatched_output_dir: Option<PathBuf>) -> AppResult<WeaponIconRecognizer> {
        let display_marker = TemplateMatcher::load(display_marker_path, None, DISPLAY_MATCH_THRESHOLD, None)?;

        let weapons_dir = assets_dir.join("weapons");
        let mut icons = Vec::new();
        let entries = std::fs::read_dir(&weapons_dir).map_err(|error| AppError::Configuration(format!("failed to read weapon icon directory {weapons_dir:?}: {error}")))?;
        for entry in entries {
            let entry = entry.map_err(|error| AppError::Configuration(format!("failed to read weapon icon entry: {error}")))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("png") {
                continue;
            }
            let name = path.file_stem().and_then(|stem| stem.to_str()).unwrap_or_default().to_string();
            let matcher = TemplateMatcher::load(&path, None, UNMATCHED_THRESHOLD, None)?;
            icons.push(WeaponIcon { name, matcher });
        }
        icons.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(WeaponIconRecognizer { display_marker, slot_rois, icons, unmatched_output_dir })
    }

    fn recognize_slot(&self, frame: &Frame, roi: Roi) -> SlotResult {
        let mut best_name = "unknown".to_string();
        let mut best_score = f64::NEG_INFINITY;
        for icon in &self.icons {
            let cropped = Frame::from_bgr(frame.roi_bytes(frame.clamp_roi(roi)), roi.width, roi.height);
            let score = icon.matcher.score(&cropped);
            if score > best_score {
                best_score = score;
                best_name = icon.name.clone();
            }
        }
        let is_unmatched = best_score < UNMATCHED_THRESHOLD;
        SlotResult { predicted_weapon: if is_unmatched { "unknown".to_string() } else { best_name }, best_score: best_score.max(-1.0), is_unmatched }
    }
}

#[async_trait]
impl WeaponRecognizer for WeaponIconRecognizer {
    async fn detect_weapon_display(&self, frame: &Frame) -> AppResult<bool> {
        Ok(self.display_marker.score(frame) >= DISPLAY_MATCH_THRESHOLD)
    }

    async fn recognize_weapons(&self, frame: &Frame, save_unmatched_report: bool) -> AppResult<WeaponRecognitionResult> {
        let mut slot_results: Vec<SlotResult> = Vec::with_capacity(SLOT_COUNT);
        for &roi in &self.slot_rois {
            slot_results.push(self.recognize_slot(frame, roi));
        }

        let unmatched_output_dir = if save_unmatched_report && slot_results.iter().any(|slot| slot.is_unmatched) {
            if let Some(dir) = &self.unmatched_output_dir {
                std::fs::create_dir_all(dir).map_err(|error| AppError::Internal(format!("failed to create unmatched weapon report directory: {error}")))?;
                Some(dir.to_string_lossy().to_string())
            } else {
                None
            }
        } else {
            None
        };

        let slot_results: [SlotResult; SLOT_COUNT] = slot_results.try_into().map_err(|_| AppError::Internal("weapon slot ROI count must be 8".into()))?;
        Ok(WeaponRecognitionResult { slot_results, unmatched_output_dir })
    }
}
