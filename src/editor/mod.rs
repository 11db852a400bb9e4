//! Auto-editor (§4.K): groups the day's recordings, concatenates each
//! group into one clip, merges subtitles, adjusts volume, composes a
//! thumbnail, fills title/description/chapter templates, embeds sidecars,
//! and moves the result into `edited/`. No single source file survived
//! retrieval for this service (unlike most other modules here), so the
//! workflow below is built directly from the specification's own
//! step-by-step description plus this crate's existing editor port,
//! repositories, and progress reporter, in the style established by
//! [`crate::process::AutoProcessService`] (a cooperative-cancellation flag
//! checked between groups and between steps, progress published
//! throughout).

use crate::asset::{EditedAssetRepository, RecordedAssetRepository};
use crate::config::VideoEditSettings;
use crate::domain::asset::VideoAsset;
use crate::domain::frame::Frame;
use crate::domain::metadata::RecordingMetadata;
use crate::error::{AppError, AppResult};
use crate::matcher::brightness::BrightnessMatcher;
use crate::ports::Editor;
use crate::progress::ProgressReporter;
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Default thumbnail overlay font, matching the filename the system-check
/// module already looks for under the configured assets directory.
const DEFAULT_FONT_FILENAME: &str = "ikamodoki1.ttf";
const OVERLAY_BAR_HEIGHT: u32 = 64;
const OVERLAY_CORNER_RADIUS: i32 = 10;
const WEAPON_ICON_SIZE: u32 = 48;
const WEAPON_ICON_MARGIN: u32 = 8;

/// One group of same-day, same-match-kind-and-rule recordings to be
/// concatenated into a single clip (§4.K step 1).
#[derive(Debug, Clone)]
struct RecordingGroup {
    key: String,
    assets: Vec<VideoAsset>,
}

/// Groups recordings by `(gameMode, match, rule, date)`, splitting further
/// whenever a group would exceed `group_size_limit`. Grouping preserves the
/// repository's listing order within each key.
fn group_recordings(assets: Vec<VideoAsset>, group_size_limit: usize) -> Vec<RecordingGroup> {
    let mut by_key: BTreeMap<String, Vec<VideoAsset>> = BTreeMap::new();
    for asset in assets {
        let key = group_key(asset.metadata.as_ref());
        by_key.entry(key).or_default().push(asset);
    }

    let mut groups = Vec::new();
    for (key, mut bucket) in by_key {
        bucket.sort_by_key(|asset| asset.metadata.as_ref().and_then(|m| m.started_at));
        let limit = group_size_limit.max(1);
        for (index, chunk) in bucket.chunks(limit).enumerate() {
            groups.push(RecordingGroup {
                key: if index == 0 { key.clone() } else { format!("{key}#{index}") },
                assets: chunk.to_vec(),
            });
        }
    }
    groups
}

fn group_key(metadata: Option<&RecordingMetadata>) -> String {
    let Some(metadata) = metadata else {
        return "unknown".to_string();
    };
    let date = metadata.started_at.map(|dt| dt.format("%Y%m%d").to_string()).unwrap_or_else(|| "unknown".to_string());
    let (match_kind, rule) = match &metadata.result {
        Some(crate::domain::result::BattleOrSalmonResult::Battle(result)) => (result.match_kind.value(), result.rule.value()),
        _ => ("salmon", "salmon"),
    };
    format!("{}_{match_kind}_{rule}_{date}", metadata.game_mode.as_str())
}

fn fill_template(template: &str, fields: &BTreeMap<String, String>) -> String {
    let mut output = template.to_string();
    for (key, value) in fields {
        output = output.replace(&format!("{{{key}}}"), value);
    }
    output
}

pub struct AutoEditor {
    editor: Arc<dyn Editor>,
    recorded: Arc<RecordedAssetRepository>,
    edited: Arc<EditedAssetRepository>,
    progress: Arc<ProgressReporter>,
    settings: VideoEditSettings,
    assets_dir: PathBuf,
    cancelled: AtomicBool,
}

impl AutoEditor {
    pub fn new(
        editor: Arc<dyn Editor>,
        recorded: Arc<RecordedAssetRepository>,
        edited: Arc<EditedAssetRepository>,
        progress: Arc<ProgressReporter>,
        settings: VideoEditSettings,
        assets_dir: PathBuf,
    ) -> AutoEditor {
        AutoEditor { editor, recorded, edited, progress, settings, assets_dir, cancelled: AtomicBool::new(false) }
    }

    /// Requests a clean stop between groups or steps, not mid-external-call
    /// (§5 "a cancellation is a clean stop, not an abort of an in-flight
    /// external call").
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Runs the whole edit pass: one group at a time, honoring cancellation
    /// between groups and between a group's own steps. Returns the paths of
    /// every edited video produced before a cancellation (if any) stopped
    /// the run early.
    pub async fn run(&self, task_id: &str) -> AppResult<Vec<PathBuf>> {
        self.cancelled.store(false, Ordering::SeqCst);
        let assets = self.recorded.list_recordings();
        let groups = group_recordings(assets, self.settings.group_size_limit);

        self.progress.start_task(task_id, "auto_edit", Some(groups.len() as u64), Some(groups.iter().map(|g| g.key.clone()).collect()));

        let mut produced = Vec::new();
        for (index, group) in groups.iter().enumerate() {
            if self.is_cancelled() {
                break;
            }
            match self.process_group(task_id, index as u32, group).await {
                Ok(path) => {
                    produced.push(path);
                    self.progress.item_finish(task_id, index as u32, true, None);
                }
                Err(error) => {
                    tracing::error!(%error, group = %group.key, "failed to edit group");
                    self.progress.item_finish(task_id, index as u32, false, Some(&error.to_string()));
                }
            }
            self.progress.advance(task_id, 1);
        }

        let success = !self.is_cancelled();
        self.progress.finish(task_id, success, None);
        Ok(produced)
    }

    async fn process_group(&self, task_id: &str, item_index: u32, group: &RecordingGroup) -> AppResult<PathBuf> {
        let stage = |key: &str, label: &str| self.progress.item_stage(task_id, item_index, key, label, None);

        if group.assets.is_empty() {
            return Err(AppError::Validation(format!("group {} has no recordings", group.key)));
        }
        let out_dir = std::env::temp_dir();
        let out_path = out_dir.join(format!("{}.mkv", group.key));
        let clips: Vec<PathBuf> = group.assets.iter().map(|a| a.video.clone()).collect();

        stage("concat", "Concatenating clips");
        let merged = self.editor.merge(&clips, &out_path).await?;
        if self.is_cancelled() {
            return Err(AppError::Internal("auto-edit cancelled after concatenation".into()));
        }

        stage("subtitle", "Merging subtitles");
        let merged_subtitle = self.merge_subtitles(&group.assets);
        if let Some(subtitle_text) = &merged_subtitle {
            let subtitle_path = out_dir.join(format!("{}.srt", group.key));
            std::fs::write(&subtitle_path, subtitle_text)
                .map_err(|e| AppError::Internal(format!("failed to write merged subtitle: {e}")))?;
            self.editor.embed_subtitle(&merged, &subtitle_path).await?;
        }

        stage("volume", "Adjusting volume");
        self.editor.change_volume(&merged, self.settings.volume_multiplier).await?;

        stage("thumbnail", "Composing thumbnail");
        let primary_metadata_for_thumbnail = group.assets[0].metadata.clone().unwrap_or_default();
        if let Some(thumbnail) = self.compose_thumbnail(&group.key, &group.assets, &primary_metadata_for_thumbnail) {
            self.editor.embed_thumbnail(&merged, &thumbnail).await?;
        }

        stage("metadata", "Embedding metadata");
        let primary_metadata = group.assets[0].metadata.clone().unwrap_or_default();
        let fields = primary_metadata.to_dict();
        let title = self.settings.title_template.as_deref().map(|t| fill_template(t, &fields));
        let description = self.settings.description_template.as_deref().map(|t| fill_template(t, &fields));
        let mut payload = serde_json::Map::new();
        if let Some(title) = &title {
            payload.insert("title".to_string(), serde_json::Value::String(title.clone()));
        }
        if let Some(description) = &description {
            payload.insert("description".to_string(), serde_json::Value::String(description.clone()));
        }
        for (key, value) in &fields {
            payload.insert(key.clone(), serde_json::Value::String(value.clone()));
        }
        self.editor.embed_metadata(&merged, &serde_json::Value::Object(payload)).await?;

        stage("move", "Moving into edited storage");
        let final_path = self.edited.save_edited(&merged)?;
        Ok(final_path)
    }

    fn merge_subtitles(&self, assets: &[VideoAsset]) -> Option<String> {
        let mut combined = String::new();
        let mut index = 1u32;
        for asset in assets {
            let Some(subtitle_path) = &asset.subtitle else { continue };
            let Some(content) = std::fs::read_to_string(subtitle_path).ok() else { continue };
            for block in content.split("\n\n").filter(|b| !b.trim().is_empty()) {
                combined.push_str(&index.to_string());
                combined.push('\n');
                if let Some((_, rest)) = block.split_once('\n') {
                    combined.push_str(rest.trim_end());
                } else {
                    combined.push_str(block.trim_end());
                }
                combined.push_str("\n\n");
                index += 1;
            }
        }
        if combined.is_empty() {
            None
        } else {
            Some(combined)
        }
    }

    /// Picks the brightest candidate screenshot among the group's saved
    /// thumbnails, draws the title/rule overlay and per-player weapon icons
    /// over it, and writes the result beside the merged clip (§4.K step 2d:
    /// "pick the brightest-in-ROI frame among candidate screenshots and draw
    /// overlay elements... with a font loaded from assets"). No
    /// thumbnail-specific ROI is configured anywhere in this crate, so the
    /// whole frame stands in for the ROI `BrightnessMatcher` scores against.
    fn compose_thumbnail(&self, group_key: &str, assets: &[VideoAsset], metadata: &RecordingMetadata) -> Option<PathBuf> {
        let candidates: Vec<&PathBuf> = assets.iter().filter_map(|asset| asset.thumbnail.as_ref()).collect();
        let brightness = BrightnessMatcher::new(f64::MAX, None, None);
        let brightest = candidates.into_iter().filter_map(|path| Frame::load_from_path(path).ok().map(|frame| (path, frame))).max_by(|(_, a), (_, b)| {
            let lum_a = brightness.mean_luminance(a).unwrap_or(0.0);
            let lum_b = brightness.mean_luminance(b).unwrap_or(0.0);
            lum_a.total_cmp(&lum_b)
        })?;
        let (_, frame) = brightest;

        let mut image = frame.to_rgb_image();
        self.draw_overlay_bar(&mut image, metadata);
        self.draw_weapon_icons(&mut image, metadata);

        let out_path = std::env::temp_dir().join(format!("{group_key}_thumbnail.png"));
        if let Err(error) = image.save(&out_path) {
            tracing::warn!(%error, "failed to save composed thumbnail");
            return None;
        }
        Some(out_path)
    }

    /// Draws a rounded bar across the bottom of the thumbnail with the
    /// match's rule and result as overlay text.
    fn draw_overlay_bar(&self, image: &mut RgbImage, metadata: &RecordingMetadata) {
        let (width, height) = image.dimensions();
        if height <= OVERLAY_BAR_HEIGHT {
            return;
        }
        let bar_top = (height - OVERLAY_BAR_HEIGHT) as i32;
        draw_rounded_rect(image, 0, bar_top, width, OVERLAY_BAR_HEIGHT, OVERLAY_CORNER_RADIUS, Rgb([20, 20, 24]));

        let Some(font) = self.load_font() else {
            return;
        };
        let scale = PxScale::from(32.0);
        let text = overlay_text(metadata);
        draw_text_mut(image, Rgb([240, 240, 240]), 16, bar_top + 14, scale, &font, &text);
    }

    /// Composites each tracked ally/enemy weapon's icon along the overlay
    /// bar, loaded from `assets_dir/weapons/{label}.png` (the same naming
    /// convention [`crate::infra::weapon_recognizer::WeaponIconRecognizer`]
    /// loads its template matchers from).
    fn draw_weapon_icons(&self, image: &mut RgbImage, metadata: &RecordingMetadata) {
        let (width, height) = image.dimensions();
        if height <= OVERLAY_BAR_HEIGHT {
            return;
        }
        let labels: Vec<&str> = metadata
            .allies
            .iter()
            .flatten()
            .chain(metadata.enemies.iter().flatten())
            .map(String::as_str)
            .collect();
        if labels.is_empty() {
            return;
        }

        let icon_y = (height - OVERLAY_BAR_HEIGHT) as i64 + ((OVERLAY_BAR_HEIGHT - WEAPON_ICON_SIZE) / 2) as i64;
        let mut x = width.saturating_sub((WEAPON_ICON_SIZE + WEAPON_ICON_MARGIN) * labels.len() as u32) as i64;
        for label in labels {
            if let Some(icon) = self.load_weapon_icon(label) {
                image::imageops::overlay(image, &icon, x, icon_y);
            }
            x += (WEAPON_ICON_SIZE + WEAPON_ICON_MARGIN) as i64;
        }
    }

    fn load_weapon_icon(&self, label: &str) -> Option<RgbImage> {
        let path = self.assets_dir.join("weapons").join(format!("{label}.png"));
        let icon = image::open(&path).ok()?.to_rgb8();
        Some(image::imageops::resize(&icon, WEAPON_ICON_SIZE, WEAPON_ICON_SIZE, image::imageops::FilterType::Triangle))
    }

    fn load_font(&self) -> Option<FontVec> {
        let path = self.settings.font_path.clone().unwrap_or_else(|| self.assets_dir.join(DEFAULT_FONT_FILENAME));
        let bytes = std::fs::read(&path)
            .map_err(|error| tracing::warn!(%error, path = %path.display(), "failed to read thumbnail overlay font"))
            .ok()?;
        FontVec::try_from_vec(bytes)
            .map_err(|error| tracing::warn!(%error, "failed to parse thumbnail overlay font"))
            .ok()
    }
}

fn overlay_text(metadata: &RecordingMetadata) -> String {
    match &metadata.result {
        Some(crate::domain::result::BattleOrSalmonResult::Battle(result)) => {
            let judgement = metadata.judgement.map(|j| j.as_str().to_uppercase()).unwrap_or_else(|| "?".to_string());
            format!("{} / {judgement}", result.rule.value())
        }
        Some(crate::domain::result::BattleOrSalmonResult::Salmon(result)) => {
            format!("salmon / {} golden eggs", result.golden_egg)
        }
        None => "splat replay".to_string(),
    }
}

/// Draws a filled rounded rectangle by unioning a full-width/height core
/// rect with a filled circle at each corner (`imageproc` has no native
/// rounded-rect primitive).
fn draw_rounded_rect(image: &mut RgbImage, x: i32, y: i32, width: u32, height: u32, radius: i32, color: Rgb<u8>) {
    let radius = radius.max(0).min((width.min(height) / 2) as i32);
    if width == 0 || height == 0 {
        return;
    }
    draw_filled_rect_mut(image, Rect::at(x, y + radius).of_size(width, (height as i32 - 2 * radius).max(0) as u32), color);
    draw_filled_rect_mut(image, Rect::at(x + radius, y).of_size((width as i32 - 2 * radius).max(0) as u32, height), color);
    for (cx, cy) in [
        (x + radius, y + radius),
        (x + width as i32 - radius - 1, y + radius),
        (x + radius, y + height as i32 - radius - 1),
        (x + width as i32 - radius - 1, y + height as i32 - radius - 1),
    ] {
        draw_filled_circle_mut(image, (cx, cy), radius, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::game_mode::GameMode;
    use chrono::Utc;

    fn metadata(started_at: chrono::DateTime<Utc>) -> RecordingMetadata {
        RecordingMetadata { game_mode: GameMode::Salmon, started_at: Some(started_at), ..Default::default() }
    }

    fn asset(started_at: chrono::DateTime<Utc>) -> VideoAsset {
        VideoAsset { video: PathBuf::from("x.mkv"), subtitle: None, thumbnail: None, metadata: Some(metadata(started_at)) }
    }

    #[test]
    fn groups_split_once_the_size_limit_is_exceeded() {
        let now = Utc::now();
        let assets = vec![asset(now), asset(now), asset(now)];
        let groups = group_recordings(assets, 2);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].assets.len(), 2);
        assert_eq!(groups[1].assets.len(), 1);
    }

    #[test]
    fn template_fills_named_placeholders_only() {
        let mut fields = BTreeMap::new();
        fields.insert("game_mode".to_string(), "battle".to_string());
        let filled = fill_template("Today's {game_mode} highlights", &fields);
        assert_eq!(filled, "Today's battle highlights");
    }
}
