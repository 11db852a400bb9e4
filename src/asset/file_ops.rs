//! Asset file operations (§4.L groundwork): filename generation and sidecar
//! read/write, shared by the recorded- and edited-asset repositories.
//! Grounded on the source's `AssetFileOperations`.

use crate::domain::metadata::RecordingMetadata;
use crate::domain::result::BattleOrSalmonResult;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Generates the shared filename stem (no extension) for a recording's
/// video and sidecars. Battle recordings get the full
/// `YYYYMMDD_HHMMSS_match_rule_judgement_stage` stem; everything else
/// (salmon run, unfinished sessions) gets just the timestamp.
pub fn generate_filename(metadata: &RecordingMetadata) -> Option<String> {
    let started_at = metadata.started_at?;
    let timestamp = started_at.format("%Y%m%d_%H%M%S").to_string();

    match &metadata.result {
        Some(BattleOrSalmonResult::Battle(result)) => {
            let judgement = metadata.judgement.map(|j| j.as_str()).unwrap_or("");
            Some(format!(
                "{timestamp}_{}_{}_{judgement}_{}",
                result.match_kind.value(),
                result.rule.value(),
                result.stage.value(),
            ))
        }
        _ => Some(timestamp),
    }
}

pub fn subtitle_path(base: &Path) -> PathBuf {
    base.with_extension("srt")
}

pub fn thumbnail_path(base: &Path) -> PathBuf {
    base.with_extension("png")
}

pub fn metadata_path(base: &Path) -> PathBuf {
    base.with_extension("json")
}

pub fn save_subtitle(base: &Path, content: &str) -> bool {
    let path = subtitle_path(base);
    match path.parent().map(std::fs::create_dir_all).transpose().and_then(|_| std::fs::write(&path, content)) {
        Ok(()) => true,
        Err(error) => {
            tracing::error!(path = %path.display(), %error, "failed to save subtitle");
            false
        }
    }
}

pub fn load_subtitle(base: &Path) -> Option<String> {
    let path = subtitle_path(base);
    if !path.exists() {
        return None;
    }
    match std::fs::read_to_string(&path) {
        Ok(content) => Some(content),
        Err(error) => {
            tracing::error!(path = %path.display(), %error, "failed to load subtitle");
            None
        }
    }
}

pub fn save_thumbnail(base: &Path, png_bytes: &[u8]) -> bool {
    let path = thumbnail_path(base);
    match path.parent().map(std::fs::create_dir_all).transpose().and_then(|_| std::fs::write(&path, png_bytes)) {
        Ok(()) => true,
        Err(error) => {
            tracing::error!(path = %path.display(), %error, "failed to save thumbnail");
            false
        }
    }
}

/// Encodes a captured frame as PNG and writes it beside `base`.
pub fn save_thumbnail_frame(base: &Path, frame: &crate::domain::frame::Frame) -> bool {
    let mut buf = Vec::new();
    let rgb = frame.to_rgb_image();
    if let Err(error) = image::DynamicImage::ImageRgb8(rgb).write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png) {
        tracing::error!(%error, "failed to encode thumbnail");
        return false;
    }
    save_thumbnail(base, &buf)
}

pub fn load_thumbnail(base: &Path) -> Option<Vec<u8>> {
    let path = thumbnail_path(base);
    if !path.exists() {
        return None;
    }
    match std::fs::read(&path) {
        Ok(bytes) => Some(bytes),
        Err(error) => {
            tracing::error!(path = %path.display(), %error, "failed to load thumbnail");
            None
        }
    }
}

pub fn save_metadata(base: &Path, metadata: &RecordingMetadata) -> bool {
    save_metadata_dict(base, &metadata.to_dict())
}

pub fn save_metadata_dict(base: &Path, metadata: &BTreeMap<String, String>) -> bool {
    let path = metadata_path(base);
    let serialized = match serde_json::to_string_pretty(metadata) {
        Ok(s) => s,
        Err(error) => {
            tracing::error!(%error, "failed to serialize metadata");
            return false;
        }
    };
    match path.parent().map(std::fs::create_dir_all).transpose().and_then(|_| std::fs::write(&path, serialized)) {
        Ok(()) => true,
        Err(error) => {
            tracing::error!(path = %path.display(), %error, "failed to save metadata");
            false
        }
    }
}

pub fn load_metadata(base: &Path) -> Option<RecordingMetadata> {
    load_metadata_dict(base).map(|dict| RecordingMetadata::from_dict(&dict))
}

pub fn load_metadata_dict(base: &Path) -> Option<BTreeMap<String, String>> {
    let path = metadata_path(base);
    if !path.exists() {
        return None;
    }
    let contents = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(error) => {
            tracing::error!(path = %path.display(), %error, "failed to read metadata");
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(dict) => Some(dict),
        Err(error) => {
            tracing::error!(path = %path.display(), %error, "failed to parse metadata");
            None
        }
    }
}

/// Deletes the subtitle, thumbnail, and metadata sidecars if present.
/// Never errors: a missing sidecar is not a failure.
pub fn delete_related_files(base: &Path) {
    for path in [subtitle_path(base), thumbnail_path(base), metadata_path(base)] {
        if path.exists() {
            if let Err(error) = std::fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), %error, "failed to delete sidecar");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::game_mode::GameMode;
    use crate::domain::judgement::Judgement;
    use crate::domain::match_kind::MatchKind;
    use crate::domain::result::BattleResult;
    use crate::domain::rule::Rule;
    use crate::domain::stage::Stage;
    use chrono::{TimeZone, Utc};

    fn started_at() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 28, 21, 5, 30).unwrap()
    }

    #[test]
    fn battle_recordings_get_the_full_stem() {
        let metadata = RecordingMetadata {
            game_mode: GameMode::Battle,
            started_at: Some(started_at()),
            judgement: Some(Judgement::Win),
            result: Some(BattleOrSalmonResult::Battle(BattleResult {
                match_kind: MatchKind::XMatch,
                rule: Rule::Rainmaker,
                stage: Stage::MakoMart,
                kill: 1,
                death: 2,
                special: 3,
            })),
            ..Default::default()
        };
        let stem = generate_filename(&metadata).unwrap();
        assert_eq!(stem, format!("20260728_210530_{}_{}_win_{}", MatchKind::XMatch.value(), Rule::Rainmaker.value(), Stage::MakoMart.value()));
    }

    #[test]
    fn unfinished_recordings_get_just_the_timestamp() {
        let metadata = RecordingMetadata {
            game_mode: GameMode::Battle,
            started_at: Some(started_at()),
            ..Default::default()
        };
        assert_eq!(generate_filename(&metadata).unwrap(), "20260728_210530");
    }

    #[test]
    fn missing_started_at_has_no_stem() {
        assert!(generate_filename(&RecordingMetadata::default()).is_none());
    }

    #[test]
    fn sidecar_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("20260728_210530");

        assert!(save_subtitle(&base, "1\n00:00:00,000 --> 00:00:01,000\nnice\n"));
        assert_eq!(load_subtitle(&base).unwrap(), "1\n00:00:00,000 --> 00:00:01,000\nnice\n");

        let mut metadata = BTreeMap::new();
        metadata.insert("game_mode".to_string(), "battle".to_string());
        assert!(save_metadata_dict(&base, &metadata));
        assert_eq!(load_metadata_dict(&base).unwrap(), metadata);

        delete_related_files(&base);
        assert!(load_subtitle(&base).is_none());
        assert!(load_metadata_dict(&base).is_none());
    }
}
