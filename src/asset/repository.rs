//! Recorded/edited asset repositories (§4.L): move freshly recorded files
//! into permanent storage, list and delete them, and manage their sidecars.
//! Grounded on the source's `RecordedAssetRepository`/`EditedAssetRepository`.

use crate::asset::file_ops;
use crate::bus::EventBus;
use crate::config::VideoStorageSettings;
use crate::domain::asset::VideoAsset;
use crate::domain::events::build;
use crate::domain::frame::Frame;
use crate::domain::metadata::RecordingMetadata;
use crate::error::{AppError, AppResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct RecordedAssetRepository {
    settings: VideoStorageSettings,
    events: Arc<EventBus>,
}

impl RecordedAssetRepository {
    pub fn new(settings: VideoStorageSettings, events: Arc<EventBus>) -> Self {
        RecordedAssetRepository { settings, events }
    }

    /// Moves the just-stopped recording (and optional subtitle) into the
    /// recorded directory under a name derived from `metadata`, writes the
    /// thumbnail and metadata sidecars, and publishes `asset.recorded.saved`.
    pub fn save_recording(
        &self,
        video: &Path,
        srt: Option<&Path>,
        screenshot: Option<&Frame>,
        metadata: &RecordingMetadata,
    ) -> AppResult<VideoAsset> {
        let dest_dir = self.settings.recorded_dir();
        std::fs::create_dir_all(&dest_dir)
            .map_err(|e| AppError::Internal(format!("failed to create recorded directory: {e}")))?;

        let name_root = file_ops::generate_filename(metadata)
            .ok_or_else(|| AppError::Validation("metadata has no started_at timestamp".into()))?;
        let base = dest_dir.join(&name_root);

        if let Some(srt) = srt {
            let target = file_ops::subtitle_path(&base);
            if std::fs::rename(srt, &target).is_err() {
                tracing::warn!(from = %srt.display(), to = %target.display(), "failed to move subtitle into place");
            }
        }

        let extension = video.extension().and_then(|e| e.to_str()).unwrap_or("mkv");
        let target = base.with_extension(extension);
        let target = match std::fs::rename(video, &target) {
            Ok(()) => target,
            Err(error) => {
                tracing::warn!(%error, from = %video.display(), to = %target.display(), "failed to move recording, leaving it in place");
                video.to_path_buf()
            }
        };

        if let Some(frame) = screenshot {
            file_ops::save_thumbnail_frame(&base, frame);
        }
        file_ops::save_metadata(&base, metadata);

        tracing::info!(path = %target.display(), "recorded file saved");

        let has_subtitle = file_ops::subtitle_path(&base).exists();
        let has_thumbnail = file_ops::thumbnail_path(&base).exists();
        let started_at = metadata.started_at.map(|dt| dt.to_rfc3339());
        self.events.publish(build::asset_recorded_saved(
            &target.display().to_string(),
            has_subtitle,
            has_thumbnail,
            started_at.as_deref(),
        ));

        Ok(VideoAsset {
            video: target,
            subtitle: Some(file_ops::subtitle_path(&base)).filter(|p| p.exists()),
            thumbnail: Some(file_ops::thumbnail_path(&base)).filter(|p| p.exists()),
            metadata: Some(metadata.clone()),
        })
    }

    pub fn get_asset(&self, video: &Path) -> Option<VideoAsset> {
        let asset = self.load_asset(video);
        asset.metadata.as_ref()?;
        Some(asset)
    }

    pub fn list_recordings(&self) -> Vec<VideoAsset> {
        list_videos(&self.settings.recorded_dir()).into_iter().map(|v| self.load_asset(&v)).collect()
    }

    fn load_asset(&self, video: &Path) -> VideoAsset {
        VideoAsset {
            subtitle: Some(file_ops::subtitle_path(video)).filter(|p| p.exists()),
            thumbnail: Some(file_ops::thumbnail_path(video)).filter(|p| p.exists()),
            metadata: file_ops::load_metadata(video),
            video: video.to_path_buf(),
        }
    }

    pub fn delete_recording(&self, video: &Path) -> bool {
        if video.exists() {
            let _ = std::fs::remove_file(video);
        }
        file_ops::delete_related_files(video);
        self.events.publish(build::asset_recorded_deleted(&video.display().to_string()));
        !video.exists() && !file_ops::subtitle_path(video).exists() && !file_ops::thumbnail_path(video).exists() && !file_ops::metadata_path(video).exists()
    }

    pub fn get_subtitle(&self, video: &Path) -> Option<String> {
        file_ops::load_subtitle(video)
    }

    pub fn save_subtitle(&self, video: &Path, content: &str) -> bool {
        let saved = file_ops::save_subtitle(video, content);
        if saved {
            self.events.publish(build::asset_recorded_subtitle_updated(&video.display().to_string()));
        }
        saved
    }

    pub fn save_edited_metadata(&self, video: &Path, metadata: &RecordingMetadata) {
        file_ops::save_metadata(video, metadata);
        self.events.publish(build::asset_recorded_metadata_updated(&video.display().to_string()));
    }
}

pub struct EditedAssetRepository {
    settings: VideoStorageSettings,
    events: Arc<EventBus>,
}

impl EditedAssetRepository {
    pub fn new(settings: VideoStorageSettings, events: Arc<EventBus>) -> Self {
        EditedAssetRepository { settings, events }
    }

    /// Moves an edited file (and its sidecars) into the edited directory,
    /// keeping its existing filename.
    pub fn save_edited(&self, video: &Path) -> AppResult<PathBuf> {
        let dest_dir = self.settings.edited_dir();
        std::fs::create_dir_all(&dest_dir).map_err(|e| AppError::Internal(format!("failed to create edited directory: {e}")))?;

        let file_name = video.file_name().ok_or_else(|| AppError::Validation("video path has no file name".into()))?;
        let target = dest_dir.join(file_name);

        let target = match std::fs::rename(video, &target) {
            Ok(()) => target,
            Err(error) => {
                tracing::warn!(%error, from = %video.display(), to = %target.display(), "failed to move edited file, leaving it in place");
                video.to_path_buf()
            }
        };

        for (from, to) in [
            (file_ops::subtitle_path(video), file_ops::subtitle_path(&target)),
            (file_ops::thumbnail_path(video), file_ops::thumbnail_path(&target)),
            (file_ops::metadata_path(video), file_ops::metadata_path(&target)),
        ] {
            if from.exists() {
                if let Err(error) = std::fs::rename(&from, &to) {
                    tracing::error!(%error, from = %from.display(), to = %to.display(), "failed to move sidecar");
                }
            }
        }

        tracing::info!(path = %target.display(), "edited file saved");
        self.events.publish(build::asset_edited_saved(&target.display().to_string()));
        Ok(target)
    }

    pub fn list_edited(&self) -> Vec<PathBuf> {
        list_videos(&self.settings.edited_dir())
    }

    pub fn delete_edited(&self, video: &Path) -> bool {
        if video.exists() {
            let _ = std::fs::remove_file(video);
        }
        file_ops::delete_related_files(video);
        self.events.publish(build::asset_edited_deleted(&video.display().to_string()));
        !video.exists() && !file_ops::subtitle_path(video).exists() && !file_ops::thumbnail_path(video).exists() && !file_ops::metadata_path(video).exists()
    }

    pub fn get_subtitle(&self, video: &Path) -> Option<String> {
        file_ops::load_subtitle(video)
    }

    pub fn save_subtitle(&self, video: &Path, content: &str) -> bool {
        file_ops::save_subtitle(video, content)
    }

    pub fn get_thumbnail(&self, video: &Path) -> Option<Vec<u8>> {
        file_ops::load_thumbnail(video)
    }

    pub fn save_thumbnail(&self, video: &Path, png_bytes: &[u8]) -> bool {
        file_ops::save_thumbnail(video, png_bytes)
    }

    pub fn get_metadata(&self, video: &Path) -> Option<BTreeMap<String, String>> {
        file_ops::load_metadata_dict(video)
    }

    pub fn save_metadata(&self, video: &Path, metadata: &BTreeMap<String, String>) -> bool {
        file_ops::save_metadata_dict(video, metadata)
    }
}

fn list_videos(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| matches!(path.extension().and_then(|e| e.to_str()), Some("mkv") | Some("mp4")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::game_mode::GameMode;
    use chrono::Utc;

    fn settings(dir: &Path) -> VideoStorageSettings {
        VideoStorageSettings { base_dir: dir.to_path_buf() }
    }

    #[test]
    fn save_recording_moves_the_video_and_writes_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("raw.mkv");
        std::fs::write(&video, b"fake video bytes").unwrap();

        let repo = RecordedAssetRepository::new(settings(dir.path()), Arc::new(EventBus::default()));
        let metadata = RecordingMetadata {
            game_mode: GameMode::Battle,
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        let asset = repo.save_recording(&video, None, None, &metadata).unwrap();
        assert!(asset.video.exists());
        assert!(!video.exists());
        assert!(file_ops::metadata_path(&asset.video.with_extension("")).exists());
    }

    #[test]
    fn delete_recording_removes_video_and_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("20260728_000000.mkv");
        std::fs::write(&video, b"x").unwrap();
        file_ops::save_subtitle(&video.with_extension(""), "sub");

        let repo = RecordedAssetRepository::new(settings(dir.path()), Arc::new(EventBus::default()));
        assert!(repo.delete_recording(&video));
        assert!(!video.exists());
    }

    #[test]
    fn list_recordings_only_picks_up_video_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("recorded")).unwrap();
        std::fs::write(dir.path().join("recorded/a.mkv"), b"x").unwrap();
        std::fs::write(dir.path().join("recorded/notes.txt"), b"x").unwrap();

        let repo = RecordedAssetRepository::new(settings(dir.path()), Arc::new(EventBus::default()));
        assert_eq!(repo.list_recordings().len(), 1);
    }
}
