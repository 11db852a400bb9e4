//! Auto-uploader (§4.L): uploads every edited clip in turn, attaching its
//! sidecar caption and thumbnail, adds it to a playlist, then deletes the
//! local edited asset. Grounded on the source's `AutoUploader`.

use crate::asset::EditedAssetRepository;
use crate::config::UploadSettings;
use crate::error::AppResult;
use crate::ports::uploader::Privacy;
use crate::ports::Uploader;
use crate::progress::ProgressReporter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const TASK_ID: &str = "auto_upload";

fn parse_privacy(status: &str) -> Privacy {
    match status {
        "public" => Privacy::Public,
        "unlisted" => Privacy::Unlisted,
        _ => Privacy::Private,
    }
}

pub struct AutoUploader {
    uploader: Arc<dyn Uploader>,
    edited: Arc<EditedAssetRepository>,
    progress: Arc<ProgressReporter>,
    settings: UploadSettings,
    cancelled: AtomicBool,
}

impl AutoUploader {
    pub fn new(uploader: Arc<dyn Uploader>, edited: Arc<EditedAssetRepository>, progress: Arc<ProgressReporter>, settings: UploadSettings) -> AutoUploader {
        AutoUploader { uploader, edited, progress, settings, cancelled: AtomicBool::new(false) }
    }

    /// Honored between items, not mid-upload (§5 "a cancellation is a
    /// clean stop, not an abort of an in-flight external call").
    pub fn request_cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub async fn execute(&self) -> AppResult<()> {
        self.cancelled.store(false, Ordering::SeqCst);
        tracing::info!("starting auto upload");

        let videos = self.edited.list_edited();
        let items: Vec<String> = videos
            .iter()
            .map(|video| {
                self.edited
                    .get_metadata(video)
                    .and_then(|m| m.get("title").cloned())
                    .unwrap_or_else(|| video.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default())
            })
            .collect();
        self.progress.start_task(TASK_ID, "Preparing upload", Some(items.len() as u64), Some(items));

        for (index, video) in videos.iter().enumerate() {
            if self.cancelled.load(Ordering::SeqCst) {
                self.progress.finish(TASK_ID, false, Some("auto upload cancelled"));
                tracing::info!("auto upload cancelled");
                return Ok(());
            }

            tracing::info!(path = %video.display(), "uploading");
            self.upload_one(index as u32, video).await?;
            self.progress.item_stage(TASK_ID, index as u32, "delete", "Deleting local file", None);
            self.edited.delete_edited(video);
            self.progress.advance(TASK_ID, 1);
        }

        self.progress.finish(TASK_ID, true, Some("auto upload complete"));
        tracing::info!("auto upload complete");
        Ok(())
    }

    async fn upload_one(&self, index: u32, path: &Path) -> AppResult<()> {
        self.progress.item_stage(TASK_ID, index, "collect", "Collecting file info", None);

        let metadata = self.edited.get_metadata(path).unwrap_or_default();
        let title = metadata.get("title").cloned().unwrap_or_default();
        let description = metadata.get("description").cloned().unwrap_or_default();

        let temp_thumbnail = self.edited.get_thumbnail(path).and_then(|bytes| write_temp(path, "png", &bytes));
        let temp_subtitle = self.edited.get_subtitle(path).and_then(|text| write_temp_text(path, "srt", &text));

        let result = self.upload_with_sidecars(index, path, &title, &description, temp_thumbnail.as_deref(), temp_subtitle.as_deref()).await;

        if let Some(thumbnail) = &temp_thumbnail {
            let _ = std::fs::remove_file(thumbnail);
        }
        if let Some(subtitle) = &temp_subtitle {
            let _ = std::fs::remove_file(subtitle);
        }

        result
    }

    async fn upload_with_sidecars(
        &self,
        index: u32,
        path: &Path,
        title: &str,
        description: &str,
        thumbnail: Option<&Path>,
        subtitle: Option<&Path>,
    ) -> AppResult<()> {
        self.progress.item_stage(TASK_ID, index, "upload", "Uploading", Some(&path.display().to_string()));

        let tags = self.settings.tags.clone().unwrap_or_default();
        self.uploader
            .upload(
                path,
                title,
                description,
                &tags,
                parse_privacy(&self.settings.privacy_status),
                thumbnail,
                subtitle,
                self.settings.playlist_id.as_deref(),
            )
            .await?;

        if let Some(subtitle) = subtitle {
            self.progress.item_stage(TASK_ID, index, "caption", "Uploading caption", subtitle.file_name().and_then(|n| n.to_str()));
        }
        if let Some(thumbnail) = thumbnail {
            self.progress.item_stage(TASK_ID, index, "thumb", "Uploading thumbnail", thumbnail.file_name().and_then(|n| n.to_str()));
        }
        self.progress.item_stage(TASK_ID, index, "playlist", "Adding to playlist", path.file_name().and_then(|n| n.to_str()));
        Ok(())
    }
}

fn write_temp(base: &Path, extension: &str, bytes: &[u8]) -> Option<PathBuf> {
    let target = base.with_extension(format!("tmp.{extension}"));
    std::fs::write(&target, bytes).ok().map(|_| target)
}

fn write_temp_text(base: &Path, extension: &str, text: &str) -> Option<PathBuf> {
    let target = base.with_extension(format!("tmp.{extension}"));
    std::fs::write(&target, text).ok().map(|_| target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_privacy_statuses() {
        assert_eq!(parse_privacy("public"), Privacy::Public);
        assert_eq!(parse_privacy("unlisted"), Privacy::Unlisted);
        assert_eq!(parse_privacy("private"), Privacy::Private);
        assert_eq!(parse_privacy("garbage"), Privacy::Private);
    }
}
