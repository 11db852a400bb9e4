//! Editor port: the video-editing backend module K drives to merge clips
//! and embed metadata/subtitle/thumbnail sidecars.

use crate::error::AppError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[async_trait]
pub trait Editor: Send + Sync {
    async fn merge(&self, clips: &[PathBuf], out: &Path) -> Result<PathBuf, AppError>;

    async fn embed_metadata(&self, video: &Path, metadata: &serde_json::Value) -> Result<(), AppError>;
    async fn embed_subtitle(&self, video: &Path, subtitle: &Path) -> Result<(), AppError>;
    async fn embed_thumbnail(&self, video: &Path, thumbnail: &Path) -> Result<(), AppError>;

    async fn get_metadata(&self, video: &Path) -> Result<serde_json::Value, AppError>;
    async fn get_subtitle(&self, video: &Path) -> Result<Option<PathBuf>, AppError>;
    async fn get_thumbnail(&self, video: &Path) -> Result<Option<PathBuf>, AppError>;

    async fn change_volume(&self, video: &Path, factor: f64) -> Result<(), AppError>;
    async fn get_video_length(&self, video: &Path) -> Result<Duration, AppError>;
    async fn add_audio_track(&self, video: &Path, audio: &Path) -> Result<(), AppError>;

    async fn list_video_devices(&self) -> Result<Vec<String>, AppError>;
}
