//! Uploader port: publishes an edited clip to a video platform (module L).

use crate::error::AppError;
use async_trait::async_trait;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privacy {
    Public,
    Unlisted,
    Private,
}

#[async_trait]
pub trait Uploader: Send + Sync {
    /// Uploads `path` and returns the platform's id for the published video.
    #[allow(clippy::too_many_arguments)]
    async fn upload(
        &self,
        path: &Path,
        title: &str,
        description: &str,
        tags: &[String],
        privacy: Privacy,
        thumbnail: Option<&Path>,
        caption: Option<&Path>,
        playlist_id: Option<&str>,
    ) -> Result<String, AppError>;
}
