//! `VideoAsset`: a recorded or edited video plus its optional sidecars.
//!
//! Grounded on the source's `VideoAsset` dataclass. The asset's identity is
//! its video path; sidecars are expected (not verified here) to share its
//! filename stem.

use crate::domain::metadata::RecordingMetadata;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct VideoAsset {
    pub video: PathBuf,
    pub subtitle: Option<PathBuf>,
    pub thumbnail: Option<PathBuf>,
    pub metadata: Option<RecordingMetadata>,
}

impl VideoAsset {
    pub fn new(video: PathBuf) -> Self {
        VideoAsset {
            video,
            subtitle: None,
            thumbnail: None,
            metadata: None,
        }
    }

    pub fn with_subtitle(mut self, path: PathBuf) -> Self {
        self.subtitle = Some(path);
        self
    }

    pub fn with_thumbnail(mut self, path: PathBuf) -> Self {
        self.thumbnail = Some(path);
        self
    }

    pub fn with_metadata(mut self, metadata: RecordingMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// The filename stem shared by the video and its sidecars.
    pub fn stem(&self) -> Option<&str> {
        self.video.file_stem().and_then(|s| s.to_str())
    }
}
