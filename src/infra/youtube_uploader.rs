//! YouTube uploader adapter: resumable upload to the YouTube Data API v3,
//! streaming the video file from disk the same way the teacher's
//! `upload::presigned::Uploader` streams chunks to a pre-signed URL
//! (`tokio::fs::File` + `ReaderStream` + `reqwest::Body::wrap_stream`,
//! never loading the whole file into RAM). The OAuth access token is read
//! from an environment variable rather than the TOML config, so a refresh
//! token never ends up written to disk next to the rest of the settings.

use crate::error::{AppError, AppResult};
use crate::ports::uploader::{Privacy, Uploader};
use async_trait::async_trait;
use reqwest::{Body, Client};
use serde::Deserialize;
use std::path::Path;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

const ACCESS_TOKEN_ENV: &str = "YOUTUBE_ACCESS_TOKEN";
const UPLOAD_INIT_URL: &str = "https://www.googleapis.com/upload/youtube/v3/videos?uploadType=resumable&part=snippet,status";
const THUMBNAIL_URL: &str = "https://www.googleapis.com/upload/youtube/v3/thumbnails/set";
const CAPTIONS_URL: &str = "https://www.googleapis.com/upload/youtube/v3/captions?part=snippet";
const PLAYLIST_ITEMS_URL: &str = "https://www.googleapis.com/youtube/v3/playlistItems?part=snippet";

#[derive(Deserialize)]
struct VideoInsertResponse {
    id: String,
}

pub struct YoutubeUploader {
    http: Client,
}

impl YoutubeUploader {
    pub fn new() -> YoutubeUploader {
        YoutubeUploader { http: Client::new() }
    }

    fn access_token(&self) -> AppResult<String> {
        std::env::var(ACCESS_TOKEN_ENV).map_err(|_| AppError::Authentication(format!("{ACCESS_TOKEN_ENV} is not set")))
    }

    fn privacy_status(privacy: Privacy) -> &'static str {
        match privacy {
            Privacy::Public => "public",
            Privacy::Unlisted => "unlisted",
            Privacy::Private => "private",
        }
    }

    async fn open_resumable_session(&self, token: &str, title: &str, description: &str, tags: &[String], privacy: Privacy, playlist_id: Option<&str>) -> AppResult<String> {
        let _ = playlist_id;
        let metadata = serde_json::json!({
            "snippet": {
                "title": title,
                "description": description,
                "tags": tags,
            },
            "status": {
                "privacyStatus": Self::privacy_status(privacy),
            },
        });

        let response = self
            .http
            .post(UPLOAD_INIT_URL)
            .bearer_auth(token)
            .header("X-Upload-Content-Type", "video/mp4")
            .json(&metadata)
            .send()
            .await
            .map_err(|error| AppError::Device(format!("failed to open resumable upload session: {error}")))?;

        if !response.status().is_success() {
            return Err(AppError::Device(format!("youtube rejected upload session: {}", response.status())));
        }
        response
            .headers()
            .get("Location")
            .and_then(|value| value.to_str().ok())
            .map(ToString::to_string)
            .ok_or_else(|| AppError::Internal("youtube did not return a resumable upload location".into()))
    }

    async fn stream_video(&self, token: &str, session_url: &str, path: &Path) -> AppResult<String> {
        let metadata = tokio::fs::metadata(path).await.map_err(|error| AppError::Internal(format!("failed to read video metadata: {error}")))?;
        let file = File::open(path).await.map_err(|error| AppError::Internal(format!("failed to open video file: {error}")))?;
        let body = Body::wrap_stream(ReaderStream::new(file));

        let response = self
            .http
            .put(session_url)
            .bearer_auth(token)
            .header("Content-Type", "video/mp4")
            .header("Content-Length", metadata.len())
            .body(body)
            .send()
            .await
            .map_err(|error| AppError::Device(format!("failed to stream video upload: {error}")))?;

        if !response.status().is_success() {
            return Err(AppError::Device(format!("youtube upload failed: {}", response.status())));
        }
        let parsed: VideoInsertResponse = response.json().await.map_err(|error| AppError::Internal(format!("failed to parse video insert response: {error}")))?;
        Ok(parsed.id)
    }

    async fn set_thumbnail(&self, token: &str, video_id: &str, thumbnail: &Path) -> AppResult<()> {
        let bytes = tokio::fs::read(thumbnail).await.map_err(|error| AppError::Internal(format!("failed to read thumbnail: {error}")))?;
        let response = self
            .http
            .post(format!("{THUMBNAIL_URL}?videoId={video_id}"))
            .bearer_auth(token)
            .header("Content-Type", "image/png")
            .body(bytes)
            .send()
            .await
            .map_err(|error| AppError::Device(format!("failed to upload thumbnail: {error}")))?;
        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "youtube thumbnail upload failed");
        }
        Ok(())
    }

    async fn upload_caption(&self, token: &str, video_id: &str, caption: &Path, name: &str, language: &str) -> AppResult<()> {
        let metadata = serde_json::json!({
            "snippet": {
                "videoId": video_id,
                "language": language,
                "name": name,
                "isDraft": false,
            },
        });
        let bytes = tokio::fs::read(caption).await.map_err(|error| AppError::Internal(format!("failed to read caption file: {error}")))?;
        let form = reqwest::multipart::Form::new()
            .part("metadata", reqwest::multipart::Part::text(metadata.to_string()).mime_str("application/json").map_err(|error| AppError::Internal(format!("invalid caption metadata part: {error}")))?)
            .part("file", reqwest::multipart::Part::bytes(bytes).file_name("captions.srt").mime_str("application/octet-stream").map_err(|error| AppError::Internal(format!("invalid caption file part: {error}")))?);

        let response = self.http.post(CAPTIONS_URL).bearer_auth(token).multipart(form).send().await.map_err(|error| AppError::Device(format!("failed to upload captions: {error}")))?;
        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "youtube caption upload failed");
        }
        Ok(())
    }

    async fn add_to_playlist(&self, token: &str, video_id: &str, playlist_id: &str) -> AppResult<()> {
        let body = serde_json::json!({
            "snippet": {
                "playlistId": playlist_id,
                "resourceId": {
                    "kind": "youtube#video",
                    "videoId": video_id,
                },
            },
        });
        let response = self.http.post(PLAYLIST_ITEMS_URL).bearer_auth(token).json(&body).send().await.map_err(|error| AppError::Device(format!("failed to add video to playlist: {error}")))?;
        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "youtube playlist insert failed");
        }
        Ok(())
    }
}

impl Default for YoutubeUploader {
    fn default() -> Self {
        YoutubeUploader::new()
    }
}

#[async_trait]
impl Uploader for YoutubeUploader {
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
    ) -> AppResult<String> {
        let token = self.access_token()?;
        tracing::info!(path = %path.display(), title, "starting youtube upload");

        let session_url = self.open_resumable_session(&token, title, description, tags, privacy, playlist_id).await?;
        let video_id = self.stream_video(&token, &session_url, path).await?;

        if let Some(thumbnail) = thumbnail {
            self.set_thumbnail(&token, &video_id, thumbnail).await?;
        }
        if let Some(caption) = caption {
            self.upload_caption(&token, &video_id, caption, "captions", "ja").await?;
        }
        if let Some(playlist_id) = playlist_id {
            self.add_to_playlist(&token, &video_id, playlist_id).await?;
        }

        tracing::info!(video_id, "youtube upload complete");
        Ok(video_id)
    }
}
