//! Editor adapter (§4.K): shells out to `ffmpeg`/`ffprobe`, the same
//! executables module N's system check verifies are on `PATH`. No editor
//! adapter file survived retrieval (see `editor::AutoEditor`'s own module
//! comment), so the argument shapes below are this crate's own, built
//! around ffmpeg's well-known concat-demuxer, `volume`, and metadata-mux
//! flags rather than translated from any one source file.

use crate::error::{AppError, AppResult};
use crate::ports::editor::Editor;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;

pub struct FfmpegEditor {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegEditor {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> FfmpegEditor {
        FfmpegEditor { ffmpeg: ffmpeg.into(), ffprobe: ffprobe.into() }
    }

    async fn run(&self, args: &[&std::ffi::OsStr]) -> AppResult<()> {
        let output = Command::new(&self.ffmpeg).args(args).output().await.map_err(|error| AppError::Device(format!("failed to run ffmpeg: {error}")))?;
        if !output.status.success() {
            return Err(AppError::Internal(format!("ffmpeg failed: {}", String::from_utf8_lossy(&output.stderr))));
        }
        Ok(())
    }
}

#[async_trait]
impl Editor for FfmpegEditor {
    async fn merge(&self, clips: &[PathBuf], out: &Path) -> AppResult<PathBuf> {
        if clips.is_empty() {
            return Err(AppError::Validation("no clips to merge".into()));
        }
        let list_path = out.with_extension("concat.txt");
        let list = clips.iter().map(|clip| format!("file '{}'", clip.display())).collect::<Vec<_>>().join("\n");
        std::fs::write(&list_path, list).map_err(|error| AppError::Internal(format!("failed to write concat list: {error}")))?;

        let result = self
            .run(&[
                "-y".as_ref(),
                "-f".as_ref(),
                "concat".as_ref(),
                "-safe".as_ref(),
                "0".as_ref(),
                "-i".as_ref(),
                list_path.as_os_str(),
                "-c".as_ref(),
                "copy".as_ref(),
                out.as_os_str(),
            ])
            .await;
        let _ = std::fs::remove_file(&list_path);
        result.map(|()| out.to_path_buf())
    }

    async fn embed_metadata(&self, video: &Path, metadata: &serde_json::Value) -> AppResult<()> {
        let mut args: Vec<std::ffi::OsString> = vec!["-y".into(), "-i".into(), video.into()];
        if let Some(map) = metadata.as_object() {
            for (key, value) in map {
                if let Some(text) = value.as_str() {
                    args.push("-metadata".into());
                    args.push(format!("{key}={text}").into());
                }
            }
        }
        let temp = video.with_extension("metadata.tmp.mkv");
        args.push("-c".into());
        args.push("copy".into());
        args.push(temp.clone().into());
        let refs: Vec<&std::ffi::OsStr> = args.iter().map(|a| a.as_os_str()).collect();
        self.run(&refs).await?;
        std::fs::rename(&temp, video).map_err(|error| AppError::Internal(format!("failed to replace video with metadata pass: {error}")))
    }

    async fn embed_subtitle(&self, video: &Path, subtitle: &Path) -> AppResult<()> {
        let temp = video.with_extension("subtitle.tmp.mkv");
        self.run(&[
            "-y".as_ref(),
            "-i".as_ref(),
            video.as_os_str(),
            "-i".as_ref(),
            subtitle.as_os_str(),
            "-c".as_ref(),
            "copy".as_ref(),
            "-c:s".as_ref(),
            "srt".as_ref(),
            temp.as_os_str(),
        ])
        .await?;
        std::fs::rename(&temp, video).map_err(|error| AppError::Internal(format!("failed to replace video with subtitle pass: {error}")))
    }

    async fn embed_thumbnail(&self, video: &Path, thumbnail: &Path) -> AppResult<()> {
        let temp = video.with_extension("thumb.tmp.mkv");
        self.run(&[
            "-y".as_ref(),
            "-i".as_ref(),
            video.as_os_str(),
            "-i".as_ref(),
            thumbnail.as_os_str(),
            "-map".as_ref(),
            "0".as_ref(),
            "-map".as_ref(),
            "1".as_ref(),
            "-c".as_ref(),
            "copy".as_ref(),
            "-disposition:v:1".as_ref(),
            "attached_pic".as_ref(),
            temp.as_os_str(),
        ])
        .await?;
        std::fs::rename(&temp, video).map_err(|error| AppError::Internal(format!("failed to replace video with thumbnail pass: {error}")))
    }

    async fn get_metadata(&self, video: &Path) -> AppResult<serde_json::Value> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(video)
            .output()
            .await
            .map_err(|error| AppError::Device(format!("failed to run ffprobe: {error}")))?;
        if !output.status.success() {
            return Err(AppError::Internal(format!("ffprobe failed: {}", String::from_utf8_lossy(&output.stderr))));
        }
        let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).map_err(|error| AppError::Internal(format!("failed to parse ffprobe output: {error}")))?;
        Ok(parsed.get("format").and_then(|f| f.get("tags")).cloned().unwrap_or(serde_json::Value::Object(Default::default())))
    }

    async fn get_subtitle(&self, video: &Path) -> AppResult<Option<PathBuf>> {
        let candidate = video.with_extension("srt");
        Ok(candidate.exists().then_some(candidate))
    }

    async fn get_thumbnail(&self, video: &Path) -> AppResult<Option<PathBuf>> {
        let candidate = video.with_extension("jpg");
        Ok(candidate.exists().then_some(candidate))
    }

    async fn change_volume(&self, video: &Path, factor: f64) -> AppResult<()> {
        let temp = video.with_extension("volume.tmp.mkv");
        self.run(&[
            "-y".as_ref(),
            "-i".as_ref(),
            video.as_os_str(),
            "-af".as_ref(),
            format!("volume={factor}").as_ref(),
            "-c:v".as_ref(),
            "copy".as_ref(),
            temp.as_os_str(),
        ])
        .await?;
        std::fs::rename(&temp, video).map_err(|error| AppError::Internal(format!("failed to replace video with volume pass: {error}")))
    }

    async fn get_video_length(&self, video: &Path) -> AppResult<Duration> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "quiet", "-print_format", "default=noprint_wrappers=1:nokey=1", "-show_entries", "format=duration"])
            .arg(video)
            .output()
            .await
            .map_err(|error| AppError::Device(format!("failed to run ffprobe: {error}")))?;
        let text = String::from_utf8_lossy(&output.stdout);
        let seconds: f64 = text.trim().parse().map_err(|_| AppError::Internal(format!("unexpected ffprobe duration output: {text}")))?;
        Ok(Duration::from_secs_f64(seconds.max(0.0)))
    }

    async fn add_audio_track(&self, video: &Path, audio: &Path) -> AppResult<()> {
        let temp = video.with_extension("audio.tmp.mkv");
        self.run(&[
            "-y".as_ref(),
            "-i".as_ref(),
            video.as_os_str(),
            "-i".as_ref(),
            audio.as_os_str(),
            "-map".as_ref(),
            "0".as_ref(),
            "-map".as_ref(),
            "1:a".as_ref(),
            "-c".as_ref(),
            "copy".as_ref(),
            temp.as_os_str(),
        ])
        .await?;
        std::fs::rename(&temp, video).map_err(|error| AppError::Internal(format!("failed to replace video with added audio track: {error}")))
    }

    async fn list_video_devices(&self) -> AppResult<Vec<String>> {
        let platform_flag = if cfg!(target_os = "macos") {
            "avfoundation"
        } else if cfg!(target_os = "windows") {
            "dshow"
        } else {
            "v4l2"
        };
        let output = Command::new(&self.ffmpeg).args(["-f", platform_flag, "-list_devices", "true", "-i", "dummy"]).output().await.map_err(|error| AppError::Device(format!("failed to run ffmpeg: {error}")))?;
        let text = String::from_utf8_lossy(&output.stderr);
        Ok(text.lines().filter(|line| line.contains('[') && line.contains(']')).map(|line| line.trim().to_string()).collect())
    }
}
