//! Configuration (§6): one TOML file, loaded once at startup and written
//! back on first run. Mirrors the teacher's `Config::load`/`Config::save`
//! shape exactly; section names and defaults follow the original's
//! `shared/config/*.py` pydantic settings one-for-one.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub capture_device: CaptureDeviceSettings,

    #[serde(default)]
    pub obs: ObsSettings,

    #[serde(default)]
    pub record: RecordSettings,

    #[serde(default)]
    pub analyzer: AnalyzerSettings,

    #[serde(default)]
    pub speech_transcriber: SpeechTranscriberSettings,

    #[serde(default)]
    pub storage: VideoStorageSettings,

    #[serde(default)]
    pub video_edit: VideoEditSettings,

    #[serde(default)]
    pub upload: UploadSettings,

    #[serde(default)]
    pub behavior: BehaviorSettings,

    /// Path the config was loaded from / will be saved to.
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

/// The NDI/capture-card source the frame producer reads from; named, not
/// indexed, since device enumeration order isn't stable across reboots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureDeviceSettings {
    #[serde(default = "default_capture_device_name")]
    pub name: String,
}

impl Default for CaptureDeviceSettings {
    fn default() -> Self {
        Self {
            name: default_capture_device_name(),
        }
    }
}

fn default_capture_device_name() -> String {
    "Capture Device".to_string()
}

/// OBS WebSocket connection details for the `Recorder` port adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObsSettings {
    #[serde(default = "default_obs_host")]
    pub websocket_host: String,
    #[serde(default = "default_obs_port")]
    pub websocket_port: u16,
    /// Empty string means no password configured.
    #[serde(default)]
    pub websocket_password: String,
    pub executable_path: Option<PathBuf>,
}

impl Default for ObsSettings {
    fn default() -> Self {
        Self {
            websocket_host: default_obs_host(),
            websocket_port: default_obs_port(),
            websocket_password: String::new(),
            executable_path: None,
        }
    }
}

fn default_obs_host() -> String {
    "localhost".to_string()
}

fn default_obs_port() -> u16 {
    4455
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSettings {
    /// Which capture index OBS's virtual camera is exposed on; 0 is
    /// typically the PC's built-in camera, 1 the capture card, 2 OBS.
    #[serde(default = "default_capture_index")]
    pub capture_index: u32,
    #[serde(default = "default_video_width")]
    pub width: u32,
    #[serde(default = "default_video_height")]
    pub height: u32,
}

impl Default for RecordSettings {
    fn default() -> Self {
        Self {
            capture_index: default_capture_index(),
            width: default_video_width(),
            height: default_video_height(),
        }
    }
}

fn default_capture_index() -> u32 {
    2
}

fn default_video_width() -> u32 {
    1920
}

fn default_video_height() -> u32 {
    1080
}

/// Where the matcher registry loads its definitions and template/mask
/// assets from; not part of the original's settings (matchers lived beside
/// the code there) but needed here since `matchers.yaml` is data, not code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerSettings {
    #[serde(default = "default_matchers_path")]
    pub matchers_path: PathBuf,
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            matchers_path: default_matchers_path(),
            assets_dir: default_assets_dir(),
        }
    }
}

fn default_matchers_path() -> PathBuf {
    PathBuf::from("matchers.yaml")
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechTranscriberSettings {
    /// Empty string disables transcription entirely.
    #[serde(default = "default_mic_device_name")]
    pub mic_device_name: String,
    #[serde(default)]
    pub groq_api_key: String,
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_speech_language")]
    pub language: String,
    #[serde(default = "default_phrase_time_limit")]
    pub phrase_time_limit_seconds: f64,
    #[serde(default = "default_custom_dictionary")]
    pub custom_dictionary: Vec<String>,
}

impl Default for SpeechTranscriberSettings {
    fn default() -> Self {
        Self {
            mic_device_name: default_mic_device_name(),
            groq_api_key: String::new(),
            model: String::new(),
            language: default_speech_language(),
            phrase_time_limit_seconds: default_phrase_time_limit(),
            custom_dictionary: default_custom_dictionary(),
        }
    }
}

fn default_mic_device_name() -> String {
    "Microphone".to_string()
}

fn default_speech_language() -> String {
    "ja-JP".to_string()
}

fn default_phrase_time_limit() -> f64 {
    3.0
}

fn default_custom_dictionary() -> Vec<String> {
    vec!["ナイス".to_string(), "キル".to_string(), "デス".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoStorageSettings {
    #[serde(default = "default_storage_base_dir")]
    pub base_dir: PathBuf,
}

impl Default for VideoStorageSettings {
    fn default() -> Self {
        Self {
            base_dir: default_storage_base_dir(),
        }
    }
}

impl VideoStorageSettings {
    pub fn recorded_dir(&self) -> PathBuf {
        self.base_dir.join("recorded")
    }

    pub fn edited_dir(&self) -> PathBuf {
        self.base_dir.join("edited")
    }
}

fn default_storage_base_dir() -> PathBuf {
    PathBuf::from("videos")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoEditSettings {
    #[serde(default = "default_volume_multiplier")]
    pub volume_multiplier: f64,
    /// Configurable group size limit for §4.K step 1 (grouping recordings
    /// by `(gameMode, match, rule, date)`).
    #[serde(default = "default_group_size_limit")]
    pub group_size_limit: usize,
    pub title_template: Option<String>,
    pub description_template: Option<String>,
    pub chapter_template: Option<String>,
    pub font_path: Option<PathBuf>,
}

impl Default for VideoEditSettings {
    fn default() -> Self {
        Self {
            volume_multiplier: default_volume_multiplier(),
            group_size_limit: default_group_size_limit(),
            title_template: None,
            description_template: None,
            chapter_template: None,
            font_path: None,
        }
    }
}

fn default_volume_multiplier() -> f64 {
    1.0
}

fn default_group_size_limit() -> usize {
    12
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSettings {
    #[serde(default = "default_privacy_status")]
    pub privacy_status: String,
    pub tags: Option<Vec<String>>,
    pub playlist_id: Option<String>,
    #[serde(default = "default_caption_name")]
    pub caption_name: String,
    #[serde(default = "default_caption_language")]
    pub caption_language: String,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            privacy_status: default_privacy_status(),
            tags: None,
            playlist_id: None,
            caption_name: default_caption_name(),
            caption_language: default_caption_language(),
        }
    }
}

fn default_privacy_status() -> String {
    "private".to_string()
}

fn default_caption_name() -> String {
    "ひとりごと".to_string()
}

fn default_caption_language() -> String {
    "ja".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorSettings {
    #[serde(default = "default_true")]
    pub edit_after_power_off: bool,
    #[serde(default)]
    pub sleep_after_upload: bool,
    /// Grace period (§4.M) between `power_off_detected(final=true)` and the
    /// auto edit→upload run actually starting, during which the user may
    /// cancel.
    #[serde(default = "default_auto_process_grace_seconds")]
    pub auto_process_grace_seconds: f64,
}

impl Default for BehaviorSettings {
    fn default() -> Self {
        Self {
            edit_after_power_off: true,
            sleep_after_upload: false,
            auto_process_grace_seconds: default_auto_process_grace_seconds(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_auto_process_grace_seconds() -> f64 {
    60.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture_device: CaptureDeviceSettings::default(),
            obs: ObsSettings::default(),
            record: RecordSettings::default(),
            analyzer: AnalyzerSettings::default(),
            speech_transcriber: SpeechTranscriberSettings::default(),
            storage: VideoStorageSettings::default(),
            video_edit: VideoEditSettings::default(),
            upload: UploadSettings::default(),
            behavior: BehaviorSettings::default(),
            config_path: None,
        }
    }
}

impl Config {
    /// Loads `splat-replay.toml` from the platform config directory,
    /// writing a freshly defaulted one out if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            let contents =
                std::fs::read_to_string(&config_path).with_context(|| format!("failed to read config file: {config_path:?}"))?;
            let mut config: Config =
                toml::from_str(&contents).with_context(|| format!("failed to parse config file: {config_path:?}"))?;
            config.config_path = Some(config_path);
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = self.config_path.clone().unwrap_or(Self::default_config_path()?);

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("failed to create config directory: {parent:?}"))?;
        }

        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(&config_path, contents).with_context(|| format!("failed to write config file: {config_path:?}"))?;
        Ok(())
    }

    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => Self::default_config_path(),
        }
    }

    fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("dev", "splat-replay", "splat-replay")
            .context("failed to determine config directory")?;
        Ok(proj_dirs.config_dir().join("splat-replay.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_recorded_dir_convention() {
        let config = Config::default();
        assert_eq!(config.storage.recorded_dir(), PathBuf::from("videos/recorded"));
        assert_eq!(config.storage.edited_dir(), PathBuf::from("videos/edited"));
    }

    #[test]
    fn round_trips_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let restored: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(restored.obs.websocket_port, config.obs.websocket_port);
        assert_eq!(restored.upload.privacy_status, config.upload.privacy_status);
    }
}
