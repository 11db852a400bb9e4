//! Power manager adapter: shells out to the OS's own sleep command. No
//! concrete adapter for this survived retrieval, only the `PowerPort`
//! protocol, so the per-OS commands below are this crate's own choice
//! rather than a translation, matching `ffmpeg_editor`'s and
//! `tesseract_ocr`'s "shell out to a well-known executable" shape.

use crate::error::{AppError, AppResult};
use crate::ports::power::PowerManager;
use async_trait::async_trait;
use tokio::process::Command;

#[derive(Default)]
pub struct SystemPowerManager;

impl SystemPowerManager {
    pub fn new() -> SystemPowerManager {
        SystemPowerManager
    }
}

#[async_trait]
impl PowerManager for SystemPowerManager {
    async fn sleep(&self) -> AppResult<()> {
        let (program, args): (&str, &[&str]) = if cfg!(target_os = "macos") {
            ("pmset", &["sleepnow"])
        } else if cfg!(target_os = "windows") {
            ("rundll32.exe", &["powrprof.dll,SetSuspendState", "0", "1", "0"])
        } else {
            ("systemctl", &["suspend"])
        };

        let status = Command::new(program).args(args).status().await.map_err(|error| AppError::Device(format!("failed to invoke sleep command '{program}': {error}")))?;

        if !status.success() {
            return Err(AppError::Device(format!("sleep command '{program}' exited with {status}")));
        }
        tracing::info!("system sleep requested");
        Ok(())
    }
}
