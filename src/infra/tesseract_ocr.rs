//! OCR adapter: shells out to the `tesseract` executable the same way
//! module N's system check probes for it, writing the ROI to a temp PNG and
//! reading recognized text back from stdout. No embedded OCR library
//! appears anywhere in the teacher or pack, so the external-process
//! approach is the crate's own choice, matching `ffmpeg_editor`'s and
//! `power_manager`'s "shell out to a well-known executable" shape.

use crate::domain::frame::{Frame, Roi};
use crate::error::{AppError, AppResult};
use crate::ports::Ocr;
use async_trait::async_trait;
use tokio::process::Command;

pub struct TesseractOcr {
    executable: String,
    language: String,
}

impl TesseractOcr {
    pub fn new(executable: impl Into<String>, language: impl Into<String>) -> TesseractOcr {
        TesseractOcr { executable: executable.into(), language: language.into() }
    }
}

#[async_trait]
impl Ocr for TesseractOcr {
    async fn recognize(&self, frame: &Frame, roi: Roi) -> AppResult<Option<String>> {
        let roi = frame.clamp_roi(roi);
        let bytes = frame.roi_bytes(roi);
        let mut gray = image::GrayImage::new(roi.width, roi.height);
        for (i, px) in bytes.chunks_exact(3).enumerate() {
            let (b, g, r) = (px[0] as f32, px[1] as f32, px[2] as f32);
            let y = (0.299 * r + 0.587 * g + 0.114 * b).round() as u8;
            gray.put_pixel((i as u32) % roi.width, (i as u32) / roi.width, image::Luma([y]));
        }

        let temp_dir = std::env::temp_dir();
        let input_path = temp_dir.join(format!("ocr-{}.png", uuid::Uuid::new_v4()));
        gray.save(&input_path).map_err(|error| AppError::Internal(format!("failed to write OCR input image: {error}")))?;

        let output = Command::new(&self.executable)
            .arg(&input_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg("7")
            .output()
            .await;

        let _ = std::fs::remove_file(&input_path);

        let output = output.map_err(|error| AppError::Device(format!("failed to run tesseract: {error}")))?;
        if !output.status.success() {
            tracing::warn!(status = %output.status, "tesseract exited non-zero");
            return Ok(None);
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }
}
