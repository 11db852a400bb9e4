//! Weapon recognizer port: an OCR/classifier specialized for the 8-slot
//! in-battle HUD weapon icons, used by module G's 20-second detection
//! window.

use crate::domain::frame::Frame;
use crate::error::AppError;
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct SlotResult {
    pub predicted_weapon: String,
    pub best_score: f64,
    pub is_unmatched: bool,
}

#[derive(Debug, Clone)]
pub struct WeaponRecognitionResult {
    /// Always 8: four allies followed by four enemies.
    pub slot_results: [SlotResult; 8],
    pub unmatched_output_dir: Option<String>,
}

#[async_trait]
pub trait WeaponRecognizer: Send + Sync {
    async fn detect_weapon_display(&self, frame: &Frame) -> Result<bool, AppError>;
    async fn recognize_weapons(&self, frame: &Frame, save_unmatched_report: bool) -> Result<WeaponRecognitionResult, AppError>;
}
