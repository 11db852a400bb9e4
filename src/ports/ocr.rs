//! OCR port: text recognition over a named region, used by extraction
//! queries in the frame analyzer (§4.B) that can't be answered by image
//! matching alone.

use crate::domain::frame::{Frame, Roi};
use crate::error::AppError;
use async_trait::async_trait;

#[async_trait]
pub trait Ocr: Send + Sync {
    /// Recognizes text within `roi`. `None` means no text was confidently
    /// recognized, distinct from an empty string.
    async fn recognize(&self, frame: &Frame, roi: Roi) -> Result<Option<String>, AppError>;
}
