//! Brightness matcher: passes when the mean luminance of the masked area is
//! at or below a configured maximum (e.g. detecting a blacked-out screen
//! during power-off).

use crate::domain::frame::{Frame, Roi};
use crate::matcher::{Mask, Matcher};

pub struct BrightnessMatcher {
    max_value: f64,
    roi: Option<Roi>,
    mask: Option<Mask>,
}

impl BrightnessMatcher {
    pub fn new(max_value: f64, roi: Option<Roi>, mask: Option<Mask>) -> BrightnessMatcher {
        BrightnessMatcher { max_value, roi, mask }
    }

    pub fn mean_luminance(&self, frame: &Frame) -> Option<f64> {
        let roi = self.roi.unwrap_or_else(|| Roi::full(frame.width(), frame.height()));
        let bytes = frame.roi_bytes(roi);
        let roi = frame.clamp_roi(roi);

        let mut total = 0u64;
        let mut count = 0u64;
        for (i, px) in bytes.chunks_exact(3).enumerate() {
            let x = (i as u32) % roi.width;
            let y = (i as u32) / roi.width;
            if let Some(mask) = &self.mask {
                if !mask.includes(x, y) {
                    continue;
                }
            }
            let (b, g, r) = (px[0] as f64, px[1] as f64, px[2] as f64);
            total += (0.299 * r + 0.587 * g + 0.114 * b).round() as u64;
            count += 1;
        }
        if count == 0 {
            None
        } else {
            Some(total as f64 / count as f64)
        }
    }
}

impl Matcher for BrightnessMatcher {
    fn is_match(&self, frame: &Frame) -> bool {
        match self.mean_luminance(frame) {
            Some(mean) => mean <= self.max_value,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dark_frame_matches_low_maximum() {
        let data = vec![5u8, 5, 5].repeat(16);
        let frame = Frame::from_bgr(data, 4, 4);
        let matcher = BrightnessMatcher::new(10.0, None, None);
        assert!(matcher.is_match(&frame));
    }

    #[test]
    fn bright_frame_fails_low_maximum() {
        let data = vec![250u8, 250, 250].repeat(16);
        let frame = Frame::from_bgr(data, 4, 4);
        let matcher = BrightnessMatcher::new(10.0, None, None);
        assert!(!matcher.is_match(&frame));
    }
}
