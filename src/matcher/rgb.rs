//! RGB matcher: fraction of masked pixels exactly equal to a target triple.

use crate::domain::frame::{Frame, Roi};
use crate::matcher::{Mask, Matcher};

pub struct RgbMatcher {
    /// Stored in BGR order to match `Frame`'s native channel order.
    target_bgr: (u8, u8, u8),
    threshold: f64,
    roi: Option<Roi>,
    mask: Option<Mask>,
}

impl RgbMatcher {
    pub fn new(target_rgb: (u8, u8, u8), threshold: f64, roi: Option<Roi>, mask: Option<Mask>) -> RgbMatcher {
        RgbMatcher {
            target_bgr: (target_rgb.2, target_rgb.1, target_rgb.0),
            threshold,
            roi,
            mask,
        }
    }
}

impl Matcher for RgbMatcher {
    fn is_match(&self, frame: &Frame) -> bool {
        let roi = self.roi.unwrap_or_else(|| Roi::full(frame.width(), frame.height()));
        let bytes = frame.roi_bytes(roi);
        let roi = frame.clamp_roi(roi);

        let mut total = 0usize;
        let mut matched = 0usize;
        for (i, px) in bytes.chunks_exact(3).enumerate() {
            let x = (i as u32) % roi.width;
            let y = (i as u32) / roi.width;
            if let Some(mask) = &self.mask {
                if !mask.includes(x, y) {
                    continue;
                }
            }
            total += 1;
            if (px[0], px[1], px[2]) == self.target_bgr {
                matched += 1;
            }
        }
        if total == 0 {
            return false;
        }
        (matched as f64 / total as f64) >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_over_threshold() {
        let data = vec![10u8, 20, 30].repeat(9); // 3x3 of BGR(10,20,30)
        let frame = Frame::from_bgr(data, 3, 3);
        let matcher = RgbMatcher::new((30, 20, 10), 1.0, None, None);
        assert!(matcher.is_match(&frame));
    }

    #[test]
    fn off_by_one_component_fails_exact_match() {
        let data = vec![10u8, 20, 31].repeat(9);
        let frame = Frame::from_bgr(data, 3, 3);
        let matcher = RgbMatcher::new((30, 20, 10), 1.0, None, None);
        assert!(!matcher.is_match(&frame));
    }
}
