//! Uniform matcher: passes when the standard deviation of hue across the
//! masked area is at or below a configured threshold (a roughly flat-color
//! region, e.g. a loading screen).

use crate::domain::frame::{Frame, Roi};
use crate::matcher::hsv::bgr_to_hsv;
use crate::matcher::{Mask, Matcher};

pub struct UniformMatcher {
    hue_threshold: f64,
    roi: Option<Roi>,
    mask: Option<Mask>,
}

impl UniformMatcher {
    pub fn new(hue_threshold: f64, roi: Option<Roi>, mask: Option<Mask>) -> UniformMatcher {
        UniformMatcher {
            hue_threshold,
            roi,
            mask,
        }
    }
}

impl Matcher for UniformMatcher {
    fn is_match(&self, frame: &Frame) -> bool {
        let roi = self.roi.unwrap_or_else(|| Roi::full(frame.width(), frame.height()));
        let bytes = frame.roi_bytes(roi);
        let roi = frame.clamp_roi(roi);

        let mut hues = Vec::new();
        for (i, px) in bytes.chunks_exact(3).enumerate() {
            let x = (i as u32) % roi.width;
            let y = (i as u32) / roi.width;
            if let Some(mask) = &self.mask {
                if !mask.includes(x, y) {
                    continue;
                }
            }
            let (h, _, _) = bgr_to_hsv(px[0], px[1], px[2]);
            hues.push(h as f64);
        }
        if hues.is_empty() {
            return false;
        }
        let mean = hues.iter().sum::<f64>() / hues.len() as f64;
        let variance = hues.iter().map(|h| (h - mean).powi(2)).sum::<f64>() / hues.len() as f64;
        variance.sqrt() <= self.hue_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_color_has_zero_deviation() {
        let data = vec![50u8, 80, 200].repeat(16);
        let frame = Frame::from_bgr(data, 4, 4);
        let matcher = UniformMatcher::new(0.5, None, None);
        assert!(matcher.is_match(&frame));
    }

    #[test]
    fn mixed_hues_exceed_low_threshold() {
        let mut data = vec![0u8, 0, 255].repeat(8); // red half
        data.extend(vec![255u8, 0, 0].repeat(8)); // blue half
        let frame = Frame::from_bgr(data, 4, 4);
        let matcher = UniformMatcher::new(1.0, None, None);
        assert!(!matcher.is_match(&frame));
    }
}
