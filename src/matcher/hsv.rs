//! HSV matcher: fraction of masked pixels whose HSV falls within
//! `[lower, upper]` must meet a threshold.
//!
//! H/S/V are quantized to the OpenCV 8-bit convention (H in `0..180`, S/V in
//! `0..256`) since `lower_bound`/`upper_bound` are configured as byte
//! triples, matching the source's `cv2`-based HSV bounds.

use crate::domain::frame::{Frame, Roi};
use crate::matcher::{Mask, Matcher};

pub struct HsvMatcher {
    lower: (u8, u8, u8),
    upper: (u8, u8, u8),
    threshold: f64,
    roi: Option<Roi>,
    mask: Option<Mask>,
}

impl HsvMatcher {
    pub fn new(
        lower: (u8, u8, u8),
        upper: (u8, u8, u8),
        threshold: f64,
        roi: Option<Roi>,
        mask: Option<Mask>,
    ) -> HsvMatcher {
        HsvMatcher {
            lower,
            upper,
            threshold,
            roi,
            mask,
        }
    }
}

/// Convert BGR (0..256 each) to OpenCV-convention HSV: H in `0..180`, S/V in
/// `0..256`.
pub fn bgr_to_hsv(b: u8, g: u8, r: u8) -> (u8, u8, u8) {
    let (rf, gf, bf) = (r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let h = if delta.abs() < 1e-6 {
        0.0
    } else if max == rf {
        60.0 * (((gf - bf) / delta).rem_euclid(6.0))
    } else if max == gf {
        60.0 * ((bf - rf) / delta + 2.0)
    } else {
        60.0 * ((rf - gf) / delta + 4.0)
    };
    let s = if max <= 1e-6 { 0.0 } else { delta / max };
    let v = max;

    (
        ((h / 2.0).round() as i32).clamp(0, 179) as u8,
        (s * 255.0).round().clamp(0.0, 255.0) as u8,
        (v * 255.0).round().clamp(0.0, 255.0) as u8,
    )
}

impl Matcher for HsvMatcher {
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
            let (h, s, v) = bgr_to_hsv(px[0], px[1], px[2]);
            if h >= self.lower.0
                && h <= self.upper.0
                && s >= self.lower.1
                && s <= self.upper.1
                && v >= self.lower.2
                && v <= self.upper.2
            {
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
    fn pure_red_converts_to_hue_zero() {
        let (h, s, v) = bgr_to_hsv(0, 0, 255);
        assert_eq!(h, 0);
        assert_eq!(s, 255);
        assert_eq!(v, 255);
    }

    #[test]
    fn uniform_frame_within_bounds_matches() {
        let data = vec![0u8, 0, 255].repeat(16); // pure red, 4x4
        let frame = Frame::from_bgr(data, 4, 4);
        let matcher = HsvMatcher::new((0, 200, 200), (5, 255, 255), 0.99, None, None);
        assert!(matcher.is_match(&frame));
    }

    #[test]
    fn out_of_range_frame_does_not_match() {
        let data = vec![255u8, 0, 0].repeat(16); // pure blue
        let frame = Frame::from_bgr(data, 4, 4);
        let matcher = HsvMatcher::new((0, 200, 200), (5, 255, 255), 0.99, None, None);
        assert!(!matcher.is_match(&frame));
    }
}
