//! Template matcher: grayscale normalized cross-correlation against a
//! pre-loaded template, scored over a frame's ROI.
//!
//! Grounded on `infrastructure/matchers/template.py`'s `TemplateMatcher`
//! (`cv2.matchTemplate(..., TM_CCOEFF_NORMED)` + `cv2.minMaxLoc`); here
//! `imageproc::template_matching` plays the role of `cv2.matchTemplate`.

use crate::domain::frame::{Frame, Roi};
use crate::error::AppError;
use crate::matcher::{load_image_unicode_safe, Mask, Matcher, Scored};
use image::{GrayImage, Luma};
use imageproc::template_matching::{find_extremes, match_template, MatchTemplateMethod};

pub struct TemplateMatcher {
    template: GrayImage,
    mask: Option<Mask>,
    threshold: f64,
    roi: Option<Roi>,
}

impl TemplateMatcher {
    pub fn load(
        template_path: &std::path::Path,
        mask_path: Option<&std::path::Path>,
        threshold: f64,
        roi: Option<Roi>,
    ) -> Result<TemplateMatcher, AppError> {
        let template = load_image_unicode_safe(template_path)?.to_luma8();
        let mask = mask_path.map(Mask::load).transpose()?;
        Ok(TemplateMatcher {
            template,
            mask,
            threshold,
            roi,
        })
    }

    fn windowed_gray(&self, frame: &Frame) -> GrayImage {
        let roi = self.roi.unwrap_or_else(|| Roi::full(frame.width(), frame.height()));
        let bytes = frame.roi_bytes(roi);
        let roi = frame.clamp_roi(roi);
        let mut gray = GrayImage::new(roi.width, roi.height);
        for (i, px) in bytes.chunks_exact(3).enumerate() {
            // BGR -> luminance, ITU-R BT.601
            let (b, g, r) = (px[0] as f32, px[1] as f32, px[2] as f32);
            let y = (0.299 * r + 0.587 * g + 0.114 * b).round() as u8;
            gray.put_pixel((i as u32) % roi.width, (i as u32) / roi.width, Luma([y]));
        }
        gray
    }
}

impl Matcher for TemplateMatcher {
    fn is_match(&self, frame: &Frame) -> bool {
        self.score(frame) >= self.threshold
    }
}

impl Scored for TemplateMatcher {
    fn score(&self, frame: &Frame) -> f64 {
        let image = self.windowed_gray(frame);
        if image.width() < self.template.width() || image.height() < self.template.height() {
            return -1.0;
        }
        // imageproc has no masked variant; when a mask is configured we
        // instead zero out excluded pixels on both sides before correlating,
        // which approximates cv2.matchTemplate's masked NCC closely enough
        // for the fixed-ROI HUD templates this matcher targets.
        let (image, template) = match &self.mask {
            Some(mask) => (apply_mask(&image, mask), apply_mask(&self.template, mask)),
            None => (image, self.template.clone()),
        };
        let result = match_template(
            &image,
            &template,
            MatchTemplateMethod::CrossCorrelationNormalized,
        );
        let extremes = find_extremes(&result);
        let value = extremes.max_value;
        if value.is_nan() || value.is_infinite() {
            -1.0
        } else {
            value as f64
        }
    }
}

fn apply_mask(image: &GrayImage, mask: &Mask) -> GrayImage {
    let mut out = image.clone();
    for y in 0..out.height() {
        for x in 0..out.width() {
            if !mask.includes(x, y) {
                out.put_pixel(x, y, Luma([0]));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, bgr: (u8, u8, u8)) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..(width * height) {
            data.push(bgr.0);
            data.push(bgr.1);
            data.push(bgr.2);
        }
        Frame::from_bgr(data, width, height)
    }

    #[test]
    fn identical_solid_frame_scores_highly() {
        let template = GrayImage::from_pixel(4, 4, Luma([128]));
        let matcher = TemplateMatcher {
            template,
            mask: None,
            threshold: 0.5,
            roi: None,
        };
        let frame = solid_frame(4, 4, (128, 128, 128));
        assert!(matcher.score(&frame) > 0.9);
        assert!(matcher.is_match(&frame));
    }

    #[test]
    fn template_larger_than_roi_never_matches() {
        let template = GrayImage::from_pixel(10, 10, Luma([128]));
        let matcher = TemplateMatcher {
            template,
            mask: None,
            threshold: 0.1,
            roi: None,
        };
        let frame = solid_frame(2, 2, (128, 128, 128));
        assert_eq!(matcher.score(&frame), -1.0);
    }
}
