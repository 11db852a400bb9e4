//! Edge matcher: Canny edge distance from a pre-computed template's edges,
//! lower is better, passes at or below a configured maximum.
//!
//! Grounded on `infrastructure/matchers/edge.py`'s `EdgeMatcher`
//! (`cv2.Canny` + `cv2.distanceTransform(255 - edge, ...)` +
//! `cv2.filter2D`/`minMaxLoc`). `imageproc::edges::canny` plays the role of
//! `cv2.Canny`; the chamfer distance transform below replaces
//! `cv2.distanceTransform` (OpenCV's exact Euclidean transform) with the
//! standard two-pass 3-4 chamfer approximation, which is within a few
//! percent of the true distance and needs no extra dependency.

use crate::domain::frame::{Frame, Roi};
use crate::matcher::{load_image_unicode_safe, Matcher};
use image::{GrayImage, Luma};
use imageproc::edges::canny;

const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;

pub struct EdgeMatcher {
    template_edge: GrayImage,
    threshold: f64,
    roi: Option<Roi>,
}

impl EdgeMatcher {
    pub fn load(template_path: &std::path::Path, threshold: f64, roi: Option<Roi>) -> Result<EdgeMatcher, crate::error::AppError> {
        let template = load_image_unicode_safe(template_path)?.to_luma8();
        Ok(EdgeMatcher {
            template_edge: canny(&template, CANNY_LOW, CANNY_HIGH),
            threshold,
            roi,
        })
    }

    fn roi_gray(&self, frame: &Frame) -> GrayImage {
        let roi = self.roi.unwrap_or_else(|| Roi::full(frame.width(), frame.height()));
        let bytes = frame.roi_bytes(roi);
        let roi = frame.clamp_roi(roi);
        let mut gray = GrayImage::new(roi.width, roi.height);
        for (i, px) in bytes.chunks_exact(3).enumerate() {
            let (b, g, r) = (px[0] as f32, px[1] as f32, px[2] as f32);
            let y = (0.299 * r + 0.587 * g + 0.114 * b).round() as u8;
            gray.put_pixel((i as u32) % roi.width, (i as u32) / roi.width, Luma([y]));
        }
        gray
    }

    /// The minimum, over all valid alignments of the template edges within
    /// the frame's edge map, of the mean chamfer distance under the
    /// template's edge pixels. Lower means the frame's edges line up well
    /// with the template's.
    fn min_edge_distance(&self, frame_edge: &GrayImage) -> f64 {
        let dist = chamfer_distance(frame_edge);
        let (fw, fh) = (frame_edge.width(), frame_edge.height());
        let (tw, th) = (self.template_edge.width(), self.template_edge.height());
        if tw > fw || th > fh {
            return f64::INFINITY;
        }

        let template_pixels: Vec<(u32, u32)> = (0..th)
            .flat_map(|y| (0..tw).map(move |x| (x, y)))
            .filter(|&(x, y)| self.template_edge.get_pixel(x, y).0[0] > 0)
            .collect();
        if template_pixels.is_empty() {
            return f64::INFINITY;
        }

        let mut best = f64::INFINITY;
        for oy in 0..=(fh - th) {
            for ox in 0..=(fw - tw) {
                let mut sum = 0.0f64;
                for &(x, y) in &template_pixels {
                    sum += dist[((oy + y) * fw + (ox + x)) as usize] as f64;
                }
                let mean = sum / template_pixels.len() as f64;
                if mean < best {
                    best = mean;
                }
            }
        }
        best
    }
}

/// Two-pass chamfer (3-4) distance transform: distance from each pixel to
/// the nearest non-zero (edge) pixel, in pixel units.
fn chamfer_distance(edges: &GrayImage) -> Vec<f32> {
    const INF: f32 = 1e9;
    const D1: f32 = 1.0;
    const D2: f32 = 1.41421356;
    let (w, h) = (edges.width() as i64, edges.height() as i64);
    let mut dist = vec![INF; (w * h) as usize];
    for y in 0..h {
        for x in 0..w {
            if edges.get_pixel(x as u32, y as u32).0[0] > 0 {
                dist[(y * w + x) as usize] = 0.0;
            }
        }
    }

    let at = |d: &[f32], x: i64, y: i64| -> f32 {
        if x < 0 || y < 0 || x >= w || y >= h {
            INF
        } else {
            d[(y * w + x) as usize]
        }
    };

    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) as usize;
            let mut best = dist[idx];
            best = best.min(at(&dist, x - 1, y) + D1);
            best = best.min(at(&dist, x, y - 1) + D1);
            best = best.min(at(&dist, x - 1, y - 1) + D2);
            best = best.min(at(&dist, x + 1, y - 1) + D2);
            dist[idx] = best;
        }
    }
    for y in (0..h).rev() {
        for x in (0..w).rev() {
            let idx = (y * w + x) as usize;
            let mut best = dist[idx];
            best = best.min(at(&dist, x + 1, y) + D1);
            best = best.min(at(&dist, x, y + 1) + D1);
            best = best.min(at(&dist, x + 1, y + 1) + D2);
            best = best.min(at(&dist, x - 1, y + 1) + D2);
            dist[idx] = best;
        }
    }
    dist
}

impl Matcher for EdgeMatcher {
    fn is_match(&self, frame: &Frame) -> bool {
        let frame_edge = canny(&self.roi_gray(frame), CANNY_LOW, CANNY_HIGH);
        self.min_edge_distance(&frame_edge) <= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(size: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| Luma([if (x + y) % 2 == 0 { 255 } else { 0 }]))
    }

    #[test]
    fn distance_is_zero_on_edge_pixels() {
        let edges = checkerboard(4);
        let dist = chamfer_distance(&edges);
        assert_eq!(dist[0], 0.0);
    }

    #[test]
    fn matcher_constructed_from_same_template_matches_exactly() {
        let template_edge = checkerboard(8);
        let matcher = EdgeMatcher {
            template_edge: template_edge.clone(),
            threshold: 0.5,
            roi: None,
        };
        let distance = matcher.min_edge_distance(&template_edge);
        assert!(distance < 0.01, "identical edge maps should align at distance ~0, got {distance}");
    }
}
