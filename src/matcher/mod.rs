//! Matcher primitives (§4.A): template / HSV / RGB / hash / uniform /
//! brightness / edge leaf matchers plus composite and/or/not expressions.
//!
//! Grounded on `infrastructure/matchers/{template,edge,utils}.py` for the
//! per-matcher numeric behavior and on
//! `shared/config/image_matching.py` (`MatcherConfig`/`MatchExpression`/
//! `ImageMatchingSettings`) for the YAML configuration shape.

pub mod brightness;
pub mod composite;
pub mod edge;
pub mod hash;
pub mod hsv;
pub mod registry;
pub mod rgb;
pub mod template;
pub mod uniform;

use crate::domain::frame::{Frame, Roi};
use crate::error::AppError;
use serde::Deserialize;

/// A pure predicate over a frame. Implementations must be deterministic and
/// side-effect free (§8 invariant 1) so composite evaluation can run leaves
/// concurrently without coordination.
pub trait Matcher: Send + Sync {
    fn is_match(&self, frame: &Frame) -> bool;
}

/// Template matchers additionally expose a continuous score in `[-1, 1]`.
pub trait Scored: Matcher {
    fn score(&self, frame: &Frame) -> f64;
}

/// A normalized-or-pixel ROI as it appears in YAML: `{x, y, width, height}`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RoiConfig {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl From<RoiConfig> for Roi {
    fn from(r: RoiConfig) -> Roi {
        Roi::new(r.x, r.y, r.width, r.height)
    }
}

/// A binary mask restricting a matcher to a subset of its ROI's pixels.
/// `None` means every pixel in the ROI participates.
#[derive(Debug, Clone)]
pub struct Mask {
    pub width: u32,
    pub height: u32,
    /// Non-zero means included.
    pub bytes: Vec<u8>,
}

impl Mask {
    pub fn includes(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.bytes[(y * self.width + x) as usize] != 0
    }

    pub fn load(path: &std::path::Path) -> Result<Mask, AppError> {
        let bytes = std::fs::read(path)
            .map_err(|e| AppError::Configuration(format!("reading mask {path:?}: {e}")))?;
        let img = image::load_from_memory(&bytes)
            .map_err(|e| AppError::Configuration(format!("decoding mask {path:?}: {e}")))?
            .to_luma8();
        Ok(Mask {
            width: img.width(),
            height: img.height(),
            bytes: img.into_raw(),
        })
    }
}

/// One simple-matcher definition as loaded from `matchers.yaml`'s
/// `simple_matchers` map. Mirrors `MatcherConfig` in the source, field for
/// field.
#[derive(Debug, Clone, Deserialize)]
pub struct MatcherConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    pub template_path: Option<String>,
    pub hash_path: Option<String>,
    pub lower_bound: Option<(u8, u8, u8)>,
    pub upper_bound: Option<(u8, u8, u8)>,
    pub rgb: Option<(u8, u8, u8)>,
    pub hue_threshold: Option<f64>,
    pub mask_path: Option<String>,
    pub max_value: Option<f64>,
    pub min_value: Option<f64>,
    pub roi: Option<RoiConfig>,
}

fn default_threshold() -> f64 {
    0.8
}

/// Read an image file by bytes then decode (§4.A "Unicode paths"), never by
/// handing the path straight to an OS-locale-sensitive loader.
pub fn load_image_unicode_safe(path: &std::path::Path) -> Result<image::DynamicImage, AppError> {
    let bytes = std::fs::read(path)
        .map_err(|e| AppError::Configuration(format!("reading image {path:?}: {e}")))?;
    image::load_from_memory(&bytes)
        .map_err(|e| AppError::Configuration(format!("decoding image {path:?}: {e}")))
}
