//! The `Frame` value type: an opaque captured video frame.

use std::sync::Arc;

/// A rectangular region of interest, in pixel coordinates relative to a
/// frame's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// The whole-frame ROI for a frame of the given dimensions.
    pub const fn full(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }
}

/// A single captured frame: a height×width×3 BGR pixel matrix.
///
/// Cheaply cloneable (backed by an `Arc`) since frames are fanned out to the
/// frame hub, the analyzer, and the weapon detector without copying pixel
/// data on every hop.
#[derive(Debug, Clone)]
pub struct Frame {
    data: Arc<Vec<u8>>,
    width: u32,
    height: u32,
    /// Capture timestamp, if the producer recorded one.
    pub timestamp: Option<std::time::SystemTime>,
}

impl Frame {
    /// Build a frame from raw BGR bytes. `data.len()` must equal
    /// `width * height * 3`.
    pub fn from_bgr(data: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(data.len(), (width as usize) * (height as usize) * 3);
        Self {
            data: Arc::new(data),
            width,
            height,
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, ts: std::time::SystemTime) -> Self {
        self.timestamp = Some(ts);
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bgr(&self) -> &[u8] {
        &self.data
    }

    /// A frame is its own snapshot; `copy()` exists to mirror the source's
    /// `Frame.copy()` call sites (it's a cheap `Arc` clone here).
    pub fn copy(&self) -> Frame {
        self.clone()
    }

    /// The ROI clamped to this frame's bounds.
    pub fn clamp_roi(&self, roi: Roi) -> Roi {
        let x = roi.x.min(self.width);
        let y = roi.y.min(self.height);
        let width = roi.width.min(self.width.saturating_sub(x));
        let height = roi.height.min(self.height.saturating_sub(y));
        Roi { x, y, width, height }
    }

    /// Extract the pixel bytes within `roi` as a freshly allocated BGR buffer.
    pub fn roi_bytes(&self, roi: Roi) -> Vec<u8> {
        let roi = self.clamp_roi(roi);
        let mut out = Vec::with_capacity((roi.width * roi.height * 3) as usize);
        let stride = self.width as usize * 3;
        for row in roi.y..roi.y + roi.height {
            let start = row as usize * stride + roi.x as usize * 3;
            let end = start + roi.width as usize * 3;
            out.extend_from_slice(&self.data[start..end]);
        }
        out
    }

    /// Convert to an `image::RgbImage`, swapping BGR -> RGB channel order.
    pub fn to_rgb_image(&self) -> image::RgbImage {
        let mut buf = vec![0u8; self.data.len()];
        for px in 0..(self.width as usize * self.height as usize) {
            buf[px * 3] = self.data[px * 3 + 2];
            buf[px * 3 + 1] = self.data[px * 3 + 1];
            buf[px * 3 + 2] = self.data[px * 3];
        }
        image::RgbImage::from_raw(self.width, self.height, buf)
            .expect("buffer length matches width*height*3 by construction")
    }

    /// Load a frame from an image file on disk, decoding by bytes so that
    /// non-ASCII paths work regardless of the platform's locale.
    pub fn load_from_path(path: &std::path::Path) -> Result<Frame, image::ImageError> {
        let bytes = std::fs::read(path).map_err(image::ImageError::IoError)?;
        let img = image::load_from_memory(&bytes)?.to_rgb8();
        let (width, height) = (img.width(), img.height());
        let mut bgr = vec![0u8; img.as_raw().len()];
        for (i, px) in img.pixels().enumerate() {
            bgr[i * 3] = px.0[2];
            bgr[i * 3 + 1] = px.0[1];
            bgr[i * 3 + 2] = px.0[0];
        }
        Ok(Frame::from_bgr(bgr, width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roi_bytes_extracts_subrect() {
        // 2x2 frame, BGR, distinct pixels
        let data = vec![
            0, 0, 0, /**/ 1, 1, 1, //
            2, 2, 2, /**/ 3, 3, 3,
        ];
        let frame = Frame::from_bgr(data, 2, 2);
        let roi = frame.roi_bytes(Roi::new(1, 0, 1, 1));
        assert_eq!(roi, vec![1, 1, 1]);
    }

    #[test]
    fn clamp_roi_never_exceeds_bounds() {
        let frame = Frame::from_bgr(vec![0; 4 * 4 * 3], 4, 4);
        let clamped = frame.clamp_roi(Roi::new(2, 2, 10, 10));
        assert_eq!(clamped, Roi::new(2, 2, 2, 2));
    }
}
