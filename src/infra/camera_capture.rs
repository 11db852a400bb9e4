//! Capture adapter (§4.I frame producer): reads frames from the capture
//! device OBS exposes its recording/preview feed on (a virtual camera or a
//! capture card), the way the analyzer pipeline is meant to see them
//! regardless of how the recorder itself is driven. No embedded-libobs
//! counterpart exists in the teacher for this (its frame source is the
//! libobs context directly); `nokhwa` is pulled in instead, following
//! `other_examples/CapSoftware-Cap`'s use of the same crate for
//! cross-platform camera capture.

use crate::config::{CaptureDeviceSettings, RecordSettings};
use crate::domain::frame::Frame;
use crate::error::{AppError, AppResult};
use crate::ports::Capture;
use async_trait::async_trait;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use std::sync::Mutex;

pub struct CameraCapture {
    device: CaptureDeviceSettings,
    record: RecordSettings,
    camera: Mutex<Option<Camera>>,
}

impl CameraCapture {
    pub fn new(device: CaptureDeviceSettings, record: RecordSettings) -> CameraCapture {
        CameraCapture { device, record, camera: Mutex::new(None) }
    }

    fn open(&self) -> AppResult<Camera> {
        let index = CameraIndex::Index(self.record.capture_index);
        let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);
        Camera::new(index, format).map_err(|error| AppError::Device(format!("failed to open capture device '{}': {error}", self.device.name)))
    }
}

#[async_trait]
impl Capture for CameraCapture {
    async fn setup(&self) -> AppResult<()> {
        let mut camera = self.open()?;
        camera.open_stream().map_err(|error| AppError::Device(format!("failed to start capture stream: {error}")))?;
        *self.camera.lock().unwrap() = Some(camera);
        tracing::info!(device = %self.device.name, index = self.record.capture_index, "capture device opened");
        Ok(())
    }

    async fn teardown(&self) -> AppResult<()> {
        if let Some(mut camera) = self.camera.lock().unwrap().take() {
            if let Err(error) = camera.stop_stream() {
                tracing::warn!(%error, "failed to stop capture stream cleanly");
            }
        }
        Ok(())
    }

    async fn capture(&self) -> AppResult<Option<Frame>> {
        let frame = {
            let mut guard = self.camera.lock().unwrap();
            let Some(camera) = guard.as_mut() else {
                return Err(AppError::Device("capture device not set up".into()));
            };
            camera.frame()
        };
        let frame = frame.map_err(|error| AppError::Device(format!("failed to read capture frame: {error}")))?;
        let decoded = frame.decode_image::<RgbFormat>().map_err(|error| AppError::Device(format!("failed to decode capture frame: {error}")))?;
        let (width, height) = (decoded.width(), decoded.height());
        let mut bgr = vec![0u8; decoded.as_raw().len()];
        for (i, px) in decoded.as_raw().chunks_exact(3).enumerate() {
            bgr[i * 3] = px[2];
            bgr[i * 3 + 1] = px[1];
            bgr[i * 3 + 2] = px[0];
        }
        Ok(Some(Frame::from_bgr(bgr, width, height).with_timestamp(std::time::SystemTime::now())))
    }
}
