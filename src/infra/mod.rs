//! Concrete port adapters: the only place this crate talks to an external
//! process, device, or network service. Everything above `infra` depends
//! only on `ports`; the only code that names a concrete adapter from this
//! module is the composition root in `main.rs`.

pub mod camera_capture;
pub mod ffmpeg_editor;
pub mod obs_recorder;
pub mod power_manager;
pub mod speech_groq;
pub mod tesseract_ocr;
pub mod weapon_recognizer;
pub mod youtube_uploader;
