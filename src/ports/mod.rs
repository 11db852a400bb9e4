//! Port traits (§6): the core depends only on these, never on a concrete
//! recorder/capture/OCR/editor/uploader implementation. Adapters under
//! `infra` implement them.

pub mod capture;
pub mod editor;
pub mod ocr;
pub mod power;
pub mod recorder;
pub mod speech;
pub mod uploader;
pub mod weapon_recognizer;

pub use capture::Capture;
pub use editor::Editor;
pub use ocr::Ocr;
pub use power::PowerManager;
pub use recorder::{Recorder, RecorderStatus};
pub use speech::SpeechRecognizer;
pub use uploader::Uploader;
pub use weapon_recognizer::WeaponRecognizer;
