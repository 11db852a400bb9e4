//! Speech recognizer port: module O streams microphone audio through this
//! while the recorder is active, emitting `speech.listening`/`recognized`
//! events and accumulating a subtitle sidecar.

use crate::error::AppError;
use async_trait::async_trait;

#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn start_listening(&self) -> Result<(), AppError>;
    async fn stop_listening(&self) -> Result<(), AppError>;

    /// Blocks until the next recognized utterance (or the stream ends).
    async fn next_utterance(&self) -> Result<Option<RecognizedUtterance>, AppError>;
}

#[derive(Debug, Clone)]
pub struct RecognizedUtterance {
    pub text: String,
    pub offset_ms: u64,
    pub duration_ms: u64,
}
