//! Speech transcriber (module O): streams microphone audio through a
//! [`SpeechRecognizer`] while the recorder is active, accumulating
//! recognized utterances into an SRT subtitle sidecar. Grounded on the
//! source's `SpeechTranscriberPort` contract (`start`/`stop`/`pause`/
//! `resume`, with `stop` returning the finished subtitle) and on
//! `domain.speech.listening`/`domain.speech.recognized` events; the actual
//! dual-engine (Google + Groq) recognition adapter behind the port has no
//! counterpart here and belongs under `infra`.

use crate::bus::EventBus;
use crate::domain::events::build;
use crate::error::{AppError, AppResult};
use crate::ports::SpeechRecognizer;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct Utterance {
    text: String,
    offset_ms: u64,
    duration_ms: u64,
}

/// Drives a [`SpeechRecognizer`] for the lifetime of one recording,
/// accumulating utterances and rendering them as an SRT file on stop.
/// Pausing stops pulling new utterances without tearing down the listening
/// stream, mirroring the port's separate `pause`/`resume`/`stop` calls.
pub struct SpeechTranscriber {
    recognizer: Arc<dyn SpeechRecognizer>,
    events: Arc<EventBus>,
    utterances: Mutex<Vec<Utterance>>,
    paused: AtomicBool,
    running: AtomicBool,
}

impl SpeechTranscriber {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>, events: Arc<EventBus>) -> SpeechTranscriber {
        SpeechTranscriber {
            recognizer,
            events,
            utterances: Mutex::new(Vec::new()),
            paused: AtomicBool::new(false),
            running: AtomicBool::new(false),
        }
    }

    /// Starts the recognizer and spawns the utterance-pulling loop. Returns
    /// the loop's join handle so the caller can await it on `stop`.
    pub async fn start(self: &Arc<Self>) -> AppResult<tokio::task::JoinHandle<()>> {
        self.utterances.lock().unwrap().clear();
        self.paused.store(false, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);

        self.recognizer.start_listening().await?;
        self.events.publish(build::speech_listening());

        let this = Arc::clone(self);
        Ok(tokio::spawn(async move { this.pull_loop().await }))
    }

    async fn pull_loop(&self) {
        while self.running.load(Ordering::SeqCst) {
            if self.paused.load(Ordering::SeqCst) {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                continue;
            }
            match self.recognizer.next_utterance().await {
                Ok(Some(utterance)) => {
                    self.events.publish(build::speech_recognized(
                        &utterance.text,
                        utterance.offset_ms as f64 / 1000.0,
                        (utterance.offset_ms + utterance.duration_ms) as f64 / 1000.0,
                    ));
                    self.utterances.lock().unwrap().push(Utterance {
                        text: utterance.text,
                        offset_ms: utterance.offset_ms,
                        duration_ms: utterance.duration_ms,
                    });
                }
                Ok(None) => break,
                Err(error) => {
                    tracing::warn!(%error, "speech recognition error, continuing");
                }
            }
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Stops listening, waits for the pull loop to settle, and writes the
    /// accumulated utterances out as an SRT file under `dir`. Returns the
    /// sidecar path, or `None` if nothing was recognized.
    pub async fn stop(&self, handle: tokio::task::JoinHandle<()>, dir: &Path) -> AppResult<Option<PathBuf>> {
        self.running.store(false, Ordering::SeqCst);
        self.recognizer.stop_listening().await?;
        let _ = handle.await;

        let utterances = std::mem::take(&mut *self.utterances.lock().unwrap());
        if utterances.is_empty() {
            return Ok(None);
        }

        let srt = render_srt(&utterances);
        std::fs::create_dir_all(dir).map_err(|e| AppError::Internal(format!("failed to create subtitle directory: {e}")))?;
        let path = dir.join("transcript.srt");
        std::fs::write(&path, srt).map_err(|e| AppError::Internal(format!("failed to write subtitle file: {e}")))?;
        Ok(Some(path))
    }
}

fn render_srt(utterances: &[Utterance]) -> String {
    let mut out = String::new();
    for (index, utterance) in utterances.iter().enumerate() {
        out.push_str(&(index + 1).to_string());
        out.push('\n');
        out.push_str(&format_timestamp(utterance.offset_ms));
        out.push_str(" --> ");
        out.push_str(&format_timestamp(utterance.offset_ms + utterance.duration_ms));
        out.push('\n');
        out.push_str(&utterance.text);
        out.push_str("\n\n");
    }
    out
}

fn format_timestamp(total_ms: u64) -> String {
    let ms = total_ms % 1000;
    let total_seconds = total_ms / 1000;
    let seconds = total_seconds % 60;
    let minutes = (total_seconds / 60) % 60;
    let hours = total_seconds / 3600;
    format!("{hours:02}:{minutes:02}:{seconds:02},{ms:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_timestamps_as_srt() {
        assert_eq!(format_timestamp(0), "00:00:00,000");
        assert_eq!(format_timestamp(3_661_250), "01:01:01,250");
    }

    #[test]
    fn renders_sequential_numbered_blocks() {
        let utterances = vec![
            Utterance { text: "hello".to_string(), offset_ms: 0, duration_ms: 1000 },
            Utterance { text: "world".to_string(), offset_ms: 1500, duration_ms: 500 },
        ];
        let srt = render_srt(&utterances);
        assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:01,000\nhello\n\n2\n"));
    }
}
