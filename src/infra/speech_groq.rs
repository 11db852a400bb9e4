//! Speech recognizer adapter: captures microphone audio with `cpal`,
//! slices it into `phrase_time_limit_seconds` chunks, and transcribes each
//! chunk through Groq's Whisper endpoint before reconciling the result
//! against the configured custom dictionary with a second Groq chat
//! completion. Grounded on `integrated_speech_recognition.py`, whose
//! dual-engine design (Google speech recognition raced against Groq
//! Whisper, both folded through an LLM call) this adapter narrows to the
//! single Groq engine: this crate has no Google Speech credential story of
//! its own, and the reconciliation step still gives the custom dictionary
//! the same correcting role it plays in the original.

use crate::config::SpeechTranscriberSettings;
use crate::error::{AppError, AppResult};
use crate::ports::speech::{RecognizedUtterance, SpeechRecognizer};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use reqwest::multipart;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

const GROQ_TRANSCRIPTION_URL: &str = "https://api.groq.com/openai/v1/audio/transcriptions";
const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const WHISPER_MODEL: &str = "whisper-large-v3";

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct RecognitionEstimate {
    estimated_text: String,
}

/// `cpal::Stream` is not `Send` on every backend, so it's never stored on
/// `self`; a dedicated OS thread owns it for its whole lifetime and only
/// decoded sample buffers cross back over the channel.
pub struct GroqSpeechRecognizer {
    settings: SpeechTranscriberSettings,
    http: reqwest::Client,
    listening: Arc<AtomicBool>,
    sample_rate: AtomicU64,
    capture_thread: Mutex<Option<std::thread::JoinHandle<()>>>,
    receiver: Mutex<mpsc::Receiver<Vec<f32>>>,
    sender: mpsc::Sender<Vec<f32>>,
}

impl GroqSpeechRecognizer {
    pub fn new(settings: SpeechTranscriberSettings) -> GroqSpeechRecognizer {
        let (sender, receiver) = mpsc::channel(64);
        GroqSpeechRecognizer {
            settings,
            http: reqwest::Client::new(),
            listening: Arc::new(AtomicBool::new(false)),
            sample_rate: AtomicU64::new(16_000),
            capture_thread: Mutex::new(None),
            receiver: Mutex::new(receiver),
            sender,
        }
    }

    fn find_device(host: &cpal::Host, name: &str) -> AppResult<cpal::Device> {
        host.input_devices()
            .map_err(|error| AppError::Device(format!("failed to enumerate input devices: {error}")))?
            .find(|device| device.name().map(|n| n == *name).unwrap_or(false))
            .or_else(|| host.default_input_device())
            .ok_or_else(|| AppError::Device(format!("no input device matching '{name}' and no default input device available")))
    }

    async fn transcribe(&self, samples: Vec<f32>, sample_rate: u32) -> AppResult<Option<String>> {
        if samples.is_empty() {
            return Ok(None);
        }
        let wav = encode_wav(&samples, sample_rate);
        let part = multipart::Part::bytes(wav).file_name("utterance.wav").mime_str("audio/wav").map_err(|error| AppError::Internal(format!("failed to build audio part: {error}")))?;
        let form = multipart::Form::new().part("file", part).text("model", WHISPER_MODEL.to_string()).text("language", self.settings.language.split('-').next().unwrap_or("en").to_string());

        let response = self
            .http
            .post(GROQ_TRANSCRIPTION_URL)
            .bearer_auth(&self.settings.groq_api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|error| AppError::Device(format!("groq transcription request failed: {error}")))?;
        if !response.status().is_success() {
            return Err(AppError::Device(format!("groq transcription returned {}", response.status())));
        }
        let parsed: TranscriptionResponse = response.json().await.map_err(|error| AppError::Internal(format!("failed to parse groq transcription response: {error}")))?;
        let text = parsed.text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        self.reconcile(text).await.map(Some)
    }

    async fn reconcile(&self, raw_text: &str) -> AppResult<String> {
        if self.settings.custom_dictionary.is_empty() {
            return Ok(raw_text.to_string());
        }
        let system_message = format!(
            "Reconcile speech recognition output using the supplied dictionary. \
             Do not paraphrase; correct only terms that clearly match an entry. \
             Respond as JSON: {{\"estimated_text\": string}}. Dictionary: {}",
            self.settings.custom_dictionary.join(", ")
        );
        let body = serde_json::json!({
            "model": self.settings.model,
            "temperature": 0,
            "response_format": {"type": "json_object"},
            "messages": [
                {"role": "system", "content": system_message},
                {"role": "user", "content": raw_text},
            ],
        });
        let response = self.http.post(GROQ_CHAT_URL).bearer_auth(&self.settings.groq_api_key).json(&body).send().await.map_err(|error| AppError::Device(format!("groq reconciliation request failed: {error}")))?;
        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "groq reconciliation failed, using raw transcription");
            return Ok(raw_text.to_string());
        }
        let parsed: ChatResponse = response.json().await.map_err(|error| AppError::Internal(format!("failed to parse groq chat response: {error}")))?;
        let content = parsed.choices.first().map(|choice| choice.message.content.clone()).unwrap_or_default();
        match serde_json::from_str::<RecognitionEstimate>(&content) {
            Ok(estimate) => Ok(estimate.estimated_text),
            Err(_) => Ok(raw_text.to_string()),
        }
    }
}

#[async_trait]
impl SpeechRecognizer for GroqSpeechRecognizer {
    async fn start_listening(&self) -> AppResult<()> {
        let device_name = self.settings.mic_device_name.clone();
        let sender = self.sender.clone();
        let listening = self.listening.clone();
        listening.store(true, Ordering::SeqCst);

        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<AppResult<u32>>();
        let thread_listening = listening.clone();
        let handle = std::thread::spawn(move || {
            let host = cpal::default_host();
            let device = match Self::find_device(&host, &device_name) {
                Ok(device) => device,
                Err(error) => {
                    let _ = ready_tx.send(Err(error));
                    return;
                }
            };
            let config = match device.default_input_config() {
                Ok(config) => config,
                Err(error) => {
                    let _ = ready_tx.send(Err(AppError::Device(format!("failed to read default input config: {error}"))));
                    return;
                }
            };
            let sample_rate = config.sample_rate().0;

            let stream = device.build_input_stream(
                &config.into(),
                move |data: &[f32], _| {
                    let _ = sender.try_send(data.to_vec());
                },
                move |error| tracing::warn!(%error, "microphone input stream error"),
                None,
            );
            let stream = match stream {
                Ok(stream) => stream,
                Err(error) => {
                    let _ = ready_tx.send(Err(AppError::Device(format!("failed to build input stream: {error}"))));
                    return;
                }
            };
            if let Err(error) = stream.play() {
                let _ = ready_tx.send(Err(AppError::Device(format!("failed to start input stream: {error}"))));
                return;
            }
            let _ = ready_tx.send(Ok(sample_rate));

            while thread_listening.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(50));
            }
        });

        let sample_rate = ready_rx.recv().map_err(|_| AppError::Device("capture thread exited before reporting readiness".into()))??;
        self.sample_rate.store(sample_rate as u64, Ordering::SeqCst);
        *self.capture_thread.lock().unwrap() = Some(handle);
        Ok(())
    }

    async fn stop_listening(&self) -> AppResult<()> {
        self.listening.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
        Ok(())
    }

    async fn next_utterance(&self) -> AppResult<Option<RecognizedUtterance>> {
        if !self.listening.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let sample_rate = self.sample_rate.load(Ordering::SeqCst).max(16_000) as u32;
        let phrase_samples = (self.settings.phrase_time_limit_seconds * sample_rate as f64) as usize;

        let mut buffer = Vec::with_capacity(phrase_samples);
        while buffer.len() < phrase_samples {
            let chunk = {
                let mut receiver = self.receiver.lock().unwrap();
                receiver.try_recv().ok()
            };
            match chunk {
                Some(samples) => buffer.extend(samples),
                None => {
                    if !self.listening.load(Ordering::SeqCst) {
                        break;
                    }
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                }
            }
        }

        let offset_ms = 0;
        let duration_ms = (buffer.len() as f64 / sample_rate as f64 * 1000.0) as u64;
        match self.transcribe(buffer, sample_rate).await? {
            Some(text) => Ok(Some(RecognizedUtterance { text, offset_ms, duration_ms })),
            None => Ok(None),
        }
    }
}

fn encode_wav(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let mut pcm = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        let clamped = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        pcm.extend_from_slice(&clamped.to_le_bytes());
    }

    let data_len = pcm.len() as u32;
    let byte_rate = sample_rate * 2;
    let mut wav = Vec::with_capacity(44 + pcm.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend_from_slice(&pcm);
    wav
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_header_reports_correct_data_length() {
        let samples = vec![0.0_f32; 100];
        let wav = encode_wav(&samples, 16_000);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        let data_len = u32::from_le_bytes(wav[40..44].try_into().unwrap());
        assert_eq!(data_len, 200);
    }
}
