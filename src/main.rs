//! Splat Replay entry point (§6): the composition root. Wires the concrete
//! `infra` adapters into the ports the library depends on, then runs one of
//! three things the CLI exposes, grounded on the source's `typer` app
//! (`auto`, `upload`) plus a `setup` command for module N's system checks.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use splat_replay::analyzer::config::AnalyzerConfig;
use splat_replay::analyzer::FrameAnalyzer;
use splat_replay::asset::{EditedAssetRepository, RecordedAssetRepository};
use splat_replay::bus::{EventBus, FrameHub};
use splat_replay::config::Config;
use splat_replay::domain::game_mode::GameMode;
use splat_replay::domain::state_machine::StateMachine;
use splat_replay::editor::AutoEditor;
use splat_replay::infra::camera_capture::CameraCapture;
use splat_replay::infra::ffmpeg_editor::FfmpegEditor;
use splat_replay::infra::obs_recorder::ObsRecorder;
use splat_replay::infra::power_manager::SystemPowerManager;
use splat_replay::infra::speech_groq::GroqSpeechRecognizer;
use splat_replay::infra::tesseract_ocr::TesseractOcr;
use splat_replay::infra::weapon_recognizer::{default_slot_rois, WeaponIconRecognizer};
use splat_replay::infra::youtube_uploader::YoutubeUploader;
use splat_replay::matcher::registry::MatcherRegistry;
use splat_replay::ports::Capture;
use splat_replay::process::{AutoProcessService, EditUploadTrigger, RecordingsAvailable};
use splat_replay::progress::ProgressReporter;
use splat_replay::recording::context::RecordingContext;
use splat_replay::recording::session_service::RecordingSessionService;
use splat_replay::recording::use_case::AutoRecordingUseCase;
use splat_replay::setup::SystemCheckService;
use splat_replay::transcriber::SpeechTranscriber;
use splat_replay::uploader::AutoUploader;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const EVENT_BUS_CAPACITY: usize = 256;

#[derive(Parser)]
#[command(name = "splat-replay", about = "Capture, annotate, and publish Splatoon session recordings")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Record, edit, and upload automatically until power-off.
    Auto {
        #[arg(long)]
        timeout: Option<f64>,
    },
    /// Edit and upload whatever has already been recorded.
    Upload,
    /// Run the first-launch system checks (§4.N).
    Setup,
}

struct Wiring {
    config: Config,
    events: Arc<EventBus>,
    editor: Arc<dyn splat_replay::ports::Editor>,
    recorded: Arc<RecordedAssetRepository>,
    edited: Arc<EditedAssetRepository>,
    progress: Arc<ProgressReporter>,
    uploader: Arc<dyn splat_replay::ports::Uploader>,
    power: Arc<dyn splat_replay::ports::PowerManager>,
}

impl Wiring {
    fn new(config: Config) -> Wiring {
        let events = Arc::new(EventBus::new(EVENT_BUS_CAPACITY));
        let editor: Arc<dyn splat_replay::ports::Editor> = Arc::new(FfmpegEditor::new("ffmpeg", "ffprobe"));
        let recorded = Arc::new(RecordedAssetRepository::new(config.storage.clone(), events.clone()));
        let edited = Arc::new(EditedAssetRepository::new(config.storage.clone(), events.clone()));
        let progress = Arc::new(ProgressReporter::new(events.clone()));
        let uploader: Arc<dyn splat_replay::ports::Uploader> = Arc::new(YoutubeUploader::new());
        let power: Arc<dyn splat_replay::ports::PowerManager> = Arc::new(SystemPowerManager::new());
        Wiring { config, events, editor, recorded, edited, progress, uploader, power }
    }

    fn auto_editor(&self) -> Arc<AutoEditor> {
        Arc::new(AutoEditor::new(
            self.editor.clone(),
            self.recorded.clone(),
            self.edited.clone(),
            self.progress.clone(),
            self.config.video_edit.clone(),
            self.config.analyzer.assets_dir.clone(),
        ))
    }

    fn auto_uploader(&self) -> Arc<AutoUploader> {
        Arc::new(AutoUploader::new(self.uploader.clone(), self.edited.clone(), self.progress.clone(), self.config.upload.clone()))
    }
}

/// Bridges `AutoEditor`/`AutoUploader` to `AutoProcessService`'s narrow
/// `EditUploadTrigger` contract: one edit pass, then one upload pass.
struct EditThenUpload {
    editor: Arc<AutoEditor>,
    uploader: Arc<AutoUploader>,
    running: Arc<AtomicBool>,
    events: Arc<EventBus>,
}

#[async_trait::async_trait]
impl EditUploadTrigger for EditThenUpload {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn start(&self, trigger: &str) -> splat_replay::error::AppResult<()> {
        self.running.store(true, Ordering::SeqCst);
        let trigger = trigger.to_string();
        let editor = self.editor.clone();
        let uploader = self.uploader.clone();
        let running = self.running.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let result = async {
                editor.run("auto_edit").await?;
                uploader.execute().await
            }
            .await;

            running.store(false, Ordering::SeqCst);
            let success = result.is_ok();
            if let Err(error) = result {
                tracing::error!(%error, "auto edit/upload pipeline failed");
            }
            let message = if success { "edit/upload completed" } else { "edit/upload failed" };
            events.publish(splat_replay::domain::events::build::edit_upload_completed(success, message, &trigger));
        });
        Ok(())
    }
}

struct RecordedRecordingsAvailable {
    recorded: Arc<RecordedAssetRepository>,
}

impl RecordingsAvailable for RecordedRecordingsAvailable {
    fn any_recordings(&self) -> bool {
        !self.recorded.list_recordings().is_empty()
    }
}

fn main() -> Result<()> {
    let _log_guard = splat_replay::logging::init_logging().context("failed to initialize logging")?;
    let cli = Cli::parse();

    let runtime = tokio::runtime::Runtime::new().context("failed to create tokio runtime")?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    match cli.command.unwrap_or(Command::Auto { timeout: None }) {
        Command::Setup => run_setup(&config).await,
        Command::Upload => run_upload(config).await,
        Command::Auto { timeout } => run_auto(config, timeout).await,
    }
}

async fn run_setup(config: &Config) -> Result<()> {
    let config_dir = config.config_path().ok().and_then(|p| p.parent().map(PathBuf::from));
    let checker = SystemCheckService::new(config.obs.executable_path.clone(), Some(config.analyzer.assets_dir.clone()), config_dir);

    for check in checker.run_all() {
        let status = if check.present { "ok" } else { "missing" };
        match check.detail {
            Some(detail) => println!("[{status}] {}: {detail}", check.name),
            None => println!("[{status}] {}", check.name),
        }
    }
    Ok(())
}

async fn run_upload(config: Config) -> Result<()> {
    let wiring = Wiring::new(config);
    wiring.auto_editor().run("manual_edit").await.context("edit pass failed")?;
    wiring.auto_uploader().execute().await.context("upload pass failed")?;
    Ok(())
}

async fn run_auto(config: Config, timeout: Option<f64>) -> Result<()> {
    let wiring = Wiring::new(config);
    let config = wiring.config.clone();

    let matchers_path = config.analyzer.matchers_path.clone();
    let assets_dir = config.analyzer.assets_dir.clone();
    let registry = Arc::new(MatcherRegistry::load(&matchers_path, &assets_dir).context("failed to load matcher registry")?);

    let ocr: Arc<dyn splat_replay::ports::Ocr> = Arc::new(TesseractOcr::new("tesseract", "jpn"));
    let analyzer = Arc::new(FrameAnalyzer::new(registry, ocr, AnalyzerConfig::default()));

    let recorder: Arc<dyn splat_replay::ports::Recorder> = Arc::new(ObsRecorder::new(config.obs.clone()));
    let capture: Arc<dyn Capture> = Arc::new(CameraCapture::new(config.capture_device.clone(), config.record.clone()));

    let slot_rois = default_slot_rois(config.record.width, config.record.height);
    let weapon_recognizer: Arc<dyn splat_replay::ports::WeaponRecognizer> =
        Arc::new(WeaponIconRecognizer::load(&assets_dir, &assets_dir.join("weapon_display_marker.png"), slot_rois, Some(assets_dir.join("unmatched")))?);

    let state_machine = Arc::new(StateMachine::new());
    let session_service = RecordingSessionService::new(state_machine, recorder, wiring.recorded.clone(), analyzer.clone(), wiring.events.clone());
    let frame_hub = Arc::new(FrameHub::new());

    let use_case = Arc::new(AutoRecordingUseCase::new(session_service, frame_hub.clone(), wiring.events.clone(), analyzer, weapon_recognizer, capture.clone()));

    let commands = Arc::new(splat_replay::bus::command_bus::CommandBus::new(tokio::runtime::Handle::current()));
    commands.register("recorder.update_metadata", {
        let use_case = use_case.clone();
        Arc::new(move |payload: serde_json::Value| {
            let use_case = use_case.clone();
            Box::pin(async move {
                let object = payload.as_object().ok_or_else(|| splat_replay::error::AppError::Validation("recorder.update_metadata payload must be an object".into()))?;
                let mut updates = std::collections::BTreeMap::new();
                for (field, value) in object {
                    let value = value
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| value.to_string());
                    updates.insert(field.clone(), value);
                }
                use_case.submit_metadata_update(updates);
                Ok(serde_json::Value::Null)
            }) as futures::future::BoxFuture<'static, Result<serde_json::Value, splat_replay::error::AppError>>
        })
    });

    let frame_producer = tokio::spawn({
        let capture = capture.clone();
        let frame_hub = frame_hub.clone();
        async move {
            loop {
                match capture.capture().await {
                    Ok(Some(frame)) => frame_hub.publish(frame),
                    Ok(None) => {}
                    Err(error) => tracing::warn!(%error, "capture frame read failed"),
                }
                tokio::time::sleep(std::time::Duration::from_millis(33)).await;
            }
        }
    });

    let recognizer: Arc<dyn splat_replay::ports::SpeechRecognizer> = Arc::new(GroqSpeechRecognizer::new(config.speech_transcriber.clone()));
    let transcriber = Arc::new(SpeechTranscriber::new(recognizer, wiring.events.clone()));

    {
        let use_case = use_case.clone();
        ctrlc::set_handler(move || use_case.force_stop()).context("failed to install Ctrl+C handler")?;
    }

    let trigger = Arc::new(EditThenUpload { editor: wiring.auto_editor(), uploader: wiring.auto_uploader(), running: Arc::new(AtomicBool::new(false)), events: wiring.events.clone() });
    let recordings_available = Arc::new(RecordedRecordingsAvailable { recorded: wiring.recorded.clone() });
    let process_service = Arc::new(AutoProcessService::new(wiring.events.clone(), config.behavior.clone(), trigger.clone(), wiring.power.clone(), recordings_available));

    commands.register("process.cancel_edit_upload", {
        let process_service = process_service.clone();
        let trigger = trigger.clone();
        Arc::new(move |_payload: serde_json::Value| {
            let process_service = process_service.clone();
            let trigger = trigger.clone();
            Box::pin(async move {
                process_service.cancel_pending();
                trigger.editor.cancel();
                trigger.uploader.request_cancel();
                Ok(serde_json::Value::Null)
            }) as futures::future::BoxFuture<'static, Result<serde_json::Value, splat_replay::error::AppError>>
        })
    });
    commands.register("process.start_edit_upload", {
        let process_service = process_service.clone();
        Arc::new(move |_payload: serde_json::Value| {
            let process_service = process_service.clone();
            Box::pin(async move { process_service.start_edit_upload_now().await.map(|_| serde_json::Value::Null) })
                as futures::future::BoxFuture<'static, Result<serde_json::Value, splat_replay::error::AppError>>
        })
    });

    let process_handle = tokio::spawn({
        let process_service = process_service.clone();
        async move {
            process_service.run().await;
        }
    });

    let transcriber_handle = transcriber.start().await.context("failed to start speech transcriber")?;

    if let Some(timeout) = timeout {
        tracing::info!(timeout, "waiting for capture device");
    }

    let result = use_case.run(RecordingContext::new(GameMode::Battle)).await;

    process_handle.abort();
    frame_producer.abort();
    let _ = transcriber.stop(transcriber_handle, &wiring.config.storage.recorded_dir()).await;

    result.context("auto-recording use case exited with an error")?;
    Ok(())
}
