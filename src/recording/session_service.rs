//! The recording session service (§4.F): executes the action a phase
//! handler decided on against the state machine and the recorder, and
//! reconciles externally (manually) triggered recorder status changes.
//! Grounded on the source's `RecordingSessionService`, adapted to the
//! single-owner context rule (§5): every method here takes
//! `&mut RecordingContext` rather than holding one itself.

use crate::analyzer::FrameAnalyzer;
use crate::asset::RecordedAssetRepository;
use crate::bus::EventBus;
use crate::domain::asset::VideoAsset;
use crate::domain::events::build;
use crate::domain::frame::Frame;
use crate::domain::state_machine::{RecordEvent, RecordState, StateMachine};
use crate::error::{AppError, AppResult};
use crate::ports::{Recorder, RecorderStatus};
use crate::recording::commands::RecordingAction;
use crate::recording::context::RecordingContext;
use crate::recording::merger::MetadataMerger;
use chrono::Utc;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Stop,
    Cancel,
}

pub struct RecordingSessionService {
    state_machine: Arc<StateMachine>,
    recorder: Arc<dyn Recorder>,
    asset_repository: Arc<RecordedAssetRepository>,
    analyzer: Arc<FrameAnalyzer>,
    merger: MetadataMerger,
    events: Arc<EventBus>,
    pending_stop_reason: Mutex<Option<StopReason>>,
    external_status_rx: Mutex<mpsc::UnboundedReceiver<RecorderStatus>>,
    manual_update_tx: mpsc::UnboundedSender<BTreeMap<String, String>>,
    manual_update_rx: Mutex<mpsc::UnboundedReceiver<BTreeMap<String, String>>>,
}

impl RecordingSessionService {
    pub fn new(
        state_machine: Arc<StateMachine>,
        recorder: Arc<dyn Recorder>,
        asset_repository: Arc<RecordedAssetRepository>,
        analyzer: Arc<FrameAnalyzer>,
        events: Arc<EventBus>,
    ) -> Arc<RecordingSessionService> {
        let (tx, rx) = mpsc::unbounded_channel();
        let (manual_update_tx, manual_update_rx) = mpsc::unbounded_channel();
        let service = Arc::new(RecordingSessionService {
            state_machine: state_machine.clone(),
            recorder: recorder.clone(),
            asset_repository,
            analyzer,
            merger: MetadataMerger,
            events,
            pending_stop_reason: Mutex::new(None),
            external_status_rx: Mutex::new(rx),
            manual_update_tx,
            manual_update_rx: Mutex::new(manual_update_rx),
        });

        state_machine.add_listener(Box::new(|state| {
            tracing::info!(state = state.name(), "recording state changed");
        }));
        recorder.on_status(Box::new(move |status| {
            let _ = tx.send(status);
        }));

        service
    }

    pub fn state(&self) -> RecordState {
        self.state_machine.state()
    }

    pub async fn setup(&self) -> AppResult<()> {
        self.recorder.setup().await
    }

    pub async fn teardown(&self) -> AppResult<()> {
        self.recorder.teardown().await
    }

    /// Executes whatever action a phase handler decided on, against
    /// `context`. `get_result_frame` is only invoked by the `Stop` path, and
    /// only when no result frame was captured during the session.
    pub async fn execute<F>(&self, action: RecordingAction, context: &mut RecordingContext, get_result_frame: impl FnOnce() -> F) -> AppResult<Option<VideoAsset>>
    where
        F: Future<Output = Option<Frame>>,
    {
        match action {
            RecordingAction::None => Ok(None),
            RecordingAction::Start => {
                self.start(context).await?;
                Ok(None)
            }
            RecordingAction::Pause => {
                self.pause().await?;
                Ok(None)
            }
            RecordingAction::Resume => {
                self.resume().await?;
                Ok(None)
            }
            RecordingAction::Stop => self.stop(context, get_result_frame).await,
            RecordingAction::Cancel => {
                self.cancel(context).await?;
                Ok(None)
            }
            RecordingAction::ResetMetadata => {
                context.reset_keeping_mode();
                Ok(None)
            }
            RecordingAction::CancelAndResetMetadata => {
                self.cancel(context).await?;
                Ok(None)
            }
        }
    }

    async fn start(&self, context: &mut RecordingContext) -> AppResult<()> {
        if self.state_machine.state() != RecordState::Stopped {
            tracing::warn!("recording already started");
            return Ok(());
        }
        if context.battle_started_at.is_none() {
            context.battle_started_at = Some(Utc::now());
        }
        self.state_machine.handle(RecordEvent::Start)?;
        self.recorder.start().await?;
        self.publish_recorder_state_event(RecorderStatus::Started, context);
        Ok(())
    }

    async fn pause(&self) -> AppResult<()> {
        if self.state_machine.state() != RecordState::Recording {
            tracing::warn!("recording not in progress");
            return Ok(());
        }
        self.state_machine.handle(RecordEvent::Pause)?;
        self.recorder.pause().await?;
        self.events.publish(build::recording_paused("current", None));
        Ok(())
    }

    async fn resume(&self) -> AppResult<()> {
        if self.state_machine.state() != RecordState::Paused {
            tracing::warn!("recording not paused");
            return Ok(());
        }
        self.state_machine.handle(RecordEvent::Resume)?;
        self.recorder.resume().await?;
        self.events.publish(build::recording_resumed("current"));
        Ok(())
    }

    async fn cancel(&self, context: &mut RecordingContext) -> AppResult<()> {
        *self.pending_stop_reason.lock().expect("poisoned") = Some(StopReason::Cancel);
        self.state_machine.handle(RecordEvent::Stop)?;
        self.recorder.cancel().await?;
        self.events.publish(build::recording_cancelled("current", None));
        context.reset_keeping_mode();
        Ok(())
    }

    /// Stops the recorder, extracts a result if one wasn't already captured
    /// mid-session, persists the asset, and resets `context` for the next
    /// session (keeping its game mode).
    async fn stop<F>(&self, context: &mut RecordingContext, get_result_frame: impl FnOnce() -> F) -> AppResult<Option<VideoAsset>>
    where
        F: Future<Output = Option<Frame>>,
    {
        if self.state_machine.state() == RecordState::Stopped {
            tracing::warn!("no recording in progress");
            return Ok(None);
        }

        *self.pending_stop_reason.lock().expect("poisoned") = Some(StopReason::Stop);
        self.state_machine.handle(RecordEvent::Stop)?;
        let (video, srt) = self.recorder.stop().await?;
        tracing::info!(video = %video.display(), "recording stopped");

        if context.result_frame.is_none() {
            if let Some(frame) = get_result_frame().await {
                context.result_frame = Some(frame);
            }
        }

        if let (Some(result_frame), None) = (context.result_frame.clone(), context.metadata.result.clone()) {
            if let Some(result) = self.analyzer.extract_session_result(&result_frame, context.metadata.game_mode).await {
                let current_metadata = context.metadata.clone();
                let mut updated_metadata = current_metadata.clone();
                updated_metadata.result = Some(result);

                if !context.manual_fields.is_empty() {
                    updated_metadata = self.merger.apply_manual_overrides(&current_metadata, &updated_metadata, &context.manual_fields);
                }
                if !context.pending_result_updates.is_empty() {
                    let (merged, applied) = self.merger.apply_pending_result_updates(&updated_metadata, &context.pending_result_updates, &context.manual_fields);
                    updated_metadata = merged;
                    if !applied.is_empty() {
                        context.manual_fields.extend(applied);
                    }
                    context.pending_result_updates.clear();
                }

                context.metadata = updated_metadata;
                tracing::info!("extracted result details after stop");
                self.events.publish(build::recording_metadata_updated(&context.metadata.to_dict()));
            }
        }

        let asset = self.asset_repository.save_recording(&video, srt.as_deref(), context.result_frame.as_ref(), &context.metadata)?;
        tracing::info!(video = %asset.video.display(), "video asset saved");

        self.publish_recorder_state_event(RecorderStatus::Stopped, context);
        context.reset_keeping_mode();
        Ok(Some(asset))
    }

    /// Queues a `recorder.update_metadata` request (§4.D, E2E-3) for the
    /// use case's main loop to fold into `context` on its next iteration;
    /// callers never hold `&mut RecordingContext` directly (§5 single-owner
    /// rule), so a submitted update can't be applied synchronously here.
    pub fn submit_manual_metadata_update(&self, updates: BTreeMap<String, String>) {
        let _ = self.manual_update_tx.send(updates);
    }

    /// Drains queued manual metadata updates and folds each into `context`
    /// via [`MetadataMerger::apply_manual_updates`], marking every touched
    /// field as manual so a later auto-merge (`reconcile_external`, `stop`)
    /// never silently overwrites it.
    pub fn drain_manual_metadata_updates(&self, context: &mut RecordingContext) {
        let updates: Vec<BTreeMap<String, String>> = {
            let mut rx = self.manual_update_rx.lock().expect("poisoned");
            std::iter::from_fn(|| rx.try_recv().ok()).collect()
        };
        for update in updates {
            let (updated, applied) = self.merger.apply_manual_updates(&context.metadata, &update);
            context.metadata = updated;
            context.manual_fields.extend(applied);
            tracing::info!("applied manual metadata update");
            self.events.publish(build::recording_metadata_updated(&context.metadata.to_dict()));
        }
    }

    /// Drains recorder status notifications observed since the last call
    /// (manual OBS start/pause/resume/stop) and reconciles the state
    /// machine and `context` for each, in arrival order.
    pub fn drain_external_status(&self, context: &mut RecordingContext) {
        let statuses: Vec<RecorderStatus> = {
            let mut rx = self.external_status_rx.lock().expect("poisoned");
            std::iter::from_fn(|| rx.try_recv().ok()).collect()
        };
        for status in statuses {
            self.reconcile_external(status, context);
        }
    }

    fn reconcile_external(&self, status: RecorderStatus, context: &mut RecordingContext) {
        let state = self.state_machine.state();

        if status == RecorderStatus::Started && state == RecordState::Stopped {
            tracing::info!("external recording start detected");
            if context.battle_started_at.is_none() {
                context.battle_started_at = Some(Utc::now());
            }
            if let Err(error) = self.state_machine.handle(RecordEvent::Start) {
                tracing::warn!(%error, "state transition failed");
            }
        }
        if status == RecorderStatus::Paused && state == RecordState::Recording {
            tracing::info!("external pause detected");
            if let Err(error) = self.state_machine.handle(RecordEvent::Pause) {
                tracing::warn!(%error, "state transition failed");
            }
        }
        if status == RecorderStatus::Resumed && state == RecordState::Paused {
            tracing::info!("external resume detected");
            if let Err(error) = self.state_machine.handle(RecordEvent::Resume) {
                tracing::warn!(%error, "state transition failed");
            }
        }
        if status == RecorderStatus::Stopped && state != RecordState::Stopped {
            tracing::warn!("external stop detected, resetting context");
            if let Err(error) = self.state_machine.handle(RecordEvent::Stop) {
                tracing::warn!(%error, "state transition failed (already stopped?)");
            }
            context.reset_keeping_mode();
        }

        self.publish_recorder_state_event(status, context);
    }

    fn publish_recorder_state_event(&self, status: RecorderStatus, context: &RecordingContext) {
        let event = match status {
            RecorderStatus::Started => build::recording_started("current", context.metadata.game_mode.as_str(), context.metadata.rate.as_ref().map(|r| r.to_string()).as_deref()),
            RecorderStatus::Paused => build::recording_paused("current", None),
            RecorderStatus::Resumed => build::recording_resumed("current"),
            RecorderStatus::Stopped => {
                let mut guard = self.pending_stop_reason.lock().expect("poisoned");
                let reason = guard.take();
                match reason {
                    Some(StopReason::Cancel) => build::recording_cancelled("current", None),
                    _ => {
                        let duration = context.battle_started_at.map(|started| (Utc::now() - started).num_milliseconds() as f64 / 1000.0);
                        build::recording_stopped("current", None, duration)
                    }
                }
            }
        };
        self.events.publish(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::game_mode::GameMode;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubRecorder {
        stopped_with: PathBuf,
    }

    #[async_trait]
    impl Recorder for StubRecorder {
        async fn setup(&self) -> AppResult<()> {
            Ok(())
        }
        async fn teardown(&self) -> AppResult<()> {
            Ok(())
        }
        async fn start(&self) -> AppResult<()> {
            Ok(())
        }
        async fn pause(&self) -> AppResult<()> {
            Ok(())
        }
        async fn resume(&self) -> AppResult<()> {
            Ok(())
        }
        async fn stop(&self) -> AppResult<(PathBuf, Option<PathBuf>)> {
            Ok((self.stopped_with.clone(), None))
        }
        async fn cancel(&self) -> AppResult<()> {
            Ok(())
        }
        async fn list_video_devices(&self) -> AppResult<Vec<String>> {
            Ok(Vec::new())
        }
        fn on_status(&self, _listener: crate::ports::recorder::StatusListener) {}
    }

    fn service(dir: &std::path::Path) -> Arc<RecordingSessionService> {
        let settings = crate::config::VideoStorageSettings { base_dir: dir.to_path_buf() };
        let repo = Arc::new(RecordedAssetRepository::new(settings, Arc::new(EventBus::default())));
        let recorder: Arc<dyn Recorder> = Arc::new(StubRecorder { stopped_with: dir.join("raw.mkv") });
        let registry = Arc::new(crate::matcher::MatcherRegistry::from_parts(Default::default(), Default::default(), Default::default()));
        let ocr: Arc<dyn crate::ports::Ocr> = Arc::new(NoopOcr);
        let analyzer = Arc::new(FrameAnalyzer::new(registry, ocr, crate::analyzer::AnalyzerConfig::default()));
        RecordingSessionService::new(Arc::new(StateMachine::new()), recorder, repo, analyzer, Arc::new(EventBus::default()))
    }

    struct NoopOcr;
    #[async_trait]
    impl crate::ports::Ocr for NoopOcr {
        async fn recognize(&self, _frame: &Frame, _roi: crate::domain::frame::Roi) -> AppResult<Option<String>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn start_transitions_to_matching_and_calls_the_recorder() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("raw.mkv"), b"x").unwrap();
        let service = service(dir.path());
        let mut context = RecordingContext::new(GameMode::Battle);

        service.execute(RecordingAction::Start, &mut context, || async { None }).await.unwrap();
        assert_eq!(service.state(), RecordState::Matching);
        assert!(context.battle_started_at.is_some());
    }

    #[tokio::test]
    async fn stop_from_stopped_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path());
        let mut context = RecordingContext::new(GameMode::Battle);
        let asset = service.execute(RecordingAction::Stop, &mut context, || async { None }).await.unwrap();
        assert!(asset.is_none());
    }

    #[tokio::test]
    async fn stop_saves_the_asset_and_resets_context() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("raw.mkv"), b"x").unwrap();
        let service = service(dir.path());
        let mut context = RecordingContext::new(GameMode::Battle);

        service.execute(RecordingAction::Start, &mut context, || async { None }).await.unwrap();
        service.state_machine.handle(RecordEvent::Start).unwrap();

        let called = Arc::new(AtomicBool::new(false));
        let called_clone = called.clone();
        let asset = service
            .execute(RecordingAction::Stop, &mut context, move || {
                called_clone.store(true, Ordering::SeqCst);
                async { None }
            })
            .await
            .unwrap();

        assert!(called.load(Ordering::SeqCst));
        assert!(asset.is_some());
        assert_eq!(context.battle_started_at, None, "context reset after stop");
    }
}
