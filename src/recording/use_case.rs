//! The auto-recording use case (§4.E): the only task that mutates a
//! [`RecordingContext`]. Pulls frames from the [`FrameHub`], runs the
//! rolling power-off counter, dispatches to the current phase handler, and
//! executes the resulting command against the [`RecordingSessionService`].
//! Grounded on the source's `AutoRecordingUseCase`; the frame-producer and
//! publisher-worker background tasks it wraps have no counterpart file in
//! this port (only the use case's own orchestration survived retrieval), so
//! the main loop here is built directly on the frame hub and event bus
//! already established elsewhere in this crate rather than translated.

use crate::analyzer::FrameAnalyzer;
use crate::bus::{EventBus, FrameHub};
use crate::domain::events::build;
use crate::domain::frame::Frame;
use crate::domain::state_machine::RecordState;
use crate::error::AppResult;
use crate::ports::{Capture, WeaponRecognizer};
use crate::recording::commands::RecordingCommand;
use crate::recording::context::RecordingContext;
use crate::recording::merger::MetadataMerger;
use crate::recording::session_service::RecordingSessionService;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const WELCOME_MESSAGE: &str = "Let's play!";

/// A positive `detect_power_off` roughly every ten seconds; six in a row
/// (≥60 s total) is a final power-off (§4.E step 2, §5 "six consecutive
/// positive power-off detections over a rolling 10-second window").
const POWER_OFF_CHECK_INTERVAL: Duration = Duration::from_secs(10);
const POWER_OFF_THRESHOLD: u32 = 6;
/// How often the main loop polls the frame hub when no new frame has
/// arrived yet.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

struct PowerOffTracker {
    consecutive: u32,
    last_check: Option<std::time::Instant>,
}

impl PowerOffTracker {
    fn new() -> PowerOffTracker {
        PowerOffTracker { consecutive: 0, last_check: None }
    }

    /// Folds in one frame's power-off predicate, returning `Some(count)` the
    /// instant a positive is actually counted (i.e. the window has elapsed),
    /// or `None` if it's too soon to check again or the frame was negative.
    fn observe(&mut self, detected: bool) -> Option<u32> {
        let now = std::time::Instant::now();
        let due = match self.last_check {
            Some(last) => now.duration_since(last) >= POWER_OFF_CHECK_INTERVAL,
            None => true,
        };
        if !due {
            return None;
        }
        self.last_check = Some(now);
        if detected {
            self.consecutive += 1;
            Some(self.consecutive)
        } else {
            self.consecutive = 0;
            None
        }
    }
}

pub struct AutoRecordingUseCase {
    session_service: Arc<RecordingSessionService>,
    frame_hub: Arc<FrameHub>,
    events: Arc<EventBus>,
    analyzer: Arc<FrameAnalyzer>,
    merger: MetadataMerger,
    weapon_recognizer: Arc<dyn WeaponRecognizer>,
    capture: Arc<dyn Capture>,
    stop_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<()>>,
    stop_tx: mpsc::UnboundedSender<()>,
}

impl AutoRecordingUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_service: Arc<RecordingSessionService>,
        frame_hub: Arc<FrameHub>,
        events: Arc<EventBus>,
        analyzer: Arc<FrameAnalyzer>,
        weapon_recognizer: Arc<dyn WeaponRecognizer>,
        capture: Arc<dyn Capture>,
    ) -> AutoRecordingUseCase {
        let (stop_tx, stop_rx) = mpsc::unbounded_channel();
        AutoRecordingUseCase {
            session_service,
            frame_hub,
            events,
            analyzer,
            merger: MetadataMerger,
            weapon_recognizer,
            capture,
            stop_rx: tokio::sync::Mutex::new(stop_rx),
            stop_tx,
        }
    }

    /// Signals the main loop to exit at its next iteration (§5 "the
    /// auto-recording loop exits on an internal stop signal or on final
    /// power-off").
    pub fn force_stop(&self) {
        let _ = self.stop_tx.send(());
    }

    /// Entry point for `recorder.update_metadata` (§4.D, E2E-3): queues the
    /// edit for the main loop to fold into the live context on its next
    /// iteration.
    pub fn submit_metadata_update(&self, updates: std::collections::BTreeMap<String, String>) {
        self.session_service.submit_manual_metadata_update(updates);
    }

    /// Runs setup, the main loop, and teardown, in that order; teardown
    /// always runs, even if the loop exits on an error.
    pub async fn run(&self, initial_context: RecordingContext) -> AppResult<()> {
        self.setup().await?;
        tracing::info!(message = WELCOME_MESSAGE, "auto-recording use case started");

        let outcome = self.run_main_loop(initial_context).await;
        let detected_power_off = matches!(outcome, Ok(true));

        self.teardown(detected_power_off).await;
        outcome.map(|_| ())
    }

    async fn setup(&self) -> AppResult<()> {
        {
            let mut rx = self.stop_rx.lock().await;
            while rx.try_recv().is_ok() {}
        }
        self.session_service.setup().await?;
        self.capture.setup().await?;
        Ok(())
    }

    /// Tears down the capture source and the recorder, cancelling an
    /// in-flight session first if one is active, and emitting the final
    /// power-off event if the loop exited because of one (§4.E "on loop
    /// exit... tear down background workers; emit final power-off event if
    /// applicable").
    async fn teardown(&self, detected_power_off: bool) {
        if matches!(self.session_service.state(), RecordState::Recording | RecordState::Paused) {
            let mut context = RecordingContext::new(crate::domain::game_mode::GameMode::Battle);
            if let Err(error) = self
                .session_service
                .execute(crate::recording::commands::RecordingAction::Cancel, &mut context, || std::future::ready(None))
                .await
            {
                tracing::warn!(%error, "failed to cancel in-flight session during teardown");
            }
        }

        if let Err(error) = self.capture.teardown().await {
            tracing::warn!(%error, "capture teardown failed");
        }
        if let Err(error) = self.session_service.teardown().await {
            tracing::warn!(%error, "session teardown failed");
        }

        if detected_power_off {
            self.events.publish(build::power_off_detected(POWER_OFF_THRESHOLD, POWER_OFF_THRESHOLD, true));
        }

        tracing::info!("auto-recording use case stopped");
    }

    /// Returns `Ok(true)` if the loop exited because of a final power-off,
    /// `Ok(false)` if it exited on an external stop signal.
    async fn run_main_loop(&self, mut context: RecordingContext) -> AppResult<bool> {
        let mut power_off = PowerOffTracker::new();
        let mut last_state = self.session_service.state();

        loop {
            {
                let mut rx = self.stop_rx.lock().await;
                if rx.try_recv().is_ok() {
                    return Ok(false);
                }
            }

            let frame = match self.frame_hub.get_latest() {
                Some(frame) => frame,
                None => {
                    tokio::time::sleep(IDLE_POLL_INTERVAL).await;
                    continue;
                }
            };

            if let Some(count) = power_off.observe(self.analyzer.detect_power_off(&frame).await) {
                if count >= POWER_OFF_THRESHOLD {
                    return Ok(true);
                }
            }

            self.session_service.drain_manual_metadata_updates(&mut context);
            self.session_service.drain_external_status(&mut context);

            let state = self.session_service.state();
            if state != last_state {
                tracing::info!(from = ?last_state, to = ?state, "recording phase changed");
                last_state = state;
            }

            let command = crate::recording::phase_handlers::handle(state, &frame, context, &self.analyzer, &self.merger, self.weapon_recognizer.as_ref(), Utc::now()).await;
            context = self.apply_command(command, &frame).await?;
        }
    }

    async fn apply_command(&self, command: RecordingCommand, current_frame: &Frame) -> AppResult<RecordingContext> {
        let RecordingCommand { action, mut updated_context, reason, events } = command;

        for event in events {
            self.events.publish(event);
        }

        if matches!(action, crate::recording::commands::RecordingAction::None) {
            return Ok(updated_context);
        }
        if let Some(reason) = &reason {
            tracing::info!(action = ?action, reason, "executing recording action");
        } else {
            tracing::debug!(action = ?action, "executing recording action");
        }

        let result_frame = updated_context.result_frame.clone();
        let fallback_frame = current_frame.clone();
        self.session_service
            .execute(action, &mut updated_context, move || {
                std::future::ready(result_frame.or(Some(fallback_frame)))
            })
            .await?;

        Ok(updated_context)
    }
}
