//! Auto-process orchestrator (§4.M): watches for final power-off and for
//! edit/upload completion, schedules the edit-then-upload pipeline with a
//! cancellation grace period, and offers an auto-sleep prompt afterward.
//! Grounded on the source's `AutoProcessService`.

use crate::bus::EventBus;
use crate::config::BehaviorSettings;
use crate::domain::events::{build, event_type};
use crate::error::AppResult;
use crate::ports::PowerManager;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Grace period before an auto-scheduled edit/upload or sleep actually
/// starts, giving the user a window to cancel it (§4.M, E2E acceptance:
/// "auto_process_pending fires when configured").
const GRACE_PERIOD_SECONDS: f64 = 15.0;

/// What the edit→upload pipeline looks like from here: whether one is
/// already running, and how to kick one off. The concrete use case (module
/// K/L) is injected so this orchestrator never depends on the editor or
/// uploader directly.
#[async_trait]
pub trait EditUploadTrigger: Send + Sync {
    fn is_running(&self) -> bool;
    async fn start(&self, trigger: &str) -> AppResult<()>;
}

/// Whether any recordings exist to process; backed by
/// [`crate::asset::RecordedAssetRepository::list_recordings`].
pub trait RecordingsAvailable: Send + Sync {
    fn any_recordings(&self) -> bool;
}

pub struct AutoProcessService {
    events: Arc<EventBus>,
    behavior: BehaviorSettings,
    edit_upload: Arc<dyn EditUploadTrigger>,
    power: Arc<dyn PowerManager>,
    recordings: Arc<dyn RecordingsAvailable>,
    is_auto_processing: AtomicBool,
    auto_sleep_allowed: AtomicBool,
    /// Set by `process.cancel_edit_upload` (E2E-5) to abort a pending
    /// grace-period follow-through before it fires. Cleared at the start of
    /// each new grace period.
    cancel_requested: Arc<AtomicBool>,
}

impl AutoProcessService {
    pub fn new(
        events: Arc<EventBus>,
        behavior: BehaviorSettings,
        edit_upload: Arc<dyn EditUploadTrigger>,
        power: Arc<dyn PowerManager>,
        recordings: Arc<dyn RecordingsAvailable>,
    ) -> AutoProcessService {
        AutoProcessService {
            events,
            behavior,
            edit_upload,
            power,
            recordings,
            is_auto_processing: AtomicBool::new(false),
            auto_sleep_allowed: AtomicBool::new(false),
            cancel_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Entry point for `process.cancel_edit_upload` (E2E-5): aborts whichever
    /// grace period is currently counting down, if any. A cancellation seen
    /// after the grace period has already elapsed has no effect; an
    /// in-flight edit/upload run itself is cancelled through its own
    /// cooperative cancellation flag, not through this service.
    pub fn cancel_pending(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    /// Entry point for `process.start_edit_upload` (E2E-5): starts the
    /// edit→upload pipeline immediately, bypassing any grace period.
    pub async fn start_edit_upload_now(&self) -> AppResult<()> {
        self.start_auto_process().await
    }

    /// Subscribes to `power_off_detected`, `edit_upload_completed`, and
    /// `auto_sleep_pending`, and drives the state machine indefinitely
    /// (mirrors the source's `start()` loop; torn down the same way the
    /// recorder's main loop is, by the caller aborting the task rather than
    /// a cancellation token of its own).
    pub async fn run(self: Arc<Self>) -> ! {
        let sub = self.events.subscribe(None);
        tracing::info!("auto-process service started");

        loop {
            let events = sub.poll(10).await;
            for event in events {
                match event.event_type.as_str() {
                    event_type::POWER_OFF_DETECTED => self.handle_power_off_detected(&event).await,
                    event_type::PROCESS_EDIT_UPLOAD_COMPLETED => self.handle_edit_upload_completed(&event).await,
                    event_type::PROCESS_SLEEP_PENDING => self.auto_sleep_allowed.store(true, Ordering::SeqCst),
                    _ => {}
                }
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Spawns the "if not cancelled" follow-through for a just-announced
    /// grace period: waits out `GRACE_PERIOD_SECONDS`, then runs `then`
    /// unless `cancel_pending` was called in the meantime.
    fn schedule_after_grace_period(self: &Arc<Self>, then: impl FnOnce(Arc<Self>) -> futures::future::BoxFuture<'static, ()> + Send + 'static) {
        self.cancel_requested.store(false, Ordering::SeqCst);
        let service = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs_f64(GRACE_PERIOD_SECONDS)).await;
            if service.cancel_requested.swap(false, Ordering::SeqCst) {
                tracing::info!("grace period cancelled");
                return;
            }
            then(service).await;
        });
    }

    async fn handle_power_off_detected(self: &Arc<Self>, event: &crate::domain::events::DomainEvent) {
        let is_final = event.payload.get("final").and_then(serde_json::Value::as_bool).unwrap_or(false);
        if !is_final || !self.behavior.edit_after_power_off {
            return;
        }
        if self.is_auto_processing.load(Ordering::SeqCst) || self.edit_upload.is_running() {
            tracing::info!("edit/upload already running, skipping auto-process notice");
            return;
        }
        if !self.recordings.any_recordings() {
            tracing::info!("no recordings to process, skipping auto-process notice");
            return;
        }

        tracing::info!("power off detected, scheduling auto edit/upload");
        self.events.publish(build::process_pending(
            GRACE_PERIOD_SECONDS,
            "Power off detected. Auto edit/upload will start in 15 seconds unless cancelled.",
        ));
        self.schedule_after_grace_period(|service| {
            Box::pin(async move {
                if let Err(error) = service.start_auto_process().await {
                    tracing::error!(%error, "scheduled auto edit/upload failed to start");
                }
            })
        });
    }

    /// Actually starts the edit→upload pipeline, fired once the grace
    /// period has elapsed without a cancellation.
    pub async fn start_auto_process(&self) -> AppResult<()> {
        if self.is_auto_processing.swap(true, Ordering::SeqCst) {
            return Err(crate::error::AppError::ResourceConflict("auto-process already running".into()));
        }
        self.auto_sleep_allowed.store(false, Ordering::SeqCst);

        if let Err(error) = self.edit_upload.start("auto").await {
            self.is_auto_processing.store(false, Ordering::SeqCst);
            tracing::error!(%error, "failed to start auto edit/upload");
            return Err(error);
        }

        tracing::info!("auto edit/upload started");
        self.events.publish(build::process_started());
        Ok(())
    }

    async fn handle_edit_upload_completed(self: &Arc<Self>, event: &crate::domain::events::DomainEvent) {
        let trigger = event.payload.get("trigger").and_then(serde_json::Value::as_str).unwrap_or("manual").to_string();
        let success = event.payload.get("success").and_then(serde_json::Value::as_bool).unwrap_or(false);

        self.is_auto_processing.store(false, Ordering::SeqCst);

        if trigger == "manual" {
            if self.behavior.sleep_after_upload {
                self.auto_sleep_allowed.store(true, Ordering::SeqCst);
            }
            return;
        }

        if !success {
            tracing::warn!("auto edit/upload failed; notifying sleep settings if enabled");
        }
        if !self.behavior.sleep_after_upload {
            tracing::info!("auto-sleep disabled, skipping sleep notice");
            return;
        }

        self.auto_sleep_allowed.store(true, Ordering::SeqCst);
        self.events.publish(build::auto_sleep_pending(
            GRACE_PERIOD_SECONDS,
            "Edit/upload complete. Auto sleep will start in 15 seconds unless cancelled.",
        ));
        self.schedule_after_grace_period(|service| {
            Box::pin(async move {
                if let Err(error) = service.start_auto_sleep().await {
                    tracing::error!(%error, "scheduled auto sleep failed to start");
                }
            })
        });
    }

    /// Actually puts the machine to sleep, fired once the auto-sleep grace
    /// period has elapsed without a cancellation. A short delay lets
    /// trailing log lines flush before the OS suspends the process.
    pub async fn start_auto_sleep(&self) -> AppResult<()> {
        if !self.auto_sleep_allowed.swap(false, Ordering::SeqCst) {
            return Err(crate::error::AppError::RuleViolation("auto-sleep is not currently allowed".into()));
        }

        tracing::info!("starting auto sleep");
        self.events.publish(build::auto_sleep_started());
        tokio::time::sleep(Duration::from_secs(3)).await;
        self.power.sleep().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StubTrigger {
        running: AtomicBool,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EditUploadTrigger for StubTrigger {
        fn is_running(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }
        async fn start(&self, trigger: &str) -> AppResult<()> {
            self.calls.lock().unwrap().push(trigger.to_string());
            Ok(())
        }
    }

    struct AlwaysHasRecordings;
    impl RecordingsAvailable for AlwaysHasRecordings {
        fn any_recordings(&self) -> bool {
            true
        }
    }

    struct StubPower;
    #[async_trait]
    impl PowerManager for StubPower {
        async fn sleep(&self) -> AppResult<()> {
            Ok(())
        }
    }

    fn service() -> AutoProcessService {
        AutoProcessService::new(
            Arc::new(EventBus::default()),
            BehaviorSettings { edit_after_power_off: true, sleep_after_upload: true, ..Default::default() },
            Arc::new(StubTrigger { running: AtomicBool::new(false), calls: Mutex::new(Vec::new()) }),
            Arc::new(StubPower),
            Arc::new(AlwaysHasRecordings),
        )
    }

    #[tokio::test]
    async fn start_auto_process_fails_when_already_running() {
        let service = service();
        service.start_auto_process().await.unwrap();
        assert!(service.start_auto_process().await.is_err());
    }

    #[tokio::test]
    async fn start_auto_sleep_fails_unless_allowed() {
        let service = service();
        assert!(service.start_auto_sleep().await.is_err());
    }
}
