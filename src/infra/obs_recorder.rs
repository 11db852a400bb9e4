//! Recorder adapter (§6 external interfaces): drives OBS Studio over its
//! WebSocket control protocol. Grounded on the teacher's own
//! `CaptureContext` lifecycle (`setup`/`initialize`/`start_recording`/
//! `stop_recording`, a `RwLock`-guarded status snapshot, logging at every
//! transition) generalized from embedded libobs calls to `obws` requests
//! against an external OBS process, since this crate's recorder is OBS
//! itself rather than a bundled capture engine.

use crate::config::ObsSettings;
use crate::error::{AppError, AppResult};
use crate::ports::recorder::{Recorder, RecorderStatus, StatusListener};
use async_trait::async_trait;
use obws::Client;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::OnceCell;

pub struct ObsRecorder {
    settings: ObsSettings,
    client: OnceCell<Client>,
    listeners: Mutex<Vec<StatusListener>>,
}

impl ObsRecorder {
    pub fn new(settings: ObsSettings) -> ObsRecorder {
        ObsRecorder { settings, client: OnceCell::new(), listeners: Mutex::new(Vec::new()) }
    }

    async fn client(&self) -> AppResult<&Client> {
        self.client
            .get_or_try_init(|| async {
                let password = (!self.settings.websocket_password.is_empty()).then(|| self.settings.websocket_password.clone());
                Client::connect(&self.settings.websocket_host, self.settings.websocket_port, password)
                    .await
                    .map_err(|error| AppError::Device(format!("failed to connect to OBS at {}:{}: {error}", self.settings.websocket_host, self.settings.websocket_port)))
            })
            .await
    }

    fn notify(&self, status: RecorderStatus) {
        let listeners = self.listeners.lock().unwrap();
        for listener in listeners.iter() {
            listener(status);
        }
    }
}

#[async_trait]
impl Recorder for ObsRecorder {
    async fn setup(&self) -> AppResult<()> {
        self.client().await?;
        tracing::info!("obs recorder connected");
        Ok(())
    }

    async fn teardown(&self) -> AppResult<()> {
        tracing::info!("obs recorder disconnecting");
        Ok(())
    }

    async fn start(&self) -> AppResult<()> {
        let client = self.client().await?;
        client.recording().start().await.map_err(|error| AppError::Recording(format!("failed to start OBS recording: {error}")))?;
        self.notify(RecorderStatus::Started);
        Ok(())
    }

    async fn pause(&self) -> AppResult<()> {
        let client = self.client().await?;
        client.recording().pause().await.map_err(|error| AppError::Recording(format!("failed to pause OBS recording: {error}")))?;
        self.notify(RecorderStatus::Paused);
        Ok(())
    }

    async fn resume(&self) -> AppResult<()> {
        let client = self.client().await?;
        client.recording().resume().await.map_err(|error| AppError::Recording(format!("failed to resume OBS recording: {error}")))?;
        self.notify(RecorderStatus::Resumed);
        Ok(())
    }

    async fn stop(&self) -> AppResult<(PathBuf, Option<PathBuf>)> {
        let client = self.client().await?;
        let output_path = client.recording().stop().await.map_err(|error| AppError::Recording(format!("failed to stop OBS recording: {error}")))?;
        self.notify(RecorderStatus::Stopped);
        Ok((PathBuf::from(output_path), None))
    }

    async fn cancel(&self) -> AppResult<()> {
        let client = self.client().await?;
        let output_path = client.recording().stop().await.map_err(|error| AppError::Recording(format!("failed to cancel OBS recording: {error}")))?;
        self.notify(RecorderStatus::Stopped);
        if let Err(error) = std::fs::remove_file(&output_path) {
            tracing::warn!(%error, path = %output_path, "failed to discard cancelled recording");
        }
        Ok(())
    }

    async fn list_video_devices(&self) -> AppResult<Vec<String>> {
        let client = self.client().await?;
        let inputs = client.inputs().list(None).await.map_err(|error| AppError::Device(format!("failed to list OBS inputs: {error}")))?;
        Ok(inputs.into_iter().map(|input| input.id.name).collect())
    }

    fn on_status(&self, listener: StatusListener) {
        self.listeners.lock().unwrap().push(listener);
    }
}
