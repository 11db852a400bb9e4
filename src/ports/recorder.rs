//! Recorder port: the external screen recorder driving module F's session
//! service. Concrete adapters talk to the recorder over its own control
//! protocol (e.g. a WebSocket); the core only ever calls through this trait.

use crate::error::AppError;
use async_trait::async_trait;
use std::path::PathBuf;

/// One of the four status values the recorder's callback may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderStatus {
    Started,
    Paused,
    Resumed,
    Stopped,
}

impl RecorderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecorderStatus::Started => "started",
            RecorderStatus::Paused => "paused",
            RecorderStatus::Resumed => "resumed",
            RecorderStatus::Stopped => "stopped",
        }
    }
}

pub type StatusListener = Box<dyn Fn(RecorderStatus) + Send + Sync>;

#[async_trait]
pub trait Recorder: Send + Sync {
    async fn setup(&self) -> Result<(), AppError>;
    async fn teardown(&self) -> Result<(), AppError>;
    async fn start(&self) -> Result<(), AppError>;
    async fn pause(&self) -> Result<(), AppError>;
    async fn resume(&self) -> Result<(), AppError>;
    /// Stops recording and returns the finished clip, plus a subtitle
    /// sidecar if a transcriber produced one for this session.
    async fn stop(&self) -> Result<(PathBuf, Option<PathBuf>), AppError>;
    async fn cancel(&self) -> Result<(), AppError>;
    async fn list_video_devices(&self) -> Result<Vec<String>, AppError>;

    /// Registers a listener invoked on every status transition the recorder
    /// reports. Implementations must not hold any lock while invoking
    /// listeners (§5).
    fn on_status(&self, listener: StatusListener);
}
