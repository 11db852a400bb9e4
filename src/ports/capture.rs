//! Capture port: the live video source the matcher/analyzer pipeline polls.

use crate::domain::frame::Frame;
use crate::error::AppError;
use async_trait::async_trait;

#[async_trait]
pub trait Capture: Send + Sync {
    async fn setup(&self) -> Result<(), AppError>;
    async fn teardown(&self) -> Result<(), AppError>;

    /// Returns the most recently captured frame. Must never buffer a
    /// backlog: a slow consumer sees the latest frame, not a queue of stale
    /// ones (§4.I frame hub keeps only the latest).
    async fn capture(&self) -> Result<Option<Frame>, AppError>;
}
