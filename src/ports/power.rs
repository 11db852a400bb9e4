//! Power manager port: module M calls `sleep()` after a log-flush delay
//! once the user accepts an `auto_sleep_pending` prompt.

use crate::error::AppError;
use async_trait::async_trait;

#[async_trait]
pub trait PowerManager: Send + Sync {
    async fn sleep(&self) -> Result<(), AppError>;
}
