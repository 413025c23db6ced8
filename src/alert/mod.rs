//! Alert sink
//!
//! ## Responsibilities
//!
//! - Abstract motion-notification and clip-delivery contract
//! - Telegram Bot API implementation
//!
//! Deliveries are fire-and-forget: the pipeline spawns them onto detached
//! tasks; failures are logged and swallowed, never retried, never allowed
//! to couple frame-loop latency to network I/O.

mod telegram;

pub use telegram::TelegramAlertSink;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Abstract best-effort notification target
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Announce a motion event
    async fn notify_motion(&self, camera_name: &str, at: DateTime<Utc>) -> Result<()>;

    /// Deliver a finalized motion clip
    async fn deliver_clip(&self, camera_name: &str, file_path: &Path) -> Result<()>;
}
