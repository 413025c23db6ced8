//! Metadata store
//!
//! ## Responsibilities
//!
//! - Narrow CRUD contract for recording metadata, camera status mirroring
//!   and global settings
//! - MySQL adapter (sqlx) and in-memory adapter (tests, storefree runs)
//!
//! The pipeline never assumes a specific storage engine; everything goes
//! through the `MetadataStore` trait.

mod memory;
mod mysql;
mod types;

pub use memory::MemoryMetadataStore;
pub use mysql::MySqlMetadataStore;
pub use types::{RecordType, RecordingRecord};

use crate::config::GlobalSettings;
use crate::error::Result;
use crate::pipeline_manager::PipelineStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Abstract recording/settings persistence consumed by the pipeline
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Persist a freshly started recording (end time unset)
    async fn insert_recording(&self, record: &RecordingRecord) -> Result<()>;

    /// Finalize a recording's metadata; called exactly once per recording
    async fn update_recording(
        &self,
        id: &str,
        end_time: DateTime<Utc>,
        duration_seconds: i64,
        file_size: u64,
    ) -> Result<()>;

    /// Mirror a pipeline status change (best-effort; the manager's map is
    /// authoritative)
    async fn set_camera_status(&self, camera_id: &str, status: PipelineStatus) -> Result<()>;

    /// Load global settings (profiles, alert credentials)
    async fn get_global_settings(&self) -> Result<GlobalSettings>;
}
