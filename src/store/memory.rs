//! In-memory metadata store
//!
//! Used by tests and by storefree runs (no DATABASE_URL configured).

use super::{MetadataStore, RecordingRecord};
use crate::config::GlobalSettings;
use crate::error::{Error, Result};
use crate::pipeline_manager::PipelineStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryMetadataStore {
    recordings: RwLock<HashMap<String, RecordingRecord>>,
    statuses: RwLock<HashMap<String, PipelineStatus>>,
    settings: RwLock<GlobalSettings>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: GlobalSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
            ..Self::default()
        }
    }

    /// Lookup for tests and status queries
    pub async fn get_recording(&self, id: &str) -> Option<RecordingRecord> {
        self.recordings.read().await.get(id).cloned()
    }

    pub async fn recordings_for_camera(&self, camera_id: &str) -> Vec<RecordingRecord> {
        self.recordings
            .read()
            .await
            .values()
            .filter(|r| r.camera_id == camera_id)
            .cloned()
            .collect()
    }

    pub async fn camera_status(&self, camera_id: &str) -> Option<PipelineStatus> {
        self.statuses.read().await.get(camera_id).copied()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn insert_recording(&self, record: &RecordingRecord) -> Result<()> {
        self.recordings
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn update_recording(
        &self,
        id: &str,
        end_time: DateTime<Utc>,
        duration_seconds: i64,
        file_size: u64,
    ) -> Result<()> {
        let mut recordings = self.recordings.write().await;
        let record = recordings
            .get_mut(id)
            .ok_or_else(|| Error::Internal(format!("recording {} not found", id)))?;
        record.end_time = Some(end_time);
        record.duration_seconds = Some(duration_seconds);
        record.file_size = file_size;
        Ok(())
    }

    async fn set_camera_status(&self, camera_id: &str, status: PipelineStatus) -> Result<()> {
        self.statuses
            .write()
            .await
            .insert(camera_id.to_string(), status);
        Ok(())
    }

    async fn get_global_settings(&self) -> Result<GlobalSettings> {
        Ok(self.settings.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RecordType;

    #[tokio::test]
    async fn recording_lifecycle_updates_once() {
        let store = MemoryMetadataStore::new();
        let record = RecordingRecord::new(
            "cam-1",
            "Front door",
            RecordType::Motion,
            "/tmp/cam-1_20250101_motion.avi".to_string(),
            Utc::now(),
        );
        store.insert_recording(&record).await.unwrap();

        let stored = store.get_recording(&record.id).await.unwrap();
        assert!(stored.end_time.is_none());
        assert_eq!(stored.file_size, 0);

        let end = Utc::now();
        store
            .update_recording(&record.id, end, 42, 1024)
            .await
            .unwrap();
        let stored = store.get_recording(&record.id).await.unwrap();
        assert_eq!(stored.end_time, Some(end));
        assert_eq!(stored.duration_seconds, Some(42));
        assert_eq!(stored.file_size, 1024);
    }

    #[tokio::test]
    async fn unknown_recording_update_errors() {
        let store = MemoryMetadataStore::new();
        assert!(store
            .update_recording("nope", Utc::now(), 1, 1)
            .await
            .is_err());
    }
}
