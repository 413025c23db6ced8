//! MySQL metadata store (sqlx)
//!
//! Schema expectations: a `recordings` table matching `RecordingRecord`,
//! a `cameras` table with a `status` column, and a `settings` table holding
//! the global settings JSON under `setting_key = 'global'`.

use super::{MetadataStore, RecordingRecord};
use crate::config::GlobalSettings;
use crate::error::Result;
use crate::pipeline_manager::PipelineStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlPool;
use sqlx::Row;

pub struct MySqlMetadataStore {
    pool: MySqlPool,
}

impl MySqlMetadataStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataStore for MySqlMetadataStore {
    async fn insert_recording(&self, record: &RecordingRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO recordings
                (id, camera_id, camera_name, start_time, end_time,
                 duration_seconds, record_type, file_path, file_size, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.camera_id)
        .bind(&record.camera_name)
        .bind(record.start_time)
        .bind(record.end_time)
        .bind(record.duration_seconds)
        .bind(record.record_type.as_str())
        .bind(&record.file_path)
        .bind(record.file_size)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_recording(
        &self,
        id: &str,
        end_time: DateTime<Utc>,
        duration_seconds: i64,
        file_size: u64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE recordings SET end_time = ?, duration_seconds = ?, file_size = ? WHERE id = ?",
        )
        .bind(end_time)
        .bind(duration_seconds)
        .bind(file_size)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_camera_status(&self, camera_id: &str, status: PipelineStatus) -> Result<()> {
        sqlx::query("UPDATE cameras SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(camera_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_global_settings(&self) -> Result<GlobalSettings> {
        let row = sqlx::query("SELECT setting_json FROM settings WHERE setting_key = 'global'")
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let json: String = row.get("setting_json");
                match serde_json::from_str(&json) {
                    Ok(settings) => Ok(settings),
                    Err(e) => {
                        tracing::error!(error = %e, "Malformed global settings, using defaults");
                        Ok(GlobalSettings::default())
                    }
                }
            }
            None => {
                tracing::warn!("settings.global not found, using defaults");
                Ok(GlobalSettings::default())
            }
        }
    }
}
