//! Persisted recording metadata types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of recording output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    Continuous,
    Motion,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Continuous => "continuous",
            RecordType::Motion => "motion",
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recording metadata row
///
/// Created when a session starts (end time unset), updated exactly once at
/// finalize, never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingRecord {
    pub id: String,
    pub camera_id: String,
    pub camera_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub record_type: RecordType,
    /// Must match the on-disk path exactly for later playback/deletion
    pub file_path: String,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
}

impl RecordingRecord {
    pub fn new(
        camera_id: &str,
        camera_name: &str,
        record_type: RecordType,
        file_path: String,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            camera_id: camera_id.to_string(),
            camera_name: camera_name.to_string(),
            start_time,
            end_time: None,
            duration_seconds: None,
            record_type,
            file_path,
            file_size: 0,
            created_at: Utc::now(),
        }
    }
}
