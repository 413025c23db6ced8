//! Recording sessions
//!
//! ## Responsibilities
//!
//! - Open one output file per session and register it in the metadata store
//! - Flush buffered pre-roll frames ahead of live frames for motion clips
//! - Finalize exactly once: close the encoder, then patch end time,
//!   duration and file size onto the stored record
//!
//! A session is either finalized or abandoned; both consume it, so a closed
//! writer can never be written to again.

pub mod writer;

pub use writer::{FfmpegWriterFactory, VideoWriter, VideoWriterFactory};

use crate::config::CameraConfig;
use crate::error::Result;
use crate::frame::{Dimensions, Frame};
use crate::store::{MetadataStore, RecordType, RecordingRecord};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

pub struct RecordingSession {
    record_id: String,
    camera_id: String,
    record_type: RecordType,
    started_at: DateTime<Utc>,
    file_path: PathBuf,
    writer: Box<dyn VideoWriter>,
}

impl RecordingSession {
    /// Open a new session. The record row is inserted before any live frame
    /// is written; for motion sessions the pre-roll snapshot is flushed
    /// first so the clip starts before the trigger.
    #[allow(clippy::too_many_arguments)]
    pub async fn start(
        camera: &CameraConfig,
        record_type: RecordType,
        dims: Dimensions,
        fps: u32,
        preroll: &[Frame],
        factory: &dyn VideoWriterFactory,
        store: &Arc<dyn MetadataStore>,
    ) -> Result<Self> {
        let storage_dir = Path::new(&camera.recording.storage_path);
        tokio::fs::create_dir_all(storage_dir).await?;

        let started_at = Utc::now();
        let file_name = format!(
            "{}_{}_{}.avi",
            camera.id,
            started_at.format("%Y%m%d_%H%M%S"),
            record_type
        );
        let file_path = storage_dir.join(file_name);

        let mut writer = factory.open(&file_path, dims, fps).await?;

        if !preroll.is_empty() {
            for frame in preroll {
                if let Err(e) = writer.write(frame).await {
                    let _ = writer.close().await;
                    return Err(e);
                }
            }
        }

        let record = RecordingRecord::new(
            &camera.id,
            &camera.name,
            record_type,
            file_path.to_string_lossy().into_owned(),
            started_at,
        );
        if let Err(e) = store.insert_recording(&record).await {
            let _ = writer.close().await;
            return Err(e);
        }

        info!(
            camera_id = %camera.id,
            record_type = %record_type,
            path = %file_path.display(),
            preroll_frames = preroll.len(),
            "Recording started"
        );

        Ok(Self {
            record_id: record.id,
            camera_id: camera.id.clone(),
            record_type,
            started_at,
            file_path,
            writer,
        })
    }

    pub async fn write(&mut self, frame: &Frame) -> Result<()> {
        self.writer.write(frame).await
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Close the encoder and patch final metadata onto the stored record
    pub async fn finalize(mut self, store: &Arc<dyn MetadataStore>) -> Result<RecordingRecord> {
        self.writer.close().await?;

        let end_time = Utc::now();
        let duration_seconds = (end_time - self.started_at).num_seconds();
        let file_size = tokio::fs::metadata(&self.file_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);

        store
            .update_recording(&self.record_id, end_time, duration_seconds, file_size)
            .await?;

        info!(
            camera_id = %self.camera_id,
            record_type = %self.record_type,
            duration_seconds,
            file_size,
            path = %self.file_path.display(),
            "Recording finalized"
        );

        Ok(RecordingRecord {
            id: self.record_id,
            camera_id: self.camera_id,
            camera_name: String::new(),
            start_time: self.started_at,
            end_time: Some(end_time),
            duration_seconds: Some(duration_seconds),
            record_type: self.record_type,
            file_path: self.file_path.to_string_lossy().into_owned(),
            file_size,
            created_at: self.started_at,
        })
    }

    /// Drop the session after a write failure. The partial file stays on
    /// disk; the record keeps its open end time so operators can spot it.
    pub async fn abandon(mut self) {
        if let Err(e) = self.writer.close().await {
            error!(
                camera_id = %self.camera_id,
                error = %e,
                "Encoder close failed while abandoning session"
            );
        }
        error!(
            camera_id = %self.camera_id,
            path = %self.file_path.display(),
            "Recording session abandoned after write failure"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::writer::doubles::{FailingWriterFactory, MemoryWriterFactory};
    use super::*;
    use crate::config::{CameraConfig, GlobalSettings};
    use crate::store::MemoryMetadataStore;

    fn test_camera(storage: &Path) -> CameraConfig {
        let mut camera = CameraConfig::example("cam-1", "Front door");
        camera.recording.storage_path = storage.to_string_lossy().into_owned();
        camera
    }

    fn gray_frame(value: u8) -> Frame {
        Frame::new(4, 4, vec![value; 4 * 4 * 3]).unwrap()
    }

    #[tokio::test]
    async fn preroll_frames_precede_live_frames() {
        let dir = tempfile::tempdir().unwrap();
        let camera = test_camera(dir.path());
        let profile = GlobalSettings::default().active_profile();
        let factory = MemoryWriterFactory::new(false);
        let store: Arc<dyn MetadataStore> = Arc::new(MemoryMetadataStore::new());

        let preroll = vec![gray_frame(10), gray_frame(20)];
        let mut session = RecordingSession::start(
            &camera,
            RecordType::Motion,
            Dimensions {
                width: 4,
                height: 4,
            },
            profile.target_fps,
            &preroll,
            &factory,
            &store,
        )
        .await
        .unwrap();

        session.write(&gray_frame(30)).await.unwrap();
        session.finalize(&store).await.unwrap();

        let states = factory.states.lock().unwrap();
        let state = states[0].lock().unwrap();
        assert!(state.closed);
        let values: Vec<u8> = state.frames.iter().map(|f| f.data()[0]).collect();
        assert_eq!(values, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn finalize_patches_duration_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let camera = test_camera(dir.path());
        let factory = MemoryWriterFactory::new(true);
        let memory_store = Arc::new(MemoryMetadataStore::new());
        let store: Arc<dyn MetadataStore> = memory_store.clone();

        let mut session = RecordingSession::start(
            &camera,
            RecordType::Continuous,
            Dimensions {
                width: 4,
                height: 4,
            },
            15,
            &[],
            &factory,
            &store,
        )
        .await
        .unwrap();
        session.write(&gray_frame(1)).await.unwrap();
        session.write(&gray_frame(2)).await.unwrap();
        let record = session.finalize(&store).await.unwrap();

        let stored = memory_store.get_recording(&record.id).await.unwrap();
        assert!(stored.end_time.is_some());
        assert_eq!(stored.duration_seconds, record.duration_seconds);
        // two 4x4 BGR frames flushed raw
        assert_eq!(stored.file_size, 2 * 4 * 4 * 3);
    }

    #[tokio::test]
    async fn filename_encodes_camera_and_type() {
        let dir = tempfile::tempdir().unwrap();
        let camera = test_camera(dir.path());
        let factory = MemoryWriterFactory::new(false);
        let store: Arc<dyn MetadataStore> = Arc::new(MemoryMetadataStore::new());

        let session = RecordingSession::start(
            &camera,
            RecordType::Motion,
            Dimensions {
                width: 4,
                height: 4,
            },
            15,
            &[],
            &factory,
            &store,
        )
        .await
        .unwrap();

        let name = session
            .file_path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        assert!(name.starts_with("cam-1_"));
        assert!(name.ends_with("_motion.avi"));
        session.abandon().await;
    }

    #[tokio::test]
    async fn failed_write_surfaces_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let camera = test_camera(dir.path());
        let factory = FailingWriterFactory;
        let store: Arc<dyn MetadataStore> = Arc::new(MemoryMetadataStore::new());

        let mut session = RecordingSession::start(
            &camera,
            RecordType::Motion,
            Dimensions {
                width: 4,
                height: 4,
            },
            15,
            &[],
            &factory,
            &store,
        )
        .await
        .unwrap();

        let err = session.write(&gray_frame(1)).await.unwrap_err();
        assert!(matches!(err, crate::error::Error::Write(_)));
        session.abandon().await;
    }
}
