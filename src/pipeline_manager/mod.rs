//! Pipeline manager
//!
//! ## Responsibilities
//!
//! - Start/stop camera pipelines and track their status
//! - Serialize start/stop per camera id with a lock map
//! - Live-view frame access and connection testing
//!
//! The manager's status map is authoritative for runtime state; the
//! metadata store receives best-effort mirror updates so dashboards keep
//! working across restarts.

use crate::alert::AlertSink;
use crate::config::{CameraConfig, GlobalSettings};
use crate::error::{Error, Result};
use crate::pipeline::{CameraPipeline, PipelineHandle};
use crate::recording::VideoWriterFactory;
use crate::source::{self, probe_stream};
use crate::store::MetadataStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Grace period for a pipeline to exit after a stop request before its
/// task is aborted
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Runtime state of one camera's pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    /// Not running
    Inactive,
    /// Frame loop running
    Active,
    /// Stopped after exhausting the reconnect budget or failing to start
    Error,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Inactive => "inactive",
            PipelineStatus::Active => "active",
            PipelineStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of probing a camera URL without starting a pipeline
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionTestResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

struct RunningPipeline {
    handle: PipelineHandle,
    task: JoinHandle<()>,
}

pub struct PipelineManager {
    pipelines: RwLock<HashMap<String, RunningPipeline>>,
    /// Serializes start/stop per camera id
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    store: Arc<dyn MetadataStore>,
    alert: Option<Arc<dyn AlertSink>>,
    writer_factory: Arc<dyn VideoWriterFactory>,
    settings: GlobalSettings,
}

impl PipelineManager {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        alert: Option<Arc<dyn AlertSink>>,
        writer_factory: Arc<dyn VideoWriterFactory>,
        settings: GlobalSettings,
    ) -> Self {
        Self {
            pipelines: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            store,
            alert,
            writer_factory,
            settings,
        }
    }

    async fn camera_lock(&self, camera_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(camera_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Start a pipeline for the camera, replacing any existing one.
    /// Connection failures surface synchronously and leave the camera in
    /// the error state.
    pub async fn start(&self, camera: CameraConfig) -> Result<()> {
        let lock = self.camera_lock(&camera.id).await;
        let _guard = lock.lock().await;

        self.stop_locked(&camera.id).await;

        let camera_id = camera.id.clone();
        let profile = self.settings.active_profile();
        let source_factory = source::factory_for(&camera);

        let (mut pipeline, handle) = CameraPipeline::new(
            camera,
            profile,
            source_factory,
            self.writer_factory.clone(),
            self.store.clone(),
            self.alert.clone(),
        );

        if let Err(e) = pipeline.connect().await {
            warn!(camera_id = %camera_id, error = %e, "Pipeline start failed");
            self.mirror_status(&camera_id, PipelineStatus::Error).await;
            return Err(Error::Connect(format!(
                "camera {} connection failed: {}",
                camera_id, e
            )));
        }

        handle.set_status(PipelineStatus::Active).await;
        self.mirror_status(&camera_id, PipelineStatus::Active).await;

        let task = tokio::spawn(pipeline.run());
        self.pipelines
            .write()
            .await
            .insert(camera_id.clone(), RunningPipeline { handle, task });

        info!(camera_id = %camera_id, "Pipeline started");
        Ok(())
    }

    /// Stop the camera's pipeline. Stopping an already-stopped camera is a
    /// no-op.
    pub async fn stop(&self, camera_id: &str) {
        let lock = self.camera_lock(camera_id).await;
        let _guard = lock.lock().await;
        self.stop_locked(camera_id).await;
    }

    async fn stop_locked(&self, camera_id: &str) {
        let running = self.pipelines.write().await.remove(camera_id);
        let Some(mut running) = running else {
            return;
        };

        running.handle.request_stop().await;
        if tokio::time::timeout(STOP_TIMEOUT, &mut running.task)
            .await
            .is_err()
        {
            warn!(camera_id = %camera_id, "Pipeline did not stop in time, aborting task");
            running.task.abort();
        }

        // An errored pipeline keeps its error status for operators
        if running.handle.status().await == PipelineStatus::Active {
            running.handle.set_status(PipelineStatus::Inactive).await;
            self.mirror_status(camera_id, PipelineStatus::Inactive)
                .await;
        }
        info!(camera_id = %camera_id, "Pipeline stopped");
    }

    /// Stop every running pipeline (shutdown path)
    pub async fn stop_all(&self) {
        let ids: Vec<String> = self.pipelines.read().await.keys().cloned().collect();
        for camera_id in ids {
            self.stop(&camera_id).await;
        }
    }

    /// Current status of a camera's pipeline; unknown cameras are inactive
    pub async fn status(&self, camera_id: &str) -> PipelineStatus {
        match self.pipelines.read().await.get(camera_id) {
            Some(running) => running.handle.status().await,
            None => PipelineStatus::Inactive,
        }
    }

    /// Latest frame of a running camera as base64 JPEG
    pub async fn get_current_frame(&self, camera_id: &str) -> Option<String> {
        let pipelines = self.pipelines.read().await;
        let running = pipelines.get(camera_id)?;
        match running.handle.current_frame_jpeg().await {
            Ok(frame) => frame,
            Err(e) => {
                warn!(camera_id = %camera_id, error = %e, "Live frame encode failed");
                None
            }
        }
    }

    async fn mirror_status(&self, camera_id: &str, status: PipelineStatus) {
        if let Err(e) = self.store.set_camera_status(camera_id, status).await {
            warn!(
                camera_id = %camera_id,
                error = %e,
                "Could not mirror status to store"
            );
        }
    }

    /// Probe a camera URL without starting a pipeline
    pub async fn test_connection(&self, camera: &CameraConfig) -> ConnectionTestResult {
        let url = source::build_stream_url(camera);
        match probe_stream(&url).await {
            Ok(probe) => ConnectionTestResult {
                success: true,
                message: "Connection successful".to_string(),
                details: Some(serde_json::json!({
                    "width": probe.width,
                    "height": probe.height,
                    "codec": probe.codec,
                })),
            },
            Err(e) => ConnectionTestResult {
                success: false,
                message: format!("Connection failed: {}", e),
                details: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::writer::doubles::MemoryWriterFactory;
    use crate::store::MemoryMetadataStore;

    fn manager() -> PipelineManager {
        PipelineManager::new(
            Arc::new(MemoryMetadataStore::new()),
            None,
            Arc::new(MemoryWriterFactory::new(false)),
            GlobalSettings::default(),
        )
    }

    #[tokio::test]
    async fn stop_of_unknown_camera_is_noop() {
        let manager = manager();
        manager.stop("never-started").await;
        manager.stop("never-started").await;
        assert_eq!(
            manager.status("never-started").await,
            PipelineStatus::Inactive
        );
    }

    #[tokio::test]
    async fn current_frame_absent_without_pipeline() {
        let manager = manager();
        assert!(manager.get_current_frame("nope").await.is_none());
    }

    #[tokio::test]
    async fn stop_all_with_no_pipelines_is_noop() {
        let manager = manager();
        manager.stop_all().await;
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&PipelineStatus::Active).unwrap(),
            "\"active\""
        );
        assert_eq!(PipelineStatus::Error.as_str(), "error");
    }
}
