//! Camera pipeline
//!
//! ## Responsibilities
//!
//! - Per-camera frame loop: acquire, downscale, detect, record
//! - Read retries with backoff and a bounded reconnect budget
//! - Motion sessions with pre-roll, continuous sessions with rotation
//! - Live-view frame publication through a shared handle
//!
//! One pipeline runs per started camera, as a spawned task. The loop
//! ordering is deliberate: the ring buffer is fed only after detection and
//! session writes, so a motion session's pre-roll contains exactly the
//! frames that preceded the trigger, with no duplicates.

use crate::alert::AlertSink;
use crate::config::{CameraConfig, PerformanceProfile};
use crate::error::{Error, Result};
use crate::frame::{Dimensions, Frame};
use crate::motion::{MotionAction, MotionDetector, MotionStateMachine};
use crate::pipeline_manager::PipelineStatus;
use crate::recording::{RecordingSession, VideoWriterFactory};
use crate::ring_buffer::FrameRingBuffer;
use crate::source::{FrameSource, FrameSourceFactory};
use crate::store::{MetadataStore, RecordType};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Attempts per frame read before the read counts as a failure
const READ_ATTEMPTS: u32 = 3;

/// Base delay between read attempts; scaled by the attempt number
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Delay before a reconnection attempt
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Consecutive acquisition failures tolerated before the pipeline enters
/// the error state and stops
const MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// Shared view of a running pipeline, owned by the manager
#[derive(Clone)]
pub struct PipelineHandle {
    camera_id: String,
    jpeg_quality: u8,
    running: Arc<RwLock<bool>>,
    status: Arc<RwLock<PipelineStatus>>,
    last_frame: Arc<RwLock<Option<Frame>>>,
}

impl PipelineHandle {
    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    pub async fn status(&self) -> PipelineStatus {
        *self.status.read().await
    }

    pub async fn set_status(&self, status: PipelineStatus) {
        *self.status.write().await = status;
    }

    /// Ask the loop to stop; it exits within one frame iteration
    pub async fn request_stop(&self) {
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Latest frame as base64 JPEG, or None before the first frame arrives
    pub async fn current_frame_jpeg(&self) -> Result<Option<String>> {
        let guard = self.last_frame.read().await;
        match guard.as_ref() {
            Some(frame) => Ok(Some(frame.to_jpeg_base64(self.jpeg_quality)?)),
            None => Ok(None),
        }
    }
}

pub struct CameraPipeline {
    camera: CameraConfig,
    profile: PerformanceProfile,
    source_factory: Arc<dyn FrameSourceFactory>,
    source: Box<dyn FrameSource>,
    writer_factory: Arc<dyn VideoWriterFactory>,
    store: Arc<dyn MetadataStore>,
    alert: Option<Arc<dyn AlertSink>>,
    detector: MotionDetector,
    machine: MotionStateMachine,
    ring: FrameRingBuffer,
    session: Option<RecordingSession>,
    running: Arc<RwLock<bool>>,
    status: Arc<RwLock<PipelineStatus>>,
    last_frame: Arc<RwLock<Option<Frame>>>,
}

impl CameraPipeline {
    pub fn new(
        camera: CameraConfig,
        profile: PerformanceProfile,
        source_factory: Arc<dyn FrameSourceFactory>,
        writer_factory: Arc<dyn VideoWriterFactory>,
        store: Arc<dyn MetadataStore>,
        alert: Option<Arc<dyn AlertSink>>,
    ) -> (Self, PipelineHandle) {
        let running = Arc::new(RwLock::new(true));
        let status = Arc::new(RwLock::new(PipelineStatus::Inactive));
        let last_frame = Arc::new(RwLock::new(None));

        let handle = PipelineHandle {
            camera_id: camera.id.clone(),
            jpeg_quality: profile.jpeg_quality,
            running: running.clone(),
            status: status.clone(),
            last_frame: last_frame.clone(),
        };

        let detector = MotionDetector::new(camera.motion.clone());
        let machine = MotionStateMachine::new(&camera, &profile);
        let ring = FrameRingBuffer::for_camera(&camera, &profile);
        let source = source_factory.create();

        let pipeline = Self {
            camera,
            profile,
            source_factory,
            source,
            writer_factory,
            store,
            alert,
            detector,
            machine,
            ring,
            session: None,
            running,
            status,
            last_frame,
        };
        (pipeline, handle)
    }

    /// Probe and open the stream; called by the manager before spawning
    /// `run` so start failures surface synchronously
    pub async fn connect(&mut self) -> Result<()> {
        let dims = self.source.connect().await?;
        info!(
            camera_id = %self.camera.id,
            resolution = %dims,
            "Camera stream connected"
        );
        Ok(())
    }

    /// Main frame loop; runs until a stop request or the reconnect budget
    /// is exhausted
    pub async fn run(mut self) {
        let fps = self.profile.target_fps.max(1);
        let frame_interval = Duration::from_millis(1000 / fps as u64);
        let check_interval = self.profile.motion_check_interval_frames.max(1) as u64;
        let mut consecutive_failures: u32 = 0;
        let mut frame_counter: u64 = 0;

        info!(
            camera_id = %self.camera.id,
            profile = %self.profile.name,
            "Pipeline loop started"
        );

        loop {
            if !*self.running.read().await {
                debug!(camera_id = %self.camera.id, "Stop requested");
                break;
            }
            let iteration_start = Instant::now();

            let frame = match self.read_frame_with_retry().await {
                Ok(frame) => {
                    consecutive_failures = 0;
                    frame
                }
                Err(e) => {
                    consecutive_failures += 1;
                    warn!(
                        camera_id = %self.camera.id,
                        failures = consecutive_failures,
                        error = %e,
                        "Frame acquisition failed"
                    );
                    if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                        error!(
                            camera_id = %self.camera.id,
                            "Reconnect budget exhausted, entering error state"
                        );
                        self.enter_error_state().await;
                        break;
                    }
                    self.reconnect().await;
                    continue;
                }
            };

            let frame = frame.resize_to_width(self.profile.max_resolution_width);
            *self.last_frame.write().await = Some(frame.clone());

            frame_counter += 1;
            if self.camera.motion.enabled && frame_counter % check_interval == 0 {
                let motion = self.detector.apply(&frame);
                let actions = self.machine.observe(motion, Utc::now());
                for action in actions {
                    self.handle_action(action, &frame).await;
                }
            }

            if self.camera.recording.continuous {
                self.manage_continuous_session(&frame).await;
            }

            if let Some(session) = self.session.as_mut() {
                if let Err(e) = session.write(&frame).await {
                    error!(
                        camera_id = %self.camera.id,
                        error = %e,
                        "Recording write failed, abandoning session"
                    );
                    if let Some(session) = self.session.take() {
                        session.abandon().await;
                    }
                }
            }

            // Fed last: the pre-roll snapshot must hold only frames that
            // preceded the trigger
            self.ring.push(frame);

            let elapsed = iteration_start.elapsed();
            if elapsed < frame_interval {
                sleep(frame_interval - elapsed).await;
            }
        }

        self.shutdown().await;
    }

    async fn read_frame_with_retry(&mut self) -> Result<Frame> {
        let mut last_error = None;
        for attempt in 1..=READ_ATTEMPTS {
            match self.source.next_frame().await {
                Ok(frame) => return Ok(frame),
                Err(e) => {
                    debug!(
                        camera_id = %self.camera.id,
                        attempt,
                        error = %e,
                        "Frame read attempt failed"
                    );
                    last_error = Some(e);
                    if attempt < READ_ATTEMPTS {
                        sleep(RETRY_BASE_DELAY * attempt).await;
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| Error::Read("frame acquisition failed".to_string())))
    }

    /// Replace the dead source with a fresh one. Failure is not fatal here;
    /// the consecutive-failure counter in the loop bounds the attempts.
    async fn reconnect(&mut self) {
        self.source.close().await;
        sleep(RECONNECT_DELAY).await;

        let mut fresh = self.source_factory.create();
        match fresh.connect().await {
            Ok(dims) => {
                info!(
                    camera_id = %self.camera.id,
                    resolution = %dims,
                    "Camera stream reconnected"
                );
                self.source = fresh;
            }
            Err(e) => {
                warn!(
                    camera_id = %self.camera.id,
                    error = %e,
                    "Reconnection attempt failed"
                );
            }
        }
    }

    async fn handle_action(&mut self, action: MotionAction, frame: &Frame) {
        match action {
            MotionAction::DispatchAlert { at } => {
                if let Some(sink) = self.alert.clone() {
                    let camera_name = self.camera.name.clone();
                    tokio::spawn(async move {
                        if let Err(e) = sink.notify_motion(&camera_name, at).await {
                            warn!(camera = %camera_name, error = %e, "Alert delivery failed");
                        }
                    });
                }
            }
            MotionAction::StartRecording => {
                if self.session.is_some() {
                    return;
                }
                let preroll = self.ring.snapshot();
                match RecordingSession::start(
                    &self.camera,
                    RecordType::Motion,
                    frame.dimensions(),
                    self.profile.target_fps,
                    &preroll,
                    self.writer_factory.as_ref(),
                    &self.store,
                )
                .await
                {
                    Ok(session) => self.session = Some(session),
                    Err(e) => error!(
                        camera_id = %self.camera.id,
                        error = %e,
                        "Could not start motion recording"
                    ),
                }
            }
            MotionAction::FinalizeRecording => {
                let motion_session = self
                    .session
                    .as_ref()
                    .map(|s| s.record_type() == RecordType::Motion)
                    .unwrap_or(false);
                if !motion_session {
                    return;
                }
                if let Some(session) = self.session.take() {
                    self.finalize_session(session).await;
                }
            }
        }
    }

    /// Open or rotate the continuous session
    async fn manage_continuous_session(&mut self, frame: &Frame) {
        let rotate = self
            .session
            .as_ref()
            .map(|s| {
                s.record_type() == RecordType::Continuous
                    && Utc::now() - s.started_at()
                        >= chrono::Duration::minutes(
                            self.camera.recording.max_file_duration_minutes as i64,
                        )
            })
            .unwrap_or(false);
        if rotate {
            if let Some(session) = self.session.take() {
                info!(camera_id = %self.camera.id, "Rotating continuous recording");
                self.finalize_session(session).await;
            }
        }

        if self.session.is_none() {
            match RecordingSession::start(
                &self.camera,
                RecordType::Continuous,
                frame.dimensions(),
                self.profile.target_fps,
                &[],
                self.writer_factory.as_ref(),
                &self.store,
            )
            .await
            {
                Ok(session) => self.session = Some(session),
                Err(e) => error!(
                    camera_id = %self.camera.id,
                    error = %e,
                    "Could not start continuous recording"
                ),
            }
        }
    }

    async fn finalize_session(&mut self, session: RecordingSession) {
        let was_motion = session.record_type() == RecordType::Motion;
        match session.finalize(&self.store).await {
            Ok(record) => {
                if was_motion && self.camera.alerts.send_clips {
                    if let Some(sink) = self.alert.clone() {
                        let camera_name = self.camera.name.clone();
                        let path = std::path::PathBuf::from(record.file_path.clone());
                        tokio::spawn(async move {
                            if let Err(e) = sink.deliver_clip(&camera_name, &path).await {
                                warn!(
                                    camera = %camera_name,
                                    error = %e,
                                    "Clip delivery failed"
                                );
                            }
                        });
                    }
                }
            }
            Err(e) => error!(
                camera_id = %self.camera.id,
                error = %e,
                "Recording finalization failed"
            ),
        }
    }

    async fn enter_error_state(&self) {
        *self.status.write().await = PipelineStatus::Error;
        if let Err(e) = self
            .store
            .set_camera_status(&self.camera.id, PipelineStatus::Error)
            .await
        {
            warn!(
                camera_id = %self.camera.id,
                error = %e,
                "Could not mirror error status to store"
            );
        }
    }

    async fn shutdown(mut self) {
        if let Some(session) = self.session.take() {
            self.finalize_session(session).await;
        }
        self.source.close().await;
        *self.running.write().await = false;
        info!(camera_id = %self.camera.id, "Pipeline stopped");
    }
}
