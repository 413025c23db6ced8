//! camwatch - multi-camera network video recorder core
//!
//! ## Architecture (9 Components)
//!
//! 1. FrameSource - Stream acquisition (ffmpeg subprocess, HTTP MJPEG)
//! 2. Frame - Decoded BGR frames, resizing, JPEG encoding
//! 3. MotionDetector - Background subtraction with zones and area gating
//! 4. MotionStateMachine - Debounce, post-roll, recording decisions
//! 5. FrameRingBuffer - Pre-roll retention
//! 6. RecordingSession - Output files and their metadata lifecycle
//! 7. PipelineManager - Start/stop/status per camera
//! 8. MetadataStore - MySQL or in-memory persistence
//! 9. AlertSink - Telegram notifications and clip delivery
//!
//! Each camera runs one pipeline task; the manager owns their handles.

pub mod alert;
pub mod config;
pub mod error;
pub mod frame;
pub mod motion;
pub mod pipeline;
pub mod pipeline_manager;
pub mod recording;
pub mod ring_buffer;
pub mod source;
pub mod state;
pub mod store;

pub use error::{Error, Result};
