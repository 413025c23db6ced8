//! Configuration types
//!
//! ## Responsibilities
//!
//! - Per-camera configuration snapshot (immutable for a pipeline run)
//! - Performance profiles (resolution / frame rate / quality / detection cadence)
//! - Global settings loaded once at pipeline start

mod types;

pub use types::{
    AlertConfig, BackgroundModelConfig, CameraConfig, GlobalSettings, MotionConfig,
    PerformanceProfile, RecordingConfig,
};
