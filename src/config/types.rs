//! Configuration data types
//!
//! A camera's configuration is captured as an immutable snapshot when its
//! pipeline starts; changing configuration requires a pipeline restart.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Background model tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundModelConfig {
    /// Number of frames the background history covers
    #[serde(default = "default_history")]
    pub history: u32,
    /// Squared-distance threshold for foreground classification
    #[serde(default = "default_var_threshold")]
    pub var_threshold: f32,
    /// Label shadow pixels instead of treating them as full foreground
    #[serde(default = "default_true")]
    pub detect_shadows: bool,
    /// Background learning rate; -1 means auto (substituted with a fixed
    /// fast constant to bound CPU cost)
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
}

impl Default for BackgroundModelConfig {
    fn default() -> Self {
        Self {
            history: default_history(),
            var_threshold: default_var_threshold(),
            detect_shadows: true,
            learning_rate: default_learning_rate(),
        }
    }
}

fn default_history() -> u32 {
    500
}

fn default_var_threshold() -> f32 {
    16.0
}

fn default_learning_rate() -> f32 {
    -1.0
}

fn default_true() -> bool {
    true
}

/// Motion detection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Enable motion detection for this camera
    #[serde(default)]
    pub enabled: bool,
    /// Background model tuning
    #[serde(default)]
    pub model: BackgroundModelConfig,
    /// Minimum foreground area (pixels) to count as motion
    #[serde(default = "default_min_area")]
    pub min_area: u32,
    /// Motion episodes shorter than this are discarded
    #[serde(default = "default_min_duration")]
    pub min_duration_seconds: u32,
    /// Seconds of footage kept before a motion event (pre-roll)
    #[serde(default = "default_pre_record")]
    pub pre_record_seconds: u32,
    /// Seconds recording continues after motion stops (post-roll)
    #[serde(default = "default_post_record")]
    pub post_record_seconds: u32,
    /// Polygons excluded from motion consideration; entries with fewer
    /// than 3 points are ignored
    #[serde(default)]
    pub exclusion_zones: Vec<Vec<[i32; 2]>>,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: BackgroundModelConfig::default(),
            min_area: default_min_area(),
            min_duration_seconds: default_min_duration(),
            pre_record_seconds: default_pre_record(),
            post_record_seconds: default_post_record(),
            exclusion_zones: Vec::new(),
        }
    }
}

fn default_min_area() -> u32 {
    500
}

fn default_min_duration() -> u32 {
    1
}

fn default_pre_record() -> u32 {
    5
}

fn default_post_record() -> u32 {
    10
}

/// Recording settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Record at all times regardless of motion state
    #[serde(default)]
    pub continuous: bool,
    /// Record when motion is detected
    #[serde(default = "default_true")]
    pub on_motion: bool,
    /// Directory recordings are written into
    #[serde(default = "default_storage_path")]
    pub storage_path: String,
    /// Continuous sessions longer than this are rotated into a new file
    #[serde(default = "default_max_file_duration")]
    pub max_file_duration_minutes: u32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            continuous: false,
            on_motion: true,
            storage_path: default_storage_path(),
            max_file_duration_minutes: default_max_file_duration(),
        }
    }
}

fn default_storage_path() -> String {
    "/var/lib/camwatch/recordings".to_string()
}

fn default_max_file_duration() -> u32 {
    60
}

/// Alert settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Dispatch a notification when motion starts
    #[serde(default)]
    pub send_alerts: bool,
    /// Deliver the finalized clip after a motion recording ends
    #[serde(default)]
    pub send_clips: bool,
}

/// Camera configuration (immutable snapshot per pipeline run)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub id: String,
    pub name: String,
    /// Stream URL (rtsp://, http:// MJPEG, or anything ffmpeg can open)
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
}

#[cfg(test)]
impl CameraConfig {
    /// Minimal camera fixture for unit tests
    pub fn example(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            url: "rtsp://camera.local/stream".to_string(),
            username: None,
            password: None,
            motion: MotionConfig::default(),
            recording: RecordingConfig::default(),
            alerts: AlertConfig::default(),
        }
    }
}

/// Performance profile selected once at pipeline start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceProfile {
    pub name: String,
    pub description: String,
    /// Frames wider than this are downscaled (aspect preserved)
    pub max_resolution_width: u32,
    /// Target acquisition/encode frame rate
    pub target_fps: u32,
    /// JPEG quality for live-view frames (1-100)
    pub jpeg_quality: u8,
    /// Run the motion detector only on every Nth frame
    pub motion_check_interval_frames: u32,
}

/// Global settings, read once per pipeline start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalSettings {
    #[serde(default = "default_profile_name")]
    pub performance_profile: String,
    #[serde(default = "GlobalSettings::default_profiles")]
    pub profiles: HashMap<String, PerformanceProfile>,
    #[serde(default)]
    pub telegram_bot_token: Option<String>,
    #[serde(default)]
    pub telegram_chat_id: Option<String>,
    #[serde(default = "default_storage_path")]
    pub default_storage_path: String,
}

fn default_profile_name() -> String {
    "medium".to_string()
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            performance_profile: default_profile_name(),
            profiles: Self::default_profiles(),
            telegram_bot_token: None,
            telegram_chat_id: None,
            default_storage_path: default_storage_path(),
        }
    }
}

impl GlobalSettings {
    /// Built-in low / medium / high profile set
    pub fn default_profiles() -> HashMap<String, PerformanceProfile> {
        let mut profiles = HashMap::new();
        profiles.insert(
            "low".to_string(),
            PerformanceProfile {
                name: "low".to_string(),
                description: "Minimal CPU load".to_string(),
                max_resolution_width: 640,
                target_fps: 10,
                jpeg_quality: 50,
                motion_check_interval_frames: 3,
            },
        );
        profiles.insert(
            "medium".to_string(),
            PerformanceProfile {
                name: "medium".to_string(),
                description: "Balanced performance".to_string(),
                max_resolution_width: 1280,
                target_fps: 15,
                jpeg_quality: 70,
                motion_check_interval_frames: 2,
            },
        );
        profiles.insert(
            "high".to_string(),
            PerformanceProfile {
                name: "high".to_string(),
                description: "Maximum quality".to_string(),
                max_resolution_width: 1920,
                target_fps: 25,
                jpeg_quality: 85,
                motion_check_interval_frames: 1,
            },
        );
        profiles
    }

    /// Resolve the active profile, falling back to `medium`
    pub fn active_profile(&self) -> PerformanceProfile {
        self.profiles
            .get(&self.performance_profile)
            .or_else(|| self.profiles.get("medium"))
            .cloned()
            .unwrap_or_else(|| {
                Self::default_profiles()
                    .remove("medium")
                    .expect("built-in medium profile exists")
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profiles_present() {
        let settings = GlobalSettings::default();
        assert!(settings.profiles.contains_key("low"));
        assert!(settings.profiles.contains_key("medium"));
        assert!(settings.profiles.contains_key("high"));
        assert_eq!(settings.active_profile().name, "medium");
    }

    #[test]
    fn active_profile_falls_back_to_medium() {
        let settings = GlobalSettings {
            performance_profile: "turbo".to_string(),
            ..GlobalSettings::default()
        };
        assert_eq!(settings.active_profile().name, "medium");
    }

    #[test]
    fn camera_config_deserializes_with_defaults() {
        let camera: CameraConfig = serde_json::from_str(
            r#"{"id":"cam-1","name":"Front door","url":"rtsp://example/stream"}"#,
        )
        .unwrap();
        assert!(!camera.motion.enabled);
        assert!(camera.recording.on_motion);
        assert_eq!(camera.motion.min_area, 500);
        assert_eq!(camera.motion.model.learning_rate, -1.0);
    }
}
