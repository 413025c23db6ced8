//! Application configuration
//!
//! Process-level settings loaded from the environment (with .env support).
//! Camera definitions live in the cameras file; tuning lives in the
//! metadata store's global settings.

use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Database URL; when unset the process runs with the in-memory store
    pub database_url: Option<String>,
    /// JSON file holding the camera list
    pub cameras_file: PathBuf,
    /// Fallback recordings directory for cameras without a storage path
    pub storage_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL").ok(),
            cameras_file: std::env::var("CAMERAS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/etc/camwatch/cameras.json")),
            storage_dir: std::env::var("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/var/lib/camwatch/recordings")),
        }
    }
}
