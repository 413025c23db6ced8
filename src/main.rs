//! camwatch - multi-camera network video recorder
//!
//! Main entry point: wires the store, alert sink and pipeline manager,
//! starts a pipeline per configured camera, and stops them all on Ctrl-C.

use camwatch::{
    alert::{AlertSink, TelegramAlertSink},
    config::CameraConfig,
    pipeline_manager::PipelineManager,
    recording::FfmpegWriterFactory,
    state::AppConfig,
    store::{MemoryMetadataStore, MetadataStore, MySqlMetadataStore},
};
use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "camwatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting camwatch v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::default();
    tracing::info!(
        cameras_file = %config.cameras_file.display(),
        storage_dir = %config.storage_dir.display(),
        database = config.database_url.is_some(),
        "Configuration loaded"
    );

    let store: Arc<dyn MetadataStore> = match &config.database_url {
        Some(url) => {
            let pool = MySqlPoolOptions::new()
                .max_connections(10)
                .acquire_timeout(Duration::from_secs(10))
                .connect(url)
                .await?;
            tracing::info!("Database connected");
            Arc::new(MySqlMetadataStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, recording metadata is kept in memory only");
            Arc::new(MemoryMetadataStore::new())
        }
    };

    let settings = store.get_global_settings().await?;
    tracing::info!(
        profile = %settings.active_profile().name,
        "Global settings loaded"
    );

    let alert: Option<Arc<dyn AlertSink>> = match TelegramAlertSink::from_settings(&settings) {
        Some(sink) => {
            tracing::info!("Telegram alerts enabled");
            Some(Arc::new(sink))
        }
        None => {
            tracing::info!("Telegram credentials not configured, alerts disabled");
            None
        }
    };

    let manager = Arc::new(PipelineManager::new(
        store,
        alert,
        Arc::new(FfmpegWriterFactory),
        settings,
    ));

    let cameras = load_cameras(&config).await?;
    tracing::info!(count = cameras.len(), "Cameras loaded");

    for camera in cameras {
        let camera_id = camera.id.clone();
        if let Err(e) = manager.start(camera).await {
            tracing::error!(camera_id = %camera_id, error = %e, "Camera failed to start");
        }
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested, stopping pipelines");
    manager.stop_all().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Load camera definitions from the configured JSON file; cameras without
/// a storage path inherit the process-wide recordings directory
async fn load_cameras(config: &AppConfig) -> anyhow::Result<Vec<CameraConfig>> {
    let raw = tokio::fs::read_to_string(&config.cameras_file).await?;
    let mut cameras: Vec<CameraConfig> = serde_json::from_str(&raw)?;
    for camera in &mut cameras {
        if camera.recording.storage_path.is_empty() {
            camera.recording.storage_path = config.storage_dir.to_string_lossy().into_owned();
        }
    }
    Ok(cameras)
}
