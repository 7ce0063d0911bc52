pub mod broadcast;
pub mod core;
pub mod shared;

use std::sync::Arc;

use thiserror::Error;

use crate::broadcast::backend::HttpBackend;
use crate::broadcast::engine::{registry, ChannelProfile, EngineConfig, MediaEngine};
use crate::broadcast::errors::BackendError;
use crate::broadcast::location::LocationSource;
use crate::broadcast::persistence::FsMediaStore;
use crate::broadcast::session::{ControllerDeps, SessionController, SessionHandle};
use crate::core::logging::{init_logging, LoggingGuards};
use crate::core::settings::{load_settings, BroadcastSettings};
use crate::shared::paths::{get_log_dir, get_recordings_dir};

#[derive(Error, Debug)]
pub enum InitError {
    #[error("Failed to initialize logging: {0}")]
    Logging(#[from] std::io::Error),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Running broadcast core. Keep it alive for the lifetime of the host app.
pub struct BroadcastCore {
    pub sessions: SessionHandle,
    pub settings: BroadcastSettings,
    _logging: LoggingGuards,
}

/// Wires logging, settings, the HTTP backend and the media engine into a
/// running session controller. Must be called inside a tokio runtime.
pub fn init(
    engine: Arc<dyn MediaEngine>,
    location: Arc<dyn LocationSource>,
) -> Result<BroadcastCore, InitError> {
    let logging = init_logging()?;
    let settings = load_settings();

    tracing::info!(
        target: "system",
        "SafeCast core v{} starting (channel={}, delivery={:?})",
        env!("CARGO_PKG_VERSION"),
        settings.channel_id,
        settings.cloud_delivery
    );

    let backend = Arc::new(HttpBackend::from_settings(&settings)?);
    let config = EngineConfig {
        app_id: settings.app_id.clone(),
        log_path: get_log_dir().join("engine.log"),
        profile: ChannelProfile::LiveBroadcasting,
    };
    let engine = registry::install(engine, config, settings.max_zoom);

    let sessions = SessionController::spawn(ControllerDeps {
        settings: settings.clone(),
        engine,
        backend,
        media_store: Arc::new(FsMediaStore::open_default()),
        location,
        recordings_dir: get_recordings_dir(),
    });

    Ok(BroadcastCore {
        sessions,
        settings,
        _logging: logging,
    })
}

/// Releases the media engine. Call once when the host app exits.
pub fn shutdown() {
    tracing::info!(target: "system", "SafeCast core shutting down");
    registry::shutdown();
}
