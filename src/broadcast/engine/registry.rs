//! Process-wide home of the media engine.
//!
//! The engine is installed once at startup and lives until shutdown. Code
//! that needs it receives a [`MediaEngineHandle`] explicitly; nothing reaches
//! into the registry from inside the session core.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::{EngineConfig, MediaEngine, MediaEngineAdapter};

pub type MediaEngineHandle = Arc<MediaEngineAdapter>;

static ENGINE: OnceCell<MediaEngineHandle> = OnceCell::new();

/// Installs the engine on first call. Later calls return the existing handle
/// and ignore their arguments, so remounting hosts may call this freely.
pub fn install(engine: Arc<dyn MediaEngine>, config: EngineConfig, max_zoom: f32) -> MediaEngineHandle {
    ENGINE
        .get_or_init(|| {
            tracing::info!(target: "system", "Installing media engine (app_id={})", config.app_id);
            Arc::new(MediaEngineAdapter::new(engine, config, max_zoom))
        })
        .clone()
}

/// Leaves any joined channel and stops secondary capture. Call once at app shutdown.
pub fn shutdown() {
    if let Some(handle) = ENGINE.get() {
        if let Err(e) = handle.leave_all() {
            tracing::warn!(target: "system", "Engine shutdown left channels with error: {}", e);
        }
    }
}
