use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use once_cell::sync::OnceCell;

use super::super::errors::EngineError;
use super::super::signals::{EngineEvent, SessionSignal, SignalSink};
use super::super::types::{CameraDirection, PublisherBinding, RtcToken, StreamMode};
use super::{EngineConfig, EngineListener, JoinOptions, MediaEngine, MediaRecorder, RecorderObserver};

/// Camera controls as last applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub torch_on: bool,
    pub zoom: f32,
    pub direction: CameraDirection,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            torch_on: false,
            zoom: 1.0,
            direction: CameraDirection::Rear,
        }
    }
}

/// Forwards engine callbacks to whichever controller is currently attached.
#[derive(Default)]
struct CallbackForwarder {
    sink: RwLock<Option<SignalSink>>,
}

impl EngineListener for CallbackForwarder {
    fn on_event(&self, event: EngineEvent) {
        match self.sink.read() {
            Ok(guard) => match guard.as_ref() {
                Some(sink) => sink.emit(SessionSignal::Engine(event)),
                None => tracing::debug!(target: "broadcast", "[ENGINE] No listener attached, dropping {:?}", event),
            },
            Err(_) => tracing::error!(target: "broadcast", "[ENGINE] Listener lock poisoned"),
        }
    }
}

pub struct MediaEngineAdapter {
    engine: Arc<dyn MediaEngine>,
    config: EngineConfig,
    initialized: OnceCell<()>,
    forwarder: Arc<CallbackForwarder>,
    joined: Mutex<Vec<PublisherBinding>>,
    secondary_capture: AtomicBool,
    camera: Mutex<CameraState>,
    max_zoom: f32,
}

impl MediaEngineAdapter {
    pub fn new(engine: Arc<dyn MediaEngine>, config: EngineConfig, max_zoom: f32) -> Self {
        Self {
            engine,
            config,
            initialized: OnceCell::new(),
            forwarder: Arc::new(CallbackForwarder::default()),
            joined: Mutex::new(Vec::new()),
            secondary_capture: AtomicBool::new(false),
            camera: Mutex::new(CameraState::default()),
            max_zoom: max_zoom.max(1.0),
        }
    }

    /// Safe to call on every UI remount. A failed attempt can be retried.
    pub fn initialize_once(&self) -> Result<(), EngineError> {
        self.initialized
            .get_or_try_init(|| {
                tracing::info!(target: "broadcast", "[ENGINE] Initializing media engine");
                let listener: Arc<dyn EngineListener> = self.forwarder.clone();
                self.engine.initialize(&self.config, listener)?;
                self.engine.enable_video()?;
                self.engine.start_preview()?;
                Ok::<(), EngineError>(())
            })
            .map(|_| ())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get().is_some()
    }

    /// Routes engine callbacks into the given controller channel.
    pub fn attach(&self, sink: SignalSink) {
        if let Ok(mut guard) = self.forwarder.sink.write() {
            *guard = Some(sink);
        }
    }

    fn ensure_initialized(&self) -> Result<(), EngineError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(EngineError::NotInitialized)
        }
    }

    pub fn join_primary(
        &self,
        token: &RtcToken,
        binding: &PublisherBinding,
        mode: StreamMode,
    ) -> Result<(), EngineError> {
        self.ensure_initialized()?;
        tracing::info!(target: "broadcast", "[ENGINE] Joining as primary {}", binding);
        let options = JoinOptions::primary(matches!(mode, StreamMode::Video));
        self.engine.join_channel(&token.value, binding, options)?;
        self.remember_join(binding);
        Ok(())
    }

    pub fn join_secondary(&self, token: &RtcToken, binding: &PublisherBinding) -> Result<(), EngineError> {
        self.ensure_initialized()?;
        tracing::info!(target: "broadcast", "[ENGINE] Joining as secondary {}", binding);
        self.engine.join_channel(&token.value, binding, JoinOptions::secondary())?;
        self.remember_join(binding);
        Ok(())
    }

    fn remember_join(&self, binding: &PublisherBinding) {
        if let Ok(mut joined) = self.joined.lock() {
            if !joined.contains(binding) {
                joined.push(binding.clone());
            }
        }
    }

    pub fn start_secondary_capture(&self) -> Result<(), EngineError> {
        self.ensure_initialized()?;
        self.engine.start_secondary_capture()?;
        self.secondary_capture.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub fn stop_secondary_capture(&self) -> Result<(), EngineError> {
        if self.secondary_capture.swap(false, Ordering::SeqCst) {
            self.engine.stop_secondary_capture()?;
        }
        Ok(())
    }

    /// Leaves every joined publisher, newest first, and stops secondary capture.
    /// Keeps going after a failure and returns the first error seen.
    pub fn leave_all(&self) -> Result<(), EngineError> {
        let bindings: Vec<PublisherBinding> = self
            .joined
            .lock()
            .map(|mut joined| joined.drain(..).rev().collect())
            .unwrap_or_default();

        let mut first_error = None;
        for binding in &bindings {
            tracing::info!(target: "broadcast", "[ENGINE] Leaving {}", binding);
            if let Err(e) = self.engine.leave_channel(binding) {
                tracing::warn!(target: "broadcast", "[ENGINE] Leave failed for {}: {}", binding, e);
                first_error.get_or_insert(e);
            }
        }

        if let Err(e) = self.stop_secondary_capture() {
            tracing::warn!(target: "broadcast", "[ENGINE] Failed to stop secondary capture: {}", e);
            first_error.get_or_insert(e);
        }

        first_error.map_or(Ok(()), Err)
    }

    pub fn create_recorder(
        &self,
        binding: &PublisherBinding,
        observer: Arc<dyn RecorderObserver>,
    ) -> Result<Box<dyn MediaRecorder>, EngineError> {
        self.ensure_initialized()?;
        self.engine.create_recorder(binding, observer)
    }

    pub fn set_torch(&self, on: bool) -> Result<(), EngineError> {
        self.engine.set_torch(on)?;
        self.update_camera(|camera| camera.torch_on = on);
        Ok(())
    }

    /// Clamps to `[1.0, max_zoom]` and returns the factor applied.
    pub fn set_zoom(&self, factor: f32) -> Result<f32, EngineError> {
        let factor = if factor.is_finite() {
            factor.clamp(1.0, self.max_zoom)
        } else {
            1.0
        };
        self.engine.set_zoom(factor)?;
        self.update_camera(|camera| camera.zoom = factor);
        Ok(factor)
    }

    pub fn switch_camera_direction(&self) -> Result<CameraDirection, EngineError> {
        self.engine.switch_camera()?;
        let mut direction = CameraDirection::default();
        self.update_camera(|camera| {
            camera.direction = camera.direction.flipped();
            direction = camera.direction;
        });
        Ok(direction)
    }

    pub fn camera_state(&self) -> CameraState {
        self.camera.lock().map(|c| *c).unwrap_or_default()
    }

    /// Torch off, zoom reset, default direction, preview re-armed for the next session.
    pub fn reset_camera(&self) -> Result<(), EngineError> {
        let state = self.camera_state();

        if state.torch_on {
            self.set_torch(false)?;
        }
        if state.zoom != 1.0 {
            self.set_zoom(1.0)?;
        }
        if state.direction != CameraDirection::default() {
            self.switch_camera_direction()?;
        }
        if self.is_initialized() {
            self.engine.start_preview()?;
        }
        Ok(())
    }

    fn update_camera(&self, f: impl FnOnce(&mut CameraState)) {
        if let Ok(mut camera) = self.camera.lock() {
            f(&mut camera);
        }
    }
}
