//! Realtime media engine capability and its process-wide adapter.
//!
//! The engine owns the camera and the network socket, so it is created once
//! per process. [`MediaEngine`] is the native surface; [`MediaEngineAdapter`]
//! adds idempotent initialization, callback forwarding and camera state.

mod adapter;
pub mod registry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::errors::EngineError;
use super::signals::EngineEvent;
use super::types::{PublisherBinding, RecorderContainer, StreamKind};
pub use adapter::MediaEngineAdapter;
pub use registry::MediaEngineHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelProfile {
    #[default]
    LiveBroadcasting,
    Communication,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub app_id: String,
    pub log_path: PathBuf,
    pub profile: ChannelProfile,
}

/// What a publisher sends into the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOptions {
    pub publish_camera: bool,
    pub publish_microphone: bool,
    pub use_secondary_camera: bool,
}

impl JoinOptions {
    pub fn primary(video: bool) -> Self {
        Self {
            publish_camera: video,
            publish_microphone: true,
            use_secondary_camera: false,
        }
    }

    /// The secondary publisher never sends audio, the primary already does.
    pub fn secondary() -> Self {
        Self {
            publish_camera: true,
            publish_microphone: false,
            use_secondary_camera: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordingRequest {
    pub path: PathBuf,
    pub container: RecorderContainer,
    pub stream_kind: StreamKind,
    pub max_duration: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderStatus {
    Started,
    Stopped,
    Error,
}

/// Receives engine-level callbacks (join confirmations, departures).
pub trait EngineListener: Send + Sync {
    fn on_event(&self, event: EngineEvent);
}

/// Receives a recorder's state-changed callbacks.
pub trait RecorderObserver: Send + Sync {
    fn on_state_changed(&self, binding: &PublisherBinding, status: RecorderStatus, reason: Option<String>);
}

/// Native media engine surface. Join and leave are fire-and-forget; their
/// outcome arrives later through the [`EngineListener`].
pub trait MediaEngine: Send + Sync {
    fn initialize(&self, config: &EngineConfig, listener: Arc<dyn EngineListener>) -> Result<(), EngineError>;
    fn enable_video(&self) -> Result<(), EngineError>;
    fn start_preview(&self) -> Result<(), EngineError>;
    fn start_secondary_capture(&self) -> Result<(), EngineError>;
    fn stop_secondary_capture(&self) -> Result<(), EngineError>;
    fn join_channel(&self, token: &str, binding: &PublisherBinding, options: JoinOptions) -> Result<(), EngineError>;
    fn leave_channel(&self, binding: &PublisherBinding) -> Result<(), EngineError>;
    fn create_recorder(
        &self,
        binding: &PublisherBinding,
        observer: Arc<dyn RecorderObserver>,
    ) -> Result<Box<dyn MediaRecorder>, EngineError>;
    fn set_torch(&self, on: bool) -> Result<(), EngineError>;
    fn set_zoom(&self, factor: f32) -> Result<(), EngineError>;
    fn switch_camera(&self) -> Result<(), EngineError>;
}

#[async_trait]
pub trait MediaRecorder: Send + Sync {
    async fn start_recording(&self, request: &RecordingRequest) -> Result<(), EngineError>;
    async fn stop_recording(&self) -> Result<(), EngineError>;
}
