#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use safecast_lib::broadcast::backend::wire::{
    CreateIncidentRequest, CreateIncidentResponse, StartRecordingRequest, StartRecordingResponse,
    StopRecordingRequest, StopRecordingResponse, StreamMessageRequest, StreamMessageResponse,
    TokenRequest, TokenResponse, UpdateIncidentRequest, UpdateIncidentResponse,
};
use safecast_lib::broadcast::backend::BroadcastBackend;
use safecast_lib::broadcast::engine::{
    ChannelProfile, EngineConfig, EngineListener, JoinOptions, MediaEngine, MediaEngineAdapter,
    MediaEngineHandle, MediaRecorder, RecorderObserver, RecorderStatus, RecordingRequest,
};
use safecast_lib::broadcast::errors::{BackendError, EngineError};
use safecast_lib::broadcast::location::LastKnownLocation;
use safecast_lib::broadcast::persistence::FsMediaStore;
use safecast_lib::broadcast::session::{ControllerDeps, SessionController, SessionHandle};
use safecast_lib::broadcast::signals::EngineEvent;
use safecast_lib::broadcast::types::{LocationSnapshot, MediaLinks, PublisherBinding, PublisherRole};
use safecast_lib::core::settings::{BroadcastSettings, CloudDelivery, TrustedContact};

pub type CallLog = Arc<Mutex<Vec<String>>>;

fn record(log: &CallLog, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

/// In-memory backend that records every call.
pub struct FakeBackend {
    pub calls: CallLog,
    pub incident_id: Mutex<Option<String>>,
    pub fail_token: AtomicBool,
    pub fail_recording_start: AtomicBool,
    pub stop_links: Mutex<Option<MediaLinks>>,
    pub updates: Mutex<Vec<(String, UpdateIncidentRequest)>>,
    pub stop_requests: Mutex<Vec<StopRecordingRequest>>,
    /// Never answer cloud stop or incident updates.
    pub hang_teardown: AtomicBool,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            incident_id: Mutex::new(Some("42".to_string())),
            fail_token: AtomicBool::new(false),
            fail_recording_start: AtomicBool::new(false),
            stop_links: Mutex::new(None),
            updates: Mutex::new(Vec::new()),
            stop_requests: Mutex::new(Vec::new()),
            hang_teardown: AtomicBool::new(false),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, endpoint: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == endpoint).count()
    }

    async fn maybe_hang(&self) {
        if self.hang_teardown.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
    }

    fn server_error() -> BackendError {
        BackendError::Status {
            status: 500,
            body: "boom".to_string(),
        }
    }
}

#[async_trait]
impl BroadcastBackend for FakeBackend {
    async fn rtc_token(&self, _request: &TokenRequest) -> Result<TokenResponse, BackendError> {
        record(&self.calls, "POST /rtc-token");
        if self.fail_token.load(Ordering::SeqCst) {
            return Err(Self::server_error());
        }
        Ok(TokenResponse {
            token: "rtc-token".to_string(),
        })
    }

    async fn create_incident(
        &self,
        _request: &CreateIncidentRequest,
    ) -> Result<CreateIncidentResponse, BackendError> {
        record(&self.calls, "POST /incidents");
        match self.incident_id.lock().unwrap().clone() {
            Some(id) => Ok(CreateIncidentResponse { id }),
            None => Err(Self::server_error()),
        }
    }

    async fn update_incident(
        &self,
        incident_id: &str,
        request: &UpdateIncidentRequest,
    ) -> Result<UpdateIncidentResponse, BackendError> {
        record(&self.calls, "PATCH /incidents");
        self.maybe_hang().await;
        self.updates
            .lock()
            .unwrap()
            .push((incident_id.to_string(), request.clone()));
        Ok(UpdateIncidentResponse {
            id: Some(incident_id.to_string()),
        })
    }

    async fn send_stream_message(
        &self,
        _request: &StreamMessageRequest,
    ) -> Result<StreamMessageResponse, BackendError> {
        record(&self.calls, "POST /stream/send-msg");
        Ok(StreamMessageResponse { results: vec![] })
    }

    async fn start_recording(
        &self,
        _request: &StartRecordingRequest,
    ) -> Result<StartRecordingResponse, BackendError> {
        record(&self.calls, "POST /recording/start");
        if self.fail_recording_start.load(Ordering::SeqCst) {
            return Err(Self::server_error());
        }
        Ok(StartRecordingResponse {
            resource_id: "res-1".to_string(),
            sid: "sid-1".to_string(),
        })
    }

    async fn stop_recording(
        &self,
        request: &StopRecordingRequest,
    ) -> Result<StopRecordingResponse, BackendError> {
        record(&self.calls, "POST /recording/stop");
        self.maybe_hang().await;
        self.stop_requests.lock().unwrap().push(request.clone());
        Ok(StopRecordingResponse {
            incident_updated: self.stop_links.lock().unwrap().clone(),
        })
    }
}

/// Media engine double. Joins are confirmed through the listener, right away or
/// after `join_delay`, unless `confirm_joins` is cleared.
pub struct FakeEngine {
    pub calls: CallLog,
    listener: Mutex<Option<Arc<dyn EngineListener>>>,
    observers: Mutex<Vec<(PublisherBinding, Arc<dyn RecorderObserver>)>>,
    pub requests: Arc<Mutex<Vec<RecordingRequest>>>,
    pub confirm_joins: AtomicBool,
    pub join_delay: Mutex<Option<Duration>>,
    pub fail_recorder: Mutex<Option<PublisherRole>>,
    /// Recorders report an error instead of `Stopped` when asked to stop.
    pub error_on_stop: Arc<AtomicBool>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            listener: Mutex::new(None),
            observers: Mutex::new(Vec::new()),
            requests: Arc::new(Mutex::new(Vec::new())),
            confirm_joins: AtomicBool::new(true),
            join_delay: Mutex::new(None),
            fail_recorder: Mutex::new(None),
            error_on_stop: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == entry).count()
    }

    /// Delivers a recorder callback to the observer of the `index`-th recorder ever created.
    pub fn notify_recorder(&self, index: usize, status: RecorderStatus) {
        let observer = self.observers.lock().unwrap().get(index).cloned();
        if let Some((binding, observer)) = observer {
            observer.on_state_changed(&binding, status, Some("encoder died".to_string()));
        }
    }

    /// Delivers a recorder callback to the newest recorder of `role`.
    pub fn notify_latest(&self, role: PublisherRole, status: RecorderStatus) {
        let index = self
            .observers
            .lock()
            .unwrap()
            .iter()
            .rposition(|(binding, _)| binding.role == role);
        if let Some(index) = index {
            self.notify_recorder(index, status);
        }
    }

    /// Raises a runtime recorder error as the native recorder would.
    pub fn break_recorder(&self, role: PublisherRole) {
        self.notify_latest(role, RecorderStatus::Error);
    }
}

impl MediaEngine for FakeEngine {
    fn initialize(&self, _config: &EngineConfig, listener: Arc<dyn EngineListener>) -> Result<(), EngineError> {
        record(&self.calls, "initialize");
        *self.listener.lock().unwrap() = Some(listener);
        Ok(())
    }

    fn enable_video(&self) -> Result<(), EngineError> {
        Ok(())
    }

    fn start_preview(&self) -> Result<(), EngineError> {
        record(&self.calls, "preview");
        Ok(())
    }

    fn start_secondary_capture(&self) -> Result<(), EngineError> {
        record(&self.calls, "secondary-capture:start");
        Ok(())
    }

    fn stop_secondary_capture(&self) -> Result<(), EngineError> {
        record(&self.calls, "secondary-capture:stop");
        Ok(())
    }

    fn join_channel(&self, _token: &str, binding: &PublisherBinding, options: JoinOptions) -> Result<(), EngineError> {
        let mic = if options.publish_microphone { "mic" } else { "muted" };
        record(&self.calls, format!("join:{}:{}", binding.uid, mic));

        if !self.confirm_joins.load(Ordering::SeqCst) {
            return Ok(());
        }
        let Some(listener) = self.listener.lock().unwrap().clone() else {
            return Ok(());
        };
        let event = EngineEvent::JoinSucceeded {
            channel: binding.channel.clone(),
            uid: binding.uid,
        };

        match *self.join_delay.lock().unwrap() {
            Some(delay) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    listener.on_event(event);
                });
            }
            None => listener.on_event(event),
        }
        Ok(())
    }

    fn leave_channel(&self, binding: &PublisherBinding) -> Result<(), EngineError> {
        record(&self.calls, format!("leave:{}", binding.uid));
        Ok(())
    }

    fn create_recorder(
        &self,
        binding: &PublisherBinding,
        observer: Arc<dyn RecorderObserver>,
    ) -> Result<Box<dyn MediaRecorder>, EngineError> {
        self.observers
            .lock()
            .unwrap()
            .push((binding.clone(), observer.clone()));
        let fail = *self.fail_recorder.lock().unwrap() == Some(binding.role);
        Ok(Box::new(FakeRecorder {
            binding: binding.clone(),
            observer,
            calls: self.calls.clone(),
            requests: self.requests.clone(),
            running: Arc::new(AtomicBool::new(false)),
            error_on_stop: self.error_on_stop.clone(),
            fail,
        }))
    }

    fn set_torch(&self, on: bool) -> Result<(), EngineError> {
        record(&self.calls, format!("torch:{}", on));
        Ok(())
    }

    fn set_zoom(&self, factor: f32) -> Result<(), EngineError> {
        record(&self.calls, format!("zoom:{}", factor));
        Ok(())
    }

    fn switch_camera(&self) -> Result<(), EngineError> {
        record(&self.calls, "switch-camera");
        Ok(())
    }
}

/// Writes a placeholder file and, like the native recorder, stops on its own
/// once `max_duration` elapses.
struct FakeRecorder {
    binding: PublisherBinding,
    observer: Arc<dyn RecorderObserver>,
    calls: CallLog,
    requests: Arc<Mutex<Vec<RecordingRequest>>>,
    running: Arc<AtomicBool>,
    error_on_stop: Arc<AtomicBool>,
    fail: bool,
}

#[async_trait]
impl MediaRecorder for FakeRecorder {
    async fn start_recording(&self, request: &RecordingRequest) -> Result<(), EngineError> {
        record(&self.calls, format!("record:start:{}", self.binding.uid));
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(EngineError::RecorderUnavailable("camera busy".to_string()));
        }
        std::fs::write(&request.path, b"fake mp4").map_err(|e| EngineError::RecorderUnavailable(e.to_string()))?;
        self.running.store(true, Ordering::SeqCst);
        self.observer
            .on_state_changed(&self.binding, RecorderStatus::Started, None);

        if let Some(limit) = request.max_duration {
            let running = self.running.clone();
            let observer = self.observer.clone();
            let binding = self.binding.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                if running.swap(false, Ordering::SeqCst) {
                    observer.on_state_changed(&binding, RecorderStatus::Stopped, Some("max duration".to_string()));
                }
            });
        }
        Ok(())
    }

    async fn stop_recording(&self) -> Result<(), EngineError> {
        record(&self.calls, format!("record:stop:{}", self.binding.uid));
        self.running.store(false, Ordering::SeqCst);
        let status = if self.error_on_stop.load(Ordering::SeqCst) {
            RecorderStatus::Error
        } else {
            RecorderStatus::Stopped
        };
        self.observer.on_state_changed(&self.binding, status, None);
        Ok(())
    }
}

pub fn test_settings() -> BroadcastSettings {
    BroadcastSettings {
        trusted_contacts: vec![TrustedContact {
            name: "Sam".to_string(),
            phone: "+15550100".to_string(),
        }],
        cloud_delivery: CloudDelivery::BestEffort,
        ..Default::default()
    }
}

pub struct Harness {
    pub handle: SessionHandle,
    pub backend: Arc<FakeBackend>,
    pub engine: Arc<FakeEngine>,
    pub adapter: MediaEngineHandle,
    pub media_dir: PathBuf,
    pub recordings_dir: PathBuf,
    _dir: tempfile::TempDir,
}

pub fn harness(settings: BroadcastSettings) -> Harness {
    harness_with(settings, FakeBackend::new(), FakeEngine::new())
}

pub fn harness_with(settings: BroadcastSettings, backend: Arc<FakeBackend>, engine: Arc<FakeEngine>) -> Harness {
    let dir = tempfile::TempDir::new().unwrap();
    let media_dir = dir.path().join("media");
    let recordings_dir = dir.path().join("recordings");

    let config = EngineConfig {
        app_id: "test-app".to_string(),
        log_path: dir.path().join("engine.log"),
        profile: ChannelProfile::LiveBroadcasting,
    };
    let adapter: MediaEngineHandle = Arc::new(MediaEngineAdapter::new(engine.clone(), config, settings.max_zoom));

    let handle = SessionController::spawn(ControllerDeps {
        settings,
        engine: adapter.clone(),
        backend: backend.clone(),
        media_store: Arc::new(FsMediaStore::new(media_dir.clone())),
        location: Arc::new(LastKnownLocation::new(Some(LocationSnapshot {
            latitude: 40.4,
            longitude: -3.7,
        }))),
        recordings_dir: recordings_dir.clone(),
    });

    Harness {
        handle,
        backend,
        engine,
        adapter,
        media_dir,
        recordings_dir,
        _dir: dir,
    }
}
