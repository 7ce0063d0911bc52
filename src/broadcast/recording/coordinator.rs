//! RecordingCoordinator - owns the local recorders and the cloud recording resource.
//!
//! A session has at most two local recorders (primary and secondary camera)
//! and at most one cloud resource. They start and stop together. Runtime
//! recorder failures go through a shared [`SessionWatch`] so the registered
//! forced-stop callback fires once per session. Each session gets a new
//! generation number, and failures carry it so stale ones can be dropped.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::super::backend::wire::{StartRecordingRequest, StopRecordingRequest};
use super::super::backend::BroadcastBackend;
use super::super::engine::{MediaEngineHandle, MediaRecorder, RecorderObserver, RecordingRequest};
use super::super::errors::{BackendError, CloudRecordingError, RecorderError};
use super::super::types::{
    CloudResource, IncidentId, MediaLinks, PublisherBinding, PublisherRole, RecorderContainer,
    RecordingPaths, RecordingType, RtcToken, StreamKind, StreamMode,
};
use super::naming::{next_file_tag, recording_path};
use super::watch::{ForcedStopCallback, SessionWatch};
use crate::shared::paths::ensure_dir;

/// Native recorders run this much longer than the session limit, so the
/// controller's own time limit always ends the session first.
const RECORDER_LIMIT_GRACE: Duration = Duration::from_secs(60);

/// A native recorder bound to one (channel, uid) pair.
struct RecorderHandle {
    binding: PublisherBinding,
    path: PathBuf,
    recorder: Box<dyn MediaRecorder>,
    running: bool,
}

impl RecorderHandle {
    async fn stop(&mut self) -> Result<(), RecorderError> {
        if !self.running {
            return Ok(());
        }
        match self.recorder.stop_recording().await {
            Ok(()) => {
                self.running = false;
                Ok(())
            }
            Err(e) => {
                // native side is considered stopped either way
                self.running = false;
                Err(RecorderError::Stop {
                    binding: self.binding.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

/// Per-session naming context set by [`RecordingCoordinator::begin_session`].
struct SessionContext {
    incident: IncidentId,
    tag: String,
    watch: Arc<SessionWatch>,
}

pub struct RecordingCoordinator {
    engine: MediaEngineHandle,
    backend: Arc<dyn BroadcastBackend>,
    recordings_dir: PathBuf,
    recorder_uid: u32,
    max_duration: Option<Duration>,
    cloud_timeout: Duration,
    forced_stop: Option<ForcedStopCallback>,
    generation: u64,
    session: Option<SessionContext>,
    recorders: Vec<RecorderHandle>,
}

impl RecordingCoordinator {
    pub fn new(
        engine: MediaEngineHandle,
        backend: Arc<dyn BroadcastBackend>,
        recordings_dir: PathBuf,
        recorder_uid: u32,
        session_limit: Option<Duration>,
        cloud_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            backend,
            recordings_dir,
            recorder_uid,
            max_duration: session_limit.map(|limit| limit + RECORDER_LIMIT_GRACE),
            cloud_timeout,
            forced_stop: None,
            generation: 0,
            session: None,
            recorders: Vec::new(),
        }
    }

    /// Registers the callback invoked on the first runtime recorder failure of a session.
    pub fn on_forced_stop(&mut self, callback: ForcedStopCallback) {
        self.forced_stop = Some(callback);
    }

    /// Arms a fresh failure latch and file tag for a new session.
    pub fn begin_session(&mut self, incident: &IncidentId) {
        self.end_session();
        self.generation += 1;
        self.session = Some(SessionContext {
            incident: incident.clone(),
            tag: next_file_tag(),
            watch: Arc::new(SessionWatch::new(self.generation, self.forced_stop.clone())),
        });
    }

    /// Closes the session's watch; callbacks from its recorders are ignored from now on.
    pub fn end_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.watch.close();
        }
        self.recorders.clear();
    }

    /// Generation of the session in progress, if any.
    pub fn active_generation(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.watch.generation())
    }

    pub fn paths(&self) -> RecordingPaths {
        let mut paths = RecordingPaths::default();
        for handle in &self.recorders {
            match handle.binding.role {
                PublisherRole::Primary => paths.primary = Some(handle.path.clone()),
                PublisherRole::Secondary => paths.secondary = Some(handle.path.clone()),
            }
        }
        paths
    }

    async fn open_recorder(
        &self,
        binding: &PublisherBinding,
        mode: StreamMode,
    ) -> Result<RecorderHandle, RecorderError> {
        let session = self.session.as_ref().ok_or_else(|| RecorderError::Start {
            binding: binding.to_string(),
            reason: "no session in progress".to_string(),
        })?;

        ensure_dir(&self.recordings_dir).map_err(|e| RecorderError::Start {
            binding: binding.to_string(),
            reason: format!("recordings dir unavailable: {}", e),
        })?;

        let path = recording_path(&self.recordings_dir, &session.tag, &session.incident, mode, binding.role);
        let observer: Arc<dyn RecorderObserver> = session.watch.clone();
        let recorder = self.engine.create_recorder(binding, observer)?;

        let request = RecordingRequest {
            path: path.clone(),
            container: RecorderContainer::Mp4,
            stream_kind: StreamKind::for_binding(mode, binding.role),
            max_duration: self.max_duration,
        };

        recorder
            .start_recording(&request)
            .await
            .map_err(|e| RecorderError::Start {
                binding: binding.to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(target: "broadcast", "[RECORDING] Recorder {} writing {:?} ({:?})", binding, path, request.stream_kind);

        Ok(RecorderHandle {
            binding: binding.clone(),
            path,
            recorder,
            running: true,
        })
    }

    /// Starts one local recorder and returns its file path.
    pub async fn start_local(
        &mut self,
        binding: &PublisherBinding,
        mode: StreamMode,
    ) -> Result<PathBuf, RecorderError> {
        let handle = self.open_recorder(binding, mode).await?;
        let path = handle.path.clone();
        self.recorders.push(handle);
        Ok(path)
    }

    /// Starts the primary recorder and, when given, the secondary one concurrently.
    ///
    /// Either both succeed or neither is left running: a recorder that
    /// started while its sibling failed is stopped before returning the error.
    pub async fn start_local_pair(
        &mut self,
        primary: &PublisherBinding,
        secondary: Option<&PublisherBinding>,
        mode: StreamMode,
    ) -> Result<RecordingPaths, RecorderError> {
        let secondary_start = async {
            match secondary {
                Some(binding) => Some(self.open_recorder(binding, mode).await),
                None => None,
            }
        };
        let (primary_result, secondary_result) =
            tokio::join!(self.open_recorder(primary, mode), secondary_start);

        let mut started = Vec::new();
        let mut first_error = None;
        for result in std::iter::once(primary_result).chain(secondary_result) {
            match result {
                Ok(handle) => started.push(handle),
                Err(e) => {
                    tracing::error!(target: "broadcast", "[RECORDING] {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(error) = first_error {
            for mut handle in started {
                if let Some(session) = &self.session {
                    session.watch.expect_stop(&handle.binding);
                }
                tracing::info!(target: "broadcast", "[RECORDING] Rolling back recorder {}", handle.binding);
                if let Err(e) = handle.stop().await {
                    tracing::warn!(target: "broadcast", "[RECORDING] Rollback stop failed: {}", e);
                }
            }
            return Err(error);
        }

        self.recorders.extend(started);
        Ok(self.paths())
    }

    /// Stops the recorder bound to `binding`.
    pub async fn stop_local(&mut self, binding: &PublisherBinding) -> Result<(), RecorderError> {
        if let Some(session) = &self.session {
            session.watch.expect_stop(binding);
        }
        let handle = self
            .recorders
            .iter_mut()
            .find(|h| &h.binding == binding)
            .ok_or_else(|| RecorderError::NotRunning(binding.to_string()))?;
        handle.stop().await
    }

    /// Stops every running recorder, collecting failures instead of stopping early.
    pub async fn stop_all_local(&mut self) -> Vec<RecorderError> {
        let mut errors = Vec::new();
        for handle in self.recorders.iter_mut().filter(|h| h.running) {
            if let Some(session) = &self.session {
                session.watch.expect_stop(&handle.binding);
            }
            tracing::info!(target: "broadcast", "[RECORDING] Stopping recorder {}", handle.binding);
            if let Err(e) = handle.stop().await {
                tracing::warn!(target: "broadcast", "[RECORDING] {}", e);
                errors.push(e);
            }
        }
        errors
    }

    /// Requests a cloud recording for a backend incident.
    pub async fn start_cloud(
        &self,
        channel: &str,
        token: &RtcToken,
        incident_id: &str,
    ) -> Result<CloudResource, CloudRecordingError> {
        let request = StartRecordingRequest {
            channel_name: channel.to_string(),
            recorder_uid: self.recorder_uid,
            token: token.value.clone(),
            incident_id: incident_id.to_string(),
        };

        let response = tokio::time::timeout(self.cloud_timeout, self.backend.start_recording(&request))
            .await
            .unwrap_or_else(|_| Err(BackendError::Timeout(self.cloud_timeout)))
            .map_err(|source| CloudRecordingError { stage: "start", source })?;

        tracing::info!(target: "broadcast", "[RECORDING] Cloud recording started resource={} sid={}", response.resource_id, response.sid);

        Ok(CloudResource {
            resource_id: response.resource_id,
            sid: response.sid,
        })
    }

    /// Stops the cloud recording and returns any media links the backend attached.
    pub async fn stop_cloud(
        &self,
        channel: &str,
        resource: &CloudResource,
        incident_id: &str,
        recording_type: RecordingType,
    ) -> Result<Option<MediaLinks>, CloudRecordingError> {
        let request = StopRecordingRequest {
            channel_name: channel.to_string(),
            recorder_uid: self.recorder_uid,
            resource_id: resource.resource_id.clone(),
            sid: resource.sid.clone(),
            incident_id: incident_id.to_string(),
            recording_type,
        };

        let response = tokio::time::timeout(self.cloud_timeout, self.backend.stop_recording(&request))
            .await
            .unwrap_or_else(|_| Err(BackendError::Timeout(self.cloud_timeout)))
            .map_err(|source| CloudRecordingError { stage: "stop", source })?;

        tracing::info!(target: "broadcast", "[RECORDING] Cloud recording stopped sid={}", resource.sid);
        Ok(response.incident_updated.filter(|links| !links.is_empty()))
    }
}
