//! SessionController - single owner actor for the broadcast lifecycle.
//!
//! The controller owns the token provider, the incident registrar and the
//! recording coordinator, and drives them through the state machine. Every
//! step of a session runs on this one task, so a session can never be started
//! twice or finalized twice. Commands that arrive while a start is in flight
//! wait in the command channel until it settles.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;
use uuid::Uuid;

use super::super::alerts::RecipientNotifier;
use super::super::backend::wire::TokenRole;
use super::super::backend::BroadcastBackend;
use super::super::engine::MediaEngineHandle;
use super::super::errors::{ControlError, StartError, StopError, ToggleError};
use super::super::incident::IncidentRegistrar;
use super::super::location::LocationSource;
use super::super::persistence::{LocalPersistenceFallback, MediaStore};
use super::super::recording::RecordingCoordinator;
use super::super::signals::{EngineEvent, SessionSignal, SignalSink};
use super::super::token::TokenProvider;
use super::super::types::{
    EndReason, IncidentId, LocationSnapshot, MediaLinks, PublisherBinding, StreamMode,
};
use super::handle::{Command, SessionHandle, ToggleOutcome};
use super::state::{transition, SessionEvent, SessionState, SideEffect};
use super::{FinalizedIncident, Session, SessionNotice, SessionStatus, RECORDER_FAILURE_MESSAGE};
use crate::core::settings::BroadcastSettings;

/// Collaborators injected into the controller.
pub struct ControllerDeps {
    pub settings: BroadcastSettings,
    pub engine: MediaEngineHandle,
    pub backend: Arc<dyn BroadcastBackend>,
    pub media_store: Arc<dyn MediaStore>,
    pub location: Arc<dyn LocationSource>,
    pub recordings_dir: PathBuf,
}

/// Non-fatal results gathered while a session stops.
#[derive(Debug, Default)]
struct StopReport {
    end_reason: Option<EndReason>,
    live_duration: Duration,
    media_links: Option<MediaLinks>,
    migrated: Option<usize>,
    warnings: Vec<String>,
}

impl StopReport {
    fn warn(&mut self, message: String) {
        tracing::warn!(target: "broadcast", "[CONTROLLER] {}", message);
        self.warnings.push(message);
    }
}

pub struct SessionController {
    settings: BroadcastSettings,
    engine: MediaEngineHandle,
    tokens: TokenProvider,
    incidents: IncidentRegistrar,
    recording: RecordingCoordinator,
    notifier: Arc<RecipientNotifier>,
    fallback: Arc<LocalPersistenceFallback>,
    location: Arc<dyn LocationSource>,
    state: SessionState,
    session: Option<Session>,
    live_started: Option<Instant>,
    deadline: Option<Instant>,
    report: StopReport,
    last_finalized: Option<FinalizedIncident>,
    pending_start: Option<oneshot::Sender<Result<Session, StartError>>>,
    pending_stop: Option<oneshot::Sender<Result<FinalizedIncident, StopError>>>,
    deferred: VecDeque<SessionSignal>,
    notices: broadcast::Sender<SessionNotice>,
    command_rx: mpsc::Receiver<Command>,
    signal_rx: mpsc::Receiver<SessionSignal>,
}

impl SessionController {
    pub fn new(deps: ControllerDeps) -> (Self, SessionHandle) {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (signal_tx, signal_rx) = mpsc::channel(64);
        let (notices, _) = broadcast::channel(32);

        let ControllerDeps {
            settings,
            engine,
            backend,
            media_store,
            location,
            recordings_dir,
        } = deps;

        let sink = SignalSink::new(signal_tx);
        engine.attach(sink.clone());

        let mut recording = RecordingCoordinator::new(
            engine.clone(),
            backend.clone(),
            recordings_dir,
            settings.recorder_uid,
            settings.max_session(),
            settings.cloud_timeout(),
        );
        recording.on_forced_stop(Arc::new(move |failure| {
            sink.emit(SessionSignal::RecorderFailed(failure))
        }));

        let controller = Self {
            tokens: TokenProvider::new(backend.clone(), settings.token_timeout()),
            incidents: IncidentRegistrar::new(
                backend.clone(),
                settings.user_id.clone(),
                settings.incident_timeout(),
            ),
            notifier: Arc::new(RecipientNotifier::new(backend)),
            fallback: Arc::new(LocalPersistenceFallback::new(media_store, settings.album.clone())),
            recording,
            engine,
            location,
            settings,
            state: SessionState::Idle,
            session: None,
            live_started: None,
            deadline: None,
            report: StopReport::default(),
            last_finalized: None,
            pending_start: None,
            pending_stop: None,
            deferred: VecDeque::new(),
            notices: notices.clone(),
            command_rx,
            signal_rx,
        };

        (controller, SessionHandle::new(command_tx, notices))
    }

    /// Builds the controller and runs it as a tokio task.
    pub fn spawn(deps: ControllerDeps) -> SessionHandle {
        let (controller, handle) = Self::new(deps);
        tokio::spawn(controller.run());
        handle
    }

    /// Main event loop. Ends when every [`SessionHandle`] is dropped.
    pub async fn run(mut self) {
        tracing::info!(target: "broadcast", "[CONTROLLER] Starting event loop");

        loop {
            let deadline = self.deadline;
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => {
                        tracing::info!(target: "broadcast", "[CONTROLLER] All handles dropped, shutting down");
                        break;
                    }
                },
                Some(signal) = self.signal_rx.recv() => {
                    self.handle_signal(signal).await;
                }
                _ = wait_until(deadline) => {
                    self.deadline = None;
                    tracing::info!(target: "broadcast", "[CONTROLLER] Max session duration reached");
                    self.dispatch(SessionEvent::TimeLimitReached).await;
                }
            }

            while let Some(signal) = self.deferred.pop_front() {
                self.handle_signal(signal).await;
            }
        }

        if self.state.is_live() {
            self.dispatch(SessionEvent::StopRequested).await;
        }
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Start { mode, response_tx } => {
                self.handle_start(mode, response_tx).await;
            }
            Command::Stop {
                session_id,
                response_tx,
            } => {
                self.handle_stop(session_id, response_tx).await;
            }
            Command::Toggle { mode, response_tx } => {
                let outcome = self.handle_toggle(mode).await;
                let _ = response_tx.send(outcome);
            }
            Command::Status { response_tx } => {
                let _ = response_tx.send(self.get_status());
            }
            Command::SetTorch { on, response_tx } => {
                let result = self
                    .require_live()
                    .and_then(|_| self.engine.set_torch(on).map_err(ControlError::from));
                let _ = response_tx.send(result);
            }
            Command::SetZoom { factor, response_tx } => {
                let result = self
                    .require_live()
                    .and_then(|_| self.engine.set_zoom(factor).map_err(ControlError::from));
                let _ = response_tx.send(result);
            }
            Command::SwitchCamera { response_tx } => {
                let result = self
                    .require_live()
                    .and_then(|_| self.engine.switch_camera_direction().map_err(ControlError::from));
                let _ = response_tx.send(result);
            }
            Command::AmendIncident {
                incident_id,
                amendment,
                response_tx,
            } => {
                let result = self.incidents.amend(&incident_id, amendment).await;
                let _ = response_tx.send(result);
            }
        }
    }

    async fn handle_start(
        &mut self,
        mode: StreamMode,
        response_tx: oneshot::Sender<Result<Session, StartError>>,
    ) {
        if !self.state.is_idle() {
            let _ = response_tx.send(Err(StartError::AlreadyStreaming));
            return;
        }

        if !self.settings.has_recipients() {
            tracing::warn!(target: "broadcast", "[CONTROLLER] Start rejected, no trusted contacts");
            let _ = response_tx.send(Err(StartError::NoRecipients));
            return;
        }

        if let Err(e) = self.engine.initialize_once() {
            tracing::error!(target: "broadcast", "[CONTROLLER] Engine initialization failed: {}", e);
            let _ = response_tx.send(Err(StartError::Engine(e)));
            return;
        }

        let session = Session::new(mode, &self.settings);
        tracing::info!(target: "broadcast", "[CONTROLLER] Starting {:?} session {}", mode, session.id);

        self.session = Some(session);
        self.report = StopReport::default();
        self.pending_start = Some(response_tx);

        self.dispatch(SessionEvent::StartRequested).await;
    }

    async fn handle_stop(
        &mut self,
        session_id: Uuid,
        response_tx: oneshot::Sender<Result<FinalizedIncident, StopError>>,
    ) {
        let active = self.session.as_ref().map(|s| s.id);

        if active == Some(session_id) && self.state.is_live() {
            self.pending_stop = Some(response_tx);
            self.dispatch(SessionEvent::StopRequested).await;

            if let Some(tx) = self.pending_stop.take() {
                let _ = tx.send(Err(StopError::NotActive));
            }
            return;
        }

        let result = match &self.last_finalized {
            Some(finalized) if finalized.session_id == session_id => {
                tracing::debug!(target: "broadcast", "[CONTROLLER] Session {} already stopped", session_id);
                Ok(finalized.clone())
            }
            _ => Err(StopError::NotActive),
        };
        let _ = response_tx.send(result);
    }

    async fn handle_toggle(
        &mut self,
        mode: StreamMode,
    ) -> Result<ToggleOutcome, ToggleError> {
        if self.state.is_idle() {
            let (tx, mut rx) = oneshot::channel();
            self.handle_start(mode, tx).await;
            return match rx.try_recv() {
                Ok(result) => Ok(ToggleOutcome::Started(result?)),
                Err(_) => Err(StartError::ControllerGone.into()),
            };
        }

        let Some(session_id) = self.session.as_ref().map(|s| s.id) else {
            return Err(StopError::NotActive.into());
        };
        let (tx, mut rx) = oneshot::channel();
        self.handle_stop(session_id, tx).await;
        match rx.try_recv() {
            Ok(result) => Ok(ToggleOutcome::Stopped(result?)),
            Err(_) => Err(StopError::ControllerGone.into()),
        }
    }

    async fn handle_signal(&mut self, signal: SessionSignal) {
        match signal {
            SessionSignal::RecorderFailed(failure) => {
                if self.recording.active_generation() != Some(failure.generation) {
                    tracing::debug!(
                        target: "broadcast",
                        "[CONTROLLER] Dropping recorder failure of {} from an earlier session",
                        failure.binding
                    );
                    return;
                }
                let reason = format!("{}: {}", failure.binding, failure.reason);
                self.dispatch(SessionEvent::RecorderFailed { reason }).await;
            }
            SessionSignal::Engine(EngineEvent::Left { channel, uid }) => {
                tracing::debug!(target: "broadcast", "[CONTROLLER] Left {}/{}", channel, uid);
            }
            SessionSignal::Engine(event) => {
                tracing::debug!(target: "broadcast", "[CONTROLLER] Ignoring {:?} in {}", event, self.state.name());
            }
        }
    }

    /// Runs an event and every follow-up event its effects produce.
    async fn dispatch(&mut self, event: SessionEvent) {
        let mut queue = VecDeque::from([event]);

        while let Some(event) = queue.pop_front() {
            let (new_state, effects) = transition(self.state.clone(), event);
            self.state = new_state;
            if let Some(session) = self.session.as_mut() {
                session.state = self.state.clone();
            }

            for effect in effects {
                if let Some(next) = self.execute_effect(effect).await {
                    queue.push_back(next);
                }
            }
        }
    }

    async fn execute_effect(&mut self, effect: SideEffect) -> Option<SessionEvent> {
        match effect {
            SideEffect::EmitStateChange { state } => {
                self.emit_state_change(&state);
                None
            }
            SideEffect::AcquireToken => Some(self.acquire_token().await),
            SideEffect::RegisterIncident => Some(self.register_incident().await),
            SideEffect::JoinPrimary => Some(self.join_primary().await),
            SideEffect::StartRecorders => Some(self.start_recorders().await),
            SideEffect::PublishSecondary => Some(self.publish_secondary().await),
            SideEffect::StartCloudRecording => {
                self.start_cloud_recording().await;
                Some(SessionEvent::CloudSettled)
            }
            SideEffect::GoLive => {
                self.go_live();
                None
            }
            SideEffect::Unwind { error } => {
                self.unwind().await;
                Some(SessionEvent::UnwindComplete { error })
            }
            SideEffect::ReportStartFailure { error } => {
                self.report_start_failure(error);
                None
            }
            SideEffect::NotifyRecorderFailure { reason } => {
                tracing::error!(target: "broadcast", "[CONTROLLER] Forced stop: {}", reason);
                self.publish(SessionNotice::RecorderFailure {
                    message: RECORDER_FAILURE_MESSAGE.to_string(),
                });
                None
            }
            SideEffect::Teardown { reason } => {
                self.teardown(reason).await;
                Some(SessionEvent::TeardownComplete)
            }
            SideEffect::FinalizeIncident => {
                self.finalize_incident().await;
                Some(SessionEvent::IncidentFinalized)
            }
            SideEffect::PersistLocally => {
                self.persist_locally().await;
                Some(SessionEvent::PersistenceComplete)
            }
            SideEffect::ResetDevices => {
                self.reset_devices();
                None
            }
            SideEffect::CompleteStop => {
                self.complete_stop();
                None
            }
        }
    }

    fn session_lost() -> SessionEvent {
        tracing::error!(target: "broadcast", "[CONTROLLER] Start step ran without a session");
        SessionEvent::StartFailed {
            error: StartError::ControllerGone,
        }
    }

    async fn acquire_token(&mut self) -> SessionEvent {
        let Some((channel, uid)) = self.session.as_ref().map(|s| (s.channel_id.clone(), s.local_uid)) else {
            return Self::session_lost();
        };

        match self.tokens.fetch(&channel, uid, TokenRole::Publisher).await {
            Ok(token) => {
                if let Some(session) = self.session.as_mut() {
                    session.token = Some(token);
                }
                SessionEvent::TokenAcquired
            }
            Err(e) => {
                tracing::error!(target: "broadcast", "[CONTROLLER] Token request failed: {}", e);
                SessionEvent::StartFailed { error: e.into() }
            }
        }
    }

    async fn register_incident(&mut self) -> SessionEvent {
        let location = self.location.snapshot().unwrap_or_else(|| {
            tracing::warn!(target: "broadcast", "[CONTROLLER] No location fix, registering without coordinates");
            LocationSnapshot::default()
        });

        let result = self
            .incidents
            .register(
                self.settings.cloud_delivery,
                location,
                self.settings.device_token.as_deref(),
            )
            .await;

        match result {
            Ok(incident) => {
                self.recording.begin_session(&incident);
                let Some(session) = self.session.as_mut() else {
                    return Self::session_lost();
                };
                session.incident_id = Some(incident);
                session.location = Some(location);
                SessionEvent::IncidentRegistered
            }
            Err(e) => {
                tracing::error!(target: "broadcast", "[CONTROLLER] Incident registration failed: {}", e);
                SessionEvent::StartFailed {
                    error: StartError::IncidentCreate(e),
                }
            }
        }
    }

    async fn join_primary(&mut self) -> SessionEvent {
        let Some(session) = self.session.as_ref() else {
            return Self::session_lost();
        };
        let Some(token) = session.token.clone() else {
            return Self::session_lost();
        };
        let binding = PublisherBinding::primary(session.channel_id.clone(), session.local_uid);

        if let Err(e) = self.engine.join_primary(&token, &binding, session.mode) {
            return SessionEvent::StartFailed { error: e.into() };
        }

        match self.await_join(&binding).await {
            Ok(()) => SessionEvent::PrimaryJoined,
            Err(error) => SessionEvent::StartFailed { error },
        }
    }

    async fn start_recorders(&mut self) -> SessionEvent {
        let Some(session) = self.session.as_ref() else {
            return Self::session_lost();
        };
        let mode = session.mode;
        let primary = PublisherBinding::primary(session.channel_id.clone(), session.local_uid);
        let secondary = mode
            .uses_secondary()
            .then(|| PublisherBinding::secondary(session.channel_id.clone(), session.secondary_uid));

        if secondary.is_some() {
            if let Err(e) = self.engine.start_secondary_capture() {
                tracing::error!(target: "broadcast", "[CONTROLLER] Secondary camera unavailable: {}", e);
                return SessionEvent::StartFailed { error: e.into() };
            }
        }

        match self.recording.start_local_pair(&primary, secondary.as_ref(), mode).await {
            Ok(paths) => {
                if let Some(session) = self.session.as_mut() {
                    session.recording_paths = paths;
                }
                SessionEvent::RecordersStarted
            }
            Err(e) => SessionEvent::StartFailed { error: e.into() },
        }
    }

    async fn publish_secondary(&mut self) -> SessionEvent {
        let Some(session) = self.session.as_ref() else {
            return Self::session_lost();
        };
        if !session.mode.uses_secondary() {
            return SessionEvent::SecondaryPublished;
        }
        let Some(token) = session.token.clone() else {
            return Self::session_lost();
        };
        let binding = PublisherBinding::secondary(session.channel_id.clone(), session.secondary_uid);

        if let Err(e) = self.engine.join_secondary(&token, &binding) {
            return SessionEvent::StartFailed { error: e.into() };
        }

        match self.await_join(&binding).await {
            Ok(()) => SessionEvent::SecondaryPublished,
            Err(error) => SessionEvent::StartFailed { error },
        }
    }

    /// Waits for the engine to confirm `binding` joined. Unrelated signals are
    /// deferred until the current step settles.
    async fn await_join(&mut self, binding: &PublisherBinding) -> Result<(), StartError> {
        let waited = self.settings.join_timeout();
        let deadline = Instant::now() + waited;

        loop {
            match tokio::time::timeout_at(deadline, self.signal_rx.recv()).await {
                Err(_) => {
                    tracing::error!(target: "broadcast", "[CONTROLLER] No join confirmation for {} after {:?}", binding, waited);
                    return Err(StartError::JoinTimeout {
                        uid: binding.uid,
                        waited,
                    });
                }
                Ok(None) => return Err(StartError::ControllerGone),
                Ok(Some(SessionSignal::Engine(EngineEvent::JoinSucceeded { channel, uid })))
                    if channel == binding.channel && uid == binding.uid =>
                {
                    tracing::info!(target: "broadcast", "[CONTROLLER] Joined {}", binding);
                    return Ok(());
                }
                Ok(Some(SessionSignal::Engine(EngineEvent::JoinFailed { channel, uid, reason })))
                    if channel == binding.channel && uid == binding.uid =>
                {
                    tracing::error!(target: "broadcast", "[CONTROLLER] Join of {} rejected: {}", binding, reason);
                    return Err(StartError::JoinRejected { uid, reason });
                }
                Ok(Some(other)) => self.deferred.push_back(other),
            }
        }
    }

    async fn start_cloud_recording(&mut self) {
        if !self.settings.cloud_delivery.is_enabled() {
            tracing::info!(target: "broadcast", "[CONTROLLER] Cloud delivery disabled, recording locally only");
            return;
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let Some(incident_id) = session.incident_id.as_ref().and_then(IncidentId::backend_id) else {
            tracing::info!(target: "broadcast", "[CONTROLLER] No backend incident, skipping cloud recording");
            return;
        };
        let Some(token) = session.token.as_ref() else {
            return;
        };

        let result = self.recording.start_cloud(&session.channel_id, token, incident_id).await;
        match result {
            Ok(resource) => {
                if let Some(session) = self.session.as_mut() {
                    session.cloud_resource = Some(resource);
                }
            }
            Err(e) => {
                tracing::warn!(target: "broadcast", "[CONTROLLER] {}, continuing without cloud recording", e);
            }
        }
    }

    fn go_live(&mut self) {
        let now = Instant::now();
        self.live_started = Some(now);
        self.deadline = self.settings.max_session().map(|limit| now + limit);

        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.live_since = Some(Utc::now());
        let snapshot = session.clone();

        let incident = snapshot
            .incident_id
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        tracing::info!(
            target: "broadcast",
            "[CONTROLLER] Live: session={} incident={} recorders={} cloud={}",
            snapshot.id,
            incident,
            snapshot.recording_paths.count(),
            snapshot.cloud_resource.is_some()
        );

        self.publish(SessionNotice::Live {
            session_id: snapshot.id,
            incident_id: incident,
        });
        self.notify_recipients(&snapshot);

        if let Some(response_tx) = self.pending_start.take() {
            let _ = response_tx.send(Ok(snapshot));
        }
    }

    /// Best-effort and detached so a slow backend never holds the session.
    fn notify_recipients(&self, session: &Session) {
        let (Some(incident), Some(token)) = (session.incident_id.clone(), session.token.clone()) else {
            return;
        };
        if incident.is_placeholder() {
            return;
        }

        let notifier = self.notifier.clone();
        let location = session.location.unwrap_or_default();
        let kind = session.mode.recording_type();

        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&token, location, kind, &incident).await {
                tracing::warn!(target: "broadcast", "[CONTROLLER] Recipient notification failed: {}", e);
            }
        });
    }

    /// Compensates start steps in reverse order.
    async fn unwind(&mut self) {
        tracing::warn!(target: "broadcast", "[CONTROLLER] Unwinding partial start");

        if let Some(session) = self.session.as_ref() {
            if let (Some(resource), Some(incident)) = (
                session.cloud_resource.as_ref(),
                session.incident_id.as_ref().and_then(IncidentId::backend_id),
            ) {
                let result = self
                    .recording
                    .stop_cloud(&session.channel_id, resource, incident, session.mode.recording_type())
                    .await;
                if let Err(e) = result {
                    tracing::warn!(target: "broadcast", "[CONTROLLER] Unwind: {}", e);
                }
            }
        }

        for e in self.recording.stop_all_local().await {
            tracing::warn!(target: "broadcast", "[CONTROLLER] Unwind: {}", e);
        }

        if let Err(e) = self.engine.leave_all() {
            tracing::warn!(target: "broadcast", "[CONTROLLER] Unwind: {}", e);
        }

        self.recording.end_session();
    }

    fn report_start_failure(&mut self, error: StartError) {
        tracing::error!(target: "broadcast", "[CONTROLLER] Start failed: {}", error);

        self.publish(SessionNotice::StartFailed {
            message: error.user_message().to_string(),
        });
        self.session = None;
        self.deadline = None;

        if let Some(response_tx) = self.pending_start.take() {
            let _ = response_tx.send(Err(error));
        }
    }

    async fn teardown(&mut self, reason: EndReason) {
        tracing::info!(target: "broadcast", "[CONTROLLER] Stopping session ({:?})", reason);

        self.report.end_reason = Some(reason);
        self.report.live_duration = self
            .live_started
            .take()
            .map(|since| since.elapsed())
            .unwrap_or_default();
        self.deadline = None;

        if let Err(e) = self.engine.leave_all() {
            self.report.warn(format!("Leaving channel failed: {}", e));
        }
        if let Err(e) = self.engine.set_torch(false) {
            self.report.warn(format!("Turning torch off failed: {}", e));
        }

        for e in self.recording.stop_all_local().await {
            self.report.warn(e.to_string());
        }

        let Some(session) = self.session.as_ref() else {
            return;
        };
        let (Some(resource), Some(incident)) = (
            session.cloud_resource.as_ref(),
            session.incident_id.as_ref().and_then(IncidentId::backend_id),
        ) else {
            return;
        };

        let result = self
            .recording
            .stop_cloud(&session.channel_id, resource, incident, session.mode.recording_type())
            .await;
        match result {
            Ok(links) => self.report.media_links = links,
            Err(e) => self.report.warn(e.to_string()),
        }
    }

    async fn finalize_incident(&mut self) {
        let Some((incident, recording_type)) = self
            .session
            .as_ref()
            .and_then(|s| s.incident_id.clone().map(|id| (id, s.mode.recording_type())))
        else {
            return;
        };

        if incident.is_placeholder() {
            tracing::debug!(target: "broadcast", "[CONTROLLER] {} is local only, nothing to finalize", incident);
            return;
        }

        let result = self
            .incidents
            .finalize(&incident, recording_type, self.report.media_links.as_ref())
            .await;
        if let Err(e) = result {
            self.report.warn(format!("Finalize failed: {}", e));
        }
    }

    async fn persist_locally(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if session.cloud_resource.is_some() {
            return;
        }

        let paths = session.recording_paths.all();
        let kind = session.mode.recording_type();
        let fallback = self.fallback.clone();

        match tokio::task::spawn_blocking(move || fallback.migrate(&paths, kind)).await {
            Ok(report) => {
                self.report.migrated = Some(report.migrated_count());
                for failure in report.failures {
                    self.report.warn(failure.to_string());
                }
            }
            Err(e) => self.report.warn(format!("Migration task failed: {}", e)),
        }
    }

    fn reset_devices(&mut self) {
        if let Err(e) = self.engine.reset_camera() {
            self.report.warn(format!("Camera reset failed: {}", e));
        }
        self.recording.end_session();
    }

    fn complete_stop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let Some(incident_id) = session.incident_id else {
            tracing::error!(target: "broadcast", "[CONTROLLER] Stopped session {} had no incident", session.id);
            return;
        };
        let report = std::mem::take(&mut self.report);

        let finalized = FinalizedIncident {
            session_id: session.id,
            placeholder: incident_id.is_placeholder(),
            incident_id,
            recording_type: session.mode.recording_type(),
            media_links: report.media_links,
            recording_paths: session.recording_paths,
            migrated: report.migrated,
            end_reason: report.end_reason.unwrap_or(EndReason::UserRequested),
            live_duration: report.live_duration,
            warnings: report.warnings,
        };

        tracing::info!(
            target: "broadcast",
            "[CONTROLLER] Session {} finished: incident={} reason={:?} warnings={}",
            finalized.session_id,
            finalized.incident_id,
            finalized.end_reason,
            finalized.warnings.len()
        );

        self.publish(SessionNotice::Ended {
            session_id: finalized.session_id,
            reason: finalized.end_reason,
            warnings: finalized.warnings.len(),
        });
        self.last_finalized = Some(finalized.clone());

        if let Some(response_tx) = self.pending_stop.take() {
            let _ = response_tx.send(Ok(finalized));
        }
    }

    fn require_live(&self) -> Result<(), ControlError> {
        if self.state.is_live() {
            Ok(())
        } else {
            Err(ControlError::NotLive)
        }
    }

    fn get_status(&self) -> SessionStatus {
        let camera = self.engine.camera_state();
        let session = self.session.as_ref();

        SessionStatus {
            state: self.state.name(),
            session_id: session.map(|s| s.id),
            mode: session.map(|s| s.mode),
            incident_id: session.and_then(|s| s.incident_id.as_ref().map(ToString::to_string)),
            elapsed_seconds: self.live_started.map_or(0.0, |since| since.elapsed().as_secs_f64()),
            torch_on: camera.torch_on,
            zoom: camera.zoom,
        }
    }

    fn emit_state_change(&self, state: &SessionState) {
        tracing::debug!(target: "broadcast", "[CONTROLLER] State -> {}", state.name());
        self.publish(SessionNotice::StateChanged { state: state.name() });
    }

    fn publish(&self, notice: SessionNotice) {
        // no subscribers is fine
        let _ = self.notices.send(notice);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
