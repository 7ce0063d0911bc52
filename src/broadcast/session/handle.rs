use tokio::sync::{broadcast, mpsc, oneshot};
use uuid::Uuid;

use super::super::errors::{BackendError, ControlError, StartError, StopError, ToggleError};
use super::super::incident::IncidentAmendment;
use super::super::types::{CameraDirection, IncidentId, StreamMode};
use super::{FinalizedIncident, Session, SessionNotice, SessionStatus};

/// Commands sent from the host to the controller.
#[derive(Debug)]
pub(super) enum Command {
    Start {
        mode: StreamMode,
        response_tx: oneshot::Sender<Result<Session, StartError>>,
    },
    Stop {
        session_id: Uuid,
        response_tx: oneshot::Sender<Result<FinalizedIncident, StopError>>,
    },
    Toggle {
        mode: StreamMode,
        response_tx: oneshot::Sender<Result<ToggleOutcome, ToggleError>>,
    },
    Status {
        response_tx: oneshot::Sender<SessionStatus>,
    },
    SetTorch {
        on: bool,
        response_tx: oneshot::Sender<Result<(), ControlError>>,
    },
    SetZoom {
        factor: f32,
        response_tx: oneshot::Sender<Result<f32, ControlError>>,
    },
    SwitchCamera {
        response_tx: oneshot::Sender<Result<CameraDirection, ControlError>>,
    },
    AmendIncident {
        incident_id: IncidentId,
        amendment: IncidentAmendment,
        response_tx: oneshot::Sender<Result<(), BackendError>>,
    },
}

#[derive(Debug, Clone)]
pub enum ToggleOutcome {
    Started(Session),
    Stopped(FinalizedIncident),
}

/// Handle to send commands to the session controller.
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<Command>,
    notices: broadcast::Sender<SessionNotice>,
}

impl SessionHandle {
    pub(super) fn new(command_tx: mpsc::Sender<Command>, notices: broadcast::Sender<SessionNotice>) -> Self {
        Self { command_tx, notices }
    }

    pub async fn start(&self, mode: StreamMode) -> Result<Session, StartError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(Command::Start { mode, response_tx })
            .await
            .map_err(|_| StartError::ControllerGone)?;

        response_rx.await.map_err(|_| StartError::ControllerGone)?
    }

    pub async fn stop(&self, session_id: Uuid) -> Result<FinalizedIncident, StopError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(Command::Stop {
                session_id,
                response_tx,
            })
            .await
            .map_err(|_| StopError::ControllerGone)?;

        response_rx.await.map_err(|_| StopError::ControllerGone)?
    }

    /// Starts when idle, stops the active session otherwise.
    pub async fn toggle(&self, mode: StreamMode) -> Result<ToggleOutcome, ToggleError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(Command::Toggle { mode, response_tx })
            .await
            .map_err(|_| StartError::ControllerGone)?;

        response_rx.await.map_err(|_| StartError::ControllerGone)?
    }

    pub async fn status(&self) -> Result<SessionStatus, ControlError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(Command::Status { response_tx })
            .await
            .map_err(|_| ControlError::ControllerGone)?;

        response_rx.await.map_err(|_| ControlError::ControllerGone)
    }

    pub async fn set_torch(&self, on: bool) -> Result<(), ControlError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(Command::SetTorch { on, response_tx })
            .await
            .map_err(|_| ControlError::ControllerGone)?;

        response_rx.await.map_err(|_| ControlError::ControllerGone)?
    }

    /// Returns the zoom factor actually applied after clamping.
    pub async fn set_zoom(&self, factor: f32) -> Result<f32, ControlError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(Command::SetZoom { factor, response_tx })
            .await
            .map_err(|_| ControlError::ControllerGone)?;

        response_rx.await.map_err(|_| ControlError::ControllerGone)?
    }

    pub async fn switch_camera(&self) -> Result<CameraDirection, ControlError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(Command::SwitchCamera { response_tx })
            .await
            .map_err(|_| ControlError::ControllerGone)?;

        response_rx.await.map_err(|_| ControlError::ControllerGone)?
    }

    pub async fn amend_incident(
        &self,
        incident_id: IncidentId,
        amendment: IncidentAmendment,
    ) -> Result<(), BackendError> {
        let (response_tx, response_rx) = oneshot::channel();
        let gone = || BackendError::Request("session controller is not running".to_string());

        self.command_tx
            .send(Command::AmendIncident {
                incident_id,
                amendment,
                response_tx,
            })
            .await
            .map_err(|_| gone())?;

        response_rx.await.map_err(|_| gone())?
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionNotice> {
        self.notices.subscribe()
    }
}
