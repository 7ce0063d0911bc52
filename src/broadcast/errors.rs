use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors from REST calls to the backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to decode response: {0}")]
    Decode(String),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Placeholder incident id {0} cannot be sent to the backend")]
    PlaceholderId(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Token request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Backend returned an empty token")]
    Empty,
}

/// Errors from the realtime media engine capability.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Media engine is not initialized")]
    NotInitialized,
    #[error("Media engine failed to initialize: {0}")]
    InitFailed(String),
    #[error("Join request was rejected: {0}")]
    JoinFailed(String),
    #[error("Camera operation failed: {0}")]
    Camera(String),
    #[error("Recorder could not be created: {0}")]
    RecorderUnavailable(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecorderError {
    #[error("Recorder for {binding} failed to start: {reason}")]
    Start { binding: String, reason: String },
    #[error("Recorder for {binding} failed to stop: {reason}")]
    Stop { binding: String, reason: String },
    #[error("No active recorder for {0}")]
    NotRunning(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Fatal errors of the start sequence.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StartError {
    #[error("No trusted contacts are configured")]
    NoRecipients,
    #[error("A broadcast is already streaming")]
    AlreadyStreaming,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("Incident could not be created: {0}")]
    IncidentCreate(BackendError),
    #[error("Engine did not confirm join of uid {uid} within {waited:?}")]
    JoinTimeout { uid: u32, waited: Duration },
    #[error("Engine rejected join of uid {uid}: {reason}")]
    JoinRejected { uid: u32, reason: String },
    #[error(transparent)]
    RecorderStart(#[from] RecorderError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Session controller is not running")]
    ControllerGone,
}

impl StartError {
    /// Message suitable for showing to the person streaming.
    pub fn user_message(&self) -> &'static str {
        match self {
            StartError::NoRecipients => "Add a trusted contact before streaming",
            StartError::AlreadyStreaming => "Already streaming",
            StartError::Token(_) | StartError::IncidentCreate(_) => {
                "Could not reach the server, try again"
            }
            StartError::JoinTimeout { .. }
            | StartError::JoinRejected { .. }
            | StartError::RecorderStart(_)
            | StartError::Engine(_)
            | StartError::ControllerGone => "Could not start stream, try again",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StopError {
    #[error("No session with that id is active")]
    NotActive,
    #[error("Session controller is not running")]
    ControllerGone,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToggleError {
    #[error(transparent)]
    Start(#[from] StartError),
    #[error(transparent)]
    Stop(#[from] StopError),
}

/// Errors from camera controls applied during a live session.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    #[error("No live session")]
    NotLive,
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Session controller is not running")]
    ControllerGone,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Cloud recording {stage} failed: {source}")]
pub struct CloudRecordingError {
    pub stage: &'static str,
    pub source: BackendError,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FinalizeError {
    #[error("Placeholder incident {0} is never finalized")]
    Placeholder(String),
    #[error("Incident {0} was already finalized")]
    AlreadyFinalized(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Per-file failure while moving recordings to the persistent media store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MigrationError {
    #[error("Recording {0:?} does not exist")]
    Missing(PathBuf),
    #[error("Permission denied for {0:?}")]
    PermissionDenied(PathBuf),
    #[error("Failed to migrate {path:?}: {message}")]
    Io { path: PathBuf, message: String },
}

impl MigrationError {
    pub fn from_io(path: PathBuf, error: &std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => MigrationError::Missing(path),
            std::io::ErrorKind::PermissionDenied => MigrationError::PermissionDenied(path),
            _ => MigrationError::Io {
                path,
                message: error.to_string(),
            },
        }
    }
}
