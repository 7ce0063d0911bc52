//! Broadcast session orchestration.
//!
//! Architecture:
//! - Hosts call [`SessionHandle`], which sends `Command`s to the controller task
//! - Engine and recorder callbacks enqueue `SessionSignal`s on a second channel
//! - The controller feeds both through the pure `transition` function and executes the effects
//! - Hosts observe progress through [`SessionNotice`]s on a broadcast channel

mod controller;
mod handle;
pub mod state;

use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use super::types::{
    CloudResource, EndReason, IncidentId, LocationSnapshot, MediaLinks, RecordingPaths, RecordingType,
    RtcToken, StreamMode,
};
use crate::core::settings::BroadcastSettings;
pub use controller::{ControllerDeps, SessionController};
pub use handle::{SessionHandle, ToggleOutcome};
pub use state::SessionState;

/// A single broadcast attempt, from start request to teardown.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub mode: StreamMode,
    pub channel_id: String,
    pub local_uid: u32,
    pub secondary_uid: u32,
    pub token: Option<RtcToken>,
    pub incident_id: Option<IncidentId>,
    /// Position the incident was registered at.
    pub location: Option<LocationSnapshot>,
    pub recording_paths: RecordingPaths,
    pub cloud_resource: Option<CloudResource>,
    pub state: SessionState,
    pub live_since: Option<chrono::DateTime<chrono::Utc>>,
}

impl Session {
    pub fn new(mode: StreamMode, settings: &BroadcastSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            channel_id: settings.channel_id.clone(),
            local_uid: settings.local_uid,
            secondary_uid: settings.secondary_uid,
            token: None,
            incident_id: None,
            location: None,
            recording_paths: RecordingPaths::default(),
            cloud_resource: None,
            state: SessionState::Idle,
            live_since: None,
        }
    }
}

/// Outcome of a stopped session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedIncident {
    pub session_id: Uuid,
    pub incident_id: IncidentId,
    pub placeholder: bool,
    pub recording_type: RecordingType,
    pub media_links: Option<MediaLinks>,
    pub recording_paths: RecordingPaths,
    /// Files moved to the media store, when local persistence ran.
    pub migrated: Option<usize>,
    pub end_reason: EndReason,
    #[serde(serialize_with = "serialize_secs")]
    pub live_duration: Duration,
    /// Non-fatal failures collected during teardown.
    pub warnings: Vec<String>,
}

fn serialize_secs<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

/// Session status for the host UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub state: &'static str,
    pub session_id: Option<Uuid>,
    pub mode: Option<StreamMode>,
    pub incident_id: Option<String>,
    pub elapsed_seconds: f64,
    pub torch_on: bool,
    pub zoom: f32,
}

/// Messages published to the host UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionNotice {
    StateChanged {
        state: &'static str,
    },
    Live {
        session_id: Uuid,
        incident_id: String,
    },
    Ended {
        session_id: Uuid,
        reason: EndReason,
        warnings: usize,
    },
    RecorderFailure {
        message: String,
    },
    StartFailed {
        message: String,
    },
}

pub const RECORDER_FAILURE_MESSAGE: &str = "stream ended unexpectedly";
