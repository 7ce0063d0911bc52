//! Pure state machine for the broadcast session lifecycle.
//!
//! `(State, Event) -> (NewState, Vec<SideEffect>)`. The controller executes
//! the effects; this module never performs I/O. Invalid transitions return the
//! current state with no effects, which is what makes a second stop request or
//! a second recorder failure harmless.

use std::time::{Duration, Instant};

use super::super::errors::StartError;
use super::super::types::EndReason;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    AcquiringToken,
    RegisteringIncident,
    Joining,
    /// Recorders running; secondary publish and cloud start may still be pending.
    Recording,
    Live {
        since: Instant,
    },
    Stopping {
        reason: EndReason,
    },
    Finalizing {
        reason: EndReason,
    },
    /// A start step failed; compensation is running.
    Error {
        message: String,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "IDLE",
            SessionState::AcquiringToken => "ACQUIRING_TOKEN",
            SessionState::RegisteringIncident => "REGISTERING_INCIDENT",
            SessionState::Joining => "JOINING",
            SessionState::Recording => "RECORDING",
            SessionState::Live { .. } => "LIVE",
            SessionState::Stopping { .. } => "STOPPING",
            SessionState::Finalizing { .. } => "FINALIZING",
            SessionState::Error { .. } => "ERROR",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle)
    }

    pub fn is_live(&self) -> bool {
        matches!(self, SessionState::Live { .. })
    }

    /// Time spent LIVE, if currently live.
    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            SessionState::Live { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    fn is_starting(&self) -> bool {
        matches!(
            self,
            SessionState::AcquiringToken
                | SessionState::RegisteringIncident
                | SessionState::Joining
                | SessionState::Recording
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StartRequested,
    TokenAcquired,
    IncidentRegistered,
    PrimaryJoined,
    RecordersStarted,
    SecondaryPublished,
    /// Cloud recording started, failed, or did not apply.
    CloudSettled,
    StartFailed { error: StartError },
    UnwindComplete { error: StartError },

    StopRequested,
    RecorderFailed { reason: String },
    TimeLimitReached,
    TeardownComplete,
    IncidentFinalized,
    PersistenceComplete,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SideEffect {
    AcquireToken,
    RegisterIncident,
    JoinPrimary,
    StartRecorders,
    PublishSecondary,
    StartCloudRecording,
    /// Start elapsed-time accounting, arm the time limit, answer the caller, notify recipients.
    GoLive,
    /// Compensate every start step already taken, newest first.
    Unwind { error: StartError },
    ReportStartFailure { error: StartError },

    NotifyRecorderFailure { reason: String },
    /// Leave the channel, torch off, stop local recorders, stop cloud recording.
    Teardown { reason: EndReason },
    FinalizeIncident,
    PersistLocally,
    ResetDevices,
    CompleteStop,

    EmitStateChange { state: SessionState },
}

fn enter(state: SessionState, mut effects: Vec<SideEffect>) -> (SessionState, Vec<SideEffect>) {
    effects.insert(
        0,
        SideEffect::EmitStateChange {
            state: state.clone(),
        },
    );
    (state, effects)
}

fn begin_stop(reason: EndReason, mut effects: Vec<SideEffect>) -> (SessionState, Vec<SideEffect>) {
    effects.push(SideEffect::Teardown { reason });
    enter(SessionState::Stopping { reason }, effects)
}

pub fn transition(state: SessionState, event: SessionEvent) -> (SessionState, Vec<SideEffect>) {
    match (&state, event) {
        (SessionState::Idle, SessionEvent::StartRequested) => {
            enter(SessionState::AcquiringToken, vec![SideEffect::AcquireToken])
        }

        (SessionState::AcquiringToken, SessionEvent::TokenAcquired) => {
            enter(SessionState::RegisteringIncident, vec![SideEffect::RegisterIncident])
        }

        (SessionState::RegisteringIncident, SessionEvent::IncidentRegistered) => {
            enter(SessionState::Joining, vec![SideEffect::JoinPrimary])
        }

        (SessionState::Joining, SessionEvent::PrimaryJoined) => {
            enter(SessionState::Recording, vec![SideEffect::StartRecorders])
        }

        // Recording sub-steps stay in RECORDING
        (SessionState::Recording, SessionEvent::RecordersStarted) => {
            (state, vec![SideEffect::PublishSecondary])
        }

        (SessionState::Recording, SessionEvent::SecondaryPublished) => {
            (state, vec![SideEffect::StartCloudRecording])
        }

        (SessionState::Recording, SessionEvent::CloudSettled) => enter(
            SessionState::Live {
                since: Instant::now(),
            },
            vec![SideEffect::GoLive],
        ),

        (s, SessionEvent::StartFailed { error }) if s.is_starting() => enter(
            SessionState::Error {
                message: error.to_string(),
            },
            vec![SideEffect::Unwind { error }],
        ),

        (SessionState::Error { .. }, SessionEvent::UnwindComplete { error }) => {
            enter(SessionState::Idle, vec![SideEffect::ReportStartFailure { error }])
        }

        (SessionState::Recording | SessionState::Live { .. }, SessionEvent::StopRequested) => {
            begin_stop(EndReason::UserRequested, vec![])
        }

        (SessionState::Recording | SessionState::Live { .. }, SessionEvent::RecorderFailed { reason }) => {
            begin_stop(
                EndReason::RecorderFailure,
                vec![SideEffect::NotifyRecorderFailure { reason }],
            )
        }

        (SessionState::Live { .. }, SessionEvent::TimeLimitReached) => {
            begin_stop(EndReason::TimeLimit, vec![])
        }

        (SessionState::Stopping { reason }, SessionEvent::TeardownComplete) => {
            let reason = *reason;
            enter(SessionState::Finalizing { reason }, vec![SideEffect::FinalizeIncident])
        }

        (SessionState::Finalizing { .. }, SessionEvent::IncidentFinalized) => {
            (state, vec![SideEffect::PersistLocally])
        }

        (SessionState::Finalizing { .. }, SessionEvent::PersistenceComplete) => enter(
            SessionState::Idle,
            vec![SideEffect::ResetDevices, SideEffect::CompleteStop],
        ),

        _ => (state, vec![]),
    }
}
