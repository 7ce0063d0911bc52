//! Backend REST surface consumed by the broadcast core.
//!
//! `BroadcastBackend` is the seam between orchestration and transport:
//! production uses [`HttpBackend`], tests substitute an in-memory fake.

mod http;
pub mod wire;

use async_trait::async_trait;

use super::errors::BackendError;
pub use http::HttpBackend;
use wire::{
    CreateIncidentRequest, CreateIncidentResponse, StartRecordingRequest, StartRecordingResponse,
    StopRecordingRequest, StopRecordingResponse, StreamMessageRequest, StreamMessageResponse,
    TokenRequest, TokenResponse, UpdateIncidentRequest, UpdateIncidentResponse,
};

#[async_trait]
pub trait BroadcastBackend: Send + Sync {
    /// `POST /rtc-token`
    async fn rtc_token(&self, request: &TokenRequest) -> Result<TokenResponse, BackendError>;

    /// `POST /incidents`
    async fn create_incident(
        &self,
        request: &CreateIncidentRequest,
    ) -> Result<CreateIncidentResponse, BackendError>;

    /// `PATCH /incidents/{id}`
    async fn update_incident(
        &self,
        incident_id: &str,
        request: &UpdateIncidentRequest,
    ) -> Result<UpdateIncidentResponse, BackendError>;

    /// `POST /stream/send-msg`
    async fn send_stream_message(
        &self,
        request: &StreamMessageRequest,
    ) -> Result<StreamMessageResponse, BackendError>;

    /// `POST /recording/start`
    async fn start_recording(
        &self,
        request: &StartRecordingRequest,
    ) -> Result<StartRecordingResponse, BackendError>;

    /// `POST /recording/stop`
    async fn stop_recording(
        &self,
        request: &StopRecordingRequest,
    ) -> Result<StopRecordingResponse, BackendError>;
}
