use std::sync::Arc;

use super::backend::wire::{RecipientResult, StreamMessageRequest};
use super::backend::BroadcastBackend;
use super::errors::BackendError;
use super::types::{IncidentId, LocationSnapshot, RecordingType, RtcToken};

/// Asks the backend to message trusted contacts once a session is live.
pub struct RecipientNotifier {
    backend: Arc<dyn BroadcastBackend>,
}

impl RecipientNotifier {
    pub fn new(backend: Arc<dyn BroadcastBackend>) -> Self {
        Self { backend }
    }

    pub async fn notify(
        &self,
        token: &RtcToken,
        location: LocationSnapshot,
        kind: RecordingType,
        incident: &IncidentId,
    ) -> Result<Vec<RecipientResult>, BackendError> {
        let incident_id = incident
            .backend_id()
            .ok_or_else(|| BackendError::PlaceholderId(incident.to_string()))?;

        let request = StreamMessageRequest {
            stream_token: token.value.clone(),
            lat: location.latitude,
            lng: location.longitude,
            kind,
            incident_id: incident_id.to_string(),
        };

        let response = self.backend.send_stream_message(&request).await?;
        let delivered = response
            .results
            .iter()
            .filter(|r| r.status.as_deref().is_some_and(|s| !s.eq_ignore_ascii_case("failed")))
            .count();

        tracing::info!(
            target: "broadcast",
            "[ALERTS] Notified {}/{} recipients for incident {}",
            delivered,
            response.results.len(),
            incident_id
        );
        Ok(response.results)
    }
}
