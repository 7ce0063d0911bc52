//! Incident records on the backend.
//!
//! An incident is created once when a broadcast starts, finalized once when it
//! stops, and may be amended later by out-of-band photo or metadata updates.
//! Placeholder ids never reach the backend.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use super::backend::wire::{CreateIncidentRequest, UpdateIncidentRequest};
use super::backend::BroadcastBackend;
use super::errors::{BackendError, FinalizeError};
use super::recording::naming::placeholder_incident_id;
use super::types::{IncidentId, LocationSnapshot, MediaLinks, RecordingType};
use crate::core::settings::CloudDelivery;

/// Out-of-band changes merged into an existing incident.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncidentAmendment {
    pub photo_url: Option<String>,
    pub note: Option<String>,
}

pub struct IncidentRegistrar {
    backend: Arc<dyn BroadcastBackend>,
    user: Option<String>,
    timeout: Duration,
    finalized: Mutex<HashSet<String>>,
}

impl IncidentRegistrar {
    pub fn new(backend: Arc<dyn BroadcastBackend>, user: Option<String>, timeout: Duration) -> Self {
        Self {
            backend,
            user,
            timeout,
            finalized: Mutex::new(HashSet::new()),
        }
    }

    /// `POST /incidents` with a bounded wait.
    pub async fn create(
        &self,
        location: LocationSnapshot,
        device_token: Option<&str>,
    ) -> Result<IncidentId, BackendError> {
        let request = CreateIncidentRequest {
            timestamp: Utc::now(),
            latitude: location.latitude,
            longitude: location.longitude,
            user: self.user.clone(),
            device_token: device_token.map(str::to_string),
        };

        let response = tokio::time::timeout(self.timeout, self.backend.create_incident(&request))
            .await
            .map_err(|_| BackendError::Timeout(self.timeout))??;

        tracing::info!(target: "broadcast", "[INCIDENT] Created incident id={}", response.id);
        Ok(IncidentId::Backend(response.id))
    }

    /// Resolves the incident id for a new session according to the delivery mode.
    ///
    /// `Disabled` never touches the network. `BestEffort` falls back to a
    /// placeholder when creation fails. `Required` surfaces the failure.
    pub async fn register(
        &self,
        delivery: CloudDelivery,
        location: LocationSnapshot,
        device_token: Option<&str>,
    ) -> Result<IncidentId, BackendError> {
        match delivery {
            CloudDelivery::Disabled => {
                let id = placeholder_incident_id();
                tracing::info!(target: "broadcast", "[INCIDENT] Cloud delivery disabled, using {}", id);
                Ok(id)
            }
            CloudDelivery::BestEffort => match self.create(location, device_token).await {
                Ok(id) => Ok(id),
                Err(e) => {
                    let id = placeholder_incident_id();
                    tracing::warn!(target: "broadcast", "[INCIDENT] Create failed ({}), continuing with {}", e, id);
                    Ok(id)
                }
            },
            CloudDelivery::Required => self.create(location, device_token).await,
        }
    }

    /// Attaches the recording type and media links. A given id is finalized at most once.
    pub async fn finalize(
        &self,
        incident: &IncidentId,
        recording_type: RecordingType,
        media_links: Option<&MediaLinks>,
    ) -> Result<(), FinalizeError> {
        let id = incident
            .backend_id()
            .ok_or_else(|| FinalizeError::Placeholder(incident.to_string()))?;

        if self.is_finalized(id) {
            return Err(FinalizeError::AlreadyFinalized(id.to_string()));
        }

        let links = media_links.cloned().unwrap_or_default();
        let request = UpdateIncidentRequest {
            recording_type: Some(recording_type),
            video_url: links.video_url,
            audio_url: links.audio_url,
            finalized: Some(true),
            ..Default::default()
        };

        tokio::time::timeout(self.timeout, self.backend.update_incident(id, &request))
            .await
            .map_err(|_| BackendError::Timeout(self.timeout))??;
        self.mark_finalized(id);

        tracing::info!(target: "broadcast", "[INCIDENT] Finalized incident id={} type={}", id, recording_type.as_str());
        Ok(())
    }

    /// Merges photo or metadata updates into an existing backend incident.
    pub async fn amend(
        &self,
        incident: &IncidentId,
        amendment: IncidentAmendment,
    ) -> Result<(), BackendError> {
        let id = incident
            .backend_id()
            .ok_or_else(|| BackendError::PlaceholderId(incident.to_string()))?;

        let request = UpdateIncidentRequest {
            photo_url: amendment.photo_url,
            note: amendment.note,
            ..Default::default()
        };

        self.backend.update_incident(id, &request).await?;
        tracing::debug!(target: "broadcast", "[INCIDENT] Amended incident id={}", id);
        Ok(())
    }

    fn is_finalized(&self, id: &str) -> bool {
        self.finalized
            .lock()
            .map(|set| set.contains(id))
            .unwrap_or(false)
    }

    fn mark_finalized(&self, id: &str) {
        if let Ok(mut set) = self.finalized.lock() {
            set.insert(id.to_string());
        }
    }
}
