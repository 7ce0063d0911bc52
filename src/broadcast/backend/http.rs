use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::super::errors::BackendError;
use super::wire::{
    CreateIncidentRequest, CreateIncidentResponse, StartRecordingRequest, StartRecordingResponse,
    StopRecordingRequest, StopRecordingResponse, StreamMessageRequest, StreamMessageResponse,
    TokenRequest, TokenResponse, UpdateIncidentRequest, UpdateIncidentResponse,
};
use super::BroadcastBackend;
use crate::core::settings::BroadcastSettings;

/// Per-request ceiling. Callers may apply tighter bounds of their own.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Response bodies longer than this are cut in logs.
const MAX_LOGGED_BODY: usize = 500;

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BackendError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_settings(settings: &BroadcastSettings) -> Result<Self, BackendError> {
        Self::new(settings.backend_url.clone(), settings.api_key.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send_json<B, R>(&self, method: Method, path: &str, body: &B) -> Result<R, BackendError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        tracing::debug!(target: "backend", "[HTTP] {} {}", method, url);

        let mut request = self.client.request(method.clone(), &url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!(target: "backend", "[HTTP] {} {} failed: {}", method, path, e);
            if e.is_timeout() {
                BackendError::Timeout(REQUEST_TIMEOUT)
            } else {
                BackendError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(target: "backend", "[HTTP] {} {} returned {}: {}", method, path, status, truncate_for_log(&text));
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            tracing::warn!(target: "backend", "[HTTP] {} {} undecodable body: {}", method, path, truncate_for_log(&text));
            BackendError::Decode(e.to_string())
        })
    }
}

fn truncate_for_log(value: &str) -> String {
    if value.chars().count() > MAX_LOGGED_BODY {
        let truncated: String = value.chars().take(MAX_LOGGED_BODY).collect();
        format!("{}...[truncated]", truncated)
    } else {
        value.to_string()
    }
}

#[async_trait]
impl BroadcastBackend for HttpBackend {
    async fn rtc_token(&self, request: &TokenRequest) -> Result<TokenResponse, BackendError> {
        self.send_json(Method::POST, "/rtc-token", request).await
    }

    async fn create_incident(
        &self,
        request: &CreateIncidentRequest,
    ) -> Result<CreateIncidentResponse, BackendError> {
        self.send_json(Method::POST, "/incidents", request).await
    }

    async fn update_incident(
        &self,
        incident_id: &str,
        request: &UpdateIncidentRequest,
    ) -> Result<UpdateIncidentResponse, BackendError> {
        let path = format!("/incidents/{}", incident_id);
        self.send_json(Method::PATCH, &path, request).await
    }

    async fn send_stream_message(
        &self,
        request: &StreamMessageRequest,
    ) -> Result<StreamMessageResponse, BackendError> {
        self.send_json(Method::POST, "/stream/send-msg", request).await
    }

    async fn start_recording(
        &self,
        request: &StartRecordingRequest,
    ) -> Result<StartRecordingResponse, BackendError> {
        self.send_json(Method::POST, "/recording/start", request).await
    }

    async fn stop_recording(
        &self,
        request: &StopRecordingRequest,
    ) -> Result<StopRecordingResponse, BackendError> {
        self.send_json(Method::POST, "/recording/stop", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let backend = HttpBackend::new("https://api.example.com/v1/", None).unwrap();
        assert_eq!(backend.url("/rtc-token"), "https://api.example.com/v1/rtc-token");
        assert_eq!(backend.url("incidents/7"), "https://api.example.com/v1/incidents/7");
    }

    #[test]
    fn test_truncate_for_log() {
        let long = "x".repeat(MAX_LOGGED_BODY + 10);
        assert!(truncate_for_log(&long).ends_with("...[truncated]"));
        assert_eq!(truncate_for_log("short"), "short");
    }
}
