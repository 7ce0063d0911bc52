//! Request and response bodies of the backend REST surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::super::types::{MediaLinks, RecordingType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenRole {
    Publisher,
    Subscriber,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenRequest {
    pub uid: u32,
    pub channel_name: String,
    pub role: TokenRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateIncidentRequest {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub user: Option<String>,
    pub device_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateIncidentResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

/// Partial incident update. Absent fields are left untouched server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateIncidentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_type: Option<RecordingType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalized: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateIncidentResponse {
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamMessageRequest {
    pub stream_token: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "type")]
    pub kind: RecordingType,
    pub incident_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecipientResult {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamMessageResponse {
    #[serde(default)]
    pub results: Vec<RecipientResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartRecordingRequest {
    pub channel_name: String,
    pub recorder_uid: u32,
    pub token: String,
    pub incident_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartRecordingResponse {
    #[serde(rename = "resourceId")]
    pub resource_id: String,
    pub sid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopRecordingRequest {
    pub channel_name: String,
    pub recorder_uid: u32,
    pub resource_id: String,
    pub sid: String,
    pub incident_id: String,
    pub recording_type: RecordingType,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StopRecordingResponse {
    #[serde(default)]
    pub incident_updated: Option<MediaLinks>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

/// Incident ids come back as numbers from some deployments and strings from others.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    RawId::deserialize(deserializer).map(String::from)
}

fn optional_string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Option::<RawId>::deserialize(deserializer).map(|raw| raw.map(String::from))
}
