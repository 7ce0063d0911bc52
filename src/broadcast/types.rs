use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Capture mode chosen before a session starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum StreamMode {
    Audio,
    #[default]
    Video,
}

impl StreamMode {
    /// Tag used in recording file names.
    pub fn file_tag(&self) -> &'static str {
        match self {
            StreamMode::Audio => "AUDIO",
            StreamMode::Video => "VIDEO",
        }
    }

    pub fn recording_type(&self) -> RecordingType {
        match self {
            StreamMode::Audio => RecordingType::Audio,
            StreamMode::Video => RecordingType::Video,
        }
    }

    pub fn uses_secondary(&self) -> bool {
        matches!(self, StreamMode::Video)
    }
}

/// Classification sent to the backend when a recording ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingType {
    Audio,
    Video,
}

impl RecordingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingType::Audio => "audio",
            RecordingType::Video => "video",
        }
    }
}

/// Which camera source a publisher represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublisherRole {
    Primary,
    Secondary,
}

/// A (channel, uid) pair a recorder or a join is bound to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublisherBinding {
    pub channel: String,
    pub uid: u32,
    pub role: PublisherRole,
}

impl PublisherBinding {
    pub fn primary(channel: impl Into<String>, uid: u32) -> Self {
        Self {
            channel: channel.into(),
            uid,
            role: PublisherRole::Primary,
        }
    }

    pub fn secondary(channel: impl Into<String>, uid: u32) -> Self {
        Self {
            channel: channel.into(),
            uid,
            role: PublisherRole::Secondary,
        }
    }
}

impl fmt::Display for PublisherBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({:?})", self.channel, self.uid, self.role)
    }
}

/// Stream kinds a local recorder can capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    AudioOnly,
    VideoOnly,
    AudioAndVideo,
}

impl StreamKind {
    /// AUDIO records audio-only everywhere. VIDEO records both on the primary
    /// binding and video-only on the secondary, whose microphone is muted.
    pub fn for_binding(mode: StreamMode, role: PublisherRole) -> Self {
        match (mode, role) {
            (StreamMode::Audio, _) => StreamKind::AudioOnly,
            (StreamMode::Video, PublisherRole::Primary) => StreamKind::AudioAndVideo,
            (StreamMode::Video, PublisherRole::Secondary) => StreamKind::VideoOnly,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecorderContainer {
    #[default]
    Mp4,
}

impl RecorderContainer {
    pub fn extension(&self) -> &'static str {
        match self {
            RecorderContainer::Mp4 => "mp4",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CameraDirection {
    #[default]
    Rear,
    Front,
}

impl CameraDirection {
    pub fn flipped(&self) -> Self {
        match self {
            CameraDirection::Rear => CameraDirection::Front,
            CameraDirection::Front => CameraDirection::Rear,
        }
    }
}

/// Incident identifier. Placeholders are generated locally and never leave the device.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum IncidentId {
    Backend(String),
    Placeholder(String),
}

impl IncidentId {
    pub fn as_str(&self) -> &str {
        match self {
            IncidentId::Backend(id) | IncidentId::Placeholder(id) => id,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, IncidentId::Placeholder(_))
    }

    /// The backend id, if this is not a placeholder.
    pub fn backend_id(&self) -> Option<&str> {
        match self {
            IncidentId::Backend(id) => Some(id),
            IncidentId::Placeholder(_) => None,
        }
    }
}

impl fmt::Display for IncidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationSnapshot {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtcToken {
    pub value: String,
    pub issued_at: chrono::DateTime<chrono::Utc>,
}

/// Local file destinations. Each path is assigned once at record start.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingPaths {
    pub primary: Option<PathBuf>,
    pub secondary: Option<PathBuf>,
}

impl RecordingPaths {
    pub fn all(&self) -> Vec<PathBuf> {
        self.primary.iter().chain(self.secondary.iter()).cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.primary.is_some() as usize + self.secondary.is_some() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

/// Backend-managed cloud recording resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudResource {
    pub resource_id: String,
    pub sid: String,
}

/// Media links attached to an incident after the cloud recording stopped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

impl MediaLinks {
    pub fn is_empty(&self) -> bool {
        self.video_url.is_none() && self.audio_url.is_none()
    }
}

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    UserRequested,
    RecorderFailure,
    TimeLimit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_kind_selection() {
        use PublisherRole::*;
        assert_eq!(StreamKind::for_binding(StreamMode::Audio, Primary), StreamKind::AudioOnly);
        assert_eq!(StreamKind::for_binding(StreamMode::Audio, Secondary), StreamKind::AudioOnly);
        assert_eq!(StreamKind::for_binding(StreamMode::Video, Primary), StreamKind::AudioAndVideo);
        assert_eq!(StreamKind::for_binding(StreamMode::Video, Secondary), StreamKind::VideoOnly);
    }

    #[test]
    fn test_incident_id_helpers() {
        let backend = IncidentId::Backend("42".to_string());
        let local = IncidentId::Placeholder("local_17".to_string());

        assert_eq!(backend.backend_id(), Some("42"));
        assert_eq!(local.backend_id(), None);
        assert!(local.is_placeholder());
        assert_eq!(local.to_string(), "local_17");
    }

    #[test]
    fn test_recording_paths_count() {
        let mut paths = RecordingPaths::default();
        assert!(paths.is_empty());

        paths.primary = Some(PathBuf::from("/tmp/a.mp4"));
        paths.secondary = Some(PathBuf::from("/tmp/b.mp4"));
        assert_eq!(paths.count(), 2);
        assert_eq!(paths.all().len(), 2);
    }

    #[test]
    fn test_recording_type_wire_name() {
        assert_eq!(StreamMode::Video.recording_type().as_str(), "video");
        assert_eq!(
            serde_json::to_string(&RecordingType::Audio).unwrap(),
            "\"audio\""
        );
    }
}
