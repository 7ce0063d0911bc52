use crate::shared::paths::{ensure_dir, get_storage_dir};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Whether incidents and recordings are delivered to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CloudDelivery {
    /// Nothing is sent to the incident or cloud recording endpoints.
    Disabled,
    /// Incident creation is attempted; failure degrades to a local placeholder id.
    #[default]
    BestEffort,
    /// Incident creation failure aborts the start sequence.
    Required,
}

impl CloudDelivery {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, CloudDelivery::Disabled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedContact {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BroadcastSettings {
    pub backend_url: String,
    pub api_key: Option<String>,
    pub app_id: String,
    pub channel_id: String,
    pub local_uid: u32,
    pub secondary_uid: u32,
    pub recorder_uid: u32,
    pub cloud_delivery: CloudDelivery,
    pub bypass_recipient_check: bool,
    pub trusted_contacts: Vec<TrustedContact>,
    pub user_id: Option<String>,
    pub device_token: Option<String>,
    pub token_timeout_secs: u64,
    pub incident_timeout_secs: u64,
    pub cloud_timeout_secs: u64,
    pub join_timeout_secs: u64,
    pub max_session_secs: u64,
    pub max_zoom: f32,
    pub album: String,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8000/api".to_string(),
            api_key: None,
            app_id: String::new(),
            channel_id: "safecast".to_string(),
            local_uid: 1,
            secondary_uid: 2,
            recorder_uid: 999,
            cloud_delivery: CloudDelivery::BestEffort,
            bypass_recipient_check: false,
            trusted_contacts: Vec::new(),
            user_id: None,
            device_token: None,
            token_timeout_secs: 15,
            incident_timeout_secs: 15,
            cloud_timeout_secs: 15,
            join_timeout_secs: 10,
            max_session_secs: 60 * 60,
            max_zoom: 8.0,
            album: "SafeCast".to_string(),
        }
    }
}

impl BroadcastSettings {
    pub fn token_timeout(&self) -> Duration {
        Duration::from_secs(self.token_timeout_secs)
    }

    pub fn incident_timeout(&self) -> Duration {
        Duration::from_secs(self.incident_timeout_secs)
    }

    /// Bound on cloud recording start and stop requests.
    pub fn cloud_timeout(&self) -> Duration {
        Duration::from_secs(self.cloud_timeout_secs)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }

    /// Zero disables the limit.
    pub fn max_session(&self) -> Option<Duration> {
        (self.max_session_secs > 0).then(|| Duration::from_secs(self.max_session_secs))
    }

    pub fn has_recipients(&self) -> bool {
        self.bypass_recipient_check || !self.trusted_contacts.is_empty()
    }

    fn apply_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("SAFECAST_BACKEND_URL") {
            self.backend_url = url;
        }
        if let Ok(key) = std::env::var("SAFECAST_API_KEY") {
            self.api_key = Some(key);
        }
        self
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse settings: {0}")]
    ParseError(#[from] serde_json::Error),
}

fn get_settings_path() -> PathBuf {
    get_storage_dir().join("settings.json")
}

/// Loads settings from the storage dir. Missing or unreadable files fall back to defaults.
pub fn load_settings() -> BroadcastSettings {
    let path = get_settings_path();

    let settings = if path.exists() {
        load_settings_from_file(&path).unwrap_or_else(|e| {
            tracing::warn!(target: "system", "Ignoring unreadable settings at {:?}: {}", path, e);
            BroadcastSettings::default()
        })
    } else {
        BroadcastSettings::default()
    };

    settings.apply_env_overrides()
}

pub fn load_settings_from_file(path: &Path) -> Result<BroadcastSettings, SettingsError> {
    let contents = std::fs::read_to_string(path)?;
    let settings = serde_json::from_str(&contents)?;
    Ok(settings)
}

pub fn save_settings(settings: &BroadcastSettings) -> Result<(), SettingsError> {
    ensure_dir(&get_storage_dir())?;
    save_settings_to_file(settings, &get_settings_path())
}

pub fn save_settings_to_file(settings: &BroadcastSettings, path: &Path) -> Result<(), SettingsError> {
    let contents = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults_for_missing_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, r#"{"channelId":"room-7","cloudDelivery":"disabled"}"#).unwrap();

        let settings = load_settings_from_file(&path).unwrap();
        assert_eq!(settings.channel_id, "room-7");
        assert_eq!(settings.cloud_delivery, CloudDelivery::Disabled);
        assert_eq!(settings.token_timeout(), Duration::from_secs(15));
        assert_eq!(settings.secondary_uid, 2);
    }

    #[test]
    fn test_save_and_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.json");

        let mut settings = BroadcastSettings::default();
        settings.trusted_contacts.push(TrustedContact {
            name: "Sam".to_string(),
            phone: "+15550100".to_string(),
        });
        save_settings_to_file(&settings, &path).unwrap();

        let loaded = load_settings_from_file(&path).unwrap();
        assert_eq!(loaded, settings);
        assert!(loaded.has_recipients());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            load_settings_from_file(&path),
            Err(SettingsError::ParseError(_))
        ));
    }

    #[test]
    fn test_recipient_check() {
        let mut settings = BroadcastSettings::default();
        assert!(!settings.has_recipients());

        settings.bypass_recipient_check = true;
        assert!(settings.has_recipients());
    }

    #[test]
    fn test_zero_max_session_disables_limit() {
        let settings = BroadcastSettings {
            max_session_secs: 0,
            ..Default::default()
        };
        assert_eq!(settings.max_session(), None);
    }
}
