use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

use chrono::Utc;

use super::super::types::{IncidentId, PublisherRole, RecorderContainer, StreamMode};

static LAST_PLACEHOLDER_MS: AtomicI64 = AtomicI64::new(0);
static FILE_SEQUENCE: AtomicU32 = AtomicU32::new(0);

/// Current wall-clock millis, bumped so that consecutive calls never repeat.
fn monotonic_millis(last: &AtomicI64) -> i64 {
    let now = Utc::now().timestamp_millis();
    let mut prev = last.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev + 1);
        match last.compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(actual) => prev = actual,
        }
    }
}

/// `local_<millis>`, unique within the process.
pub fn placeholder_incident_id() -> IncidentId {
    IncidentId::Placeholder(format!("local_{}", monotonic_millis(&LAST_PLACEHOLDER_MS)))
}

pub fn is_placeholder_format(value: &str) -> bool {
    value
        .strip_prefix("local_")
        .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
}

/// Numeric tag shared by the recorders of one session: seconds plus a rolling sequence.
pub fn next_file_tag() -> String {
    let seq = FILE_SEQUENCE.fetch_add(1, Ordering::Relaxed) % 10_000;
    format!("{}{:04}", Utc::now().timestamp(), seq)
}

/// `<tag>-<incident>-<MODE>[-front].<ext>`
pub fn recording_file_name(
    tag: &str,
    incident: &IncidentId,
    mode: StreamMode,
    role: PublisherRole,
    container: RecorderContainer,
) -> String {
    let suffix = match role {
        PublisherRole::Primary => "",
        PublisherRole::Secondary => "-front",
    };
    format!(
        "{}-{}-{}{}.{}",
        tag,
        incident.as_str(),
        mode.file_tag(),
        suffix,
        container.extension()
    )
}

pub fn recording_path(
    dir: &Path,
    tag: &str,
    incident: &IncidentId,
    mode: StreamMode,
    role: PublisherRole,
) -> PathBuf {
    dir.join(recording_file_name(tag, incident, mode, role, RecorderContainer::Mp4))
}
