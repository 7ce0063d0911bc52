use std::path::{Path, PathBuf};

/// Get the base storage directory.
/// Returns `$SAFECAST_DATA_DIR` when set, otherwise `{data_dir}/safecast`
/// (`~/.local/share/safecast` on Linux).
pub fn get_storage_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SAFECAST_DATA_DIR") {
        return PathBuf::from(dir);
    }

    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("safecast")
}

/// Get the logs directory path.
/// Returns `{storage_dir}/logs`.
pub fn get_log_dir() -> PathBuf {
    get_storage_dir().join("logs")
}

/// Private recordings directory. Files here are only visible to the app.
/// Returns `{storage_dir}/recordings`.
pub fn get_recordings_dir() -> PathBuf {
    get_storage_dir().join("recordings")
}

/// Persistent media store root used by the filesystem media store.
/// Returns `{storage_dir}/media`.
pub fn get_media_dir() -> PathBuf {
    get_storage_dir().join("media")
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_dir_structure() {
        let logs = get_log_dir();
        assert!(logs.ends_with("logs"));

        let recordings = get_recordings_dir();
        assert!(recordings.ends_with("recordings"));

        let media = get_media_dir();
        assert!(media.ends_with("media"));
        assert_eq!(media.parent(), Some(get_storage_dir().as_path()));
    }

    #[test]
    fn test_ensure_dir_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");

        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());

        // second call is a no-op
        ensure_dir(&nested).unwrap();
    }
}
