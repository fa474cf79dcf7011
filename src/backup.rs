//! Backup content store for encoded-link images.
//!
//! Write-only from the renderer's point of view. Failures are reported to
//! the encoder, which logs them and carries on.

use chrono::Utc;
use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::encoder::Variant;
use crate::error::{RenderError, RenderResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupKey {
    pub variant: Variant,
    pub identifier: String,
    pub timestamp_ms: i64,
}

impl BackupKey {
    pub fn now(variant: Variant, identifier: &str) -> Self {
        Self {
            variant,
            identifier: identifier.to_string(),
            timestamp_ms: Utc::now().timestamp_millis(),
        }
    }
}

impl fmt::Display for BackupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.variant, self.identifier, self.timestamp_ms)
    }
}

pub trait BackupStore: Send + Sync {
    fn put(&self, key: &BackupKey, bytes: &[u8]) -> RenderResult<()>;
}

/// Stores images as `<root>/<identifier>/<variant>-<millis>.png`.
pub struct FsBackupStore {
    root: PathBuf,
}

impl FsBackupStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The identifier must be exactly one normal path component, so every
    /// write lands inside `root`.
    pub fn path_for(&self, key: &BackupKey) -> RenderResult<PathBuf> {
        let mut components = Path::new(&key.identifier).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(dir)), None) if dir == OsStr::new(&key.identifier) => Ok(self
                .root
                .join(dir)
                .join(format!("{}-{}.png", key.variant, key.timestamp_ms))),
            _ => Err(RenderError::PersistenceFailed(format!(
                "identifier '{}' is not a single path component",
                key.identifier
            ))),
        }
    }
}

impl BackupStore for FsBackupStore {
    fn put(&self, key: &BackupKey, bytes: &[u8]) -> RenderResult<()> {
        let path = self.path_for(key)?;
        let persist = || -> std::io::Result<()> {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            fs::write(&path, bytes)
        };
        persist().map_err(|e| RenderError::PersistenceFailed(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_under_identifier_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBackupStore::new(dir.path());
        let key = BackupKey { variant: Variant::Small, identifier: "jane".into(), timestamp_ms: 42 };

        store.put(&key, b"png").unwrap();

        let written = std::fs::read(dir.path().join("jane").join("small-42.png")).unwrap();
        assert_eq!(written, b"png");
        assert_eq!(key.to_string(), "small-jane-42");
    }

    #[test]
    fn identifiers_cannot_escape_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("backups");
        let store = FsBackupStore::new(&root);

        for identifier in ["..", ".", "", "a/b", "../jane", "/etc"] {
            let key = BackupKey { variant: Variant::Standard, identifier: identifier.into(), timestamp_ms: 1 };
            let err = store.put(&key, b"png").unwrap_err();
            assert!(matches!(err, RenderError::PersistenceFailed(_)), "{:?}", identifier);
        }
        assert!(!dir.path().join("standard-1.png").exists());

        let key = BackupKey { variant: Variant::Standard, identifier: "jane.doe".into(), timestamp_ms: 1 };
        assert!(store.path_for(&key).unwrap().starts_with(&root));
    }

    #[test]
    fn unwritable_root_is_persistence_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let store = FsBackupStore::new(&blocker);

        let err = store.put(&BackupKey::now(Variant::Standard, "jane"), b"png").unwrap_err();
        assert!(matches!(err, RenderError::PersistenceFailed(_)));
        assert!(!err.is_fatal());
    }
}
