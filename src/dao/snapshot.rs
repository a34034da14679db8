use std::{
    ffi::OsString,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tokio::{fs, io::AsyncWriteExt};

use super::{
    models::{SNAPSHOT_VERSION, SnapshotDocument},
    storage::{StorageError, StorageResult},
};

/// Snapshot of the room registry stored as a single JSON file.
///
/// Writes go to a sibling temporary file which is synced and then renamed over the previous
/// snapshot, so a crash mid-write leaves the last good snapshot in place.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    /// Snapshot stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the snapshot.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot. A missing file yields `Ok(None)`; anything unreadable is an error.
    pub async fn load(&self) -> StorageResult<Option<SnapshotDocument>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let document: SnapshotDocument =
            serde_json::from_slice(&bytes).map_err(|source| StorageError::Decode {
                path: self.path.clone(),
                source,
            })?;
        if document.version != SNAPSHOT_VERSION {
            return Err(StorageError::UnsupportedVersion {
                path: self.path.clone(),
                version: document.version,
            });
        }
        Ok(Some(document))
    }

    /// Replace the snapshot with `document`.
    pub async fn save(&self, document: &SnapshotDocument) -> StorageResult<()> {
        let bytes = serde_json::to_vec(document).map_err(StorageError::Encode)?;
        let temp_path = self.temp_path();
        let write_err = |source| StorageError::Write {
            path: temp_path.clone(),
            source,
        };

        let mut file = fs::File::create(&temp_path).await.map_err(write_err)?;
        file.write_all(&bytes).await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        drop(file);

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|source| StorageError::Write {
                path: self.path.clone(),
                source,
            })?;
        self.sync_parent_dir().await
    }

    /// Persist the rename itself: the directory entry lives in the parent directory.
    #[cfg(unix)]
    async fn sync_parent_dir(&self) -> StorageResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let sync_err = |source| StorageError::Write {
            path: dir.clone(),
            source,
        };
        let handle = fs::File::open(&dir).await.map_err(sync_err)?;
        handle.sync_all().await.map_err(sync_err)
    }

    #[cfg(not(unix))]
    async fn sync_parent_dir(&self) -> StorageResult<()> {
        Ok(())
    }

    pub(crate) fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("rooms"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
