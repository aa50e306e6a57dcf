//! Directory-backed item store.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/
//!   avatars/
//!   outfits/
//!     <id>/
//!       <version>.json        encoded item document
//!       <version>.meta.json   ItemRecord
//! ```
//!
//! Files are written to a temporary file in the same directory and then
//! renamed into place, so readers never see a partial blob or record. Both
//! files of a version are staged before either is renamed, and a blob is
//! only left in place once its record is.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::{NamedTempFile, TempPath};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::StoreError;

use super::{validate_id, ItemKind, ItemRecord, ItemStore, SaveOptions, StoredItem};

const BLOB_SUFFIX: &str = ".json";
const RECORD_SUFFIX: &str = ".meta.json";

/// [`ItemStore`] persisting items as files under a root directory.
pub struct FsStore {
    root: PathBuf,
    initialized: AtomicBool,

    /// Serializes read-modify-write of records
    write_lock: Mutex<()>,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            initialized: AtomicBool::new(false),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn item_dir(&self, kind: ItemKind, id: &str) -> PathBuf {
        self.root.join(kind.collection()).join(id)
    }

    fn ensure_initialized(&self) -> Result<(), StoreError> {
        if self.initialized.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    async fn read_record(
        &self,
        dir: &Path,
        id: &str,
        version: u64,
    ) -> Result<Option<ItemRecord>, StoreError> {
        let path = dir.join(format!("{}{}", version, RECORD_SUFFIX));
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unavailable(&path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::CorruptRecord {
                id: id.to_string(),
                version,
                message: e.to_string(),
            })
    }

    async fn latest_version(&self, dir: &Path) -> Result<Option<u64>, StoreError> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unavailable(dir, e)),
        };

        let mut latest = None;
        while let Some(entry) = entries.next_entry().await.map_err(|e| unavailable(dir, e))? {
            let name = entry.file_name();
            let version = name
                .to_str()
                .and_then(|n| n.strip_suffix(RECORD_SUFFIX))
                .and_then(|v| v.parse::<u64>().ok());
            if let Some(v) = version {
                latest = latest.max(Some(v));
            }
        }
        Ok(latest)
    }
}

#[async_trait]
impl ItemStore for FsStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        for kind in ItemKind::ALL {
            let dir = self.root.join(kind.collection());
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| unavailable(&dir, e))?;
        }
        if !self.initialized.swap(true, Ordering::AcqRel) {
            info!(root = %self.root.display(), "File store initialized");
        }
        Ok(())
    }

    async fn save(
        &self,
        kind: ItemKind,
        id: &str,
        version: u64,
        data: Bytes,
        options: SaveOptions,
    ) -> Result<ItemRecord, StoreError> {
        self.ensure_initialized()?;
        validate_id(id)?;

        let _guard = self.write_lock.lock().await;

        let dir = self.item_dir(kind, id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| unavailable(&dir, e))?;

        let existing = self.read_record(&dir, id, version).await?;
        let created = existing.is_none();
        let record = ItemRecord::upsert(existing, kind, id, version, options);
        let meta = serde_json::to_vec_pretty(&record)
            .map_err(|e| StoreError::Unavailable(format!("serialize record: {}", e)))?;

        let blob_path = dir.join(format!("{}{}", version, BLOB_SUFFIX));
        let record_path = dir.join(format!("{}{}", version, RECORD_SUFFIX));
        tokio::task::spawn_blocking(move || {
            commit_version(&blob_path, &data, &record_path, &meta)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("write task: {}", e)))??;

        debug!(
            kind = %kind,
            id = id,
            version = version,
            created = created,
            "Saved item"
        );
        Ok(record)
    }

    async fn load(
        &self,
        kind: ItemKind,
        id: &str,
        version: Option<u64>,
    ) -> Result<Option<StoredItem>, StoreError> {
        self.ensure_initialized()?;
        validate_id(id)?;

        let dir = self.item_dir(kind, id);
        let version = match version {
            Some(v) => v,
            None => match self.latest_version(&dir).await? {
                Some(v) => v,
                None => return Ok(None),
            },
        };

        let Some(record) = self.read_record(&dir, id, version).await? else {
            return Ok(None);
        };

        let blob_path = dir.join(format!("{}{}", version, BLOB_SUFFIX));
        let data = match tokio::fs::read(&blob_path).await {
            Ok(data) => Bytes::from(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::CorruptRecord {
                    id: id.to_string(),
                    version,
                    message: "blob is missing".to_string(),
                })
            }
            Err(e) => return Err(unavailable(&blob_path, e)),
        };

        Ok(Some(StoredItem { record, data }))
    }
}

/// Replace the blob and record of one version.
///
/// If the record cannot be put in place, the previous blob is restored, or
/// removed when there was none.
fn commit_version(
    blob_path: &Path,
    blob: &[u8],
    record_path: &Path,
    record: &[u8],
) -> Result<(), StoreError> {
    let staged_blob = stage(blob_path, blob)?;
    let staged_record = stage(record_path, record)?;
    let previous = back_up(blob_path)?;

    staged_blob
        .persist(blob_path)
        .map_err(|e| unavailable(blob_path, e.error))?;

    if let Err(e) = staged_record.persist(record_path) {
        let restored = match previous {
            Some(backup) => backup.persist(blob_path).map_err(|e| e.error),
            None => std::fs::remove_file(blob_path),
        };
        if let Err(restore_err) = restored {
            warn!(
                path = %blob_path.display(),
                error = %restore_err,
                "Failed to roll back blob"
            );
        }
        return Err(unavailable(record_path, e.error));
    }
    Ok(())
}

/// Write `bytes` to a synced temporary file next to `path`.
fn stage(path: &Path, bytes: &[u8]) -> Result<NamedTempFile, StoreError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut file = NamedTempFile::new_in(dir).map_err(|e| unavailable(dir, e))?;
    file.write_all(bytes).map_err(|e| unavailable(path, e))?;
    file.as_file_mut()
        .sync_all()
        .map_err(|e| unavailable(path, e))?;
    Ok(file)
}

/// Copy an existing file aside; the copy is deleted when dropped.
fn back_up(path: &Path) -> Result<Option<TempPath>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let backup = NamedTempFile::new_in(dir)
        .map_err(|e| unavailable(dir, e))?
        .into_temp_path();
    std::fs::copy(path, &backup).map_err(|e| unavailable(path, e))?;
    Ok(Some(backup))
}

fn unavailable(path: &Path, err: io::Error) -> StoreError {
    StoreError::Unavailable(format!("{}: {}", path.display(), err))
}
