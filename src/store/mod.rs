//! Versioned item storage.
//!
//! Encoded item documents are stored per kind, identifier and version. Each
//! version has a record (metadata) and a blob (the encoded JSON document).
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                   ItemStore (trait)                    │
//! │   initialize()   save(kind, id, version, blob, opts)   │
//! │                  load(kind, id, version | latest)      │
//! └──────────────┬─────────────────────────┬───────────────┘
//!                │                         │
//!                ▼                         ▼
//!        ┌──────────────┐          ┌──────────────────────┐
//!        │ MemoryStore  │          │ FsStore              │
//!        │ (RwLock map) │          │ <root>/<kind>s/<id>/ │
//!        └──────────────┘          └──────────────────────┘
//! ```
//!
//! Stores are constructed explicitly and handed to the service; there is no
//! process-wide instance. Both require [`ItemStore::initialize`] before use.

mod fs;
mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Longest accepted item identifier.
pub const MAX_ID_LEN: usize = 128;

// =============================================================================
// Item Kind
// =============================================================================

/// Category of a stored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Avatar,
    Outfit,
}

impl ItemKind {
    pub const ALL: [ItemKind; 2] = [ItemKind::Avatar, ItemKind::Outfit];

    pub const fn name(self) -> &'static str {
        match self {
            ItemKind::Avatar => "avatar",
            ItemKind::Outfit => "outfit",
        }
    }

    /// Name of the collection (directory) holding items of this kind.
    pub const fn collection(self) -> &'static str {
        match self {
            ItemKind::Avatar => "avatars",
            ItemKind::Outfit => "outfits",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ItemKind {
    type Err = StoreError;

    /// Accepts the singular or collection name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avatar" | "avatars" => Ok(ItemKind::Avatar),
            "outfit" | "outfits" => Ok(ItemKind::Outfit),
            _ => Err(StoreError::UnknownKind(s.to_string())),
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// Options for [`ItemStore::save`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Index of the master part of a multi-part item
    pub master_item_idx: Option<i64>,
}

impl SaveOptions {
    pub fn with_master_idx(idx: i64) -> Self {
        Self {
            master_item_idx: Some(idx),
        }
    }
}

/// Metadata stored alongside each item version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub kind: ItemKind,
    pub id: String,
    pub version: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_item_idx: Option<i64>,

    /// Creation time in seconds since the Unix epoch
    pub created_at: u64,

    /// Time of the last blob replacement in seconds since the Unix epoch
    pub updated_at: u64,
}

impl ItemRecord {
    /// Record for a version that does not exist yet.
    ///
    /// Outfits default to master index 0; avatars carry none unless given.
    pub fn new(kind: ItemKind, id: &str, version: u64, options: SaveOptions) -> Self {
        let master_item_idx = match (kind, options.master_item_idx) {
            (_, Some(idx)) => Some(idx),
            (ItemKind::Outfit, None) => Some(0),
            (ItemKind::Avatar, None) => None,
        };
        let now = unix_now();
        Self {
            kind,
            id: id.to_string(),
            version,
            master_item_idx,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a save to an existing record.
    ///
    /// The master index only changes when a different one is supplied.
    pub fn update(&mut self, options: SaveOptions) {
        if let Some(idx) = options.master_item_idx {
            if self.master_item_idx != Some(idx) {
                self.master_item_idx = Some(idx);
            }
        }
        self.updated_at = unix_now();
    }

    /// Create or update a record for a save.
    pub fn upsert(
        existing: Option<ItemRecord>,
        kind: ItemKind,
        id: &str,
        version: u64,
        options: SaveOptions,
    ) -> Self {
        match existing {
            Some(mut record) => {
                record.update(options);
                record
            }
            None => ItemRecord::new(kind, id, version, options),
        }
    }
}

/// A stored version: its record plus the encoded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredItem {
    pub record: ItemRecord,
    pub data: Bytes,
}

// =============================================================================
// ItemStore Trait
// =============================================================================

/// Persistent, versioned storage of encoded item documents.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Prepare the backing storage. Safe to call more than once.
    async fn initialize(&self) -> Result<(), StoreError>;

    /// Store `data` as `version` of item `id`, creating or updating its record.
    async fn save(
        &self,
        kind: ItemKind,
        id: &str,
        version: u64,
        data: Bytes,
        options: SaveOptions,
    ) -> Result<ItemRecord, StoreError>;

    /// Load a version of item `id`; `None` selects the highest version.
    async fn load(
        &self,
        kind: ItemKind,
        id: &str,
        version: Option<u64>,
    ) -> Result<Option<StoredItem>, StoreError>;
}

/// Check that an identifier is usable as a storage key.
///
/// Identifiers are 1 to [`MAX_ID_LEN`] characters of ASCII letters, digits,
/// `-`, `_` and `.`, and may not start with `.`.
pub fn validate_id(id: &str) -> Result<(), StoreError> {
    let valid = !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && !id.starts_with('.')
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidId(id.to_string()))
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
