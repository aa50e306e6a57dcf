//! In-process item store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StoreError;

use super::{validate_id, ItemKind, ItemRecord, ItemStore, SaveOptions, StoredItem};

type Versions = BTreeMap<u64, StoredItem>;

/// [`ItemStore`] keeping everything in memory.
///
/// Contents are lost when the store is dropped. Useful for tests and for
/// running the service without a storage directory.
#[derive(Default)]
pub struct MemoryStore {
    items: RwLock<Option<HashMap<(ItemKind, String), Versions>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored versions across all items.
    pub async fn len(&self) -> usize {
        self.items
            .read()
            .await
            .as_ref()
            .map(|items| items.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        let mut items = self.items.write().await;
        if items.is_none() {
            *items = Some(HashMap::new());
            debug!("Memory store initialized");
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
        validate_id(id)?;

        let mut guard = self.items.write().await;
        let items = guard.as_mut().ok_or(StoreError::NotInitialized)?;
        let versions = items.entry((kind, id.to_string())).or_default();

        let existing = versions.remove(&version).map(|item| item.record);
        let created = existing.is_none();
        let record = ItemRecord::upsert(existing, kind, id, version, options);
        versions.insert(
            version,
            StoredItem {
                record: record.clone(),
                data,
            },
        );

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
        validate_id(id)?;

        let guard = self.items.read().await;
        let items = guard.as_ref().ok_or(StoreError::NotInitialized)?;
        let Some(versions) = items.get(&(kind, id.to_string())) else {
            return Ok(None);
        };

        let item = match version {
            Some(v) => versions.get(&v),
            None => versions.values().next_back(),
        };
        Ok(item.cloned())
    }
}
