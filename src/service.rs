//! Item ingestion service.
//!
//! The [`DeployService`] owns the deploy pipeline behind the HTTP API:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      DeployService                           │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                      deploy()                          │  │
//! │  │  1. Validate request    3. Normalize to a sequence     │  │
//! │  │  2. Fetch document      4. Re-encode   5. Store        │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │           │                    │                    │        │
//! │           ▼                    ▼                    ▼        │
//! │     ┌──────────┐      ┌────────────────┐     ┌───────────┐   │
//! │     │ Fetcher  │      │ codec (blocking│     │ ItemStore │   │
//! │     │          │      │   thread pool) │     │           │   │
//! │     └──────────┘      └────────────────┘     └───────────┘   │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::codec::EncodeOptions;
use crate::error::{CodecError, DeployError};
use crate::fetch::Fetcher;
use crate::orchestrator::{normalize_item, to_json_bytes};
use crate::store::{validate_id, ItemKind, ItemRecord, ItemStore, SaveOptions, StoredItem};

// =============================================================================
// Deploy Request
// =============================================================================

/// Body of a deploy request.
///
/// Every field is required; they are optional here so that a missing field
/// is reported as an invalid request rather than a parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeployRequest {
    /// Item identifier
    pub uuid: Option<String>,

    /// Location of the item document
    pub url: Option<String>,

    /// Item version, must be non-negative
    pub version: Option<i64>,

    /// Index of the master part; negative values are stored as 0
    pub master_idx: Option<i64>,
}

/// A deploy request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidDeploy {
    pub uuid: String,
    pub url: Url,
    pub version: u64,
    pub master_idx: i64,
}

impl DeployRequest {
    /// Check that every field is present and usable.
    pub fn validate(&self) -> Result<ValidDeploy, DeployError> {
        let uuid = required(&self.uuid, "uuid")?;
        let url = required(&self.url, "url")?;
        let version = *required(&self.version, "version")?;
        let master_idx = *required(&self.master_idx, "master_idx")?;

        validate_id(uuid).map_err(|e| DeployError::InvalidRequest(e.to_string()))?;

        let url = Url::parse(url)
            .map_err(|e| DeployError::InvalidRequest(format!("Invalid url {:?}: {}", url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DeployError::InvalidRequest(format!(
                "Unsupported url scheme: {}",
                url.scheme()
            )));
        }

        let version = u64::try_from(version).map_err(|_| {
            DeployError::InvalidRequest(format!("version must be non-negative, got {}", version))
        })?;

        Ok(ValidDeploy {
            uuid: uuid.clone(),
            url,
            version,
            master_idx: master_idx.max(0),
        })
    }
}

fn required<'a, T>(field: &'a Option<T>, name: &str) -> Result<&'a T, DeployError> {
    field
        .as_ref()
        .ok_or_else(|| DeployError::InvalidRequest(format!("Missing field: {}", name)))
}

// =============================================================================
// Deploy Service
// =============================================================================

/// Fetches, re-encodes and stores item documents.
///
/// # Type Parameters
///
/// * `F` - Upstream transport
/// * `S` - Item storage
pub struct DeployService<F: Fetcher, S: ItemStore> {
    fetcher: F,
    store: S,
    options: EncodeOptions,
}

impl<F: Fetcher, S: ItemStore> DeployService<F, S> {
    /// Create a service over an initialized store.
    pub fn new(fetcher: F, store: S, options: EncodeOptions) -> Self {
        Self {
            fetcher,
            store,
            options,
        }
    }

    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Ingest an outfit document.
    ///
    /// The document is downloaded, decoded, normalized to a sequence of item
    /// maps, re-encoded with the service options and stored as an outfit.
    pub async fn deploy(&self, request: &DeployRequest) -> Result<ItemRecord, DeployError> {
        let deploy = request.validate()?;
        debug!(
            uuid = %deploy.uuid,
            version = deploy.version,
            url = %deploy.url,
            "Deploy requested"
        );

        let raw = self.fetcher.fetch_json(deploy.url.as_str()).await?;

        let options = self.options.clone();
        let encoded = tokio::task::spawn_blocking(move || {
            let item = normalize_item(&raw)?;
            to_json_bytes(&item, &options)
        })
        .await
        .map_err(|e| CodecError::Encoder {
            stage: "worker",
            message: e.to_string(),
        })??;

        let record = self
            .store
            .save(
                ItemKind::Outfit,
                &deploy.uuid,
                deploy.version,
                encoded.into(),
                SaveOptions::with_master_idx(deploy.master_idx),
            )
            .await?;

        info!(
            uuid = %record.id,
            version = record.version,
            master_item_idx = ?record.master_item_idx,
            "Deployed outfit"
        );
        Ok(record)
    }

    /// Look up a stored item; a missing or negative version selects the latest.
    pub async fn item(
        &self,
        kind: ItemKind,
        id: &str,
        version: Option<i64>,
    ) -> Result<StoredItem, DeployError> {
        let version = version.and_then(|v| u64::try_from(v).ok());
        self.store
            .load(kind, id, version)
            .await?
            .ok_or_else(|| match version {
                Some(v) => DeployError::NotFound(format!("{} {} v{}", kind, id, v)),
                None => DeployError::NotFound(format!("{} {}", kind, id)),
            })
    }
}
