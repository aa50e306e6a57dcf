//! Test utilities for integration tests.
//!
//! Provides a mock upstream fetcher, synthetic arrays and router helpers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use bytes::Bytes;
use tokio::sync::RwLock;

use treepack::fetch::check_document;
use treepack::{
    create_router, to_json_bytes, DeployService, EncodeOptions, FetchError, Fetcher, Map,
    MemoryStore, NdArray, RouterConfig, Value,
};

// =============================================================================
// Mock Fetcher
// =============================================================================

/// A fetcher that serves pre-configured documents by URL.
pub struct MockFetcher {
    documents: HashMap<String, Bytes>,
    failures: HashMap<String, FetchError>,
    request_counts: Arc<RwLock<HashMap<String, usize>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            documents: HashMap::new(),
            failures: HashMap::new(),
            request_counts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_document(mut self, url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        self.documents.insert(url.into(), body.into());
        self
    }

    pub fn with_failure(mut self, url: impl Into<String>, err: FetchError) -> Self {
        self.failures.insert(url.into(), err);
        self
    }

    /// Shared handle to the per-URL request counters.
    pub fn request_counts(&self) -> Arc<RwLock<HashMap<String, usize>>> {
        Arc::clone(&self.request_counts)
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch_json(&self, url: &str) -> Result<Bytes, FetchError> {
        {
            let mut counts = self.request_counts.write().await;
            *counts.entry(url.to_string()).or_insert(0) += 1;
        }

        if let Some(err) = self.failures.get(url) {
            return Err(err.clone());
        }
        match self.documents.get(url) {
            Some(body) => {
                check_document(url, body)?;
                Ok(body.clone())
            }
            None => Err(FetchError::Unreachable(format!("{}: HTTP 404", url))),
        }
    }
}

// =============================================================================
// Synthetic Arrays
// =============================================================================

/// Smooth `u8` gradient of shape `(h, w, c)`; each channel has its own slope.
pub fn gradient(h: usize, w: usize, c: usize) -> NdArray {
    let mut data = Vec::with_capacity(h * w * c);
    for y in 0..h {
        for x in 0..w {
            for ch in 0..c {
                let slope = (ch + 1) as f64;
                let t = (x as f64 * slope + y as f64) / (w as f64 * slope + h as f64);
                data.push((30.0 + t * 190.0).round() as u8);
            }
        }
    }
    NdArray::from_u8(vec![h, w, c], data).unwrap()
}

/// Smooth `f64` gradient in `[0, 1]` of shape `(h, w, c)`.
pub fn unit_gradient(h: usize, w: usize, c: usize) -> NdArray {
    let mut values = Vec::with_capacity(h * w * c);
    let span = (h + w) as f64;
    for y in 0..h {
        for x in 0..w {
            for ch in 0..c {
                let base = (x + y) as f64 / span;
                values.push((base + ch as f64 * 0.1).min(1.0));
            }
        }
    }
    NdArray::from_f64(vec![h, w, c], &values).unwrap()
}

/// Mean absolute difference between two arrays of the same element count.
pub fn mean_abs_diff(a: &NdArray, b: &NdArray) -> f64 {
    let a = a.to_f64_vec();
    let b = b.to_f64_vec();
    assert_eq!(a.len(), b.len(), "arrays differ in length");
    let total: f64 = a.iter().zip(&b).map(|(x, y)| (x - y).abs()).sum();
    total / a.len() as f64
}

// =============================================================================
// Documents and Routers
// =============================================================================

/// A small encoded item document (a single item map).
pub fn item_document() -> Vec<u8> {
    let item = Value::Map(
        Map::new()
            .with("name", "jacket")
            .with(0, NdArray::from_u8(vec![2, 2], vec![1, 2, 3, 4]).unwrap()),
    );
    to_json_bytes(&item, &EncodeOptions::default()).unwrap()
}

/// Router over an in-memory store with the service default options.
pub async fn test_router(fetcher: MockFetcher) -> Router {
    test_router_with(fetcher, EncodeOptions::default().with_image_path()).await
}

pub async fn test_router_with(fetcher: MockFetcher, options: EncodeOptions) -> Router {
    let store = MemoryStore::new();
    treepack::ItemStore::initialize(&store).await.unwrap();
    let service = DeployService::new(fetcher, store, options);
    create_router(service, RouterConfig::new().with_tracing(false))
}
