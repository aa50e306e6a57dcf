//! # treepack
//!
//! A self-describing JSON codec for trees of maps, sequences, scalars,
//! numeric arrays and images, plus a small service that ingests item
//! documents in that format.
//!
//! The encoded form is plain JSON: every map member name carries a
//! `<key>|<key-kind>|<value-kind>` tag, numeric arrays become base64 text of
//! a compressed `.npy` blob, and large pixel arrays can be routed through a
//! still-image codec. Decoding reads the tags back and restores the original
//! kinds, including integer map keys.
//!
//! ## Features
//!
//! - **Self-describing**: no schema needed to decode; tags say how each value was stored
//! - **Compression**: zlib, lz4 (frame) and zstd for array payloads
//! - **Image path**: large `(h, w[, c])` arrays stored as PNG or JPEG plus a lossless remainder
//! - **Legacy tags**: documents written by earlier producers still decode
//! - **Item service**: HTTP endpoint that fetches, re-encodes and stores item documents
//!
//! ## Architecture
//!
//! - [`value`] - In-memory value tree
//! - [`codec`] - Tag grammar, array and image codecs, recursive tree codec
//! - [`orchestrator`] - Bytes, file and URL entry points
//! - [`store`] - Versioned item storage
//! - [`fetch`] - Upstream document transport
//! - [`service`] - Deploy pipeline
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust
//! use treepack::{decode_tree, encode_tree, EncodeOptions, Map, NdArray, Value};
//!
//! let mask = NdArray::from_u8(vec![3, 4], (0..12).collect()).unwrap();
//! let tree = Value::Map(Map::new().with("id", 7).with(0, mask));
//!
//! let encoded = encode_tree(&tree, &EncodeOptions::default()).unwrap();
//! assert!(encoded.get("0|int|array.zstd").is_some());
//! assert_eq!(decode_tree(&encoded).unwrap(), tree);
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod fetch;
pub mod orchestrator;
pub mod server;
pub mod service;
pub mod store;
pub mod value;

// Re-export commonly used types
pub use codec::{
    ArrayCodec, Backend, EncodeOptions, ImageCodec, ImageFormat, ImageOptions, KeyKind, TaggedKey,
    ValueKind,
};
pub use config::{Cli, Command, InspectConfig, ServeConfig};
pub use error::{
    CodecError, DecodeError, DeployError, FetchError, InputError, LoadError, StoreError,
};
pub use fetch::{Fetcher, HttpFetcher, DEFAULT_FETCH_TIMEOUT};
pub use orchestrator::{
    decode_tree, encode_tree, from_json_bytes, load_from_file, load_from_url, normalize_item,
    outline, save_to_file, to_json_bytes,
};
pub use server::{create_router, AppState, RouterConfig};
pub use service::{DeployRequest, DeployService, ValidDeploy};
pub use store::{FsStore, ItemKind, ItemRecord, ItemStore, MemoryStore, SaveOptions, StoredItem};
pub use value::{DType, Key, Map, NdArray, Value};
