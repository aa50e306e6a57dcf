//! Self-describing JSON codec for value trees.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     tree::encode/decode                 │
//! │          (depth-first walk, per-entry dispatch)         │
//! └──────┬───────────────────┬───────────────────┬──────────┘
//!        │                   │                   │
//!        ▼                   ▼                   ▼
//! ┌─────────────┐    ┌───────────────┐    ┌──────────────┐
//! │    tag      │    │  ArrayCodec   │    │  ImageCodec  │
//! │ key|kk|kind │    │ npy → backend │    │ png / jpeg   │
//! │             │    │   → base64    │    │   → base64   │
//! └─────────────┘    └───────────────┘    └──────────────┘
//! ```
//!
//! # Components
//!
//! - [`tag`]: the `<key>|<key-kind>|<value-kind>` member-name grammar
//! - [`ArrayCodec`]: `.npy` serialization plus zlib / lz4 / zstd compression
//! - [`ImageCodec`]: still-image compression for large pixel arrays
//! - [`EncodeOptions`]: backend preference and image-path settings
//! - [`encode`] / [`decode`]: the recursive tree walk
//!
//! All functions here are pure: no I/O, no logging, no shared state.
//!
//! # Example
//!
//! ```
//! use treepack::codec::{decode, encode, EncodeOptions};
//! use treepack::{Map, NdArray, Value};
//!
//! let tree = Value::Map(
//!     Map::new()
//!         .with("name", "sample")
//!         .with(3, NdArray::from_u8(vec![2, 2], vec![1, 2, 3, 4]).unwrap()),
//! );
//!
//! let encoded = encode(&tree, &EncodeOptions::default()).unwrap();
//! assert!(encoded.get("name||").is_some());
//! assert!(encoded.get("3|int|array.zstd").is_some());
//!
//! assert_eq!(decode(&encoded).unwrap(), tree);
//! ```

mod array;
mod backend;
mod image;
pub mod npy;
mod options;
pub mod tag;
mod tree;

pub use array::ArrayCodec;
pub use backend::{Backend, DEFAULT_BACKEND, ZSTD_LEVEL};
pub use image::{
    clamp_quality, strip_header, ImageCodec, ImageFormat, DEFAULT_JPEG_QUALITY,
    HEADER_SCAN_LIMIT, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
pub use options::{EncodeOptions, ImageOptions};
pub use tag::{untag, KeyKind, TaggedKey, ValueKind};
pub use tree::{
    decode, encode, takes_image_path, FALLBACK_BACKEND, IMAGE_CHANNELS, IMAGE_MIN_SIDE,
    IMAGE_PART_BACKEND,
};
