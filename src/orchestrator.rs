//! Document-level entry points.
//!
//! Thin helpers that put the tree codec to work on whole documents: bytes,
//! local files and remote URLs. The codec itself stays pure; everything that
//! touches the outside world lives here or in the layers above.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::codec::{self, EncodeOptions};
use crate::error::{CodecError, DecodeError, LoadError};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::value::{Map, Value};

/// Indentation used by [`save_to_file`].
const FILE_INDENT: &[u8] = b"    ";

/// Longest string preview printed by [`outline`].
const PREVIEW_CHARS: usize = 40;

// =============================================================================
// In-memory
// =============================================================================

/// Encode a value tree into its JSON-safe form.
pub fn encode_tree(value: &Value, options: &EncodeOptions) -> Result<serde_json::Value, CodecError> {
    codec::encode(value, options)
}

/// Decode a JSON tree produced by [`encode_tree`].
pub fn decode_tree(encoded: &serde_json::Value) -> Result<Value, CodecError> {
    codec::decode(encoded)
}

/// Encode a value tree to compact JSON bytes.
pub fn to_json_bytes(value: &Value, options: &EncodeOptions) -> Result<Vec<u8>, CodecError> {
    let encoded = encode_tree(value, options)?;
    serde_json::to_vec(&encoded).map_err(|e| CodecError::Encoder {
        stage: "json",
        message: e.to_string(),
    })
}

/// Parse and decode a JSON document.
pub fn from_json_bytes(bytes: &[u8]) -> Result<Value, CodecError> {
    let encoded: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| DecodeError::Json(e.to_string()))?;
    decode_tree(&encoded)
}

/// Decode an item document, wrapping a lone map in a one-element sequence.
///
/// Item documents are either a sequence of item maps or, for single-part
/// items, just the map itself; callers always get the sequence form.
pub fn normalize_item(bytes: &[u8]) -> Result<Value, CodecError> {
    match from_json_bytes(bytes)? {
        map @ Value::Map(_) => Ok(Value::Sequence(vec![map])),
        other => Ok(other),
    }
}

// =============================================================================
// Files and URLs
// =============================================================================

/// Encode a value tree and write it as 4-space indented JSON.
pub fn save_to_file(
    path: impl AsRef<Path>,
    value: &Value,
    options: &EncodeOptions,
) -> Result<(), LoadError> {
    let path = path.as_ref();
    let encoded = encode_tree(value, options)?;

    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(FILE_INDENT));
    encoded
        .serialize(&mut serializer)
        .map_err(|e| CodecError::Encoder {
            stage: "json",
            message: e.to_string(),
        })?;

    fs::write(path, buf).map_err(|e| io_error(path, e))
}

/// Read and decode a JSON document from disk.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Value, LoadError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| io_error(path, e))?;
    Ok(from_json_bytes(&bytes)?)
}

/// Download and decode a JSON document.
pub async fn load_from_url(url: &str, timeout: Duration) -> Result<Value, LoadError> {
    let fetcher = HttpFetcher::new(timeout)?;
    load_with(&fetcher, url).await
}

/// Download and decode a JSON document through an existing fetcher.
pub async fn load_with<F: Fetcher + ?Sized>(fetcher: &F, url: &str) -> Result<Value, LoadError> {
    let bytes = fetcher.fetch_json(url).await?;
    Ok(from_json_bytes(&bytes)?)
}

fn io_error(path: &Path, err: std::io::Error) -> LoadError {
    LoadError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

// =============================================================================
// Outline
// =============================================================================

/// Render a human-readable outline of a decoded tree.
///
/// Arrays are shown by element type and shape rather than content.
pub fn outline(value: &Value) -> String {
    let mut out = String::new();
    write_node(&mut out, None, value, 0);
    out
}

fn write_node(out: &mut String, label: Option<String>, value: &Value, depth: usize) {
    let summary = match value {
        Value::Map(map) => format!("map ({} entries)", map.len()),
        Value::Sequence(items) => format!("list ({} items)", items.len()),
        Value::Array(array) => format!("array {} {:?}", array.dtype(), array.shape()),
        Value::String(s) => {
            let preview: String = s.chars().take(PREVIEW_CHARS).collect();
            if s.chars().count() > PREVIEW_CHARS {
                format!("string {:?}...", preview)
            } else {
                format!("string {:?}", preview)
            }
        }
        Value::Number(n) => format!("number {}", n),
        Value::Bool(b) => format!("bool {}", b),
        Value::Null => "null".to_string(),
    };

    out.push_str(&"  ".repeat(depth));
    if let Some(label) = label {
        out.push_str(&label);
        out.push_str(": ");
    }
    out.push_str(&summary);
    out.push('\n');

    match value {
        Value::Map(map) => write_map(out, map, depth + 1),
        Value::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                write_node(out, Some(format!("[{}]", i)), item, depth + 1);
            }
        }
        _ => {}
    }
}

fn write_map(out: &mut String, map: &Map, depth: usize) {
    for (key, value) in map.iter() {
        write_node(out, Some(key.to_string()), value, depth);
    }
}
