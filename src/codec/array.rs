//! Array payload codec.
//!
//! An array is written as an `.npy` container, compressed with the chosen
//! backend, and base64 encoded so it can sit in a JSON string.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{CodecError, DecodeError};
use crate::value::NdArray;

use super::backend::{Backend, DEFAULT_BACKEND};
use super::npy;

/// Encoder/decoder for array payloads bound to one compression backend.
///
/// # Example
///
/// ```
/// use treepack::codec::{ArrayCodec, Backend};
/// use treepack::NdArray;
///
/// let codec = ArrayCodec::new(Backend::Lz4);
/// let array = NdArray::from_u8(vec![3, 4], (0..12).collect()).unwrap();
///
/// let text = codec.encode(&array).unwrap();
/// assert_eq!(codec.decode(&text).unwrap(), array);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayCodec {
    backend: Backend,
}

impl ArrayCodec {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Create a codec from a backend name.
    ///
    /// Unknown names are rejected here, before any data is touched.
    pub fn from_name(name: &str) -> Result<Self, CodecError> {
        Ok(Self::new(name.parse()?))
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Serialize, compress and base64 encode an array.
    pub fn encode(&self, array: &NdArray) -> Result<String, CodecError> {
        let blob = npy::write(array);
        let compressed = self.backend.compress(&blob)?;
        Ok(STANDARD.encode(compressed))
    }

    /// Reverse [`ArrayCodec::encode`].
    pub fn decode(&self, text: &str) -> Result<NdArray, CodecError> {
        let compressed = STANDARD
            .decode(text.trim())
            .map_err(|e| DecodeError::Base64(e.to_string()))?;
        let blob = self.backend.decompress(&compressed)?;
        Ok(npy::read(&blob)?)
    }
}

impl Default for ArrayCodec {
    fn default() -> Self {
        Self::new(DEFAULT_BACKEND)
    }
}
