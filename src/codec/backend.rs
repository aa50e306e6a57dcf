//! Compression backends for array payloads.
//!
//! Each backend is identified by the name that appears in the value-kind
//! tag (`array.zstd`, `array.lz4`, ...). Blobs do not record which backend
//! produced them, so the decoder must be told.

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use lz4_flex::frame::{FrameDecoder, FrameEncoder};

use crate::error::{CodecError, DecodeError, InputError};

/// zstd level used for compression (the library default).
pub const ZSTD_LEVEL: i32 = 3;

/// A named compression algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// zlib stream (RFC 1950), available everywhere
    Zlib,
    /// LZ4 frame format, fastest with the lowest ratio
    Lz4,
    /// Zstandard, the default
    Zstd,
}

/// Backend used when the caller expresses no preference.
pub const DEFAULT_BACKEND: Backend = Backend::Zstd;

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Zlib, Backend::Lz4, Backend::Zstd];

    /// Wire name of the backend.
    pub const fn name(self) -> &'static str {
        match self {
            Backend::Zlib => "zlib",
            Backend::Lz4 => "lz4",
            Backend::Zstd => "zstd",
        }
    }

    /// Compress a buffer.
    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let encoder_error = |message: String| CodecError::Encoder {
            stage: self.name(),
            message,
        };

        match self {
            Backend::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
                encoder
                    .write_all(data)
                    .map_err(|e| encoder_error(e.to_string()))?;
                encoder.finish().map_err(|e| encoder_error(e.to_string()))
            }
            Backend::Lz4 => {
                let mut encoder = FrameEncoder::new(Vec::new());
                encoder
                    .write_all(data)
                    .map_err(|e| encoder_error(e.to_string()))?;
                encoder.finish().map_err(|e| encoder_error(e.to_string()))
            }
            Backend::Zstd => zstd::stream::encode_all(data, ZSTD_LEVEL)
                .map_err(|e| encoder_error(e.to_string())),
        }
    }

    /// Decompress a buffer produced by [`Backend::compress`] with the same backend.
    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>, DecodeError> {
        let mut out = Vec::new();
        let result = match self {
            Backend::Zlib => ZlibDecoder::new(data).read_to_end(&mut out).map(|_| ()),
            Backend::Lz4 => FrameDecoder::new(data).read_to_end(&mut out).map(|_| ()),
            Backend::Zstd => zstd::stream::decode_all(data).map(|decoded| out = decoded),
        };

        result.map_err(|e| DecodeError::Decompress {
            backend: self.name(),
            message: e.to_string(),
        })?;
        Ok(out)
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Backend::ALL
            .into_iter()
            .find(|b| b.name() == s)
            .ok_or_else(|| InputError::UnknownBackend(s.to_string()))
    }
}
