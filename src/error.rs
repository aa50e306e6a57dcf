use thiserror::Error;

/// Errors caused by a value or option that violates a codec precondition.
///
/// These are the caller's fault and are never retried or coerced to a default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// Compression backend name is not one of `zlib`, `lz4`, `zstd`
    #[error("Unknown compression backend: {0:?} (expected one of zlib, lz4, zstd)")]
    UnknownBackend(String),

    /// Token in a legacy preference string that names nothing we know
    #[error("Unknown encoding preference: {0:?}")]
    UnknownPreference(String),

    /// Still-image format recognised but not supported by this build
    #[error("Unsupported image format: {0}")]
    UnsupportedImageFormat(String),

    /// Image encoding requires 8-bit unsigned pixels
    #[error("Image pixels must be u8, got {0}")]
    ImageElementType(&'static str),

    /// Image encoding requires a non-empty pixel buffer
    #[error("Image pixel buffer is empty")]
    EmptyImage,

    /// Image rank or channel count is not representable in the chosen format
    #[error("Cannot encode shape {shape:?} as {format}")]
    ImageShape { shape: Vec<usize>, format: &'static str },

    /// Array data length does not match its shape and element type
    #[error("Array buffer holds {actual} bytes, shape {shape:?} of {dtype} needs {expected}")]
    ArrayLength {
        dtype: &'static str,
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    /// Element count times element size overflows the address space
    #[error("Array shape {shape:?} of {dtype} is too large")]
    ArraySize {
        dtype: &'static str,
        shape: Vec<usize>,
    },

    /// Arrays carry their kind in the map key, so they cannot appear elsewhere
    #[error("Array values must be stored under a map key")]
    UntaggedArray,

    /// Arrays being joined along the channel axis disagree on shape or type
    #[error("Cannot concatenate arrays: {0}")]
    Concat(String),
}

/// Errors raised while decoding data that claims to be in the encoded form.
///
/// Decoding never guesses: anything that does not match the grammar or the
/// payload format ends up here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Tagged key has fewer than two `|` delimiters
    #[error("Malformed tagged key: {0:?}")]
    MalformedKey(String),

    /// Key tagged `int` whose raw part is not an integer
    #[error("Invalid integer key: {0:?}")]
    InvalidIntegerKey(String),

    /// Value-kind suffix is not part of the grammar
    #[error("Unknown value kind: {0:?}")]
    UnknownValueKind(String),

    /// Encoded payload has the wrong JSON shape for its value kind
    #[error("Unexpected payload for {kind}: expected {expected}")]
    UnexpectedPayload {
        kind: String,
        expected: &'static str,
    },

    /// Payload text is not valid base64
    #[error("Invalid base64 payload: {0}")]
    Base64(String),

    /// Compressed blob is corrupt or truncated
    #[error("{backend} decompression failed: {message}")]
    Decompress {
        backend: &'static str,
        message: String,
    },

    /// Decompressed blob is not a valid array container
    #[error("Invalid array container: {0}")]
    ArrayContainer(String),

    /// Image stream has unknown magic bytes or fails to decode
    #[error("Invalid image stream: {0}")]
    Image(String),

    /// Top-level document is not valid JSON
    #[error("Invalid JSON document: {0}")]
    Json(String),
}

/// Error returned by every encode/decode entry point.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Caller supplied a value or option the codec cannot accept
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// Encoded data failed an integrity check
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A compressor or image encoder failed on otherwise valid input
    #[error("{stage} encoder failed: {message}")]
    Encoder {
        stage: &'static str,
        message: String,
    },

    /// An error raised below a map entry, with the entry's key
    #[error("at {key}: {source}")]
    At {
        key: String,
        #[source]
        source: Box<CodecError>,
    },
}

impl CodecError {
    /// Attach the map key under which this error occurred.
    pub fn at(self, key: impl Into<String>) -> Self {
        CodecError::At {
            key: key.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with key context stripped.
    pub fn root(&self) -> &CodecError {
        match self {
            CodecError::At { source, .. } => source.root(),
            other => other,
        }
    }

    /// Key path from the outermost map down to the failing entry.
    pub fn key_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        let mut current = self;
        while let CodecError::At { key, source } = current {
            path.push(key.as_str());
            current = source;
        }
        path
    }

    /// Whether the root cause is a precondition violation.
    pub fn is_input(&self) -> bool {
        matches!(self.root(), CodecError::Input(_))
    }

    /// Whether the root cause is a decode-integrity failure.
    pub fn is_decode(&self) -> bool {
        matches!(self.root(), CodecError::Decode(_))
    }
}

/// Errors from the file and URL helpers of the orchestrator.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Reading or writing a local file failed
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    /// Fetching a document over HTTP failed
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// The document was read but could not be decoded
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Errors from the item storage collaborator.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Backing storage could not be reached or written
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Stored record metadata is unreadable
    #[error("Corrupt record for {id} v{version}: {message}")]
    CorruptRecord {
        id: String,
        version: u64,
        message: String,
    },

    /// Store used before `initialize()` was called
    #[error("Store is not initialized")]
    NotInitialized,

    /// Item identifier cannot be used as a storage key
    #[error("Invalid item id: {0:?}")]
    InvalidId(String),

    /// Item kind is neither `avatar` nor `outfit`
    #[error("Unknown item kind: {0:?}")]
    UnknownKind(String),
}

/// Errors from the upstream transport collaborator.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Host unreachable, connection refused, or non-success status
    #[error("Resource unreachable: {0}")]
    Unreachable(String),

    /// The request exceeded its time bound
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    /// Response body is empty or an empty JSON document
    #[error("Resource is empty: {0}")]
    EmptyBody(String),

    /// Response body is not JSON
    #[error("Resource is not valid JSON: {0}")]
    InvalidJson(String),
}

/// Errors from the deploy pipeline of the front-door service.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Request is missing a field or has an invalid one
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Upstream document could not be obtained
    #[error("Download failed: {0}")]
    Fetch(#[from] FetchError),

    /// Upstream document could not be decoded or re-encoded
    #[error("Codec failure: {0}")]
    Codec(#[from] CodecError),

    /// Encoded item could not be persisted or read back
    #[error("Storage failure: {0}")]
    Store(#[from] StoreError),

    /// Requested item does not exist
    #[error("Item not found: {0}")]
    NotFound(String),
}
