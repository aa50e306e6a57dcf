//! Encoding preferences.
//!
//! Compression and image routing are configured independently: `backends`
//! is an ordered preference list for array payloads, and `image` turns on
//! the large-array image path.
//!
//! The `|`-separated preference strings used by earlier producers (for
//! example `"jpeg|zstd"`) can still be parsed with [`EncodeOptions::from_str`].

use std::str::FromStr;

use crate::error::InputError;

use super::backend::{Backend, DEFAULT_BACKEND};
use super::image::{clamp_quality, ImageFormat, DEFAULT_JPEG_QUALITY};

/// Settings for the heuristic image path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageOptions {
    pub format: ImageFormat,
    pub quality: u8,
}

impl ImageOptions {
    pub fn new(format: ImageFormat, quality: u8) -> Self {
        Self {
            format,
            quality: clamp_quality(quality),
        }
    }
}

impl Default for ImageOptions {
    /// JPEG at quality 95.
    fn default() -> Self {
        Self::new(ImageFormat::Jpeg, DEFAULT_JPEG_QUALITY)
    }
}

/// Options for [`encode`](crate::codec::encode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Array backends in order of preference; the first one is used.
    /// An empty list selects the fallback backend.
    pub backends: Vec<Backend>,

    /// Route large arrays through the image path when set.
    pub image: Option<ImageOptions>,
}

impl EncodeOptions {
    /// Options with no backend preference and no image path.
    pub fn fallback() -> Self {
        Self {
            backends: Vec::new(),
            image: None,
        }
    }

    /// Prefer a single backend.
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backends = vec![backend];
        self
    }

    /// Replace the backend preference list.
    pub fn with_backends(mut self, backends: impl IntoIterator<Item = Backend>) -> Self {
        self.backends = backends.into_iter().collect();
        self
    }

    /// Enable the image path with the given settings.
    pub fn with_image(mut self, image: ImageOptions) -> Self {
        self.image = Some(image);
        self
    }

    /// Enable the image path with default settings.
    pub fn with_image_path(self) -> Self {
        self.with_image(ImageOptions::default())
    }

    /// Resolve backend names into a preference list, rejecting unknown names.
    pub fn parse_backends<S: AsRef<str>>(names: &[S]) -> Result<Vec<Backend>, InputError> {
        names.iter().map(|n| n.as_ref().trim().parse()).collect()
    }

    /// Backend for array payloads; `None` means the fallback backend.
    pub fn array_backend(&self) -> Option<Backend> {
        self.backends.first().copied()
    }
}

impl Default for EncodeOptions {
    /// zstd, no image path.
    fn default() -> Self {
        Self::fallback().with_backend(DEFAULT_BACKEND)
    }
}

impl FromStr for EncodeOptions {
    type Err = InputError;

    /// Parse a legacy preference string such as `"jpeg|zstd"`.
    ///
    /// `jpeg`/`jpg` enable the image path with JPEG, `png` enables it with
    /// PNG. Backends are resolved with the priority `lz4`, then `zstd`;
    /// `zlib` or no backend at all selects the fallback.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut options = EncodeOptions::fallback();
        let mut named = Vec::new();

        for token in s.split('|').map(str::trim).filter(|t| !t.is_empty()) {
            match token {
                "jpeg" | "jpg" | "image" => options = options.with_image_path(),
                "png" => {
                    options = options.with_image(ImageOptions::new(
                        ImageFormat::Png,
                        DEFAULT_JPEG_QUALITY,
                    ))
                }
                "webp" => return Err(InputError::UnsupportedImageFormat(token.to_string())),
                _ => named.push(
                    token
                        .parse::<Backend>()
                        .map_err(|_| InputError::UnknownPreference(token.to_string()))?,
                ),
            }
        }

        for preferred in [Backend::Lz4, Backend::Zstd] {
            if named.contains(&preferred) {
                options.backends = vec![preferred];
                break;
            }
        }
        Ok(options)
    }
}
