//! Still-image payload codec.
//!
//! Pixel arrays are compressed with a still-image encoder (lossless PNG or
//! lossy JPEG) and base64 encoded, optionally behind a data-URI header.
//!
//! # Design Decisions
//!
//! - **Self-describing streams**: decoding detects the format from the
//!   stream's magic bytes, so the decoder needs no format argument.
//!
//! - **Pre-quantized input**: only `u8` pixels are accepted. Float images
//!   are quantized by the tree codec before they reach this module.
//!
//! - **BGR channel order**: the first three channels of an array are blue,
//!   green, red (plus alpha), the OpenCV layout used by existing producers.
//!   They are swapped to RGB around the `image` crate.
//!
//! - **Bounded header scan**: the `;base64,` marker is only looked for in the
//!   first [`HEADER_SCAN_LIMIT`] bytes.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};

use crate::error::{CodecError, DecodeError, InputError};
use crate::value::{DType, NdArray};

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Data-URI headers must end within this many bytes of the start.
pub const HEADER_SCAN_LIMIT: usize = 30;

const HEADER_MARKER: &[u8] = b";base64,";

// =============================================================================
// Image Format
// =============================================================================

/// Still-image compressor used for image payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageFormat {
    /// Lossless, 1 to 4 channels
    #[default]
    Png,
    /// Lossy, 1 or 3 channels
    Jpeg,
}

impl ImageFormat {
    /// MIME subtype used in the data-URI header.
    pub const fn mime_subtype(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
        }
    }

    pub const fn is_lossy(self) -> bool {
        matches!(self, ImageFormat::Jpeg)
    }

    fn supports_channels(self, channels: usize) -> bool {
        match self {
            ImageFormat::Png => (1..=4).contains(&channels),
            ImageFormat::Jpeg => channels == 1 || channels == 3,
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_subtype())
    }
}

impl FromStr for ImageFormat {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
            other => Err(InputError::UnsupportedImageFormat(other.to_string())),
        }
    }
}

// =============================================================================
// Image Codec
// =============================================================================

/// Encoder settings for image payloads.
///
/// Decoding is format-independent and available as [`ImageCodec::decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCodec {
    format: ImageFormat,
    quality: u8,
    add_header: bool,
}

impl ImageCodec {
    /// Create a codec for the given format at the default quality, without header.
    pub fn new(format: ImageFormat) -> Self {
        Self {
            format,
            quality: DEFAULT_JPEG_QUALITY,
            add_header: false,
        }
    }

    /// Lossy JPEG codec at `quality`.
    pub fn jpeg(quality: u8) -> Self {
        Self::new(ImageFormat::Jpeg).with_quality(quality)
    }

    /// Set the quality used by lossy formats. Values are clamped to 1-100.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = clamp_quality(quality);
        self
    }

    /// Prefix encoded output with a `data:image/<subtype>;base64,` header.
    pub fn with_header(mut self, add_header: bool) -> Self {
        self.add_header = add_header;
        self
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode a `(h, w)` or `(h, w, c)` array of `u8` pixels.
    ///
    /// # Errors
    ///
    /// Returns an input error if the pixels are not `u8`, the buffer is
    /// empty, or the shape has a channel count the format cannot store.
    pub fn encode(&self, pixels: &NdArray) -> Result<String, CodecError> {
        if pixels.dtype() != DType::U8 {
            return Err(InputError::ImageElementType(pixels.dtype().name()).into());
        }
        if pixels.is_empty() {
            return Err(InputError::EmptyImage.into());
        }

        let shape_error = || InputError::ImageShape {
            shape: pixels.shape().to_vec(),
            format: self.format.mime_subtype(),
        };
        let (height, width, channels) = match *pixels.shape() {
            [h, w] => (h, w, 1),
            [h, w, c] => (h, w, c),
            _ => return Err(shape_error().into()),
        };
        if !self.format.supports_channels(channels) {
            return Err(shape_error().into());
        }
        let width = u32::try_from(width).map_err(|_| shape_error())?;
        let height = u32::try_from(height).map_err(|_| shape_error())?;

        let color = match channels {
            1 => ExtendedColorType::L8,
            2 => ExtendedColorType::La8,
            3 => ExtendedColorType::Rgb8,
            _ => ExtendedColorType::Rgba8,
        };

        let data = if channels >= 3 {
            let mut data = pixels.data().to_vec();
            swap_red_blue(&mut data, channels);
            Cow::Owned(data)
        } else {
            Cow::Borrowed(pixels.data())
        };

        let mut stream = Vec::new();
        let result = match self.format {
            ImageFormat::Png => {
                PngEncoder::new(&mut stream).write_image(&data, width, height, color)
            }
            ImageFormat::Jpeg => JpegEncoder::new_with_quality(&mut stream, self.quality)
                .write_image(&data, width, height, color),
        };
        result.map_err(|e| CodecError::Encoder {
            stage: self.format.mime_subtype(),
            message: e.to_string(),
        })?;

        let body = STANDARD.encode(stream);
        if self.add_header {
            Ok(format!(
                "data:image/{};base64,{}",
                self.format.mime_subtype(),
                body
            ))
        } else {
            Ok(body)
        }
    }

    /// Decode an image payload, with or without a data-URI header.
    ///
    /// Grayscale streams decode to `(h, w)`, others to `(h, w, c)`.
    pub fn decode(text: &str) -> Result<NdArray, CodecError> {
        let stream = STANDARD
            .decode(strip_header(text).trim())
            .map_err(|e| DecodeError::Base64(e.to_string()))?;

        image::guess_format(&stream)
            .map_err(|_| DecodeError::Image("unrecognized stream magic".to_string()))?;
        let img = image::load_from_memory(&stream).map_err(|e| DecodeError::Image(e.to_string()))?;

        Ok(pixels_from_image(img)?)
    }
}

impl Default for ImageCodec {
    fn default() -> Self {
        Self::new(ImageFormat::default())
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Remove a data-URI header whose `;base64,` marker starts within the scan limit.
pub fn strip_header(text: &str) -> &str {
    let window = &text.as_bytes()[..text.len().min(HEADER_SCAN_LIMIT)];
    match window
        .windows(HEADER_MARKER.len())
        .position(|w| w == HEADER_MARKER)
    {
        Some(pos) if pos > 0 => &text[pos + HEADER_MARKER.len()..],
        _ => text,
    }
}

/// Clamp quality to valid range.
///
/// Values below 1 become 1, values above 100 become 100.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

/// Convert interleaved RGB(A) to BGR(A) in place, or back.
fn swap_red_blue(data: &mut [u8], channels: usize) {
    for pixel in data.chunks_exact_mut(channels) {
        pixel.swap(0, 2);
    }
}

fn pixels_from_image(img: DynamicImage) -> Result<NdArray, DecodeError> {
    let (width, height) = (img.width() as usize, img.height() as usize);
    let (channels, mut data) = match img {
        DynamicImage::ImageLuma8(buf) => (1, buf.into_raw()),
        DynamicImage::ImageLumaA8(buf) => (2, buf.into_raw()),
        DynamicImage::ImageRgb8(buf) => (3, buf.into_raw()),
        DynamicImage::ImageRgba8(buf) => (4, buf.into_raw()),
        DynamicImage::ImageLuma16(_) => (1, img.to_luma8().into_raw()),
        DynamicImage::ImageLumaA16(_) => (2, img.to_luma_alpha8().into_raw()),
        other if other.color().has_alpha() => (4, other.to_rgba8().into_raw()),
        other => (3, other.to_rgb8().into_raw()),
    };
    if channels >= 3 {
        swap_red_blue(&mut data, channels);
    }

    let shape = if channels == 1 {
        vec![height, width]
    } else {
        vec![height, width, channels]
    };
    NdArray::from_u8(shape, data).map_err(|e| DecodeError::Image(e.to_string()))
}
