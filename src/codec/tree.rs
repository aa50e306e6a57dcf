//! Recursive tree encoder and decoder.
//!
//! Encoding walks a [`Value`] depth-first and produces a JSON tree in which
//! every map member name carries a tag (see [`tag`](super::tag)). Decoding
//! reads the tags back and rebuilds the original kinds.
//!
//! # Image path
//!
//! When [`EncodeOptions::image`] is set, an array with at least two axes whose
//! first two axes are both longer than [`IMAGE_MIN_SIDE`] is treated as an
//! image:
//!
//! 1. non-`u8` arrays are read as floats in `[0, 1]` and quantized to `u8`
//!    (tag `image.float`)
//! 2. a `(h, w)` array gains a trailing channel axis
//! 3. with at least [`IMAGE_CHANNELS`] channels, the first three go through
//!    the still-image codec and the rest through the array codec, stored as
//!    `[image, remainder | null]`; otherwise the whole array goes through
//!    the array codec
//!
//! Decoding reverses the steps and squeezes away unit axes.

use serde_json::Value as Json;

use crate::error::{CodecError, DecodeError, InputError};
use crate::value::{DType, Map, NdArray, Value};

use super::array::ArrayCodec;
use super::backend::Backend;
use super::image::ImageCodec;
use super::options::{EncodeOptions, ImageOptions};
use super::tag::{self, ValueKind};

/// Both leading axes must be longer than this for the image path.
pub const IMAGE_MIN_SIDE: usize = 100;

/// Channels stored by the still-image codec; the rest go to the array codec.
pub const IMAGE_CHANNELS: usize = 3;

/// Backend behind the unsuffixed `array` tag.
pub const FALLBACK_BACKEND: Backend = Backend::Zlib;

/// Backend for remainder and fallback blobs on the image path.
pub const IMAGE_PART_BACKEND: Backend = Backend::Zstd;

// =============================================================================
// Encoding
// =============================================================================

/// Encode a value tree into its JSON-safe form.
///
/// Arrays must appear as map values, since their kind is recorded in the
/// member name; an array anywhere else is an input error.
pub fn encode(value: &Value, options: &EncodeOptions) -> Result<Json, CodecError> {
    match value {
        Value::Sequence(items) => items
            .iter()
            .map(|item| encode(item, options))
            .collect::<Result<Vec<_>, _>>()
            .map(Json::Array),
        Value::Map(map) => encode_map(map, options),
        Value::Array(_) => Err(InputError::UntaggedArray.into()),
        Value::Null => Ok(Json::Null),
        Value::Bool(b) => Ok(Json::Bool(*b)),
        Value::Number(n) => Ok(Json::Number(n.clone())),
        Value::String(s) => Ok(Json::String(s.clone())),
    }
}

fn encode_map(map: &Map, options: &EncodeOptions) -> Result<Json, CodecError> {
    let mut out = serde_json::Map::with_capacity(map.len());
    for (key, value) in map.iter() {
        let (kind, payload) = encode_entry(value, options).map_err(|e| e.at(key.to_string()))?;
        out.insert(tag::tag(key, kind), payload);
    }
    Ok(Json::Object(out))
}

fn encode_entry(value: &Value, options: &EncodeOptions) -> Result<(ValueKind, Json), CodecError> {
    match value {
        Value::Sequence(_) => Ok((ValueKind::List, encode(value, options)?)),
        Value::Map(map) => Ok((ValueKind::Dict, encode_map(map, options)?)),
        Value::Array(array) => match options.image {
            Some(image) if takes_image_path(array) => encode_image(array, image),
            _ => {
                let backend = options.array_backend();
                let text = ArrayCodec::new(backend.unwrap_or(FALLBACK_BACKEND)).encode(array)?;
                Ok((ValueKind::Array(backend), Json::String(text)))
            }
        },
        scalar => Ok((ValueKind::Scalar, encode(scalar, options)?)),
    }
}

/// Whether an array is large enough to be treated as an image.
pub fn takes_image_path(array: &NdArray) -> bool {
    match array.shape() {
        [h, w, ..] => (*h).min(*w) > IMAGE_MIN_SIDE,
        _ => false,
    }
}

fn encode_image(array: &NdArray, options: ImageOptions) -> Result<(ValueKind, Json), CodecError> {
    let float = array.dtype() != DType::U8;
    let mut pixels = if float {
        array.quantize_unit()
    } else {
        array.clone()
    };
    let kind = ValueKind::Image { float };

    if let [h, w] = *pixels.shape() {
        pixels = pixels.reshape(vec![h, w, 1])?;
    }

    let part_codec = ArrayCodec::new(IMAGE_PART_BACKEND);
    match *pixels.shape() {
        [_, _, channels] if channels >= IMAGE_CHANNELS => {
            let (head, rest) = pixels.split_channels(IMAGE_CHANNELS);
            let image = ImageCodec::new(options.format)
                .with_quality(options.quality)
                .encode(&head)?;
            let rest = match rest {
                Some(rest) => Json::String(part_codec.encode(&rest)?),
                None => Json::Null,
            };
            Ok((kind, Json::Array(vec![Json::String(image), rest])))
        }
        _ => Ok((kind, Json::String(part_codec.encode(&pixels)?))),
    }
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode a JSON tree produced by [`encode`].
pub fn decode(encoded: &Json) -> Result<Value, CodecError> {
    match encoded {
        Json::Array(items) => items
            .iter()
            .map(decode)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Sequence),
        Json::Object(members) => decode_map(members),
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Bool(*b)),
        Json::Number(n) => Ok(Value::Number(n.clone())),
        Json::String(s) => Ok(Value::String(s.clone())),
    }
}

fn decode_map(members: &serde_json::Map<String, Json>) -> Result<Value, CodecError> {
    let mut map = Map::new();
    for (name, payload) in members {
        let tagged = tag::untag(name).map_err(|e| CodecError::from(e).at(name.as_str()))?;
        let value = decode_entry(tagged.kind, payload).map_err(|e| e.at(name.as_str()))?;
        map.insert(tagged.key, value);
    }
    Ok(Value::Map(map))
}

fn decode_entry(kind: ValueKind, payload: &Json) -> Result<Value, CodecError> {
    match (kind, payload) {
        (ValueKind::List, Json::Array(_)) | (ValueKind::Dict, Json::Object(_)) => decode(payload),
        (ValueKind::Array(backend), Json::String(text)) => {
            let codec = ArrayCodec::new(backend.unwrap_or(FALLBACK_BACKEND));
            Ok(Value::Array(codec.decode(text)?))
        }
        (ValueKind::Image { float }, _) => decode_image(payload, float).map(Value::Array),
        (ValueKind::Scalar, Json::Array(_) | Json::Object(_)) => {
            Err(unexpected(kind, "null, boolean, number or string"))
        }
        (ValueKind::Scalar, scalar) => decode(scalar),
        (ValueKind::List, _) => Err(unexpected(kind, "array")),
        (ValueKind::Dict, _) => Err(unexpected(kind, "object")),
        (ValueKind::Array(_), _) => Err(unexpected(kind, "base64 string")),
    }
}

fn decode_image(payload: &Json, float: bool) -> Result<NdArray, CodecError> {
    let kind = ValueKind::Image { float };
    let part_codec = ArrayCodec::new(IMAGE_PART_BACKEND);

    let pixels = match payload {
        Json::Array(parts) => match parts.as_slice() {
            [Json::String(image), rest] => {
                let mut pixels = ImageCodec::decode(image)?;
                if let [h, w] = *pixels.shape() {
                    pixels = pixels.reshape(vec![h, w, 1])?;
                }
                match rest {
                    Json::Null => pixels,
                    Json::String(text) => {
                        let rest = part_codec.decode(text)?;
                        pixels.concat_channels(&rest).map_err(|_| {
                            unexpected(kind, "image and remainder of matching height and width")
                        })?
                    }
                    _ => return Err(unexpected(kind, "remainder string or null")),
                }
            }
            _ => return Err(unexpected(kind, "[image, remainder] pair")),
        },
        Json::String(text) => part_codec.decode(text)?,
        _ => return Err(unexpected(kind, "[image, remainder] pair or base64 string")),
    };

    let pixels = if float {
        pixels.dequantize_unit()
    } else {
        pixels
    };
    Ok(pixels.squeeze())
}

fn unexpected(kind: ValueKind, expected: &'static str) -> CodecError {
    DecodeError::UnexpectedPayload {
        kind: kind.to_string(),
        expected,
    }
    .into()
}
