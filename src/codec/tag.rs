//! Key-tagging grammar.
//!
//! Every member name of an encoded map has the form
//!
//! ```text
//! <key>|<key-kind>|<value-kind>
//! ```
//!
//! where `<key-kind>` is empty for string keys and `int` for integer keys,
//! and `<value-kind>` selects the decoding path. Tagged keys are always split
//! from the right, exactly twice, so a raw key may itself contain `|`.

use std::fmt;
use std::str::FromStr;

use crate::error::DecodeError;
use crate::value::Key;

use super::backend::Backend;

/// Separator between the three segments of a tagged key.
pub const DELIMITER: char = '|';

const INT_KEY: &str = "int";

// =============================================================================
// Kinds
// =============================================================================

/// Type of the original map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Str,
    Int,
}

impl KeyKind {
    pub fn of(key: &Key) -> Self {
        match key {
            Key::Int(_) => KeyKind::Int,
            Key::Str(_) => KeyKind::Str,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            KeyKind::Str => "",
            KeyKind::Int => INT_KEY,
        }
    }
}

/// How a map value was encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Null, boolean, number or string, stored as native JSON
    Scalar,
    /// Sequence, stored as a JSON array
    List,
    /// Nested map, stored as a JSON object
    Dict,
    /// Compressed array; `None` means the fallback backend
    Array(Option<Backend>),
    /// Large array routed through the image path
    Image { float: bool },
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Scalar => Ok(()),
            ValueKind::List => f.write_str("list"),
            ValueKind::Dict => f.write_str("dict"),
            ValueKind::Array(None) => f.write_str("array"),
            ValueKind::Array(Some(backend)) => write!(f, "array.{}", backend),
            ValueKind::Image { float: false } => f.write_str("image"),
            ValueKind::Image { float: true } => f.write_str("image.float"),
        }
    }
}

impl FromStr for ValueKind {
    type Err = DecodeError;

    /// Parse a value-kind segment.
    ///
    /// Besides the current spellings this accepts the names used by earlier
    /// producers: `numpy.ndarray[.<backend>]` and `jpeg[.float]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || DecodeError::UnknownValueKind(s.to_string());
        let backend = |name: &str| name.parse::<Backend>().map_err(|_| unknown());

        match s {
            "" => Ok(ValueKind::Scalar),
            "list" => Ok(ValueKind::List),
            "dict" => Ok(ValueKind::Dict),
            "array" | "numpy.ndarray" => Ok(ValueKind::Array(None)),
            "image" | "jpeg" => Ok(ValueKind::Image { float: false }),
            "image.float" | "jpeg.float" => Ok(ValueKind::Image { float: true }),
            _ => {
                let name = s
                    .strip_prefix("array.")
                    .or_else(|| s.strip_prefix("numpy.ndarray."))
                    .ok_or_else(unknown)?;
                Ok(ValueKind::Array(Some(backend(name)?)))
            }
        }
    }
}

// =============================================================================
// Tagging
// =============================================================================

/// A decoded member name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedKey {
    pub key: Key,
    pub kind: ValueKind,
}

/// Build the member name for `key` holding a value of `kind`.
pub fn tag(key: &Key, kind: ValueKind) -> String {
    format!(
        "{}{d}{}{d}{}",
        key,
        KeyKind::of(key).as_str(),
        kind,
        d = DELIMITER
    )
}

/// Split a member name back into its key and value kind.
///
/// # Errors
///
/// - [`DecodeError::MalformedKey`] if the name has fewer than two delimiters
/// - [`DecodeError::InvalidIntegerKey`] if an `int` key does not parse
/// - [`DecodeError::UnknownValueKind`] if the value kind is not recognized
pub fn untag(tagged: &str) -> Result<TaggedKey, DecodeError> {
    let mut parts = tagged.rsplitn(3, DELIMITER);
    let (kind, key_kind, raw) = match (parts.next(), parts.next(), parts.next()) {
        (Some(kind), Some(key_kind), Some(raw)) => (kind, key_kind, raw),
        _ => return Err(DecodeError::MalformedKey(tagged.to_string())),
    };

    let key = if key_kind == INT_KEY {
        raw.parse::<i64>()
            .map(Key::Int)
            .map_err(|_| DecodeError::InvalidIntegerKey(raw.to_string()))?
    } else {
        Key::Str(raw.to_string())
    };

    Ok(TaggedKey {
        key,
        kind: kind.parse()?,
    })
}
