//! NumPy `.npy` container for array payloads.
//!
//! Arrays are serialized as version 1.0 `.npy` files so that the element
//! type and shape travel with the data:
//!
//! ```text
//! \x93NUMPY | major | minor | header_len (u16 LE) | header dict ... \n | data
//! ```
//!
//! The header is a Python dict literal padded with spaces so that the data
//! starts on a 64-byte boundary. The reader also accepts the 2.0 and 3.0
//! layouts, which differ only in using a `u32` header length.

use crate::error::DecodeError;
use crate::value::{DType, NdArray};

/// Magic bytes at the start of every `.npy` stream.
pub const MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Alignment of the data section.
const ALIGNMENT: usize = 64;

/// Serialize an array to `.npy` bytes.
pub fn write(array: &NdArray) -> Vec<u8> {
    let mut dict = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        descr(array.dtype()),
        shape_tuple(array.shape())
    );

    // 10 bytes of preamble plus the trailing newline
    let unpadded = 10 + dict.len() + 1;
    let padding = (ALIGNMENT - unpadded % ALIGNMENT) % ALIGNMENT;
    dict.extend(std::iter::repeat(' ').take(padding));
    dict.push('\n');

    let mut out = Vec::with_capacity(10 + dict.len() + array.data().len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(dict.len() as u16).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out.extend_from_slice(array.data());
    out
}

/// Parse `.npy` bytes back into an array.
pub fn read(bytes: &[u8]) -> Result<NdArray, DecodeError> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err(invalid("missing .npy magic"));
    }

    let (header_len, header_start) = match bytes[6] {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(invalid("truncated header length"));
            }
            let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
            (len as usize, 12)
        }
        major => return Err(invalid(format!("unsupported format version {}", major))),
    };

    let data_start = header_start + header_len;
    let header = bytes
        .get(header_start..data_start)
        .ok_or_else(|| invalid("truncated header"))?;
    let header = std::str::from_utf8(header).map_err(|_| invalid("header is not text"))?;

    let dtype = parse_descr(quoted(field(header, "descr")?)?)?;
    if field(header, "fortran_order")?.starts_with("True") {
        return Err(invalid("fortran_order arrays are not supported"));
    }
    let shape = parse_shape(field(header, "shape")?)?;

    let data = bytes[data_start..].to_vec();
    NdArray::new(dtype, shape, data).map_err(|e| invalid(e.to_string()))
}

// =============================================================================
// Header Helpers
// =============================================================================

fn descr(dtype: DType) -> &'static str {
    match dtype {
        DType::Bool => "|b1",
        DType::U8 => "|u1",
        DType::I8 => "|i1",
        DType::U16 => "<u2",
        DType::I16 => "<i2",
        DType::U32 => "<u4",
        DType::I32 => "<i4",
        DType::U64 => "<u8",
        DType::I64 => "<i8",
        DType::F32 => "<f4",
        DType::F64 => "<f8",
    }
}

fn parse_descr(descr: &str) -> Result<DType, DecodeError> {
    let mut chars = descr.chars();
    let order = chars.next();
    let dtype = match chars.as_str() {
        "b1" => DType::Bool,
        "u1" => DType::U8,
        "i1" => DType::I8,
        "u2" => DType::U16,
        "i2" => DType::I16,
        "u4" => DType::U32,
        "i4" => DType::I32,
        "u8" => DType::U64,
        "i8" => DType::I64,
        "f4" => DType::F32,
        "f8" => DType::F64,
        _ => return Err(invalid(format!("unsupported descr {:?}", descr))),
    };
    match order {
        Some('<' | '|' | '=') => Ok(dtype),
        Some('>') if dtype.size() == 1 => Ok(dtype),
        _ => Err(invalid(format!("unsupported byte order in {:?}", descr))),
    }
}

fn shape_tuple(shape: &[usize]) -> String {
    match shape {
        [] => "()".to_string(),
        [n] => format!("({},)", n),
        dims => {
            let parts: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
            format!("({})", parts.join(", "))
        }
    }
}

fn parse_shape(text: &str) -> Result<Vec<usize>, DecodeError> {
    let inner = text
        .strip_prefix('(')
        .and_then(|rest| rest.split(')').next())
        .ok_or_else(|| invalid("shape is not a tuple"))?;
    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| invalid(format!("bad shape entry {:?}", s)))
        })
        .collect()
}

/// Text following `'name':` in the header dict.
fn field<'a>(header: &'a str, name: &str) -> Result<&'a str, DecodeError> {
    let key = format!("'{}'", name);
    let pos = header
        .find(&key)
        .ok_or_else(|| invalid(format!("header has no {:?}", name)))?;
    let rest = header[pos + key.len()..].trim_start();
    let rest = rest
        .strip_prefix(':')
        .ok_or_else(|| invalid(format!("malformed {:?} entry", name)))?;
    Ok(rest.trim_start())
}

fn quoted(text: &str) -> Result<&str, DecodeError> {
    let quote = text
        .chars()
        .next()
        .filter(|c| *c == '\'' || *c == '"')
        .ok_or_else(|| invalid("expected a quoted string"))?;
    text[1..]
        .split(quote)
        .next()
        .ok_or_else(|| invalid("unterminated string"))
}

fn invalid(message: impl Into<String>) -> DecodeError {
    DecodeError::ArrayContainer(message.into())
}
