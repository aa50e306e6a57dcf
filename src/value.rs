//! In-memory value tree.
//!
//! [`Value`] is the closed set of kinds the codec understands. Maps keep
//! insertion order for deterministic output but compare as unordered
//! collections, and keys are either strings or integers.
//!
//! Numeric arrays are stored as [`NdArray`]: an element type, a shape and a
//! row-major little-endian byte buffer. Images are not a separate kind; an
//! image is an `NdArray` of shape `(height, width)` or
//! `(height, width, channels)` holding `u8` pixels or `f32` values in `[0, 1]`.

use std::fmt;

use serde_json::Number;

use crate::error::InputError;

// =============================================================================
// Element Types
// =============================================================================

/// Element type of an [`NdArray`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl DType {
    /// Size of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            DType::Bool | DType::U8 | DType::I8 => 1,
            DType::U16 | DType::I16 => 2,
            DType::U32 | DType::I32 | DType::F32 => 4,
            DType::U64 | DType::I64 | DType::F64 => 8,
        }
    }

    /// Short lowercase name, used in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::U8 => "u8",
            DType::I8 => "i8",
            DType::U16 => "u16",
            DType::I16 => "i16",
            DType::U32 => "u32",
            DType::I32 => "i32",
            DType::U64 => "u64",
            DType::I64 => "i64",
            DType::F32 => "f32",
            DType::F64 => "f64",
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// NdArray
// =============================================================================

/// An n-dimensional numeric array in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    dtype: DType,
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl NdArray {
    /// Create an array from raw little-endian bytes.
    ///
    /// Fails if `data` does not hold exactly `product(shape)` elements, or if
    /// that product does not fit in memory.
    pub fn new(dtype: DType, shape: Vec<usize>, data: Vec<u8>) -> Result<Self, InputError> {
        let Some(expected) = byte_len(dtype, &shape) else {
            return Err(InputError::ArraySize {
                dtype: dtype.name(),
                shape,
            });
        };
        if data.len() != expected {
            return Err(InputError::ArrayLength {
                dtype: dtype.name(),
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { dtype, shape, data })
    }

    /// Create a `u8` array.
    pub fn from_u8(shape: Vec<usize>, data: Vec<u8>) -> Result<Self, InputError> {
        Self::new(DType::U8, shape, data)
    }

    /// Create an `f32` array from values.
    pub fn from_f32(shape: Vec<usize>, values: &[f32]) -> Result<Self, InputError> {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::new(DType::F32, shape, data)
    }

    /// Create an `f64` array from values.
    pub fn from_f64(shape: Vec<usize>, values: &[f64]) -> Result<Self, InputError> {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::new(DType::F64, shape, data)
    }

    /// Create an `i64` array from values.
    pub fn from_i64(shape: Vec<usize>, values: &[i64]) -> Result<Self, InputError> {
        let data = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::new(DType::I64, shape, data)
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Raw row-major little-endian bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len() / self.dtype.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reinterpret the buffer under a new shape with the same element count.
    pub fn reshape(self, shape: Vec<usize>) -> Result<Self, InputError> {
        Self::new(self.dtype, shape, self.data)
    }

    /// Drop every axis of length 1.
    pub fn squeeze(mut self) -> Self {
        self.shape.retain(|&d| d != 1);
        self
    }

    /// Element values widened to `f64`.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        let size = self.dtype.size();
        self.data
            .chunks_exact(size)
            .map(|c| match self.dtype {
                DType::Bool => f64::from(u8::from(c[0] != 0)),
                DType::U8 => f64::from(c[0]),
                DType::I8 => f64::from(c[0] as i8),
                DType::U16 => f64::from(u16::from_le_bytes([c[0], c[1]])),
                DType::I16 => f64::from(i16::from_le_bytes([c[0], c[1]])),
                DType::U32 => f64::from(u32::from_le_bytes([c[0], c[1], c[2], c[3]])),
                DType::I32 => f64::from(i32::from_le_bytes([c[0], c[1], c[2], c[3]])),
                DType::F32 => f64::from(f32::from_le_bytes([c[0], c[1], c[2], c[3]])),
                DType::U64 => u64::from_le_bytes(eight(c)) as f64,
                DType::I64 => i64::from_le_bytes(eight(c)) as f64,
                DType::F64 => f64::from_le_bytes(eight(c)),
            })
            .collect()
    }

    /// Quantize values in `[0, 1]` to `u8` by scaling with 255 and clipping.
    pub fn quantize_unit(&self) -> NdArray {
        let data = self
            .to_f64_vec()
            .into_iter()
            .map(|v| (v * 255.0).clamp(0.0, 255.0).round() as u8)
            .collect();
        NdArray {
            dtype: DType::U8,
            shape: self.shape.clone(),
            data,
        }
    }

    /// Map `u8` values back to `f32` in `[0, 1]`.
    pub fn dequantize_unit(&self) -> NdArray {
        let data = self
            .to_f64_vec()
            .into_iter()
            .flat_map(|v| (v as f32 / 255.0).to_le_bytes())
            .collect();
        NdArray {
            dtype: DType::F32,
            shape: self.shape.clone(),
            data,
        }
    }

    /// Split the last axis at `at`, returning the leading block and, when any
    /// channels remain, the trailing block.
    pub fn split_channels(&self, at: usize) -> (NdArray, Option<NdArray>) {
        let channels = self.shape.last().copied().unwrap_or(0);
        let at = at.min(channels);
        let size = self.dtype.size();
        let pixel = channels * size;

        let mut head = Vec::with_capacity(self.len() / channels.max(1) * at * size);
        let mut tail = Vec::with_capacity(self.len() / channels.max(1) * (channels - at) * size);
        if pixel > 0 {
            for chunk in self.data.chunks_exact(pixel) {
                head.extend_from_slice(&chunk[..at * size]);
                tail.extend_from_slice(&chunk[at * size..]);
            }
        }

        let mut head_shape = self.shape.clone();
        let mut tail_shape = self.shape.clone();
        if let Some(last) = head_shape.last_mut() {
            *last = at;
        }
        if let Some(last) = tail_shape.last_mut() {
            *last = channels - at;
        }

        let head = NdArray {
            dtype: self.dtype,
            shape: head_shape,
            data: head,
        };
        let tail = (channels > at).then(|| NdArray {
            dtype: self.dtype,
            shape: tail_shape,
            data: tail,
        });
        (head, tail)
    }

    /// Concatenate two arrays along the last axis.
    pub fn concat_channels(&self, other: &NdArray) -> Result<NdArray, InputError> {
        if self.dtype != other.dtype {
            return Err(InputError::Concat(format!(
                "element types differ ({} vs {})",
                self.dtype, other.dtype
            )));
        }
        let (a_lead, a_last) = split_last(&self.shape)?;
        let (b_lead, b_last) = split_last(&other.shape)?;
        if a_lead != b_lead {
            return Err(InputError::Concat(format!(
                "leading axes differ ({:?} vs {:?})",
                self.shape, other.shape
            )));
        }

        let size = self.dtype.size();
        let mut data = Vec::with_capacity(self.data.len() + other.data.len());
        let pixels = a_lead.iter().product::<usize>();
        for i in 0..pixels {
            data.extend_from_slice(&self.data[i * a_last * size..(i + 1) * a_last * size]);
            data.extend_from_slice(&other.data[i * b_last * size..(i + 1) * b_last * size]);
        }

        let mut shape = a_lead.to_vec();
        shape.push(a_last + b_last);
        Ok(NdArray {
            dtype: self.dtype,
            shape,
            data,
        })
    }
}

/// Buffer size for `shape`, or `None` when it overflows `usize`.
fn byte_len(dtype: DType, shape: &[usize]) -> Option<usize> {
    if shape.contains(&0) {
        return Some(0);
    }
    shape
        .iter()
        .try_fold(dtype.size(), |acc, &dim| acc.checked_mul(dim))
}

fn eight(c: &[u8]) -> [u8; 8] {
    [c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]
}

fn split_last(shape: &[usize]) -> Result<(&[usize], usize), InputError> {
    shape
        .split_last()
        .map(|(last, lead)| (lead, *last))
        .ok_or_else(|| InputError::Concat("zero-dimensional array".to_string()))
}

// =============================================================================
// Keys and Maps
// =============================================================================

/// A map key: either a string or an integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(i) => write!(f, "{}", i),
            Key::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Key::Int(v)
    }
}

impl From<i32> for Key {
    fn from(v: i32) -> Self {
        Key::Int(i64::from(v))
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key::Str(v.to_string())
    }
}

impl From<String> for Key {
    fn from(v: String) -> Self {
        Key::Str(v)
    }
}

/// Insertion-ordered map with unique keys.
///
/// Equality ignores entry order.
#[derive(Debug, Clone, Default)]
pub struct Map {
    entries: Vec<(Key, Value)>,
}

impl Map {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, replacing and returning the old value for an existing key.
    pub fn insert(&mut self, key: impl Into<Key>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<Key>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: impl Into<Key>) -> Option<&Value> {
        let key = key.into();
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Value)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.entries.iter().map(|(k, _)| k)
    }
}

impl PartialEq for Map {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.get(k.clone()) == Some(v))
    }
}

impl<K: Into<Key>, V: Into<Value>> FromIterator<(K, V)> for Map {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Map::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

impl IntoIterator for Map {
    type Item = (Key, Value);
    type IntoIter = std::vec::IntoIter<(Key, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

// =============================================================================
// Value
// =============================================================================

/// A node in the value tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(NdArray),
    Sequence(Vec<Value>),
    Map(Map),
}

impl Value {
    /// Name of the value's kind, for summaries and messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Sequence(_) => "sequence",
            Value::Map(_) => "map",
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&NdArray> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(v.into())
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(v.into())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Number(v.into())
    }
}

/// Non-finite floats have no JSON form and become [`Value::Null`].
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Number::from_f64(v).map_or(Value::Null, Value::Number)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<NdArray> for Value {
    fn from(v: NdArray) -> Self {
        Value::Array(v)
    }
}

impl From<Map> for Value {
    fn from(v: Map) -> Self {
        Value::Map(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Sequence(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
