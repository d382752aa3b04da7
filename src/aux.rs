//! ## Auxiliary field typing
//!
//! Beyond the fixed primary columns, a slow5 file may carry any number of
//! user-defined auxiliary columns. Their types come from a closed catalog:
//! eleven scalar kinds (signed and unsigned integers of 8 to 64 bits, both
//! float widths and a single character), one array kind per scalar kind,
//! and a distinguished length-prefixed `string` kind.
//!
//! The catalog is laid out so that subtracting a fixed offset from an array
//! tag yields the tag of its element kind. Each scalar kind designates a
//! missing-value sentinel: the type maximum for integers, a quiet NaN for
//! floats and NUL for characters. Arrays and strings represent the missing
//! value as length zero, spelled `.` in the ASCII form.

use crate::{
    binary_parsing as bp, error::Slow5Error, FlexString, Result, MISSING_FIELD, SEP_ARRAY,
};

use itertools::Itertools;
use once_cell::sync::Lazy;

use std::collections::HashMap;
use std::mem;
use std::str;

/// Distance between an array type tag and the tag of its element kind.
pub(crate) const ARRAY_TAG_OFFSET: u8 = 11;

/// The kind of an auxiliary field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AuxType {
    Int8 = 0,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float,
    Double,
    Char,

    Int8Array,
    Int16Array,
    Int32Array,
    Int64Array,
    Uint8Array,
    Uint16Array,
    Uint32Array,
    Uint64Array,
    FloatArray,
    DoubleArray,
    String,
}

pub(crate) const ALL_AUX_TYPES: [AuxType; 22] = [
    AuxType::Int8,
    AuxType::Int16,
    AuxType::Int32,
    AuxType::Int64,
    AuxType::Uint8,
    AuxType::Uint16,
    AuxType::Uint32,
    AuxType::Uint64,
    AuxType::Float,
    AuxType::Double,
    AuxType::Char,
    AuxType::Int8Array,
    AuxType::Int16Array,
    AuxType::Int32Array,
    AuxType::Int64Array,
    AuxType::Uint8Array,
    AuxType::Uint16Array,
    AuxType::Uint32Array,
    AuxType::Uint64Array,
    AuxType::FloatArray,
    AuxType::DoubleArray,
    AuxType::String,
];

static NAME_TO_TYPE: Lazy<HashMap<&'static str, AuxType>> =
    Lazy::new(|| ALL_AUX_TYPES.iter().map(|&t| (t.name(), t)).collect());

impl AuxType {
    /// The wire tag stored in the binary aux schema block.
    pub(crate) fn tag(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_tag(tag: u8) -> Result<Self> {
        ALL_AUX_TYPES
            .get(tag as usize)
            .copied()
            .ok_or(Slow5Error::UnknownTypeTag(tag))
    }

    /// Byte size of one element of this kind.
    pub fn size(self) -> usize {
        use AuxType::*;
        match self {
            Int8 | Uint8 | Char | Int8Array | Uint8Array | String => 1,
            Int16 | Uint16 | Int16Array | Uint16Array => 2,
            Int32 | Uint32 | Float | Int32Array | Uint32Array | FloatArray => {
                mem::size_of::<i32>()
            }
            Int64 | Uint64 | Double | Int64Array | Uint64Array | DoubleArray => {
                mem::size_of::<i64>()
            }
        }
    }

    pub fn is_array(self) -> bool {
        self.tag() >= ARRAY_TAG_OFFSET
    }

    /// The element kind of an array type. Scalar kinds map to themselves.
    pub fn to_scalar(self) -> Self {
        use AuxType::*;
        match self {
            Int8Array => Int8,
            Int16Array => Int16,
            Int32Array => Int32,
            Int64Array => Int64,
            Uint8Array => Uint8,
            Uint16Array => Uint16,
            Uint32Array => Uint32,
            Uint64Array => Uint64,
            FloatArray => Float,
            DoubleArray => Double,
            String => Char,
            scalar => scalar,
        }
    }

    /// The type name used in the ASCII column type line, e.g. `int16_t*`.
    pub fn name(self) -> &'static str {
        use AuxType::*;
        match self {
            Int8 => "int8_t",
            Int16 => "int16_t",
            Int32 => "int32_t",
            Int64 => "int64_t",
            Uint8 => "uint8_t",
            Uint16 => "uint16_t",
            Uint32 => "uint32_t",
            Uint64 => "uint64_t",
            Float => "float",
            Double => "double",
            Char => "char",
            Int8Array => "int8_t*",
            Int16Array => "int16_t*",
            Int32Array => "int32_t*",
            Int64Array => "int64_t*",
            Uint8Array => "uint8_t*",
            Uint16Array => "uint16_t*",
            Uint32Array => "uint32_t*",
            Uint64Array => "uint64_t*",
            FloatArray => "float*",
            DoubleArray => "double*",
            String => "char*",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        NAME_TO_TYPE.get(name).copied()
    }
}

/// A single typed auxiliary value.
///
/// Scalar variants hold one element, array variants a vector of elements.
/// The missing value of a scalar kind is its sentinel, the missing value of
/// an array kind is the empty vector.
#[derive(Debug, Clone)]
pub enum AuxValue {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Float(f32),
    Double(f64),
    Char(u8),

    Int8Array(Vec<i8>),
    Int16Array(Vec<i16>),
    Int32Array(Vec<i32>),
    Int64Array(Vec<i64>),
    Uint8Array(Vec<u8>),
    Uint16Array(Vec<u16>),
    Uint32Array(Vec<u32>),
    Uint64Array(Vec<u64>),
    FloatArray(Vec<f32>),
    DoubleArray(Vec<f64>),
    Str(String),
}

/// Floats compare bitwise: NaN is their missing sentinel and two missing
/// values must compare equal.
impl PartialEq for AuxValue {
    fn eq(&self, other: &Self) -> bool {
        use AuxValue::*;
        match (self, other) {
            (Int8(a), Int8(b)) => a == b,
            (Int16(a), Int16(b)) => a == b,
            (Int32(a), Int32(b)) => a == b,
            (Int64(a), Int64(b)) => a == b,
            (Uint8(a), Uint8(b)) => a == b,
            (Uint16(a), Uint16(b)) => a == b,
            (Uint32(a), Uint32(b)) => a == b,
            (Uint64(a), Uint64(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Double(a), Double(b)) => a.to_bits() == b.to_bits(),
            (Char(a), Char(b)) => a == b,
            (Int8Array(a), Int8Array(b)) => a == b,
            (Int16Array(a), Int16Array(b)) => a == b,
            (Int32Array(a), Int32Array(b)) => a == b,
            (Int64Array(a), Int64Array(b)) => a == b,
            (Uint8Array(a), Uint8Array(b)) => a == b,
            (Uint16Array(a), Uint16Array(b)) => a == b,
            (Uint32Array(a), Uint32Array(b)) => a == b,
            (Uint64Array(a), Uint64Array(b)) => a == b,
            (FloatArray(a), FloatArray(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (DoubleArray(a), DoubleArray(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (Str(a), Str(b)) => a == b,
            _ => false,
        }
    }
}

fn parse_scalar<T: str::FromStr>(text: &str) -> Result<T> {
    text.parse::<T>()
        .map_err(|_| Slow5Error::Parse(format!("invalid field literal '{}'", text)))
}

fn parse_array<T: str::FromStr>(text: &str) -> Result<Vec<T>> {
    text.split(SEP_ARRAY).map(parse_scalar).collect()
}

impl AuxValue {
    pub fn aux_type(&self) -> AuxType {
        use AuxValue::*;
        match self {
            Int8(_) => AuxType::Int8,
            Int16(_) => AuxType::Int16,
            Int32(_) => AuxType::Int32,
            Int64(_) => AuxType::Int64,
            Uint8(_) => AuxType::Uint8,
            Uint16(_) => AuxType::Uint16,
            Uint32(_) => AuxType::Uint32,
            Uint64(_) => AuxType::Uint64,
            Float(_) => AuxType::Float,
            Double(_) => AuxType::Double,
            Char(_) => AuxType::Char,
            Int8Array(_) => AuxType::Int8Array,
            Int16Array(_) => AuxType::Int16Array,
            Int32Array(_) => AuxType::Int32Array,
            Int64Array(_) => AuxType::Int64Array,
            Uint8Array(_) => AuxType::Uint8Array,
            Uint16Array(_) => AuxType::Uint16Array,
            Uint32Array(_) => AuxType::Uint32Array,
            Uint64Array(_) => AuxType::Uint64Array,
            FloatArray(_) => AuxType::FloatArray,
            DoubleArray(_) => AuxType::DoubleArray,
            Str(_) => AuxType::String,
        }
    }

    /// Number of elements held: 1 for scalars, the vector length for arrays.
    pub fn len(&self) -> u64 {
        use AuxValue::*;
        match self {
            Int8Array(v) => v.len() as u64,
            Int16Array(v) => v.len() as u64,
            Int32Array(v) => v.len() as u64,
            Int64Array(v) => v.len() as u64,
            Uint8Array(v) => v.len() as u64,
            Uint16Array(v) => v.len() as u64,
            Uint32Array(v) => v.len() as u64,
            Uint64Array(v) => v.len() as u64,
            FloatArray(v) => v.len() as u64,
            DoubleArray(v) => v.len() as u64,
            Str(s) => s.len() as u64,
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total payload size in bytes, excluding the length prefix.
    pub fn byte_len(&self) -> u64 {
        self.len() * self.aux_type().size() as u64
    }

    /// The missing value of the given kind.
    pub fn missing(aux_type: AuxType) -> Self {
        use AuxType::*;
        match aux_type {
            Int8 => AuxValue::Int8(i8::MAX),
            Int16 => AuxValue::Int16(i16::MAX),
            Int32 => AuxValue::Int32(i32::MAX),
            Int64 => AuxValue::Int64(i64::MAX),
            Uint8 => AuxValue::Uint8(u8::MAX),
            Uint16 => AuxValue::Uint16(u16::MAX),
            Uint32 => AuxValue::Uint32(u32::MAX),
            Uint64 => AuxValue::Uint64(u64::MAX),
            Float => AuxValue::Float(f32::NAN),
            Double => AuxValue::Double(f64::NAN),
            Char => AuxValue::Char(0),
            Int8Array => AuxValue::Int8Array(Vec::new()),
            Int16Array => AuxValue::Int16Array(Vec::new()),
            Int32Array => AuxValue::Int32Array(Vec::new()),
            Int64Array => AuxValue::Int64Array(Vec::new()),
            Uint8Array => AuxValue::Uint8Array(Vec::new()),
            Uint16Array => AuxValue::Uint16Array(Vec::new()),
            Uint32Array => AuxValue::Uint32Array(Vec::new()),
            Uint64Array => AuxValue::Uint64Array(Vec::new()),
            FloatArray => AuxValue::FloatArray(Vec::new()),
            DoubleArray => AuxValue::DoubleArray(Vec::new()),
            String => AuxValue::Str(std::string::String::new()),
        }
    }

    /// Whether the value is its kind's missing sentinel.
    pub fn is_missing(&self) -> bool {
        use AuxValue::*;
        match self {
            Int8(v) => *v == i8::MAX,
            Int16(v) => *v == i16::MAX,
            Int32(v) => *v == i32::MAX,
            Int64(v) => *v == i64::MAX,
            Uint8(v) => *v == u8::MAX,
            Uint16(v) => *v == u16::MAX,
            Uint32(v) => *v == u32::MAX,
            Uint64(v) => *v == u64::MAX,
            Float(v) => v.is_nan(),
            Double(v) => v.is_nan(),
            Char(v) => *v == 0,
            _ => self.is_empty(),
        }
    }

    /// Parse one ASCII column of the given kind. The single literal `.`
    /// denotes the missing value.
    pub(crate) fn parse_text(aux_type: AuxType, text: &str) -> Result<Self> {
        if text == MISSING_FIELD {
            return Ok(Self::missing(aux_type));
        }
        use AuxType::*;
        let value = match aux_type {
            Int8 => AuxValue::Int8(parse_scalar(text)?),
            Int16 => AuxValue::Int16(parse_scalar(text)?),
            Int32 => AuxValue::Int32(parse_scalar(text)?),
            Int64 => AuxValue::Int64(parse_scalar(text)?),
            Uint8 => AuxValue::Uint8(parse_scalar(text)?),
            Uint16 => AuxValue::Uint16(parse_scalar(text)?),
            Uint32 => AuxValue::Uint32(parse_scalar(text)?),
            Uint64 => AuxValue::Uint64(parse_scalar(text)?),
            Float => AuxValue::Float(parse_scalar(text)?),
            Double => AuxValue::Double(parse_scalar(text)?),
            Char => {
                let bytes = text.as_bytes();
                if bytes.len() != 1 {
                    return Err(Slow5Error::Parse(format!(
                        "expected a single character, found '{}'",
                        text
                    )));
                }
                AuxValue::Char(bytes[0])
            }
            Int8Array => AuxValue::Int8Array(parse_array(text)?),
            Int16Array => AuxValue::Int16Array(parse_array(text)?),
            Int32Array => AuxValue::Int32Array(parse_array(text)?),
            Int64Array => AuxValue::Int64Array(parse_array(text)?),
            Uint8Array => AuxValue::Uint8Array(parse_array(text)?),
            Uint16Array => AuxValue::Uint16Array(parse_array(text)?),
            Uint32Array => AuxValue::Uint32Array(parse_array(text)?),
            Uint64Array => AuxValue::Uint64Array(parse_array(text)?),
            FloatArray => AuxValue::FloatArray(parse_array(text)?),
            DoubleArray => AuxValue::DoubleArray(parse_array(text)?),
            String => AuxValue::Str(text.to_string()),
        };
        Ok(value)
    }

    /// Emit one ASCII column. The missing value of any kind is spelled `.`,
    /// array elements are comma-separated.
    pub(crate) fn emit_text(&self) -> String {
        if self.is_missing() {
            return MISSING_FIELD.to_string();
        }
        use AuxValue::*;
        match self {
            Int8(v) => v.to_string(),
            Int16(v) => v.to_string(),
            Int32(v) => v.to_string(),
            Int64(v) => v.to_string(),
            Uint8(v) => v.to_string(),
            Uint16(v) => v.to_string(),
            Uint32(v) => v.to_string(),
            Uint64(v) => v.to_string(),
            Float(v) => v.to_string(),
            Double(v) => v.to_string(),
            Char(v) => (*v as char).to_string(),
            Int8Array(v) => v.iter().join(SEP_ARRAY),
            Int16Array(v) => v.iter().join(SEP_ARRAY),
            Int32Array(v) => v.iter().join(SEP_ARRAY),
            Int64Array(v) => v.iter().join(SEP_ARRAY),
            Uint8Array(v) => v.iter().join(SEP_ARRAY),
            Uint16Array(v) => v.iter().join(SEP_ARRAY),
            Uint32Array(v) => v.iter().join(SEP_ARRAY),
            Uint64Array(v) => v.iter().join(SEP_ARRAY),
            FloatArray(v) => v.iter().join(SEP_ARRAY),
            DoubleArray(v) => v.iter().join(SEP_ARRAY),
            Str(s) => s.clone(),
        }
    }

    /// Read one binary field of the given kind from the front of `input`:
    /// a `u64` element count followed by count × element-size bytes.
    /// Returns the value along with the rest of the slice.
    pub(crate) fn read_binary(aux_type: AuxType, input: &[u8]) -> Result<(Self, &[u8])> {
        let (len, input) = bp::take_u64(input)?;
        let n = len as usize;
        let byte_len = n.checked_mul(aux_type.size()).ok_or_else(|| {
            Slow5Error::Parse(format!("field length {} overflows", len))
        })?;
        let (data, rest) = bp::take(byte_len, input)?;

        if !aux_type.is_array() && n != 1 {
            return Err(Slow5Error::Parse(format!(
                "scalar field of kind {} has element count {}",
                aux_type.name(),
                len
            )));
        }

        use AuxType::*;
        let value = match aux_type {
            Int8 => AuxValue::Int8(data[0] as i8),
            Int16 => AuxValue::Int16(bp::read_i16(data)),
            Int32 => AuxValue::Int32(bp::read_i32(data)),
            Int64 => AuxValue::Int64(bp::read_i64(data)),
            Uint8 => AuxValue::Uint8(data[0]),
            Uint16 => AuxValue::Uint16(bp::read_u16(data)),
            Uint32 => AuxValue::Uint32(bp::read_u32(data)),
            Uint64 => AuxValue::Uint64(bp::read_u64(data)),
            Float => AuxValue::Float(bp::read_f32(data)),
            Double => AuxValue::Double(bp::read_f64(data)),
            Char => AuxValue::Char(data[0]),
            Int8Array => AuxValue::Int8Array(data.iter().map(|&b| b as i8).collect()),
            Int16Array => {
                AuxValue::Int16Array(data.chunks_exact(2).map(bp::read_i16).collect())
            }
            Int32Array => {
                AuxValue::Int32Array(data.chunks_exact(4).map(bp::read_i32).collect())
            }
            Int64Array => {
                AuxValue::Int64Array(data.chunks_exact(8).map(bp::read_i64).collect())
            }
            Uint8Array => AuxValue::Uint8Array(data.to_vec()),
            Uint16Array => {
                AuxValue::Uint16Array(data.chunks_exact(2).map(bp::read_u16).collect())
            }
            Uint32Array => {
                AuxValue::Uint32Array(data.chunks_exact(4).map(bp::read_u32).collect())
            }
            Uint64Array => {
                AuxValue::Uint64Array(data.chunks_exact(8).map(bp::read_u64).collect())
            }
            FloatArray => {
                AuxValue::FloatArray(data.chunks_exact(4).map(bp::read_f32).collect())
            }
            DoubleArray => {
                AuxValue::DoubleArray(data.chunks_exact(8).map(bp::read_f64).collect())
            }
            String => AuxValue::Str(str::from_utf8(data)?.to_string()),
        };
        Ok((value, rest))
    }

    /// Append the binary form to `out`: element count as `u64`, then the
    /// little-endian elements. Strings store no NUL terminator.
    pub(crate) fn write_binary(&self, out: &mut Vec<u8>) {
        bp::push_u64(out, self.len());
        use AuxValue::*;
        match self {
            Int8(v) => out.push(*v as u8),
            Int16(v) => out.extend_from_slice(&v.to_le_bytes()),
            Int32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Int64(v) => out.extend_from_slice(&v.to_le_bytes()),
            Uint8(v) => out.push(*v),
            Uint16(v) => out.extend_from_slice(&v.to_le_bytes()),
            Uint32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Uint64(v) => out.extend_from_slice(&v.to_le_bytes()),
            Float(v) => out.extend_from_slice(&v.to_le_bytes()),
            Double(v) => out.extend_from_slice(&v.to_le_bytes()),
            Char(v) => out.push(*v),
            Int8Array(v) => out.extend(v.iter().map(|&e| e as u8)),
            Int16Array(v) => v.iter().for_each(|e| out.extend_from_slice(&e.to_le_bytes())),
            Int32Array(v) => v.iter().for_each(|e| out.extend_from_slice(&e.to_le_bytes())),
            Int64Array(v) => v.iter().for_each(|e| out.extend_from_slice(&e.to_le_bytes())),
            Uint8Array(v) => out.extend_from_slice(v),
            Uint16Array(v) => v.iter().for_each(|e| out.extend_from_slice(&e.to_le_bytes())),
            Uint32Array(v) => v.iter().for_each(|e| out.extend_from_slice(&e.to_le_bytes())),
            Uint64Array(v) => v.iter().for_each(|e| out.extend_from_slice(&e.to_le_bytes())),
            FloatArray(v) => v.iter().for_each(|e| out.extend_from_slice(&e.to_le_bytes())),
            DoubleArray(v) => v.iter().for_each(|e| out.extend_from_slice(&e.to_le_bytes())),
            Str(s) => out.extend_from_slice(s.as_bytes()),
        }
    }
}

/// One entry of an auxiliary schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: FlexString,
    aux_type: AuxType,
    size: usize,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aux_type(&self) -> AuxType {
        self.aux_type
    }

    /// Element byte size of the field's kind.
    pub fn size(&self) -> usize {
        self.size
    }
}

/// The ordered auxiliary field schema of a file.
///
/// Field order is the wire order of the aux block in every record. Names
/// are unique. Once the owning header has been handed to a file handle the
/// schema no longer changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuxSchema {
    fields: Vec<Field>,
    positions: HashMap<FlexString, usize>,
}

impl AuxSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field. Duplicate names are rejected.
    pub fn add(&mut self, name: &str, aux_type: AuxType) -> Result<()> {
        crate::error::track(self.add_inner(name, aux_type))
    }

    fn add_inner(&mut self, name: &str, aux_type: AuxType) -> Result<()> {
        if self.positions.contains_key(name) {
            return Err(Slow5Error::DuplicateField(name.to_string()));
        }
        self.positions
            .insert(FlexString::from(name), self.fields.len());
        self.fields.push(Field {
            name: FlexString::from(name),
            aux_type,
            size: aux_type.size(),
        });
        Ok(())
    }

    /// Wire position of a field.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.position(name).map(|pos| &self.fields[pos])
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_tags_mirror_scalar_tags() {
        for &t in &ALL_AUX_TYPES {
            if t.is_array() {
                assert_eq!(t.to_scalar().tag(), t.tag() - ARRAY_TAG_OFFSET);
                assert_eq!(t.size(), t.to_scalar().size());
            } else {
                assert_eq!(t.to_scalar(), t);
            }
        }
    }

    #[test]
    fn names_round_trip() {
        for &t in &ALL_AUX_TYPES {
            assert_eq!(AuxType::from_name(t.name()), Some(t));
            assert_eq!(AuxType::from_tag(t.tag()).unwrap(), t);
        }
        assert_eq!(AuxType::from_name("int128_t"), None);
        assert!(AuxType::from_tag(22).is_err());
    }

    #[test]
    fn sentinels_round_trip_as_text() {
        for &t in &ALL_AUX_TYPES {
            let missing = AuxValue::missing(t);
            assert!(missing.is_missing(), "{:?}", t);
            assert_eq!(missing.emit_text(), MISSING_FIELD);
            let reparsed = AuxValue::parse_text(t, MISSING_FIELD).unwrap();
            assert!(reparsed.is_missing(), "{:?}", t);
        }
    }

    #[test]
    fn scalar_text_round_trip() {
        let value = AuxValue::parse_text(AuxType::Int32, "-1250").unwrap();
        assert_eq!(value, AuxValue::Int32(-1250));
        assert_eq!(value.emit_text(), "-1250");

        let median = AuxValue::parse_text(AuxType::Double, "238.5").unwrap();
        assert_eq!(median.emit_text(), "238.5");

        let strand = AuxValue::parse_text(AuxType::Char, "+").unwrap();
        assert_eq!(strand, AuxValue::Char(b'+'));
        assert_eq!(strand.emit_text(), "+");
    }

    #[test]
    fn array_text_round_trip() {
        let value = AuxValue::parse_text(AuxType::Int16Array, "3,-4,1200").unwrap();
        assert_eq!(value, AuxValue::Int16Array(vec![3, -4, 1200]));
        assert_eq!(value.emit_text(), "3,-4,1200");
        assert!(AuxValue::parse_text(AuxType::Int16Array, "3,x").is_err());
    }

    #[test]
    fn binary_round_trip() {
        let values = vec![
            AuxValue::Uint8(42),
            AuxValue::Int64(-9000000),
            AuxValue::Double(0.25),
            AuxValue::Uint32Array(vec![1, 2, 3]),
            AuxValue::Str("template".to_string()),
            AuxValue::missing(AuxType::Uint16),
            AuxValue::missing(AuxType::DoubleArray),
            AuxValue::missing(AuxType::String),
        ];
        for value in values {
            let mut out = Vec::new();
            value.write_binary(&mut out);
            let (reread, rest) = AuxValue::read_binary(value.aux_type(), &out).unwrap();
            assert!(rest.is_empty());
            assert_eq!(reread.is_missing(), value.is_missing());
            if !value.is_missing() {
                assert_eq!(reread, value);
            }
        }
    }

    #[test]
    fn schema_rejects_duplicates() {
        let mut schema = AuxSchema::new();
        schema.add("median_before", AuxType::Double).unwrap();
        schema.add("read_number", AuxType::Int32).unwrap();
        assert!(schema.add("median_before", AuxType::Double).is_err());

        assert_eq!(schema.len(), 2);
        assert_eq!(schema.position("read_number"), Some(1));
        assert_eq!(schema.get("median_before").unwrap().aux_type(), AuxType::Double);
        assert_eq!(schema.get("nope"), None);
    }
}
