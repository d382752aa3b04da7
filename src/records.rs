//! ## The slow5 record
//!
//! One record holds the signal of a single read: eight fixed primary
//! columns followed by the auxiliary fields declared in the file's schema.
//! The plaintext binary payload is laid out as:
//!
//! ```text
//! +-------------+---------+------------+--------------+--------+-------+
//! | read_id_len | read_id | read_group | digitisation | offset | range |
//! +-------------+---------+------------+--------------+--------+-------+
//! |     u16     |   var   |    u32     |     f64      |  f64   |  f64  |
//! +-------------+---------+------------+--------------+--------+-------+
//! +---------------+----------------+------------+-----------------+
//! | sampling_rate | len_raw_signal | raw_signal |   aux fields    |
//! +---------------+----------------+------------+-----------------+
//! |      f64      |      u64       |  len × i16 | in schema order |
//! +---------------+----------------+------------+-----------------+
//! ```
//!
//! On disk the payload sits behind a `u64` size prefix and is compressed
//! under the file's method; the prefix stores the compressed length. The
//! ASCII form is one tab-separated line with the same columns, the raw
//! signal and array fields comma-separated and `.` for missing values.

use crate::{
    aux::{AuxSchema, AuxType, AuxValue},
    binary_parsing as bp,
    error::Slow5Error,
    press::Press,
    FlexString, Format, Result, MISSING_FIELD, SEP_ARRAY, SEP_COL,
};

use itertools::Itertools;

use std::collections::HashMap;
use std::convert::TryFrom;
use std::mem;
use std::str::FromStr;

/// The fixed primary columns, in wire order.
pub(crate) const PRIMARY_COL_NAMES: [&str; 8] = [
    "read_id",
    "read_group",
    "digitisation",
    "offset",
    "range",
    "sampling_rate",
    "len_raw_signal",
    "raw_signal",
];

/// The column types matching [`PRIMARY_COL_NAMES`].
pub(crate) const PRIMARY_COL_TYPES: [&str; 8] = [
    "char*",
    "uint32_t",
    "double",
    "double",
    "double",
    "double",
    "uint64_t",
    "int16_t*",
];

macro_rules! aux_scalar_getter {
    ($(#[$meta:meta])* $fn_name:ident, $variant:ident, $ty:ty, $missing:expr) => {
        $(#[$meta])*
        pub fn $fn_name(&self, name: &str) -> Result<$ty> {
            crate::error::track(match self.aux.get(name) {
                None => Err(Slow5Error::FieldNotFound(name.to_string())),
                Some(AuxValue::$variant(v)) if $missing(v) => {
                    Err(Slow5Error::MissingValue(name.to_string()))
                }
                Some(AuxValue::$variant(v)) => Ok(*v),
                Some(other) => Err(Slow5Error::AuxTypeMismatch {
                    name: name.to_string(),
                    expected: AuxType::$variant.name(),
                    found: other.aux_type().name(),
                }),
            })
        }
    };
}

macro_rules! aux_array_getter {
    ($(#[$meta:meta])* $fn_name:ident, $variant:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(&self, name: &str) -> Result<&[$ty]> {
            crate::error::track(match self.aux.get(name) {
                None => Err(Slow5Error::FieldNotFound(name.to_string())),
                Some(AuxValue::$variant(v)) if v.is_empty() => {
                    Err(Slow5Error::MissingValue(name.to_string()))
                }
                Some(AuxValue::$variant(v)) => Ok(v.as_slice()),
                Some(other) => Err(Slow5Error::AuxTypeMismatch {
                    name: name.to_string(),
                    expected: AuxType::$variant.name(),
                    found: other.aux_type().name(),
                }),
            })
        }
    };
}

/// A single read record: the primary columns plus the auxiliary values of
/// the file's schema, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    pub read_id: FlexString,
    pub read_group: u32,
    pub digitisation: f64,
    pub offset: f64,
    pub range: f64,
    pub sampling_rate: f64,
    pub raw_signal: Vec<i16>,
    aux: HashMap<FlexString, AuxValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// The `len_raw_signal` column, the element count of the raw signal.
    pub fn len_raw_signal(&self) -> u64 {
        self.raw_signal.len() as u64
    }

    /// Set an auxiliary value on this record. The value is checked against
    /// the file's schema when the record is written.
    pub fn set_aux(&mut self, name: &str, value: AuxValue) {
        self.aux.insert(FlexString::from(name), value);
    }

    /// The raw auxiliary value under a name, if any.
    pub fn aux_value(&self, name: &str) -> Option<&AuxValue> {
        self.aux.get(name)
    }

    aux_scalar_getter!(
        /// Get an auxiliary field as an 8-bit signed integer. Fails when the
        /// name is unknown, the field has another type, or the value is
        /// missing; the array and other scalar getters behave alike.
        aux_int8, Int8, i8, |v: &i8| *v == i8::MAX
    );
    aux_scalar_getter!(aux_int16, Int16, i16, |v: &i16| *v == i16::MAX);
    aux_scalar_getter!(aux_int32, Int32, i32, |v: &i32| *v == i32::MAX);
    aux_scalar_getter!(aux_int64, Int64, i64, |v: &i64| *v == i64::MAX);
    aux_scalar_getter!(aux_uint8, Uint8, u8, |v: &u8| *v == u8::MAX);
    aux_scalar_getter!(aux_uint16, Uint16, u16, |v: &u16| *v == u16::MAX);
    aux_scalar_getter!(aux_uint32, Uint32, u32, |v: &u32| *v == u32::MAX);
    aux_scalar_getter!(aux_uint64, Uint64, u64, |v: &u64| *v == u64::MAX);
    aux_scalar_getter!(aux_float, Float, f32, |v: &f32| v.is_nan());
    aux_scalar_getter!(aux_double, Double, f64, |v: &f64| v.is_nan());
    aux_scalar_getter!(aux_char, Char, u8, |v: &u8| *v == 0);

    aux_array_getter!(aux_int8_array, Int8Array, i8);
    aux_array_getter!(aux_int16_array, Int16Array, i16);
    aux_array_getter!(aux_int32_array, Int32Array, i32);
    aux_array_getter!(aux_int64_array, Int64Array, i64);
    aux_array_getter!(aux_uint8_array, Uint8Array, u8);
    aux_array_getter!(aux_uint16_array, Uint16Array, u16);
    aux_array_getter!(aux_uint32_array, Uint32Array, u32);
    aux_array_getter!(aux_uint64_array, Uint64Array, u64);
    aux_array_getter!(aux_float_array, FloatArray, f32);
    aux_array_getter!(aux_double_array, DoubleArray, f64);

    /// Get an auxiliary field of the string kind.
    pub fn aux_string(&self, name: &str) -> Result<&str> {
        crate::error::track(match self.aux.get(name) {
            None => Err(Slow5Error::FieldNotFound(name.to_string())),
            Some(AuxValue::Str(s)) if s.is_empty() => {
                Err(Slow5Error::MissingValue(name.to_string()))
            }
            Some(AuxValue::Str(s)) => Ok(s.as_str()),
            Some(other) => Err(Slow5Error::AuxTypeMismatch {
                name: name.to_string(),
                expected: AuxType::String.name(),
                found: other.aux_type().name(),
            }),
        })
    }

    /// Decode a record from its plaintext binary payload.
    pub(crate) fn decode_binary(payload: &[u8], schema: &AuxSchema) -> Result<Record> {
        let (read_id_len, rest) = bp::take_u16(payload)?;
        let (read_id, rest) = bp::take_str(read_id_len as usize, rest)?;
        let (read_group, rest) = bp::take_u32(rest)?;
        let (digitisation, rest) = bp::take_f64(rest)?;
        let (offset, rest) = bp::take_f64(rest)?;
        let (range, rest) = bp::take_f64(rest)?;
        let (sampling_rate, rest) = bp::take_f64(rest)?;
        let (len_raw_signal, rest) = bp::take_u64(rest)?;

        let signal_bytes = (len_raw_signal as usize)
            .checked_mul(mem::size_of::<i16>())
            .ok_or_else(|| Slow5Error::Parse("raw signal length overflows".to_string()))?;
        let (signal, rest) = bp::take(signal_bytes, rest)?;
        let raw_signal = signal.chunks_exact(2).map(bp::read_i16).collect();

        let mut aux = HashMap::new();
        let mut rest = rest;
        for field in schema.fields() {
            let (value, remaining) = AuxValue::read_binary(field.aux_type(), rest)?;
            aux.insert(FlexString::from(field.name()), value);
            rest = remaining;
        }
        if !rest.is_empty() {
            return Err(Slow5Error::Parse(format!(
                "{} trailing bytes in record payload",
                rest.len()
            )));
        }

        Ok(Record {
            read_id,
            read_group,
            digitisation,
            offset,
            range,
            sampling_rate,
            raw_signal,
            aux,
        })
    }

    /// Decode a record from one ASCII line.
    pub(crate) fn decode_ascii(line: &str, schema: &AuxSchema) -> Result<Record> {
        let line = line.strip_suffix('\n').unwrap_or(line);
        let cols: Vec<&str> = line.split(SEP_COL).collect();
        let expected = PRIMARY_COL_NAMES.len() + schema.len();
        if cols.len() != expected {
            return Err(Slow5Error::Parse(format!(
                "expected {} record columns, found {}",
                expected,
                cols.len()
            )));
        }

        if cols[0].is_empty() {
            return Err(Slow5Error::Parse("empty read id".to_string()));
        }
        let read_id = FlexString::from(cols[0]);
        let read_group = parse_col(cols[1], "read_group")?;
        let digitisation = parse_col(cols[2], "digitisation")?;
        let offset = parse_col(cols[3], "offset")?;
        let range = parse_col(cols[4], "range")?;
        let sampling_rate = parse_col(cols[5], "sampling_rate")?;
        let len_raw_signal: u64 = parse_col(cols[6], "len_raw_signal")?;

        let raw_signal: Vec<i16> = if cols[7].is_empty() {
            Vec::new()
        } else {
            cols[7]
                .split(SEP_ARRAY)
                .map(|e| parse_col(e, "raw_signal"))
                .collect::<Result<_>>()?
        };
        if raw_signal.len() as u64 != len_raw_signal {
            return Err(Slow5Error::Parse(format!(
                "len_raw_signal is {} but the signal has {} elements",
                len_raw_signal,
                raw_signal.len()
            )));
        }

        let mut aux = HashMap::new();
        for (field, col) in schema.fields().iter().zip(&cols[PRIMARY_COL_NAMES.len()..]) {
            let value = AuxValue::parse_text(field.aux_type(), col)?;
            aux.insert(FlexString::from(field.name()), value);
        }

        Ok(Record {
            read_id,
            read_group,
            digitisation,
            offset,
            range,
            sampling_rate,
            raw_signal,
            aux,
        })
    }

    /// Emit the full on-disk form of this record: the size-prefixed,
    /// possibly compressed payload in binary, or one `\n`-terminated line
    /// in ASCII.
    pub(crate) fn encode(
        &self,
        format: Format,
        schema: &AuxSchema,
        press: &Press,
    ) -> Result<Vec<u8>> {
        match format {
            Format::Ascii => self.encode_ascii(schema),
            Format::Binary => {
                let payload = self.encode_binary_payload(schema)?;
                let compressed = press.compress(&payload)?;
                let mut out = Vec::with_capacity(8 + compressed.len());
                bp::push_u64(&mut out, compressed.len() as u64);
                out.extend_from_slice(&compressed);
                Ok(out)
            }
            Format::Unknown => Err(Slow5Error::UnknownFormat("record".to_string())),
        }
    }

    fn encode_binary_payload(&self, schema: &AuxSchema) -> Result<Vec<u8>> {
        let read_id_len = u16::try_from(self.read_id.len()).map_err(|_| {
            Slow5Error::Parse(format!("read id of {} bytes is too long", self.read_id.len()))
        })?;

        let mut out = Vec::with_capacity(64 + self.raw_signal.len() * 2);
        bp::push_u16(&mut out, read_id_len);
        out.extend_from_slice(self.read_id.as_bytes());
        bp::push_u32(&mut out, self.read_group);
        bp::push_f64(&mut out, self.digitisation);
        bp::push_f64(&mut out, self.offset);
        bp::push_f64(&mut out, self.range);
        bp::push_f64(&mut out, self.sampling_rate);
        bp::push_u64(&mut out, self.len_raw_signal());
        for sample in &self.raw_signal {
            out.extend_from_slice(&sample.to_le_bytes());
        }

        for field in schema.fields() {
            match self.checked_aux(field.name(), field.aux_type())? {
                Some(value) => value.write_binary(&mut out),
                None => AuxValue::missing(field.aux_type()).write_binary(&mut out),
            }
        }
        Ok(out)
    }

    fn encode_ascii(&self, schema: &AuxSchema) -> Result<Vec<u8>> {
        if self.read_id.is_empty()
            || self.read_id.contains('\t')
            || self.read_id.contains('\n')
        {
            return Err(Slow5Error::Parse(format!(
                "read id '{}' is empty or contains a separator character",
                self.read_id.escape_default()
            )));
        }

        let mut out = String::with_capacity(64 + self.raw_signal.len() * 6);
        out.push_str(&self.read_id);
        push_col(&mut out, self.read_group.to_string());
        push_col(&mut out, self.digitisation.to_string());
        push_col(&mut out, self.offset.to_string());
        push_col(&mut out, self.range.to_string());
        push_col(&mut out, self.sampling_rate.to_string());
        push_col(&mut out, self.len_raw_signal().to_string());
        push_col(&mut out, self.raw_signal.iter().join(SEP_ARRAY));

        for field in schema.fields() {
            let text = match self.checked_aux(field.name(), field.aux_type())? {
                Some(value) => value.emit_text(),
                None => MISSING_FIELD.to_string(),
            };
            if text.contains('\t') || text.contains('\n') {
                return Err(Slow5Error::Parse(format!(
                    "value of field '{}' contains a separator character",
                    field.name()
                )));
            }
            push_col(&mut out, text);
        }

        out.push('\n');
        Ok(out.into_bytes())
    }

    /// Look up an aux value for encoding, enforcing the schema type.
    fn checked_aux(&self, name: &str, expected: AuxType) -> Result<Option<&AuxValue>> {
        match self.aux.get(name) {
            None => Ok(None),
            Some(value) if value.aux_type() == expected => Ok(Some(value)),
            Some(value) => Err(Slow5Error::AuxTypeMismatch {
                name: name.to_string(),
                expected: expected.name(),
                found: value.aux_type().name(),
            }),
        }
    }
}

fn parse_col<T: FromStr>(text: &str, name: &str) -> Result<T> {
    text.parse::<T>()
        .map_err(|_| Slow5Error::Parse(format!("invalid {} value '{}'", name, text)))
}

fn push_col(out: &mut String, value: String) {
    out.push_str(SEP_COL);
    out.push_str(&value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::press::PressMethod;

    fn sample_schema() -> AuxSchema {
        let mut schema = AuxSchema::new();
        schema.add("median_before", AuxType::Double).unwrap();
        schema.add("start_mux", AuxType::Uint8).unwrap();
        schema.add("channel_number", AuxType::String).unwrap();
        schema.add("deltas", AuxType::Int32Array).unwrap();
        schema
    }

    fn sample_record() -> Record {
        let mut rec = Record::new();
        rec.read_id = FlexString::from("read_0");
        rec.read_group = 0;
        rec.digitisation = 8192.0;
        rec.offset = 23.5;
        rec.range = 1467.61;
        rec.sampling_rate = 4000.0;
        rec.raw_signal = vec![430, -120, 512, 7];
        rec.set_aux("median_before", AuxValue::Double(238.5));
        rec.set_aux("start_mux", AuxValue::Uint8(2));
        rec.set_aux("channel_number", AuxValue::Str("291".to_string()));
        rec.set_aux("deltas", AuxValue::Int32Array(vec![-2, 0, 9]));
        rec
    }

    #[test]
    fn binary_round_trip() {
        let schema = sample_schema();
        let rec = sample_record();
        let press = Press::new(PressMethod::None);

        let bytes = rec.encode(Format::Binary, &schema, &press).unwrap();
        let (size, payload) = crate::binary_parsing::take_u64(&bytes).unwrap();
        assert_eq!(size as usize, payload.len());

        let reread = Record::decode_binary(payload, &schema).unwrap();
        assert_eq!(reread, rec);
    }

    #[test]
    fn compressed_encoding_differs_but_decodes_equal() {
        let schema = sample_schema();
        let rec = sample_record();
        let plain = rec
            .encode(Format::Binary, &schema, &Press::new(PressMethod::None))
            .unwrap();
        let packed = rec
            .encode(Format::Binary, &schema, &Press::new(PressMethod::Gzip))
            .unwrap();
        assert_ne!(plain, packed);

        let press = Press::new(PressMethod::Gzip);
        let (_, payload) = crate::binary_parsing::take_u64(&packed).unwrap();
        let reread = Record::decode_binary(&press.depress(payload).unwrap(), &schema).unwrap();
        assert_eq!(reread, rec);
    }

    #[test]
    fn ascii_round_trip() {
        let schema = sample_schema();
        let rec = sample_record();
        let press = Press::new(PressMethod::None);

        let bytes = rec.encode(Format::Ascii, &schema, &press).unwrap();
        let line = std::str::from_utf8(&bytes).unwrap();
        assert_eq!(
            line,
            "read_0\t0\t8192\t23.5\t1467.61\t4000\t4\t430,-120,512,7\t238.5\t2\t291\t-2,0,9\n"
        );

        let reread = Record::decode_ascii(line, &schema).unwrap();
        assert_eq!(reread, rec);
    }

    #[test]
    fn missing_aux_values_round_trip_as_dot() {
        let schema = sample_schema();
        let mut rec = sample_record();
        rec.set_aux("median_before", AuxValue::missing(AuxType::Double));
        rec.set_aux("deltas", AuxValue::missing(AuxType::Int32Array));

        let press = Press::new(PressMethod::None);
        let bytes = rec.encode(Format::Ascii, &schema, &press).unwrap();
        let line = std::str::from_utf8(&bytes).unwrap();
        assert!(line.contains("\t.\t"));

        let reread = Record::decode_ascii(line, &schema).unwrap();
        assert!(reread.aux_double("median_before").is_err());
        assert!(reread.aux_int32_array("deltas").is_err());
    }

    #[test]
    fn absent_aux_values_encode_as_missing() {
        let schema = sample_schema();
        let mut rec = sample_record();
        rec.aux.clear();

        let press = Press::new(PressMethod::None);
        let bytes = rec.encode(Format::Binary, &schema, &press).unwrap();
        let (_, payload) = crate::binary_parsing::take_u64(&bytes).unwrap();
        let reread = Record::decode_binary(payload, &schema).unwrap();

        assert!(matches!(
            reread.aux_uint8("start_mux"),
            Err(Slow5Error::MissingValue(_))
        ));
        assert!(matches!(
            reread.aux_string("channel_number"),
            Err(Slow5Error::MissingValue(_))
        ));
    }

    #[test]
    fn typed_getters() {
        let rec = sample_record();
        assert_eq!(rec.aux_double("median_before").unwrap(), 238.5);
        assert_eq!(rec.aux_uint8("start_mux").unwrap(), 2);
        assert_eq!(rec.aux_string("channel_number").unwrap(), "291");
        assert_eq!(rec.aux_int32_array("deltas").unwrap(), &[-2, 0, 9]);

        assert!(matches!(
            rec.aux_double("nonexistent"),
            Err(Slow5Error::FieldNotFound(_))
        ));
        assert!(matches!(
            rec.aux_int16("median_before"),
            Err(Slow5Error::AuxTypeMismatch { .. })
        ));
    }

    #[test]
    fn schema_type_enforced_on_encode() {
        let schema = sample_schema();
        let mut rec = sample_record();
        rec.set_aux("start_mux", AuxValue::Uint32(2));

        let press = Press::new(PressMethod::None);
        let err = rec.encode(Format::Binary, &schema, &press).unwrap_err();
        assert!(matches!(err, Slow5Error::AuxTypeMismatch { .. }));
    }

    #[test]
    fn empty_signal_and_schema() {
        let schema = AuxSchema::new();
        let mut rec = Record::new();
        rec.read_id = FlexString::from("r0");
        let press = Press::new(PressMethod::None);

        let bytes = rec.encode(Format::Binary, &schema, &press).unwrap();
        // size prefix + id prefix/id + u32 + 4 × f64 + u64, no signal, no aux
        assert_eq!(bytes.len(), 8 + 2 + 2 + 4 + 32 + 8);
        let (_, payload) = crate::binary_parsing::take_u64(&bytes).unwrap();
        let reread = Record::decode_binary(payload, &schema).unwrap();
        assert_eq!(reread.len_raw_signal(), 0);

        let line = rec.encode(Format::Ascii, &schema, &press).unwrap();
        assert_eq!(std::str::from_utf8(&line).unwrap(), "r0\t0\t0\t0\t0\t0\t0\t\n");
        let reread = Record::decode_ascii(std::str::from_utf8(&line).unwrap(), &schema).unwrap();
        assert_eq!(reread, rec);
    }

    #[test]
    fn tab_in_read_id_rejected() {
        let schema = AuxSchema::new();
        let mut rec = Record::new();
        rec.read_id = FlexString::from("bad\tid");
        let press = Press::new(PressMethod::None);

        let err = rec.encode(Format::Ascii, &schema, &press).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Parse);
    }
}
