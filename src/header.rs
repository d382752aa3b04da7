//! ## The slow5 header
//!
//! A header carries the file version, the read groups with their string
//! attributes, and the auxiliary field schema. In the binary form it is laid
//! out as:
//!
//! ```text
//! +-------+---------+--------+----------+-----------+-----------+---------+
//! | magic | version | method | reserved | data blk  | aux blk   | end mrk |
//! +-------+---------+--------+----------+-----------+-----------+---------+
//! |   8   |    3    |   1    | to 64    | variable  | variable  |    8    |
//! +-------+---------+--------+----------+-----------+-----------+---------+
//! ```
//!
//! The data block stores the read group count, the attribute name count,
//! the length-prefixed attribute names, then per read group one
//! length-prefixed value per attribute in name order (length zero denotes
//! a missing value). The aux block stores the field count, then per field a
//! length-prefixed name and a one-byte type tag. The compression method
//! byte governs record payloads; the header itself is stored uncompressed.
//!
//! The ASCII form spells the same information as `#`-prefixed metadata
//! lines, one `@attr` line per attribute with one value column per read
//! group, and two final `#` lines naming the column types and the columns.

use crate::{
    aux::{AuxSchema, AuxType},
    binary_parsing as bp,
    error::Slow5Error,
    press::PressMethod,
    records::{PRIMARY_COL_NAMES, PRIMARY_COL_TYPES},
    FlexString, Format, Result, SEP_COL,
};

use std::collections::HashMap;
use std::convert::TryFrom;
use std::fmt::{self, Display, Formatter};
use std::io::{BufRead, Read};
use std::str::FromStr;

pub(crate) const BINARY_MAGIC: [u8; 8] = *b"BLOW5\x01\x00\x00";
pub(crate) const BINARY_HEADER_END: [u8; 8] = *b"BLOW5HDR";
/// The header data block starts at this offset in a binary file.
pub(crate) const HEADER_DATA_OFFSET: usize = 64;

/// The newest file format version this library reads and writes.
pub const SLOW5_VERSION: Version = Version {
    major: 0,
    minor: 1,
    patch: 0,
};

const VERSION_KEY: &str = "#slow5_version";
const NUM_GROUPS_KEY: &str = "#num_read_groups";
const ATTR_PREFIX: char = '@';
const META_PREFIX: char = '#';

/// A slow5 file format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl Version {
    /// A version is readable iff no component exceeds the corresponding
    /// component of the library maximum.
    pub(crate) fn is_supported_by(self, max: Version) -> bool {
        self.major <= max.major && self.minor <= max.minor && self.patch <= max.patch
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = Slow5Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Slow5Error::Parse(format!("invalid version string '{}'", s));
        let mut parts = s.split('.');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(major), Some(minor), Some(patch), None) => Ok(Version {
                major: major.parse().map_err(|_| invalid())?,
                minor: minor.parse().map_err(|_| invalid())?,
                patch: patch.parse().map_err(|_| invalid())?,
            }),
            _ => Err(invalid()),
        }
    }
}

/// The slow5 header: version, read groups with their string attributes, and
/// the auxiliary field schema.
///
/// Read groups are identified by a dense index `0..N-1`. The attribute name
/// list is the union of the keys across all read groups and keeps the order
/// in which attributes were first added, which is also the wire order.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    version: Version,
    attrs: Vec<FlexString>,
    groups: Vec<HashMap<FlexString, String>>,
    aux: AuxSchema,
}

impl Default for Header {
    fn default() -> Self {
        Self::new()
    }
}

impl Header {
    /// An empty header with a single read group and no auxiliary schema.
    pub fn new() -> Self {
        Header {
            version: SLOW5_VERSION,
            attrs: Vec::new(),
            groups: vec![HashMap::new()],
            aux: AuxSchema::new(),
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn num_read_groups(&self) -> u32 {
        self.groups.len() as u32
    }

    /// Attribute names in wire order.
    pub fn attrs(&self) -> impl Iterator<Item = &str> {
        self.attrs.iter().map(|attr| &**attr)
    }

    pub fn aux(&self) -> &AuxSchema {
        &self.aux
    }

    /// Declare an auxiliary field. Duplicate names are rejected.
    pub fn add_aux_field(&mut self, name: &str, aux_type: AuxType) -> Result<()> {
        self.aux.add(name, aux_type)
    }

    /// Add an attribute name to the union set. Adding an existing name is a
    /// no-op; every read group reports the missing value for the new key
    /// until one is set.
    pub fn add_attr(&mut self, attr: &str) -> Result<()> {
        crate::error::track(self.add_attr_inner(attr))
    }

    fn add_attr_inner(&mut self, attr: &str) -> Result<()> {
        if attr.contains('\t') || attr.contains('\n') {
            return Err(Slow5Error::Parse(format!(
                "attribute name '{}' contains a separator character",
                attr.escape_default()
            )));
        }
        if !self.attrs.iter().any(|a| &**a == attr) {
            self.attrs.push(FlexString::from(attr));
        }
        Ok(())
    }

    /// Append a new, empty read group and return its index.
    pub fn add_read_group(&mut self) -> u32 {
        self.groups.push(HashMap::new());
        self.groups.len() as u32 - 1
    }

    /// Append a new read group populated from an existing attribute map,
    /// extending the attribute name union as needed. Used when merging
    /// headers of several files into one.
    pub fn add_read_group_with(
        &mut self,
        data: HashMap<FlexString, String>,
    ) -> Result<u32> {
        crate::error::track(self.add_read_group_with_inner(data))
    }

    fn add_read_group_with_inner(
        &mut self,
        data: HashMap<FlexString, String>,
    ) -> Result<u32> {
        for (attr, value) in &data {
            self.add_attr_inner(attr)?;
            check_attr_value(value)?;
        }
        self.groups.push(data);
        Ok(self.groups.len() as u32 - 1)
    }

    /// Set an attribute value for one read group. The attribute must have
    /// been added and the read group must exist.
    pub fn set_attr(&mut self, attr: &str, value: &str, read_group: u32) -> Result<()> {
        crate::error::track(self.set_attr_inner(attr, value, read_group))
    }

    fn set_attr_inner(&mut self, attr: &str, value: &str, read_group: u32) -> Result<()> {
        if !self.attrs.iter().any(|a| &**a == attr) {
            return Err(Slow5Error::UnknownAttribute(attr.to_string()));
        }
        check_attr_value(value)?;
        let count = self.num_read_groups();
        let map = self
            .groups
            .get_mut(read_group as usize)
            .ok_or(Slow5Error::ReadGroupOutOfRange {
                group: read_group,
                count,
            })?;
        map.insert(FlexString::from(attr), value.to_string());
        Ok(())
    }

    /// Look up an attribute value. `None` stands for the missing value,
    /// whether the attribute is unknown, the group out of range or the pair
    /// simply unset.
    pub fn get_attr(&self, attr: &str, read_group: u32) -> Option<&str> {
        self.groups
            .get(read_group as usize)
            .and_then(|map| map.get(attr))
            .map(|value| value.as_str())
    }

    /// The whole attribute map of one read group.
    pub fn attr_map(&self, read_group: u32) -> Option<&HashMap<FlexString, String>> {
        self.groups.get(read_group as usize)
    }

    /// Emit the header in the requested on-disk form. For the binary form
    /// the compression method of the file's records is recorded in the
    /// fixed header region.
    pub(crate) fn encode(&self, format: Format, method: PressMethod) -> Result<Vec<u8>> {
        match format {
            Format::Ascii => Ok(self.encode_ascii()),
            Format::Binary => self.encode_binary(method),
            Format::Unknown => Err(Slow5Error::UnknownFormat("header".to_string())),
        }
    }

    fn encode_ascii(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str(VERSION_KEY);
        out.push_str(SEP_COL);
        out.push_str(&self.version.to_string());
        out.push('\n');

        out.push_str(NUM_GROUPS_KEY);
        out.push_str(SEP_COL);
        out.push_str(&self.groups.len().to_string());
        out.push('\n');

        for attr in &self.attrs {
            out.push(ATTR_PREFIX);
            out.push_str(attr);
            for map in &self.groups {
                out.push_str(SEP_COL);
                if let Some(value) = map.get(&**attr) {
                    out.push_str(value);
                }
            }
            out.push('\n');
        }

        out.push(META_PREFIX);
        out.push_str(&PRIMARY_COL_TYPES.join(SEP_COL));
        for field in self.aux.fields() {
            out.push_str(SEP_COL);
            out.push_str(field.aux_type().name());
        }
        out.push('\n');

        out.push(META_PREFIX);
        out.push_str(&PRIMARY_COL_NAMES.join(SEP_COL));
        for field in self.aux.fields() {
            out.push_str(SEP_COL);
            out.push_str(field.name());
        }
        out.push('\n');

        out.into_bytes()
    }

    fn encode_binary(&self, method: PressMethod) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(HEADER_DATA_OFFSET + 256);
        out.extend_from_slice(&BINARY_MAGIC);
        out.push(self.version.major);
        out.push(self.version.minor);
        out.push(self.version.patch);
        out.push(method.tag());
        out.resize(HEADER_DATA_OFFSET, 0);

        bp::push_u32(&mut out, self.groups.len() as u32);
        bp::push_u32(&mut out, self.attrs.len() as u32);
        for attr in &self.attrs {
            push_prefixed(&mut out, attr)?;
        }
        for map in &self.groups {
            for attr in &self.attrs {
                match map.get(&**attr) {
                    Some(value) => push_prefixed(&mut out, value)?,
                    None => bp::push_u16(&mut out, 0),
                }
            }
        }

        bp::push_u32(&mut out, self.aux.len() as u32);
        for field in self.aux.fields() {
            push_prefixed(&mut out, field.name())?;
            out.push(field.aux_type().tag());
        }

        out.extend_from_slice(&BINARY_HEADER_END);
        Ok(out)
    }

    /// Parse the binary header from the front of a stream. Returns the
    /// header, the record compression method and the number of bytes
    /// consumed. Nothing past the fixed region is read when the magic or
    /// version check fails.
    pub(crate) fn decode_binary<R: Read>(
        reader: &mut R,
    ) -> Result<(Header, PressMethod, u64)> {
        let mut fixed = [0u8; HEADER_DATA_OFFSET];
        reader.read_exact(&mut fixed)?;
        if fixed[..BINARY_MAGIC.len()] != BINARY_MAGIC {
            return Err(Slow5Error::BadMagic {
                expected: &BINARY_MAGIC,
            });
        }
        let version = Version {
            major: fixed[8],
            minor: fixed[9],
            patch: fixed[10],
        };
        if !version.is_supported_by(SLOW5_VERSION) {
            return Err(Slow5Error::UnsupportedVersion {
                found: version,
                supported: SLOW5_VERSION,
            });
        }
        let method = PressMethod::from_tag(fixed[11])?;
        let mut consumed = HEADER_DATA_OFFSET as u64;

        let num_groups = bp::read_u32_from(reader)?;
        let num_attrs = bp::read_u32_from(reader)?;
        consumed += 8;

        let mut attrs = Vec::with_capacity(num_attrs as usize);
        for _ in 0..num_attrs {
            let len = bp::read_u16_from(reader)? as usize;
            let name = bp::read_string_from(reader, len)?;
            consumed += 2 + len as u64;
            attrs.push(FlexString::from(name.as_str()));
        }

        let mut groups = Vec::with_capacity(num_groups as usize);
        for _ in 0..num_groups {
            let mut map = HashMap::new();
            for attr in &attrs {
                let len = bp::read_u16_from(reader)? as usize;
                consumed += 2;
                if len > 0 {
                    let value = bp::read_string_from(reader, len)?;
                    consumed += len as u64;
                    map.insert(attr.clone(), value);
                }
            }
            groups.push(map);
        }

        let num_fields = bp::read_u32_from(reader)?;
        consumed += 4;
        let mut aux = AuxSchema::new();
        for _ in 0..num_fields {
            let len = bp::read_u16_from(reader)? as usize;
            let name = bp::read_string_from(reader, len)?;
            let mut tag = [0u8; 1];
            reader.read_exact(&mut tag)?;
            consumed += 3 + len as u64;
            aux.add(&name, AuxType::from_tag(tag[0])?)?;
        }

        let mut end = [0u8; 8];
        reader.read_exact(&mut end)?;
        consumed += 8;
        if end != BINARY_HEADER_END {
            return Err(Slow5Error::BadMagic {
                expected: &BINARY_HEADER_END,
            });
        }

        Ok((
            Header {
                version,
                attrs,
                groups,
                aux,
            },
            method,
            consumed,
        ))
    }

    /// Parse the ASCII header from the front of a stream, stopping right
    /// after the column name line. Returns the header and the number of
    /// bytes consumed.
    pub(crate) fn decode_ascii<R: BufRead>(reader: &mut R) -> Result<(Header, u64)> {
        let mut consumed = 0u64;
        let mut line = String::new();

        let version: Version = meta_line(reader, &mut line, &mut consumed, VERSION_KEY)?
            .parse()?;
        if !version.is_supported_by(SLOW5_VERSION) {
            return Err(Slow5Error::UnsupportedVersion {
                found: version,
                supported: SLOW5_VERSION,
            });
        }
        let num_groups: u32 = meta_line(reader, &mut line, &mut consumed, NUM_GROUPS_KEY)?
            .parse()
            .map_err(|_| Slow5Error::Parse("invalid read group count".to_string()))?;

        let mut attrs = Vec::new();
        let mut groups: Vec<HashMap<FlexString, String>> =
            vec![HashMap::new(); num_groups as usize];

        // Attribute lines end at the column type line.
        let types_line = loop {
            line.clear();
            let n = reader.read_line(&mut line)?;
            if n == 0 {
                return Err(Slow5Error::Parse(
                    "header ends before the column lines".to_string(),
                ));
            }
            consumed += n as u64;
            let trimmed = line.strip_suffix('\n').unwrap_or(&line);

            if let Some(rest) = strip_prefix_char(trimmed, ATTR_PREFIX) {
                let mut cols = rest.split(SEP_COL);
                let attr = cols
                    .next()
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| Slow5Error::Parse("empty attribute name".to_string()))?;
                let attr = FlexString::from(attr);
                attrs.push(attr.clone());
                for (group, value) in cols.take(num_groups as usize).enumerate() {
                    if !value.is_empty() {
                        groups[group].insert(attr.clone(), value.to_string());
                    }
                }
            } else if strip_prefix_char(trimmed, META_PREFIX).is_some() {
                break trimmed.to_string();
            } else {
                return Err(Slow5Error::Parse(format!(
                    "unexpected header line '{}'",
                    trimmed
                )));
            }
        };

        line.clear();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            return Err(Slow5Error::Parse("missing column name line".to_string()));
        }
        consumed += n as u64;
        let names_line = line.strip_suffix('\n').unwrap_or(&line).to_string();

        let aux = parse_column_lines(&types_line, &names_line)?;

        Ok((
            Header {
                version,
                attrs,
                groups,
                aux,
            },
            consumed,
        ))
    }
}

fn check_attr_value(value: &str) -> Result<()> {
    if value.contains('\t') || value.contains('\n') {
        return Err(Slow5Error::Parse(format!(
            "attribute value '{}' contains a separator character",
            value.escape_default()
        )));
    }
    Ok(())
}

fn push_prefixed(out: &mut Vec<u8>, s: &str) -> Result<()> {
    let len = u16::try_from(s.len())
        .map_err(|_| Slow5Error::Parse(format!("header string of {} bytes is too long", s.len())))?;
    bp::push_u16(out, len);
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

fn strip_prefix_char(line: &str, prefix: char) -> Option<&str> {
    let mut chars = line.chars();
    if chars.next() == Some(prefix) {
        Some(chars.as_str())
    } else {
        None
    }
}

/// Read one `#key\tvalue` metadata line and return the value part.
fn meta_line<'a, R: BufRead>(
    reader: &mut R,
    line: &'a mut String,
    consumed: &mut u64,
    key: &str,
) -> Result<&'a str> {
    line.clear();
    let n = reader.read_line(line)?;
    if n == 0 {
        return Err(Slow5Error::Parse(format!("missing header line '{}'", key)));
    }
    *consumed += n as u64;
    let line: &str = line.as_str();
    let trimmed = line.strip_suffix('\n').unwrap_or(line);
    let mut cols = trimmed.split(SEP_COL);
    match (cols.next(), cols.next(), cols.next()) {
        (Some(k), Some(value), None) if k == key => Ok(value),
        _ => Err(Slow5Error::Parse(format!(
            "malformed header line, expected '{}'",
            key
        ))),
    }
}

/// Check the primary columns of the two `#` column lines and derive the aux
/// schema from the extra columns.
fn parse_column_lines(types_line: &str, names_line: &str) -> Result<AuxSchema> {
    let types: Vec<&str> = types_line[1..].split(SEP_COL).collect();
    let names: Vec<&str> = names_line
        .strip_prefix(META_PREFIX)
        .ok_or_else(|| Slow5Error::Parse("malformed column name line".to_string()))?
        .split(SEP_COL)
        .collect();

    if types.len() < PRIMARY_COL_TYPES.len() || types[..PRIMARY_COL_TYPES.len()] != PRIMARY_COL_TYPES {
        return Err(Slow5Error::Parse(
            "column type line does not start with the primary columns".to_string(),
        ));
    }
    if names.len() < PRIMARY_COL_NAMES.len() || names[..PRIMARY_COL_NAMES.len()] != PRIMARY_COL_NAMES {
        return Err(Slow5Error::Parse(
            "column name line does not start with the primary columns".to_string(),
        ));
    }
    if types.len() != names.len() {
        return Err(Slow5Error::Parse(format!(
            "column count mismatch, {} types vs {} names",
            types.len(),
            names.len()
        )));
    }

    let mut aux = AuxSchema::new();
    for (name, type_name) in names
        .iter()
        .zip(&types)
        .skip(PRIMARY_COL_NAMES.len())
    {
        let aux_type = AuxType::from_name(type_name)
            .ok_or_else(|| Slow5Error::Parse(format!("unknown column type '{}'", type_name)))?;
        aux.add(name, aux_type)?;
    }
    Ok(aux)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_header() -> Header {
        let mut header = Header::new();
        header.add_attr("asic_id").unwrap();
        header.add_attr("run_id").unwrap();
        header.set_attr("asic_id", "3574887596", 0).unwrap();
        header.set_attr("run_id", "d6e473a6", 0).unwrap();
        let group = header.add_read_group();
        header.set_attr("run_id", "97d2c2f3", group).unwrap();
        header.add_aux_field("median_before", AuxType::Double).unwrap();
        header.add_aux_field("channel_number", AuxType::String).unwrap();
        header
    }

    #[test]
    fn version_strings() {
        let version: Version = "0.1.0".parse().unwrap();
        assert_eq!(version, SLOW5_VERSION);
        assert_eq!(version.to_string(), "0.1.0");
        assert!("0.1".parse::<Version>().is_err());
        assert!("a.b.c".parse::<Version>().is_err());
    }

    #[test]
    fn version_compatibility() {
        let max = SLOW5_VERSION;
        assert!(Version { major: 0, minor: 0, patch: 0 }.is_supported_by(max));
        assert!(Version { major: 0, minor: 1, patch: 0 }.is_supported_by(max));
        assert!(!Version { major: 1, minor: 0, patch: 0 }.is_supported_by(max));
        assert!(!Version { major: 0, minor: 2, patch: 0 }.is_supported_by(max));
    }

    #[test]
    fn attribute_semantics() {
        let mut header = Header::new();
        header.add_attr("flow_cell_id").unwrap();
        header.add_attr("flow_cell_id").unwrap();

        assert_eq!(header.get_attr("flow_cell_id", 0), None);
        header.set_attr("flow_cell_id", "FAK12345", 0).unwrap();
        assert_eq!(header.get_attr("flow_cell_id", 0), Some("FAK12345"));

        assert!(header.set_attr("nonexistent", "x", 0).is_err());
        assert!(header.set_attr("flow_cell_id", "x", 7).is_err());
        assert!(header.add_attr("bad\tname").is_err());

        // A fresh read group reports missing for every known attribute.
        let group = header.add_read_group();
        assert_eq!(group, 1);
        assert_eq!(header.get_attr("flow_cell_id", group), None);
    }

    #[test]
    fn read_group_from_map() {
        let mut header = Header::new();
        header.add_attr("run_id").unwrap();

        let mut data = HashMap::new();
        data.insert(FlexString::from("run_id"), "abc".to_string());
        data.insert(FlexString::from("device_id"), "X1".to_string());
        let group = header.add_read_group_with(data).unwrap();

        assert_eq!(group, 1);
        assert_eq!(header.get_attr("device_id", 1), Some("X1"));
        // The union set now contains the new key; group 0 reports missing.
        assert_eq!(header.get_attr("device_id", 0), None);
        assert!(header.attrs().any(|a| a == "device_id"));
    }

    #[test]
    fn ascii_round_trip() {
        let header = sample_header();
        let bytes = header.encode(Format::Ascii, PressMethod::None).unwrap();

        let mut cursor = Cursor::new(bytes.clone());
        let (reread, consumed) = Header::decode_ascii(&mut cursor).unwrap();
        assert_eq!(consumed as usize, bytes.len());
        assert_eq!(reread, header);

        // Emitting the reread header reproduces the bytes.
        let again = reread.encode(Format::Ascii, PressMethod::None).unwrap();
        assert_eq!(again, bytes);
    }

    #[test]
    fn binary_round_trip() {
        let header = sample_header();
        let bytes = header.encode(Format::Binary, PressMethod::Gzip).unwrap();

        let mut cursor = Cursor::new(bytes.clone());
        let (reread, method, consumed) = Header::decode_binary(&mut cursor).unwrap();
        assert_eq!(consumed as usize, bytes.len());
        assert_eq!(method, PressMethod::Gzip);
        assert_eq!(reread, header);
    }

    #[test]
    fn binary_rejects_bad_magic_and_new_versions() {
        let header = Header::new();
        let mut bytes = header.encode(Format::Binary, PressMethod::None).unwrap();

        let mut mangled = bytes.clone();
        mangled[0] = b'X';
        let err = Header::decode_binary(&mut Cursor::new(mangled)).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::BadMagic);

        bytes[8] = SLOW5_VERSION.major + 1;
        let err = Header::decode_binary(&mut Cursor::new(bytes)).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Version);
    }
}
