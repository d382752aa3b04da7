//! Helpers for reading and writing the fixed-width binary values of the
//! BLOW5 wire format. All multi-byte integers and floats are little-endian.

use crate::{error::Slow5Error, FlexString, Result};

use byteorder::{ByteOrder, LittleEndian};

use std::io::Read;
use std::str;

/// Interpret a byte slice as an `i16` integer number.
pub(crate) fn read_i16(input: &[u8]) -> i16 {
    LittleEndian::read_i16(input)
}

/// Interpret a byte slice as a `u16` integer number.
pub(crate) fn read_u16(input: &[u8]) -> u16 {
    LittleEndian::read_u16(input)
}

/// Interpret a byte slice as an `i32` integer number.
pub(crate) fn read_i32(input: &[u8]) -> i32 {
    LittleEndian::read_i32(input)
}

/// Interpret a byte slice as a `u32` integer number.
pub(crate) fn read_u32(input: &[u8]) -> u32 {
    LittleEndian::read_u32(input)
}

/// Interpret a byte slice as an `i64` integer number.
pub(crate) fn read_i64(input: &[u8]) -> i64 {
    LittleEndian::read_i64(input)
}

/// Interpret a byte slice as a `u64` integer number.
pub(crate) fn read_u64(input: &[u8]) -> u64 {
    LittleEndian::read_u64(input)
}

/// Interpret a byte slice as an `f32` floating point number.
pub(crate) fn read_f32(input: &[u8]) -> f32 {
    LittleEndian::read_f32(input)
}

/// Interpret a byte slice as an `f64` floating point number.
pub(crate) fn read_f64(input: &[u8]) -> f64 {
    LittleEndian::read_f64(input)
}

/// A fallible wrapper around the byte slice's `split_at`.
pub(crate) fn take(size: usize, input: &[u8]) -> Result<(&[u8], &[u8])> {
    if input.len() < size {
        return Err(Slow5Error::NotEnoughBytes {
            expected: size,
            found: input.len(),
        });
    }
    Ok(input.split_at(size))
}

/// Take a single `u16` from the slice front and return it along with the
/// rest of the slice.
pub(crate) fn take_u16(input: &[u8]) -> Result<(u16, &[u8])> {
    let (left, right) = take(2, input)?;
    Ok((read_u16(left), right))
}

/// Take a single `u32` from the slice front and return it along with the
/// rest of the slice.
pub(crate) fn take_u32(input: &[u8]) -> Result<(u32, &[u8])> {
    let (left, right) = take(4, input)?;
    Ok((read_u32(left), right))
}

/// Take a single `u64` from the slice front and return it along with the
/// rest of the slice.
pub(crate) fn take_u64(input: &[u8]) -> Result<(u64, &[u8])> {
    let (left, right) = take(8, input)?;
    Ok((read_u64(left), right))
}

/// Take a single `f64` from the slice front and return it along with the
/// rest of the slice.
pub(crate) fn take_f64(input: &[u8]) -> Result<(f64, &[u8])> {
    let (left, right) = take(8, input)?;
    Ok((read_f64(left), right))
}

/// Take the requested number of bytes from the slice front as a UTF8 string
/// and return it along with the rest of the slice.
pub(crate) fn take_str(size: usize, input: &[u8]) -> Result<(FlexString, &[u8])> {
    let (left, right) = take(size, input)?;
    Ok((FlexString::from(str::from_utf8(left)?), right))
}

pub(crate) fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn push_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn push_f64(out: &mut Vec<u8>, value: f64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Read a single `u16` from a stream.
pub(crate) fn read_u16_from<R: Read>(reader: &mut R) -> Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

/// Read a single `u32` from a stream.
pub(crate) fn read_u32_from<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read an exact number of bytes from a stream as a UTF8 string.
pub(crate) fn read_string_from<R: Read>(reader: &mut R, len: usize) -> Result<String> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(str::from_utf8(&buf)?.to_string())
}
