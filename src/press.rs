//! Per-record compression pipeline.
//!
//! BLOW5 record payloads may be stored compressed. Compression is applied
//! strictly per record: block boundaries coincide with record boundaries and
//! are never crossed. Two methods exist, the identity method and gzip
//! (DEFLATE with a zlib wrapper). The method in use is recorded as a single
//! byte in the binary file header.

use crate::{error::Slow5Error, Result};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use std::io::{Read, Write};

/// Compression method of a BLOW5 record payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressMethod {
    /// Store payloads verbatim.
    None,
    /// DEFLATE with a zlib wrapper.
    Gzip,
}

impl PressMethod {
    /// The wire tag stored in the binary file header.
    pub(crate) fn tag(self) -> u8 {
        match self {
            PressMethod::None => 0,
            PressMethod::Gzip => 1,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(PressMethod::None),
            1 => Ok(PressMethod::Gzip),
            _ => Err(Slow5Error::UnknownPressMethod(tag)),
        }
    }
}

/// A compression context carrying the selected method.
#[derive(Debug)]
pub struct Press {
    method: PressMethod,
    level: Compression,
}

impl Press {
    pub fn new(method: PressMethod) -> Self {
        Press {
            method,
            level: Compression::default(),
        }
    }

    pub fn method(&self) -> PressMethod {
        self.method
    }

    /// Wrap a plaintext buffer under the selected method, returning a newly
    /// sized buffer.
    pub fn compress(&self, input: &[u8]) -> Result<Vec<u8>> {
        match self.method {
            PressMethod::None => Ok(input.to_vec()),
            PressMethod::Gzip => {
                let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
                encoder.write_all(input)?;
                Ok(encoder.finish()?)
            }
        }
    }

    /// The inverse of [`Press::compress`].
    pub fn depress(&self, input: &[u8]) -> Result<Vec<u8>> {
        match self.method {
            PressMethod::None => Ok(input.to_vec()),
            PressMethod::Gzip => {
                let mut output = Vec::new();
                ZlibDecoder::new(input).read_to_end(&mut output)?;
                Ok(output)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        let press = Press::new(PressMethod::None);
        let input = b"raw signal bytes".to_vec();
        assert_eq!(press.compress(&input).unwrap(), input);
        assert_eq!(press.depress(&input).unwrap(), input);
    }

    #[test]
    fn gzip_round_trip() {
        let press = Press::new(PressMethod::Gzip);
        let input: Vec<u8> = (0..4096u32).map(|i| (i % 7) as u8).collect();

        let compressed = press.compress(&input).unwrap();
        assert_ne!(compressed, input);
        assert!(compressed.len() < input.len());

        let depressed = press.depress(&compressed).unwrap();
        assert_eq!(depressed, input);
    }

    #[test]
    fn gzip_empty_round_trip() {
        let press = Press::new(PressMethod::Gzip);
        let compressed = press.compress(&[]).unwrap();
        assert_eq!(press.depress(&compressed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn method_tags() {
        assert_eq!(PressMethod::from_tag(0).unwrap(), PressMethod::None);
        assert_eq!(PressMethod::from_tag(1).unwrap(), PressMethod::Gzip);
        assert!(PressMethod::from_tag(9).is_err());
    }
}
