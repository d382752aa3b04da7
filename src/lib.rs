//! This crate provides a reader and a writer for SLOW5/BLOW5 nanopore signal
//! files.
//!
//! SLOW5 is a flat, streamable storage format for raw nanopore sequencing
//! signal. It comes in two on-disk representations: a tab-separated ASCII
//! form (`.slow5`) and a compact binary form (`.blow5`) with optional
//! per-record compression. A sidecar index file (`<path>.idx`) maps read
//! identifiers to byte positions and enables random access.
//!
//! The usual entry point is [`Slow5File`]: open a file, iterate its records
//! or fetch them by read identifier, or create a new file and append records
//! to it.

pub mod aux;
mod binary_parsing;
pub mod error;
pub mod file;
pub mod header;
pub mod index;
pub mod press;
pub mod records;

use smallstr::SmallString;

use std::path::Path;

pub use crate::aux::{AuxSchema, AuxType, AuxValue, Field};
pub use crate::error::{ErrorKind, ExitCondition, LogLevel, Slow5Error};
pub use crate::file::Slow5File;
pub use crate::header::{Header, Version};
pub use crate::index::{Index, IndexEntry};
pub use crate::press::{Press, PressMethod};
pub use crate::records::Record;

/// Convenience type alias for a string with the SSO.
const INLINE_STRING_LENGTH: usize = 16;
pub type FlexString = SmallString<[u8; INLINE_STRING_LENGTH]>;

/// Crate's Result type.
pub(crate) type Result<T> = std::result::Result<T, error::Slow5Error>;

/// Column separator of the ASCII form.
pub(crate) const SEP_COL: &str = "\t";
/// Array element separator of the ASCII form.
pub(crate) const SEP_ARRAY: &str = ",";
/// The ASCII marker for a missing field value.
pub(crate) const MISSING_FIELD: &str = ".";

/// The on-disk representation of a slow5 file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// The format is not known, usually the case before inspecting the file
    /// extension.
    Unknown,
    /// Tab-separated ASCII SLOW5.
    Ascii,
    /// Binary SLOW5, that is, BLOW5.
    Binary,
}

impl Format {
    pub const ASCII_EXTENSION: &'static str = "slow5";
    pub const BINARY_EXTENSION: &'static str = "blow5";

    /// Infer the format from a path suffix. Returns [`Format::Unknown`] for
    /// anything other than `.slow5` and `.blow5`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some(Self::ASCII_EXTENSION) => Format::Ascii,
            Some(Self::BINARY_EXTENSION) => Format::Binary,
            _ => Format::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_path() {
        assert_eq!(Format::from_path("reads.slow5"), Format::Ascii);
        assert_eq!(Format::from_path("/data/run_1/reads.blow5"), Format::Binary);
        assert_eq!(Format::from_path("reads.fast5"), Format::Unknown);
        assert_eq!(Format::from_path("reads"), Format::Unknown);
    }
}
