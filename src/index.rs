//! ## The sidecar index
//!
//! Random access by read identifier goes through a separate index file,
//! `<path>.idx` next to the slow5 file it describes. The sidecar is laid
//! out as:
//!
//! ```text
//! +-------+---------+----------+--------------------------------+---------+
//! | magic | version | reserved | entries                        | eof mrk |
//! +-------+---------+----------+--------------------------------+---------+
//! |   8   |    3    | to 64    | { id_len u16 | id | u64 | u64 }|    8    |
//! +-------+---------+----------+--------------------------------+---------+
//! ```
//!
//! Each entry maps a read identifier to the byte offset of the record's
//! on-disk form (including the binary size prefix) and its total on-disk
//! length. Entries keep the scan order of the host file; identifiers are
//! unique.

use crate::{
    binary_parsing as bp,
    error::{self, Slow5Error},
    file::Slow5File,
    header::Version,
    FlexString, Result,
};

use std::collections::HashMap;
use std::convert::TryFrom;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) const INDEX_MAGIC: [u8; 8] = *b"SLOW5IDX";
pub(crate) const INDEX_EOF: [u8; 8] = *b"XDI5WOLS";
pub(crate) const INDEX_DATA_OFFSET: usize = 64;

/// The newest index format version this library reads and writes.
pub const INDEX_VERSION: Version = Version {
    major: 0,
    minor: 1,
    patch: 0,
};

/// Byte position and length of one record inside its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub offset: u64,
    pub size: u64,
}

/// An in-memory index over one slow5 file, backed by the sidecar format
/// above. Iteration order is insertion order, which equals file order when
/// the index was built by a scan.
#[derive(Debug)]
pub struct Index {
    path: PathBuf,
    version: Version,
    ids: Vec<FlexString>,
    entries: HashMap<FlexString, IndexEntry>,
}

impl Index {
    pub(crate) fn empty(path: PathBuf) -> Self {
        Index {
            path,
            version: INDEX_VERSION,
            ids: Vec::new(),
            entries: HashMap::new(),
        }
    }

    /// The sidecar path of a slow5 file: the file path with `.idx` appended.
    pub(crate) fn sidecar_path(main: &Path) -> PathBuf {
        let mut os = OsString::from(main.as_os_str());
        os.push(".idx");
        PathBuf::from(os)
    }

    /// Load the index of a file: read the sidecar if it exists, otherwise
    /// scan the file, then write the sidecar for the next time.
    pub(crate) fn load(file: &mut Slow5File) -> Result<Index> {
        let path = Self::sidecar_path(file.path());
        if path.exists() {
            Self::read_sidecar(path)
        } else {
            if error::log_enabled(crate::LogLevel::Info) {
                log::info!("Index file not found. Creating an index at '{}'.", path.display());
            }
            let mut index = Self::empty(path);
            index.build(file)?;
            index.write()?;
            Ok(index)
        }
    }

    /// Scan the host file once, recording every record's offset and size in
    /// scan order. The stream position of the file is restored afterwards.
    pub(crate) fn build(&mut self, file: &mut Slow5File) -> Result<()> {
        let saved = file.stream_position();
        file.seek_to_records()?;
        while let Some((read_id, offset, size)) = file.next_entry()? {
            self.insert(read_id, offset, size)?;
        }
        file.seek_to(saved)?;
        Ok(())
    }

    /// Write the whole sidecar, atomically replacing any previous one.
    pub(crate) fn write(&self) -> Result<()> {
        let mut out = Vec::with_capacity(INDEX_DATA_OFFSET + self.ids.len() * 64);
        out.extend_from_slice(&INDEX_MAGIC);
        out.push(self.version.major);
        out.push(self.version.minor);
        out.push(self.version.patch);
        out.resize(INDEX_DATA_OFFSET, 0);

        for id in &self.ids {
            let entry = self
                .entries
                .get(&**id)
                .ok_or_else(|| Slow5Error::ReadIdNotFound(id.to_string()))?;
            let id_len = u16::try_from(id.len()).map_err(|_| {
                Slow5Error::Parse(format!("read id of {} bytes is too long", id.len()))
            })?;
            bp::push_u16(&mut out, id_len);
            out.extend_from_slice(id.as_bytes());
            bp::push_u64(&mut out, entry.offset);
            bp::push_u64(&mut out, entry.size);
        }
        out.extend_from_slice(&INDEX_EOF);

        let mut tmp = OsString::from(self.path.as_os_str());
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, &out)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn read_sidecar(path: PathBuf) -> Result<Index> {
        let data = fs::read(&path)?;
        let (fixed, mut rest) = bp::take(INDEX_DATA_OFFSET, &data)?;
        if fixed[..INDEX_MAGIC.len()] != INDEX_MAGIC {
            return Err(Slow5Error::BadMagic {
                expected: &INDEX_MAGIC,
            });
        }
        let version = Version {
            major: fixed[8],
            minor: fixed[9],
            patch: fixed[10],
        };
        if !version.is_supported_by(INDEX_VERSION) {
            return Err(Slow5Error::UnsupportedVersion {
                found: version,
                supported: INDEX_VERSION,
            });
        }

        let mut index = Index {
            path,
            version,
            ids: Vec::new(),
            entries: HashMap::new(),
        };
        loop {
            if rest.len() >= INDEX_EOF.len() && rest[..INDEX_EOF.len()] == INDEX_EOF {
                break;
            }
            let at = (data.len() - rest.len()) as u64;
            let truncated = |_| Slow5Error::TruncatedRecord(at);
            let (id_len, r) = bp::take_u16(rest).map_err(truncated)?;
            let (read_id, r) = bp::take_str(id_len as usize, r).map_err(truncated)?;
            let (offset, r) = bp::take_u64(r).map_err(truncated)?;
            let (size, r) = bp::take_u64(r).map_err(truncated)?;
            index.insert(read_id, offset, size)?;
            rest = r;
        }
        Ok(index)
    }

    /// The entry of a read identifier, if present.
    pub fn get(&self, read_id: &str) -> Option<IndexEntry> {
        self.entries.get(read_id).copied()
    }

    /// Record an entry. Duplicate identifiers are rejected.
    pub(crate) fn insert(&mut self, read_id: FlexString, offset: u64, size: u64) -> Result<()> {
        if self.entries.contains_key(&*read_id) {
            return Err(Slow5Error::DuplicateReadId(read_id.to_string()));
        }
        self.ids.push(read_id.clone());
        self.entries.insert(read_id, IndexEntry { offset, size });
        Ok(())
    }

    /// Read identifiers in insertion order.
    pub fn ids(&self) -> &[FlexString] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
