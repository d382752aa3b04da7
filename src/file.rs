//! ## The slow5 file handle
//!
//! A [`Slow5File`] mediates between in-memory [`Record`]s and their on-disk
//! forms. A handle is opened either for reading or for writing, never both:
//!
//! - the read side parses the header on open, then serves sequential
//!   iteration with [`Slow5File::next_rec`] and, once an index is loaded,
//!   random access with [`Slow5File::get_rec`];
//! - the write side emits the header on create and appends records with
//!   [`Slow5File::add_rec`], keeping an in-memory index so duplicate read
//!   identifiers are rejected and appended records can be read back.
//!
//! Closing a binary writer terminates the file with the end-of-file marker.
//! A handle is single-owner; use one handle per thread.

use crate::{
    error::{self, Slow5Error},
    header::Header,
    index::Index,
    press::{Press, PressMethod},
    records::Record,
    FlexString, Format, Result, SEP_COL,
};

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Marker terminating a binary slow5 file.
pub(crate) const BINARY_EOF: [u8; 5] = *b"5WOLB";

#[derive(Debug)]
enum Stream {
    Reader(BufReader<File>),
    Writer(File),
}

/// An open slow5 file.
#[derive(Debug)]
pub struct Slow5File {
    path: PathBuf,
    format: Format,
    press: Press,
    header: Header,
    index: Option<Index>,
    stream: Stream,
    start_rec_offset: u64,
    cursor: u64,
    at_eof: bool,
    finished: bool,
}

impl Slow5File {
    /// Open a slow5 file for reading, inferring the format from the path
    /// suffix. The header is parsed before this returns.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let format = Format::from_path(&path);
        Self::open_with(path, format)
    }

    /// Open a slow5 file for reading in an explicitly given format.
    pub fn open_with<P: AsRef<Path>>(path: P, format: Format) -> Result<Self> {
        error::track(Self::open_inner(path.as_ref(), format))
    }

    fn open_inner(path: &Path, format: Format) -> Result<Self> {
        if format == Format::Unknown {
            return Err(Slow5Error::UnknownFormat(path.display().to_string()));
        }
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let (header, press, start_rec_offset) = match format {
            Format::Ascii => {
                let (header, consumed) = Header::decode_ascii(&mut reader)?;
                (header, Press::new(PressMethod::None), consumed)
            }
            Format::Binary => {
                let (header, method, consumed) = Header::decode_binary(&mut reader)?;
                (header, Press::new(method), consumed)
            }
            Format::Unknown => {
                return Err(Slow5Error::UnknownFormat(path.display().to_string()));
            }
        };
        Ok(Slow5File {
            path: path.to_path_buf(),
            format,
            press,
            header,
            index: None,
            stream: Stream::Reader(reader),
            start_rec_offset,
            cursor: start_rec_offset,
            at_eof: false,
            finished: false,
        })
    }

    /// Create a slow5 file for writing, inferring the format from the path
    /// suffix. The header is written out before this returns and is
    /// immutable for the lifetime of the file.
    pub fn create<P: AsRef<Path>>(path: P, header: Header, method: PressMethod) -> Result<Self> {
        let format = Format::from_path(&path);
        Self::create_with(path, header, format, method)
    }

    /// Create a slow5 file for writing in an explicitly given format.
    pub fn create_with<P: AsRef<Path>>(
        path: P,
        header: Header,
        format: Format,
        method: PressMethod,
    ) -> Result<Self> {
        error::track(Self::create_inner(path.as_ref(), header, format, method))
    }

    fn create_inner(
        path: &Path,
        header: Header,
        format: Format,
        method: PressMethod,
    ) -> Result<Self> {
        let method = match format {
            // Record lines of the ASCII form are never compressed.
            Format::Ascii => PressMethod::None,
            Format::Binary => method,
            Format::Unknown => {
                return Err(Slow5Error::UnknownFormat(path.display().to_string()));
            }
        };
        let bytes = header.encode(format, method)?;
        // Appended records can be read back through the index, so the
        // stream is opened for both writing and reading.
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(&bytes)?;
        let start_rec_offset = bytes.len() as u64;
        Ok(Slow5File {
            path: path.to_path_buf(),
            format,
            press: Press::new(method),
            header,
            index: None,
            stream: Stream::Writer(file),
            start_rec_offset,
            cursor: start_rec_offset,
            at_eof: false,
            finished: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn press_method(&self) -> PressMethod {
        self.press.method()
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The loaded index, if any.
    pub fn index(&self) -> Option<&Index> {
        self.index.as_ref()
    }

    /// Read the record under the stream position. `Ok(None)` is the clean
    /// end of file; a missing binary end-of-file marker or a short read
    /// reports the record as truncated instead.
    pub fn next_rec(&mut self) -> Result<Option<Record>> {
        error::track(self.next_rec_inner())
    }

    fn next_rec_inner(&mut self) -> Result<Option<Record>> {
        match self.format {
            Format::Ascii => {
                let mut line = String::new();
                let n = self.reader_mut()?.read_line(&mut line)?;
                if n == 0 {
                    return Ok(None);
                }
                self.cursor += n as u64;
                Record::decode_ascii(&line, self.header.aux()).map(Some)
            }
            Format::Binary => {
                let size = match self.read_record_size()? {
                    None => return Ok(None),
                    Some(size) => size,
                };
                let payload = self.read_payload(size)?;
                let plain = self.press.depress(&payload)?;
                Record::decode_binary(&plain, self.header.aux()).map(Some)
            }
            Format::Unknown => Err(Slow5Error::UnknownFormat(self.path.display().to_string())),
        }
    }

    /// Returns an iterator over the records of this file.
    pub fn records(&mut self) -> Records<'_> {
        Records { file: self }
    }

    /// Load the sidecar index, building and writing it first when absent.
    /// A no-op if an index is already loaded.
    pub fn index_load(&mut self) -> Result<()> {
        error::track(self.index_load_inner())
    }

    fn index_load_inner(&mut self) -> Result<()> {
        if self.index.is_none() {
            self.index = Some(Index::load(self)?);
        }
        Ok(())
    }

    /// Build the index from scratch and overwrite the sidecar, whether or
    /// not one exists.
    pub fn index_create(&mut self) -> Result<()> {
        error::track(self.index_create_inner())
    }

    fn index_create_inner(&mut self) -> Result<()> {
        let mut index = Index::empty(Index::sidecar_path(&self.path));
        index.build(self)?;
        index.write()?;
        self.index = Some(index);
        Ok(())
    }

    /// Build the index and write the sidecar to an explicit path, leaving
    /// the handle's loaded index untouched.
    pub fn index_to<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        error::track(self.index_to_inner(path.as_ref()))
    }

    fn index_to_inner(&mut self, path: &Path) -> Result<()> {
        let mut index = Index::empty(path.to_path_buf());
        index.build(self)?;
        index.write()
    }

    /// Drop the loaded index.
    pub fn index_unload(&mut self) {
        self.index = None;
    }

    /// Fetch one record by read identifier. Requires a loaded index. On
    /// return the stream position is at the end of the fetched record.
    pub fn get_rec(&mut self, read_id: &str) -> Result<Record> {
        error::track(self.get_rec_inner(read_id))
    }

    fn get_rec_inner(&mut self, read_id: &str) -> Result<Record> {
        let entry = self
            .index
            .as_ref()
            .ok_or(Slow5Error::IndexNotLoaded)?
            .get(read_id)
            .ok_or_else(|| Slow5Error::ReadIdNotFound(read_id.to_string()))?;
        let bytes = self.read_at(entry.offset, entry.size)?;
        match self.format {
            Format::Ascii => {
                Record::decode_ascii(std::str::from_utf8(&bytes)?, self.header.aux())
            }
            Format::Binary => {
                let (record_size, payload) = crate::binary_parsing::take_u64(&bytes)?;
                if record_size != payload.len() as u64 {
                    return Err(Slow5Error::Parse(format!(
                        "index entry for '{}' disagrees with the record size prefix",
                        read_id
                    )));
                }
                let plain = self.press.depress(payload)?;
                Record::decode_binary(&plain, self.header.aux())
            }
            Format::Unknown => Err(Slow5Error::UnknownFormat(self.path.display().to_string())),
        }
    }

    /// Append a record to a file opened for writing, recording it in the
    /// index. An empty index is set up on the first append; duplicate read
    /// identifiers are rejected before anything is written.
    pub fn add_rec(&mut self, rec: &Record) -> Result<()> {
        error::track(self.add_rec_inner(rec))
    }

    fn add_rec_inner(&mut self, rec: &Record) -> Result<()> {
        if !matches!(self.stream, Stream::Writer(_)) {
            return Err(Slow5Error::WrongMode("writing"));
        }
        if self.index.is_none() {
            self.index = Some(Index::empty(Index::sidecar_path(&self.path)));
        }
        if let Some(index) = &self.index {
            if index.get(&rec.read_id).is_some() {
                return Err(Slow5Error::DuplicateReadId(rec.read_id.to_string()));
            }
        }

        let bytes = rec.encode(self.format, self.header.aux(), &self.press)?;
        let offset = match &mut self.stream {
            Stream::Writer(file) => {
                let offset = file.seek(SeekFrom::End(0))?;
                file.write_all(&bytes)?;
                offset
            }
            Stream::Reader(_) => return Err(Slow5Error::WrongMode("writing")),
        };
        if let Some(index) = self.index.as_mut() {
            index.insert(rec.read_id.clone(), offset, bytes.len() as u64)?;
        }
        Ok(())
    }

    /// Re-emit this file's header and records into another stream, in the
    /// requested format and compression method. Binary destinations are
    /// terminated with the end-of-file marker.
    pub fn convert<W: Write>(
        &mut self,
        to: &mut W,
        to_format: Format,
        to_method: PressMethod,
    ) -> Result<()> {
        error::track(self.convert_inner(to, to_format, to_method))
    }

    fn convert_inner<W: Write>(
        &mut self,
        to: &mut W,
        to_format: Format,
        to_method: PressMethod,
    ) -> Result<()> {
        let to_method = match to_format {
            Format::Ascii => PressMethod::None,
            Format::Binary => to_method,
            Format::Unknown => {
                return Err(Slow5Error::UnknownFormat("conversion target".to_string()));
            }
        };
        to.write_all(&self.header.encode(to_format, to_method)?)?;

        let press = Press::new(to_method);
        let schema = self.header.aux().clone();
        self.seek_to_records()?;
        while let Some(rec) = self.next_rec_inner()? {
            to.write_all(&rec.encode(to_format, &schema, &press)?)?;
        }

        if to_format == Format::Binary {
            to.write_all(&BINARY_EOF)?;
        }
        to.flush()?;
        Ok(())
    }

    /// Flush and close the handle. For a binary writer this writes the
    /// end-of-file marker. Dropping the handle does the same on a
    /// best-effort basis.
    pub fn close(mut self) -> Result<()> {
        error::track(self.finish())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        if let Stream::Writer(file) = &mut self.stream {
            if self.format == Format::Binary {
                file.seek(SeekFrom::End(0))?;
                file.write_all(&BINARY_EOF)?;
            }
            file.flush()?;
        }
        Ok(())
    }

    pub(crate) fn stream_position(&self) -> u64 {
        self.cursor
    }

    pub(crate) fn seek_to_records(&mut self) -> Result<()> {
        self.seek_to(self.start_rec_offset)
    }

    pub(crate) fn seek_to(&mut self, offset: u64) -> Result<()> {
        match &mut self.stream {
            Stream::Reader(reader) => {
                reader.seek(SeekFrom::Start(offset))?;
            }
            Stream::Writer(file) => {
                file.seek(SeekFrom::Start(offset))?;
            }
        }
        self.cursor = offset;
        self.at_eof = false;
        Ok(())
    }

    /// Scan one record without fully decoding it, yielding its read
    /// identifier, byte offset and on-disk size. Binary records are skipped
    /// by their size prefix and only decompressed far enough to recover the
    /// identifier.
    pub(crate) fn next_entry(&mut self) -> Result<Option<(FlexString, u64, u64)>> {
        match self.format {
            Format::Ascii => {
                let offset = self.cursor;
                let mut line = String::new();
                let n = self.reader_mut()?.read_line(&mut line)?;
                if n == 0 {
                    return Ok(None);
                }
                self.cursor += n as u64;
                let trimmed = line.strip_suffix('\n').unwrap_or(&line);
                let read_id = trimmed.split(SEP_COL).next().unwrap_or("");
                if read_id.is_empty() {
                    return Err(Slow5Error::Parse("empty read id".to_string()));
                }
                Ok(Some((FlexString::from(read_id), offset, n as u64)))
            }
            Format::Binary => {
                let offset = self.cursor;
                let size = match self.read_record_size()? {
                    None => return Ok(None),
                    Some(size) => size,
                };
                let payload = self.read_payload(size)?;
                let plain = self.press.depress(&payload)?;
                let (id_len, rest) = crate::binary_parsing::take_u16(&plain)?;
                let (read_id, _) = crate::binary_parsing::take_str(id_len as usize, rest)?;
                Ok(Some((read_id, offset, 8 + size)))
            }
            Format::Unknown => Err(Slow5Error::UnknownFormat(self.path.display().to_string())),
        }
    }

    fn reader_mut(&mut self) -> Result<&mut BufReader<File>> {
        match &mut self.stream {
            Stream::Reader(reader) => Ok(reader),
            Stream::Writer(_) => Err(Slow5Error::WrongMode("reading")),
        }
    }

    /// Read the `u64` size prefix of the next binary record, or `None` at
    /// the end-of-file marker. Running out of bytes without seeing the
    /// marker reports the file as truncated.
    fn read_record_size(&mut self) -> Result<Option<u64>> {
        if self.at_eof {
            return Ok(None);
        }
        let start = self.cursor;
        let mut head = [0u8; 8];

        match self.reader_mut()?.read_exact(&mut head[..BINARY_EOF.len()]) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(Slow5Error::TruncatedRecord(start));
            }
            Err(e) => return Err(e.into()),
        }
        self.cursor += BINARY_EOF.len() as u64;
        if head[..BINARY_EOF.len()] == BINARY_EOF {
            self.at_eof = true;
            return Ok(None);
        }

        match self.reader_mut()?.read_exact(&mut head[BINARY_EOF.len()..]) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(Slow5Error::TruncatedRecord(start));
            }
            Err(e) => return Err(e.into()),
        }
        self.cursor += (head.len() - BINARY_EOF.len()) as u64;
        Ok(Some(u64::from_le_bytes(head)))
    }

    /// Read one record payload of a known size from the stream.
    fn read_payload(&mut self, size: u64) -> Result<Vec<u8>> {
        let offset = self.cursor;
        let mut payload = vec![0u8; size as usize];
        match self.reader_mut()?.read_exact(&mut payload) {
            Ok(()) => {
                self.cursor += size;
                Ok(payload)
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(Slow5Error::TruncatedRecord(offset))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Read `size` bytes at `offset`, leaving the stream position right
    /// after them.
    fn read_at(&mut self, offset: u64, size: u64) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; size as usize];
        let read = match &mut self.stream {
            Stream::Reader(reader) => {
                reader.seek(SeekFrom::Start(offset))?;
                reader.read_exact(&mut buf)
            }
            Stream::Writer(file) => {
                file.seek(SeekFrom::Start(offset))?;
                file.read_exact(&mut buf)
            }
        };
        match read {
            Ok(()) => {
                self.cursor = offset + size;
                self.at_eof = false;
                Ok(buf)
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(Slow5Error::TruncatedRecord(offset))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for Slow5File {
    fn drop(&mut self) {
        let _ = self.finish();
    }
}

/// An iterator over the records of an open file.
pub struct Records<'a> {
    file: &'a mut Slow5File,
}

impl Iterator for Records<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Result<Record>> {
        self.file.next_rec().transpose()
    }
}
