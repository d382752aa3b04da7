//! Error types and the process-wide diagnostic state of the library.
//!
//! Every fallible operation returns a [`Slow5Error`]. Each error maps to a
//! coarse [`ErrorKind`] which is also recorded in a thread-local slot,
//! readable through [`last_error`] from the thread that caused it. A
//! process-wide log level gates the single diagnostic line emitted per
//! failure, and an exit policy decides whether a failure aborts the process
//! instead of returning to the caller.

use crate::header::Version;

use thiserror::Error;

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Crate errors.
#[derive(Error, Debug)]
pub enum Slow5Error {
    #[error("Not enough bytes in the input. Expected {expected:?}, found {found:?}.")]
    NotEnoughBytes { expected: usize, found: usize },

    #[error("Failed to read or write bytes on the underlying stream")]
    Io(#[from] std::io::Error),

    #[error("Truncated record at offset {0}.")]
    TruncatedRecord(u64),

    #[error("Invalid magic bytes: expected {expected:?}.")]
    BadMagic { expected: &'static [u8] },

    #[error("File version {found} is newer than the maximum version {supported} supported by this library.")]
    UnsupportedVersion { found: Version, supported: Version },

    #[error("Read ID '{0}' was not found.")]
    ReadIdNotFound(String),

    #[error("Read ID '{0}' is a duplicate.")]
    DuplicateReadId(String),

    #[error("Auxiliary field '{0}' is declared twice in the schema.")]
    DuplicateField(String),

    #[error("Auxiliary field '{0}' does not exist in the schema.")]
    FieldNotFound(String),

    #[error("Auxiliary field '{name}' has type {found}, expected {expected}.")]
    AuxTypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Auxiliary field '{0}' holds the missing value.")]
    MissingValue(String),

    #[error("Unknown slow5 format for '{0}'.")]
    UnknownFormat(String),

    #[error("Unknown auxiliary type tag {0}.")]
    UnknownTypeTag(u8),

    #[error("Unknown compression method tag {0}.")]
    UnknownPressMethod(u8),

    #[error("Attribute '{0}' does not exist in the header.")]
    UnknownAttribute(String),

    #[error("Read group {group} is out of range, the header has {count} read groups.")]
    ReadGroupOutOfRange { group: u32, count: u32 },

    #[error("No index is loaded for this file.")]
    IndexNotLoaded,

    #[error("The operation requires a file opened for {0}.")]
    WrongMode(&'static str),

    #[error("Failed to convert bytes to a UTF8 string")]
    InvalidStringBytes(#[from] std::str::Utf8Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl Slow5Error {
    /// The coarse kind of the error, as recorded in the last-error slot.
    pub fn kind(&self) -> ErrorKind {
        use Slow5Error::*;
        match self {
            NotEnoughBytes { .. } | Io(_) | WrongMode(_) => ErrorKind::Io,
            TruncatedRecord(_) => ErrorKind::Truncated,
            BadMagic { .. } => ErrorKind::BadMagic,
            UnsupportedVersion { .. } => ErrorKind::Version,
            ReadIdNotFound(_) | FieldNotFound(_) | UnknownAttribute(_)
            | ReadGroupOutOfRange { .. } | IndexNotLoaded => ErrorKind::NotFound,
            DuplicateReadId(_) | DuplicateField(_) => ErrorKind::Duplicate,
            AuxTypeMismatch { .. } => ErrorKind::TypeMismatch,
            MissingValue(_) => ErrorKind::MissingValue,
            UnknownFormat(_) => ErrorKind::FormatUnknown,
            UnknownTypeTag(_) | UnknownPressMethod(_) | InvalidStringBytes(_) | Parse(_) => {
                ErrorKind::Parse
            }
        }
    }
}

/// Coarse error classification exposed through [`last_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Ok,
    Io,
    Truncated,
    BadMagic,
    Version,
    NotFound,
    Duplicate,
    TypeMismatch,
    MissingValue,
    FormatUnknown,
    Parse,
}

/// Verbosity of the diagnostic output emitted by the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Verbose = 4,
    Debug = 5,
}

/// What the library does when an operation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCondition {
    /// Return the error to the caller.
    ReturnOnError,
    /// Abort the process.
    AbortOnError,
}

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static ABORT_ON_ERROR: AtomicBool = AtomicBool::new(false);

thread_local! {
    static LAST_ERROR: Cell<ErrorKind> = Cell::new(ErrorKind::Ok);
}

/// Set the process-wide log level of the library.
pub fn set_log_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Set the process-wide exit policy of the library.
pub fn set_exit_condition(condition: ExitCondition) {
    ABORT_ON_ERROR.store(
        condition == ExitCondition::AbortOnError,
        Ordering::Relaxed,
    );
}

/// The kind of the most recent error raised on the calling thread, or
/// [`ErrorKind::Ok`] if none was.
pub fn last_error() -> ErrorKind {
    LAST_ERROR.with(|slot| slot.get())
}

pub(crate) fn log_level() -> LogLevel {
    match LOG_LEVEL.load(Ordering::Relaxed) {
        0 => LogLevel::Off,
        1 => LogLevel::Error,
        2 => LogLevel::Warn,
        3 => LogLevel::Info,
        4 => LogLevel::Verbose,
        _ => LogLevel::Debug,
    }
}

pub(crate) fn log_enabled(level: LogLevel) -> bool {
    log_level() >= level
}

/// Route a result through the error surface: record the kind of a failure in
/// the last-error slot, emit one diagnostic line when the log level permits,
/// and honor the abort-on-error policy.
pub(crate) fn track<T>(result: crate::Result<T>) -> crate::Result<T> {
    if let Err(err) = &result {
        LAST_ERROR.with(|slot| slot.set(err.kind()));
        if log_enabled(LogLevel::Error) {
            log::error!("{}", err);
        }
        if ABORT_ON_ERROR.load(Ordering::Relaxed) {
            std::process::abort();
        }
    }
    result
}
