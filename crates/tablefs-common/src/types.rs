//! Core types for TableFS
//!
//! Directory entries, content chunks and the open mode accepted by the
//! directory index.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Store-assigned identifier of a directory entry
pub type FileId = u64;

/// Zero-based position of a chunk within its file
pub type PartNo = u64;

/// Maximum filename length in bytes (the directory key is indexed)
pub const MAX_FILENAME_LEN: usize = 255;

/// Validate a filename before it reaches the directory table
pub fn validate_filename(name: &str) -> Result<(), FileNameError> {
    if name.is_empty() {
        return Err(FileNameError::Empty);
    }
    if name.len() > MAX_FILENAME_LEN {
        return Err(FileNameError::TooLong(name.len()));
    }
    Ok(())
}

/// Errors that can occur when validating a filename
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FileNameError {
    #[error("filename must not be empty")]
    Empty,
    #[error("filename is {0} bytes, at most 255 allowed")]
    TooLong(usize),
}

/// Directory entry naming a stored file
///
/// `size` is the sum of all chunk payload lengths and `part_count` the number
/// of chunks; chunk numbers always form the range `[0, part_count)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub filename: String,
    pub size: u64,
    pub part_count: u64,
}

impl FileRecord {
    /// Create an empty record for a newly assigned id
    #[must_use]
    pub fn new(id: FileId, filename: impl Into<String>) -> Self {
        Self {
            id,
            filename: filename.into(),
            size: 0,
            part_count: 0,
        }
    }

    /// Reset to zero length, keeping the id
    pub fn clear(&mut self) {
        self.size = 0;
        self.part_count = 0;
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.part_count == 0
    }
}

/// One chunk of a file's content, addressed by `(file_id, part_no)`
///
/// Chunks are immutable once committed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkRecord {
    pub file_id: FileId,
    pub part_no: PartNo,
    pub data: Bytes,
}

impl ChunkRecord {
    #[must_use]
    pub fn new(file_id: FileId, part_no: PartNo, data: impl Into<Bytes>) -> Self {
        Self {
            file_id,
            part_no,
            data: data.into(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Parsed open mode
///
/// Accepted markers are `r` (read), `w` (write), `b` (binary, no effect) and
/// `+` (append). Every mode needs at least one of `r` or `w`.
///
/// ```text
/// "r", "rb"          read only, file must exist
/// "w", "wb"          create, or truncate an existing file on open
/// "w+", "rw", "r+"   bind to the existing file (created if missing) without truncation
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OpenMode {
    read: bool,
    write: bool,
    binary: bool,
    append: bool,
}

impl OpenMode {
    pub const READ: Self = Self {
        read: true,
        write: false,
        binary: false,
        append: false,
    };

    pub const WRITE: Self = Self {
        read: false,
        write: true,
        binary: false,
        append: false,
    };

    pub const APPEND: Self = Self {
        read: false,
        write: true,
        binary: false,
        append: true,
    };

    pub const READ_WRITE: Self = Self {
        read: true,
        write: true,
        binary: false,
        append: false,
    };

    /// Parse a mode string such as `"r"`, `"wb"` or `"w+"`
    pub fn parse(mode: &str) -> Result<Self, ModeError> {
        if mode.is_empty() {
            return Err(ModeError::Empty);
        }
        let mut parsed = Self::default();
        for c in mode.chars() {
            let flag = match c {
                'r' => &mut parsed.read,
                'w' => &mut parsed.write,
                'b' => &mut parsed.binary,
                '+' => &mut parsed.append,
                other => return Err(ModeError::UnknownMarker(other)),
            };
            if *flag {
                return Err(ModeError::DuplicateMarker(c));
            }
            *flag = true;
        }
        if !parsed.read && !parsed.write {
            return Err(ModeError::NoAccess);
        }
        Ok(parsed)
    }

    /// Whether read operations are permitted
    #[must_use]
    pub const fn is_readable(&self) -> bool {
        self.read
    }

    /// Whether write operations are permitted (`w` or `+`)
    #[must_use]
    pub const fn is_writable(&self) -> bool {
        self.write || self.append
    }

    #[must_use]
    pub const fn is_append(&self) -> bool {
        self.append
    }

    /// Pure write modes (`w`, `wb`) truncate an existing file on open
    #[must_use]
    pub const fn truncates_on_open(&self) -> bool {
        self.write && !self.read && !self.append
    }

    /// Whether opening a missing filename creates it
    #[must_use]
    pub const fn creates_missing(&self) -> bool {
        self.is_writable()
    }
}

impl FromStr for OpenMode {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (set, marker) in [
            (self.read, 'r'),
            (self.write, 'w'),
            (self.binary, 'b'),
            (self.append, '+'),
        ] {
            if set {
                write!(f, "{marker}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpenMode({self})")
    }
}

/// Errors that can occur when parsing an open mode
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModeError {
    #[error("mode must not be empty")]
    Empty,
    #[error("unknown mode marker {0:?}")]
    UnknownMarker(char),
    #[error("mode marker {0:?} given twice")]
    DuplicateMarker(char),
    #[error("mode must contain 'r' or 'w'")]
    NoAccess,
}
