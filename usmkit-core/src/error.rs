//! Error types for USM container operations

use crate::constants::StreamKind;
use alloc::boxed::Box;
use alloc::string::String;

/// Errors that can occur while decoding, encoding or remuxing a container
#[cfg_attr(feature = "std", derive(thiserror::Error))]
#[derive(Debug, Clone, PartialEq)]
pub enum UsmError {
    /// Fewer bytes were available than a length field declared
    #[cfg_attr(
        feature = "std",
        error("Truncated input at offset {offset}: expected {expected} bytes, got {actual}")
    )]
    TruncatedInput {
        /// Stream offset where the short read started.
        offset: u64,
        /// The number of bytes declared.
        expected: usize,
        /// The number of bytes actually available.
        actual: usize,
    },

    /// Chunk header fields are inconsistent with each other
    #[cfg_attr(feature = "std", error("Invalid chunk at offset {offset}: {reason}"))]
    InvalidChunk {
        /// Stream offset of the chunk header.
        offset: u64,
        /// What was wrong with it.
        reason: String,
    },

    /// Table region offsets are non-monotonic or out of range
    #[cfg_attr(
        feature = "std",
        error("Invalid table offsets: unique={unique} string={string} bytes={bytes} size={size}")
    )]
    InvalidOffsets {
        /// Offset of the unique-value region.
        unique: u32,
        /// Offset of the string region.
        string: u32,
        /// Offset of the byte region.
        bytes: u32,
        /// Declared table size.
        size: u32,
    },

    /// A table entry points outside its region
    #[cfg_attr(feature = "std", error("Corrupt table: {0}"))]
    CorruptTable(String),

    /// A tag byte did not resolve to a catalog entry
    #[cfg_attr(
        feature = "std",
        error("Unknown value tag {tag:#04x} (row {row}, item {item})")
    )]
    UnknownTag {
        /// The raw tag byte.
        tag: u8,
        /// Row being decoded.
        row: u32,
        /// Item index within the row.
        item: u16,
    },

    /// Caller-supplied structure cannot be encoded
    #[cfg_attr(feature = "std", error("Invalid structure: {0}"))]
    InvalidStructure(String),

    /// The encoded seek table does not fit in the space reserved for it
    #[cfg_attr(
        feature = "std",
        error("Seek table needs {required} bytes but only {reserved} were reserved")
    )]
    SeekTableOverflow {
        /// Bytes reserved during layout.
        reserved: usize,
        /// Bytes the aligned seek chunk actually needs.
        required: usize,
    },

    /// The container has no root chunk to write
    #[cfg_attr(feature = "std", error("Container has no CRID root chunk"))]
    MissingRoot,

    /// The container has no stream chunks of the given kind
    #[cfg_attr(feature = "std", error("No {0} stream chunks available"))]
    MissingStream(StreamKind),

    /// A chunk could not be read while demuxing
    #[cfg_attr(feature = "std", error("Demux failed at chunk offset {offset}: {cause}"))]
    Demux {
        /// Offset of the chunk that failed.
        offset: u64,
        /// Underlying decode error.
        cause: Box<UsmError>,
    },

    /// IO error during read/write
    #[cfg_attr(feature = "std", error("IO error: {0}"))]
    Io(String),
}

#[cfg(feature = "std")]
impl From<std::io::Error> for UsmError {
    fn from(err: std::io::Error) -> Self {
        UsmError::Io(err.to_string())
    }
}
