//! # usmkit core
//!
//! Parsing, remuxing and re-serialization of USM streaming-media containers.
//!
//! ## Modules
//!
//! - `constants`: Chunk ids, payload kinds, sentinels and layout constants
//! - `types`: Core types (Chunk, ChunkId, PayloadHeader)
//! - `encoder`: Chunk encoding, builder and end-marker chunks
//! - `decoder`: Chunk decoding from readers and byte buffers
//! - `value`: Value catalog for UTF table type tags
//! - `table`: UTF table (dictionary) codec
//! - `container`: Demuxed container model and stream substitution
//! - `layout`: Mux planning, seek table generation and backpatching
//! - `mux`: Writing a container to a seekable sink
//! - `subtitle`: Subtitle record decoding

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

extern crate alloc;

pub mod constants;
pub mod container;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod layout;
#[cfg(feature = "std")]
pub mod mux;
pub mod subtitle;
pub mod table;
pub mod types;
pub mod value;

// Re-export commonly used types
pub use constants::{PayloadKind, StreamKind};
pub use container::Container;
pub use error::UsmError;
pub use layout::{Layout, MuxStats};
#[cfg(feature = "std")]
pub use mux::mux;
pub use subtitle::{decode_subtitle, Language, SubtitleRecord};
pub use table::{Dictionary, Entry, Row, Table};
pub use types::{Chunk, ChunkId, PayloadHeader};
pub use value::{Storage, Value, ValueType};

/// Result type alias for usmkit operations
pub type Result<T> = core::result::Result<T, UsmError>;
