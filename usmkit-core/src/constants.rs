//! Constants and fixed lookup tables for the USM container format

use crate::types::ChunkId;
use serde::{Deserialize, Serialize};

/// Root / identification chunk
pub const CRID: ChunkId = ChunkId(*b"CRID");

/// Video stream chunks
pub const SFV: ChunkId = ChunkId(*b"@SFV");

/// Audio stream chunks
pub const SFA: ChunkId = ChunkId(*b"@SFA");

/// Subtitle stream chunks
pub const SBT: ChunkId = ChunkId(*b"@SBT");

/// Marker opening every UTF table payload
pub const UTF_MARKER: &[u8; 4] = b"@UTF";

/// Prefix of the HCA codec header packet carried as the first audio chunk
pub const HCA_MAGIC: &[u8; 4] = b"HCA\0";

/// Size of the chunk header (id + size)
pub const CHUNK_HEADER_SIZE: usize = 8;

/// Size of the payload sub-header that follows every chunk header
pub const PAYLOAD_HEADER_SIZE: usize = 24;

/// Conventional value of the payload header `offset` field
pub const PAYLOAD_HEADER_OFFSET: u8 = 0x18;

/// Frame rate written into synthetic chunks (end markers, seek table)
pub const DEFAULT_FRAME_RATE: u32 = 30;

/// Declared size of a synthetic end-marker chunk
pub const END_CHUNK_SIZE: u32 = 0x38;

/// `#HEADER END     ===============\0`
pub const HEADER_END: &[u8; 32] = b"#HEADER END     ===============\0";

/// `#METADATA END   ===============\0`
pub const METADATA_END: &[u8; 32] = b"#METADATA END   ===============\0";

/// `#CONTENTS END   ===============\0`
pub const CONTENTS_END: &[u8; 32] = b"#CONTENTS END   ===============\0";

/// Size of the fixed UTF table header (offsets and counts)
pub const TABLE_HEADER_SIZE: usize = 24;

/// Upper bound on `rows * items` of a single table, for both directions
pub const MAX_TABLE_CELLS: usize = 1 << 20;

/// Size of the `@UTF` envelope (marker + table size)
pub const TABLE_ENVELOPE_SIZE: usize = 8;

/// First entry of every string region
pub const NULL_STRING: &[u8; 7] = b"<NULL>\0";

/// Name of the generated video seek table
pub const VIDEO_SEEK_TABLE_NAME: &str = "VIDEO_SEEKINFO";

/// One seek entry is recorded for every this-many video frames
pub const SEEK_INTERVAL: usize = 30;

/// Alignment applied to the generated seek chunk
pub const SEEK_CHUNK_ALIGN: usize = 0x10;

/// Bytes of seek-table space reserved for a container with `video_frames` video chunks.
///
/// 12 bytes per sampled frame plus 144 bytes of fixed table overhead, rounded
/// up to the 16-byte chunk alignment.
pub const fn reserve_size(video_frames: usize) -> usize {
    let raw = 12 * (video_frames / SEEK_INTERVAL + 1) + 144;
    round_up(raw, SEEK_CHUNK_ALIGN)
}

/// Round `value` up to the next multiple of `align`
pub const fn round_up(value: usize, align: usize) -> usize {
    match value % align {
        0 => value,
        rem => value + (align - rem),
    }
}

/// Role of a chunk payload, stored in byte 7 of the payload header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayloadKind {
    /// One media frame or packet
    Stream,
    /// Per-stream header table, written once
    Header,
    /// Sentinel marking the end of a run
    End,
    /// Per-stream seek / metadata table
    Seek,
    /// Unrecognised kind, carried through untouched
    Other(u8),
}

impl PayloadKind {
    /// Map the raw payload-type byte
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => PayloadKind::Stream,
            1 => PayloadKind::Header,
            2 => PayloadKind::End,
            3 => PayloadKind::Seek,
            other => PayloadKind::Other(other),
        }
    }

    /// Raw payload-type byte
    pub const fn as_u8(&self) -> u8 {
        match self {
            PayloadKind::Stream => 0,
            PayloadKind::Header => 1,
            PayloadKind::End => 2,
            PayloadKind::Seek => 3,
            PayloadKind::Other(other) => *other,
        }
    }

    /// Payloads of this kind carry a UTF table
    pub const fn carries_table(&self) -> bool {
        matches!(self, PayloadKind::Header | PayloadKind::Seek)
    }
}

/// The media stream families the remuxer knows how to interleave
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StreamKind {
    /// `@SFV`
    Video,
    /// `@SFA`
    Audio,
    /// `@SBT`
    Subtitle,
}

impl StreamKind {
    /// Layout order used when writing header and metadata runs
    pub const ORDER: [StreamKind; 3] = [StreamKind::Video, StreamKind::Audio, StreamKind::Subtitle];

    /// Chunk id of this stream family
    pub const fn id(&self) -> ChunkId {
        match self {
            StreamKind::Video => SFV,
            StreamKind::Audio => SFA,
            StreamKind::Subtitle => SBT,
        }
    }

    /// Stream family for a chunk id, if it is one of the interleaved streams
    pub fn from_id(id: ChunkId) -> Option<Self> {
        Self::ORDER.into_iter().find(|kind| kind.id() == id)
    }

    /// Lower-case name used in logs and error messages
    pub const fn name(&self) -> &'static str {
        match self {
            StreamKind::Video => "video",
            StreamKind::Audio => "audio",
            StreamKind::Subtitle => "subtitle",
        }
    }
}

impl core::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
