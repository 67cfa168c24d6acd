//! Core types for USM chunks

use crate::constants::{
    PayloadKind, StreamKind, CHUNK_HEADER_SIZE, PAYLOAD_HEADER_OFFSET, PAYLOAD_HEADER_SIZE,
};
use crate::error::UsmError;
use alloc::format;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Four-byte tag identifying the role of a chunk (`CRID`, `@SFV`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId(pub [u8; 4]);

impl ChunkId {
    /// Raw tag bytes
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Stream family of this id, if any
    pub fn stream_kind(&self) -> Option<StreamKind> {
        StreamKind::from_id(*self)
    }
}

impl core::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

/// The fixed 24-byte header that precedes every chunk payload
///
/// Reserved bytes of the on-disk structure are not kept; they read as
/// anything and are written as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadHeader {
    /// Length of this header, conventionally 0x18
    pub offset: u8,

    /// Number of zero bytes following the payload
    pub padding_size: u16,

    /// Channel (track) number within the stream family
    pub channel: u8,

    /// Role of the payload
    pub kind: PayloadKind,

    /// Presentation time in `frame_rate` units
    pub frame_time: u32,

    /// Time base of `frame_time`
    pub frame_rate: u32,
}

impl PayloadHeader {
    /// Create a header of the given kind with conventional defaults
    pub fn new(kind: PayloadKind) -> Self {
        Self {
            offset: PAYLOAD_HEADER_OFFSET,
            padding_size: 0,
            channel: 0,
            kind,
            frame_time: 0,
            frame_rate: 0,
        }
    }

    /// Parse the 24-byte on-disk representation
    pub fn from_bytes(raw: &[u8; PAYLOAD_HEADER_SIZE]) -> Self {
        Self {
            offset: raw[1],
            padding_size: u16::from_be_bytes([raw[2], raw[3]]),
            channel: raw[4],
            kind: PayloadKind::from_u8(raw[7]),
            frame_time: u32::from_be_bytes([raw[8], raw[9], raw[10], raw[11]]),
            frame_rate: u32::from_be_bytes([raw[12], raw[13], raw[14], raw[15]]),
        }
    }

    /// Serialize to the 24-byte on-disk representation
    pub fn to_bytes(&self) -> [u8; PAYLOAD_HEADER_SIZE] {
        let mut raw = [0u8; PAYLOAD_HEADER_SIZE];
        raw[1] = self.offset;
        raw[2..4].copy_from_slice(&self.padding_size.to_be_bytes());
        raw[4] = self.channel;
        raw[7] = self.kind.as_u8();
        raw[8..12].copy_from_slice(&self.frame_time.to_be_bytes());
        raw[12..16].copy_from_slice(&self.frame_rate.to_be_bytes());
        raw
    }

    /// Presentation time in milliseconds, used as the interleaving key.
    ///
    /// Integer division: distinct frame times may share a bucket at low
    /// frame rates. A zero frame rate maps to time 0.
    pub fn normalized_time(&self) -> u64 {
        (u64::from(self.frame_time) * 1000)
            .checked_div(u64::from(self.frame_rate))
            .unwrap_or(0)
    }
}

/// One framed unit of a USM container
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Chunk tag
    pub id: ChunkId,

    /// Declared length of everything after the 8-byte chunk header
    pub size: u32,

    /// Payload sub-header
    pub header: PayloadHeader,

    /// Payload bytes (padding excluded)
    pub payload: Bytes,
}

impl Chunk {
    /// Create a chunk and derive `size` from the payload and header padding
    pub fn new(id: ChunkId, header: PayloadHeader, payload: Bytes) -> Self {
        let size = (PAYLOAD_HEADER_SIZE + payload.len() + header.padding_size as usize) as u32;
        Self {
            id,
            size,
            header,
            payload,
        }
    }

    /// Payload length implied by `size` and the padding field
    pub fn declared_payload_len(&self) -> Result<usize, UsmError> {
        let overhead = PAYLOAD_HEADER_SIZE + self.header.padding_size as usize;
        (self.size as usize)
            .checked_sub(overhead)
            .ok_or_else(|| UsmError::InvalidChunk {
                offset: 0,
                reason: format!(
                    "size {} is smaller than payload header plus {} padding bytes",
                    self.size, self.header.padding_size
                ),
            })
    }

    /// Check `size == 24 + payload + padding`
    pub fn validate(&self) -> Result<(), UsmError> {
        let declared = self.declared_payload_len()?;
        if declared != self.payload.len() {
            return Err(UsmError::InvalidChunk {
                offset: 0,
                reason: format!(
                    "payload length mismatch: size implies {}, actual {}",
                    declared,
                    self.payload.len()
                ),
            });
        }
        Ok(())
    }

    /// Total number of bytes this chunk occupies when framed
    pub fn total_size(&self) -> usize {
        CHUNK_HEADER_SIZE + self.size as usize
    }

    /// Payload kind shortcut
    pub fn kind(&self) -> PayloadKind {
        self.header.kind
    }

    /// Stream family of this chunk's id
    pub fn stream_kind(&self) -> Option<StreamKind> {
        self.id.stream_kind()
    }

    /// True for media frames of one of the interleaved stream families
    pub fn is_stream_of(&self, kind: StreamKind) -> bool {
        self.header.kind == PayloadKind::Stream && self.id == kind.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{CRID, SFV};

    #[test]
    fn test_payload_header_layout() {
        let header = PayloadHeader {
            offset: 0x18,
            padding_size: 0x0102,
            channel: 3,
            kind: PayloadKind::Seek,
            frame_time: 0x0A0B0C0D,
            frame_rate: 2997,
        };

        let raw = header.to_bytes();
        assert_eq!(raw[0], 0);
        assert_eq!(raw[1], 0x18);
        assert_eq!(&raw[2..4], &[0x01, 0x02]);
        assert_eq!(raw[4], 3);
        assert_eq!(&raw[5..7], &[0, 0]);
        assert_eq!(raw[7], 3);
        assert_eq!(&raw[8..12], &[0x0A, 0x0B, 0x0C, 0x0D]);
        assert_eq!(&raw[12..16], &2997u32.to_be_bytes());
        assert_eq!(&raw[16..], &[0u8; 8]);

        assert_eq!(PayloadHeader::from_bytes(&raw), header);
    }

    #[test]
    fn test_reserved_bytes_are_ignored() {
        let mut raw = PayloadHeader::new(PayloadKind::Stream).to_bytes();
        raw[0] = 0xFF;
        raw[5] = 0xEE;
        raw[20] = 0xDD;

        let parsed = PayloadHeader::from_bytes(&raw);
        assert_eq!(parsed, PayloadHeader::new(PayloadKind::Stream));
    }

    #[test]
    fn test_normalized_time() {
        let mut header = PayloadHeader::new(PayloadKind::Stream);
        header.frame_rate = 30;
        header.frame_time = 45;
        assert_eq!(header.normalized_time(), 1500);

        // integer division collapses neighbouring frames
        header.frame_rate = 3000;
        header.frame_time = 1;
        assert_eq!(header.normalized_time(), 0);

        header.frame_rate = 0;
        header.frame_time = 99;
        assert_eq!(header.normalized_time(), 0);

        header.frame_rate = 1;
        header.frame_time = u32::MAX;
        assert_eq!(header.normalized_time(), u64::from(u32::MAX) * 1000);
    }

    #[test]
    fn test_chunk_new_computes_size() {
        let mut header = PayloadHeader::new(PayloadKind::Stream);
        header.padding_size = 4;
        let chunk = Chunk::new(SFV, header, Bytes::from_static(b"abcd"));

        assert_eq!(chunk.size, 24 + 4 + 4);
        assert_eq!(chunk.total_size(), 40);
        assert!(chunk.validate().is_ok());
        assert!(chunk.is_stream_of(StreamKind::Video));
    }

    #[test]
    fn test_chunk_validate_mismatch() {
        let mut chunk = Chunk::new(
            CRID,
            PayloadHeader::new(PayloadKind::Header),
            Bytes::from_static(b"xyz"),
        );
        chunk.size = 10;
        assert!(matches!(
            chunk.validate(),
            Err(UsmError::InvalidChunk { .. })
        ));
    }

    #[test]
    fn test_chunk_id_display() {
        assert_eq!(format!("{}", SFV), "@SFV");
        assert_eq!(format!("{}", ChunkId(*b"HCA\0")), "HCA\\x00");
    }
}
