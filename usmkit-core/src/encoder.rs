//! Chunk encoding

use crate::constants::{
    PayloadKind, CHUNK_HEADER_SIZE, CONTENTS_END, DEFAULT_FRAME_RATE, END_CHUNK_SIZE, HEADER_END,
    METADATA_END, PAYLOAD_HEADER_SIZE,
};
use crate::error::UsmError;
use crate::types::{Chunk, ChunkId, PayloadHeader};
use alloc::format;
use bytes::{BufMut, Bytes, BytesMut};
#[cfg(feature = "std")]
use std::io::Write;

/// Resolve the payload slice that `size` says should be written.
///
/// A payload longer than declared is truncated; a shorter one cannot be
/// framed.
fn framed_payload(chunk: &Chunk) -> Result<&[u8], UsmError> {
    let len = chunk.declared_payload_len()?;
    chunk
        .payload
        .get(..len)
        .ok_or_else(|| UsmError::InvalidChunk {
            offset: 0,
            reason: format!(
                "{} chunk declares {} payload bytes but only {} are present",
                chunk.id,
                len,
                chunk.payload.len()
            ),
        })
}

/// Encode a chunk into bytes
///
/// The chunk is encoded with the following layout:
/// 1. Chunk header (8 bytes): id, size (big-endian)
/// 2. Payload header (24 bytes)
/// 3. Payload (`size - 24 - padding_size` bytes)
/// 4. Zero padding (`padding_size` bytes)
///
/// `size` is written as given; it is not recomputed from the payload.
pub fn encode_chunk_to_bytes(chunk: &Chunk) -> Result<Bytes, UsmError> {
    let payload = framed_payload(chunk)?;

    let mut buf = BytesMut::with_capacity(chunk.total_size());
    buf.put_slice(chunk.id.as_bytes());
    buf.put_u32(chunk.size);
    buf.put_slice(&chunk.header.to_bytes());
    buf.put_slice(payload);
    buf.put_bytes(0, chunk.header.padding_size as usize);

    Ok(buf.freeze())
}

/// Encode a chunk into a writer, returning the number of bytes written
#[cfg(feature = "std")]
pub fn encode_chunk<W: Write>(chunk: &Chunk, writer: &mut W) -> Result<usize, UsmError> {
    let payload = framed_payload(chunk)?;

    writer.write_all(chunk.id.as_bytes())?;
    writer.write_all(&chunk.size.to_be_bytes())?;
    writer.write_all(&chunk.header.to_bytes())?;
    writer.write_all(payload)?;

    let padding = chunk.header.padding_size as usize;
    if padding > 0 {
        writer.write_all(&alloc::vec![0u8; padding])?;
    }

    Ok(CHUNK_HEADER_SIZE + PAYLOAD_HEADER_SIZE + payload.len() + padding)
}

/// Builder for constructing chunks with a consistent size and padding
pub struct ChunkBuilder {
    id: ChunkId,
    header: PayloadHeader,
    payload: Bytes,
    align: usize,
}

impl ChunkBuilder {
    /// Create a new builder for a Stream chunk
    pub fn new(id: ChunkId) -> Self {
        Self {
            id,
            header: PayloadHeader::new(PayloadKind::Stream),
            payload: Bytes::new(),
            align: 1,
        }
    }

    /// Set the payload kind
    pub fn kind(mut self, kind: PayloadKind) -> Self {
        self.header.kind = kind;
        self
    }

    /// Set the channel number
    pub fn channel(mut self, channel: u8) -> Self {
        self.header.channel = channel;
        self
    }

    /// Set the frame time
    pub fn frame_time(mut self, frame_time: u32) -> Self {
        self.header.frame_time = frame_time;
        self
    }

    /// Set the frame rate
    pub fn frame_rate(mut self, frame_rate: u32) -> Self {
        self.header.frame_rate = frame_rate;
        self
    }

    /// Set the payload
    pub fn payload(mut self, payload: Bytes) -> Self {
        self.payload = payload;
        self
    }

    /// Pad the framed chunk (header included) to a multiple of `align` bytes
    pub fn align(mut self, align: usize) -> Self {
        self.align = align.max(1);
        self
    }

    /// Build the chunk, computing padding and size
    pub fn build(mut self) -> Result<Chunk, UsmError> {
        let unpadded = CHUNK_HEADER_SIZE + PAYLOAD_HEADER_SIZE + self.payload.len();
        let padding = match unpadded % self.align {
            0 => 0,
            rem => self.align - rem,
        };

        self.header.padding_size = u16::try_from(padding).map_err(|_| {
            UsmError::InvalidStructure(format!("alignment padding {} exceeds u16", padding))
        })?;

        let size = PAYLOAD_HEADER_SIZE + self.payload.len() + padding;
        if size > i32::MAX as usize {
            return Err(UsmError::InvalidStructure(format!(
                "chunk size {} exceeds the 31-bit size field",
                size
            )));
        }

        Ok(Chunk::new(self.id, self.header, self.payload))
    }

    /// Build and encode the chunk
    pub fn encode(self) -> Result<Bytes, UsmError> {
        let chunk = self.build()?;
        encode_chunk_to_bytes(&chunk)
    }
}

fn end_chunk(id: ChunkId, sentinel: &'static [u8; 32]) -> Chunk {
    let mut header = PayloadHeader::new(PayloadKind::End);
    header.frame_rate = DEFAULT_FRAME_RATE;

    Chunk {
        id,
        size: END_CHUNK_SIZE,
        header,
        payload: Bytes::from_static(sentinel),
    }
}

/// `#HEADER END` marker closing the header run of a stream
pub fn header_end_chunk(id: ChunkId) -> Chunk {
    end_chunk(id, HEADER_END)
}

/// `#METADATA END` marker closing the metadata run of a stream
pub fn metadata_end_chunk(id: ChunkId) -> Chunk {
    end_chunk(id, METADATA_END)
}

/// `#CONTENTS END` marker closing the media frames of a stream
pub fn contents_end_chunk(id: ChunkId) -> Chunk {
    end_chunk(id, CONTENTS_END)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{SFA, SFV};

    #[test]
    fn test_encode_simple_chunk() {
        let chunk = ChunkBuilder::new(SFV)
            .frame_time(7)
            .frame_rate(30)
            .payload(Bytes::from_static(b"frame"))
            .build()
            .unwrap();

        let encoded = encode_chunk_to_bytes(&chunk).unwrap();

        assert_eq!(&encoded[0..4], b"@SFV");
        assert_eq!(&encoded[4..8], &(24u32 + 5).to_be_bytes());
        assert_eq!(encoded[9], 0x18);
        assert_eq!(&encoded[16..20], &7u32.to_be_bytes());
        assert_eq!(&encoded[32..], b"frame");
    }

    #[test]
    fn test_builder_alignment() {
        let chunk = ChunkBuilder::new(SFA)
            .payload(Bytes::from(vec![1u8; 10]))
            .align(16)
            .build()
            .unwrap();

        // 8 + 24 + 10 = 42 -> 48
        assert_eq!(chunk.header.padding_size, 6);
        assert_eq!(chunk.total_size(), 48);

        let encoded = chunk_bytes(&chunk);
        assert_eq!(encoded.len(), 48);
        assert_eq!(&encoded[42..], &[0u8; 6]);
    }

    #[test]
    fn test_encode_truncates_long_payload() {
        let mut chunk = ChunkBuilder::new(SFV)
            .payload(Bytes::from_static(b"0123456789"))
            .build()
            .unwrap();
        chunk.size = 24 + 4;

        let encoded = chunk_bytes(&chunk);
        assert_eq!(encoded.len(), 8 + 24 + 4);
        assert_eq!(&encoded[32..], b"0123");
    }

    #[test]
    fn test_encode_rejects_short_payload() {
        let mut chunk = ChunkBuilder::new(SFV)
            .payload(Bytes::from_static(b"ab"))
            .build()
            .unwrap();
        chunk.size = 24 + 10;

        assert!(matches!(
            encode_chunk_to_bytes(&chunk),
            Err(UsmError::InvalidChunk { .. })
        ));
    }

    #[test]
    fn test_end_chunks() {
        let end = contents_end_chunk(SFV);
        assert_eq!(end.size, 0x38);
        assert_eq!(end.header.kind, PayloadKind::End);
        assert_eq!(end.header.frame_rate, 30);
        assert!(end.validate().is_ok());

        let encoded = chunk_bytes(&header_end_chunk(SFA));
        assert_eq!(encoded.len(), 0x40);
        assert!(encoded[32..].starts_with(b"#HEADER END"));
        assert!(metadata_end_chunk(SFA).payload.starts_with(b"#METADATA END"));
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_writer_matches_bytes() {
        let chunk = ChunkBuilder::new(SFV)
            .payload(Bytes::from_static(b"writer"))
            .align(16)
            .build()
            .unwrap();

        let mut out = Vec::new();
        let written = encode_chunk(&chunk, &mut out).unwrap();

        assert_eq!(written, out.len());
        assert_eq!(out, chunk_bytes(&chunk).to_vec());
    }

    fn chunk_bytes(chunk: &Chunk) -> Bytes {
        encode_chunk_to_bytes(chunk).unwrap()
    }
}
