//! Chunk decoding

use crate::constants::{CHUNK_HEADER_SIZE, PAYLOAD_HEADER_SIZE};
use crate::error::UsmError;
use crate::types::{Chunk, ChunkId, PayloadHeader};
use alloc::format;
#[cfg(feature = "std")]
use alloc::vec::Vec;
use bytes::Bytes;
#[cfg(feature = "std")]
use std::io::{ErrorKind, Read};

#[cfg(feature = "logging")]
use tracing::trace;

/// A chunk together with the stream offset of its header
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedChunk {
    /// Byte offset of the chunk header
    pub offset: u64,

    /// The decoded chunk
    pub chunk: Chunk,
}

/// Fields of the 8-byte chunk header, with `size` checked against the padding
fn parse_headers(
    head: &[u8; CHUNK_HEADER_SIZE],
    payload_head: &[u8; PAYLOAD_HEADER_SIZE],
    offset: u64,
) -> Result<(ChunkId, u32, PayloadHeader, usize), UsmError> {
    let id = ChunkId([head[0], head[1], head[2], head[3]]);
    let raw_size = i32::from_be_bytes([head[4], head[5], head[6], head[7]]);
    let size = u32::try_from(raw_size).map_err(|_| UsmError::InvalidChunk {
        offset,
        reason: format!("negative chunk size {}", raw_size),
    })?;

    let header = PayloadHeader::from_bytes(payload_head);
    let overhead = PAYLOAD_HEADER_SIZE + header.padding_size as usize;
    let payload_len = (size as usize)
        .checked_sub(overhead)
        .ok_or_else(|| UsmError::InvalidChunk {
            offset,
            reason: format!(
                "{} chunk size {} is smaller than payload header plus {} padding bytes",
                id, size, header.padding_size
            ),
        })?;

    Ok((id, size, header, payload_len))
}

/// Fill `buf` from the reader, returning how many bytes were read before EOF
#[cfg(feature = "std")]
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, UsmError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

#[cfg(feature = "std")]
fn read_exact_at<R: Read>(reader: &mut R, buf: &mut [u8], offset: u64) -> Result<(), UsmError> {
    let got = read_full(reader, buf)?;
    if got != buf.len() {
        return Err(UsmError::TruncatedInput {
            offset,
            expected: buf.len(),
            actual: got,
        });
    }
    Ok(())
}

/// Decode one chunk from a reader
///
/// `start_offset` is the stream position of the chunk header and is only
/// used for error context. Returns `Ok(None)` when the reader is exhausted
/// exactly at a chunk boundary, which is the normal end of a container.
/// Padding bytes are read and discarded.
#[cfg(feature = "std")]
pub fn decode_chunk<R: Read>(reader: &mut R, start_offset: u64) -> Result<Option<Chunk>, UsmError> {
    let mut head = [0u8; CHUNK_HEADER_SIZE];
    let got = read_full(reader, &mut head)?;
    if got == 0 {
        return Ok(None);
    }
    if got != CHUNK_HEADER_SIZE {
        return Err(UsmError::TruncatedInput {
            offset: start_offset,
            expected: CHUNK_HEADER_SIZE,
            actual: got,
        });
    }

    let mut payload_head = [0u8; PAYLOAD_HEADER_SIZE];
    read_exact_at(
        reader,
        &mut payload_head,
        start_offset + CHUNK_HEADER_SIZE as u64,
    )?;

    let (id, size, header, payload_len) = parse_headers(&head, &payload_head, start_offset)?;

    // Grow with the data actually read instead of trusting `size` up front
    let body_offset = start_offset + (CHUNK_HEADER_SIZE + PAYLOAD_HEADER_SIZE) as u64;
    let mut payload = Vec::new();
    let got = reader.by_ref().take(payload_len as u64).read_to_end(&mut payload)?;
    if got != payload_len {
        return Err(UsmError::TruncatedInput {
            offset: body_offset,
            expected: payload_len,
            actual: got,
        });
    }

    let mut padding = alloc::vec![0u8; header.padding_size as usize];
    read_exact_at(reader, &mut padding, body_offset + payload_len as u64)?;

    #[cfg(feature = "logging")]
    trace!(
        "Decoded {} chunk at offset {} ({} payload bytes, kind {:?})",
        id,
        start_offset,
        payload_len,
        header.kind
    );

    Ok(Some(Chunk {
        id,
        size,
        header,
        payload: Bytes::from(payload),
    }))
}

/// Decode a chunk from the start of a byte buffer without copying the payload
///
/// Returns the chunk and the number of bytes it occupied (padding included).
pub fn decode_chunk_from_bytes_zero_copy(buf: &Bytes) -> Result<(Chunk, usize), UsmError> {
    let fixed = CHUNK_HEADER_SIZE + PAYLOAD_HEADER_SIZE;
    if buf.len() < fixed {
        return Err(UsmError::TruncatedInput {
            offset: 0,
            expected: fixed,
            actual: buf.len(),
        });
    }

    let mut head = [0u8; CHUNK_HEADER_SIZE];
    head.copy_from_slice(&buf[..CHUNK_HEADER_SIZE]);
    let mut payload_head = [0u8; PAYLOAD_HEADER_SIZE];
    payload_head.copy_from_slice(&buf[CHUNK_HEADER_SIZE..fixed]);

    let (id, size, header, payload_len) = parse_headers(&head, &payload_head, 0)?;

    let total = CHUNK_HEADER_SIZE + size as usize;
    if buf.len() < total {
        return Err(UsmError::TruncatedInput {
            offset: 0,
            expected: total,
            actual: buf.len(),
        });
    }

    let chunk = Chunk {
        id,
        size,
        header,
        payload: buf.slice(fixed..fixed + payload_len),
    };

    Ok((chunk, total))
}

/// Decode a chunk from the start of a byte slice
pub fn decode_chunk_from_bytes(data: &[u8]) -> Result<(Chunk, usize), UsmError> {
    decode_chunk_from_bytes_zero_copy(&Bytes::copy_from_slice(data))
}

/// Iterator over the chunks of a container, tracking stream offsets
///
/// Stops after the first error.
#[cfg(feature = "std")]
pub struct ChunkReader<R> {
    reader: R,
    offset: u64,
    failed: bool,
}

#[cfg(feature = "std")]
impl<R: Read> ChunkReader<R> {
    /// Start reading chunks at stream offset 0
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offset: 0,
            failed: false,
        }
    }

    /// Offset of the next chunk header
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

#[cfg(feature = "std")]
impl<R: Read> Iterator for ChunkReader<R> {
    type Item = Result<LocatedChunk, UsmError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        match decode_chunk(&mut self.reader, self.offset) {
            Ok(Some(chunk)) => {
                let offset = self.offset;
                self.offset += chunk.total_size() as u64;
                Some(Ok(LocatedChunk { offset, chunk }))
            }
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{PayloadKind, SBT, SFV};
    use crate::encoder::{encode_chunk_to_bytes, ChunkBuilder};

    fn sample_chunk() -> Chunk {
        ChunkBuilder::new(SFV)
            .kind(PayloadKind::Stream)
            .channel(1)
            .frame_time(90)
            .frame_rate(30)
            .payload(Bytes::from_static(b"video frame payload"))
            .align(16)
            .build()
            .unwrap()
    }

    #[test]
    fn test_decode_simple_chunk() {
        let chunk = sample_chunk();
        let encoded = encode_chunk_to_bytes(&chunk).unwrap();

        let (decoded, consumed) = decode_chunk_from_bytes(&encoded).unwrap();

        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, chunk);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_decode_from_reader_and_clean_eof() {
        let chunk = sample_chunk();
        let encoded = encode_chunk_to_bytes(&chunk).unwrap();
        let mut cursor = std::io::Cursor::new(encoded.to_vec());

        let decoded = decode_chunk(&mut cursor, 0).unwrap().unwrap();
        assert_eq!(decoded, chunk);

        // Exhausted exactly at a chunk boundary
        assert_eq!(decode_chunk(&mut cursor, 0).unwrap(), None);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_decode_truncated_payload() {
        let encoded = encode_chunk_to_bytes(&sample_chunk()).unwrap();
        let cut = &encoded[..encoded.len() - 20];
        let mut cursor = std::io::Cursor::new(cut);

        let err = decode_chunk(&mut cursor, 100).unwrap_err();
        assert!(matches!(err, UsmError::TruncatedInput { offset, .. } if offset >= 132));
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_decode_truncated_header() {
        let mut cursor = std::io::Cursor::new(b"@SF".to_vec());
        let err = decode_chunk(&mut cursor, 0).unwrap_err();
        assert_eq!(
            err,
            UsmError::TruncatedInput {
                offset: 0,
                expected: 8,
                actual: 3
            }
        );
    }

    #[test]
    fn test_decode_negative_size() {
        let mut raw = encode_chunk_to_bytes(&sample_chunk()).unwrap().to_vec();
        raw[4..8].copy_from_slice(&(-1i32).to_be_bytes());

        assert!(matches!(
            decode_chunk_from_bytes(&raw),
            Err(UsmError::InvalidChunk { .. })
        ));
    }

    #[test]
    fn test_decode_size_smaller_than_padding() {
        let mut raw = encode_chunk_to_bytes(&sample_chunk()).unwrap().to_vec();
        raw[4..8].copy_from_slice(&20u32.to_be_bytes());

        assert!(matches!(
            decode_chunk_from_bytes(&raw),
            Err(UsmError::InvalidChunk { .. })
        ));
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_chunk_reader_offsets() {
        let first = sample_chunk();
        let second = ChunkBuilder::new(SBT)
            .payload(Bytes::from_static(b"sub"))
            .build()
            .unwrap();

        let mut stream = encode_chunk_to_bytes(&first).unwrap().to_vec();
        stream.extend_from_slice(&encode_chunk_to_bytes(&second).unwrap());

        let located: Vec<_> = ChunkReader::new(std::io::Cursor::new(stream))
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(located.len(), 2);
        assert_eq!(located[0].offset, 0);
        assert_eq!(located[1].offset, first.total_size() as u64);
        assert_eq!(located[1].chunk, second);
    }
}
