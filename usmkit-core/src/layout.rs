//! Mux planning
//!
//! Writing a container happens in three passes:
//!
//! 1. Fixed preamble: root, header run, metadata run (with a hole reserved
//!    for the video seek table), the first video frame and up to two audio
//!    packets.
//! 2. Interleave: every remaining stream chunk plus one contents-end marker
//!    per stream, ordered by normalized presentation time.
//! 3. Backpatch: the seek table built from the video frame offsets of the
//!    first two passes is framed and written into the reserved hole.
//!
//! [`Layout::plan`] performs all three passes in memory and produces a list
//! of [`Instruction`]s. Only [`Layout::write_to`] touches I/O.

use crate::constants::{
    reserve_size, PayloadKind, StreamKind, DEFAULT_FRAME_RATE, SEEK_CHUNK_ALIGN, SEEK_INTERVAL,
    VIDEO_SEEK_TABLE_NAME,
};
use crate::container::Container;
use crate::encoder::{
    contents_end_chunk, encode_chunk_to_bytes, header_end_chunk, metadata_end_chunk, ChunkBuilder,
};
use crate::error::UsmError;
use crate::table::{encode_dictionaries, Entry, Row};
use crate::types::Chunk;
use crate::value::Value;
use alloc::format;
use alloc::vec;
use alloc::vec::Vec;
use bytes::{BufMut, Bytes, BytesMut};
use serde::Serialize;
#[cfg(feature = "std")]
use std::io::{Seek, SeekFrom, Write};

#[cfg(feature = "logging")]
use tracing::debug;

/// Number of audio chunks written before interleaving starts
const LEADING_AUDIO_CHUNKS: usize = 2;

/// One step of the physical write
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Write a chunk as-is
    Write(Chunk),
    /// Skip `len` bytes, to be patched with the seek chunk
    Reserve {
        /// Size of the hole in bytes
        len: usize,
    },
}

/// A sampled video frame position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeekEntry {
    /// Byte offset of the video chunk in the output
    pub offset: u64,
    /// Index of the frame among all video frames
    pub frame: u32,
}

/// Summary of a finished mux
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MuxStats {
    /// Bytes in the output container
    pub bytes_written: u64,
    /// Chunks written, seek chunk included
    pub chunks_written: usize,
    /// Rows of the generated seek table
    pub seek_entries: usize,
}

/// Fully resolved write plan for a container
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    instructions: Vec<Instruction>,
    seek_slot: u64,
    seek_entries: Vec<SeekEntry>,
    seek_chunk: Chunk,
    total_len: u64,
}

/// Tracks the output position while instructions are appended
struct Planner {
    instructions: Vec<Instruction>,
    pos: u64,
}

impl Planner {
    fn write(&mut self, chunk: Chunk) {
        self.pos += chunk.total_size() as u64;
        self.instructions.push(Instruction::Write(chunk));
    }

    fn reserve(&mut self, len: usize) -> u64 {
        let at = self.pos;
        self.pos += len as u64;
        self.instructions.push(Instruction::Reserve { len });
        at
    }
}

/// Contents-end marker placed one tick after the last chunk of a stream
///
/// Time and rate only position the marker; both are reset before writing.
fn contents_end_after(last: &Chunk) -> Chunk {
    let mut end = contents_end_chunk(last.id);
    end.header.frame_time = last.header.frame_time.saturating_add(1);
    end.header.frame_rate = last.header.frame_rate;
    end
}

impl Layout {
    /// Plan the output of `container`
    ///
    /// The container is only read. Streams are taken in their current order;
    /// call [`Container::prepare_streams`] first to sort them.
    pub fn plan(container: &Container) -> Result<Self, UsmError> {
        let root = container.root.clone().ok_or(UsmError::MissingRoot)?;
        let video = container.streams(StreamKind::Video);
        let (first_video, rest_video) = video
            .split_first()
            .ok_or(UsmError::MissingStream(StreamKind::Video))?;
        let audio = container.streams(StreamKind::Audio);
        let (lead_audio, rest_audio) = audio.split_at(audio.len().min(LEADING_AUDIO_CHUNKS));

        let mut planner = Planner {
            instructions: Vec::new(),
            pos: 0,
        };

        // Pass 1: preamble
        planner.write(root);

        let header_kinds: Vec<StreamKind> = StreamKind::ORDER
            .into_iter()
            .filter(|kind| container.header(*kind).is_some())
            .collect();
        for kind in &header_kinds {
            if let Some(header) = container.header(*kind) {
                planner.write(header.clone());
            }
        }
        for kind in &header_kinds {
            planner.write(header_end_chunk(kind.id()));
        }

        let reserved = reserve_size(video.len());
        let mut seek_slot = 0;
        let metadata_kinds: Vec<StreamKind> = StreamKind::ORDER
            .into_iter()
            .filter(|kind| *kind == StreamKind::Video || container.metadata_chunk(*kind).is_some())
            .collect();
        for kind in &metadata_kinds {
            match (kind, container.metadata_chunk(*kind)) {
                (StreamKind::Video, _) => seek_slot = planner.reserve(reserved),
                (_, Some(chunk)) => planner.write(chunk.clone()),
                (_, None) => {}
            }
        }
        for kind in &metadata_kinds {
            planner.write(metadata_end_chunk(kind.id()));
        }

        let mut seek_entries = vec![SeekEntry {
            offset: planner.pos,
            frame: 0,
        }];
        let mut video_frames: u32 = 1;
        planner.write(first_video.clone());
        for chunk in lead_audio {
            planner.write(chunk.clone());
        }

        // Pass 2: interleave by normalized time
        let mut subtitles: Vec<&Chunk> = container.streams(StreamKind::Subtitle).iter().collect();
        subtitles.sort_by_key(|c| (c.header.normalized_time(), c.payload.first().copied()));

        let mut pending: Vec<Chunk> = Vec::with_capacity(
            rest_video.len() + rest_audio.len() + subtitles.len() + StreamKind::ORDER.len(),
        );
        pending.extend(rest_video.iter().cloned());
        pending.extend(video.last().map(contents_end_after));
        pending.extend(rest_audio.iter().cloned());
        pending.extend(audio.last().map(contents_end_after));
        pending.extend(subtitles.iter().map(|c| (*c).clone()));
        pending.extend(subtitles.last().map(|c| contents_end_after(c)));

        pending.sort_by_key(|c| c.header.normalized_time());

        for mut chunk in pending {
            match chunk.kind() {
                PayloadKind::End => {
                    chunk.header.frame_time = 0;
                    chunk.header.frame_rate = DEFAULT_FRAME_RATE;
                }
                PayloadKind::Stream if chunk.id == StreamKind::Video.id() => {
                    if video_frames as usize % SEEK_INTERVAL == 0 {
                        seek_entries.push(SeekEntry {
                            offset: planner.pos,
                            frame: video_frames,
                        });
                    }
                    video_frames += 1;
                }
                _ => {}
            }
            planner.write(chunk);
        }

        // Pass 3: resolve the seek chunk for the reserved slot
        let seek_chunk = seek_chunk(&seek_entries, reserved)?;

        #[cfg(feature = "logging")]
        debug!(
            "Planned {} instructions, {} bytes, {} seek entries (slot at {}, {} bytes)",
            planner.instructions.len(),
            planner.pos,
            seek_entries.len(),
            seek_slot,
            reserved
        );

        Ok(Self {
            instructions: planner.instructions,
            seek_slot,
            seek_entries,
            seek_chunk,
            total_len: planner.pos,
        })
    }

    /// Planned instructions in write order
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Sampled video frame positions
    pub fn seek_entries(&self) -> &[SeekEntry] {
        &self.seek_entries
    }

    /// The seek chunk that fills the reserved slot
    pub fn seek_chunk(&self) -> &Chunk {
        &self.seek_chunk
    }

    /// Output offset of the reserved slot
    pub fn seek_slot_offset(&self) -> u64 {
        self.seek_slot
    }

    /// Size of the output in bytes
    pub fn total_len(&self) -> u64 {
        self.total_len
    }

    /// Number of chunks in the output, seek chunk included
    pub fn chunk_count(&self) -> usize {
        self.instructions.len()
    }

    /// Statistics of the planned output
    pub fn stats(&self) -> MuxStats {
        MuxStats {
            bytes_written: self.total_len,
            chunks_written: self.chunk_count(),
            seek_entries: self.seek_entries.len(),
        }
    }

    /// Render the whole container in memory
    pub fn to_bytes(&self) -> Result<Bytes, UsmError> {
        let mut buf = BytesMut::with_capacity(self.total_len as usize);
        for instruction in &self.instructions {
            let chunk = match instruction {
                Instruction::Write(chunk) => chunk,
                Instruction::Reserve { .. } => &self.seek_chunk,
            };
            buf.put(encode_chunk_to_bytes(chunk)?);
        }
        Ok(buf.freeze())
    }

    /// Write the planned container, then seek back and patch the seek slot
    ///
    /// Offsets are relative to the writer's position when this is called.
    /// The writer is left positioned at the end of the container.
    #[cfg(feature = "std")]
    pub fn write_to<W: Write + Seek>(&self, writer: &mut W) -> Result<MuxStats, UsmError> {
        let base = writer.stream_position()?;

        for instruction in &self.instructions {
            match instruction {
                Instruction::Write(chunk) => {
                    crate::encoder::encode_chunk(chunk, writer)?;
                }
                Instruction::Reserve { len } => {
                    writer.seek(SeekFrom::Current(*len as i64))?;
                }
            }
        }

        writer.seek(SeekFrom::Start(base + self.seek_slot))?;
        crate::encoder::encode_chunk(&self.seek_chunk, writer)?;
        writer.seek(SeekFrom::Start(base + self.total_len))?;

        #[cfg(feature = "logging")]
        debug!(
            "Patched {} byte seek chunk at offset {}",
            self.seek_chunk.total_size(),
            base + self.seek_slot
        );

        Ok(self.stats())
    }
}

/// Build the `VIDEO_SEEKINFO` seek chunk, padded to exactly `reserved` bytes
fn seek_chunk(entries: &[SeekEntry], reserved: usize) -> Result<Chunk, UsmError> {
    let rows = entries
        .iter()
        .map(|entry| {
            let offset = i64::try_from(entry.offset).map_err(|_| {
                UsmError::InvalidStructure(format!("seek offset {} exceeds i64", entry.offset))
            })?;
            Ok(Row::new(vec![
                Entry::unique("ofs_byte", Value::LongLong(offset)),
                Entry::unique("ofs_frmid", Value::UnsignedInteger(entry.frame)),
                Entry::recurring("num_skip", Value::UnsignedShort(0)),
                Entry::recurring("resv", Value::UnsignedShort(0)),
            ]))
        })
        .collect::<Result<Vec<Row>, UsmError>>()?;
    let table = encode_dictionaries(VIDEO_SEEK_TABLE_NAME, &rows)?;

    let mut chunk = ChunkBuilder::new(StreamKind::Video.id())
        .kind(PayloadKind::Seek)
        .frame_rate(DEFAULT_FRAME_RATE)
        .payload(table.encode())
        .align(SEEK_CHUNK_ALIGN)
        .build()?;

    let required = chunk.total_size();
    if required > reserved {
        return Err(UsmError::SeekTableOverflow { reserved, required });
    }

    let fill = reserved - required;
    chunk.header.padding_size = u16::try_from(usize::from(chunk.header.padding_size) + fill)
        .map_err(|_| {
            UsmError::InvalidStructure(format!("seek chunk padding {} exceeds u16", fill))
        })?;
    chunk.size += fill as u32;

    Ok(chunk)
}
