//! Demuxed container model
//!
//! A [`Container`] holds every chunk the remuxer cares about, grouped by
//! role. Chunks that fit none of the roles (unknown ids, end markers of the
//! source file) are dropped during demux; the muxer regenerates end markers.

use crate::constants::{PayloadKind, StreamKind, CRID, HCA_MAGIC};
use crate::decoder::decode_chunk_from_bytes_zero_copy;
use crate::error::UsmError;
use crate::types::{Chunk, ChunkId};
use alloc::boxed::Box;
use alloc::vec::Vec;
use bytes::Bytes;
use hashbrown::HashMap;
#[cfg(feature = "std")]
use std::io::Read;

#[cfg(feature = "logging")]
use tracing::debug;

/// In-memory model of a parsed container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Container {
    /// `CRID` root chunk
    pub root: Option<Chunk>,

    /// Header chunks keyed by chunk id
    pub headers: HashMap<ChunkId, Chunk>,

    /// Seek / metadata chunks keyed by chunk id
    pub metadata: HashMap<ChunkId, Chunk>,

    /// Video frames in file order
    pub video: Vec<Chunk>,

    /// Audio packets in file order
    pub audio: Vec<Chunk>,

    /// Subtitle records in file order
    pub subtitle: Vec<Chunk>,
}

/// What demux did with a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Root,
    Header,
    Metadata,
    Stream(StreamKind),
    Ignored,
}

impl Container {
    /// Create an empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Read chunks until end of stream and classify them
    ///
    /// A later chunk with the same id replaces an earlier root, header or
    /// metadata chunk.
    #[cfg(feature = "std")]
    pub fn demux<R: Read>(reader: R) -> Result<Self, UsmError> {
        let mut container = Self::new();
        let mut chunks = crate::decoder::ChunkReader::new(reader);
        let mut ignored = 0usize;

        loop {
            let offset = chunks.offset();
            match chunks.next() {
                Some(Ok(located)) => {
                    if container.place(located.chunk) == Placement::Ignored {
                        ignored += 1;
                    }
                }
                Some(Err(cause)) => {
                    return Err(UsmError::Demux {
                        offset,
                        cause: Box::new(cause),
                    })
                }
                None => break,
            }
        }

        container.log_summary(ignored);
        Ok(container)
    }

    /// Demux a container held in memory without copying payloads
    pub fn demux_bytes(data: &Bytes) -> Result<Self, UsmError> {
        let mut container = Self::new();
        let mut rest = data.clone();
        let mut offset = 0u64;
        let mut ignored = 0usize;

        while !rest.is_empty() {
            let (chunk, consumed) =
                decode_chunk_from_bytes_zero_copy(&rest).map_err(|cause| UsmError::Demux {
                    offset,
                    cause: Box::new(cause),
                })?;
            if container.place(chunk) == Placement::Ignored {
                ignored += 1;
            }
            rest = rest.slice(consumed..);
            offset += consumed as u64;
        }

        container.log_summary(ignored);
        Ok(container)
    }

    fn place(&mut self, chunk: Chunk) -> Placement {
        if chunk.id == CRID {
            self.root = Some(chunk);
            return Placement::Root;
        }

        match chunk.kind() {
            PayloadKind::Header => {
                self.headers.insert(chunk.id, chunk);
                Placement::Header
            }
            PayloadKind::Seek => {
                self.metadata.insert(chunk.id, chunk);
                Placement::Metadata
            }
            PayloadKind::Stream => match chunk.stream_kind() {
                Some(kind) => {
                    self.streams_mut(kind).push(chunk);
                    Placement::Stream(kind)
                }
                None => {
                    #[cfg(feature = "logging")]
                    debug!("Ignoring stream chunk with unknown id {}", chunk.id);
                    Placement::Ignored
                }
            },
            _other => {
                #[cfg(feature = "logging")]
                debug!("Ignoring {} chunk of kind {:?}", chunk.id, _other);
                Placement::Ignored
            }
        }
    }

    #[allow(unused_variables)]
    fn log_summary(&self, ignored: usize) {
        #[cfg(feature = "logging")]
        debug!(
            "Demuxed {} chunks: {} video, {} audio, {} subtitle, {} ignored",
            self.chunk_count(),
            self.video.len(),
            self.audio.len(),
            self.subtitle.len(),
            ignored
        );
    }

    /// Stream chunks of one family
    pub fn streams(&self, kind: StreamKind) -> &[Chunk] {
        match kind {
            StreamKind::Video => &self.video,
            StreamKind::Audio => &self.audio,
            StreamKind::Subtitle => &self.subtitle,
        }
    }

    /// Mutable stream sequence of one family
    pub fn streams_mut(&mut self, kind: StreamKind) -> &mut Vec<Chunk> {
        match kind {
            StreamKind::Video => &mut self.video,
            StreamKind::Audio => &mut self.audio,
            StreamKind::Subtitle => &mut self.subtitle,
        }
    }

    /// Header chunk of one family
    pub fn header(&self, kind: StreamKind) -> Option<&Chunk> {
        self.headers.get(&kind.id())
    }

    /// Seek / metadata chunk of one family
    pub fn metadata_chunk(&self, kind: StreamKind) -> Option<&Chunk> {
        self.metadata.get(&kind.id())
    }

    /// Number of chunks held
    pub fn chunk_count(&self) -> usize {
        usize::from(self.root.is_some())
            + self.headers.len()
            + self.metadata.len()
            + self.video.len()
            + self.audio.len()
            + self.subtitle.len()
    }

    /// Take over the header, metadata and stream chunks of `kind` from `source`
    ///
    /// Fails without touching `self` if `source` has no stream chunks of that
    /// kind. A header or metadata chunk missing in `source` is removed here.
    pub fn replace_stream(&mut self, source: &Container, kind: StreamKind) -> Result<(), UsmError> {
        if source.streams(kind).is_empty() {
            return Err(UsmError::MissingStream(kind));
        }

        let id = kind.id();
        for (target, from) in [
            (&mut self.headers, &source.headers),
            (&mut self.metadata, &source.metadata),
        ] {
            match from.get(&id) {
                Some(chunk) => {
                    target.insert(id, chunk.clone());
                }
                None => {
                    target.remove(&id);
                }
            }
        }
        *self.streams_mut(kind) = source.streams(kind).to_vec();

        #[cfg(feature = "logging")]
        debug!(
            "Replaced {} stream: {} chunks",
            kind,
            self.streams(kind).len()
        );

        Ok(())
    }

    /// Put every stream into presentation order before muxing
    ///
    /// Video is sorted by frame time. Audio keeps the `HCA\0` codec header
    /// packet first, then frame time. Subtitles sort by frame time, then by
    /// their first payload byte. All sorts are stable.
    pub fn prepare_streams(&mut self) {
        self.video.sort_by_key(|c| c.header.frame_time);
        self.audio
            .sort_by_key(|c| (!c.payload.starts_with(HCA_MAGIC), c.header.frame_time));
        self.subtitle
            .sort_by_key(|c| (c.header.frame_time, c.payload.first().copied()));
    }
}
