//! Writing a container to a seekable sink

use crate::container::Container;
use crate::error::UsmError;
use crate::layout::{Layout, MuxStats};
use std::io::{Seek, Write};

#[cfg(feature = "logging")]
use tracing::info;

/// Serialize `container` into `writer`
///
/// The container is planned with [`Layout::plan`] and written from the
/// writer's current position. The video seek table is patched in place once
/// every chunk offset is known, so the sink must support seeking backwards.
pub fn mux<W: Write + Seek>(container: &Container, writer: &mut W) -> Result<MuxStats, UsmError> {
    let layout = Layout::plan(container)?;
    let stats = layout.write_to(writer)?;
    writer.flush()?;

    #[cfg(feature = "logging")]
    info!(
        "Muxed {} chunks ({} bytes, {} seek entries)",
        stats.chunks_written, stats.bytes_written, stats.seek_entries
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{PayloadKind, StreamKind, CRID, SFA, SFV};
    use crate::encoder::ChunkBuilder;
    use crate::types::Chunk;
    use bytes::Bytes;
    use std::io::Cursor;

    fn chunk(id: crate::types::ChunkId, kind: PayloadKind, frame_time: u32) -> Chunk {
        ChunkBuilder::new(id)
            .kind(kind)
            .frame_time(frame_time)
            .frame_rate(30)
            .payload(Bytes::from(vec![frame_time as u8; 13]))
            .build()
            .unwrap()
    }

    fn sample() -> Container {
        let mut c = Container::new();
        c.root = Some(chunk(CRID, PayloadKind::Header, 0));
        c.headers.insert(SFV, chunk(SFV, PayloadKind::Header, 0));
        c.video = (0..45).map(|t| chunk(SFV, PayloadKind::Stream, t)).collect();
        c.audio = (0..20).map(|t| chunk(SFA, PayloadKind::Stream, t * 2)).collect();
        c
    }

    #[test]
    fn test_mux_matches_in_memory_render() {
        let container = sample();
        let mut out = Cursor::new(Vec::new());

        let stats = mux(&container, &mut out).unwrap();
        let expected = Layout::plan(&container).unwrap().to_bytes().unwrap();

        assert_eq!(out.get_ref().as_slice(), &expected[..]);
        assert_eq!(stats.bytes_written, expected.len() as u64);
        assert_eq!(stats.seek_entries, 2);
        assert_eq!(out.position(), expected.len() as u64);
    }

    #[test]
    fn test_mux_from_nonzero_position() {
        let container = sample();
        let mut out = Cursor::new(b"prefix".to_vec());
        out.set_position(6);

        let stats = mux(&container, &mut out).unwrap();
        let expected = Layout::plan(&container).unwrap().to_bytes().unwrap();

        assert_eq!(&out.get_ref()[..6], b"prefix");
        assert_eq!(&out.get_ref()[6..], &expected[..]);
        assert_eq!(stats.bytes_written as usize, expected.len());
    }

    #[test]
    fn test_remux_is_stable() {
        let container = sample();
        let mut first = Cursor::new(Vec::new());
        mux(&container, &mut first).unwrap();

        let mut reparsed = Container::demux(Cursor::new(first.get_ref().clone())).unwrap();
        assert_eq!(reparsed.video.len(), 45);
        assert_eq!(reparsed.audio.len(), 20);
        assert!(reparsed.metadata_chunk(StreamKind::Video).is_some());

        reparsed.prepare_streams();
        let mut second = Cursor::new(Vec::new());
        mux(&reparsed, &mut second).unwrap();

        assert_eq!(first.get_ref(), second.get_ref());
    }
}
