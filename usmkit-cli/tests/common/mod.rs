#![allow(dead_code)]

use bytes::Bytes;
use std::path::Path;
use usmkit_core::constants::{CRID, SBT, SFA, SFV};
use usmkit_core::encoder::{encode_chunk_to_bytes, header_end_chunk, ChunkBuilder};
use usmkit_core::table::encode_dictionaries;
use usmkit_core::{Chunk, ChunkId, Entry, PayloadKind, Row, Value};

fn table_chunk(id: ChunkId, name: &str, rows: Vec<Row>) -> Chunk {
    ChunkBuilder::new(id)
        .kind(PayloadKind::Header)
        .frame_rate(30)
        .payload(encode_dictionaries(name, &rows).unwrap().encode())
        .align(16)
        .build()
        .unwrap()
}

fn stream(id: ChunkId, frame_time: u32, payload: Vec<u8>) -> Chunk {
    ChunkBuilder::new(id)
        .frame_time(frame_time)
        .frame_rate(30)
        .payload(Bytes::from(payload))
        .align(16)
        .build()
        .unwrap()
}

pub fn subtitle_payload(language: u32, time: u32, duration: u32, text: &str) -> Vec<u8> {
    let mut raw = Vec::new();
    for field in [language, 1000, time, duration, text.len() as u32] {
        raw.extend_from_slice(&field.to_le_bytes());
    }
    raw.extend_from_slice(text.as_bytes());
    raw
}

/// A small container; audio chunks carry `audio_tag` bytes when present
pub fn sample_usm(audio_tag: Option<u8>) -> Vec<u8> {
    build_usm(true, audio_tag)
}

/// Same layout as [`sample_usm`] but with no video stream, which cannot be muxed
pub fn sample_usm_without_video(audio_tag: Option<u8>) -> Vec<u8> {
    build_usm(false, audio_tag)
}

fn build_usm(video: bool, audio_tag: Option<u8>) -> Vec<u8> {
    let mut chunks = vec![table_chunk(
        CRID,
        "CRIUSF_DIR_STREAM",
        vec![Row::new(vec![
            Entry::unique("filename", Value::String("sample.usm".into())),
            Entry::unique("key", Value::Bytes(Bytes::from_static(&[0xDE, 0xAD]))),
        ])],
    )];
    if video {
        chunks.push(table_chunk(
            SFV,
            "VIDEO_HDRINFO",
            vec![Row::new(vec![Entry::unique("width", Value::UnsignedInteger(640))])],
        ));
        chunks.push(header_end_chunk(SFV));
    }
    if audio_tag.is_some() {
        chunks.push(table_chunk(
            SFA,
            "AUDIO_HDRINFO",
            vec![Row::new(vec![Entry::unique("sampling_rate", Value::UnsignedInteger(44100))])],
        ));
        chunks.push(header_end_chunk(SFA));
    }

    for t in 0..12 {
        if video {
            chunks.push(stream(SFV, t, vec![0xAB; 32]));
        }
        if let Some(tag) = audio_tag {
            chunks.push(stream(SFA, t, vec![tag; 16]));
        }
    }
    chunks.push(stream(SBT, 0, subtitle_payload(1, 500, 1000, "hello")));
    chunks.push(stream(SBT, 0, subtitle_payload(0, 500, 1000, "ni hao")));
    chunks.push(stream(SBT, 30, subtitle_payload(1, 61_000, 2000, "bye")));

    chunks
        .iter()
        .flat_map(|c| encode_chunk_to_bytes(c).unwrap().to_vec())
        .collect()
}

pub fn write_usm(path: &Path, audio_tag: Option<u8>) {
    std::fs::write(path, sample_usm(audio_tag)).unwrap();
}
