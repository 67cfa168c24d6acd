//! Subtitle record decoding
//!
//! Each `@SBT` stream chunk carries one record: a 20-byte little-endian
//! header followed by the subtitle text.

use crate::constants::StreamKind;
use crate::error::UsmError;
use crate::types::Chunk;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use serde::Serialize;

const RECORD_HEADER_SIZE: usize = 20;

/// Subtitle language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Language {
    /// `cn`
    Chinese,
    /// `en`
    English,
    /// `th`
    Thai,
    /// `vn`
    Vietnamese,
    /// `fr`
    French,
    /// `de`
    German,
    /// `id`
    Indonesian,
    /// Any other language number
    Undefined(u32),
}

impl Language {
    /// Map the raw language number
    pub const fn from_u32(value: u32) -> Self {
        match value {
            0 => Language::Chinese,
            1 => Language::English,
            2 => Language::Thai,
            3 => Language::Vietnamese,
            4 => Language::French,
            5 => Language::German,
            6 => Language::Indonesian,
            other => Language::Undefined(other),
        }
    }

    /// Short code used in file names
    pub const fn code(&self) -> &'static str {
        match self {
            Language::Chinese => "cn",
            Language::English => "en",
            Language::Thai => "th",
            Language::Vietnamese => "vn",
            Language::French => "fr",
            Language::German => "de",
            Language::Indonesian => "id",
            Language::Undefined(_) => "undefined",
        }
    }
}

impl core::fmt::Display for Language {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

/// One decoded subtitle line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubtitleRecord {
    /// Language of the text
    pub language: Language,
    /// Time base declared by the record
    pub frame_rate: u32,
    /// Display start in milliseconds
    pub frame_time: u32,
    /// Display duration in milliseconds
    pub frame_end: u32,
    /// Subtitle text, trailing NULs removed
    pub text: String,
}

impl SubtitleRecord {
    /// Display start in milliseconds
    pub fn start_ms(&self) -> u64 {
        u64::from(self.frame_time)
    }

    /// Display end in milliseconds
    pub fn end_ms(&self) -> u64 {
        u64::from(self.frame_time) + u64::from(self.frame_end)
    }
}

/// Decode the subtitle record carried by a stream payload
pub fn decode_subtitle(payload: &[u8]) -> Result<SubtitleRecord, UsmError> {
    if payload.len() < RECORD_HEADER_SIZE {
        return Err(UsmError::TruncatedInput {
            offset: 0,
            expected: RECORD_HEADER_SIZE,
            actual: payload.len(),
        });
    }

    let field = |i: usize| {
        let at = i * 4;
        u32::from_le_bytes([payload[at], payload[at + 1], payload[at + 2], payload[at + 3]])
    };
    let text_len = field(4) as usize;
    let body = &payload[RECORD_HEADER_SIZE..];
    let text = body.get(..text_len).ok_or(UsmError::TruncatedInput {
        offset: RECORD_HEADER_SIZE as u64,
        expected: text_len,
        actual: body.len(),
    })?;

    Ok(SubtitleRecord {
        language: Language::from_u32(field(0)),
        frame_rate: field(1),
        frame_time: field(2),
        frame_end: field(3),
        text: String::from_utf8_lossy(text).trim_end_matches('\0').into(),
    })
}

/// Decode every subtitle stream chunk and group the records by language
///
/// Chunks that are not subtitle Stream chunks are skipped. Records keep the
/// order of `chunks` within each language.
pub fn subtitles_by_language(
    chunks: &[Chunk],
) -> Result<BTreeMap<Language, Vec<SubtitleRecord>>, UsmError> {
    let mut grouped: BTreeMap<Language, Vec<SubtitleRecord>> = BTreeMap::new();
    for chunk in chunks.iter().filter(|c| c.is_stream_of(StreamKind::Subtitle)) {
        let record = decode_subtitle(&chunk.payload)?;
        grouped.entry(record.language).or_default().push(record);
    }
    Ok(grouped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{PayloadKind, SBT};
    use crate::encoder::ChunkBuilder;
    use alloc::vec;
    use bytes::Bytes;

    fn record(language: u32, time: u32, duration: u32, text: &[u8]) -> Vec<u8> {
        let mut raw = Vec::new();
        for field in [language, 1000, time, duration, text.len() as u32] {
            raw.extend_from_slice(&field.to_le_bytes());
        }
        raw.extend_from_slice(text);
        raw
    }

    #[test]
    fn test_decode_record() {
        let sub = decode_subtitle(&record(1, 1000, 2500, b"hello")).unwrap();

        assert_eq!(sub.language.code(), "en");
        assert_eq!(sub.start_ms(), 1000);
        assert_eq!(sub.end_ms(), 3500);
        assert_eq!(sub.text, "hello");
        assert_eq!(sub.frame_rate, 1000);
    }

    #[test]
    fn test_undefined_language_and_trailing_nul() {
        let sub = decode_subtitle(&record(42, 0, 10, b"bye\0")).unwrap();
        assert_eq!(sub.language, Language::Undefined(42));
        assert_eq!(sub.language.code(), "undefined");
        assert_eq!(sub.text, "bye");
    }

    #[test]
    fn test_truncated_record() {
        assert!(matches!(
            decode_subtitle(&[0u8; 12]),
            Err(UsmError::TruncatedInput { expected: 20, .. })
        ));

        let mut raw = record(0, 0, 0, b"text");
        raw.truncate(raw.len() - 2);
        assert!(matches!(
            decode_subtitle(&raw),
            Err(UsmError::TruncatedInput { expected: 4, actual: 2, .. })
        ));
    }

    #[test]
    fn test_group_by_language() {
        let sub = |lang, time, text: &'static [u8]| {
            ChunkBuilder::new(SBT)
                .payload(Bytes::from(record(lang, time, 100, text)))
                .build()
                .unwrap()
        };
        let header = ChunkBuilder::new(SBT)
            .kind(PayloadKind::Header)
            .payload(Bytes::from_static(b"not a record"))
            .build()
            .unwrap();

        let chunks = vec![
            sub(0, 0, b"ni hao"),
            header,
            sub(1, 0, b"hi"),
            sub(0, 500, b"zai jian"),
        ];
        let grouped = subtitles_by_language(&chunks).unwrap();

        assert_eq!(grouped.len(), 2);
        let chinese: Vec<&str> = grouped[&Language::Chinese]
            .iter()
            .map(|r| r.text.as_str())
            .collect();
        assert_eq!(chinese, ["ni hao", "zai jian"]);
        assert_eq!(grouped[&Language::English][0].text, "hi");
    }
}
