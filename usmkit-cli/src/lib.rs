//! Library entry for usmkit-cli used by integration tests and embedding.

pub mod commands;

// Re-export commands for convenience
pub use commands::*;

/// Output format for extracted subtitles
#[derive(Copy, Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum SubtitleFormat {
    /// SubRip: numbered cues with `HH:MM:SS,mmm` timestamps
    Srt,
    /// Plain `start, end, text` lines for Scaleform Video Encoder
    Txt,
}

impl SubtitleFormat {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Txt => "txt",
        }
    }
}
