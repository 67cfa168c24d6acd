use super::read_container;
use crate::SubtitleFormat;
use anyhow::{Context, Result};
use colored::*;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use usmkit_core::subtitle::subtitles_by_language;
use usmkit_core::SubtitleRecord;

const CRLF: &str = "\r\n";

/// Display interval written on the first line of a TXT file
const TXT_DISPLAY_INTERVAL: u32 = 1000;

pub fn execute(input: &str, format: SubtitleFormat, output: Option<&str>) -> Result<()> {
    info!("Extracting subtitles from: {}", input);

    let input_path = Path::new(input);
    let container = read_container(input_path)?;
    let grouped = subtitles_by_language(&container.subtitle)
        .with_context(|| format!("Failed to decode subtitles in {}", input))?;

    if grouped.is_empty() {
        warn!("No subtitles found in {}", input);
        println!("{} No subtitles found", "✗".red());
        return Ok(());
    }

    let folder = match output {
        Some(dir) => PathBuf::from(dir),
        None => input_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    fs::create_dir_all(&folder)
        .with_context(|| format!("Failed to create output folder: {}", folder.display()))?;

    let stem = file_stem(input_path);

    println!("\n=== Subtitle Extraction ===");
    for (language, records) in &grouped {
        let rendered = match format {
            SubtitleFormat::Srt => format_srt(records),
            SubtitleFormat::Txt => format_txt(records),
        };
        let path = folder.join(format!("{}_{}.{}", stem, language, format.extension()));
        fs::write(&path, rendered)
            .with_context(|| format!("Failed to write subtitle file: {}", path.display()))?;

        println!(
            "{} {:<10} {:>5} lines -> {}",
            "✓".green(),
            language.to_string(),
            records.len(),
            path.display()
        );
    }

    Ok(())
}

/// File name of `path` without a trailing `.usm`
fn file_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.strip_suffix(".usm").unwrap_or(&name).to_string()
}

/// `HH:MM:SS,mmm`
pub fn srt_timestamp(ms: u64) -> String {
    format!(
        "{:02}:{:02}:{:02},{:03}",
        ms / 3_600_000,
        (ms / 60_000) % 60,
        (ms / 1000) % 60,
        ms % 1000
    )
}

/// Render records as numbered SubRip cues
pub fn format_srt(records: &[SubtitleRecord]) -> String {
    let mut out = String::new();
    for (i, record) in records.iter().enumerate() {
        let _ = write!(
            out,
            "{}{CRLF}{} --> {}{CRLF}{}{CRLF}",
            i + 1,
            srt_timestamp(record.start_ms()),
            srt_timestamp(record.end_ms()),
            record.text
        );
    }
    out
}

/// Render records as `start, end, text` lines after the display interval
pub fn format_txt(records: &[SubtitleRecord]) -> String {
    let mut out = format!("{}{CRLF}", TXT_DISPLAY_INTERVAL);
    for record in records {
        let _ = write!(
            out,
            "{}, {}, {}{CRLF}",
            record.start_ms(),
            record.end_ms(),
            record.text
        );
    }
    out
}
