use super::{read_container, write_container};
use anyhow::Result;
use colored::*;
use std::path::Path;
use tracing::info;

pub fn execute(input: &str, output: &str) -> Result<()> {
    info!("Remuxing {} -> {}", input, output);

    let mut container = read_container(Path::new(input))?;
    info!(
        "Parsed {} chunks: {} video, {} audio, {} subtitle",
        container.chunk_count(),
        container.video.len(),
        container.audio.len(),
        container.subtitle.len()
    );

    let stats = write_container(&mut container, Path::new(output))?;

    println!("\n=== Remux Results ===");
    println!("Chunks written:    {}", stats.chunks_written);
    println!("Bytes written:     {} bytes", stats.bytes_written);
    println!("Seek entries:      {}", stats.seek_entries);
    println!("{} Wrote {}", "✓".green(), output);

    Ok(())
}
