//! Subcommand implementations

pub mod dump;
pub mod remux;
pub mod replace_audio;
pub mod subs;

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::warn;
use usmkit_core::{Container, MuxStats};

/// Demux a container file
pub fn read_container(path: &Path) -> Result<Container> {
    let file =
        File::open(path).with_context(|| format!("Failed to open input file: {}", path.display()))?;
    Container::demux(BufReader::new(file))
        .with_context(|| format!("Failed to parse container: {}", path.display()))
}

/// Sort the streams of `container` and mux it into a new file
///
/// A failed mux removes the output so the file is not mistaken for a
/// finished one later.
pub fn write_container(container: &mut Container, path: &Path) -> Result<MuxStats> {
    container.prepare_streams();

    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let muxed = usmkit_core::mux(container, &mut writer);
    drop(writer);

    if muxed.is_err() {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to remove partial output {}: {}", path.display(), e);
        }
    }
    muxed.with_context(|| format!("Failed to write container: {}", path.display()))
}
