//! Replace the audio track of one container with another's
//!
//! Usage: cargo run --example splice_audio -- main.usm donor.usm out.usm

use std::fs::File;
use std::io::{BufReader, BufWriter};
use usmkit_core::{Container, StreamKind};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let [main_path, donor_path, out_path] = args.as_slice() else {
        return Err("usage: splice_audio <main.usm> <donor.usm> <out.usm>".into());
    };

    let mut main = Container::demux(BufReader::new(File::open(main_path)?))?;
    let donor = Container::demux(BufReader::new(File::open(donor_path)?))?;

    println!(
        "main: {} video, {} audio; donor: {} audio",
        main.video.len(),
        main.audio.len(),
        donor.audio.len()
    );

    main.replace_stream(&donor, StreamKind::Audio)?;
    main.prepare_streams();

    let mut out = BufWriter::new(File::create(out_path)?);
    let stats = usmkit_core::mux(&main, &mut out)?;

    println!(
        "Wrote {} chunks ({} bytes) to {}, {} seek entries",
        stats.chunks_written, stats.bytes_written, out_path, stats.seek_entries
    );

    Ok(())
}
