//! Walk the chunks of a container and print decoded tables
//!
//! Usage: cargo run --example inspect_container -- movie.usm

use std::fs::File;
use std::io::BufReader;
use usmkit_core::{
    decoder::ChunkReader, subtitle::decode_subtitle, table::decode_table, PayloadKind, StreamKind,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .ok_or("usage: inspect_container <file.usm>")?;
    let reader = BufReader::new(File::open(&path)?);

    println!("usmkit container inspection: {}\n", path);

    for (index, located) in ChunkReader::new(reader).enumerate() {
        let located = located?;
        let chunk = &located.chunk;
        println!(
            "#{:<5} @{:#010x} {} {:?} ch={} t={}/{} ({} bytes)",
            index,
            located.offset,
            chunk.id,
            chunk.kind(),
            chunk.header.channel,
            chunk.header.frame_time,
            chunk.header.frame_rate,
            chunk.payload.len()
        );

        match chunk.kind() {
            kind if kind.carries_table() => match decode_table(&chunk.payload)
                .and_then(|table| table.dictionary())
            {
                Ok(dict) => {
                    println!("       table {} ({} rows)", dict.name, dict.rows.len());
                    if let Some(row) = dict.rows.first() {
                        for entry in &row.entries {
                            println!("         {} = {}", entry.key, entry.value);
                        }
                    }
                }
                Err(e) => println!("       undecodable table: {}", e),
            },
            PayloadKind::Stream if chunk.is_stream_of(StreamKind::Subtitle) => {
                match decode_subtitle(&chunk.payload) {
                    Ok(sub) => println!(
                        "       [{}] {}..{} {}",
                        sub.language,
                        sub.start_ms(),
                        sub.end_ms(),
                        sub.text
                    ),
                    Err(e) => println!("       undecodable subtitle: {}", e),
                }
            }
            PayloadKind::Stream => {
                let head = &chunk.payload[..chunk.payload.len().min(16)];
                println!("       {}", hex::encode(head));
            }
            _ => {}
        }
    }

    Ok(())
}
