use anyhow::{Context, Result};
use colored::*;
use serde::Serialize;
use serde_json::{json, Map, Value as Json};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};
use usmkit_core::decoder::ChunkReader;
use usmkit_core::table::decode_table;
use usmkit_core::{decode_subtitle, Chunk, PayloadHeader, PayloadKind, StreamKind, Value};

#[derive(Serialize)]
struct DumpedChunk {
    index: usize,
    offset: u64,
    id: String,
    size: u32,
    header: PayloadHeader,
    content: Json,
}

pub fn execute(input: &str, output: Option<&str>) -> Result<()> {
    info!("Dumping file: {}", input);

    let file = File::open(input).with_context(|| format!("Failed to open input file: {}", input))?;

    let mut dumped = Vec::new();
    let mut failure = None;
    for (index, located) in ChunkReader::new(BufReader::new(file)).enumerate() {
        match located {
            Ok(located) => dumped.push(DumpedChunk {
                index,
                offset: located.offset,
                id: located.chunk.id.to_string(),
                size: located.chunk.size,
                header: located.chunk.header.clone(),
                content: describe(&located.chunk),
            }),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    let output_path = match output {
        Some(path) => path.to_string(),
        None => Path::new(input)
            .with_extension("json")
            .to_string_lossy()
            .into_owned(),
    };

    let json =
        serde_json::to_string_pretty(&dumped).with_context(|| "Failed to serialize chunk dump")?;
    fs::write(&output_path, json)
        .with_context(|| format!("Failed to write output file: {}", output_path))?;

    println!("\n=== Dump Results ===");
    println!("Chunks dumped:     {}", dumped.len());
    println!("Output:            {}", output_path);

    match failure {
        None => println!("{} Dump complete", "✓".green()),
        Some(e) => {
            warn!("Dump stopped early: {}", e);
            println!("{} Dump stopped early: {}", "✗".red(), e);
        }
    }

    Ok(())
}

/// Decoded view of a chunk payload
pub fn describe(chunk: &Chunk) -> Json {
    match chunk.kind() {
        PayloadKind::Header | PayloadKind::Seek => describe_table(&chunk.payload),
        PayloadKind::End => {
            let text = String::from_utf8_lossy(&chunk.payload);
            Json::String(text.trim_end_matches('\0').to_string())
        }
        PayloadKind::Stream if chunk.is_stream_of(StreamKind::Subtitle) => {
            match decode_subtitle(&chunk.payload) {
                Ok(record) => serde_json::to_value(record).unwrap_or(Json::Null),
                Err(e) => json!({ "error": e.to_string() }),
            }
        }
        _ => json!({ "payload_len": chunk.payload.len() }),
    }
}

fn describe_table(payload: &[u8]) -> Json {
    let table = match decode_table(payload) {
        Ok(table) => table,
        Err(e) => return json!({ "error": e.to_string() }),
    };

    match table.dictionary() {
        Ok(dict) => {
            let rows: Vec<Json> = dict
                .rows
                .iter()
                .map(|row| {
                    let mut object = Map::new();
                    for entry in &row.entries {
                        object.insert(entry.key.clone(), render_value(&entry.value));
                    }
                    Json::Object(object)
                })
                .collect();
            json!({ "name": dict.name, "rows": rows })
        }
        Err(e) => json!({
            "error": e.to_string(),
            "header": table.header,
            "unique_len": table.unique.len(),
            "string_len": table.strings.len(),
            "byte_len": table.bytes.len(),
        }),
    }
}

fn render_value(value: &Value) -> Json {
    match value {
        Value::Bytes(blob) => Json::String(hex::encode(blob)),
        Value::Unknown(_) => Json::String(value.to_string()),
        other => serde_json::to_value(other)
            .ok()
            .and_then(|v| match v {
                // Externally tagged enum: unwrap {"Variant": inner}
                Json::Object(map) => map.into_iter().next().map(|(_, inner)| inner),
                v => Some(v),
            })
            .unwrap_or(Json::Null),
    }
}
