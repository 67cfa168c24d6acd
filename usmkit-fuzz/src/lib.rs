//! Fuzzing entry points for usmkit-core
//!
//! To use with cargo-fuzz:
//! 1. Install cargo-fuzz: cargo install cargo-fuzz
//! 2. Run fuzzer: cargo fuzz run fuzz_demux

use bytes::Bytes;
use usmkit_core::{Container, Layout};

pub fn fuzz_decode(data: &[u8]) {
    use usmkit_core::decoder::decode_chunk_from_bytes;

    // Try to decode - should never panic
    let _ = decode_chunk_from_bytes(data);
}

pub fn fuzz_table(data: &[u8]) {
    use usmkit_core::table::decode_table;

    let Ok(table) = decode_table(data) else {
        return;
    };
    if let Ok(dict) = table.dictionary() {
        // Whatever decodes must re-encode without panicking
        if let Ok(rebuilt) = dict.to_table() {
            let _ = rebuilt.encode();
        }
    }
}

pub fn fuzz_subtitle(data: &[u8]) {
    let _ = usmkit_core::decode_subtitle(data);
}

pub fn fuzz_demux(data: &[u8]) {
    let Ok(mut container) = Container::demux_bytes(&Bytes::copy_from_slice(data)) else {
        return;
    };
    container.prepare_streams();
    if let Ok(layout) = Layout::plan(&container) {
        let _ = layout.to_bytes();
    }
}
