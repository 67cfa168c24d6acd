//! Property-based tests using proptest

use bytes::Bytes;
use std::io::Cursor;
use usmkit_core::{
    constants::{reserve_size, CRID, SBT, SFA, SFV},
    decoder::{decode_chunk, decode_chunk_from_bytes},
    encoder::{encode_chunk_to_bytes, ChunkBuilder},
    subtitle::decode_subtitle,
    table::{decode_table, encode_dictionaries},
    Container, Entry, Layout, PayloadKind, Row, Value,
};
use proptest::prelude::*;

fn any_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i8>().prop_map(Value::Char),
        any::<u8>().prop_map(Value::UnsignedChar),
        any::<i16>().prop_map(Value::Short),
        any::<u16>().prop_map(Value::UnsignedShort),
        any::<i32>().prop_map(Value::Integer),
        any::<u32>().prop_map(Value::UnsignedInteger),
        any::<i64>().prop_map(Value::LongLong),
        any::<u64>().prop_map(Value::UnsignedLongLong),
        // finite floats only: NaN breaks PartialEq
        (-1.0e6f32..1.0e6).prop_map(Value::Float),
        (-1.0e12f64..1.0e12).prop_map(Value::Double),
        "[a-zA-Z0-9_ ]{0,24}".prop_map(Value::String),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(|v| Value::Bytes(Bytes::from(v))),
    ]
}

/// Rows sharing a column layout; recurring columns repeat row 0's value
fn any_rows() -> impl Strategy<Value = Vec<Row>> {
    (
        prop::collection::vec((any::<bool>(), any_value()), 1..6),
        1usize..8,
    )
        .prop_flat_map(|(columns, row_count)| {
            let per_row: Vec<_> = columns
                .iter()
                .map(|(_, v)| same_type_value(v.clone()))
                .collect();
            (
                Just(columns),
                prop::collection::vec(per_row, row_count),
            )
        })
        .prop_map(|(columns, unique_rows)| {
            unique_rows
                .into_iter()
                .map(|values| {
                    Row::new(
                        columns
                            .iter()
                            .zip(values)
                            .enumerate()
                            .map(|(i, ((recurring, first), value))| {
                                let key = format!("col{}", i);
                                if *recurring {
                                    Entry::recurring(key, first.clone())
                                } else {
                                    Entry::unique(key, value)
                                }
                            })
                            .collect(),
                    )
                })
                .collect()
        })
}

/// Strategy producing values of the same type as `sample`
fn same_type_value(sample: Value) -> BoxedStrategy<Value> {
    match sample {
        Value::Char(_) => any::<i8>().prop_map(Value::Char).boxed(),
        Value::UnsignedChar(_) => any::<u8>().prop_map(Value::UnsignedChar).boxed(),
        Value::Short(_) => any::<i16>().prop_map(Value::Short).boxed(),
        Value::UnsignedShort(_) => any::<u16>().prop_map(Value::UnsignedShort).boxed(),
        Value::Integer(_) => any::<i32>().prop_map(Value::Integer).boxed(),
        Value::UnsignedInteger(_) => any::<u32>().prop_map(Value::UnsignedInteger).boxed(),
        Value::LongLong(_) => any::<i64>().prop_map(Value::LongLong).boxed(),
        Value::UnsignedLongLong(_) => any::<u64>().prop_map(Value::UnsignedLongLong).boxed(),
        Value::Float(_) => (-1.0e6f32..1.0e6).prop_map(Value::Float).boxed(),
        Value::Double(_) => (-1.0e12f64..1.0e12).prop_map(Value::Double).boxed(),
        Value::String(_) => "[a-z]{0,12}".prop_map(Value::String).boxed(),
        Value::Bytes(_) => prop::collection::vec(any::<u8>(), 0..16)
            .prop_map(|v| Value::Bytes(Bytes::from(v)))
            .boxed(),
        Value::Unknown(tag) => Just(Value::Unknown(tag)).boxed(),
    }
}

proptest! {
    #[test]
    fn prop_chunk_round_trip(
        kind in 0u8..6,
        channel in any::<u8>(),
        frame_time in any::<u32>(),
        frame_rate in any::<u32>(),
        align in prop::sample::select(vec![1usize, 4, 16, 32]),
        payload in prop::collection::vec(any::<u8>(), 0..1024)
    ) {
        let chunk = ChunkBuilder::new(SFV)
            .kind(PayloadKind::from_u8(kind))
            .channel(channel)
            .frame_time(frame_time)
            .frame_rate(frame_rate)
            .payload(Bytes::from(payload))
            .align(align)
            .build()
            .unwrap();

        let encoded = encode_chunk_to_bytes(&chunk).unwrap();
        prop_assert_eq!(encoded.len() % align, 0);

        let (decoded, consumed) = decode_chunk_from_bytes(&encoded).unwrap();
        prop_assert_eq!(consumed, encoded.len());
        prop_assert_eq!(&decoded, &chunk);

        let from_reader = decode_chunk(&mut Cursor::new(encoded.to_vec()), 0).unwrap();
        prop_assert_eq!(from_reader, Some(chunk));
    }

    #[test]
    fn prop_table_round_trip(rows in any_rows()) {
        let table = encode_dictionaries("PROP_TABLE", &rows).unwrap();
        let encoded = table.encode();
        prop_assert_eq!(encoded.len(), table.encoded_len());

        let decoded = decode_table(&encoded).unwrap();
        prop_assert_eq!(&decoded, &table);

        let dict = decoded.dictionary().unwrap();
        prop_assert_eq!(dict.name, "PROP_TABLE");
        prop_assert_eq!(dict.rows, rows);
    }

    #[test]
    fn prop_recurring_only_tables_round_trip(
        flag in any::<u8>(),
        code in any::<i16>(),
        row_count in 100usize..600
    ) {
        let rows: Vec<Row> = (0..row_count)
            .map(|_| Row::new(vec![
                Entry::recurring("flag", Value::UnsignedChar(flag)),
                Entry::recurring("code", Value::Short(code)),
            ]))
            .collect();

        let table = encode_dictionaries("FLAGS", &rows).unwrap();
        prop_assert!(table.size() < row_count);

        let dict = decode_table(&table.encode()).unwrap().dictionary().unwrap();
        prop_assert_eq!(dict.rows, rows);
    }

    #[test]
    fn prop_recurring_columns_stored_once(
        value in any::<u64>(),
        ids in prop::collection::vec(any::<u16>(), 1..64)
    ) {
        let rows: Vec<Row> = ids
            .iter()
            .map(|id| Row::new(vec![
                Entry::recurring("shared", Value::UnsignedLongLong(value)),
                Entry::unique("id", Value::UnsignedShort(*id)),
            ]))
            .collect();

        let table = encode_dictionaries("T", &rows).unwrap();
        // two descriptors plus one 8-byte value
        prop_assert_eq!(table.shared.len(), 2 * 5 + 8);
        prop_assert_eq!(table.unique.len(), 2 * ids.len());

        for row in table.dictionary().unwrap().rows {
            prop_assert_eq!(row.get("shared"), Some(&Value::UnsignedLongLong(value)));
        }
    }

    #[test]
    fn prop_decode_never_panics(
        data in prop::collection::vec(any::<u8>(), 0..4096)
    ) {
        // Should never panic, even on random data
        let _ = decode_chunk_from_bytes(&data);
        let _ = decode_chunk(&mut Cursor::new(&data), 0);
        let _ = decode_subtitle(&data);
        if let Ok(table) = decode_table(&data) {
            let _ = table.dictionary();
        }
    }

    #[test]
    fn prop_table_decode_survives_corruption(
        rows in any_rows(),
        flips in prop::collection::vec((any::<prop::sample::Index>(), any::<u8>()), 1..8)
    ) {
        let mut encoded = encode_dictionaries("T", &rows).unwrap().encode().to_vec();
        for (index, byte) in flips {
            let i = index.index(encoded.len());
            encoded[i] ^= byte;
        }

        if let Ok(table) = decode_table(&encoded) {
            let _ = table.dictionary();
        }
    }

    #[test]
    fn prop_demux_never_panics(
        data in prop::collection::vec(any::<u8>(), 0..4096)
    ) {
        let _ = Container::demux(Cursor::new(&data));
        let _ = Container::demux_bytes(&Bytes::from(data));
    }

    #[test]
    fn prop_seek_table_fits_reservation(
        video_frames in 1u32..400,
        audio_frames in 0u32..50
    ) {
        let frame = |id, kind, t: u32| ChunkBuilder::new(id)
            .kind(kind)
            .frame_time(t)
            .frame_rate(30)
            .payload(Bytes::from(vec![1u8; 8]))
            .build()
            .unwrap();

        let mut container = Container::new();
        container.root = Some(frame(CRID, PayloadKind::Header, 0));
        container.video = (0..video_frames).map(|t| frame(SFV, PayloadKind::Stream, t)).collect();
        container.audio = (0..audio_frames).map(|t| frame(SFA, PayloadKind::Stream, t * 3)).collect();
        container.subtitle = vec![frame(SBT, PayloadKind::Stream, 15)];

        let layout = Layout::plan(&container).unwrap();
        let expected_entries = (video_frames as usize + 29) / 30;

        prop_assert_eq!(layout.seek_entries().len(), expected_entries);
        prop_assert_eq!(layout.seek_chunk().total_size(), reserve_size(video_frames as usize));
        prop_assert_eq!(layout.to_bytes().unwrap().len() as u64, layout.total_len());
    }

    #[test]
    fn prop_video_written_in_time_order(
        times in prop::collection::vec(1u32..10_000, 1..60)
    ) {
        let frame = |t: u32| ChunkBuilder::new(SFV)
            .frame_time(t)
            .frame_rate(30)
            .build()
            .unwrap();

        let mut container = Container::new();
        container.root = Some(frame(0));
        container.video = std::iter::once(0).chain(times).map(frame).collect();

        let layout = Layout::plan(&container).unwrap();
        let keys: Vec<u64> = layout
            .instructions()
            .iter()
            .filter_map(|i| match i {
                usmkit_core::layout::Instruction::Write(c)
                    if c.id == SFV && c.kind() == PayloadKind::Stream => Some(c.header.normalized_time()),
                _ => None,
            })
            .collect();

        prop_assert!(keys.windows(2).all(|w| w[0] <= w[1]));
    }
}
