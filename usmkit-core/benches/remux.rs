use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::io::Cursor;
use usmkit_core::{
    constants::{CRID, SFA, SFV},
    encoder::{encode_chunk_to_bytes, ChunkBuilder},
    Chunk, ChunkId, Container, Layout, PayloadKind,
};

fn chunk(id: ChunkId, kind: PayloadKind, frame_time: u32, len: usize) -> Chunk {
    ChunkBuilder::new(id)
        .kind(kind)
        .frame_time(frame_time)
        .frame_rate(30)
        .payload(Bytes::from(vec![0x5Au8; len]))
        .align(16)
        .build()
        .unwrap()
}

/// Roughly one minute of 30 fps video with interleaved audio
fn sample_container(video_frames: u32) -> Container {
    let mut container = Container::new();
    container.root = Some(chunk(CRID, PayloadKind::Header, 0, 256));
    container.headers.insert(SFV, chunk(SFV, PayloadKind::Header, 0, 512));
    container.headers.insert(SFA, chunk(SFA, PayloadKind::Header, 0, 512));
    container.video = (0..video_frames)
        .map(|t| chunk(SFV, PayloadKind::Stream, t, 4096))
        .collect();
    container.audio = (0..video_frames / 2)
        .map(|t| chunk(SFA, PayloadKind::Stream, t * 2, 512))
        .collect();
    container
}

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");

    for frames in [300u32, 1800] {
        let container = sample_container(frames);
        group.throughput(Throughput::Elements(frames as u64));
        group.bench_with_input(BenchmarkId::from_parameter(frames), &container, |b, container| {
            b.iter(|| Layout::plan(black_box(container)).unwrap());
        });
    }

    group.finish();
}

fn bench_mux(c: &mut Criterion) {
    let mut group = c.benchmark_group("mux");

    for frames in [300u32, 1800] {
        let container = sample_container(frames);
        let size = Layout::plan(&container).unwrap().total_len();

        group.throughput(Throughput::Bytes(size));
        group.bench_with_input(BenchmarkId::from_parameter(frames), &container, |b, container| {
            b.iter(|| {
                let mut out = Cursor::new(Vec::with_capacity(size as usize));
                usmkit_core::mux(black_box(container), &mut out).unwrap()
            });
        });
    }

    group.finish();
}

fn bench_demux(c: &mut Criterion) {
    let mut group = c.benchmark_group("demux");

    let container = sample_container(1800);
    let mut raw = Vec::new();
    for chunk in container
        .root
        .iter()
        .chain(container.headers.values())
        .chain(&container.video)
        .chain(&container.audio)
    {
        raw.extend_from_slice(&encode_chunk_to_bytes(chunk).unwrap());
    }
    let raw = Bytes::from(raw);

    group.throughput(Throughput::Bytes(raw.len() as u64));
    group.bench_function("reader", |b| {
        b.iter(|| Container::demux(Cursor::new(black_box(&raw[..]))).unwrap());
    });
    group.bench_function("bytes", |b| {
        b.iter(|| Container::demux_bytes(black_box(&raw)).unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_plan, bench_mux, bench_demux);
criterion_main!(benches);
