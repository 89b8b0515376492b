//! Criterion benchmarks for the conversion hot path.
//!
//! Measures per-packet cost (orientation, row flip, RF-chop removal, slot fill) for
//! typical EPI geometries, and the per-row corrections in isolation.
//!
//! Run with: cargo bench --bench convert

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use epi_convert::archive::MemoryArchive;
use epi_convert::config::ConverterConfig;
use epi_convert::correction::{undo_rf_chop, RowFlipConfig, RowFlipTable};
use epi_convert::packet::{ControlPacket, HyperFrameControl, SampleCube};
use epi_convert::params::{names, ParameterMap, SliceTable};
use epi_convert::{EpiConverter, SequenceConverter};
use ndarray::Array3;
use num_complex::Complex32;

const TOP_VIEWS: usize = 2;

fn cube(frame_size: usize, views: usize, channels: usize) -> SampleCube {
    Array3::from_shape_fn((frame_size, views, channels), |(x, v, c)| {
        Complex32::new(x as f32 + c as f32, v as f32)
    })
}

fn parameters(frame_size: usize, acquired_y: usize, channels: usize, slices: u16) -> ParameterMap {
    ParameterMap::new()
        .with_int(names::NUM_ECHOES, 1)
        .with_int(names::NUM_CHANNELS, channels as i64)
        .with_int(names::NUM_SLICES, i64::from(slices))
        .with_int(names::ACQUIRED_X_RES, frame_size as i64)
        .with_int(names::ACQUIRED_Y_RES, acquired_y as i64)
        .with_int(names::EXTRA_FRAMES_TOP, TOP_VIEWS as i64)
        .with_int(names::EXTRA_FRAMES_BOTTOM, 0)
        .with_flag(names::INTEGRATED_REFERENCE_SCAN, true)
        .with_flag(names::MULTIBAND_ENABLED, false)
        .with_slice_table(SliceTable::identity(slices))
}

/// Whole-archive conversion for several matrix sizes and channel counts.
fn convert_archive(c: &mut Criterion) {
    let mut group = c.benchmark_group("convert_archive");
    group.sample_size(20);

    let geometries = [("64x64x8", 64, 64, 8), ("128x128x16", 128, 128, 16), ("96x96x32", 96, 96, 32)];
    let slices: u16 = 4;

    for (name, frame_size, acquired_y, channels) in geometries {
        let views = TOP_VIEWS + acquired_y;
        let packets: Vec<ControlPacket> = (0..u32::from(slices))
            .map(|slice| {
                ControlPacket::frame(
                    HyperFrameControl::new(1, slice, 0),
                    cube(frame_size, views, channels),
                )
            })
            .collect();
        let params = parameters(frame_size, acquired_y, channels, slices);
        let converter = EpiConverter::new(ConverterConfig::default());

        group.throughput(Throughput::Elements((views * packets.len()) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &packets, |b, packets| {
            b.iter(|| {
                let mut archive = MemoryArchive::new("bench.h5", params.clone(), packets.clone());
                let conversion = converter.convert_archive(&mut archive).unwrap();
                black_box(conversion.records.len())
            });
        });
    }

    group.finish();
}

/// Row flip and RF-chop removal on one packet's samples.
fn corrections(c: &mut Criterion) {
    let mut group = c.benchmark_group("corrections");
    let (frame_size, views, channels) = (128, 130, 16);
    let table = RowFlipTable::new(views, &RowFlipConfig::default());
    let samples = cube(frame_size, views, channels);

    group.throughput(Throughput::Elements(samples.len() as u64));
    group.bench_function("row_flip", |b| {
        b.iter_batched(
            || samples.clone(),
            |mut s| {
                table.apply_to_cube(&mut s);
                black_box(s)
            },
            criterion::BatchSize::LargeInput,
        );
    });
    group.bench_function("undo_rf_chop", |b| {
        b.iter_batched(
            || samples.clone(),
            |mut s| {
                undo_rf_chop(&mut s);
                black_box(s)
            },
            criterion::BatchSize::LargeInput,
        );
    });

    group.finish();
}

criterion_group!(benches, convert_archive, corrections);
criterion_main!(benches);
