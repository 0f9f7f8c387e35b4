use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use jdelta::config::{Config, config_for_level};
use jdelta::cursor::StreamCursor;
use jdelta::engine;
use jdelta::format::decode_all;
use jdelta::matcher::resync::{self, AnchorIndex};
use std::fs;
use std::path::Path;

fn gen_data(size: usize, seed: u64) -> Vec<u8> {
    let mut s = seed;
    let mut out = Vec::with_capacity(size);
    for _ in 0..size {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        out.push((s >> 33) as u8);
    }
    out
}

fn mutate(base: &[u8], stride: usize) -> Vec<u8> {
    let mut out = base.to_vec();
    for i in (0..out.len()).step_by(stride.max(1)) {
        out[i] = out[i].wrapping_add(1);
    }
    out
}

fn diff_level(old: &[u8], new: &[u8], level: u32) -> Vec<u8> {
    engine::diff(old, new, &config_for_level(level)).unwrap()
}

fn write_ratio_snapshot() {
    let old = gen_data(2 * 1024 * 1024, 123);
    let new = mutate(&old, 4096);
    let mut csv = String::from("level,patch_bytes,new_bytes,ratio\n");
    for level in 0u32..=9 {
        let patch = diff_level(&old, &new, level);
        let ratio = patch.len() as f64 / new.len() as f64;
        csv.push_str(&format!("{level},{},{},{}\n", patch.len(), new.len(), ratio));
    }
    let out_dir = Path::new("target/criterion/custom_reports");
    let _ = fs::create_dir_all(out_dir);
    let _ = fs::write(out_dir.join("ratio_snapshot.csv"), csv);
}

fn bench_diff_speed(c: &mut Criterion) {
    let mut g = c.benchmark_group("diff_speed_mb_s");
    for size in [64 * 1024usize, 1024 * 1024, 8 * 1024 * 1024] {
        let old = gen_data(size, 1);
        let new = mutate(&old, 1024);
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let patch = diff_level(black_box(&old), black_box(&new), 6);
                black_box(patch);
            });
        });
    }
    g.finish();
}

fn bench_apply_speed(c: &mut Criterion) {
    let mut g = c.benchmark_group("apply_speed_mb_s");
    for size in [64 * 1024usize, 1024 * 1024, 8 * 1024 * 1024] {
        let old = gen_data(size, 2);
        let new = mutate(&old, 2048);
        let patch = diff_level(&old, &new, 6);
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let out = engine::apply(black_box(&old), black_box(&patch)).unwrap();
                black_box(out);
            });
        });
    }
    g.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut g = c.benchmark_group("decode_instructions");
    let old = gen_data(1024 * 1024, 4);
    let new = mutate(&old, 256);
    let patch = diff_level(&old, &new, 6);
    g.throughput(Throughput::Bytes(patch.len() as u64));
    g.bench_function("decode_all", |b| {
        b.iter(|| black_box(decode_all(black_box(&patch)).unwrap()));
    });
    g.finish();
}

fn bench_ratio_vs_level(c: &mut Criterion) {
    write_ratio_snapshot();
    let mut g = c.benchmark_group("patch_ratio_vs_level");
    let old = gen_data(2 * 1024 * 1024, 3);
    let new = mutate(&old, 4096);
    for level in 0u32..=9u32 {
        g.bench_with_input(BenchmarkId::from_parameter(level), &level, |b, level| {
            b.iter(|| {
                let patch = diff_level(&old, &new, *level);
                black_box(patch.len() as f64 / new.len() as f64);
            });
        });
    }
    g.finish();
}

fn bench_resync_search(c: &mut Criterion) {
    let mut g = c.benchmark_group("resync_search_vs_window");
    for window in [256usize, 4096, 16384] {
        // Unrelated data: every search scans the whole window and fails.
        let ow = gen_data(window + 8, 11);
        let nw = gen_data(window + 8, 12);
        g.bench_with_input(BenchmarkId::from_parameter(window), &window, |b, &window| {
            b.iter(|| {
                let mut index = AnchorIndex::new();
                index.rebuild(0, &ow, window);
                black_box(resync::search(&index, &ow, &nw, 8, window, 0))
            });
        });
    }
    g.finish();
}

fn bench_streaming_cursors(c: &mut Criterion) {
    let mut g = c.benchmark_group("streaming_diff");
    let size = 4 * 1024 * 1024usize;
    let old = gen_data(size, 20);
    let new = mutate(&old, 8192);
    let config = Config::default();
    g.throughput(Throughput::Bytes(size as u64));
    g.bench_function("stream_cursors", |b| {
        b.iter(|| {
            let (patch, _) = engine::diff_to(
                StreamCursor::new(&old[..], config.lookahead(), 0),
                StreamCursor::new(&new[..], config.lookahead(), 0),
                Vec::new(),
                &config,
            )
            .unwrap();
            black_box(patch);
        });
    });
    g.finish();
}

fn bench_real_world_scenarios(c: &mut Criterion) {
    let mut g = c.benchmark_group("real_world_scenarios");
    let scenarios = [
        ("software_update", 4 * 1024 * 1024usize, 1024usize),
        ("document_versioning", 512 * 1024usize, 256usize),
        ("database_snapshot", 8 * 1024 * 1024usize, 4096usize),
        ("large_video_like", 16 * 1024 * 1024usize, 8192usize),
    ];

    for (name, size, stride) in scenarios {
        let old = gen_data(size, size as u64);
        let new = mutate(&old, stride);
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_function(name, |b| {
            b.iter(|| {
                let patch = diff_level(&old, &new, 6);
                let out = engine::apply(&old, &patch).unwrap();
                black_box(out);
            });
        });
    }
    g.finish();
}

criterion_group!(
    benches,
    bench_diff_speed,
    bench_apply_speed,
    bench_decode,
    bench_ratio_vs_level,
    bench_resync_search,
    bench_streaming_cursors,
    bench_real_world_scenarios
);
criterion_main!(benches);
