//! Benchmarks for the training data pipeline.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::NamedTempFile;

use teras_nnue::board::Position;
use teras_nnue::config::{Architecture, LoaderConfig};
use teras_nnue::data::{write_samples, Batch, BatchLoader, EpochStatus, Outcome, Sample, SparseBatch};
use teras_nnue::nnue::{FloatNetwork, PositionFeatures};

const POSITIONS: [&str; 3] = [
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
    "r1bqkb1r/pppp1ppp/2n2n2/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4",
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
];

fn samples(count: usize) -> Vec<Sample> {
    (0..count)
        .map(|i| {
            let position: Position = POSITIONS[i % POSITIONS.len()].parse().unwrap();
            Sample::new(position, Outcome::Draw, Some((i % 400) as i16))
        })
        .collect()
}

fn bench_features(c: &mut Criterion) {
    let mut group = c.benchmark_group("features");
    let mut features = PositionFeatures::default();
    for (name, fen) in ["startpos", "middlegame", "kiwipete"].iter().zip(POSITIONS) {
        let position: Position = fen.parse().unwrap();
        group.bench_function(*name, |b| {
            b.iter(|| {
                features.refresh(black_box(&position));
                black_box(features.len())
            })
        });
    }
    group.finish();
}

fn bench_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");
    let file = NamedTempFile::new().unwrap();
    write_samples(file.path(), &samples(16_384)).unwrap();

    for batch_size in [256u32, 4096] {
        let config = LoaderConfig {
            seed: Some(0),
            shuffle_buffer_samples: 16_384,
            ..LoaderConfig::with_batch_size(batch_size)
        };
        let mut loader = BatchLoader::open(file.path(), &config).unwrap();
        let mut batch = Batch::new(batch_size);
        group.bench_with_input(BenchmarkId::new("batch", batch_size), &batch_size, |b, _| {
            b.iter(|| {
                if loader.load(&mut batch).unwrap() == EpochStatus::WrappedToNewEpoch {
                    loader.reopen().unwrap();
                }
                black_box(batch.size())
            })
        });
    }
    group.finish();
}

fn bench_sparse(c: &mut Criterion) {
    let mut batch = Batch::new(4096);
    for sample in samples(4096) {
        batch.push(&sample).unwrap();
    }
    c.bench_function("sparse_assembly_4096", |b| {
        b.iter(|| black_box(SparseBatch::from_view(&batch.view()).unwrap()))
    });
}

fn bench_quantize(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let network = FloatNetwork::he_uniform(Architecture::new(256, 16, 32), &mut rng);
    c.bench_function("quantize_256x16x32", |b| {
        b.iter(|| black_box(network.quantize().unwrap()))
    });
}

criterion_group!(benches, bench_features, bench_load, bench_sparse, bench_quantize);
criterion_main!(benches);
