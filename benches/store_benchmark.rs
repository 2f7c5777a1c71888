use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use raidstore::{BackendKind, FixedPlacement, GaloisField, GeneratorMatrix, ObjectStore, StoreConfig, StripeLayout};
use std::hint::black_box;
use tempfile::TempDir;

const NODE_COUNTS: [usize; 4] = [5, 7, 9, 11];
const OBJECT_SIZE: usize = 1024 * 1024;

fn sample_content(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i.wrapping_mul(31) ^ (i >> 7)) as u8).collect()
}

fn open_store(root: &std::path::Path, nodes: usize, backend: BackendKind) -> ObjectStore {
    let config = StoreConfig::new(root, nodes)
        .with_backend(backend)
        .with_seed(0);
    ObjectStore::open(config).unwrap()
}

/// Write then read one object, per node count and backend
fn bench_write_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_and_read");
    group.throughput(Throughput::Bytes(OBJECT_SIZE as u64));
    let content = sample_content(OBJECT_SIZE);

    for nodes in NODE_COUNTS {
        for backend in [BackendKind::Memory, BackendKind::Local] {
            let dir = TempDir::new().unwrap();
            let mut store = open_store(dir.path(), nodes, backend);

            group.bench_with_input(
                BenchmarkId::new(format!("{:?}", backend), nodes),
                &content,
                |b, content| {
                    b.iter(|| {
                        store.write("bench", black_box(content)).unwrap();
                        black_box(store.read("bench").unwrap())
                    })
                },
            );
            store.close().unwrap();
        }
    }
    group.finish();
}

/// Read with one data node crashed, forcing reconstruction
fn bench_crash_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("crash_rebuild");
    group.throughput(Throughput::Bytes(OBJECT_SIZE as u64));
    let content = sample_content(OBJECT_SIZE);

    for nodes in NODE_COUNTS {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(dir.path(), nodes, BackendKind::Memory)
            .with_placement(FixedPlacement::new(0, 1));
        store.write("bench", &content).unwrap();
        store.crash_data_nodes("bench", 1).unwrap();

        group.bench_function(BenchmarkId::from_parameter(nodes), |b| {
            b.iter(|| black_box(store.read("bench").unwrap()))
        });
        store.close().unwrap();
    }
    group.finish();
}

/// Parity encoding alone
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_parity");
    group.throughput(Throughput::Bytes(OBJECT_SIZE as u64));
    let gf = GaloisField::default();
    let content = sample_content(OBJECT_SIZE);

    for nodes in NODE_COUNTS {
        let data_count = nodes - 2;
        let generator = GeneratorMatrix::build(data_count, 2, &gf);
        let data = StripeLayout::new(data_count, 16).split(&content);

        group.bench_function(BenchmarkId::from_parameter(nodes), |b| {
            b.iter(|| black_box(generator.encode(black_box(&data), &gf).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_write_read, bench_crash_rebuild, bench_encode);
criterion_main!(benches);
