//! Benchmarks for block list lookups and block decisions.
//!
//! Run with: cargo bench --bench lookup

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use blockd::number::NumberNormalizer;
use blockd::policy::{CallExtras, Presentation};
use blockd::provider::{BlockedNumberProvider, ContentValues};
use blockd::store::{BlockListStore, MemoryStorage, PersistentStorage, Selection, SharedStorage};
use std::sync::Arc;
use tempfile::TempDir;

fn number(seq: u32) -> String {
    format!("+1555{:07}", seq)
}

fn populated_provider(storage: SharedStorage, size: u32) -> BlockedNumberProvider {
    let provider = BlockedNumberProvider::builder(storage).build();
    for i in 0..size {
        provider
            .insert("blocked", &ContentValues::with_original(number(i)))
            .unwrap();
    }
    provider
}

fn bench_normalize(c: &mut Criterion) {
    let normalizer = NumberNormalizer::for_region("US");

    c.bench_function("number/normalize", |b| {
        b.iter(|| black_box(normalizer.normalize(black_box("1 (555) 010-0199"))))
    });
}

fn bench_exists(c: &mut Criterion) {
    let mut group = c.benchmark_group("store/exists");

    for size in [100, 1_000, 10_000].iter() {
        let store = MemoryStorage::new();
        for i in 0..*size {
            store.insert(&number(i), &number(i)).unwrap();
        }

        group.bench_with_input(BenchmarkId::new("memory", size), size, |b, &size| {
            let mut idx = 0;
            b.iter(|| {
                let n = number(idx % size);
                idx += 1;
                black_box(store.exists(&n, &n).unwrap())
            })
        });
    }

    group.finish();
}

fn bench_is_blocked(c: &mut Criterion) {
    let mut group = c.benchmark_group("provider/is_blocked");
    group.throughput(Throughput::Elements(1));

    let memory = populated_provider(Arc::new(MemoryStorage::new()), 1_000);
    group.bench_function("memory", |b| {
        b.iter(|| black_box(memory.is_blocked(black_box("5550000500")).unwrap()))
    });

    let dir = TempDir::new().unwrap();
    let persistent = populated_provider(PersistentStorage::open(dir.path()).unwrap(), 1_000);
    group.bench_function("fjall", |b| {
        b.iter(|| black_box(persistent.is_blocked(black_box("5550000500")).unwrap()))
    });

    group.finish();
}

fn bench_should_block(c: &mut Criterion) {
    let provider = populated_provider(Arc::new(MemoryStorage::new()), 1_000);
    let extras = CallExtras::new(Presentation::Allowed, true);

    c.bench_function("provider/should_system_block_number", |b| {
        b.iter(|| {
            black_box(
                provider
                    .should_system_block_number(black_box("+15559999999"), Some(&extras))
                    .unwrap(),
            )
        })
    });
}

fn bench_filter_parse(c: &mut Criterion) {
    let args = vec!["5550100".to_string(), "+15550100".to_string()];

    c.bench_function("filter/parse", |b| {
        b.iter(|| {
            black_box(
                Selection::parse(
                    black_box(Some("(original_number = ?1 OR e164_number = ?2) AND _id <> 0")),
                    &args,
                )
                .unwrap(),
            )
        })
    });
}

criterion_group!(
    benches,
    bench_normalize,
    bench_exists,
    bench_is_blocked,
    bench_should_block,
    bench_filter_parse,
);

criterion_main!(benches);
