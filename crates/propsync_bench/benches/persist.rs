//! Storage backend and persistence benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use propsync_bench::utils::{random_data, random_payload};
use propsync_core::{persistable_fields, PersistOptions, ScopeConfig, SyncContext};
use propsync_storage::{FileBackend, InMemoryBackend, StorageBackend};
use std::sync::Arc;
use tempfile::TempDir;

/// Benchmark raw backend writes and reads.
fn bench_backends(c: &mut Criterion) {
    let mut group = c.benchmark_group("backend");

    for size in [256, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        let data = random_data(*size);

        group.bench_with_input(BenchmarkId::new("memory_set", size), &data, |b, data| {
            let backend = InMemoryBackend::new();
            b.iter(|| backend.set_item("bench", black_box(data)).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("memory_get", size), &data, |b, data| {
            let backend = InMemoryBackend::with_item("bench", data.clone());
            b.iter(|| black_box(backend.get_item("bench").unwrap()));
        });
    }

    // Use larger sample size for file operations
    group.sample_size(50);

    for size in [256, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        let data = random_data(*size);

        group.bench_with_input(BenchmarkId::new("file_set", size), &data, |b, data| {
            let dir = TempDir::new().unwrap();
            let backend = FileBackend::open(dir.path()).unwrap();
            b.iter(|| backend.set_item("bench", black_box(data)).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("file_get", size), &data, |b, data| {
            let dir = TempDir::new().unwrap();
            let backend = FileBackend::open(dir.path()).unwrap();
            backend.set_item("bench", data).unwrap();
            b.iter(|| black_box(backend.get_item("bench").unwrap()));
        });
    }

    group.finish();
}

/// Benchmark the default partialize step.
fn bench_partialize(c: &mut Criterion) {
    let state = random_payload(128);
    c.bench_function("persistable_fields_128", |b| {
        b.iter(|| black_box(persistable_fields(black_box(&state))));
    });
}

/// Benchmark merging cycles that write through to storage.
fn bench_persisted_cycles(c: &mut Criterion) {
    let mut group = c.benchmark_group("persisted_cycle");

    group.bench_function("memory", |b| {
        let ctx = SyncContext::builder().build();
        let backend = Arc::new(InMemoryBackend::new());
        let scope = ctx
            .provider()
            .mount(ScopeConfig::new().persist(PersistOptions::new("bench", backend)));
        let mut inputs = random_payload(16);
        let mut tick = 0i64;

        b.iter(|| {
            tick += 1;
            inputs.insert("tick", tick);
            black_box(scope.evaluate(&inputs))
        });
    });

    group.sample_size(50);
    group.bench_function("file", |b| {
        let dir = TempDir::new().unwrap();
        let ctx = SyncContext::builder().build();
        let backend = Arc::new(FileBackend::open(dir.path()).unwrap());
        let scope = ctx
            .provider()
            .mount(ScopeConfig::new().persist(PersistOptions::new("bench", backend)));
        let mut inputs = random_payload(16);
        let mut tick = 0i64;

        b.iter(|| {
            tick += 1;
            inputs.insert("tick", tick);
            black_box(scope.evaluate(&inputs))
        });
    });

    group.finish();
}

/// Benchmark hydration from a stored envelope.
fn bench_rehydrate(c: &mut Criterion) {
    let ctx = SyncContext::builder().build();
    let backend = Arc::new(InMemoryBackend::new());
    let scope = ctx
        .provider()
        .mount(ScopeConfig::new().persist(PersistOptions::new("bench", backend)));
    scope.evaluate(&random_payload(64));
    let persist = scope.persist().unwrap();

    c.bench_function("rehydrate_64", |b| {
        b.iter(|| black_box(persist.rehydrate()));
    });
}

criterion_group!(
    benches,
    bench_backends,
    bench_partialize,
    bench_persisted_cycles,
    bench_rehydrate,
);

criterion_main!(benches);
