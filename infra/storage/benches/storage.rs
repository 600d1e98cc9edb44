use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use limbo_storage::{FileStore, canonicalize};
use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tempfile::TempDir;

// ============================================================================
// Benchmark: Name Canonicalization
// ============================================================================

fn bench_canonicalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("canonicalize");

    let long = "x".repeat(400);
    let hostile = "../..\\CON:<>|?*\u{1}.txt. . ".repeat(8);
    let inputs = [
        ("plain", "quarterly-report.pdf"),
        ("reserved", "LPT1.tar.gz"),
        ("unicode", "отчёт за квартал.docx"),
        ("hostile", hostile.as_str()),
        ("long", long.as_str()),
    ];

    for (name, input) in inputs {
        group.bench_with_input(BenchmarkId::from_parameter(name), input, |b, input| {
            b.iter(|| black_box(canonicalize(black_box(input))));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Staged Upload + Publish
// ============================================================================

fn bench_upload(c: &mut Criterion) {
    let mut group = c.benchmark_group("upload");
    group.measurement_time(Duration::from_secs(10));

    let temp = TempDir::new().unwrap();
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = rt.block_on(async { FileStore::builder().root(temp.path()).build().await.unwrap() });
    let counter = AtomicU64::new(0);

    let sizes = [("1KB", 1024), ("64KB", 64 * 1024), ("1MB", 1024 * 1024)];

    for (name, size) in sizes {
        let data: Vec<u8> = (0..size).map(|i| u8::try_from(i % 256).unwrap()).collect();
        group.throughput(Throughput::Bytes(u64::try_from(size).unwrap_or(u64::MAX)));

        group.bench_with_input(BenchmarkId::new("commit", name), &data, |b, data| {
            b.to_async(&rt).iter(|| async {
                let file = format!("bench_{}.dat", counter.fetch_add(1, Ordering::Relaxed));
                let mut writer = store.open_writer(&file).await.unwrap();
                for chunk in data.chunks(64 * 1024) {
                    writer.write(chunk).await.unwrap();
                }
                black_box(writer.commit().await.unwrap());
                store.remove(&file).await.unwrap();
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Listing
// ============================================================================

fn bench_enumerate(c: &mut Criterion) {
    let mut group = c.benchmark_group("enumerate");

    let temp = TempDir::new().unwrap();
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = rt.block_on(async {
        let store = FileStore::builder().root(temp.path()).build().await.unwrap();
        for i in 0..500 {
            let mut writer = store.open_writer(&format!("file_{i}.txt")).await.unwrap();
            writer.write(b"payload").await.unwrap();
            writer.commit().await.unwrap();
        }
        store
    });

    group.bench_function("500_files", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(store.enumerate().await.unwrap());
        });
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(benches, bench_canonicalize, bench_upload, bench_enumerate);

criterion_main!(benches);
