//! Performance benchmarks for directory listing.
//!
//! These benchmarks measure the hot paths of `/api/list`:
//! - Sorting entries under each sort key
//! - Listing a populated directory from disk

use std::time::{Duration, SystemTime};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use daemon::files::{sort_entries, DirectoryBrowser, DirectoryEntry, StorageRoot};
use protocol::SortKey;

fn sample_entries(count: usize) -> Vec<DirectoryEntry> {
    (0..count)
        .map(|i| DirectoryEntry {
            // Mixed case and repeated sizes so ties are exercised
            name: if i % 2 == 0 {
                format!("File_{:05}.txt", count - i)
            } else {
                format!("file_{:05}.txt", i)
            },
            is_dir: i % 10 == 0,
            size: (i % 97) as u64 * 1024,
            modified: SystemTime::UNIX_EPOCH + Duration::from_secs((i % 53) as u64),
        })
        .collect()
}

/// Benchmark in-memory sorting for every sort key.
fn bench_sort_entries(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort_entries");
    let entries = sample_entries(10_000);
    group.throughput(Throughput::Elements(entries.len() as u64));

    for key in SortKey::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(key), &key, |b, &key| {
            b.iter_batched(
                || entries.clone(),
                |mut batch| {
                    sort_entries(&mut batch, black_box(key));
                    batch
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

/// Benchmark listing a directory of 1000 files with and without search.
fn bench_list_directory(c: &mut Criterion) {
    let temp_dir = tempfile::TempDir::new().expect("create temp dir");
    for i in 0..1000 {
        std::fs::write(temp_dir.path().join(format!("entry_{i:04}.dat")), [0u8; 16])
            .expect("write fixture");
    }

    let runtime = tokio::runtime::Runtime::new().expect("create runtime");
    let root = StorageRoot::new(temp_dir.path()).expect("open root");
    let browser = DirectoryBrowser::new(root);

    let mut group = c.benchmark_group("list_directory");
    group.throughput(Throughput::Elements(1000));

    for search in ["", "entry_05"] {
        group.bench_with_input(
            BenchmarkId::new("search", if search.is_empty() { "none" } else { search }),
            &search,
            |b, &search| {
                b.iter(|| {
                    runtime
                        .block_on(browser.list("", black_box(search), SortKey::NameDesc))
                        .expect("list")
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_sort_entries, bench_list_directory);
criterion_main!(benches);
