// Filtering performance benchmarks

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

use logsieve::graph::SortOrder;
use logsieve::index::{IndexedCommit, MemoryDetailIndex, TopCommitsCache};
use logsieve::model::{CommitCountStage, CommitHash, FilterCollection};
use logsieve::visible::{CancelToken, DataPack, DataPackBuilder, Filterer};

fn hash(n: u32) -> CommitHash {
    let mut bytes = [0u8; 20];
    bytes[..4].copy_from_slice(&n.to_be_bytes());
    CommitHash::from_bytes(bytes)
}

/// A linear history with a branch tip every 1000 commits, fully indexed.
fn generate_pack(size: u32) -> (Arc<DataPack>, Arc<MemoryDetailIndex>) {
    let mut builder = DataPackBuilder::new();
    let root = builder.add_root("/bench/repo");
    let index = MemoryDetailIndex::new();

    for n in (0..size).rev() {
        let parents: Vec<CommitHash> = if n == 0 { Vec::new() } else { vec![hash(n - 1)] };
        let commit = builder.add_commit(root, hash(n), &parents, n as i64);
        index.add_commit(
            commit,
            IndexedCommit {
                root,
                author: if n % 7 == 0 { "alice" } else { "bob" }.to_string(),
                timestamp: n as i64,
                message: format!("change {n}"),
            },
        );
    }
    builder.add_ref(root, "main", hash(size - 1), true);
    for n in (0..size).step_by(1000) {
        builder.add_ref(root, format!("side-{n}"), hash(n), true);
    }
    index.mark_indexed(root);

    (builder.build(), Arc::new(index))
}

fn make_filterer(index: Arc<MemoryDetailIndex>) -> Filterer {
    Filterer::new(index, Arc::new(TopCommitsCache::new(TopCommitsCache::DEFAULT_CAPACITY)))
}

fn run(filterer: &Filterer, pack: &Arc<DataPack>, filters: &FilterCollection) -> usize {
    let (visible, _) = filterer
        .filter(pack, SortOrder::Date, filters, CommitCountStage::INITIAL, &CancelToken::never())
        .unwrap();
    visible.visible_graph().commit_count()
}

fn bench_unfiltered(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_unfiltered");
    for size in [1_000, 10_000, 50_000] {
        let (pack, index) = generate_pack(size);
        let filterer = make_filterer(index);
        let filters = FilterCollection::empty();

        group.bench_with_input(BenchmarkId::new("commits", size), &pack, |b, pack| {
            b.iter(|| black_box(run(&filterer, pack, &filters)));
        });
    }
    group.finish();
}

fn bench_branch_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_branch");
    for size in [1_000, 10_000, 50_000] {
        let (pack, index) = generate_pack(size);
        let filterer = make_filterer(index);
        let filters = FilterCollection::empty().with_branch(vec!["side-0".into()]);

        group.bench_with_input(BenchmarkId::new("commits", size), &pack, |b, pack| {
            b.iter(|| black_box(run(&filterer, pack, &filters)));
        });
    }
    group.finish();
}

fn bench_text_filter_indexed(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_text_indexed");
    for size in [1_000, 10_000, 50_000] {
        let (pack, index) = generate_pack(size);
        let filterer = make_filterer(index);
        let filters = FilterCollection::empty().with_text("change 42");

        group.bench_with_input(BenchmarkId::new("commits", size), &pack, |b, pack| {
            b.iter(|| black_box(run(&filterer, pack, &filters)));
        });
    }
    group.finish();
}

fn bench_user_filter_indexed(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_user_indexed");
    for size in [1_000, 10_000, 50_000] {
        let (pack, index) = generate_pack(size);
        let filterer = make_filterer(index);
        let filters = FilterCollection::empty().with_users(vec!["alice".into()]);

        group.bench_with_input(BenchmarkId::new("commits", size), &pack, |b, pack| {
            b.iter(|| black_box(run(&filterer, pack, &filters)));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_unfiltered,
    bench_branch_filter,
    bench_text_filter_indexed,
    bench_user_filter_indexed
);
criterion_main!(benches);
