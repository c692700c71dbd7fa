//! # Unlock Benchmarks
//!
//! Performance benchmarks for trellis-core unlock derivation.
//!
//! Run with: `cargo bench -p trellis-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::collections::BTreeSet;
use std::hint::black_box;
use trellis_core::catalog::NodeGraphSource;
use trellis_core::{Node, NodeId, NodeRef, PathCatalog, PathId, UnlockComputer};

const PATH: PathId = PathId(1);

/// Build a grid-shaped path: `levels` levels with `width` nodes each, where
/// every node past the first level requires one node of the previous level.
fn create_grid_path(levels: u32, width: u32) -> (PathCatalog, Vec<NodeId>) {
    let mut catalog = PathCatalog::new();
    let mut ids = Vec::new();
    let mut prev_row: Vec<NodeId> = Vec::new();

    for level in 1..=levels {
        let mut row = Vec::new();
        for pos in 1..=width {
            let mut node = Node::new(NodeId(0), PathId(0), level, pos);
            if let Some(&anchor) = prev_row.first() {
                // Odd positions get an explicit requirement, evens rely on
                // the previous-level rule — both rule families get exercised.
                if pos % 2 == 1 {
                    node = node.with_required([anchor]);
                }
            }
            let id = catalog
                .insert(PATH, NodeRef::Concrete(node))
                .expect("insert");
            row.push(id);
            ids.push(id);
        }
        prev_row = row;
    }

    (catalog, ids)
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_compute_cold(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_cold");

    for size in [100u32, 500, 1000].iter() {
        let (catalog, _) = create_grid_path(size / 10, 10);
        let nodes = catalog.list_active_nodes(PATH).expect("list");

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(UnlockComputer::compute(&nodes, &BTreeSet::new())));
        });
    }

    group.finish();
}

fn bench_compute_half_completed(c: &mut Criterion) {
    let mut group = c.benchmark_group("compute_half_completed");

    for size in [100u32, 500, 1000].iter() {
        let (catalog, ids) = create_grid_path(size / 10, 10);
        let nodes = catalog.list_active_nodes(PATH).expect("list");
        let completed: BTreeSet<NodeId> = ids.iter().take(ids.len() / 2).copied().collect();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(UnlockComputer::compute(&nodes, &completed)));
        });
    }

    group.finish();
}

fn bench_catalog_listing(c: &mut Criterion) {
    let mut group = c.benchmark_group("catalog_listing");

    for size in [100u32, 500, 1000].iter() {
        let (catalog, _) = create_grid_path(size / 10, 10);

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(catalog.list_active_nodes(PATH).expect("list")));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compute_cold,
    bench_compute_half_completed,
    bench_catalog_listing,
);

criterion_main!(benches);
