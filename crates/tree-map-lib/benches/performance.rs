//! Performance benchmarks for tree-map-lib
//!
//! Run with: cargo bench --package tree-map-lib

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::sync::Arc;
use tree_map_lib::{
    CachePolicy, ExpandedBoundsCache, MapData, MapFilters, MarkerMemo, Plan, TreeHealth,
    TreeMapItem, TreeStatus, ViewportBounds, in_viewport, visible,
};

/// Generate trees scattered over a grid around a base point
fn generate_trees(count: usize, base_lat: f64, base_lng: f64) -> Vec<TreeMapItem> {
    let side = (count as f64).sqrt().ceil() as usize;
    (0..count)
        .map(|i| {
            let lat = base_lat + (i / side) as f64 * 0.0005 + (i as f64 * 0.7).sin() * 0.0001;
            let lng = base_lng + (i % side) as f64 * 0.0005 + (i as f64 * 1.3).cos() * 0.0001;
            TreeMapItem {
                id: format!("tree-{i}"),
                tree_code: format!("TR-{i:05}"),
                species: "Pterocarpus indicus".to_string(),
                common_name: Some("Narra".to_string()),
                latitude: lat,
                longitude: lng,
                address: None,
                barangay: None,
                status: if i % 7 == 0 { TreeStatus::Cut } else { TreeStatus::Alive },
                health: TreeHealth::Healthy,
            }
        })
        .collect()
}

fn viewport(min_lat: f64, min_lng: f64, span: f64) -> ViewportBounds {
    ViewportBounds::new(min_lat, min_lng, min_lat + span, min_lng + span).unwrap()
}

// ============================================================================
// Core Benchmarks
// ============================================================================

fn bench_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");

    let mut cache = ExpandedBoundsCache::new(CachePolicy::default());
    let start = viewport(15.0, 120.65, 0.02);
    if let Plan::Fetch(request) = cache.plan(&start, 17.0, MapFilters::default()) {
        cache.complete(request.seq, MapData::Trees(Arc::new(Vec::new())));
    }

    // Panning inside the expanded rectangle
    let panned = viewport(15.004, 120.654, 0.02);
    group.bench_function("cache_hit", |b| {
        b.iter(|| cache.plan(&panned, 17.0, MapFilters::default()));
    });

    // Alternating between far-apart viewports always fetches
    let far = viewport(16.0, 121.5, 0.02);
    group.bench_function("cache_miss", |b| {
        let mut toggle = false;
        b.iter(|| {
            toggle = !toggle;
            let target = if toggle { &far } else { &start };
            cache.plan(target, 17.0, MapFilters::default())
        });
    });

    group.finish();
}

fn bench_markers(c: &mut Criterion) {
    let mut group = c.benchmark_group("markers");

    for count in [100usize, 1_000] {
        let data = MapData::Trees(Arc::new(generate_trees(count, 15.0, 120.65)));
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("memo_warm", count), &data, |b, data| {
            let mut memo = MarkerMemo::new();
            memo.markers(data);
            b.iter(|| memo.markers(data));
        });

        group.bench_with_input(BenchmarkId::new("memo_cold", count), &data, |b, data| {
            b.iter(|| MarkerMemo::new().markers(data));
        });
    }

    group.finish();
}

fn bench_visible(c: &mut Criterion) {
    let mut group = c.benchmark_group("visible");

    let data = MapData::Trees(Arc::new(generate_trees(1_000, 15.0, 120.65)));
    let view = viewport(15.004, 120.654, 0.008);
    group.throughput(Throughput::Elements(1_000));
    group.bench_function("filter_1k", |b| {
        b.iter(|| visible(&data, &view));
    });

    // Hot path of a redraw: memoized markers, then the viewport filter
    let mut memo = MarkerMemo::new();
    group.bench_function("memoized_in_viewport_1k", |b| {
        b.iter(|| in_viewport(&memo.markers(&data), &view));
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(benches, bench_plan, bench_markers, bench_visible);

criterion_main!(benches);
