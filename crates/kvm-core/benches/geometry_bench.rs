//! Criterion benchmarks for [`edge_at`] — the screen-geometry hot path.
//!
//! # Purpose
//!
//! `edge_at(x, y, threshold)` runs on every observed mouse-move event to
//! decide whether the cursor is near a screen edge and should trigger a
//! control transition. Its latency directly contributes to the
//! user-perceived responsiveness of an edge crossing.
//!
//! # How to run
//!
//! ```bash
//! cargo bench --package kvm-core --bench geometry_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kvm_core::domain::geometry::{edge_at, Rect};

fn bench_edge_at_interior(c: &mut Criterion) {
    let rect = Rect::new(1920, 1080);
    c.bench_function("edge_at/interior_no_hit", |b| {
        b.iter(|| edge_at(&rect, black_box(960), black_box(540), black_box(2)))
    });
}

fn bench_edge_at_left_edge(c: &mut Criterion) {
    let rect = Rect::new(1920, 1080);
    c.bench_function("edge_at/left_edge_hit", |b| {
        b.iter(|| edge_at(&rect, black_box(0), black_box(540), black_box(2)))
    });
}

fn bench_edge_at_corner(c: &mut Criterion) {
    let rect = Rect::new(1920, 1080);
    c.bench_function("edge_at/corner_hit", |b| {
        b.iter(|| edge_at(&rect, black_box(0), black_box(0), black_box(2)))
    });
}

criterion_group!(
    benches,
    bench_edge_at_interior,
    bench_edge_at_left_edge,
    bench_edge_at_corner,
);
criterion_main!(benches);
