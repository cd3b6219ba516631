//! Criterion benchmarks for configuration trees and image launches.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use kiln_bench::wide_tree;
use kiln_core::WireletList;

/// Benchmark: build a 4-level tree with fan-out 8 (4681 nodes).
fn bench_build_tree(c: &mut Criterion) {
    c.bench_function("build_tree_8x4", |b| {
        b.iter(|| black_box(wide_tree(4, 8).unwrap().node_count()));
    });
}

/// Benchmark: freeze and compile the same tree into an image.
fn bench_compile_image(c: &mut Criterion) {
    c.bench_function("compile_image_8x4", |b| {
        b.iter_batched(
            || wide_tree(4, 8).unwrap(),
            |tree| black_box(tree.into_image().unwrap()),
            BatchSize::SmallInput,
        );
    });
}

/// Benchmark: launch an instance and resolve a path.
fn bench_launch(c: &mut Criterion) {
    let image = wide_tree(4, 8).unwrap().into_image().unwrap();
    c.bench_function("launch_8x4", |b| {
        b.iter(|| {
            let instance = image.launch(WireletList::new()).unwrap();
            black_box(
                instance
                    .find("Application/Container/Container/Container/Component")
                    .is_some(),
            );
        });
    });
}

criterion_group!(benches, bench_build_tree, bench_compile_image, bench_launch);
criterion_main!(benches);
