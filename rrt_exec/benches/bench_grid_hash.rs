//! # Grid Hash Benchmark

use criterion::{criterion_group, criterion_main, Criterion};

use rrt_lib::plan::{grid_hash::GridHash, Pose, Tree};

fn grid_hash_benchmark(c: &mut Criterion) {
    // ---- Build a dense tree and matching index ----

    let root = Pose::new([0.05, 0.0, 0.05]);
    let mut tree = Tree::new(root);
    let mut grid = GridHash::new(1.5, (0.0, 0.0));
    grid.insert(&root, tree.root());

    for i in 0..100 {
        for j in 0..100 {
            if i == 0 && j == 0 {
                continue;
            }
            let pose = Pose::new([i as f64 * 0.2 + 0.05, 0.0, j as f64 * 0.2 + 0.05]);
            let id = tree.insert(pose, tree.root(), Some(0.0)).unwrap();
            grid.insert(&pose, id);
        }
    }

    // ---- Benchmarks ----

    let query = Pose::new([10.07, 0.0, 9.93]);
    c.bench_function("grid_hash near", |b| b.iter(|| grid.near(&query)));

    c.bench_function("grid_hash nearest", |b| {
        b.iter(|| grid.nearest(&query, &tree))
    });

    // Nearest query far outside the populated area, forcing ring expansion
    let distant = Pose::new([80.0, 0.0, 80.0]);
    c.bench_function("grid_hash nearest distant", |b| {
        b.iter(|| grid.nearest(&distant, &tree))
    });
}

criterion_group!(benches, grid_hash_benchmark);
criterion_main!(benches);
