// Bench code uses unwrap for clarity
#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Reparenting cost under each reverse-index policy.
//!
//! A wide tree of packages is linearized, then the root's parent list is
//! changed and everything is linearized again. `Incremental` pays on every
//! parent-list write; `Lazy` pays on every invalidation.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use opal_runtime::{InterningMode, ReverseIndexPolicy, Runtime, RuntimeResult, Sv};

/// `Root` with `width` children, each with `width` grandchildren.
fn tree(policy: ReverseIndexPolicy, width: usize) -> (Runtime, Vec<String>) {
    let mut rt = Runtime::builder()
        .interning(InterningMode::InstanceLocal)
        .reverse_index(policy)
        .build();
    let mut leaves = Vec::new();
    for i in 0..width {
        let child = format!("Child{i}");
        rt.set_parents(&child, &["Root"]).unwrap();
        for j in 0..width {
            let leaf = format!("Leaf{i}_{j}");
            rt.set_parents(&leaf, &[child.as_str()]).unwrap();
            leaves.push(leaf);
        }
    }
    (rt, leaves)
}

fn bench_reparent_root(c: &mut Criterion) {
    let mut group = c.benchmark_group("mro/reparent_root");
    for policy in [ReverseIndexPolicy::Incremental, ReverseIndexPolicy::Lazy] {
        for width in [4usize, 16, 32] {
            let (mut rt, leaves) = tree(policy, width);
            let id = BenchmarkId::new(format!("{policy:?}"), width);
            let mut flip = false;
            group.bench_function(id, |b| {
                b.iter(|| {
                    flip = !flip;
                    let base = if flip { "Base" } else { "Other" };
                    black_box(rt.set_parents("Root", &[base]).unwrap());
                    for leaf in &leaves {
                        black_box(rt.linearize(leaf).unwrap());
                    }
                });
            });
        }
    }
    group.finish();
}

fn bench_build_hierarchy(c: &mut Criterion) {
    let mut group = c.benchmark_group("mro/build");
    for policy in [ReverseIndexPolicy::Incremental, ReverseIndexPolicy::Lazy] {
        group.bench_function(format!("{policy:?}"), |b| {
            b.iter(|| black_box(tree(policy, 16)));
        });
    }
    group.finish();
}

fn noop(_args: &[Sv]) -> RuntimeResult<Sv> {
    Ok(Sv::undef())
}

fn bench_cached_dispatch(c: &mut Criterion) {
    let (mut rt, leaves) = tree(ReverseIndexPolicy::Incremental, 8);
    rt.define_native("Root", "method", noop).unwrap();

    c.bench_function("mro/cached_dispatch", |b| {
        b.iter(|| {
            for leaf in &leaves {
                black_box(rt.resolve_method(leaf, "method").unwrap());
            }
        });
    });
}

criterion_group!(
    benches,
    bench_reparent_root,
    bench_build_hierarchy,
    bench_cached_dispatch,
);
criterion_main!(benches);
