//! Benchmarks for the decision hot path.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sj_core::{decompose, Address, Policy, PolicyStore, RequestType};
use std::hint::black_box;

/// Store with `count` site rules and as many global list entries
fn populated_store(count: usize) -> PolicyStore {
    let mut store = PolicyStore::default();
    for i in 0..count {
        let site = format!("site{}.com", i);
        let policy = Policy::ALL[i % Policy::ALL.len()];
        store.set_policy(&[&site], Some(policy), false).unwrap();
        let origin = format!("tracker{}.net", i);
        store
            .set_script_rule(&[&site], &[&origin], Some(i % 2 == 0), false)
            .unwrap();
        store.set_script_rule(&[], &[&origin, "cdn"], Some(true), false).unwrap();
    }
    store
}

fn targets() -> Vec<Address> {
    [
        "https://www.site1.com/app.js",
        "https://cdn.tracker1.net/t.js",
        "https://ajax.googleapis.com/jquery.js",
        "https://static.xx.fbcdn.net/rsrc.js",
        "https://unrelated.example.org/x.js",
    ]
    .iter()
    .map(|url| decompose(url).unwrap())
    .collect()
}

fn bench_decide(c: &mut Criterion) {
    let mut group = c.benchmark_group("decide");
    let targets = targets();

    for size in [10, 1000, 10000] {
        let store = populated_store(size);
        let page = decompose("https://www.site1.com/index.html").unwrap();
        let ctx = store.context(&page, false);

        group.bench_with_input(BenchmarkId::new("in_context", size), &targets, |b, targets| {
            b.iter(|| {
                for target in targets {
                    black_box(store.decide_in(&ctx, target, RequestType::SCRIPT));
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("resolve_and_decide", size), &targets, |b, targets| {
            b.iter(|| {
                for target in targets {
                    black_box(store.decide(&page, target, false, RequestType::SCRIPT));
                }
            });
        });
    }

    group.finish();
}

fn bench_decompose(c: &mut Criterion) {
    c.bench_function("decompose", |b| {
        b.iter(|| black_box(decompose(black_box("https://static.cdn.example.co.uk/js/a.js?x=1"))))
    });
}

criterion_group!(benches, bench_decide, bench_decompose);
criterion_main!(benches);
