//! Benchmark: invisible codec throughput.
//!
//! Run with: `cargo bench -p keylens-core --bench codec_bench`
//!
//! The observer calls `has_marker` on every candidate node and `unwrap` on
//! every marked one, so both paths sit on the mutation hot loop.

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use keylens_core::{InvisibleWrapper, KeyDescriptor};

fn sample_page(wrapper: &mut InvisibleWrapper, items: usize) -> Vec<String> {
    (0..items)
        .map(|i| {
            let key = KeyDescriptor::new(format!("page.section.item_{i}")).with_namespace("common");
            wrapper.wrap_keys(&format!("Item number {i} of the list"), &[key])
        })
        .collect()
}

fn bench_codec(c: &mut Criterion) {
    let plain: Vec<String> = (0..256).map(|i| format!("Plain paragraph {i}")).collect();

    let mut full = InvisibleWrapper::new(true);
    let full_page = sample_page(&mut full, 256);
    let mut opaque = InvisibleWrapper::new(false);
    let opaque_page = sample_page(&mut opaque, 256);

    c.bench_function("has_marker/plain", |b| {
        b.iter(|| {
            plain
                .iter()
                .filter(|t| InvisibleWrapper::has_marker(black_box(t)))
                .count()
        });
    });

    c.bench_function("unwrap/full_key", |b| {
        b.iter(|| {
            full_page
                .iter()
                .filter_map(|t| full.unwrap(black_box(t)))
                .count()
        });
    });

    c.bench_function("unwrap/opaque", |b| {
        b.iter(|| {
            opaque_page
                .iter()
                .filter_map(|t| opaque.unwrap(black_box(t)))
                .count()
        });
    });
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
