//! Query Operations Benchmarks
//!
//! Benchmarks for locator validation, mock selector evaluation, and the
//! immediate-success path of auto-waiting queries.
//!
//! Run with: `cargo bench --bench query_ops`

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use esperar::mock::{MockBackend, NodeSpec};
use esperar::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn table(rows: usize) -> Arc<MockBackend> {
    let mock = Arc::new(MockBackend::new());
    mock.edit(|dom| {
        let body = dom.body();
        let list = dom.append(body, NodeSpec::new("ul").id("list"));
        for i in 0..rows {
            let row = dom.append(
                list,
                NodeSpec::new("li")
                    .class("row")
                    .attr("data-index", &i.to_string()),
            );
            dom.append(row, NodeSpec::new("span").text(&format!("Row {i}")));
        }
    });
    mock
}

fn bench_locator_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("locator_validation");

    let locators = vec![
        ("css", Locator::css("#list > li.row")),
        ("xpath", Locator::xpath("//ul[@id='list']/li[2]")),
        ("text", Locator::text("Row 7")),
    ];

    for (name, locator) in locators {
        group.bench_with_input(BenchmarkId::from_parameter(name), &locator, |bench, loc| {
            bench.iter(|| {
                black_box(loc).validate().unwrap();
                black_box(loc.to_xpath());
            });
        });
    }

    group.finish();
}

fn bench_find_many(c: &mut Criterion) {
    let mut group = c.benchmark_group("mock_find_many");

    for rows in [10usize, 100, 1000] {
        let mock = table(rows);
        group.bench_with_input(
            BenchmarkId::new("css", rows),
            &mock,
            |bench, backend| {
                bench.iter(|| {
                    let found = backend
                        .find_many(None, Strategy::Css, black_box("#list > li.row"))
                        .unwrap();
                    black_box(found);
                });
            },
        );
        group.bench_with_input(
            BenchmarkId::new("xpath", rows),
            &mock,
            |bench, backend| {
                bench.iter(|| {
                    let found = backend
                        .find_many(None, Strategy::XPath, black_box("//li[@class='row']/span"))
                        .unwrap();
                    black_box(found);
                });
            },
        );
    }

    group.finish();
}

fn bench_immediate_get(c: &mut Criterion) {
    let session = Session::with_null_log(table(100), WaitConfig::new(Duration::from_secs(1)));

    c.bench_function("session_get_immediate", |bench| {
        bench.iter(|| {
            let handle = session.get(black_box("li.row")).unwrap();
            black_box(handle);
        });
    });
}

criterion_group!(
    benches,
    bench_locator_validation,
    bench_find_many,
    bench_immediate_get
);
criterion_main!(benches);
