use criterion::{criterion_group, Criterion};

use crate::benchmarks::benchtemplate::{BenchTemplate, Template};
use common::testutil::int_db;

fn join_template(rows_a: usize, rows_b: usize, max: i64) -> Template {
    let mut bt = Template::new(int_db(&[("testA", &["a", "b"]), ("testB", &["a", "b"])]));
    bt.setup.push((String::from("testA"), rows_a, max));
    bt.setup.push((String::from("testB"), rows_b, max));
    bt
}

fn bench_join_tiny(c: &mut Criterion) {
    let mut bt = join_template(10, 10, 5);
    bt.add_query("select * from testA join testB on testA.a = testB.a");
    bt.bench_queries(c, "join_tiny");
}

fn bench_join_small(c: &mut Criterion) {
    let mut bt = join_template(1000, 1000, 500);
    bt.add_query("select * from testA join testB on testA.a = testB.a");
    bt.bench_queries(c, "join_small");
}

fn bench_join_left(c: &mut Criterion) {
    let mut bt = join_template(5000, 100, 100);
    bt.add_query("select * from testA join testB on testA.a = testB.a");
    bt.bench_queries(c, "join_left");
}

fn bench_join_filtered(c: &mut Criterion) {
    let mut bt = join_template(2000, 2000, 200);
    bt.add_query(
        "select testA.b, testB.b from testA, testB \
         where testA.a = testB.a and testA.b = 3 and testB.b < 100",
    );
    bt.bench_queries(c, "join_filtered");
}

criterion_group! {
    name = joinbench;
    config = Criterion::default().sample_size(10);
    targets =
    bench_join_tiny,
    bench_join_small,
    bench_join_left,
    bench_join_filtered,
}
