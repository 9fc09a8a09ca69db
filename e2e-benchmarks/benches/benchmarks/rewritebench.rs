use criterion::{black_box, criterion_group, Criterion};

use common::ra::{Predicate, RaExpr};
use common::testutil::int_db;
use common::Field;
use optimizer::Optimizer;
use queryexe::query::{ChainFolder, ExecEnv, PlanCompiler};

/// Left-deep product of `n` relations selected on a chain of equalities.
fn chain_query(n: usize) -> RaExpr {
    let mut expr = RaExpr::relation("R0");
    let mut predicate = Predicate::attr_equals("R0.b", Field::IntField(1));
    for i in 1..n {
        expr = RaExpr::cross(expr, RaExpr::relation(&format!("R{}", i)));
        let eq = Predicate::attrs_equal(&format!("R{}.a", i - 1), &format!("R{}.a", i));
        predicate = predicate.and(eq);
    }
    expr.select(predicate).project_names(&["R0.a"])
}

fn bench_optimize_and_compile(c: &mut Criterion) {
    let names: Vec<String> = (0..8).map(|i| format!("R{}", i)).collect();
    let tables: Vec<(&str, &[&str])> = names.iter().map(|n| (n.as_str(), &["a", "b"][..])).collect();
    let db = int_db(&tables);
    let query = chain_query(8);
    let optimizer = Optimizer::new(&db);
    c.bench_function("optimize_chain_8", |b| {
        b.iter(|| optimizer.optimize(black_box(&query)).expect("optimize failed"))
    });
    let optimized = optimizer.optimize(&query).expect("optimize failed");
    let compiler = PlanCompiler::new(&db, ExecEnv::Mock);
    c.bench_function("compile_and_fold_chain_8", |b| {
        b.iter(|| {
            let graph = compiler.compile(black_box(&optimized)).expect("compile failed");
            ChainFolder::fold(&graph).expect("fold failed")
        })
    });
}

criterion_group! {
    name = rewritebench;
    config = Criterion::default().sample_size(20);
    targets = bench_optimize_and_compile,
}
