use common::catalog::Catalog;
use common::database::Database;
use common::testutil::{create_tuple_list, gen_random_int_rows};
use queryexe::query::{
    write_table, CompiledQuery, Conductor, ConductorConfig, ExecEnv, MemoryStorage, Storage,
};

use criterion::{black_box, Criterion};
use std::sync::Arc;

/// Catalog, in-memory data and queries of one benchmark.
pub struct Template {
    pub catalog: Database,
    pub storage: Arc<MemoryStorage>,
    /// Relation name, row count and max value of the random integer data.
    pub setup: Vec<(String, usize, i64)>,
    pub queries: Vec<String>,
}

impl Template {
    pub fn new(catalog: Database) -> Self {
        Template {
            catalog,
            storage: Arc::new(MemoryStorage::new()),
            setup: Vec::new(),
            queries: Vec::new(),
        }
    }

    pub fn add_query(&mut self, sql: &str) {
        self.queries.push(sql.to_string());
    }

    pub fn run_setup(&self) {
        for (name, rows, max) in &self.setup {
            let table = self.catalog.get_table(name).expect("unknown bench table");
            let width = table.columns.len();
            let tuples = create_tuple_list(gen_random_int_rows(*rows, width, *max));
            write_table(self.storage.as_ref(), table, &tuples).expect("setup failed");
        }
    }

    pub fn compile(&self, conductor: &Conductor) -> Vec<CompiledQuery> {
        self.queries
            .iter()
            .map(|q| conductor.plan_sql(q, &self.catalog).expect("bad bench query"))
            .collect()
    }

    pub fn run_commands(&self, conductor: &Conductor, queries: &[CompiledQuery]) {
        for query in queries {
            let storage: Arc<dyn Storage> = self.storage.clone();
            black_box(conductor.run(query, storage).expect("query failed"));
        }
    }
}

pub trait BenchTemplate {
    fn bench_queries(&mut self, c: &mut Criterion, name: &str);
}

impl BenchTemplate for Template {
    /// Benchmarks the queries with and without chain folding.
    fn bench_queries(&mut self, c: &mut Criterion, name: &str) {
        self.run_setup();
        for fold in &[false, true] {
            let conductor = Conductor::new(ConductorConfig {
                env: ExecEnv::Mock,
                fold: *fold,
                ..ConductorConfig::default()
            });
            let queries = self.compile(&conductor);
            let id = format!("{}_{}", name, if *fold { "folded" } else { "unfolded" });
            c.bench_function(&id, |b| b.iter(|| self.run_commands(&conductor, &queries)));
        }
    }
}
