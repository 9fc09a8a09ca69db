use super::compiler::PlanCompiler;
use super::cost::{CostCounter, CostReport};
use super::executor::Executor;
use super::fold::ChainFolder;
use super::storage::Storage;
use super::task::{ExecEnv, TaskGraph};
use super::translate_and_validate::TranslateAndValidate;
use common::catalog::Catalog;
use common::ra::RaExpr;
use common::{RamrError, TableSchema, Tuple};
use optimizer::{Optimizer, OptimizerConfig};
use std::fmt;
use std::sync::Arc;

/// Settings of the query pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConductorConfig {
    pub env: ExecEnv,
    /// Run the rewrite rules before compiling.
    pub optimize: bool,
    /// Fuse chains of map-only tasks after compiling.
    pub fold: bool,
    pub max_passes: usize,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        ConductorConfig {
            env: ExecEnv::Local,
            optimize: true,
            fold: true,
            max_passes: OptimizerConfig::default().max_passes,
        }
    }
}

/// Every representation a query goes through before execution.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub ra: RaExpr,
    pub optimized: RaExpr,
    pub graph: TaskGraph,
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ra: {}", self.ra)?;
        writeln!(f, "optimized: {}", self.optimized)?;
        write!(f, "{}", self.graph)
    }
}

/// Output of an executed query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub schema: TableSchema,
    pub rows: Vec<Tuple>,
    /// Output records as stored.
    pub lines: Vec<String>,
    pub cost: CostReport,
}

impl QueryResult {
    /// Formats the rows as a table with one column per attribute.
    pub fn render(&self) -> String {
        let names = self.schema.qualified_names();
        // TODO: size columns by their widest value, not only the header.
        let width = names.iter().map(|n| n.len()).max().unwrap_or(10) + 2;
        let mut res = String::new();
        for name in &names {
            res += &format!("{:width$}", name, width = width);
        }
        res += "\n";
        for t in &self.rows {
            for f in t.field_vals() {
                res += &format!("{:width$}", f.to_string(), width = width);
            }
            res += "\n";
        }
        res
    }
}

/// Drives a query from SQL text to its output.
pub struct Conductor {
    pub config: ConductorConfig,
}

impl Conductor {
    pub fn new(config: ConductorConfig) -> Self {
        Conductor { config }
    }

    /// Parses and validates one SELECT statement.
    pub fn translate<T: Catalog + ?Sized>(&self, sql: &str, catalog: &T) -> Result<RaExpr, RamrError> {
        debug!("Obtaining RA from query");
        TranslateAndValidate::from_sql(sql, catalog)
    }

    /// Optimizes and compiles an RA expression.
    pub fn plan<T: Catalog + ?Sized>(&self, ra: &RaExpr, catalog: &T) -> Result<CompiledQuery, RamrError> {
        let optimized = if self.config.optimize {
            debug!("Optimizing {}", ra);
            let config = OptimizerConfig {
                max_passes: self.config.max_passes,
            };
            Optimizer::with_config(catalog, config).optimize(ra)?
        } else {
            ra.clone()
        };
        let mut graph = PlanCompiler::new(catalog, self.config.env).compile(&optimized)?;
        if self.config.fold {
            graph = ChainFolder::fold(&graph)?;
        }
        info!("Planned query into {} tasks", graph.len());
        Ok(CompiledQuery {
            ra: ra.clone(),
            optimized,
            graph,
        })
    }

    /// Translates and plans `sql`.
    pub fn plan_sql<T: Catalog + ?Sized>(&self, sql: &str, catalog: &T) -> Result<CompiledQuery, RamrError> {
        let ra = self.translate(sql, catalog)?;
        self.plan(&ra, catalog)
    }

    /// Executes a compiled query and measures the bytes it materialized.
    pub fn run(&self, query: &CompiledQuery, storage: Arc<dyn Storage>) -> Result<QueryResult, RamrError> {
        debug!("Executing query");
        let lines = Executor::new(storage.clone()).run(&query.graph)?;
        let rows = Executor::decode_output(&query.graph, &lines)?;
        let cost = CostCounter::new(storage).count(&query.graph)?;
        Ok(QueryResult {
            schema: query.graph.output_schema.clone(),
            rows,
            lines,
            cost,
        })
    }
}
