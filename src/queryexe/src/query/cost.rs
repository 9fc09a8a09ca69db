use super::storage::Storage;
use super::task::TaskGraph;
use common::RamrError;
use std::fmt;
use std::sync::Arc;

/// Bytes materialized by the tasks of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    /// Output location and size of each task, in task order.
    pub per_location: Vec<(String, u64)>,
    pub total: u64,
}

impl fmt::Display for CostReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (location, bytes) in &self.per_location {
            writeln!(f, "{:<16}{:>12}", location, bytes)?;
        }
        write!(f, "{:<16}{:>12}", "total", self.total)
    }
}

/// Estimates the I/O cost of an executed graph from the sizes of its
/// task outputs. Base relations are not counted.
pub struct CostCounter {
    storage: Arc<dyn Storage>,
}

impl CostCounter {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Sums the byte sizes of every task output of `graph`.
    ///
    /// Fails if an output has not been written.
    pub fn count(&self, graph: &TaskGraph) -> Result<CostReport, RamrError> {
        let mut per_location = Vec::with_capacity(graph.len());
        for location in graph.intermediate_locations() {
            let bytes = self.storage.byte_size(location.path())?;
            per_location.push((location.path().to_string(), bytes));
        }
        let total: u64 = per_location.iter().map(|(_, b)| b).sum();
        debug!("Graph materialized {} bytes", total);
        Ok(CostReport {
            per_location,
            total,
        })
    }
}

#[cfg(test)]
mod test {
    use super::super::storage::{write_table, MemoryStorage};
    use super::super::{ChainFolder, ExecEnv, Executor, PlanCompiler};
    use super::*;
    use common::catalog::Catalog;
    use common::ra::{Predicate, RaExpr};
    use common::testutil::*;
    use common::Field;

    #[test]
    fn test_count_and_fold_savings() {
        init();
        let db = int_db(&[("R", &["a", "b"])]);
        let storage = Arc::new(MemoryStorage::new());
        let rows = create_tuple_list(vec![vec![1, 2], vec![1, 3], vec![2, 2]]);
        write_table(storage.as_ref(), db.get_table("R").unwrap(), &rows).unwrap();
        let expr = RaExpr::relation("R")
            .select(Predicate::attr_equals("R.a", Field::IntField(1)))
            .project_names(&["R.b"]);
        let graph = PlanCompiler::new(&db, ExecEnv::Mock).compile(&expr).unwrap();
        let counter = CostCounter::new(storage.clone());
        assert!(counter.count(&graph).is_err());

        let lines = Executor::new(storage.clone()).run(&graph).unwrap();
        let report = counter.count(&graph).unwrap();
        assert_eq!(2, report.per_location.len());
        assert_eq!("tmp1.tmp", report.per_location[0].0);
        let last: u64 = lines.iter().map(|l| l.len() as u64 + 1).sum();
        assert_eq!(last, report.per_location[1].1);
        assert_eq!(report.per_location[0].1 + last, report.total);

        let folded = ChainFolder::fold(&graph).unwrap();
        Executor::new(storage.clone()).run(&folded).unwrap();
        let folded_report = counter.count(&folded).unwrap();
        assert_eq!(vec![(String::from("tmp1.tmp"), last)], folded_report.per_location);
        assert!(folded_report.total < report.total);
    }
}
