use common::ids::TaskId;
use common::ra::{ComparisonOp, Operand, Predicate};
use common::{Field, RamrError, TableSchema, Tuple};
use std::fmt;
use std::str::FromStr;

/// Where a task graph is meant to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecEnv {
    /// Files in a local data directory.
    Local,
    /// Directories on a distributed filesystem. Compiled, never executed here.
    Distributed,
    /// In-memory files.
    Mock,
}

impl ExecEnv {
    /// Location name of the output of task `id`.
    ///
    /// Tasks are numbered in emission order, leaves first: `tmp1` belongs to
    /// the first task emitted and the root task writes the highest number.
    pub fn intermediate_path(&self, id: TaskId) -> String {
        match self {
            ExecEnv::Distributed => format!("tmp{}", id.step()),
            ExecEnv::Local | ExecEnv::Mock => format!("tmp{}.tmp", id.step()),
        }
    }
}

impl FromStr for ExecEnv {
    type Err = RamrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match &s.to_lowercase()[..] {
            "local" => Ok(ExecEnv::Local),
            "distributed" | "hdfs" => Ok(ExecEnv::Distributed),
            "mock" => Ok(ExecEnv::Mock),
            other => Err(RamrError::ValidationError(format!(
                "Unknown execution environment {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ExecEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecEnv::Local => "local",
            ExecEnv::Distributed => "distributed",
            ExecEnv::Mock => "mock",
        };
        write!(f, "{}", name)
    }
}

/// A named record set read or written by a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Location {
    /// Stored base relation.
    Base { relation: String, path: String },
    /// Output of an earlier task.
    Intermediate { task: TaskId, path: String },
}

impl Location {
    pub fn path(&self) -> &str {
        match self {
            Location::Base { path, .. } | Location::Intermediate { path, .. } => path,
        }
    }

    /// Task producing this location, if any.
    pub fn producer(&self) -> Option<TaskId> {
        match self {
            Location::Base { .. } => None,
            Location::Intermediate { task, .. } => Some(*task),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

/// Operand with attributes replaced by column indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BoundOperand {
    Column(usize),
    Literal(Field),
}

impl BoundOperand {
    fn bind(operand: &Operand, schema: &TableSchema) -> Result<Self, RamrError> {
        match operand {
            Operand::Attr(a) => Ok(BoundOperand::Column(schema.index_of(a)?)),
            Operand::Literal(v) => Ok(BoundOperand::Literal(v.clone())),
        }
    }

    fn value<'t>(&'t self, tuple: &'t Tuple) -> Option<&'t Field> {
        match self {
            BoundOperand::Column(i) => tuple.get_field(*i),
            BoundOperand::Literal(v) => Some(v),
        }
    }
}

/// Predicate bound to the column positions of one schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BoundPredicate {
    Equality(BoundOperand, BoundOperand),
    Comparison(BoundOperand, ComparisonOp, BoundOperand),
    Conjunction(Vec<BoundPredicate>),
}

impl BoundPredicate {
    /// Resolves every attribute of `predicate` in `schema`.
    pub fn bind(predicate: &Predicate, schema: &TableSchema) -> Result<Self, RamrError> {
        match predicate {
            Predicate::Equality(l, r) => Ok(BoundPredicate::Equality(
                BoundOperand::bind(l, schema)?,
                BoundOperand::bind(r, schema)?,
            )),
            Predicate::Comparison(l, op, r) => Ok(BoundPredicate::Comparison(
                BoundOperand::bind(l, schema)?,
                *op,
                BoundOperand::bind(r, schema)?,
            )),
            Predicate::Conjunction(ps) => Ok(BoundPredicate::Conjunction(
                ps.iter()
                    .map(|p| BoundPredicate::bind(p, schema))
                    .collect::<Result<_, _>>()?,
            )),
        }
    }

    /// Values of incomparable types never satisfy a predicate.
    pub fn evaluate(&self, tuple: &Tuple) -> bool {
        match self {
            BoundPredicate::Equality(l, r) => match (l.value(tuple), r.value(tuple)) {
                (Some(a), Some(b)) => a.matches(b),
                _ => false,
            },
            BoundPredicate::Comparison(l, op, r) => match (l.value(tuple), r.value(tuple)) {
                (Some(a), Some(b)) => a.compare(b).map_or(false, |o| op.accepts(o)),
                _ => false,
            },
            BoundPredicate::Conjunction(ps) => ps.iter().all(|p| p.evaluate(tuple)),
        }
    }
}

/// One record-at-a-time step of a map-only task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MapStep {
    Filter {
        predicate: Predicate,
        bound: BoundPredicate,
    },
    Project {
        columns: Vec<usize>,
    },
    /// Changes only the labels of the output records.
    Rename {
        relation: String,
    },
}

impl MapStep {
    /// Applies the step to one record; `None` drops it.
    pub fn apply(&self, tuple: Tuple) -> Option<Tuple> {
        match self {
            MapStep::Filter { bound, .. } => {
                if bound.evaluate(&tuple) {
                    Some(tuple)
                } else {
                    None
                }
            }
            MapStep::Project { columns } => Some(tuple.project(columns)),
            MapStep::Rename { .. } => Some(tuple),
        }
    }
}

impl fmt::Display for MapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapStep::Filter { predicate, .. } => write!(f, "filter[{}]", predicate),
            MapStep::Project { columns } => write!(f, "project{:?}", columns),
            MapStep::Rename { relation } => write!(f, "rename[{}]", relation),
        }
    }
}

/// Map phase of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MapSpec {
    /// Steps applied in order to every record of the single input.
    Pipeline(Vec<MapStep>),
    /// Tags records with their input side and extracts the partition key.
    /// Empty keys put every record in one constant partition.
    TagSides {
        left_key: Vec<usize>,
        right_key: Vec<usize>,
    },
}

/// Reduce phase of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReduceSpec {
    CrossProduct,
    EquiJoin,
}

/// One batch job of the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub inputs: Vec<Location>,
    /// Schema of each input, used to decode its records.
    pub input_schemas: Vec<TableSchema>,
    pub map: MapSpec,
    pub reduce: Option<ReduceSpec>,
    pub output: Location,
    /// Schema of the output records.
    pub schema: TableSchema,
}

impl Task {
    /// Tasks without a reduce phase.
    pub fn is_map_only(&self) -> bool {
        self.reduce.is_none()
    }

    /// Pipeline steps of a map-only task.
    pub fn steps(&self) -> &[MapStep] {
        match &self.map {
            MapSpec::Pipeline(steps) => steps,
            MapSpec::TagSides { .. } => &[],
        }
    }

    pub fn dependencies(&self) -> Vec<TaskId> {
        self.inputs.iter().filter_map(|l| l.producer()).collect()
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inputs: Vec<&str> = self.inputs.iter().map(|l| l.path()).collect();
        let phase = match (&self.map, self.reduce) {
            (MapSpec::Pipeline(steps), _) => {
                let steps: Vec<String> = steps.iter().map(|s| s.to_string()).collect();
                format!("map {}", steps.join(" -> "))
            }
            (MapSpec::TagSides { .. }, Some(ReduceSpec::CrossProduct)) => {
                String::from("map tag-sides, reduce cross-product")
            }
            (MapSpec::TagSides { left_key, right_key }, _) => format!(
                "map tag-sides {:?}/{:?}, reduce equi-join",
                left_key, right_key
            ),
        };
        write!(
            f,
            "{}: {} <- [{}] -> {}",
            self.id,
            phase,
            inputs.join(", "),
            self.output
        )
    }
}

/// Compiled DAG of tasks. Tasks are stored in emission order and each task
/// only reads base relations or outputs of tasks with smaller ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskGraph {
    pub env: ExecEnv,
    pub tasks: Vec<Task>,
    /// Location holding the final result.
    pub output: Location,
    pub output_schema: TableSchema,
}

impl TaskGraph {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id.id())
    }

    /// Tasks whose outputs `id` reads.
    pub fn dependencies(&self, id: TaskId) -> Vec<TaskId> {
        self.task(id).map(|t| t.dependencies()).unwrap_or_default()
    }

    /// Tasks reading the output of `id`, once per read.
    pub fn consumers(&self, id: TaskId) -> Vec<TaskId> {
        self.tasks
            .iter()
            .flat_map(|t| {
                t.inputs
                    .iter()
                    .filter(move |l| l.producer() == Some(id))
                    .map(move |_| t.id)
            })
            .collect()
    }

    /// Checks ids, edge direction and location names.
    pub fn validate_topology(&self) -> Result<(), RamrError> {
        for (i, task) in self.tasks.iter().enumerate() {
            if task.id.id() != i {
                return Err(RamrError::ExecutionError(format!(
                    "{} stored at position {}",
                    task.id, i
                )));
            }
            if task.inputs.len() != task.input_schemas.len() {
                return Err(RamrError::ExecutionError(format!(
                    "{} has {} inputs but {} input schemas",
                    task.id,
                    task.inputs.len(),
                    task.input_schemas.len()
                )));
            }
            if task.output.producer() != Some(task.id) {
                return Err(RamrError::ExecutionError(format!(
                    "{} writes to {}",
                    task.id, task.output
                )));
            }
            for input in &task.inputs {
                if let Some(producer) = input.producer() {
                    let upstream = self.task(producer).filter(|_| producer < task.id);
                    match upstream {
                        Some(p) if p.output == *input => {}
                        _ => {
                            return Err(RamrError::ExecutionError(format!(
                                "{} reads {} which no earlier task produces",
                                task.id, input
                            )))
                        }
                    }
                }
            }
        }
        match (self.output.producer(), self.tasks.last()) {
            (None, None) => Ok(()),
            (Some(id), Some(last)) if id == last.id && last.output == self.output => Ok(()),
            _ => Err(RamrError::ExecutionError(format!(
                "Graph output {} is not the last task's output",
                self.output
            ))),
        }
    }

    /// Groups tasks into waves; no task depends on a task of its own or a
    /// later wave.
    pub fn stages(&self) -> Vec<Vec<TaskId>> {
        let mut level = vec![0usize; self.tasks.len()];
        let mut stages: Vec<Vec<TaskId>> = Vec::new();
        for task in &self.tasks {
            let l = task
                .dependencies()
                .iter()
                .filter_map(|d| level.get(d.id()).map(|x| x + 1))
                .max()
                .unwrap_or(0);
            level[task.id.id()] = l;
            if stages.len() <= l {
                stages.resize_with(l + 1, Vec::new);
            }
            stages[l].push(task.id);
        }
        stages
    }

    /// Output locations of every task.
    pub fn intermediate_locations(&self) -> Vec<&Location> {
        self.tasks.iter().map(|t| &t.output).collect()
    }

    pub fn to_json(&self) -> Result<String, RamrError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for TaskGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "env: {}", self.env)?;
        for task in &self.tasks {
            writeln!(f, "{}", task)?;
        }
        write!(f, "output: {}", self.output)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::testutil::*;

    #[test]
    fn test_env_parse_and_paths() {
        assert_eq!(Ok(ExecEnv::Distributed), "HDFS".parse::<ExecEnv>());
        assert_eq!(Ok(ExecEnv::Mock), "mock".parse::<ExecEnv>());
        assert!("cluster".parse::<ExecEnv>().is_err());
        assert_eq!("tmp1.tmp", ExecEnv::Local.intermediate_path(TaskId::new(0)));
        assert_eq!("tmp3", ExecEnv::Distributed.intermediate_path(TaskId::new(2)));
    }

    #[test]
    fn test_bound_predicate_evaluate() {
        let db = int_db(&[("R", &["a", "b"])]);
        let schema = common::catalog::Catalog::get_table_schema(&db, "R").unwrap();
        let pred = Predicate::attrs_equal("R.a", "b").and(Predicate::Comparison(
            Operand::attr("a"),
            ComparisonOp::GreaterThan,
            Operand::Literal(Field::FloatField(1.5)),
        ));
        let bound = BoundPredicate::bind(&pred, &schema).unwrap();
        assert!(bound.evaluate(&int_vec_to_tuple(vec![2, 2])));
        assert!(!bound.evaluate(&int_vec_to_tuple(vec![1, 1])));
        assert!(!bound.evaluate(&int_vec_to_tuple(vec![3, 2])));
        let string_eq = BoundPredicate::Equality(
            BoundOperand::Column(0),
            BoundOperand::Literal(Field::StringField(String::from("2"))),
        );
        assert!(!string_eq.evaluate(&int_vec_to_tuple(vec![2, 2])));
    }

    #[test]
    fn test_bind_unknown() {
        let db = int_db(&[("R", &["a"])]);
        let schema = common::catalog::Catalog::get_table_schema(&db, "R").unwrap();
        assert_eq!(
            Err(RamrError::UnknownAttribute(String::from("R.z"))),
            BoundPredicate::bind(&Predicate::attrs_equal("R.a", "R.z"), &schema)
        );
    }
}
