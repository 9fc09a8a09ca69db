use super::storage::{decode_record, encode_record, Storage};
use super::task::*;
use common::{RamrError, TableSchema, Tuple};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

/// Runs task graphs against a local or in-memory storage.
pub struct Executor {
    storage: Arc<dyn Storage>,
}

impl Executor {
    /// Initializes an executor.
    ///
    /// # Arguments
    ///
    /// * `storage` - Storage holding the base relations; task outputs are written there too.
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Runs every task of `graph` stage by stage and returns the lines of
    /// the final output.
    ///
    /// Tasks of the same stage run on their own threads. The first failing
    /// task aborts the run after its stage completes.
    pub fn run(&self, graph: &TaskGraph) -> Result<Vec<String>, RamrError> {
        if graph.env == ExecEnv::Distributed {
            return Err(RamrError::ExecutionError(String::from(
                "Distributed task graphs cannot be run locally",
            )));
        }
        graph.validate_topology()?;
        for (n, stage) in graph.stages().iter().enumerate() {
            debug!("Running stage {} with {} tasks", n, stage.len());
            let tasks: Vec<&Task> = stage.iter().filter_map(|id| graph.task(*id)).collect();
            let results: Vec<Result<(), RamrError>> = thread::scope(|s| {
                let handles: Vec<_> = tasks
                    .iter()
                    .map(|task| s.spawn(move || self.run_task(task)))
                    .collect();
                handles
                    .into_iter()
                    .map(|h| {
                        h.join().unwrap_or_else(|_| {
                            Err(RamrError::ExecutionError(String::from("Task panicked")))
                        })
                    })
                    .collect()
            });
            for result in results {
                result?;
            }
        }
        let output = self.storage.read_lines(graph.output.path())?;
        info!("Query produced {} records", output.len());
        Ok(output)
    }

    /// Decodes output lines of `graph` into tuples.
    pub fn decode_output(graph: &TaskGraph, lines: &[String]) -> Result<Vec<Tuple>, RamrError> {
        lines
            .iter()
            .map(|l| decode_record(l, &graph.output_schema))
            .collect()
    }

    fn read_records(&self, location: &Location, schema: &TableSchema) -> Result<Vec<Tuple>, RamrError> {
        self.storage
            .read_lines(location.path())?
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| decode_record(l, schema))
            .collect()
    }

    fn run_task(&self, task: &Task) -> Result<(), RamrError> {
        let mut inputs = Vec::with_capacity(task.inputs.len());
        for (location, schema) in task.inputs.iter().zip(&task.input_schemas) {
            inputs.push(self.read_records(location, schema)?);
        }
        let records = match (&task.map, task.reduce, inputs.len()) {
            (MapSpec::Pipeline(steps), None, 1) => {
                let input = inputs.pop().unwrap_or_default();
                run_pipeline(steps, input)
            }
            (
                MapSpec::TagSides {
                    left_key,
                    right_key,
                },
                Some(_),
                2,
            ) => {
                let right = inputs.pop().unwrap_or_default();
                let left = inputs.pop().unwrap_or_default();
                pair_partitions(left, left_key, right, right_key)
            }
            _ => {
                return Err(RamrError::ExecutionError(format!(
                    "Malformed task {}",
                    task
                )))
            }
        };
        let lines = records
            .iter()
            .map(|t| encode_record(t, &task.schema))
            .collect::<Result<Vec<_>, _>>()?;
        self.storage.write_lines(task.output.path(), &lines)?;
        debug!("{} wrote {} records to {}", task.id, lines.len(), task.output);
        Ok(())
    }
}

fn run_pipeline(steps: &[MapStep], input: Vec<Tuple>) -> Vec<Tuple> {
    input
        .into_iter()
        .filter_map(|tuple| steps.iter().try_fold(tuple, |t, step| step.apply(t)))
        .collect()
}

fn partition_key(tuple: &Tuple, key: &[usize]) -> String {
    let parts: Vec<String> = key
        .iter()
        .map(|i| tuple.get_field(*i).map_or_else(String::new, |f| f.key()))
        .collect();
    parts.join("\u{1f}")
}

/// Groups both sides by key and emits every left/right pair of a group.
///
/// Groups are visited in key order; inside a group the input order of
/// each side is kept.
fn pair_partitions(
    left: Vec<Tuple>,
    left_key: &[usize],
    right: Vec<Tuple>,
    right_key: &[usize],
) -> Vec<Tuple> {
    let mut partitions: BTreeMap<String, (Vec<Tuple>, Vec<Tuple>)> = BTreeMap::new();
    for tuple in left {
        let key = partition_key(&tuple, left_key);
        partitions.entry(key).or_default().0.push(tuple);
    }
    for tuple in right {
        let key = partition_key(&tuple, right_key);
        partitions.entry(key).or_default().1.push(tuple);
    }
    let mut output = Vec::new();
    for (_, (ls, rs)) in partitions {
        for l in &ls {
            for r in &rs {
                output.push(l.merge(r));
            }
        }
    }
    output
}
