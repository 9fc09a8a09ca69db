use super::task::*;
use common::ids::TaskId;
use common::RamrError;

/// Fuses runs of map-only tasks into single tasks.
pub struct ChainFolder;

impl ChainFolder {
    /// Returns a graph where every map-only task whose output is read only
    /// by one map-only task is merged into that task.
    ///
    /// Producer steps run first in the merged pipeline. Tasks are
    /// renumbered and their output locations renamed; the records written
    /// to the final output are unchanged. A graph that fails
    /// `TaskGraph::validate_topology` is returned as an error.
    pub fn fold(graph: &TaskGraph) -> Result<TaskGraph, RamrError> {
        graph.validate_topology()?;
        let mut readers = vec![0usize; graph.tasks.len()];
        for task in &graph.tasks {
            for dep in task.dependencies() {
                readers[dep.id()] += 1;
            }
        }

        // Single pass in emission order: a task either joins the group of
        // its producer or opens a new group.
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut group_of = vec![0usize; graph.tasks.len()];
        for (i, task) in graph.tasks.iter().enumerate() {
            let producer = match (task.is_map_only(), task.inputs.as_slice()) {
                (true, [input]) => input.producer(),
                _ => None,
            };
            match producer {
                Some(p) if readers[p.id()] == 1 && graph.tasks[p.id()].is_map_only() => {
                    let g = group_of[p.id()];
                    groups[g].push(i);
                    group_of[i] = g;
                }
                _ => {
                    group_of[i] = groups.len();
                    groups.push(vec![i]);
                }
            }
        }

        let location_of = |old: &Location| -> Location {
            match old.producer() {
                Some(task) => {
                    let id = TaskId::new(group_of[task.id()]);
                    Location::Intermediate {
                        task: id,
                        path: graph.env.intermediate_path(id),
                    }
                }
                None => old.clone(),
            }
        };

        let tasks: Vec<Task> = groups
            .iter()
            .enumerate()
            .map(|(g, members)| {
                let first = &graph.tasks[members[0]];
                let last = &graph.tasks[members[members.len() - 1]];
                let map = if members.len() == 1 {
                    first.map.clone()
                } else {
                    MapSpec::Pipeline(
                        members
                            .iter()
                            .flat_map(|m| graph.tasks[*m].steps().iter().cloned())
                            .collect(),
                    )
                };
                let id = TaskId::new(g);
                Task {
                    id,
                    inputs: first.inputs.iter().map(|l| location_of(l)).collect(),
                    input_schemas: first.input_schemas.clone(),
                    map,
                    reduce: first.reduce,
                    output: Location::Intermediate {
                        task: id,
                        path: graph.env.intermediate_path(id),
                    },
                    schema: last.schema.clone(),
                }
            })
            .collect();

        debug!("Folded {} tasks into {}", graph.tasks.len(), tasks.len());
        Ok(TaskGraph {
            env: graph.env,
            tasks,
            output: location_of(&graph.output),
            output_schema: graph.output_schema.clone(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::query::PlanCompiler;
    use common::ra::{Predicate, RaExpr};
    use common::testutil::*;
    use common::Field;

    fn compile(expr: &RaExpr) -> TaskGraph {
        let db = int_db(&[("R", &["a", "b", "c"]), ("S", &["d", "e"])]);
        PlanCompiler::new(&db, ExecEnv::Local).compile(expr).unwrap()
    }

    #[test]
    fn test_fold_chain_into_one_task() {
        init();
        let p1 = Predicate::attr_equals("R.a", Field::IntField(1));
        let p2 = Predicate::attr_equals("R.b", Field::IntField(2));
        let expr = RaExpr::relation("R")
            .project_names(&["R.a", "R.b"])
            .select(p2)
            .select(p1);
        let graph = compile(&expr);
        let folded = ChainFolder::fold(&graph).unwrap();
        folded.validate_topology().unwrap();
        assert_eq!(1, folded.len());
        let task = &folded.tasks[0];
        assert_eq!("R.json", task.inputs[0].path());
        assert_eq!("tmp1.tmp", folded.output.path());
        let steps: Vec<String> = task.steps().iter().map(|s| s.to_string()).collect();
        assert_eq!(
            vec!["project[0, 1]", "filter[R.b = 2]", "filter[R.a = 1]"],
            steps
        );
        assert_eq!(graph.output_schema, folded.output_schema);
        assert_eq!(graph.tasks[2].schema, task.schema);
    }

    #[test]
    fn test_fold_stops_at_reduce_tasks() {
        let expr = RaExpr::join(
            Predicate::attrs_equal("R.a", "T.d"),
            RaExpr::relation("R")
                .select(Predicate::attr_equals("R.b", Field::IntField(0)))
                .project_names(&["R.a"]),
            RaExpr::relation("S").rename("T", None),
        )
        .project_names(&["R.a"])
        .rename("Out", None);
        let graph = compile(&expr);
        assert_eq!(6, graph.len());
        let folded = ChainFolder::fold(&graph).unwrap();
        folded.validate_topology().unwrap();
        // select+project, rename, join, project+rename
        assert_eq!(4, folded.len());
        assert_eq!(Some(ReduceSpec::EquiJoin), folded.tasks[2].reduce);
        assert_eq!(
            vec![TaskId::new(0), TaskId::new(1)],
            folded.dependencies(TaskId::new(2))
        );
        assert_eq!(2, folded.tasks[3].steps().len());
        assert_eq!(folded.tasks[3].output, folded.output);
        assert_eq!(
            vec![vec![TaskId::new(0), TaskId::new(1)], vec![TaskId::new(2)], vec![TaskId::new(3)]],
            folded.stages()
        );
    }

    #[test]
    fn test_shared_producer_is_not_folded() {
        let db = int_db(&[("R", &["a"])]);
        let left = RaExpr::relation("R").select(Predicate::attr_equals("R.a", Field::IntField(1)));
        let graph = PlanCompiler::new(&db, ExecEnv::Mock)
            .compile(&left)
            .unwrap();
        let mut shared = graph.clone();
        // Two readers of task0.
        let mut reader = graph.tasks[0].clone();
        reader.id = TaskId::new(1);
        reader.inputs = vec![graph.tasks[0].output.clone()];
        reader.output = Location::Intermediate {
            task: TaskId::new(1),
            path: ExecEnv::Mock.intermediate_path(TaskId::new(1)),
        };
        let mut second = reader.clone();
        second.id = TaskId::new(2);
        second.output = Location::Intermediate {
            task: TaskId::new(2),
            path: ExecEnv::Mock.intermediate_path(TaskId::new(2)),
        };
        shared.tasks.push(reader);
        shared.tasks.push(second.clone());
        shared.output = second.output;
        let folded = ChainFolder::fold(&shared).unwrap();
        assert_eq!(3, folded.len());
    }

    #[test]
    fn test_nothing_to_fold() {
        let graph = compile(&RaExpr::cross(RaExpr::relation("R"), RaExpr::relation("S")));
        assert_eq!(graph, ChainFolder::fold(&graph).unwrap());
    }

    #[test]
    fn test_malformed_graph_is_rejected() {
        let graph = compile(
            &RaExpr::relation("R").select(Predicate::attr_equals("R.a", Field::IntField(1))),
        );
        let mut dangling = graph.clone();
        // Reads the output of a task that is not in the graph.
        dangling.tasks[0].inputs = vec![Location::Intermediate {
            task: TaskId::new(7),
            path: ExecEnv::Local.intermediate_path(TaskId::new(7)),
        }];
        assert!(matches!(
            ChainFolder::fold(&dangling),
            Err(RamrError::ExecutionError(_))
        ));
        let mut renumbered = graph;
        renumbered.tasks[0].id = TaskId::new(3);
        assert!(ChainFolder::fold(&renumbered).is_err());
    }
}
