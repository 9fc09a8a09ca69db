use super::task::*;
use common::catalog::Catalog;
use common::ids::TaskId;
use common::ra::{Predicate, RaExpr};
use common::schema::bind_attributes;
use common::{RamrError, TableSchema};

/// Location and schema of a lowered subtree.
type Lowered = (Location, TableSchema);

/// Lowers optimized RA trees into task graphs.
pub struct PlanCompiler<'a, T: Catalog + ?Sized> {
    catalog: &'a T,
    env: ExecEnv,
}

impl<'a, T: Catalog + ?Sized> PlanCompiler<'a, T> {
    /// Creates a compiler for the given environment.
    ///
    /// # Arguments
    ///
    /// * `catalog` - Catalog of the base relations.
    /// * `env` - Environment deciding the intermediate location names.
    pub fn new(catalog: &'a T, env: ExecEnv) -> Self {
        Self { catalog, env }
    }

    /// Compiles `expr` bottom-up; task ids follow emission order.
    ///
    /// Nothing is returned on error.
    pub fn compile(&self, expr: &RaExpr) -> Result<TaskGraph, RamrError> {
        let mut tasks = Vec::new();
        let (output, output_schema) = self.lower(expr, &mut tasks)?;
        debug!("Compiled {} into {} tasks", expr, tasks.len());
        Ok(TaskGraph {
            env: self.env,
            tasks,
            output,
            output_schema,
        })
    }

    fn lower(&self, expr: &RaExpr, tasks: &mut Vec<Task>) -> Result<Lowered, RamrError> {
        match expr {
            RaExpr::Relation(name) => self.lower_relation(name),
            RaExpr::Select { predicate, input } => self.lower_select(predicate, input, tasks),
            RaExpr::Project { attributes, input } => {
                let (location, schema) = self.lower(input, tasks)?;
                let columns = bind_attributes(attributes, &schema)?;
                let output = schema.project(&columns);
                self.emit_map(tasks, location, schema, MapStep::Project { columns }, output)
            }
            RaExpr::Rename {
                relation,
                columns,
                input,
            } => {
                let (location, schema) = self.lower(input, tasks)?;
                let output = match columns {
                    Some(names) => schema.rename_columns(relation, names)?,
                    None => schema.requalify(relation),
                };
                let step = MapStep::Rename {
                    relation: relation.clone(),
                };
                self.emit_map(tasks, location, schema, step, output)
            }
            RaExpr::CrossProduct { left, right } => {
                let left = self.lower(left, tasks)?;
                let right = self.lower(right, tasks)?;
                warn!("Cross product compiled into a single reduce partition");
                let map = MapSpec::TagSides {
                    left_key: Vec::new(),
                    right_key: Vec::new(),
                };
                self.emit_reduce(tasks, left, right, map, ReduceSpec::CrossProduct)
            }
            RaExpr::Join {
                predicate,
                left,
                right,
            } => {
                let left = self.lower(left, tasks)?;
                let right = self.lower(right, tasks)?;
                let (left_key, right_key) = Self::join_keys(predicate, &left.1, &right.1)?;
                let map = MapSpec::TagSides {
                    left_key,
                    right_key,
                };
                self.emit_reduce(tasks, left, right, map, ReduceSpec::EquiJoin)
            }
        }
    }

    fn lower_relation(&self, name: &str) -> Result<Lowered, RamrError> {
        let schema = self.catalog.get_table_schema(name)?;
        let location = Location::Base {
            relation: name.to_string(),
            path: self.catalog.get_table_location(name)?,
        };
        Ok((location, schema))
    }

    fn lower_select(
        &self,
        predicate: &Predicate,
        input: &RaExpr,
        tasks: &mut Vec<Task>,
    ) -> Result<Lowered, RamrError> {
        let (location, schema) = self.lower(input, tasks)?;
        Self::check_comparisons(predicate, &schema)?;
        let bound = BoundPredicate::bind(predicate, &schema)?;
        let step = MapStep::Filter {
            predicate: predicate.clone(),
            bound,
        };
        let output = schema.clone();
        self.emit_map(tasks, location, schema, step, output)
    }

    /// Only equalities may relate attributes of two different relations.
    fn check_comparisons(predicate: &Predicate, schema: &TableSchema) -> Result<(), RamrError> {
        for (l, r) in predicate.attribute_comparisons() {
            let left = schema.get_attribute(schema.index_of(l)?);
            let right = schema.get_attribute(schema.index_of(r)?);
            match (left, right) {
                (Some(a), Some(b)) if a.relation == b.relation => {}
                _ => return Err(RamrError::UnsupportedPredicate(predicate.clone())),
            }
        }
        Ok(())
    }

    /// Key columns of an equi-join, one list per side.
    ///
    /// The condition must be a conjunction of equalities between one left
    /// and one right attribute.
    fn join_keys(
        predicate: &Predicate,
        left: &TableSchema,
        right: &TableSchema,
    ) -> Result<(Vec<usize>, Vec<usize>), RamrError> {
        let merged = left.merge(right);
        let unsupported = || RamrError::UnsupportedPredicate(predicate.clone());
        let (mut left_key, mut right_key) = (Vec::new(), Vec::new());
        for conjunct in predicate.conjuncts() {
            let (a, b) = conjunct.as_attribute_equality().ok_or_else(unsupported)?;
            let (i, j) = (merged.index_of(a)?, merged.index_of(b)?);
            let split = left.size();
            if i < split && j >= split {
                left_key.push(i);
                right_key.push(j - split);
            } else if j < split && i >= split {
                left_key.push(j);
                right_key.push(i - split);
            } else {
                return Err(unsupported());
            }
        }
        Ok((left_key, right_key))
    }

    fn next_output(&self, tasks: &[Task]) -> Location {
        let id = TaskId::new(tasks.len());
        Location::Intermediate {
            task: id,
            path: self.env.intermediate_path(id),
        }
    }

    fn emit_map(
        &self,
        tasks: &mut Vec<Task>,
        input: Location,
        input_schema: TableSchema,
        step: MapStep,
        schema: TableSchema,
    ) -> Result<Lowered, RamrError> {
        schema.check_unique()?;
        let output = self.next_output(tasks);
        tasks.push(Task {
            id: TaskId::new(tasks.len()),
            inputs: vec![input],
            input_schemas: vec![input_schema],
            map: MapSpec::Pipeline(vec![step]),
            reduce: None,
            output: output.clone(),
            schema: schema.clone(),
        });
        Ok((output, schema))
    }

    fn emit_reduce(
        &self,
        tasks: &mut Vec<Task>,
        left: Lowered,
        right: Lowered,
        map: MapSpec,
        reduce: ReduceSpec,
    ) -> Result<Lowered, RamrError> {
        let schema = left.1.merge(&right.1);
        schema.check_unique()?;
        let output = self.next_output(tasks);
        tasks.push(Task {
            id: TaskId::new(tasks.len()),
            inputs: vec![left.0, right.0],
            input_schemas: vec![left.1, right.1],
            map,
            reduce: Some(reduce),
            output: output.clone(),
            schema: schema.clone(),
        });
        Ok((output, schema))
    }
}
