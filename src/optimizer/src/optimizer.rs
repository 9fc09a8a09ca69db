use crate::rules::{break_up, introduce_joins, merge, push_projections, push_selections};
use common::catalog::Catalog;
use common::ra::RaExpr;
use common::RamrError;

/// Knobs of the rewrite engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Upper bound on fixed-point passes of the selection rules.
    pub max_passes: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig { max_passes: 16 }
    }
}

/// The rewrite rules, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    BreakUpSelections,
    PushDownSelections,
    MergeSelections,
    IntroduceJoins,
    PushDownProjections,
}

impl Rule {
    /// Every rule in the order of the first pass.
    pub const PIPELINE: [Rule; 5] = [
        Rule::BreakUpSelections,
        Rule::PushDownSelections,
        Rule::MergeSelections,
        Rule::IntroduceJoins,
        Rule::PushDownProjections,
    ];

    /// Rules repeated until the tree stops changing.
    pub const FIXED_POINT: [Rule; 3] = [
        Rule::PushDownSelections,
        Rule::MergeSelections,
        Rule::IntroduceJoins,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Rule::BreakUpSelections => "break_up_selections",
            Rule::PushDownSelections => "push_down_selections",
            Rule::MergeSelections => "merge_selections",
            Rule::IntroduceJoins => "introduce_joins",
            Rule::PushDownProjections => "push_down_projections",
        }
    }

    /// Applies the rule to the whole tree, returning a new tree.
    ///
    /// # Arguments
    ///
    /// * `expr` - Root of the tree to rewrite.
    /// * `catalog` - Catalog used to resolve schemas.
    pub fn apply<T: Catalog + ?Sized>(
        &self,
        expr: &RaExpr,
        catalog: &T,
    ) -> Result<RaExpr, RamrError> {
        match self {
            Rule::BreakUpSelections => break_up::apply(expr),
            Rule::PushDownSelections => push_selections::apply(expr, catalog),
            Rule::MergeSelections => merge::apply(expr),
            Rule::IntroduceJoins => introduce_joins::apply(expr, catalog),
            Rule::PushDownProjections => push_projections::apply(expr, catalog),
        }
    }
}

/// Rewrites RA trees into cheaper equivalent trees.
pub struct Optimizer<'a, T: Catalog + ?Sized> {
    catalog: &'a T,
    config: OptimizerConfig,
}

impl<'a, T: Catalog + ?Sized> Optimizer<'a, T> {
    /// Creates an optimizer with the default configuration.
    pub fn new(catalog: &'a T) -> Self {
        Self::with_config(catalog, OptimizerConfig::default())
    }

    pub fn with_config(catalog: &'a T, config: OptimizerConfig) -> Self {
        Optimizer { catalog, config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Runs every rule once, then the selection rules until the tree no
    /// longer changes or `max_passes` is reached, then pushes projections
    /// down one last time.
    ///
    /// Any rule failure aborts the optimization.
    pub fn optimize(&self, expr: &RaExpr) -> Result<RaExpr, RamrError> {
        let mut current = expr.clone();
        for rule in Rule::PIPELINE.iter() {
            current = self.apply_rule(*rule, &current)?;
        }
        let current = self.selection_fixed_point(current)?;
        // Selections sunk below projections leave those projections wider
        // than what their ancestors need.
        self.apply_rule(Rule::PushDownProjections, &current)
    }

    fn selection_fixed_point(&self, mut current: RaExpr) -> Result<RaExpr, RamrError> {
        for pass in 0..self.config.max_passes {
            let mut next = current.clone();
            for rule in Rule::FIXED_POINT.iter() {
                next = self.apply_rule(*rule, &next)?;
            }
            if next == current {
                debug!("Fixed point reached after {} extra passes", pass);
                return Ok(current);
            }
            current = next;
        }
        if self.config.max_passes > 0 {
            warn!(
                "Stopped rewriting after {} passes without reaching a fixed point",
                self.config.max_passes
            );
        }
        Ok(current)
    }

    fn apply_rule(&self, rule: Rule, expr: &RaExpr) -> Result<RaExpr, RamrError> {
        let rewritten = rule.apply(expr, self.catalog)?;
        if rewritten != *expr {
            debug!("{}: {}", rule.name(), rewritten);
        }
        Ok(rewritten)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::ra::{AttrRef, ComparisonOp, Operand, Predicate};
    use common::testutil::*;
    use common::Field;

    fn pizza_query() -> RaExpr {
        RaExpr::cross(RaExpr::relation("Person"), RaExpr::relation("Eats"))
            .select(
                Predicate::attrs_equal("Person.name", "Eats.name")
                    .and(Predicate::attr_equals("Person.age", Field::IntField(16))),
            )
            .project_names(&["Eats.pizza"])
    }

    fn count_nodes(expr: &RaExpr) -> usize {
        match expr {
            RaExpr::Relation(_) => 1,
            RaExpr::Select { input, .. }
            | RaExpr::Project { input, .. }
            | RaExpr::Rename { input, .. } => 1 + count_nodes(input),
            RaExpr::CrossProduct { left, right } | RaExpr::Join { left, right, .. } => {
                1 + count_nodes(left) + count_nodes(right)
            }
        }
    }

    fn has_stacked_projections(expr: &RaExpr) -> bool {
        match expr {
            RaExpr::Relation(_) => false,
            RaExpr::Project { input, .. } => {
                matches!(**input, RaExpr::Project { .. }) || has_stacked_projections(input)
            }
            RaExpr::Select { input, .. } | RaExpr::Rename { input, .. } => {
                has_stacked_projections(input)
            }
            RaExpr::CrossProduct { left, right } | RaExpr::Join { left, right, .. } => {
                has_stacked_projections(left) || has_stacked_projections(right)
            }
        }
    }

    /// `R.a` of `R x S` where `R.a = S.a`, `S.a = 1` and `R.c > 0`.
    fn filtered_join_query() -> RaExpr {
        let positive = Predicate::Comparison(
            Operand::attr("R.c"),
            ComparisonOp::GreaterThan,
            Operand::Literal(Field::IntField(0)),
        );
        RaExpr::cross(RaExpr::relation("R"), RaExpr::relation("S"))
            .select(
                Predicate::attrs_equal("R.a", "S.a")
                    .and(Predicate::attr_equals("S.a", Field::IntField(1)))
                    .and(positive),
            )
            .project_names(&["R.a"])
    }

    #[test]
    fn test_full_pipeline() {
        init();
        let db = pizza_db();
        let optimized = Optimizer::new(&db).optimize(&pizza_query()).unwrap();
        let person = RaExpr::relation("Person")
            .project(vec![
                AttrRef::new("Person", "name"),
                AttrRef::new("Person", "age"),
            ])
            .select(Predicate::attr_equals("Person.age", Field::IntField(16)))
            .project(vec![AttrRef::new("Person", "name")]);
        let expected = RaExpr::join(
            Predicate::attrs_equal("Person.name", "Eats.name"),
            person,
            RaExpr::relation("Eats"),
        )
        .project_names(&["Eats.pizza"]);
        assert_eq!(expected, optimized);
    }

    #[test]
    fn test_optimize_is_stable() {
        let db = pizza_db();
        let optimizer = Optimizer::new(&db);
        let once = optimizer.optimize(&pizza_query()).unwrap();
        let twice = optimizer.optimize(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_filtered_join_is_minimal_and_stable() {
        init();
        let db = int_db(&[("R", &["a", "b", "c"]), ("S", &["a", "b"])]);
        let optimizer = Optimizer::new(&db);
        let once = optimizer.optimize(&filtered_join_query()).unwrap();
        let positive = Predicate::Comparison(
            Operand::attr("R.c"),
            ComparisonOp::GreaterThan,
            Operand::Literal(Field::IntField(0)),
        );
        let left = RaExpr::relation("R")
            .project(vec![AttrRef::new("R", "a"), AttrRef::new("R", "c")])
            .select(positive)
            .project(vec![AttrRef::new("R", "a")]);
        let right = RaExpr::relation("S")
            .project(vec![AttrRef::new("S", "a")])
            .select(Predicate::attr_equals("S.a", Field::IntField(1)));
        let expected = RaExpr::join(Predicate::attrs_equal("R.a", "S.a"), left, right)
            .project_names(&["R.a"]);
        assert_eq!(expected, once);
        assert!(!has_stacked_projections(&once));
        // Nothing left to prune.
        assert_eq!(once, Rule::PushDownProjections.apply(&once, &db).unwrap());

        let mut current = once.clone();
        for _ in 0..4 {
            current = optimizer.optimize(&current).unwrap();
            assert_eq!(once, current);
            assert_eq!(count_nodes(&once), count_nodes(&current));
        }
    }

    #[test]
    fn test_stacked_projections_collapse() {
        let db = int_db(&[("R", &["a", "b", "c"])]);
        let expr = RaExpr::relation("R")
            .project_names(&["R.a", "R.b"])
            .project_names(&["R.a"]);
        let optimized = Optimizer::new(&db).optimize(&expr).unwrap();
        assert_eq!(
            RaExpr::relation("R").project(vec![AttrRef::new("R", "a")]),
            optimized
        );
        let identity = RaExpr::relation("R").project_names(&["R.a", "R.b", "R.c"]);
        assert_eq!(
            RaExpr::relation("R"),
            Optimizer::new(&db).optimize(&identity).unwrap()
        );
    }

    #[test]
    fn test_zero_passes_runs_pipeline_once() {
        let db = pizza_db();
        let optimizer = Optimizer::with_config(&db, OptimizerConfig { max_passes: 0 });
        let optimized = optimizer.optimize(&pizza_query()).unwrap();
        match &optimized {
            RaExpr::Project { input, .. } => assert!(matches!(**input, RaExpr::Join { .. })),
            other => panic!("unexpected root {}", other),
        }
    }

    #[test]
    fn test_errors_abort() {
        let db = pizza_db();
        let expr = RaExpr::relation("Person").project_names(&["Person.z"]);
        assert_eq!(
            Err(RamrError::UnknownAttribute(String::from("Person.z"))),
            Optimizer::new(&db).optimize(&expr)
        );
        let missing = RaExpr::cross(RaExpr::relation("Nope"), RaExpr::relation("Eats"))
            .select(Predicate::attr_equals("pizza", Field::IntField(1)));
        assert_eq!(
            Err(RamrError::UnknownRelation(String::from("Nope"))),
            Optimizer::new(&db).optimize(&missing)
        );
    }

    #[test]
    fn test_rule_names() {
        let names: Vec<&str> = Rule::PIPELINE.iter().map(|r| r.name()).collect();
        assert_eq!(5, names.len());
        assert_eq!("introduce_joins", names[3]);
    }
}
