use super::{map_children, select_above, side_of, Side};
use common::catalog::Catalog;
use common::ra::{AttrRef, Predicate, RaExpr};
use common::schema::{bind_attributes, resolve_schema};
use common::RamrError;

/// Moves every selection as deep into the tree as it can legally go.
pub(crate) fn apply<T: Catalog + ?Sized>(expr: &RaExpr, catalog: &T) -> Result<RaExpr, RamrError> {
    match expr {
        RaExpr::Select { predicate, input } => {
            let child = apply(input, catalog)?;
            sink(predicate.clone(), child, catalog)
        }
        other => map_children(other, |c| apply(c, catalog)),
    }
}

/// Places `predicate` on `child`, below as many operators as possible.
fn sink<T: Catalog + ?Sized>(
    predicate: Predicate,
    child: RaExpr,
    catalog: &T,
) -> Result<RaExpr, RamrError> {
    match child {
        RaExpr::Project { attributes, input } => {
            if passes_projection(&predicate, &attributes, &input, catalog)? {
                Ok(sink(predicate, *input, catalog)?.project(attributes))
            } else {
                Ok(RaExpr::Project { attributes, input }.select(predicate))
            }
        }
        RaExpr::Rename {
            relation,
            columns,
            input,
        } => {
            let inner = resolve_schema(&input, catalog)?;
            let outer = match &columns {
                Some(names) => inner.rename_columns(&relation, names)?,
                None => inner.requalify(&relation),
            };
            // Positional rewrite onto the qualified names of the input.
            let rewritten = predicate.map_attributes(&mut |a: &AttrRef| {
                let i = outer.index_of(a).ok()?;
                let target = inner.get_attribute(i)?;
                if inner.position_of(target) == Some(i) {
                    Some(target.to_attr_ref())
                } else {
                    None
                }
            });
            match rewritten {
                Some(p) => Ok(sink(p, *input, catalog)?.rename(&relation, columns)),
                None => Ok(input.rename(&relation, columns).select(predicate)),
            }
        }
        RaExpr::CrossProduct { left, right } => {
            let (left, right, above) = split_across(predicate, *left, *right, catalog)?;
            Ok(select_above(RaExpr::cross(left, right), above))
        }
        RaExpr::Join {
            predicate: condition,
            left,
            right,
        } => {
            let (left, right, above) = split_across(predicate, *left, *right, catalog)?;
            Ok(select_above(RaExpr::join(condition, left, right), above))
        }
        RaExpr::Select {
            predicate: inner,
            input,
        } => {
            let original = (*input).clone();
            let sunk = sink(predicate.clone(), *input, catalog)?;
            let stuck = match &sunk {
                RaExpr::Select { predicate: p, input } => *p == predicate && **input == original,
                _ => false,
            };
            if stuck {
                Ok(original.select(inner).select(predicate))
            } else {
                Ok(sunk.select(inner))
            }
        }
        relation @ RaExpr::Relation(_) => Ok(relation.select(predicate)),
    }
}

/// A selection may pass a projection when each attribute it references
/// resolves, on both sides of the projection, to the same column.
fn passes_projection<T: Catalog + ?Sized>(
    predicate: &Predicate,
    attributes: &[AttrRef],
    input: &RaExpr,
    catalog: &T,
) -> Result<bool, RamrError> {
    let inner = resolve_schema(input, catalog)?;
    let indices = bind_attributes(attributes, &inner)?;
    let outer = inner.project(&indices);
    for attr in predicate.attributes() {
        match (outer.index_of(attr), inner.index_of(attr)) {
            (Ok(o), Ok(i)) if indices[o] == i => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}

/// Sends each conjunct to the input that holds all its attributes.
///
/// Returns the new inputs and the conjuncts that stay above.
fn split_across<T: Catalog + ?Sized>(
    predicate: Predicate,
    mut left: RaExpr,
    mut right: RaExpr,
    catalog: &T,
) -> Result<(RaExpr, RaExpr, Vec<Predicate>), RamrError> {
    let left_schema = resolve_schema(&left, catalog)?;
    let merged = left_schema.merge(&resolve_schema(&right, catalog)?);
    let (mut to_left, mut to_right, mut above) = (Vec::new(), Vec::new(), Vec::new());
    for conjunct in predicate.into_conjuncts() {
        match side_of(&conjunct, &left_schema, &merged) {
            Side::Left => to_left.push(conjunct),
            Side::Right => to_right.push(conjunct),
            Side::Both | Side::Neither | Side::Unresolved => above.push(conjunct),
        }
    }
    for p in to_left.into_iter().rev() {
        left = sink(p, left, catalog)?;
    }
    for p in to_right.into_iter().rev() {
        right = sink(p, right, catalog)?;
    }
    Ok((left, right, above))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rules::break_up;
    use common::testutil::*;
    use common::Field;

    fn int(a: &str, v: i64) -> Predicate {
        Predicate::attr_equals(a, Field::IntField(v))
    }

    #[test]
    fn test_push_through_cross_product() {
        init();
        let db = int_db(&[("R", &["a", "c"]), ("S", &["b", "d"])]);
        let p1 = int("R.a", 1);
        let p2 = int("S.b", 2);
        let p3 = Predicate::attrs_equal("R.c", "S.d");
        let expr = RaExpr::cross(RaExpr::relation("R"), RaExpr::relation("S")).select(
            Predicate::conjunction(vec![p1.clone(), p2.clone(), p3.clone()]).unwrap(),
        );
        let pushed = apply(&break_up::apply(&expr).unwrap(), &db).unwrap();
        let expected = RaExpr::cross(
            RaExpr::relation("R").select(p1),
            RaExpr::relation("S").select(p2),
        )
        .select(p3);
        assert_eq!(expected, pushed);
    }

    #[test]
    fn test_push_conjunction_split_per_side() {
        let db = int_db(&[("R", &["a"]), ("S", &["b"])]);
        let expr = RaExpr::cross(RaExpr::relation("R"), RaExpr::relation("S"))
            .select(int("R.a", 1).and(int("b", 2)));
        let expected = RaExpr::cross(
            RaExpr::relation("R").select(int("R.a", 1)),
            RaExpr::relation("S").select(int("b", 2)),
        );
        assert_eq!(expected, apply(&expr, &db).unwrap());
    }

    #[test]
    fn test_push_through_rename() {
        let db = int_db(&[("R", &["a", "b"])]);
        let expr = RaExpr::relation("R")
            .rename("P", Some(vec![String::from("x"), String::from("y")]))
            .select(int("P.y", 4));
        let expected = RaExpr::relation("R")
            .select(int("R.b", 4))
            .rename("P", Some(vec![String::from("x"), String::from("y")]));
        assert_eq!(expected, apply(&expr, &db).unwrap());
    }

    #[test]
    fn test_projection_legality() {
        let db = int_db(&[("R", &["a", "b"])]);
        let blocked = RaExpr::relation("R")
            .project_names(&["R.b"])
            .select(int("R.a", 1));
        assert_eq!(blocked, apply(&blocked, &db).unwrap());

        let legal = RaExpr::relation("R")
            .project_names(&["R.b"])
            .select(int("b", 1));
        let expected = RaExpr::relation("R")
            .select(int("b", 1))
            .project_names(&["R.b"]);
        assert_eq!(expected, apply(&legal, &db).unwrap());
    }

    #[test]
    fn test_push_below_join_and_commute() {
        let db = int_db(&[("R", &["a", "c"]), ("S", &["b"])]);
        let join = RaExpr::join(
            Predicate::attrs_equal("R.a", "S.b"),
            RaExpr::relation("R"),
            RaExpr::relation("S"),
        );
        let expr = join
            .select(Predicate::attr_equals("R.c", Field::IntField(0)).and(
                Predicate::Comparison(
                    common::Operand::attr("R.a"),
                    common::ComparisonOp::NotEq,
                    common::Operand::attr("S.b"),
                ),
            ))
            .select(int("S.b", 7));
        let pushed = apply(&expr, &db).unwrap();
        let expected = RaExpr::join(
            Predicate::attrs_equal("R.a", "S.b"),
            RaExpr::relation("R").select(int("R.c", 0)),
            RaExpr::relation("S").select(int("S.b", 7)),
        )
        .select(Predicate::Comparison(
            common::Operand::attr("R.a"),
            common::ComparisonOp::NotEq,
            common::Operand::attr("S.b"),
        ));
        assert_eq!(expected, pushed);
    }

    #[test]
    fn test_unresolved_stays_in_place() {
        let db = int_db(&[("R", &["a"]), ("S", &["a"])]);
        let expr = RaExpr::cross(RaExpr::relation("R"), RaExpr::relation("S"))
            .select(int("a", 1))
            .select(int("R.z", 1));
        assert_eq!(expr, apply(&expr, &db).unwrap());
    }
}
