pub(crate) mod break_up;
pub(crate) mod introduce_joins;
pub(crate) mod merge;
pub(crate) mod push_projections;
pub(crate) mod push_selections;

use common::ra::{Predicate, RaExpr};
use common::{RamrError, TableSchema};

/// Where a conjunct can be evaluated relative to a binary operator.
#[derive(Debug, PartialEq, Clone, Copy)]
pub(crate) enum Side {
    Left,
    Right,
    /// References attributes from both inputs.
    Both,
    /// References no attribute at all.
    Neither,
    /// Some reference does not resolve in the combined schema.
    Unresolved,
}

/// Classifies `pred` against the inputs of a product or join.
///
/// # Arguments
///
/// * `pred` - Predicate to place.
/// * `left` - Schema of the left input.
/// * `merged` - Left schema followed by the right schema.
pub(crate) fn side_of(pred: &Predicate, left: &TableSchema, merged: &TableSchema) -> Side {
    let attrs = pred.attributes();
    if attrs.is_empty() {
        return Side::Neither;
    }
    let (mut in_left, mut in_right) = (false, false);
    for attr in attrs {
        match merged.index_of(attr) {
            Ok(i) if i < left.size() => in_left = true,
            Ok(_) => in_right = true,
            Err(_) => return Side::Unresolved,
        }
    }
    match (in_left, in_right) {
        (true, false) => Side::Left,
        (false, true) => Side::Right,
        _ => Side::Both,
    }
}

/// Puts the conjunction of `preds` on top of `expr`, if there is any.
pub(crate) fn select_above(expr: RaExpr, preds: Vec<Predicate>) -> RaExpr {
    match Predicate::conjunction(preds) {
        Some(p) => expr.select(p),
        None => expr,
    }
}

/// Rebuilds `expr` with every child replaced by `f(child)`.
pub(crate) fn map_children<F>(expr: &RaExpr, mut f: F) -> Result<RaExpr, RamrError>
where
    F: FnMut(&RaExpr) -> Result<RaExpr, RamrError>,
{
    let rebuilt = match expr {
        RaExpr::Relation(name) => RaExpr::Relation(name.clone()),
        RaExpr::Select { predicate, input } => RaExpr::Select {
            predicate: predicate.clone(),
            input: Box::new(f(input.as_ref())?),
        },
        RaExpr::Project { attributes, input } => RaExpr::Project {
            attributes: attributes.clone(),
            input: Box::new(f(input.as_ref())?),
        },
        RaExpr::Rename {
            relation,
            columns,
            input,
        } => RaExpr::Rename {
            relation: relation.clone(),
            columns: columns.clone(),
            input: Box::new(f(input.as_ref())?),
        },
        RaExpr::CrossProduct { left, right } => RaExpr::CrossProduct {
            left: Box::new(f(left.as_ref())?),
            right: Box::new(f(right.as_ref())?),
        },
        RaExpr::Join {
            predicate,
            left,
            right,
        } => RaExpr::Join {
            predicate: predicate.clone(),
            left: Box::new(f(left.as_ref())?),
            right: Box::new(f(right.as_ref())?),
        },
    };
    Ok(rebuilt)
}

#[cfg(test)]
mod test {
    use super::*;
    use common::schema::resolve_schema;
    use common::testutil::*;
    use common::Field;

    #[test]
    fn test_side_of() {
        let db = int_db(&[("R", &["a", "b"]), ("S", &["b", "c"])]);
        let left = resolve_schema(&RaExpr::relation("R"), &db).unwrap();
        let merged = left.merge(&resolve_schema(&RaExpr::relation("S"), &db).unwrap());
        assert_eq!(
            Side::Left,
            side_of(&Predicate::attr_equals("a", Field::IntField(1)), &left, &merged)
        );
        assert_eq!(
            Side::Right,
            side_of(&Predicate::attrs_equal("S.b", "c"), &left, &merged)
        );
        assert_eq!(
            Side::Both,
            side_of(&Predicate::attrs_equal("R.b", "S.b"), &left, &merged)
        );
        assert_eq!(
            Side::Unresolved,
            side_of(&Predicate::attr_equals("b", Field::IntField(1)), &left, &merged)
        );
        let constant = Predicate::Equality(
            common::Operand::Literal(Field::IntField(1)),
            common::Operand::Literal(Field::IntField(1)),
        );
        assert_eq!(Side::Neither, side_of(&constant, &left, &merged));
    }
}
