use super::{map_children, select_above, side_of, Side};
use common::catalog::Catalog;
use common::ra::{Predicate, RaExpr};
use common::schema::resolve_schema;
use common::RamrError;

/// Turns selections with cross-side attribute equalities over a cross
/// product into joins, and folds such equalities over a join into its
/// condition.
pub(crate) fn apply<T: Catalog + ?Sized>(expr: &RaExpr, catalog: &T) -> Result<RaExpr, RamrError> {
    match expr {
        RaExpr::Select { predicate, input } => match apply(input, catalog)? {
            RaExpr::CrossProduct { left, right } => {
                let (equi, rest) = split_equalities(predicate, &left, &right, catalog)?;
                match Predicate::conjunction(equi) {
                    Some(condition) => {
                        debug!("Introducing join on {}", condition);
                        Ok(select_above(RaExpr::join(condition, *left, *right), rest))
                    }
                    None => Ok(RaExpr::CrossProduct { left, right }.select(predicate.clone())),
                }
            }
            RaExpr::Join {
                predicate: condition,
                left,
                right,
            } => {
                let (equi, rest) = split_equalities(predicate, &left, &right, catalog)?;
                match Predicate::conjunction(equi) {
                    Some(extra) => Ok(select_above(
                        RaExpr::join(condition.and(extra), *left, *right),
                        rest,
                    )),
                    None => Ok(RaExpr::join(condition, *left, *right).select(predicate.clone())),
                }
            }
            other => Ok(other.select(predicate.clone())),
        },
        other => map_children(other, |c| apply(c, catalog)),
    }
}

/// Partitions the conjuncts into `attr = attr` equalities with one
/// attribute per input and everything else.
fn split_equalities<T: Catalog + ?Sized>(
    predicate: &Predicate,
    left: &RaExpr,
    right: &RaExpr,
    catalog: &T,
) -> Result<(Vec<Predicate>, Vec<Predicate>), RamrError> {
    let left_schema = resolve_schema(left, catalog)?;
    let merged = left_schema.merge(&resolve_schema(right, catalog)?);
    let (mut equi, mut rest) = (Vec::new(), Vec::new());
    for conjunct in predicate.conjuncts() {
        let cross_side = conjunct.as_attribute_equality().is_some()
            && side_of(conjunct, &left_schema, &merged) == Side::Both;
        if cross_side {
            equi.push(conjunct.clone());
        } else {
            rest.push(conjunct.clone());
        }
    }
    Ok((equi, rest))
}
