use super::map_children;
use common::ra::RaExpr;
use common::RamrError;

/// Splits every conjunctive selection into a chain of single-conjunct
/// selections, first conjunct outermost.
pub(crate) fn apply(expr: &RaExpr) -> Result<RaExpr, RamrError> {
    match expr {
        RaExpr::Select { predicate, input } => {
            let mut result = apply(input)?;
            for p in predicate.conjuncts().into_iter().rev() {
                result = result.select(p.clone());
            }
            Ok(result)
        }
        other => map_children(other, apply),
    }
}
