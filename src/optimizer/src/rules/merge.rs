use super::{map_children, select_above};
use common::ra::RaExpr;
use common::RamrError;

/// Collapses every chain of selections into one selection over the
/// flattened conjunction, outermost predicate first.
pub(crate) fn apply(expr: &RaExpr) -> Result<RaExpr, RamrError> {
    match expr {
        RaExpr::Select { .. } => {
            let mut preds = Vec::new();
            let mut node = expr;
            while let RaExpr::Select { predicate, input } = node {
                preds.push(predicate.clone());
                node = input.as_ref();
            }
            Ok(select_above(apply(node)?, preds))
        }
        other => map_children(other, apply),
    }
}
