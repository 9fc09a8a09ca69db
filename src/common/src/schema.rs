use crate::catalog::Catalog;
use crate::ra::{AttrRef, RaExpr};
use crate::{RamrError, TableSchema};

/// Computes the ordered, qualified output schema of an RA subtree.
///
/// # Arguments
///
/// * `expr` - Root of the subtree.
/// * `catalog` - Catalog holding the base relations.
pub fn resolve_schema<T: Catalog + ?Sized>(
    expr: &RaExpr,
    catalog: &T,
) -> Result<TableSchema, RamrError> {
    match expr {
        RaExpr::Relation(name) => catalog.get_table_schema(name),
        RaExpr::Select { input, .. } => resolve_schema(input, catalog),
        RaExpr::Project { attributes, input } => {
            let child = resolve_schema(input, catalog)?;
            let indices = bind_attributes(attributes, &child)?;
            Ok(child.project(&indices))
        }
        RaExpr::Rename {
            relation,
            columns,
            input,
        } => {
            let child = resolve_schema(input, catalog)?;
            match columns {
                Some(names) => child.rename_columns(relation, names),
                None => Ok(child.requalify(relation)),
            }
        }
        RaExpr::CrossProduct { left, right } | RaExpr::Join { left, right, .. } => {
            let l = resolve_schema(left, catalog)?;
            let r = resolve_schema(right, catalog)?;
            Ok(l.merge(&r))
        }
    }
}

/// Resolves each reference to its column index in `schema`.
pub fn bind_attributes(attrs: &[AttrRef], schema: &TableSchema) -> Result<Vec<usize>, RamrError> {
    attrs.iter().map(|a| schema.index_of(a)).collect()
}
