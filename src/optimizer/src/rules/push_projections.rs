use common::catalog::Catalog;
use common::ra::{AttrRef, RaExpr};
use common::schema::{bind_attributes, resolve_schema};
use common::{Attribute, RamrError};

/// Restricts every intermediate result to the attributes its ancestors
/// still need.
pub(crate) fn apply<T: Catalog + ?Sized>(expr: &RaExpr, catalog: &T) -> Result<RaExpr, RamrError> {
    prune(expr, None, catalog)
}

fn is_required(required: &[Attribute], attr: &Attribute) -> bool {
    required.iter().any(|r| r.same_identity(attr))
}

/// Rewrites `expr` so that its output keeps every attribute in `required`
/// (everything when `None`). The output schema is always a subsequence of
/// the original one.
fn prune<T: Catalog + ?Sized>(
    expr: &RaExpr,
    required: Option<&[Attribute]>,
    catalog: &T,
) -> Result<RaExpr, RamrError> {
    match expr {
        RaExpr::Relation(_) => Ok(expr.clone()),
        RaExpr::Project { attributes, input } => {
            let inner = resolve_schema(input, catalog)?;
            let indices = bind_attributes(attributes, &inner)?;
            let mut kept: Vec<usize> = (0..attributes.len())
                .filter(|i| match (required, inner.get_attribute(indices[*i])) {
                    (None, _) => true,
                    (Some(req), Some(attr)) => is_required(req, attr),
                    (Some(_), None) => false,
                })
                .collect();
            if kept.is_empty() && !attributes.is_empty() {
                kept.push(0);
            }
            let child_req: Vec<Attribute> = kept
                .iter()
                .filter_map(|i| inner.get_attribute(indices[*i]).cloned())
                .collect();
            let input = prune(input, Some(&child_req), catalog)?;
            let attributes = kept.iter().map(|i| attributes[*i].clone()).collect();
            project_onto(input, attributes, catalog)
        }
        RaExpr::Rename {
            relation,
            columns,
            input,
        } => {
            let inner = resolve_schema(input, catalog)?;
            let req = match required {
                Some(req) if inner.check_unique().is_ok() => req,
                _ => return Ok(prune(input, None, catalog)?.rename(relation, columns.clone())),
            };
            let outer = resolve_schema(expr, catalog)?;
            let child_req: Vec<Attribute> = outer
                .attributes()
                .zip(inner.attributes())
                .filter(|(o, _)| is_required(req, o))
                .map(|(_, i)| i.clone())
                .collect();
            let input = prune(input, Some(&child_req), catalog)?;
            let columns = match columns {
                None => None,
                Some(names) => {
                    // The input may have lost columns; keep the matching names.
                    let narrowed = resolve_schema(&input, catalog)?;
                    let mut kept = Vec::with_capacity(narrowed.size());
                    for attr in narrowed.attributes() {
                        match inner.position_of(attr) {
                            Some(j) => kept.push(names[j].clone()),
                            None => return Err(RamrError::UnknownAttribute(attr.qualified_name())),
                        }
                    }
                    Some(kept)
                }
            };
            Ok(input.rename(relation, columns))
        }
        RaExpr::Select { predicate, input } => {
            let needed = match required {
                None => None,
                Some(req) => {
                    let child = resolve_schema(input, catalog)?;
                    let mut needed = req.to_vec();
                    for attr in predicate.attributes() {
                        let i = child.index_of(attr)?;
                        needed.extend(child.get_attribute(i).cloned());
                    }
                    Some(needed)
                }
            };
            Ok(narrow(input, needed.as_deref(), catalog)?.select(predicate.clone()))
        }
        RaExpr::CrossProduct { left, right } => {
            let (l, r) = split_requirements(left, right, required, &[], catalog)?;
            Ok(RaExpr::cross(
                narrow(left, l.as_deref(), catalog)?,
                narrow(right, r.as_deref(), catalog)?,
            ))
        }
        RaExpr::Join {
            predicate,
            left,
            right,
        } => {
            let refs: Vec<_> = predicate.attributes().into_iter().cloned().collect();
            let (l, r) = split_requirements(left, right, required, &refs, catalog)?;
            Ok(RaExpr::join(
                predicate.clone(),
                narrow(left, l.as_deref(), catalog)?,
                narrow(right, r.as_deref(), catalog)?,
            ))
        }
    }
}

type Requirements = Option<Vec<Attribute>>;

/// Splits what the ancestors and the operator itself need between the
/// two inputs of a product or join.
fn split_requirements<T: Catalog + ?Sized>(
    left: &RaExpr,
    right: &RaExpr,
    required: Option<&[Attribute]>,
    referenced: &[AttrRef],
    catalog: &T,
) -> Result<(Requirements, Requirements), RamrError> {
    let req = match required {
        Some(req) => req,
        None => return Ok((None, None)),
    };
    let left_schema = resolve_schema(left, catalog)?;
    let right_schema = resolve_schema(right, catalog)?;
    let merged = left_schema.merge(&right_schema);
    if merged.check_unique().is_err() {
        return Ok((None, None));
    }
    let mut needed = req.to_vec();
    for attr in referenced {
        let i = merged.index_of(attr)?;
        needed.extend(merged.get_attribute(i).cloned());
    }
    let l = left_schema
        .attributes()
        .filter(|a| is_required(&needed, a))
        .cloned()
        .collect();
    let r = right_schema
        .attributes()
        .filter(|a| is_required(&needed, a))
        .cloned()
        .collect();
    Ok((Some(l), Some(r)))
}

/// Prunes `child` and, when it would still expose more than `needed`,
/// restricts it with a projection.
fn narrow<T: Catalog + ?Sized>(
    child: &RaExpr,
    needed: Option<&[Attribute]>,
    catalog: &T,
) -> Result<RaExpr, RamrError> {
    let needed = match needed {
        Some(needed) => needed,
        None => return prune(child, None, catalog),
    };
    let schema = resolve_schema(child, catalog)?;
    if schema.check_unique().is_err() {
        return prune(child, None, catalog);
    }
    let mut keep: Vec<Attribute> = schema
        .attributes()
        .filter(|a| is_required(needed, a))
        .cloned()
        .collect();
    if keep.is_empty() {
        keep.extend(schema.get_attribute(0).cloned());
    }
    let pruned = prune(child, Some(&keep), catalog)?;
    if resolve_schema(&pruned, catalog)?.size() == keep.len() {
        return Ok(pruned);
    }
    project_onto(pruned, keep.iter().map(|a| a.to_attr_ref()).collect(), catalog)
}

/// Projects `input` on `attributes` without stacking projections: a
/// projection of a projection is bound to the inner input, and a
/// projection that keeps its input's schema as is disappears.
fn project_onto<T: Catalog + ?Sized>(
    input: RaExpr,
    attributes: Vec<AttrRef>,
    catalog: &T,
) -> Result<RaExpr, RamrError> {
    let schema = resolve_schema(&input, catalog)?;
    let indices = bind_attributes(&attributes, &schema)?;
    if indices.len() == schema.size() && indices.iter().enumerate().all(|(i, j)| i == *j) {
        return Ok(input);
    }
    if let RaExpr::Project { input: below, .. } = &input {
        if resolve_schema(below, catalog)?.check_unique().is_ok() {
            let refs = indices
                .iter()
                .filter_map(|i| schema.get_attribute(*i))
                .map(|a| a.to_attr_ref())
                .collect();
            return project_onto((**below).clone(), refs, catalog);
        }
    }
    Ok(input.project(attributes))
}
