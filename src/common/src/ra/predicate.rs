use crate::Field;
use std::cmp::Ordering;
use std::fmt;

/// Reference to a column, optionally qualified by a relation name.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttrRef {
    relation: Option<String>,
    column: String,
}

impl AttrRef {
    /// Qualified reference `relation.column`.
    pub fn new(relation: &str, column: &str) -> Self {
        Self {
            relation: Some(relation.to_string()),
            column: column.to_string(),
        }
    }

    /// Bare column reference.
    pub fn unqualified(column: &str) -> Self {
        Self {
            relation: None,
            column: column.to_string(),
        }
    }

    /// Parses `relation.column` or `column`.
    pub fn parse(name: &str) -> Self {
        match name.find('.') {
            Some(i) => Self::new(&name[..i], &name[i + 1..]),
            None => Self::unqualified(name),
        }
    }

    pub fn relation(&self) -> Option<&str> {
        self.relation.as_deref()
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn is_qualified(&self) -> bool {
        self.relation.is_some()
    }
}

impl fmt::Display for AttrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.relation {
            Some(r) => write!(f, "{}.{}", r, self.column),
            None => write!(f, "{}", self.column),
        }
    }
}

/// One side of a comparison.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Operand {
    Attr(AttrRef),
    Literal(Field),
}

impl Operand {
    /// Shorthand for an attribute operand parsed from `relation.column`.
    pub fn attr(name: &str) -> Self {
        Operand::Attr(AttrRef::parse(name))
    }

    pub fn as_attr(&self) -> Option<&AttrRef> {
        match self {
            Operand::Attr(a) => Some(a),
            Operand::Literal(_) => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Attr(a) => write!(f, "{}", a),
            Operand::Literal(Field::StringField(s)) => write!(f, "'{}'", s),
            Operand::Literal(v) => write!(f, "{}", v),
        }
    }
}

/// Non-equality comparison operators.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    NotEq,
    LessThan,
    LessThanOrEq,
    GreaterThan,
    GreaterThanOrEq,
}

impl ComparisonOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOp::NotEq => "<>",
            ComparisonOp::LessThan => "<",
            ComparisonOp::LessThanOrEq => "<=",
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::GreaterThanOrEq => ">=",
        }
    }

    /// Operator to use when the operands are swapped.
    pub fn flip(&self) -> Self {
        match self {
            ComparisonOp::LessThan => ComparisonOp::GreaterThan,
            ComparisonOp::LessThanOrEq => ComparisonOp::GreaterThanOrEq,
            ComparisonOp::GreaterThan => ComparisonOp::LessThan,
            ComparisonOp::GreaterThanOrEq => ComparisonOp::LessThanOrEq,
            ComparisonOp::NotEq => ComparisonOp::NotEq,
        }
    }

    /// Whether `left.cmp(right) == ordering` satisfies the operator.
    pub fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            ComparisonOp::NotEq => ordering != Ordering::Equal,
            ComparisonOp::LessThan => ordering == Ordering::Less,
            ComparisonOp::LessThanOrEq => ordering != Ordering::Greater,
            ComparisonOp::GreaterThan => ordering == Ordering::Greater,
            ComparisonOp::GreaterThanOrEq => ordering != Ordering::Less,
        }
    }
}

/// Selection and join conditions.
///
/// A `Conjunction` is never empty and never holds another `Conjunction`;
/// build one through [`Predicate::conjunction`].
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Predicate {
    Equality(Operand, Operand),
    Comparison(Operand, ComparisonOp, Operand),
    Conjunction(Vec<Predicate>),
}

impl Predicate {
    /// `left = right` between two attributes given as `relation.column`.
    pub fn attrs_equal(left: &str, right: &str) -> Self {
        Predicate::Equality(Operand::attr(left), Operand::attr(right))
    }

    /// `attr = literal`.
    pub fn attr_equals(attr: &str, value: Field) -> Self {
        Predicate::Equality(Operand::attr(attr), Operand::Literal(value))
    }

    /// Flattened AND of the given predicates.
    ///
    /// Returns `None` for an empty list and the lone predicate for a
    /// singleton.
    pub fn conjunction(preds: Vec<Predicate>) -> Option<Predicate> {
        let mut flat = Vec::new();
        for p in preds {
            match p {
                Predicate::Conjunction(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(Predicate::Conjunction(flat)),
        }
    }

    /// `self AND other`, flattened.
    pub fn and(self, other: Predicate) -> Predicate {
        let mut conjuncts = self.into_conjuncts();
        conjuncts.extend(other.into_conjuncts());
        Predicate::Conjunction(conjuncts)
    }

    pub fn conjuncts(&self) -> Vec<&Predicate> {
        match self {
            Predicate::Conjunction(ps) => ps.iter().collect(),
            other => vec![other],
        }
    }

    pub fn into_conjuncts(self) -> Vec<Predicate> {
        match self {
            Predicate::Conjunction(ps) => ps,
            other => vec![other],
        }
    }

    /// Every attribute referenced, in order of appearance.
    pub fn attributes(&self) -> Vec<&AttrRef> {
        match self {
            Predicate::Equality(l, r) | Predicate::Comparison(l, _, r) => {
                l.as_attr().into_iter().chain(r.as_attr()).collect()
            }
            Predicate::Conjunction(ps) => ps.iter().flat_map(|p| p.attributes()).collect(),
        }
    }

    /// Rewrites every attribute reference; `None` if `f` fails on any of them.
    pub fn map_attributes<F>(&self, f: &mut F) -> Option<Predicate>
    where
        F: FnMut(&AttrRef) -> Option<AttrRef>,
    {
        match self {
            Predicate::Equality(l, r) => Some(Predicate::Equality(
                map_operand(l, f)?,
                map_operand(r, f)?,
            )),
            Predicate::Comparison(l, op, r) => Some(Predicate::Comparison(
                map_operand(l, f)?,
                *op,
                map_operand(r, f)?,
            )),
            Predicate::Conjunction(ps) => {
                let mut mapped = Vec::with_capacity(ps.len());
                for p in ps {
                    mapped.push(p.map_attributes(f)?);
                }
                Some(Predicate::Conjunction(mapped))
            }
        }
    }

    /// The two attributes of an `attr = attr` equality.
    pub fn as_attribute_equality(&self) -> Option<(&AttrRef, &AttrRef)> {
        match self {
            Predicate::Equality(Operand::Attr(l), Operand::Attr(r)) => Some((l, r)),
            _ => None,
        }
    }

    /// Operands of every non-equality comparison between two attributes.
    pub fn attribute_comparisons(&self) -> Vec<(&AttrRef, &AttrRef)> {
        self.conjuncts()
            .into_iter()
            .filter_map(|p| match p {
                Predicate::Comparison(Operand::Attr(l), _, Operand::Attr(r)) => Some((l, r)),
                _ => None,
            })
            .collect()
    }
}

fn map_operand<F>(operand: &Operand, f: &mut F) -> Option<Operand>
where
    F: FnMut(&AttrRef) -> Option<AttrRef>,
{
    match operand {
        Operand::Attr(a) => f(a).map(Operand::Attr),
        Operand::Literal(v) => Some(Operand::Literal(v.clone())),
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Equality(l, r) => write!(f, "{} = {}", l, r),
            Predicate::Comparison(l, op, r) => write!(f, "{} {} {}", l, op.symbol(), r),
            Predicate::Conjunction(ps) => {
                let parts: Vec<String> = ps.iter().map(|p| p.to_string()).collect();
                write!(f, "{}", parts.join(" and "))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_conjunction_flattens() {
        let a = Predicate::attrs_equal("R.a", "S.b");
        let b = Predicate::attr_equals("R.c", Field::IntField(1));
        let c = Predicate::attr_equals("S.d", Field::IntField(2));
        let inner = Predicate::conjunction(vec![a.clone(), b.clone()]).unwrap();
        let outer = Predicate::conjunction(vec![inner, c.clone()]).unwrap();
        assert_eq!(Predicate::Conjunction(vec![a.clone(), b, c]), outer);
        assert_eq!(Some(a.clone()), Predicate::conjunction(vec![a]));
        assert_eq!(None, Predicate::conjunction(Vec::new()));
    }

    #[test]
    fn test_attributes_and_display() {
        let p = Predicate::attrs_equal("R.a", "b").and(Predicate::Comparison(
            Operand::attr("R.c"),
            ComparisonOp::LessThan,
            Operand::Literal(Field::StringField(String::from("x"))),
        ));
        let attrs: Vec<String> = p.attributes().iter().map(|a| a.to_string()).collect();
        assert_eq!(vec!["R.a", "b", "R.c"], attrs);
        assert_eq!("R.a = b and R.c < 'x'", p.to_string());
        assert!(p.attribute_comparisons().is_empty());
        let q = p.and(Predicate::Comparison(
            Operand::attr("R.a"),
            ComparisonOp::GreaterThanOrEq,
            Operand::attr("S.b"),
        ));
        let pairs: Vec<String> = q
            .attribute_comparisons()
            .iter()
            .map(|(l, r)| format!("{} {}", l, r))
            .collect();
        assert_eq!(vec!["R.a S.b"], pairs);
    }

    #[test]
    fn test_map_attributes() {
        let p = Predicate::attrs_equal("S.a", "S.b");
        let mapped = p
            .map_attributes(&mut |a| Some(AttrRef::new("R", a.column())))
            .unwrap();
        assert_eq!(Predicate::attrs_equal("R.a", "R.b"), mapped);
        assert_eq!(None, p.map_attributes(&mut |_| None));
    }

    #[test]
    fn test_flip() {
        assert_eq!(ComparisonOp::GreaterThan, ComparisonOp::LessThan.flip());
        assert!(ComparisonOp::GreaterThanOrEq.accepts(Ordering::Equal));
        assert!(!ComparisonOp::NotEq.accepts(Ordering::Equal));
    }
}
