//! Relational algebra expressions.

mod predicate;

pub use predicate::{AttrRef, ComparisonOp, Operand, Predicate};

use std::fmt;

/// RA operator tree. Children are owned; rewrites build new trees.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum RaExpr {
    /// Base table reference.
    Relation(String),
    Select {
        predicate: Predicate,
        input: Box<RaExpr>,
    },
    /// Bag projection; the attribute order is the output order.
    Project {
        attributes: Vec<AttrRef>,
        input: Box<RaExpr>,
    },
    /// Relabels the qualifier and, optionally, every column name.
    Rename {
        relation: String,
        columns: Option<Vec<String>>,
        input: Box<RaExpr>,
    },
    CrossProduct {
        left: Box<RaExpr>,
        right: Box<RaExpr>,
    },
    Join {
        predicate: Predicate,
        left: Box<RaExpr>,
        right: Box<RaExpr>,
    },
}

impl RaExpr {
    pub fn relation(name: &str) -> Self {
        RaExpr::Relation(name.to_string())
    }

    pub fn select(self, predicate: Predicate) -> Self {
        RaExpr::Select {
            predicate,
            input: Box::new(self),
        }
    }

    pub fn project(self, attributes: Vec<AttrRef>) -> Self {
        RaExpr::Project {
            attributes,
            input: Box::new(self),
        }
    }

    /// Projection onto attributes given as `relation.column` or `column`.
    pub fn project_names(self, names: &[&str]) -> Self {
        self.project(names.iter().map(|n| AttrRef::parse(n)).collect())
    }

    pub fn rename(self, relation: &str, columns: Option<Vec<String>>) -> Self {
        RaExpr::Rename {
            relation: relation.to_string(),
            columns,
            input: Box::new(self),
        }
    }

    pub fn cross(left: RaExpr, right: RaExpr) -> Self {
        RaExpr::CrossProduct {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn join(predicate: Predicate, left: RaExpr, right: RaExpr) -> Self {
        RaExpr::Join {
            predicate,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Direct children, left to right.
    pub fn inputs(&self) -> Vec<&RaExpr> {
        match self {
            RaExpr::Relation(_) => Vec::new(),
            RaExpr::Select { input, .. }
            | RaExpr::Project { input, .. }
            | RaExpr::Rename { input, .. } => vec![input.as_ref()],
            RaExpr::CrossProduct { left, right } | RaExpr::Join { left, right, .. } => {
                vec![left.as_ref(), right.as_ref()]
            }
        }
    }

    /// Single-input operators that compile to map-only tasks.
    pub fn is_map_only(&self) -> bool {
        matches!(
            self,
            RaExpr::Select { .. } | RaExpr::Project { .. } | RaExpr::Rename { .. }
        )
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, RaExpr::CrossProduct { .. } | RaExpr::Join { .. })
    }

    pub fn node_count(&self) -> usize {
        1 + self.inputs().iter().map(|c| c.node_count()).sum::<usize>()
    }

    pub fn operator_name(&self) -> &'static str {
        match self {
            RaExpr::Relation(_) => "relation",
            RaExpr::Select { .. } => "select",
            RaExpr::Project { .. } => "project",
            RaExpr::Rename { .. } => "rename",
            RaExpr::CrossProduct { .. } => "cross",
            RaExpr::Join { .. } => "join",
        }
    }
}

/// Wraps binary operands in parentheses.
struct Child<'a>(&'a RaExpr);

impl fmt::Display for Child<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_binary() {
            write!(f, "({})", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl fmt::Display for RaExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaExpr::Relation(name) => write!(f, "{}", name),
            RaExpr::Select { predicate, input } => {
                write!(f, "\\select_{{{}}} {}", predicate, Child(input))
            }
            RaExpr::Project { attributes, input } => {
                let names: Vec<String> = attributes.iter().map(|a| a.to_string()).collect();
                write!(f, "\\project_{{{}}} {}", names.join(", "), Child(input))
            }
            RaExpr::Rename {
                relation,
                columns,
                input,
            } => {
                let cols = match columns {
                    Some(cols) => cols.join(", "),
                    None => String::from("*"),
                };
                write!(f, "\\rename_{{{}: {}}} {}", relation, cols, Child(input))
            }
            RaExpr::CrossProduct { left, right } => write!(f, "({}) \\cross ({})", left, right),
            RaExpr::Join {
                predicate,
                left,
                right,
            } => write!(f, "({}) \\join_{{{}}} ({})", left, predicate, right),
        }
    }
}
