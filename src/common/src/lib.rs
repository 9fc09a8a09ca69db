#[macro_use]
extern crate serde;
#[macro_use]
extern crate log;

use std::cmp::Ordering;
use std::error::Error;
use std::fmt;
use std::io;
use std::str::FromStr;

pub mod catalog;
pub mod database;
pub mod ids;
pub mod ra;
pub mod schema;
pub mod table;
pub mod testutil;

pub use ra::{AttrRef, ComparisonOp, Operand, Predicate, RaExpr};

/// Label used for records of a schema without attributes.
pub const EMPTY_RELATION_LABEL: &str = "result";

/// Custom error type.
#[derive(Debug, Clone, PartialEq)]
pub enum RamrError {
    /// Reference to a column not present in the relevant schema.
    UnknownAttribute(String),
    /// Unqualified reference resolvable to more than one column.
    AmbiguousAttribute(String),
    /// Condition outside the supported equality-and-conjunction subset.
    UnsupportedPredicate(Predicate),
    /// Column rename list that disagrees with the input's column count.
    SchemaMismatch {
        relation: String,
        expected: usize,
        found: usize,
    },
    /// Relation missing from the catalog.
    UnknownRelation(String),
    /// Errors from translating and validating SQL.
    ValidationError(String),
    /// Errors raised while running a task graph.
    ExecutionError(String),
    /// IO Errors.
    IOError(String),
}

impl fmt::Display for RamrError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RamrError::UnknownAttribute(s) => write!(f, "Unknown attribute: {}", s),
            RamrError::AmbiguousAttribute(s) => write!(f, "Ambiguous attribute: {}", s),
            RamrError::UnsupportedPredicate(p) => write!(f, "Unsupported predicate: {}", p),
            RamrError::SchemaMismatch {
                relation,
                expected,
                found,
            } => write!(
                f,
                "Schema mismatch renaming to {}: input has {} columns, {} names given",
                relation, expected, found
            ),
            RamrError::UnknownRelation(s) => write!(f, "Unknown relation: {}", s),
            RamrError::ValidationError(s) => write!(f, "Validation Error: {}", s),
            RamrError::ExecutionError(s) => write!(f, "Execution Error: {}", s),
            RamrError::IOError(s) => write!(f, "{}", s),
        }
    }
}

impl From<io::Error> for RamrError {
    fn from(error: io::Error) -> Self {
        RamrError::IOError(error.to_string())
    }
}

impl From<serde_json::Error> for RamrError {
    fn from(error: serde_json::Error) -> Self {
        RamrError::IOError(format!("Malformed json: {}", error))
    }
}

impl Error for RamrError {}

/// Enumerate the supported dtypes.
#[derive(PartialEq, Eq, Serialize, Deserialize, Clone, Copy, Debug)]
pub enum DataType {
    #[serde(rename = "integer", alias = "int")]
    Int,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "string", alias = "str")]
    String,
}

impl FromStr for DataType {
    type Err = RamrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match &s.to_lowercase()[..] {
            "int" | "integer" => Ok(DataType::Int),
            "float" | "double" | "real" => Ok(DataType::Float),
            "str" | "string" | "text" | "varchar" => Ok(DataType::String),
            other => Err(RamrError::ValidationError(format!(
                "Unsupported data type {}",
                other
            ))),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Int => "integer",
            DataType::Float => "float",
            DataType::String => "string",
        };
        write!(f, "{}", name)
    }
}

/// A single value of a record or a predicate literal.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(untagged)]
pub enum Field {
    IntField(i64),
    FloatField(f64),
    StringField(String),
}

impl Field {
    /// Compares two fields, treating integers and floats as numbers.
    ///
    /// Returns `None` for values of incomparable types.
    pub fn compare(&self, other: &Field) -> Option<Ordering> {
        match (self, other) {
            (Field::IntField(a), Field::IntField(b)) => Some(a.cmp(b)),
            (Field::IntField(a), Field::FloatField(b)) => (*a as f64).partial_cmp(b),
            (Field::FloatField(a), Field::IntField(b)) => a.partial_cmp(&(*b as f64)),
            (Field::FloatField(a), Field::FloatField(b)) => a.partial_cmp(b),
            (Field::StringField(a), Field::StringField(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Equality under the same numeric rules as `compare`.
    pub fn matches(&self, other: &Field) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }

    /// Canonical partition key. Fields that `match` produce the same key.
    pub fn key(&self) -> String {
        match self {
            Field::IntField(i) => i.to_string(),
            Field::FloatField(x) if x.fract() == 0.0 && x.abs() < 9.0e15 => {
                (*x as i64).to_string()
            }
            Field::FloatField(x) => x.to_string(),
            Field::StringField(s) => format!("{:?}", s),
        }
    }

    /// Returns the dtype of the field.
    pub fn dtype(&self) -> DataType {
        match self {
            Field::IntField(_) => DataType::Int,
            Field::FloatField(_) => DataType::Float,
            Field::StringField(_) => DataType::String,
        }
    }

    /// Converts a json scalar into a field.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, RamrError> {
        match value {
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Field::IntField(i)),
                None => n.as_f64().map(Field::FloatField).ok_or_else(|| {
                    RamrError::ExecutionError(format!("Unsupported number {}", n))
                }),
            },
            serde_json::Value::String(s) => Ok(Field::StringField(s.clone())),
            other => Err(RamrError::ExecutionError(format!(
                "Unsupported value {}",
                other
            ))),
        }
    }

    /// Converts the field into a json scalar.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Field::IntField(i) => serde_json::Value::from(*i),
            Field::FloatField(x) => serde_json::Value::from(*x),
            Field::StringField(s) => serde_json::Value::from(s.clone()),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::IntField(x) => write!(f, "{}", x),
            Field::FloatField(x) => write!(f, "{}", x),
            Field::StringField(x) => write!(f, "{}", x),
        }
    }
}

/// Tuple type.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct Tuple {
    /// Tuple data.
    pub field_vals: Vec<Field>,
}

impl Tuple {
    /// Create a new tuple with the given data.
    ///
    /// # Arguments
    ///
    /// * `field_vals` - Field values of the tuple.
    pub fn new(field_vals: Vec<Field>) -> Self {
        Self { field_vals }
    }

    /// Get the field at index.
    ///
    /// # Arguments
    ///
    /// * `i` - Index of the field.
    pub fn get_field(&self, i: usize) -> Option<&Field> {
        self.field_vals.get(i)
    }

    /// Returns an iterator over the field values.
    pub fn field_vals(&self) -> impl Iterator<Item = &Field> {
        self.field_vals.iter()
    }

    /// Return the length of the tuple.
    pub fn size(&self) -> usize {
        self.field_vals.len()
    }

    /// Append another tuple with self.
    ///
    /// # Arguments
    ///
    /// * `other` - Other tuple to append.
    pub fn merge(&self, other: &Self) -> Self {
        let mut fields = self.field_vals.clone();
        fields.extend(other.field_vals.iter().cloned());
        Self::new(fields)
    }

    /// Keeps the fields at the given indices, in that order.
    ///
    /// # Panics
    ///
    /// Panics if an index is out-of-bounds.
    pub fn project(&self, indices: &[usize]) -> Self {
        Self::new(indices.iter().map(|i| self.field_vals[*i].clone()).collect())
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut res = String::new();
        for field in &self.field_vals {
            res.push_str(&field.to_string());
            res.push('\t');
        }
        write!(f, "{}", res)
    }
}

/// A column of a schema together with the relation that qualifies it.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
pub struct Attribute {
    /// Qualifying relation name.
    pub relation: String,
    /// Attribute name.
    pub name: String,
    /// Attribute dtype.
    pub dtype: DataType,
}

impl Attribute {
    /// Create a new attribute with the given qualifier, name and dtype.
    pub fn new(relation: &str, name: &str, dtype: DataType) -> Self {
        Self {
            relation: relation.to_string(),
            name: name.to_string(),
            dtype,
        }
    }

    /// Returns the name of the attribute.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the qualifying relation.
    pub fn relation(&self) -> &str {
        &self.relation
    }

    /// Returns the dtype of the attribute.
    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Returns `relation.name`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.relation, self.name)
    }

    /// Checks whether a reference could denote this attribute.
    pub fn matches(&self, attr: &AttrRef) -> bool {
        attr.column() == self.name && attr.relation().map_or(true, |r| r == self.relation)
    }

    /// Two attributes with the same qualified name denote the same column.
    pub fn same_identity(&self, other: &Attribute) -> bool {
        self.relation == other.relation && self.name == other.name
    }

    /// Fully qualified reference to this attribute.
    pub fn to_attr_ref(&self) -> AttrRef {
        AttrRef::new(&self.relation, &self.name)
    }
}

/// Ordered list of qualified attributes produced by a relation or RA subtree.
#[derive(Serialize, Deserialize, PartialEq, Clone, Debug, Default)]
#[serde(transparent)]
pub struct TableSchema {
    /// Attributes of the schema.
    attributes: Vec<Attribute>,
}

impl TableSchema {
    /// Create a new schema.
    ///
    /// # Arguments
    ///
    /// * `attributes` - Attributes of the schema in the order that they are in the schema.
    pub fn new(attributes: Vec<Attribute>) -> Self {
        Self { attributes }
    }

    /// Create a new schema of `relation` with the given names and dtypes.
    pub fn from_vecs(relation: &str, names: Vec<&str>, dtypes: Vec<DataType>) -> Self {
        let attrs = names
            .iter()
            .zip(dtypes.iter())
            .map(|(name, dtype)| Attribute::new(relation, name, *dtype))
            .collect();
        TableSchema::new(attrs)
    }

    /// Get the attribute from the given index.
    pub fn get_attribute(&self, i: usize) -> Option<&Attribute> {
        self.attributes.get(i)
    }

    /// Get an iterator of the attributes.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    /// Returns the length of the schema.
    pub fn size(&self) -> usize {
        self.attributes.len()
    }

    /// Qualified names in schema order.
    pub fn qualified_names(&self) -> Vec<String> {
        self.attributes.iter().map(|a| a.qualified_name()).collect()
    }

    /// Resolves a reference to its position in the schema.
    ///
    /// Qualified references match `relation.column` exactly, unqualified
    /// ones match on the column name alone.
    pub fn index_of(&self, attr: &AttrRef) -> Result<usize, RamrError> {
        let mut found = None;
        for (i, candidate) in self.attributes.iter().enumerate() {
            if candidate.matches(attr) {
                if found.is_some() {
                    return Err(RamrError::AmbiguousAttribute(attr.to_string()));
                }
                found = Some(i);
            }
        }
        found.ok_or_else(|| RamrError::UnknownAttribute(attr.to_string()))
    }

    /// Check if the reference resolves to exactly one attribute.
    pub fn contains(&self, attr: &AttrRef) -> bool {
        self.index_of(attr).is_ok()
    }

    /// Position of the unique attribute with the same qualified name.
    pub fn position_of(&self, attr: &Attribute) -> Option<usize> {
        let mut hits = self
            .attributes
            .iter()
            .enumerate()
            .filter(|(_, a)| a.same_identity(attr))
            .map(|(i, _)| i);
        match (hits.next(), hits.next()) {
            (Some(i), None) => Some(i),
            _ => None,
        }
    }

    /// Merge two schemas into one.
    ///
    /// The other schema is appended to the current schema.
    pub fn merge(&self, other: &Self) -> Self {
        let mut attrs = self.attributes.clone();
        attrs.extend(other.attributes.iter().cloned());
        Self::new(attrs)
    }

    /// Keeps the attributes at the given indices, in that order.
    pub fn project(&self, indices: &[usize]) -> Self {
        Self::new(
            indices
                .iter()
                .filter_map(|i| self.attributes.get(*i).cloned())
                .collect(),
        )
    }

    /// Replaces the qualifier of every attribute.
    pub fn requalify(&self, relation: &str) -> Self {
        Self::new(
            self.attributes
                .iter()
                .map(|a| Attribute::new(relation, &a.name, a.dtype))
                .collect(),
        )
    }

    /// Replaces the qualifier and, positionally, every column name.
    pub fn rename_columns(&self, relation: &str, names: &[String]) -> Result<Self, RamrError> {
        if names.len() != self.attributes.len() {
            return Err(RamrError::SchemaMismatch {
                relation: relation.to_string(),
                expected: self.attributes.len(),
                found: names.len(),
            });
        }
        Ok(Self::new(
            self.attributes
                .iter()
                .zip(names.iter())
                .map(|(a, n)| Attribute::new(relation, n, a.dtype))
                .collect(),
        ))
    }

    /// Fails if two attributes share a qualified name.
    pub fn check_unique(&self) -> Result<(), RamrError> {
        for (i, a) in self.attributes.iter().enumerate() {
            if self.attributes[i + 1..].iter().any(|b| b.same_identity(a)) {
                return Err(RamrError::AmbiguousAttribute(a.qualified_name()));
            }
        }
        Ok(())
    }
}
