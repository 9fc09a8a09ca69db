use crate::{DataType, TableSchema};

/// Column of a base relation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub dtype: DataType,
}

/// Table implementation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Columns in storage order.
    pub columns: Vec<Column>,
    /// Path of the record file; `<name>.json` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Table {
    /// Creates a new table with the given name and columns.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of table.
    /// * `columns` - Column names and dtypes.
    pub fn new(name: &str, columns: Vec<(&str, DataType)>) -> Self {
        Table {
            name: name.to_string(),
            columns: columns
                .into_iter()
                .map(|(n, dtype)| Column {
                    name: n.to_string(),
                    dtype,
                })
                .collect(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    /// Schema of the table with every attribute qualified by its name.
    pub fn schema(&self) -> TableSchema {
        TableSchema::from_vecs(
            &self.name,
            self.columns.iter().map(|c| c.name.as_str()).collect(),
            self.columns.iter().map(|c| c.dtype).collect(),
        )
    }

    pub fn location(&self) -> String {
        match &self.location {
            Some(loc) => loc.clone(),
            None => format!("{}.json", self.name),
        }
    }
}
