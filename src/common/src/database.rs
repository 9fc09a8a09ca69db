use crate::catalog::Catalog;
use crate::table::*;
use crate::{DataType, RamrError};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Serialized shape of the full catalog form.
#[derive(Serialize, Deserialize)]
struct DatabaseFile {
    name: String,
    tables: Vec<Table>,
}

/// A named collection of base relations.
#[derive(Clone, Debug, Default)]
pub struct Database {
    /// Name of the database.
    pub name: String,
    tables: HashMap<String, Table>,
    /// Table names in insertion order.
    order: Vec<String>,
}

impl Database {
    /// Initialize a new database with a given name.
    ///
    /// # Arguments
    ///
    /// * `name` - Name for the new database.
    pub fn new(name: &str) -> Self {
        Database {
            name: name.to_string(),
            tables: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Adds a table, replacing and returning any table of the same name.
    pub fn add_table(&mut self, table: Table) -> Option<Table> {
        let name = table.name.clone();
        let previous = self.tables.insert(name.clone(), table);
        if previous.is_none() {
            self.order.push(name);
        }
        previous
    }

    /// Parses either catalog form.
    ///
    /// The full form is `{"name": .., "tables": [..]}`; the data dictionary
    /// form maps relation names to `{column: type}` objects.
    pub fn from_json(json: &str) -> Result<Self, RamrError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if value.get("tables").map_or(false, |t| t.is_array()) {
            let file: DatabaseFile = serde_json::from_value(value)?;
            let mut db = Database::new(&file.name);
            for table in file.tables {
                db.add_table(table);
            }
            return Ok(db);
        }
        Self::from_dictionary(&value)
    }

    fn from_dictionary(value: &serde_json::Value) -> Result<Self, RamrError> {
        let relations = value.as_object().ok_or_else(|| {
            RamrError::ValidationError(String::from("Catalog must be a json object"))
        })?;
        let mut db = Database::new("catalog");
        for (name, columns) in relations {
            let columns = columns.as_object().ok_or_else(|| {
                RamrError::ValidationError(format!("Columns of {} must be a json object", name))
            })?;
            let mut cols = Vec::with_capacity(columns.len());
            for (col, dtype) in columns {
                let dtype: DataType = dtype
                    .as_str()
                    .ok_or_else(|| {
                        RamrError::ValidationError(format!("Type of {}.{} must be a string", name, col))
                    })?
                    .parse()?;
                cols.push((col.as_str(), dtype));
            }
            db.add_table(Table::new(name, cols));
        }
        Ok(db)
    }

    /// Loads a catalog file in either form.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RamrError> {
        let contents = fs::read_to_string(path.as_ref())?;
        let db = Self::from_json(&contents)?;
        info!(
            "Loaded catalog {} with {} tables from {:?}",
            db.name,
            db.order.len(),
            path.as_ref()
        );
        Ok(db)
    }

    /// Serializes into the full catalog form.
    pub fn to_json(&self) -> Result<String, RamrError> {
        let file = DatabaseFile {
            name: self.name.clone(),
            tables: self
                .order
                .iter()
                .filter_map(|n| self.tables.get(n).cloned())
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }
}

impl Catalog for Database {
    fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    fn table_names(&self) -> Vec<String> {
        self.order.clone()
    }
}
