use crate::table::*;
use crate::{RamrError, TableSchema};

/// Functions needed to implement a catalog. It keeps track of all available relations and their schemas and locations.
pub trait Catalog {
    /// Get a table from the catalog.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the relation.
    fn get_table(&self, name: &str) -> Option<&Table>;

    /// Names of every relation in the catalog.
    fn table_names(&self) -> Vec<String>;

    /// Checks if the table name is valid in the catalog.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of table to check if it is valid.
    fn is_valid_table(&self, name: &str) -> bool {
        self.get_table(name).is_some()
    }

    /// Checks if the column is valid for the given table.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of table to look for the column name in.
    /// * `col_name` - Name of column to look for in the table.
    fn is_valid_column(&self, name: &str, col_name: &str) -> bool {
        match self.get_table(name) {
            Some(table) => table.columns.iter().any(|c| c.name == col_name),
            None => false,
        }
    }

    /// Gets the table schema from the catalog, every attribute qualified by the table name.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of table to get the schema for.
    fn get_table_schema(&self, name: &str) -> Result<TableSchema, RamrError> {
        match self.get_table(name) {
            Some(table) => Ok(table.schema()),
            None => Err(RamrError::UnknownRelation(name.to_string())),
        }
    }

    /// Gets the storage location of the table.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of table to get the location for.
    fn get_table_location(&self, name: &str) -> Result<String, RamrError> {
        match self.get_table(name) {
            Some(table) => Ok(table.location()),
            None => Err(RamrError::UnknownRelation(name.to_string())),
        }
    }
}
