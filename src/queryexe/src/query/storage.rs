use common::table::Table;
use common::{DataType, Field, RamrError, TableSchema, Tuple, EMPTY_RELATION_LABEL};
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use std::sync::RwLock;

/// Line-oriented record store read and written by task graphs.
pub trait Storage: Send + Sync {
    /// Returns every line stored at `path`.
    fn read_lines(&self, path: &str) -> Result<Vec<String>, RamrError>;

    /// Replaces the content of `path` with `lines`.
    fn write_lines(&self, path: &str, lines: &[String]) -> Result<(), RamrError>;

    fn exists(&self, path: &str) -> bool;

    /// Size in bytes of the content at `path`, one newline per line.
    fn byte_size(&self, path: &str) -> Result<u64, RamrError>;

    fn remove(&self, path: &str) -> Result<(), RamrError>;
}

/// In-memory storage used for mock execution.
#[derive(Default)]
pub struct MemoryStorage {
    files: RwLock<HashMap<String, Vec<String>>>,
}

fn poisoned<E>(_: E) -> RamrError {
    RamrError::ExecutionError(String::from("Storage lock poisoned"))
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths currently stored, sorted.
    pub fn paths(&self) -> Result<Vec<String>, RamrError> {
        let files = self.files.read().map_err(poisoned)?;
        let mut paths: Vec<String> = files.keys().cloned().collect();
        paths.sort();
        Ok(paths)
    }
}

impl Storage for MemoryStorage {
    fn read_lines(&self, path: &str) -> Result<Vec<String>, RamrError> {
        let files = self.files.read().map_err(poisoned)?;
        files
            .get(path)
            .cloned()
            .ok_or_else(|| RamrError::IOError(format!("No such file: {}", path)))
    }

    fn write_lines(&self, path: &str, lines: &[String]) -> Result<(), RamrError> {
        let mut files = self.files.write().map_err(poisoned)?;
        debug!("Writing {} lines to {}", lines.len(), path);
        files.insert(path.to_string(), lines.to_vec());
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.files
            .read()
            .map(|files| files.contains_key(path))
            .unwrap_or(false)
    }

    fn byte_size(&self, path: &str) -> Result<u64, RamrError> {
        let lines = self.read_lines(path)?;
        Ok(lines.iter().map(|l| l.len() as u64 + 1).sum())
    }

    fn remove(&self, path: &str) -> Result<(), RamrError> {
        let mut files = self.files.write().map_err(poisoned)?;
        files.remove(path);
        Ok(())
    }
}

/// Storage backed by files below a data directory.
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Creates the storage, creating `root` if needed.
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<Self, RamrError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        info!("Using data directory {:?}", root);
        Ok(Self { root })
    }

    fn path_of(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl Storage for FsStorage {
    fn read_lines(&self, path: &str) -> Result<Vec<String>, RamrError> {
        let content = fs::read_to_string(self.path_of(path))
            .map_err(|e| RamrError::IOError(format!("Reading {}: {}", path, e)))?;
        Ok(content.lines().map(|l| l.to_string()).collect())
    }

    fn write_lines(&self, path: &str, lines: &[String]) -> Result<(), RamrError> {
        let target = self.path_of(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut content = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
        for line in lines {
            content.push_str(line);
            content.push('\n');
        }
        debug!("Writing {} lines to {:?}", lines.len(), target);
        fs::write(target, content)?;
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.path_of(path).exists()
    }

    fn byte_size(&self, path: &str) -> Result<u64, RamrError> {
        Ok(fs::metadata(self.path_of(path))?.len())
    }

    fn remove(&self, path: &str) -> Result<(), RamrError> {
        let target = self.path_of(path);
        if target.exists() {
            fs::remove_file(target)?;
        }
        Ok(())
    }
}

/// Encodes a record as `label<TAB>{"relation.column": value, ..}`.
///
/// The label is the relation qualifying the first attribute.
pub fn encode_record(tuple: &Tuple, schema: &TableSchema) -> Result<String, RamrError> {
    if tuple.size() != schema.size() {
        return Err(RamrError::ExecutionError(format!(
            "Record {} does not fit schema {:?}",
            tuple,
            schema.qualified_names()
        )));
    }
    let label = schema
        .get_attribute(0)
        .map_or(EMPTY_RELATION_LABEL, |a| a.relation());
    let mut object = serde_json::Map::new();
    for (attr, field) in schema.attributes().zip(tuple.field_vals()) {
        object.insert(attr.qualified_name(), field.to_json());
    }
    Ok(format!(
        "{}\t{}",
        label,
        serde_json::Value::Object(object)
    ))
}

/// Decodes a record line against `schema`.
///
/// Keys are looked up by qualified name, then by bare column name. Lines
/// without a label are read as a bare json object.
pub fn decode_record(line: &str, schema: &TableSchema) -> Result<Tuple, RamrError> {
    let body = match line.find('\t') {
        Some(i) => &line[i + 1..],
        None => line,
    };
    let value: serde_json::Value = serde_json::from_str(body)?;
    let object = value
        .as_object()
        .ok_or_else(|| RamrError::ExecutionError(format!("Record is not an object: {}", body)))?;
    let mut fields = Vec::with_capacity(schema.size());
    for attr in schema.attributes() {
        let v = object
            .get(&attr.qualified_name())
            .or_else(|| object.get(attr.name()))
            .ok_or_else(|| {
                RamrError::ExecutionError(format!(
                    "Record {} has no value for {}",
                    body,
                    attr.qualified_name()
                ))
            })?;
        fields.push(Field::from_json(v)?);
    }
    Ok(Tuple::new(fields))
}

/// Converts headerless CSV data into the records of a base relation.
///
/// Fields are parsed following the dtypes of `schema`.
pub fn import_csv<R: Read>(reader: R, schema: &TableSchema) -> Result<Vec<String>, RamrError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(reader);
    let mut lines = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let rec = result.map_err(|e| RamrError::IOError(format!("Could not read row: {}", e)))?;
        if rec.len() != schema.size() {
            return Err(RamrError::ValidationError(format!(
                "Row {} has {} fields, expected {}",
                row,
                rec.len(),
                schema.size()
            )));
        }
        let mut tuple = Tuple::new(Vec::with_capacity(rec.len()));
        for (field, attr) in rec.iter().zip(schema.attributes()) {
            let invalid = || {
                RamrError::ValidationError(format!(
                    "Row {}: {:?} is not a valid {} for {}",
                    row,
                    field,
                    attr.dtype(),
                    attr.qualified_name()
                ))
            };
            let value = match attr.dtype() {
                DataType::Int => Field::IntField(field.trim().parse().map_err(|_| invalid())?),
                DataType::Float => Field::FloatField(field.trim().parse().map_err(|_| invalid())?),
                DataType::String => Field::StringField(field.to_string()),
            };
            tuple.field_vals.push(value);
        }
        lines.push(encode_record(&tuple, schema)?);
    }
    info!("Num records imported: {:?}", lines.len());
    Ok(lines)
}

/// Imports CSV data into the location of `table`.
pub fn import_table<R: Read>(
    storage: &dyn Storage,
    table: &Table,
    reader: R,
) -> Result<usize, RamrError> {
    let lines = import_csv(reader, &table.schema())?;
    storage.write_lines(&table.location(), &lines)?;
    Ok(lines.len())
}

/// Stores `tuples` as the content of `table`.
pub fn write_table(storage: &dyn Storage, table: &Table, tuples: &[Tuple]) -> Result<(), RamrError> {
    let schema = table.schema();
    let lines = tuples
        .iter()
        .map(|t| encode_record(t, &schema))
        .collect::<Result<Vec<_>, _>>()?;
    storage.write_lines(&table.location(), &lines)
}
