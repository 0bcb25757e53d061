use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use parking_lot::RwLock;
use serde::Deserialize;
use anyhow::{Context, Result as AnyResult};

use crate::core::error::{Result, StorageError};
use crate::storage::heap_file::HeapFile;
use crate::storage::tuple::{Type, TupleDesc};

pub struct TableInfo {
    pub name: String,
    pub file: Arc<HeapFile>,
    pub primary_key: Option<String>,
}

/// Maps table ids to the heap files that back them.
#[derive(Default)]
pub struct Catalog {
    tables: RwLock<HashMap<u32, TableInfo>>,
}

#[derive(Debug, Deserialize)]
struct SchemaFile {
    #[serde(default, rename = "table")]
    tables: Vec<TableSchema>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    name: String,
    file: String,
    #[serde(default)]
    primary_key: Option<String>,
    columns: Vec<ColumnDef>,
}

#[derive(Debug, Deserialize)]
struct ColumnDef {
    name: String,
    #[serde(rename = "type")]
    col_type: String,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `file` under `name` and returns its table id. An existing
    /// table with the same name or id is replaced.
    pub fn add_table(&self, file: HeapFile, name: &str, primary_key: Option<String>) -> u32 {
        let table_id = file.id();
        let mut tables = self.tables.write();
        tables.retain(|_, info| info.name != name);
        tables.insert(
            table_id,
            TableInfo {
                name: name.to_string(),
                file: Arc::new(file),
                primary_key,
            },
        );
        table_id
    }

    pub fn database_file(&self, table_id: u32) -> Result<Arc<HeapFile>> {
        self.tables
            .read()
            .get(&table_id)
            .map(|info| info.file.clone())
            .ok_or(StorageError::UnknownTable(table_id))
    }

    pub fn tuple_desc(&self, table_id: u32) -> Result<Arc<TupleDesc>> {
        Ok(self.database_file(table_id)?.tuple_desc().clone())
    }

    pub fn table_id(&self, name: &str) -> Option<u32> {
        self.tables
            .read()
            .iter()
            .find(|(_, info)| info.name == name)
            .map(|(id, _)| *id)
    }

    pub fn table_name(&self, table_id: u32) -> Option<String> {
        self.tables.read().get(&table_id).map(|info| info.name.clone())
    }

    pub fn primary_key(&self, table_id: u32) -> Option<String> {
        self.tables
            .read()
            .get(&table_id)
            .and_then(|info| info.primary_key.clone())
    }

    pub fn table_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.tables.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn clear(&self) {
        self.tables.write().clear();
    }

    /// Loads table definitions from a TOML schema file. Data file paths are
    /// resolved relative to the schema file's directory.
    pub fn load_schema(&self, path: &Path, page_size: usize) -> AnyResult<Vec<u32>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading schema {}", path.display()))?;
        let schema: SchemaFile = toml::from_str(&content)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

        let mut ids = Vec::with_capacity(schema.tables.len());
        for table in schema.tables {
            let mut types = Vec::with_capacity(table.columns.len());
            let mut names = Vec::with_capacity(table.columns.len());
            for column in &table.columns {
                types.push(column.col_type.parse::<Type>()?);
                names.push(Some(column.name.clone()));
            }
            let desc = TupleDesc::new(types, names);
            if let Some(pk) = &table.primary_key {
                if desc.index_of(pk).is_none() {
                    anyhow::bail!("primary key '{}' is not a column of table '{}'", pk, table.name);
                }
            }

            let file = HeapFile::open(&base_dir.join(&table.file), desc, page_size)
                .with_context(|| format!("opening table '{}'", table.name))?;
            ids.push(self.add_table(file, &table.name, table.primary_key));
        }
        Ok(ids)
    }
}
