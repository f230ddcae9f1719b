//! Lazily loaded, process-wide schema cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use alder_core::{ColumnInfo, ColumnRef, DatabaseSchema, TableSchema};
use rusqlite::Connection;

use crate::engine::open_read_only;
use crate::error::DatabaseError;

/// Schema metadata per database id, loaded on first access.
///
/// Each database id owns a slot. The map lock is only held to find or create
/// a slot; loading happens under the slot's own mutex, so a slow first load
/// blocks callers of that id and nobody else. Schemas are immutable for the
/// life of the process; there is no invalidation.
pub struct SchemaCache {
    db_root: PathBuf,
    slots: RwLock<HashMap<String, Arc<SchemaSlot>>>,
    loads: AtomicUsize,
}

type SchemaSlot = Mutex<Option<Arc<DatabaseSchema>>>;

impl SchemaCache {
    #[must_use]
    pub fn new(db_root: impl Into<PathBuf>) -> Self {
        Self {
            db_root: db_root.into(),
            slots: RwLock::new(HashMap::new()),
            loads: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn db_root(&self) -> &Path {
        &self.db_root
    }

    /// Location of the database file for `db_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::InvalidDbId`] for ids containing path
    /// separators or parent-directory components.
    pub fn db_path(&self, db_id: &str) -> Result<PathBuf, DatabaseError> {
        db_path(&self.db_root, db_id)
    }

    /// Schema for `db_id`, loading it on first access.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::NotFound`] when the database file is missing
    /// and [`DatabaseError::Sqlite`] when metadata queries fail.
    pub fn get(&self, db_id: &str) -> Result<Arc<DatabaseSchema>, DatabaseError> {
        let path = self.db_path(db_id)?;
        let slot = self.slot(db_id);
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(schema) = guard.as_ref() {
            return Ok(Arc::clone(schema));
        }

        if !path.is_file() {
            return Err(DatabaseError::NotFound {
                db_id: db_id.to_string(),
                path: path.display().to_string(),
            });
        }

        let schema = Arc::new(load_schema(&path)?);
        tracing::debug!(db_id, tables = schema.tables.len(), "schema loaded");
        *guard = Some(Arc::clone(&schema));
        self.loads.fetch_add(1, Ordering::Relaxed);
        Ok(schema)
    }

    fn slot(&self, db_id: &str) -> Arc<SchemaSlot> {
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(db_id)
        {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(db_id.to_string()).or_default())
    }

    /// Database ids that have a database file under the root, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Query`] if the root cannot be listed.
    pub fn discover(&self) -> Result<Vec<String>, DatabaseError> {
        let entries = std::fs::read_dir(&self.db_root).map_err(|e| {
            DatabaseError::Query(format!("list {}: {e}", self.db_root.display()))
        })?;
        let mut ids: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|id| db_path(&self.db_root, id).is_ok_and(|p| p.is_file()))
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Number of schemas actually loaded from disk.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

/// `<db_root>/<db_id>/<db_id>.sqlite`.
///
/// # Errors
///
/// Returns [`DatabaseError::InvalidDbId`] for ids that are empty or would
/// leave `db_root`.
pub fn db_path(db_root: &Path, db_id: &str) -> Result<PathBuf, DatabaseError> {
    if db_id.is_empty() || db_id.contains(['/', '\\']) || db_id == "." || db_id == ".." {
        return Err(DatabaseError::InvalidDbId(db_id.to_string()));
    }
    Ok(db_root.join(db_id).join(format!("{db_id}.sqlite")))
}

/// Read table, column, and key metadata from a database file.
///
/// # Errors
///
/// Returns [`DatabaseError::Sqlite`] if the file cannot be opened or a
/// metadata query fails.
pub fn load_schema(path: &Path) -> Result<DatabaseSchema, DatabaseError> {
    let conn = open_read_only(path)?;

    let mut schema = DatabaseSchema::default();
    for table in table_names(&conn)? {
        let mut columns = read_columns(&conn, &table)?;
        for (column, target) in read_foreign_keys(&conn, &table)? {
            if let Some(info) = columns.get_mut(&column) {
                info.foreign_keys.push(target);
            }
        }
        schema.tables.insert(table, TableSchema { columns });
    }

    resolve_implicit_targets(&mut schema);
    schema.link_back_references();
    Ok(schema)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn table_names(conn: &Connection) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

fn read_columns(
    conn: &Connection,
    table: &str,
) -> Result<std::collections::BTreeMap<String, ColumnInfo>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let columns = stmt
        .query_map([], |row| {
            let name: String = row.get(1)?;
            let column_type: Option<String> = row.get(2)?;
            let pk: i64 = row.get(5)?;
            Ok((
                name,
                ColumnInfo {
                    column_type: column_type.unwrap_or_default(),
                    primary_key: pk > 0,
                    ..ColumnInfo::default()
                },
            ))
        })?
        .collect::<Result<_, _>>()?;
    Ok(columns)
}

/// `(source column, target)` pairs. A target column of `""` stands for the
/// referenced table's primary key and is resolved afterwards.
fn read_foreign_keys(
    conn: &Connection,
    table: &str,
) -> Result<Vec<(String, ColumnRef)>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("PRAGMA foreign_key_list({})", quote_ident(table)))?;
    let keys = stmt
        .query_map([], |row| {
            let target_table: String = row.get(2)?;
            let from: String = row.get(3)?;
            let to: Option<String> = row.get(4)?;
            Ok((from, ColumnRef::new(target_table, to.unwrap_or_default())))
        })?
        .collect::<Result<_, _>>()?;
    Ok(keys)
}

fn resolve_implicit_targets(schema: &mut DatabaseSchema) {
    let primary_keys: Vec<(String, String)> = schema
        .tables
        .iter()
        .filter_map(|(table, t)| {
            t.columns
                .iter()
                .find(|(_, info)| info.primary_key)
                .map(|(column, _)| (table.to_ascii_lowercase(), column.clone()))
        })
        .collect();

    for table in schema.tables.values_mut() {
        for info in table.columns.values_mut() {
            for target in &mut info.foreign_keys {
                if target.column.is_empty() {
                    let lower = target.table.to_ascii_lowercase();
                    if let Some((_, pk)) = primary_keys.iter().find(|(t, _)| *t == lower) {
                        target.column.clone_from(pk);
                    }
                }
            }
        }
    }
}
