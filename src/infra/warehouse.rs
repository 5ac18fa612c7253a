use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::app::RelationalSink;
use crate::config::WarehouseConfig;
use crate::constants::WAREHOUSE_TABLES;
use crate::error::{EltError, Result};
use crate::types::{RecordSet, Value};

const MIGRATION_001: &str = include_str!("../../migrations/001_warehouse.sql");

/// SQLite warehouse with the `staging` and `warehouse` schemas attached as
/// separate databases.
///
/// rusqlite is synchronous, so async inserts hand the shared connection to
/// `spawn_blocking`.
pub struct SqliteWarehouse {
    conn: Arc<Mutex<Connection>>,
}

fn ensure_parent(path: &str) -> Result<()> {
    if path != ":memory:" {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}

fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Str(s) => SqlValue::Text(s.clone()),
        Value::Int(n) => SqlValue::Integer(*n),
        Value::Float(f) if f.is_finite() => SqlValue::Real(*f),
        Value::Float(_) => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
    }
}

fn lock_conn<T>(conn: &Mutex<Connection>, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
    let mut conn = conn
        .lock()
        .map_err(|_| EltError::sink("warehouse", "connection lock poisoned"))?;
    f(&mut conn)
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl SqliteWarehouse {
    pub fn open(config: &WarehouseConfig) -> Result<Self> {
        for path in [&config.path, &config.staging_path, &config.warehouse_path] {
            ensure_parent(path)?;
        }
        let conn = Connection::open(&config.path)?;
        conn.execute("ATTACH DATABASE ?1 AS staging", [&config.staging_path])?;
        conn.execute("ATTACH DATABASE ?1 AS warehouse", [&config.warehouse_path])?;
        info!(path = %config.path, "Opened warehouse database");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(&WarehouseConfig::in_memory())
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        lock_conn(&self.conn, f)
    }

    /// Create every warehouse table. Safe to run repeatedly.
    pub fn migrate(&self) -> Result<()> {
        info!("Running warehouse migrations...");
        self.with_conn(|conn| {
            conn.execute_batch(MIGRATION_001)
                .map_err(|e| EltError::sink("warehouse", format!("Failed to run warehouse migration: {e}")))
        })?;
        info!("Warehouse migrations completed successfully");
        Ok(())
    }

    fn check_table(table: &str) -> Result<(&str, &str)> {
        if !WAREHOUSE_TABLES.contains(&table) {
            return Err(EltError::sink(table, "unknown warehouse table"));
        }
        table
            .split_once('.')
            .ok_or_else(|| EltError::sink(table, "table name must be schema-qualified"))
    }

    pub fn row_count(&self, table: &str) -> Result<i64> {
        let (schema, name) = Self::check_table(table)?;
        let sql = format!("SELECT COUNT(*) FROM {schema}.{}", quote_ident(name));
        self.with_conn(|conn| Ok(conn.query_row(&sql, [], |row| row.get(0))?))
    }

    fn insert_rows(conn: &Mutex<Connection>, table: &str, records: &RecordSet) -> Result<usize> {
        let (schema, name) = Self::check_table(table)?;
        let columns = records
            .column_names()
            .into_iter()
            .map(quote_ident)
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; records.columns().len()].join(", ");
        let sql = format!(
            "INSERT INTO {schema}.{} ({columns}) VALUES ({placeholders}) ON CONFLICT DO NOTHING",
            quote_ident(name)
        );

        lock_conn(conn, |conn| {
            // Dropping the transaction on any error rolls the batch back.
            let tx = conn.transaction()?;
            let mut inserted = 0;
            {
                let mut stmt = tx.prepare(&sql)?;
                for row in records.rows() {
                    inserted += stmt.execute(params_from_iter(row.iter().map(sql_value)))?;
                }
            }
            tx.commit()?;
            Ok(inserted)
        })
        .map_err(|e| match e {
            EltError::Sink { .. } => e,
            other => EltError::sink(table, other),
        })
    }
}

#[async_trait]
impl RelationalSink for SqliteWarehouse {
    async fn bulk_insert(&self, table: &str, records: &RecordSet) -> Result<usize> {
        if records.is_empty() {
            Self::check_table(table)?;
            warn!(table, "Empty record set, nothing to insert");
            return Ok(0);
        }
        let conn = Arc::clone(&self.conn);
        let owned_table = table.to_string();
        let owned_records = records.clone();
        let inserted = tokio::task::spawn_blocking(move || {
            Self::insert_rows(&conn, &owned_table, &owned_records)
        })
        .await
        .map_err(|e| EltError::sink(table, format!("insert task failed: {e}")))??;
        let skipped = records.len() - inserted;
        info!(table, inserted, skipped, "Loaded rows into warehouse");
        Ok(inserted)
    }
}
