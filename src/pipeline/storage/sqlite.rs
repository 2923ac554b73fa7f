use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::{unknown_columns, StagingSink};
use crate::dataset::{ColumnKind, Dataset, Value};
use crate::error::{EtlError, Result};

/// How long a writer waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Staging table in a local SQLite file.
///
/// A connection is opened per operation, so concurrent runs rely on SQLite's
/// own locking and may interleave at transaction granularity.
#[derive(Debug, Clone)]
pub struct SqliteStagingSink {
    db_path: PathBuf,
    table: String,
}

impl SqliteStagingSink {
    pub fn open<P: AsRef<Path>>(db_path: P, table: &str) -> Result<Self> {
        if table.trim().is_empty() {
            return Err(EtlError::Config("staging table name is empty".to_string()));
        }
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            db_path,
            table: table.to_string(),
        })
    }

    fn connect(&self) -> anyhow::Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(conn)
    }

    fn append_rows(&self, dataset: &Dataset) -> anyhow::Result<usize> {
        let mut conn = self.connect()?;
        // Take the write lock up front so concurrent appenders wait on the busy timeout
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        match existing_columns(&tx, &self.table)? {
            None => {
                tx.execute_batch(&create_table_sql(&self.table, dataset))?;
                info!("Created staging table '{}'", self.table);
            }
            Some(existing) => {
                let unknown = unknown_columns(dataset.columns(), &existing);
                if !unknown.is_empty() {
                    anyhow::bail!("columns {:?} do not exist in the staging table", unknown);
                }
            }
        }

        {
            let mut stmt = tx.prepare(&insert_sql(&self.table, dataset.columns()))?;
            for row in dataset.rows() {
                stmt.execute(params_from_iter(row.iter().map(to_sql_value)))?;
            }
        }
        tx.commit()?;
        Ok(dataset.row_count())
    }

    fn read_rows(&self) -> anyhow::Result<Dataset> {
        let conn = self.connect()?;
        let Some(columns) = existing_columns(&conn, &self.table)? else {
            debug!("Staging table '{}' does not exist yet", self.table);
            return Ok(Dataset::default());
        };

        let select = format!(
            "SELECT {} FROM {} ORDER BY rowid",
            columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
            quote_ident(&self.table)
        );
        let width = columns.len();
        let mut dataset = Dataset::new(columns)?;
        let mut stmt = conn.prepare(&select)?;
        let mut rows = stmt.query(params![])?;
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(width);
            for idx in 0..width {
                let value: SqlValue = row.get(idx)?;
                cells.push(from_sql_value(value));
            }
            dataset.push_row(cells)?;
        }
        Ok(dataset)
    }
}

impl StagingSink for SqliteStagingSink {
    fn table_name(&self) -> &str {
        &self.table
    }

    #[instrument(skip(self, dataset), fields(table = %self.table, rows = dataset.row_count()))]
    fn append(&self, dataset: &Dataset) -> Result<usize> {
        if dataset.is_empty() {
            debug!("Nothing to append");
            return Ok(0);
        }
        let written = self
            .append_rows(dataset)
            .map_err(|e| EtlError::StagingAppend {
                table: self.table.clone(),
                message: format!("{e:#}"),
            })?;
        info!("Appended {} rows to staging table '{}'", written, self.table);
        Ok(written)
    }

    #[instrument(skip(self), fields(table = %self.table))]
    fn read_all(&self) -> Result<Dataset> {
        self.read_rows().map_err(|e| EtlError::StagingRead {
            table: self.table.clone(),
            message: format!("{e:#}"),
        })
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn sql_affinity(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Integer => "INTEGER",
        ColumnKind::Float => "REAL",
        ColumnKind::Text => "TEXT",
    }
}

/// Column names of `table`, or `None` when it does not exist
fn existing_columns(conn: &Connection, table: &str) -> anyhow::Result<Option<Vec<String>>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let mut rows = stmt.query(params![])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        columns.push(name);
    }
    Ok(if columns.is_empty() { None } else { Some(columns) })
}

fn create_table_sql(table: &str, dataset: &Dataset) -> String {
    let columns = dataset
        .column_kinds()
        .into_iter()
        .map(|(name, kind)| format!("{} {}", quote_ident(&name), sql_affinity(kind)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE IF NOT EXISTS {} ({});", quote_ident(table), columns)
}

fn insert_sql(table: &str, columns: &[String]) -> String {
    let names = columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ");
    let placeholders = (1..=columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        names,
        placeholders
    )
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        v if v.is_missing() => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Missing => SqlValue::Null,
    }
}

fn from_sql_value(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Missing,
        SqlValue::Integer(i) => Value::Integer(i),
        SqlValue::Real(f) => Value::Float(f),
        SqlValue::Text(s) => Value::Text(s),
        SqlValue::Blob(bytes) => Value::Text(String::from_utf8_lossy(&bytes).into_owned()),
    }
}
