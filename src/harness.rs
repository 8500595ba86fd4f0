use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::error::{EvalError, ExecutionError};
use crate::table::{Cell, Table};
use crate::util::write_json_atomic;

/// `Err` is the modeled "query did not run" outcome, not a caller-facing error.
pub type ExecutionOutcome = Result<Table, ExecutionError>;

pub trait QueryEngine {
    fn execute(&self, sql: &str) -> ExecutionOutcome;
}

#[derive(Debug, Clone)]
pub struct SqliteEngine {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteEngine {
    pub fn new(config: &DatabaseConfig) -> Result<Self, EvalError> {
        let path = config.resolved_path()?;
        Ok(Self {
            path,
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> rusqlite::Result<Connection> {
        let connection = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        connection.busy_timeout(self.busy_timeout)?;
        Ok(connection)
    }
}

impl QueryEngine for SqliteEngine {
    fn execute(&self, sql: &str) -> ExecutionOutcome {
        if sql.trim().is_empty() {
            return Err(ExecutionError::new("query text is empty"));
        }

        let connection = self.open().map_err(|err| {
            ExecutionError::new(format!("failed to open {}: {err}", self.path.display()))
        })?;
        query_table(&connection, sql)
    }
}

fn query_table(connection: &Connection, sql: &str) -> Result<Table, ExecutionError> {
    let mut statement = connection.prepare(sql).map_err(execution_error)?;
    let columns = statement
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<String>>();
    let column_count = columns.len();

    let mut rows = statement.query([]).map_err(execution_error)?;
    let mut cells = Vec::<Vec<Cell>>::new();
    while let Some(row) = rows.next().map_err(execution_error)? {
        let mut values = Vec::<Cell>::with_capacity(column_count);
        for index in 0..column_count {
            values.push(cell_from_value(row.get_ref(index).map_err(execution_error)?));
        }
        cells.push(values);
    }

    Table::new(columns, cells).map_err(|err| ExecutionError::new(err.to_string()))
}

fn execution_error(err: rusqlite::Error) -> ExecutionError {
    ExecutionError::new(err.to_string())
}

fn cell_from_value(value: ValueRef<'_>) -> Cell {
    match value {
        ValueRef::Null => Cell::Null,
        ValueRef::Integer(value) => Cell::Integer(value),
        ValueRef::Real(value) => Cell::Real(value),
        ValueRef::Text(bytes) => Cell::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Cell::Blob(bytes.to_vec()),
    }
}

const FENCED_SQL_PATTERN: &str = r"(?si)^```(?:sqlite|postgresql|postgres|sql)?\s*(.*?)\s*```$";

pub fn clean_markdown_sql(sql: &str) -> Result<String, EvalError> {
    let fence = Regex::new(FENCED_SQL_PATTERN)
        .map_err(|err| EvalError::configuration(format!("failed to compile sql fence regex: {err}")))?;

    let trimmed = sql.trim();
    Ok(match fence.captures(trimmed) {
        Some(captures) => captures
            .get(1)
            .map(|body| body.as_str().trim().to_string())
            .unwrap_or_default(),
        None => trimmed.to_string(),
    })
}

pub fn table_artifact_path(artifacts_dir: &Path, run_id: &str) -> PathBuf {
    artifacts_dir.join(format!("{run_id}.table.json"))
}

/// Cleans and executes the generated query once. A failed execution is
/// returned as `Ok(Err(..))` and never retried; on success the table is
/// written to the artifacts directory before it is handed back.
pub fn execute_generated_query(
    engine: &dyn QueryEngine,
    sql: &str,
    run_id: &str,
    artifacts_dir: &Path,
) -> Result<ExecutionOutcome, EvalError> {
    let sql = clean_markdown_sql(sql)?;
    match engine.execute(&sql) {
        Ok(table) => {
            let artifact_path = table_artifact_path(artifacts_dir, run_id);
            write_json_atomic(&artifact_path, &table)?;
            info!(
                run_id = %run_id,
                rows = table.row_count(),
                columns = table.columns().len(),
                artifact = %artifact_path.display(),
                "generated query executed"
            );
            Ok(Ok(table))
        }
        Err(err) => {
            warn!(run_id = %run_id, error = %err, "generated query failed");
            Ok(Err(err))
        }
    }
}
