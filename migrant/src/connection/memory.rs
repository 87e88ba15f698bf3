use super::{ConnectionProvider, Schema, SqlValue};
use crate::common::{atomic, Atomic, ReadExecutor, WriteExecutor};
use crate::errors::{ErrorKind, MigrantError, MigrantResult};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::params_from_iter;
use std::sync::Arc;

/// Connection backed by an in-memory SQLite database.
///
/// Statements run through `rusqlite` unchanged, so migrations written for
/// SQLite run here as they would against a file. Transactions map to
/// `BEGIN`/`COMMIT`/`ROLLBACK`; DDL is transactional as well.
///
/// Statements containing a registered fragment (see
/// [`InMemoryConnection::fail_on`]) fail with [`ErrorKind::ConnectionError`]
/// before reaching the database, which lets tests break a migration at an
/// exact point.
///
/// Clones share the same database.
#[derive(Clone)]
pub struct InMemoryConnection {
    inner: Arc<InMemoryConnectionInner>,
}

impl InMemoryConnection {
    pub fn new() -> MigrantResult<Self> {
        Ok(InMemoryConnection {
            inner: Arc::new(InMemoryConnectionInner::new()?),
        })
    }

    /// Makes every later statement whose text contains `fragment`
    /// (case-insensitive) fail.
    pub fn fail_on(&self, fragment: &str) {
        self.inner
            .state
            .write_with(|state| state.failures.push(fragment.to_lowercase()));
    }

    /// Removes every registered failure.
    pub fn clear_failures(&self) {
        self.inner.state.write_with(|state| state.failures.clear());
    }

    /// Number of `execute_statement` calls, failed ones included.
    pub fn execute_count(&self) -> usize {
        self.inner.state.read_with(|state| state.execute_count)
    }

    /// Statements that executed successfully, in order.
    pub fn statement_log(&self) -> Vec<String> {
        self.inner.state.read_with(|state| state.log.clone())
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.inner
            .table_names()
            .map(|tables| tables.iter().any(|t| t.eq_ignore_ascii_case(name)))
            .unwrap_or(false)
    }

    /// Number of rows in a table, `None` when the table does not exist.
    pub fn row_count(&self, name: &str) -> Option<usize> {
        if !self.has_table(name) {
            return None;
        }
        let sql = format!("SELECT COUNT(*) FROM \"{}\"", name.replace('"', "\"\""));
        self.inner
            .db
            .lock()
            .query_row(&sql, [], |row| row.get::<_, i64>(0))
            .ok()
            .map(|count| count as usize)
    }

    pub fn in_transaction(&self) -> bool {
        !self.inner.db.lock().is_autocommit()
    }
}

impl ConnectionProvider for InMemoryConnection {
    fn begin_transaction(&self) -> MigrantResult<()> {
        self.inner.transaction_command("BEGIN", "begin a transaction")
    }

    fn commit(&self) -> MigrantResult<()> {
        self.inner.transaction_command("COMMIT", "commit")
    }

    fn rollback(&self) -> MigrantResult<()> {
        self.inner.transaction_command("ROLLBACK", "roll back")
    }

    fn execute_statement(&self, sql: &str, params: &[SqlValue]) -> MigrantResult<u64> {
        self.inner.execute_statement(sql, params)
    }

    fn query_column(&self, sql: &str, params: &[SqlValue]) -> MigrantResult<Vec<String>> {
        self.inner.query_column(sql, params)
    }

    fn introspect_schema(&self) -> MigrantResult<Schema> {
        Ok(Schema::new(self.inner.table_names()?))
    }
}

#[derive(Default)]
struct MemoryState {
    failures: Vec<String>,
    log: Vec<String>,
    execute_count: usize,
}

struct InMemoryConnectionInner {
    db: Mutex<rusqlite::Connection>,
    state: Atomic<MemoryState>,
}

impl InMemoryConnectionInner {
    fn new() -> MigrantResult<Self> {
        let db = rusqlite::Connection::open_in_memory().map_err(|e| {
            MigrantError::new(
                &format!("Failed to open an in-memory database: {}", e),
                ErrorKind::ConnectionError,
            )
        })?;
        Ok(InMemoryConnectionInner {
            db: Mutex::new(db),
            state: atomic(MemoryState::default()),
        })
    }

    fn transaction_command(&self, command: &str, action: &str) -> MigrantResult<()> {
        self.db.lock().execute_batch(command).map_err(|e| {
            MigrantError::new(
                &format!("Failed to {}: {}", action, e),
                ErrorKind::TransactionError,
            )
        })
    }

    fn execute_statement(&self, sql: &str, params: &[SqlValue]) -> MigrantResult<u64> {
        self.state.write_with(|state| {
            state.execute_count += 1;
            let lowered = sql.to_lowercase();
            match state.failures.iter().find(|f| lowered.contains(f.as_str())) {
                Some(fragment) => Err(MigrantError::new(
                    &format!("Injected failure on '{}' for statement: {}", fragment, sql),
                    ErrorKind::ConnectionError,
                )),
                None => Ok(()),
            }
        })?;

        let affected = self
            .db
            .lock()
            .execute(sql, params_from_iter(params.iter().map(to_sqlite)))?;

        self.state
            .write_with(|state| state.log.push(sql.trim().to_string()));
        Ok(affected as u64)
    }

    fn query_column(&self, sql: &str, params: &[SqlValue]) -> MigrantResult<Vec<String>> {
        let db = self.db.lock();
        let mut statement = db.prepare(sql)?;
        let rows = statement.query_map(params_from_iter(params.iter().map(to_sqlite)), |row| {
            row.get::<_, Value>(0)
        })?;

        let mut values = Vec::new();
        for value in rows {
            values.push(from_sqlite(value?).as_text());
        }
        Ok(values)
    }

    fn table_names(&self) -> MigrantResult<Vec<String>> {
        self.query_column(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
            &[],
        )
    }
}

fn to_sqlite(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Bool(b) => Value::Integer(i64::from(*b)),
        SqlValue::Integer(i) => Value::Integer(*i),
        SqlValue::Real(r) => Value::Real(*r),
        SqlValue::Text(s) => Value::Text(s.clone()),
    }
}

fn from_sqlite(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(i),
        Value::Real(r) => SqlValue::Real(r),
        Value::Text(s) => SqlValue::Text(s),
        Value::Blob(bytes) => SqlValue::Text(String::from_utf8_lossy(&bytes).to_string()),
    }
}
