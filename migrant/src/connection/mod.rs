//! Database connection abstraction used by the migration engine.
//!
//! The engine never talks to a driver directly. It depends on the small
//! [`ConnectionProvider`] contract: run a statement, read one column, manage a
//! transaction and describe the current schema. Drivers implement the trait;
//! [`InMemoryConnection`] is a self-contained implementation for tests and
//! previews.

mod memory;
mod value;

pub use memory::InMemoryConnection;
pub use value::SqlValue;

use crate::errors::MigrantResult;
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::ops::Deref;
use std::sync::Arc;

/// Contract a database driver fulfils for the migration engine.
///
/// All methods take `&self`; implementations use interior mutability so a
/// [`Connection`] can be shared cheaply. The engine is single-threaded and
/// never issues two calls at once on the same connection.
pub trait ConnectionProvider: Send + Sync {
    /// Starts a transaction. Nested transactions are not required.
    fn begin_transaction(&self) -> MigrantResult<()>;

    /// Commits the open transaction.
    fn commit(&self) -> MigrantResult<()>;

    /// Rolls back the open transaction.
    fn rollback(&self) -> MigrantResult<()>;

    /// Executes a statement with positional parameters and returns the number
    /// of affected rows.
    fn execute_statement(&self, sql: &str, params: &[SqlValue]) -> MigrantResult<u64>;

    /// Runs a query and returns the first column of every row as text.
    fn query_column(&self, sql: &str, params: &[SqlValue]) -> MigrantResult<Vec<String>>;

    /// Describes the current schema. Handed to migration units untouched.
    fn introspect_schema(&self) -> MigrantResult<Schema>;
}

/// Shared handle to a [`ConnectionProvider`].
///
/// Cloning only bumps a reference count; every clone talks to the same
/// underlying connection.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<dyn ConnectionProvider>,
}

impl Connection {
    pub fn new<T: ConnectionProvider + 'static>(inner: T) -> Self {
        Connection {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for Connection {
    type Target = Arc<dyn ConnectionProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish()
    }
}

/// Snapshot of the database schema as reported by the connection.
///
/// The engine only consults it to find out whether the ledger table exists;
/// migration units may inspect it however they like.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    tables: BTreeSet<String>,
}

impl Schema {
    pub fn new<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Schema {
            tables: tables.into_iter().map(|t| t.into().to_lowercase()).collect(),
        }
    }

    /// Table names, lower-cased.
    pub fn tables(&self) -> &BTreeSet<String> {
        &self.tables
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains(&name.to_lowercase())
    }
}
