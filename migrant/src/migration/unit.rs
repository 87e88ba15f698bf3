use crate::connection::{Schema, SqlValue};
use crate::errors::MigrantResult;
use itertools::Itertools;
use std::sync::Arc;

/// A versioned, reversible change.
///
/// Units never touch the connection. They describe their change by adding
/// statements to a [`StatementCollector`]; the executor decides whether those
/// statements run, inside or outside a transaction, or are only logged during
/// a dry run. Units are immutable once registered.
pub trait MigrationUnit: Send + Sync {
    /// Adds the statements that apply the change.
    fn up(&self, schema: &Schema, collector: &mut StatementCollector) -> MigrantResult<()>;

    /// Adds the statements that revert the change.
    fn down(&self, schema: &Schema, collector: &mut StatementCollector) -> MigrantResult<()>;

    /// Whether the unit and its ledger write run in one transaction.
    fn is_transactional(&self) -> bool {
        true
    }

    fn description(&self) -> String {
        String::new()
    }
}

/// One SQL statement with positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: &str) -> Self {
        Statement {
            sql: sql.to_string(),
            params: Vec::new(),
        }
    }

    pub fn with_params(sql: &str, params: Vec<SqlValue>) -> Self {
        Statement {
            sql: sql.to_string(),
            params,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    /// Renders the statement for a SQL script, parameters as a trailing comment.
    pub fn to_script(&self) -> String {
        let sql = self.sql.trim().trim_end_matches(';');
        if self.params.is_empty() {
            format!("{};", sql)
        } else {
            format!(
                "{}; -- params: {}",
                sql,
                self.params.iter().map(SqlValue::to_sql_literal).join(", ")
            )
        }
    }
}

/// Collects the statements a unit produces for one direction.
#[derive(Debug, Default, Clone)]
pub struct StatementCollector {
    statements: Vec<Statement>,
}

impl StatementCollector {
    pub fn new() -> Self {
        StatementCollector::default()
    }

    pub fn add_sql(&mut self, sql: &str) -> &mut Self {
        self.statements.push(Statement::new(sql));
        self
    }

    pub fn add_sql_with_params(&mut self, sql: &str, params: Vec<SqlValue>) -> &mut Self {
        self.statements.push(Statement::with_params(sql, params));
        self
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn into_statements(self) -> Vec<Statement> {
        self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

type UnitFn = Arc<dyn Fn(&Schema, &mut StatementCollector) -> MigrantResult<()> + Send + Sync>;

/// A [`MigrationUnit`] built from two closures.
///
/// ```rust,ignore
/// let unit = FnMigration::new(
///     |_, sql| { sql.add_sql("CREATE TABLE tags (name VARCHAR(64))"); Ok(()) },
///     |_, sql| { sql.add_sql("DROP TABLE tags"); Ok(()) },
/// )
/// .with_description("create tags");
/// ```
#[derive(Clone)]
pub struct FnMigration {
    up: UnitFn,
    down: UnitFn,
    transactional: bool,
    description: String,
}

impl FnMigration {
    pub fn new<U, D>(up: U, down: D) -> Self
    where
        U: Fn(&Schema, &mut StatementCollector) -> MigrantResult<()> + Send + Sync + 'static,
        D: Fn(&Schema, &mut StatementCollector) -> MigrantResult<()> + Send + Sync + 'static,
    {
        FnMigration {
            up: Arc::new(up),
            down: Arc::new(down),
            transactional: true,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Runs the unit outside of a transaction.
    pub fn non_transactional(mut self) -> Self {
        self.transactional = false;
        self
    }
}

impl MigrationUnit for FnMigration {
    fn up(&self, schema: &Schema, collector: &mut StatementCollector) -> MigrantResult<()> {
        (self.up)(schema, collector)
    }

    fn down(&self, schema: &Schema, collector: &mut StatementCollector) -> MigrantResult<()> {
        (self.down)(schema, collector)
    }

    fn is_transactional(&self) -> bool {
        self.transactional
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}
