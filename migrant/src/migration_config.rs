//! Configuration shared by every component of a migrator.

use crate::common::{
    atomic, Atomic, ReadExecutor, WriteExecutor, DEFAULT_EXECUTED_AT_COLUMN, DEFAULT_TABLE_NAME,
    DEFAULT_VERSION_COLUMN,
};
use crate::errors::{ErrorKind, MigrantError, MigrantResult};
use regex::Regex;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$")
        .unwrap_or_else(|e| panic!("invalid identifier pattern: {e}"))
});

/// Ledger layout and migration source settings.
///
/// The configuration is an explicit value: the migrator owns one, and every
/// event carries a clone of it. Clones share state. Once the migrator is
/// built the configuration is frozen and every setter fails with
/// [`ErrorKind::ConfigurationError`].
///
/// ```rust
/// use migrant::MigrationConfig;
///
/// let config = MigrationConfig::new();
/// config.set_table_name("schema_history").unwrap();
/// assert_eq!(config.table_name(), "schema_history");
/// ```
#[derive(Clone)]
pub struct MigrationConfig {
    inner: Arc<MigrationConfigInner>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationConfig {
    pub fn new() -> Self {
        MigrationConfig {
            inner: Arc::new(MigrationConfigInner::new()),
        }
    }

    /// Name of the ledger table, `migration_versions` by default.
    pub fn table_name(&self) -> String {
        self.inner.table_name.read_with(|it| it.clone())
    }

    pub fn set_table_name(&self, name: &str) -> MigrantResult<()> {
        self.inner.set_identifier(&self.inner.table_name, "table name", name)
    }

    pub fn version_column(&self) -> String {
        self.inner.version_column.read_with(|it| it.clone())
    }

    pub fn set_version_column(&self, name: &str) -> MigrantResult<()> {
        self.inner
            .set_identifier(&self.inner.version_column, "version column", name)
    }

    pub fn executed_at_column(&self) -> String {
        self.inner.executed_at_column.read_with(|it| it.clone())
    }

    pub fn set_executed_at_column(&self, name: &str) -> MigrantResult<()> {
        self.inner
            .set_identifier(&self.inner.executed_at_column, "executed-at column", name)
    }

    pub fn migrations_directory(&self) -> Option<PathBuf> {
        self.inner.migrations_directory.read_with(|it| it.clone())
    }

    pub fn set_migrations_directory(&self, directory: &Path) -> MigrantResult<()> {
        self.inner.check_not_frozen("migrations directory")?;
        self.inner
            .migrations_directory
            .write_with(|it| *it = Some(directory.to_path_buf()));
        Ok(())
    }

    /// Namespace of the migrations; the directory finder uses it as the file
    /// name prefix.
    pub fn namespace(&self) -> Option<String> {
        self.inner.namespace.read_with(|it| it.clone())
    }

    pub fn set_namespace(&self, namespace: &str) -> MigrantResult<()> {
        self.inner.check_not_frozen("namespace")?;
        if namespace.trim().is_empty() {
            log::error!("Migration namespace cannot be empty");
            return Err(MigrantError::new(
                "Migration namespace cannot be empty",
                ErrorKind::ConfigurationError,
            ));
        }
        self.inner
            .namespace
            .write_with(|it| *it = Some(namespace.to_string()));
        Ok(())
    }

    pub fn is_frozen(&self) -> bool {
        self.inner.frozen.load(Ordering::Relaxed)
    }

    pub(crate) fn freeze(&self) -> MigrantResult<()> {
        let table = self.table_name();
        if self.version_column().eq_ignore_ascii_case(&self.executed_at_column()) {
            log::error!("Ledger table {} cannot use one column for both version and timestamp", table);
            return Err(MigrantError::new(
                &format!(
                    "Ledger table {} cannot use one column for both version and timestamp",
                    table
                ),
                ErrorKind::ConfigurationError,
            ));
        }
        self.inner.frozen.store(true, Ordering::Relaxed);
        Ok(())
    }
}

impl Debug for MigrationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationConfig")
            .field("table_name", &self.table_name())
            .field("version_column", &self.version_column())
            .field("executed_at_column", &self.executed_at_column())
            .field("migrations_directory", &self.migrations_directory())
            .field("namespace", &self.namespace())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

struct MigrationConfigInner {
    frozen: AtomicBool,
    table_name: Atomic<String>,
    version_column: Atomic<String>,
    executed_at_column: Atomic<String>,
    migrations_directory: Atomic<Option<PathBuf>>,
    namespace: Atomic<Option<String>>,
}

impl MigrationConfigInner {
    fn new() -> Self {
        MigrationConfigInner {
            frozen: AtomicBool::from(false),
            table_name: atomic(DEFAULT_TABLE_NAME.to_string()),
            version_column: atomic(DEFAULT_VERSION_COLUMN.to_string()),
            executed_at_column: atomic(DEFAULT_EXECUTED_AT_COLUMN.to_string()),
            migrations_directory: atomic(None),
            namespace: atomic(None),
        }
    }

    fn check_not_frozen(&self, setting: &str) -> MigrantResult<()> {
        if self.frozen.load(Ordering::Relaxed) {
            log::error!("The {} cannot be changed after the migrator is built", setting);
            return Err(MigrantError::new(
                &format!("The {} cannot be changed after the migrator is built", setting),
                ErrorKind::ConfigurationError,
            ));
        }
        Ok(())
    }

    fn set_identifier(&self, target: &Atomic<String>, setting: &str, value: &str) -> MigrantResult<()> {
        self.check_not_frozen(setting)?;
        if !IDENTIFIER.is_match(value) {
            log::error!("Invalid {}: {}", setting, value);
            return Err(MigrantError::new(
                &format!("Invalid {}: '{}' is not a plain SQL identifier", setting, value),
                ErrorKind::ConfigurationError,
            ));
        }
        target.write_with(|it| *it = value.to_string());
        Ok(())
    }
}
