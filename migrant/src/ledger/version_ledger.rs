use super::LedgerEntry;
use crate::connection::{Connection, SqlValue};
use crate::errors::{ErrorKind, MigrantError, MigrantResult};
use crate::migration_config::MigrationConfig;
use chrono::{SecondsFormat, Utc};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Persistent set of applied version identifiers.
///
/// Backed by a two-column table (version, executed-at) whose names come from
/// the [`MigrationConfig`]. The table is created on the first write; reads
/// against a database without the table see an empty ledger and never create
/// it, which keeps dry runs free of side effects.
///
/// Clones share the initialisation state.
#[derive(Clone)]
pub struct VersionLedger {
    inner: Arc<VersionLedgerInner>,
}

impl VersionLedger {
    pub fn new(config: MigrationConfig) -> Self {
        VersionLedger {
            inner: Arc::new(VersionLedgerInner {
                config,
                initialized: AtomicBool::from(false),
            }),
        }
    }

    /// Creates the ledger table when it does not exist yet.
    pub fn ensure_initialized(&self, connection: &Connection) -> MigrantResult<()> {
        self.inner.ensure_initialized(connection)
    }

    /// Records a version as applied. Recording it twice is a no-op.
    pub fn mark_migrated(&self, connection: &Connection, version: &str) -> MigrantResult<()> {
        self.inner.mark_migrated(connection, version)
    }

    /// Removes a version from the ledger. Removing an absent version is a no-op.
    pub fn mark_not_migrated(&self, connection: &Connection, version: &str) -> MigrantResult<()> {
        self.inner.mark_not_migrated(connection, version)
    }

    pub fn migrated_versions(&self, connection: &Connection) -> MigrantResult<BTreeSet<String>> {
        self.inner.migrated_versions(connection)
    }

    pub fn has_migrated(&self, connection: &Connection, version: &str) -> MigrantResult<bool> {
        self.inner.has_migrated(connection, version)
    }

    /// Highest applied identifier, `None` for an empty ledger.
    pub fn current_version(&self, connection: &Connection) -> MigrantResult<Option<String>> {
        Ok(self.migrated_versions(connection)?.into_iter().next_back())
    }

    /// Applied versions with their recorded timestamps, ascending.
    pub fn entries(&self, connection: &Connection) -> MigrantResult<Vec<LedgerEntry>> {
        self.inner.entries(connection)
    }
}

struct VersionLedgerInner {
    config: MigrationConfig,
    initialized: AtomicBool,
}

impl VersionLedgerInner {
    fn ensure_initialized(&self, connection: &Connection) -> MigrantResult<()> {
        if self.initialized.load(Ordering::Relaxed) {
            return Ok(());
        }

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({} VARCHAR(255) PRIMARY KEY, {} VARCHAR(64))",
            self.config.table_name(),
            self.config.version_column(),
            self.config.executed_at_column()
        );
        log::debug!("Initializing version ledger: {}", sql);
        connection.execute_statement(&sql, &[]).map_err(|e| {
            MigrantError::new_with_cause(
                &format!("Failed to create ledger table {}", self.config.table_name()),
                ErrorKind::LedgerWriteError,
                e,
            )
        })?;

        self.initialized.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn table_exists(&self, connection: &Connection) -> MigrantResult<bool> {
        if self.initialized.load(Ordering::Relaxed) {
            return Ok(true);
        }
        Ok(connection
            .introspect_schema()?
            .has_table(&self.config.table_name()))
    }

    fn mark_migrated(&self, connection: &Connection, version: &str) -> MigrantResult<()> {
        self.ensure_initialized(connection)?;
        if self.has_migrated(connection, version)? {
            log::debug!("Version {} is already recorded as migrated", version);
            return Ok(());
        }

        let sql = format!(
            "INSERT INTO {} ({}, {}) VALUES (?, ?)",
            self.config.table_name(),
            self.config.version_column(),
            self.config.executed_at_column()
        );
        let executed_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        connection
            .execute_statement(&sql, &[SqlValue::from(version), SqlValue::from(executed_at)])
            .map_err(|e| {
                MigrantError::new_with_cause(
                    &format!("Failed to record version {} as migrated", version),
                    ErrorKind::LedgerWriteError,
                    e,
                )
            })?;
        Ok(())
    }

    fn mark_not_migrated(&self, connection: &Connection, version: &str) -> MigrantResult<()> {
        self.ensure_initialized(connection)?;

        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            self.config.table_name(),
            self.config.version_column()
        );
        connection
            .execute_statement(&sql, &[SqlValue::from(version)])
            .map_err(|e| {
                MigrantError::new_with_cause(
                    &format!("Failed to remove version {} from the ledger", version),
                    ErrorKind::LedgerWriteError,
                    e,
                )
            })?;
        Ok(())
    }

    fn migrated_versions(&self, connection: &Connection) -> MigrantResult<BTreeSet<String>> {
        if !self.table_exists(connection)? {
            return Ok(BTreeSet::new());
        }

        let sql = format!(
            "SELECT {} FROM {}",
            self.config.version_column(),
            self.config.table_name()
        );
        let versions = connection.query_column(&sql, &[]).map_err(|e| {
            MigrantError::new_with_cause(
                "Failed to read the version ledger",
                ErrorKind::ConnectionError,
                e,
            )
        })?;
        Ok(versions.into_iter().collect())
    }

    fn has_migrated(&self, connection: &Connection, version: &str) -> MigrantResult<bool> {
        if !self.table_exists(connection)? {
            return Ok(false);
        }

        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            self.config.version_column(),
            self.config.table_name(),
            self.config.version_column()
        );
        let rows = connection
            .query_column(&sql, &[SqlValue::from(version)])
            .map_err(|e| {
                MigrantError::new_with_cause(
                    &format!("Failed to look up version {} in the ledger", version),
                    ErrorKind::ConnectionError,
                    e,
                )
            })?;
        Ok(!rows.is_empty())
    }

    fn entries(&self, connection: &Connection) -> MigrantResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            self.config.executed_at_column(),
            self.config.table_name(),
            self.config.version_column()
        );

        let mut entries = Vec::new();
        for version in self.migrated_versions(connection)? {
            let executed_at = connection
                .query_column(&sql, &[SqlValue::from(version.as_str())])?
                .first()
                .and_then(|text| LedgerEntry::parse_timestamp(text));
            entries.push(LedgerEntry::new(&version, executed_at));
        }
        Ok(entries)
    }
}
