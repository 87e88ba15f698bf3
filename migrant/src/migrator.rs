use crate::common::{
    MigrationEventBus, SubscriberRef, ALIAS_CURRENT, ALIAS_FIRST, ALIAS_LATEST, ALIAS_NEXT,
    ALIAS_PREV, ALIAS_ZERO,
};
use crate::connection::Connection;
use crate::errors::{ErrorKind, MigrantError, MigrantResult};
use crate::ledger::{LedgerEntry, VersionLedger};
use crate::migration::{
    Direction, ExecutionReport, MigrationEventListener, MigrationExecutor, MigrationPlan,
    MigrationPlanner, Target,
};
use crate::migration_config::MigrationConfig;
use crate::migrator_builder::MigratorBuilder;
use crate::version::{MarkReport, MarkRequest, Version, VersionMarker, VersionRegistry};
use std::fmt::Debug;
use std::sync::Arc;

/// Snapshot of where the database stands relative to the known migrations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MigrationStatus {
    pub table_name: String,
    pub namespace: Option<String>,
    /// Highest applied version.
    pub current_version: Option<String>,
    /// Available version right below the current one.
    pub previous_version: Option<String>,
    /// Available version right above the current one.
    pub next_version: Option<String>,
    /// Highest available version.
    pub latest_version: Option<String>,
    pub executed: usize,
    /// Applied versions that have no registered migration.
    pub executed_unavailable: Vec<String>,
    pub available: usize,
    /// Available versions that are not applied.
    pub new_migrations: usize,
}

/// Entry point of the migration engine.
///
/// A `Migrator` owns a frozen [`MigrationConfig`], the registry of known
/// versions, the ledger, the connection and the event bus. Cloning is cheap
/// and clones share everything.
///
/// ```rust,ignore
/// let migrator = Migrator::builder()
///     .connection(Connection::new(InMemoryConnection::new()?))
///     .migrations_directory(Path::new("migrations"))
///     .build()?;
///
/// migrator.migrate(&Target::Latest, false)?;
/// let status = migrator.status()?;
/// ```
#[derive(Clone)]
pub struct Migrator {
    inner: Arc<MigratorInner>,
}

impl Migrator {
    pub fn builder() -> MigratorBuilder {
        MigratorBuilder::new()
    }

    pub(crate) fn new(
        config: MigrationConfig,
        connection: Connection,
        registry: VersionRegistry,
        event_bus: MigrationEventBus,
    ) -> Self {
        let ledger = VersionLedger::new(config.clone());
        Migrator {
            inner: Arc::new(MigratorInner {
                config,
                connection,
                registry,
                ledger,
                event_bus,
            }),
        }
    }

    pub fn config(&self) -> MigrationConfig {
        self.inner.config.clone()
    }

    pub fn connection(&self) -> Connection {
        self.inner.connection.clone()
    }

    pub fn registry(&self) -> &VersionRegistry {
        &self.inner.registry
    }

    pub fn ledger(&self) -> &VersionLedger {
        &self.inner.ledger
    }

    pub fn subscribe(&self, listener: MigrationEventListener) -> MigrantResult<SubscriberRef> {
        self.inner.event_bus.register(listener)
    }

    pub fn unsubscribe(&self, subscriber: SubscriberRef) -> MigrantResult<()> {
        self.inner.event_bus.deregister(subscriber)
    }

    /// Works out the plan for `target` without running it.
    pub fn plan(&self, target: &Target) -> MigrantResult<MigrationPlan> {
        let applied = self.inner.ledger.migrated_versions(&self.inner.connection)?;
        MigrationPlanner::new(&self.inner.registry).plan(&applied, target)
    }

    /// Brings the database to `target`, up or down.
    pub fn migrate(&self, target: &Target, dry_run: bool) -> MigrantResult<ExecutionReport> {
        let plan = self.plan(target)?;
        log::info!(
            "Migrating to {} ({} version(s) {})",
            target,
            plan.len(),
            plan.direction()
        );
        self.executor().execute(&plan, dry_run)
    }

    /// Runs one version in one direction, regardless of the others.
    ///
    /// Fails with [`ErrorKind::InvalidState`] when the version is already
    /// applied (up) or not applied (down).
    pub fn execute(&self, id: &str, direction: Direction, dry_run: bool) -> MigrantResult<ExecutionReport> {
        let version = self.inner.registry.get_version(id)?;
        let migrated = version.is_migrated(&self.inner.ledger, &self.inner.connection)?;

        if direction.is_up() == migrated {
            let state = if migrated { "already" } else { "not" };
            log::error!("Version {} is {} migrated", id, state);
            return Err(MigrantError::new(
                &format!("Cannot migrate {} version {}: it is {} migrated", direction, id, state),
                ErrorKind::InvalidState,
            ));
        }

        let plan = MigrationPlan::new(direction, vec![version]);
        self.executor().execute(&plan, dry_run)
    }

    /// Adds versions to or removes them from the ledger without running them.
    pub fn mark(&self, request: &MarkRequest) -> MigrantResult<MarkReport> {
        VersionMarker::new(&self.inner.registry, &self.inner.ledger, &self.inner.connection)
            .mark(request)
    }

    pub fn status(&self) -> MigrantResult<MigrationStatus> {
        let applied = self.inner.ledger.migrated_versions(&self.inner.connection)?;
        let available = self.inner.registry.available_versions();
        let current = applied.iter().next_back().cloned();

        let executed_unavailable: Vec<String> = applied
            .iter()
            .filter(|id| !self.inner.registry.has_version(id))
            .cloned()
            .collect();
        let new_migrations = available
            .iter()
            .filter(|v| !applied.contains(v.id()))
            .count();

        Ok(MigrationStatus {
            table_name: self.inner.config.table_name(),
            namespace: self.inner.config.namespace(),
            previous_version: self.relative_version(&available, current.as_deref(), -1),
            next_version: self.relative_version(&available, current.as_deref(), 1),
            current_version: current,
            latest_version: available.last().map(|v| v.id().to_string()),
            executed: applied.len(),
            executed_unavailable,
            available: available.len(),
            new_migrations,
        })
    }

    /// Applied versions with their timestamps.
    pub fn executed_entries(&self) -> MigrantResult<Vec<LedgerEntry>> {
        self.inner.ledger.entries(&self.inner.connection)
    }

    /// Resolves `first`, `0`, `prev`, `current`, `next`, `latest` or a version
    /// identifier into a [`Target`].
    pub fn resolve_version_alias(&self, alias: &str) -> MigrantResult<Target> {
        let alias = alias.trim();
        let available = self.inner.registry.available_versions();
        let current = self.inner.ledger.current_version(&self.inner.connection)?;

        let resolved = match alias {
            ALIAS_FIRST | ALIAS_ZERO => Some(Target::Zero),
            ALIAS_LATEST => Some(Target::Latest),
            ALIAS_CURRENT => Some(current.map_or(Target::Zero, Target::Version)),
            ALIAS_PREV => match current.as_deref() {
                None => Some(Target::Zero),
                Some(current) => {
                    if self.inner.registry.has_version(current) {
                        Some(
                            self.relative_version(&available, Some(current), -1)
                                .map_or(Target::Zero, Target::Version),
                        )
                    } else {
                        None
                    }
                }
            },
            ALIAS_NEXT => self
                .relative_version(&available, current.as_deref(), 1)
                .map(Target::Version),
            id if self.inner.registry.has_version(id) => Some(Target::Version(id.to_string())),
            _ => None,
        };

        resolved.ok_or_else(|| {
            log::error!("Unknown version alias {}", alias);
            MigrantError::new(
                &format!("Could not resolve version alias '{}'", alias),
                ErrorKind::UnknownVersion,
            )
        })
    }

    /// Removes every event listener.
    pub fn close(&self) -> MigrantResult<()> {
        self.inner.event_bus.close()
    }

    fn executor(&self) -> MigrationExecutor {
        MigrationExecutor::new(
            self.inner.connection.clone(),
            self.inner.ledger.clone(),
            self.inner.event_bus.clone(),
            self.inner.config.clone(),
        )
    }

    /// Available version `delta` positions away from `current`. Without a
    /// current version, position zero is the slot before the first version.
    fn relative_version(&self, available: &[Version], current: Option<&str>, delta: isize) -> Option<String> {
        let position = match current {
            None => -1,
            Some(current) => available.iter().position(|v| v.id() == current)? as isize,
        };
        let target = position + delta;
        if target < 0 {
            return None;
        }
        available.get(target as usize).map(|v| v.id().to_string())
    }
}

impl Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("table_name", &self.inner.config.table_name())
            .field("versions", &self.inner.registry.len())
            .finish()
    }
}

struct MigratorInner {
    config: MigrationConfig,
    connection: Connection,
    registry: VersionRegistry,
    ledger: VersionLedger,
    event_bus: MigrationEventBus,
}
