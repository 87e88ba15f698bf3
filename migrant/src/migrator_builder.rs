use crate::common::MigrationEventBus;
use crate::connection::Connection;
use crate::errors::{ErrorKind, MigrantError, MigrantResult};
use crate::migration::{
    DirectoryFinder, MigrationEventListener, MigrationFinder, MigrationUnit, SqlMigration,
};
use crate::migration_config::MigrationConfig;
use crate::migrator::Migrator;
use crate::version::VersionRegistry;
use std::path::Path;
use std::sync::Arc;

type UnitFactory = Box<dyn Fn(&str) -> MigrantResult<Arc<dyn MigrationUnit>>>;

/// Fluent builder for a [`Migrator`].
///
/// The first failing step is remembered and returned from
/// [`MigratorBuilder::build`]; later steps are ignored.
///
/// Without a custom finder, a configured migrations directory is scanned by
/// the [`DirectoryFinder`] and every file is loaded as a [`SqlMigration`].
#[derive(Default)]
pub struct MigratorBuilder {
    error: Option<MigrantError>,
    config: MigrationConfig,
    connection: Option<Connection>,
    registry: VersionRegistry,
    finder: Option<(Box<dyn MigrationFinder>, UnitFactory)>,
    listeners: Vec<MigrationEventListener>,
}

impl MigratorBuilder {
    pub fn new() -> Self {
        MigratorBuilder::default()
    }

    pub fn connection(mut self, connection: Connection) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn table_name(mut self, name: &str) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_table_name(name) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn version_column(mut self, name: &str) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_version_column(name) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn executed_at_column(mut self, name: &str) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_executed_at_column(name) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn migrations_directory(mut self, directory: &Path) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_migrations_directory(directory) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn namespace(mut self, namespace: &str) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.config.set_namespace(namespace) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Registers a unit under `id`.
    pub fn add_migration<T: MigrationUnit + 'static>(mut self, id: &str, unit: T) -> Self {
        if self.error.is_none() {
            if let Err(e) = self.registry.add_version(id, Arc::new(unit)) {
                self.error = Some(e);
            }
        }
        self
    }

    /// Discovers versions with `finder` in the migrations directory and
    /// creates their units with `factory`.
    pub fn finder<T, F>(mut self, finder: T, factory: F) -> Self
    where
        T: MigrationFinder + 'static,
        F: Fn(&str) -> MigrantResult<Arc<dyn MigrationUnit>> + 'static,
    {
        self.finder = Some((Box::new(finder), Box::new(factory)));
        self
    }

    pub fn add_listener(mut self, listener: MigrationEventListener) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn build(mut self) -> MigrantResult<Migrator> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let connection = match self.connection.take() {
            Some(connection) => connection,
            None => {
                log::error!("A connection is required to build a migrator");
                return Err(MigrantError::new(
                    "A connection is required to build a migrator",
                    ErrorKind::ConfigurationError,
                ));
            }
        };

        let directory = self.config.migrations_directory();
        let namespace = self.config.namespace();
        match (directory, self.finder.take()) {
            (Some(directory), Some((finder, factory))) => {
                self.registry.register_from_finder(
                    finder.as_ref(),
                    &directory,
                    namespace.as_deref(),
                    factory,
                )?;
            }
            (Some(directory), None) => {
                let files = DirectoryFinder::new()
                    .find_migration_files(&directory, namespace.as_deref())?;
                for file in files {
                    let mut unit = SqlMigration::from_file(&file.path)?;
                    if unit.description().is_empty() {
                        if let Some(description) = &file.description {
                            unit = unit.with_description(description);
                        }
                    }
                    self.registry.add_version(&file.version, Arc::new(unit))?;
                }
            }
            (None, Some(_)) => {
                log::error!("A migration finder needs a migrations directory");
                return Err(MigrantError::new(
                    "A migration finder needs a migrations directory",
                    ErrorKind::ConfigurationError,
                ));
            }
            (None, None) => {}
        }

        self.config.freeze()?;

        let event_bus = MigrationEventBus::new();
        for listener in self.listeners {
            event_bus.register(listener)?;
        }

        log::debug!(
            "Built migrator with {} version(s), ledger table {}",
            self.registry.len(),
            self.config.table_name()
        );
        Ok(Migrator::new(self.config, connection, self.registry, event_bus))
    }
}
