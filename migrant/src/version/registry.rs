use super::Version;
use crate::connection::Connection;
use crate::errors::{ErrorKind, MigrantError, MigrantResult};
use crate::ledger::VersionLedger;
use crate::migration::{MigrationFinder, MigrationUnit};
use indexmap::IndexMap;
use itertools::Itertools;
use std::path::Path;
use std::sync::Arc;

/// Known versions keyed by identifier.
///
/// Insertion order is kept for diagnostics, but every consumer receives
/// versions ascending by identifier.
#[derive(Clone, Default)]
pub struct VersionRegistry {
    versions: IndexMap<String, Version>,
}

impl VersionRegistry {
    pub fn new() -> Self {
        VersionRegistry::default()
    }

    /// Registers a unit under `id`. Fails with [`ErrorKind::DuplicateVersion`]
    /// when the identifier is already taken.
    pub fn add_version(&mut self, id: &str, unit: Arc<dyn MigrationUnit>) -> MigrantResult<Version> {
        if id.trim().is_empty() {
            return Err(MigrantError::new(
                "Version identifier cannot be empty",
                ErrorKind::InvalidArgument,
            ));
        }
        if self.versions.contains_key(id) {
            log::error!("Version {} is already registered", id);
            return Err(MigrantError::new(
                &format!("Version {} is already registered", id),
                ErrorKind::DuplicateVersion,
            ));
        }

        let version = Version::new(id, unit);
        self.versions.insert(id.to_string(), version.clone());
        Ok(version)
    }

    pub fn has_version(&self, id: &str) -> bool {
        self.versions.contains_key(id)
    }

    /// Looks up a version. Fails with [`ErrorKind::UnknownVersion`].
    pub fn get_version(&self, id: &str) -> MigrantResult<Version> {
        self.versions.get(id).cloned().ok_or_else(|| {
            MigrantError::new(
                &format!("Could not find migration version {}", id),
                ErrorKind::UnknownVersion,
            )
        })
    }

    /// Every registered version, ascending by identifier.
    pub fn available_versions(&self) -> Vec<Version> {
        self.versions.values().cloned().sorted().collect()
    }

    /// Identifiers in the order they were registered.
    pub fn registration_order(&self) -> Vec<&str> {
        self.versions.keys().map(String::as_str).collect()
    }

    pub fn latest_version(&self) -> Option<Version> {
        self.versions.values().max().cloned()
    }

    pub fn has_version_migrated(
        &self,
        version: &Version,
        ledger: &VersionLedger,
        connection: &Connection,
    ) -> MigrantResult<bool> {
        version.is_migrated(ledger, connection)
    }

    /// Registers every identifier the finder reports, creating units with
    /// `factory`. Returns the number of versions added.
    pub fn register_from_finder<F>(
        &mut self,
        finder: &dyn MigrationFinder,
        directory: &Path,
        namespace: Option<&str>,
        factory: F,
    ) -> MigrantResult<usize>
    where
        F: Fn(&str) -> MigrantResult<Arc<dyn MigrationUnit>>,
    {
        let ids = finder.find_migrations(directory, namespace)?;
        for id in &ids {
            let unit = factory(id)?;
            self.add_version(id, unit)?;
        }
        log::info!(
            "Registered {} migration(s) from {}",
            ids.len(),
            directory.display()
        );
        Ok(ids.len())
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::InMemoryConnection;
    use crate::migration::SqlMigration;
    use crate::MigrationConfig;
    use std::path::PathBuf;

    fn unit() -> Arc<dyn MigrationUnit> {
        Arc::new(SqlMigration::new(vec![], vec![]))
    }

    struct FixedFinder(Vec<&'static str>);

    impl MigrationFinder for FixedFinder {
        fn find_migrations(&self, _: &Path, _: Option<&str>) -> MigrantResult<Vec<String>> {
            Ok(self.0.iter().map(|s| s.to_string()).collect())
        }
    }

    #[test]
    fn available_versions_are_ascending_regardless_of_insertion() -> MigrantResult<()> {
        let mut registry = VersionRegistry::new();
        for id in ["20240301000000", "20240101000000", "20240201000000"] {
            registry.add_version(id, unit())?;
        }

        let ids: Vec<String> = registry
            .available_versions()
            .iter()
            .map(|v| v.id().to_string())
            .collect();
        assert_eq!(ids, vec!["20240101000000", "20240201000000", "20240301000000"]);
        assert_eq!(
            registry.registration_order(),
            vec!["20240301000000", "20240101000000", "20240201000000"]
        );
        assert_eq!(
            registry.latest_version().map(|v| v.id().to_string()),
            Some("20240301000000".to_string())
        );
        Ok(())
    }

    #[test]
    fn duplicate_version_is_rejected() -> MigrantResult<()> {
        let mut registry = VersionRegistry::new();
        registry.add_version("1", unit())?;
        let err = registry.add_version("1", unit()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::DuplicateVersion);
        assert_eq!(registry.len(), 1);
        Ok(())
    }

    #[test]
    fn unknown_version_lookup_fails() {
        let registry = VersionRegistry::new();
        assert!(registry.is_empty());
        assert!(!registry.has_version("1"));
        let err = registry.get_version("1").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnknownVersion);
    }

    #[test]
    fn empty_identifier_is_rejected() {
        let mut registry = VersionRegistry::new();
        let err = registry.add_version(" ", unit()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidArgument);
    }

    #[test]
    fn migrated_status_comes_from_the_ledger() -> MigrantResult<()> {
        let connection = Connection::new(InMemoryConnection::new().unwrap());
        let ledger = VersionLedger::new(MigrationConfig::new());
        let mut registry = VersionRegistry::new();
        let version = registry.add_version("1", unit())?;

        assert!(!registry.has_version_migrated(&version, &ledger, &connection)?);
        ledger.mark_migrated(&connection, "1")?;
        assert!(registry.has_version_migrated(&version, &ledger, &connection)?);
        Ok(())
    }

    #[test]
    fn register_from_finder_uses_factory() -> MigrantResult<()> {
        let mut registry = VersionRegistry::new();
        let added = registry.register_from_finder(
            &FixedFinder(vec!["2", "1"]),
            &PathBuf::from("unused"),
            None,
            |_| Ok(unit()),
        )?;
        assert_eq!(added, 2);
        assert!(registry.has_version("1") && registry.has_version("2"));
        Ok(())
    }

    #[test]
    fn register_from_finder_propagates_factory_errors() {
        let mut registry = VersionRegistry::new();
        let result = registry.register_from_finder(
            &FixedFinder(vec!["1"]),
            &PathBuf::from("unused"),
            None,
            |id| {
                Err(MigrantError::new(
                    &format!("no unit for {}", id),
                    ErrorKind::DiscoveryError,
                ))
            },
        );
        assert_eq!(result.unwrap_err().kind(), &ErrorKind::DiscoveryError);
    }
}
