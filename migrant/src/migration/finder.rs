use crate::common::{DEFAULT_FILE_PREFIX, MIGRATION_FILE_EXTENSION};
use crate::errors::{ErrorKind, MigrantError, MigrantResult};
use itertools::Itertools;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Discovers the migration identifiers available in a directory.
///
/// Implementations must be deterministic for fixed directory contents and
/// fail with [`ErrorKind::DiscoveryError`] when the directory cannot be read
/// or a discovered name is not a valid version.
pub trait MigrationFinder: Send + Sync {
    fn find_migrations(&self, directory: &Path, namespace: Option<&str>) -> MigrantResult<Vec<String>>;
}

/// A migration file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredMigration {
    pub version: String,
    pub description: Option<String>,
    pub path: PathBuf,
}

/// Finds `.sql` migration files in a single directory.
///
/// Files are named `<prefix><version>[_<description>].sql` where the prefix
/// is the namespace (or `Version` without one) and may be omitted, and the
/// version is 1 to 32 digits, e.g. `Version20240101120000_create_users.sql`.
/// Sub-directories and files with other extensions are ignored.
#[derive(Debug, Clone, Default)]
pub struct DirectoryFinder;

impl DirectoryFinder {
    pub fn new() -> Self {
        DirectoryFinder
    }

    /// Lists migration files, sorted by version.
    pub fn find_migration_files(
        &self,
        directory: &Path,
        namespace: Option<&str>,
    ) -> MigrantResult<Vec<DiscoveredMigration>> {
        let prefix = namespace.unwrap_or(DEFAULT_FILE_PREFIX);
        let pattern = Regex::new(&format!(
            r"^(?:{})?(\d{{1,32}})(?:_(.+))?$",
            regex::escape(prefix)
        ))?;

        let entries = std::fs::read_dir(directory).map_err(|e| unreadable(directory, e))?;

        let mut found = Vec::new();
        let mut seen = HashSet::new();
        for entry in entries {
            let path = entry.map_err(|e| unreadable(directory, e))?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(MIGRATION_FILE_EXTENSION) {
                continue;
            }

            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let caps = pattern.captures(&stem).ok_or_else(|| {
                MigrantError::new(
                    &format!(
                        "Migration file {} does not match {}<version>[_<description>].sql",
                        path.display(),
                        prefix
                    ),
                    ErrorKind::DiscoveryError,
                )
            })?;

            let version = caps[1].to_string();
            if !seen.insert(version.clone()) {
                return Err(MigrantError::new(
                    &format!("Version {} is defined by more than one file", version),
                    ErrorKind::DiscoveryError,
                ));
            }

            log::debug!("Discovered migration {} at {}", version, path.display());
            found.push(DiscoveredMigration {
                version,
                description: caps.get(2).map(|d| d.as_str().replace('_', " ")),
                path,
            });
        }

        Ok(found
            .into_iter()
            .sorted_by(|a, b| a.version.cmp(&b.version))
            .collect())
    }
}

fn unreadable(directory: &Path, err: std::io::Error) -> MigrantError {
    MigrantError::new_with_cause(
        &format!("Cannot read migrations directory {}", directory.display()),
        ErrorKind::DiscoveryError,
        err.into(),
    )
}

impl MigrationFinder for DirectoryFinder {
    fn find_migrations(&self, directory: &Path, namespace: Option<&str>) -> MigrantResult<Vec<String>> {
        Ok(self
            .find_migration_files(directory, namespace)?
            .into_iter()
            .map(|m| m.version)
            .collect())
    }
}
