use super::VersionRegistry;
use crate::connection::Connection;
use crate::errors::{ErrorKind, MigrantError, MigrantResult};
use crate::ledger::VersionLedger;

/// A validated ledger repair request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkRequest {
    /// One version. Fails when the ledger already holds the requested state.
    Single { version: String, add: bool },
    /// Every available version. Versions already in the requested state are skipped.
    All { add: bool },
    /// Available versions in `from..=to` by identifier. Versions already in
    /// the requested state are skipped.
    Range { from: String, to: String, add: bool },
}

impl MarkRequest {
    pub fn add(version: &str) -> Self {
        MarkRequest::Single {
            version: version.to_string(),
            add: true,
        }
    }

    pub fn delete(version: &str) -> Self {
        MarkRequest::Single {
            version: version.to_string(),
            add: false,
        }
    }

    pub fn is_add(&self) -> bool {
        match self {
            MarkRequest::Single { add, .. }
            | MarkRequest::All { add }
            | MarkRequest::Range { add, .. } => *add,
        }
    }
}

/// Raw options of the administrative "version" command.
///
/// Mirrors the flags an operator passes on the command line; call
/// [`MarkOptions::into_request`] to validate them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkOptions {
    pub version: Option<String>,
    pub add: bool,
    pub delete: bool,
    pub all: bool,
    pub range_from: Option<String>,
    pub range_to: Option<String>,
}

impl MarkOptions {
    pub fn into_request(self) -> MigrantResult<MarkRequest> {
        if self.add == self.delete {
            let message = if self.add {
                "Options --add and --delete cannot be used together"
            } else {
                "You must specify whether you want to --add or --delete the specified version"
            };
            return Err(invalid_argument(message));
        }
        let add = self.add;

        if self.all && (self.range_from.is_some() || self.range_to.is_some()) {
            return Err(invalid_argument(
                "Options --all and --range-to/--range-from both used. You should use only one of them",
            ));
        }

        match (self.range_from, self.range_to) {
            (Some(from), Some(to)) => {
                if from > to {
                    return Err(invalid_argument(&format!(
                        "Range start {} is after range end {}",
                        from, to
                    )));
                }
                return Ok(MarkRequest::Range { from, to, add });
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(invalid_argument(
                    "Options --range-to and --range-from should be used together",
                ));
            }
            (None, None) => {}
        }

        if self.all {
            return Ok(MarkRequest::All { add });
        }

        match self.version {
            Some(version) if !version.trim().is_empty() => Ok(MarkRequest::Single {
                version: version.trim().to_string(),
                add,
            }),
            _ => Err(invalid_argument(
                "You must specify a version, --all or a range with --range-from and --range-to",
            )),
        }
    }
}

/// Outcome of a mark request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkReport {
    changed: Vec<String>,
    skipped: Vec<String>,
}

impl MarkReport {
    /// Versions whose ledger state was changed, ascending.
    pub fn changed(&self) -> &[String] {
        &self.changed
    }

    /// Versions left alone because they were already in the requested state.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }
}

/// Repairs the ledger without running any migration unit.
pub struct VersionMarker<'a> {
    registry: &'a VersionRegistry,
    ledger: &'a VersionLedger,
    connection: &'a Connection,
}

impl<'a> VersionMarker<'a> {
    pub fn new(registry: &'a VersionRegistry, ledger: &'a VersionLedger, connection: &'a Connection) -> Self {
        VersionMarker {
            registry,
            ledger,
            connection,
        }
    }

    pub fn mark(&self, request: &MarkRequest) -> MigrantResult<MarkReport> {
        match request {
            MarkRequest::Single { version, add } => self.mark_single(version, *add),
            MarkRequest::All { add } => self.mark_bulk(*add, |_| true),
            MarkRequest::Range { from, to, add } => {
                self.mark_bulk(*add, |id| id >= from.as_str() && id <= to.as_str())
            }
        }
    }

    fn mark_single(&self, id: &str, add: bool) -> MigrantResult<MarkReport> {
        let version = self.registry.get_version(id)?;
        let migrated = version.is_migrated(self.ledger, self.connection)?;

        if add && migrated {
            return Err(MigrantError::new(
                &format!("The version \"{}\" already exists in the version table", id),
                ErrorKind::InvalidState,
            ));
        }
        if !add && !migrated {
            return Err(MigrantError::new(
                &format!("The version \"{}\" does not exist in the version table", id),
                ErrorKind::InvalidState,
            ));
        }

        self.write(id, add)?;
        Ok(MarkReport {
            changed: vec![id.to_string()],
            skipped: Vec::new(),
        })
    }

    fn mark_bulk<F>(&self, add: bool, selected: F) -> MigrantResult<MarkReport>
    where
        F: Fn(&str) -> bool,
    {
        let applied = self.ledger.migrated_versions(self.connection)?;
        let mut report = MarkReport::default();

        for version in self.registry.available_versions() {
            let id = version.id();
            if !selected(id) {
                continue;
            }
            if applied.contains(id) == add {
                report.skipped.push(id.to_string());
                continue;
            }
            self.write(id, add)?;
            report.changed.push(id.to_string());
        }

        log::info!(
            "{} {} version(s), skipped {}",
            if add { "Added" } else { "Deleted" },
            report.changed.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    fn write(&self, id: &str, add: bool) -> MigrantResult<()> {
        if add {
            log::info!("Marking version {} as migrated", id);
            self.ledger.mark_migrated(self.connection, id)
        } else {
            log::info!("Marking version {} as not migrated", id);
            self.ledger.mark_not_migrated(self.connection, id)
        }
    }
}

fn invalid_argument(message: &str) -> MigrantError {
    log::error!("{}", message);
    MigrantError::new(message, ErrorKind::InvalidArgument)
}
