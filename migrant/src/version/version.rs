use crate::connection::Connection;
use crate::errors::MigrantResult;
use crate::ledger::VersionLedger;
use crate::migration::MigrationUnit;
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// A registered migration: identifier plus the unit that implements it.
///
/// Versions order by identifier using string comparison. Whether a version
/// is applied is never cached here; it is read from the ledger on demand.
#[derive(Clone)]
pub struct Version {
    inner: Arc<VersionInner>,
}

struct VersionInner {
    id: String,
    unit: Arc<dyn MigrationUnit>,
}

impl Version {
    pub fn new(id: &str, unit: Arc<dyn MigrationUnit>) -> Self {
        Version {
            inner: Arc::new(VersionInner {
                id: id.to_string(),
                unit,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn unit(&self) -> &Arc<dyn MigrationUnit> {
        &self.inner.unit
    }

    pub fn is_transactional(&self) -> bool {
        self.inner.unit.is_transactional()
    }

    pub fn description(&self) -> String {
        self.inner.unit.description()
    }

    pub fn is_migrated(&self, ledger: &VersionLedger, connection: &Connection) -> MigrantResult<bool> {
        ledger.has_migrated(connection, self.id())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id().cmp(other.id())
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl Debug for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Version")
            .field("id", &self.id())
            .field("transactional", &self.is_transactional())
            .finish()
    }
}
