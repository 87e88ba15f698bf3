use super::Direction;
use crate::common::{ALIAS_CURRENT, ALIAS_FIRST, ALIAS_LATEST, ALIAS_NEXT, ALIAS_PREV, ALIAS_ZERO};
use crate::errors::{ErrorKind, MigrantError, MigrantResult};
use crate::version::{Version, VersionRegistry};
use itertools::Itertools;
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// State a migration run should reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every available version applied.
    Latest,
    /// Nothing applied: every applied version is reverted.
    Zero,
    /// Everything up to and including this version applied, nothing above it.
    Version(String),
}

impl Target {
    /// Parses `latest`, `first`, `0` or a version identifier.
    ///
    /// The relative aliases `prev`, `next` and `current` depend on the ledger
    /// and are only accepted by [`crate::Migrator::resolve_version_alias`].
    pub fn parse(text: &str) -> MigrantResult<Target> {
        let text = text.trim();
        match text {
            "" => Err(MigrantError::new(
                "Migration target cannot be empty",
                ErrorKind::InvalidArgument,
            )),
            ALIAS_LATEST => Ok(Target::Latest),
            ALIAS_FIRST | ALIAS_ZERO => Ok(Target::Zero),
            ALIAS_PREV | ALIAS_NEXT | ALIAS_CURRENT => Err(MigrantError::new(
                &format!("Alias '{}' must be resolved against the ledger", text),
                ErrorKind::InvalidArgument,
            )),
            id => Ok(Target::Version(id.to_string())),
        }
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Latest => write!(f, "{}", ALIAS_LATEST),
            Target::Zero => write!(f, "{}", ALIAS_ZERO),
            Target::Version(id) => write!(f, "{}", id),
        }
    }
}

/// Ordered versions to run in one direction.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    direction: Direction,
    versions: Vec<Version>,
}

impl MigrationPlan {
    pub fn new(direction: Direction, versions: Vec<Version>) -> Self {
        MigrationPlan {
            direction,
            versions,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn ids(&self) -> Vec<&str> {
        self.versions.iter().map(Version::id).collect()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Works out which versions must run, and in which order, to reach a target.
///
/// Moving up applies every available version above the highest applied one,
/// ascending. Moving down reverts every applied version above the target,
/// descending. Versions below the highest applied one that were never applied
/// are reported but not run.
pub struct MigrationPlanner<'a> {
    registry: &'a VersionRegistry,
}

impl<'a> MigrationPlanner<'a> {
    pub fn new(registry: &'a VersionRegistry) -> Self {
        MigrationPlanner { registry }
    }

    pub fn plan(&self, applied: &BTreeSet<String>, target: &Target) -> MigrantResult<MigrationPlan> {
        let current = applied.iter().next_back().map(String::as_str);
        self.report_inconsistencies(applied, current);

        match target {
            Target::Latest => Ok(self.plan_up(current, None)),
            Target::Zero => self.plan_down(applied, None),
            Target::Version(id) => {
                if !self.registry.has_version(id) {
                    log::error!("Migration target {} is not a known version", id);
                    return Err(MigrantError::new(
                        &format!("Could not find migration version {}", id),
                        ErrorKind::UnknownVersion,
                    ));
                }

                match current {
                    Some(current) if id.as_str() < current => self.plan_down(applied, Some(id)),
                    _ => Ok(self.plan_up(current, Some(id))),
                }
            }
        }
    }

    fn plan_up(&self, current: Option<&str>, target: Option<&str>) -> MigrationPlan {
        let versions = self
            .registry
            .available_versions()
            .into_iter()
            .filter(|v| current.map_or(true, |c| v.id() > c))
            .filter(|v| target.map_or(true, |t| v.id() <= t))
            .collect();
        MigrationPlan::new(Direction::Up, versions)
    }

    fn plan_down(&self, applied: &BTreeSet<String>, target: Option<&str>) -> MigrantResult<MigrationPlan> {
        let versions = applied
            .iter()
            .rev()
            .filter(|id| target.map_or(true, |t| id.as_str() > t))
            .map(|id| {
                self.registry.get_version(id).map_err(|e| {
                    MigrantError::new_with_cause(
                        &format!(
                            "Applied version {} must be reverted but is not available",
                            id
                        ),
                        ErrorKind::UnknownVersion,
                        e,
                    )
                })
            })
            .collect::<MigrantResult<Vec<_>>>()?;
        Ok(MigrationPlan::new(Direction::Down, versions))
    }

    fn report_inconsistencies(&self, applied: &BTreeSet<String>, current: Option<&str>) {
        let unavailable = applied
            .iter()
            .filter(|id| !self.registry.has_version(id))
            .join(", ");
        if !unavailable.is_empty() {
            log::warn!("Applied versions without a registered migration: {}", unavailable);
        }

        if let Some(current) = current {
            let gaps = self
                .registry
                .available_versions()
                .into_iter()
                .filter(|v| v.id() < current && !applied.contains(v.id()))
                .join(", ");
            if !gaps.is_empty() {
                log::warn!(
                    "Versions below current version {} were never applied and will be skipped: {}",
                    current,
                    gaps
                );
            }
        }
    }
}
