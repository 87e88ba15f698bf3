use super::Direction;
use crate::errors::MigrantResult;
use crate::migration_config::MigrationConfig;
use anyhow::Error;
use basu::error::BasuError;
use basu::event::Event;
use basu::Handle;
use std::fmt::Debug;
use std::sync::Arc;

/// Lifecycle points at which listeners are notified.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum MigrationEvents {
    /// A non-empty plan is about to run.
    MigrationsMigrating,
    /// Every version of a plan ran successfully.
    MigrationsMigrated,
    /// A single version is about to run.
    VersionExecuting,
    /// A single version finished, including during a dry run.
    VersionExecuted,
}

/// Context handed to listeners.
///
/// Carries the configuration the run uses, the direction, the dry-run flag
/// and, for per-version events, the version identifier. Cloning is cheap.
#[derive(Clone)]
pub struct MigrationEventInfo {
    event: MigrationEvents,
    config: MigrationConfig,
    direction: Direction,
    dry_run: bool,
    version: Option<String>,
}

impl MigrationEventInfo {
    pub fn new(
        event: MigrationEvents,
        config: MigrationConfig,
        direction: Direction,
        dry_run: bool,
        version: Option<String>,
    ) -> Self {
        MigrationEventInfo {
            event,
            config,
            direction,
            dry_run,
            version,
        }
    }

    pub fn event(&self) -> MigrationEvents {
        self.event
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Version identifier, `None` for plan-level events.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

impl Debug for MigrationEventInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationEventInfo")
            .field("event", &self.event)
            .field("direction", &self.direction)
            .field("dry_run", &self.dry_run)
            .field("version", &self.version)
            .finish()
    }
}

/// Any `Fn(MigrationEventInfo) -> MigrantResult<()>` that is `Send + Sync`.
pub trait MigrationEventCallback: Send + Sync + Fn(MigrationEventInfo) -> MigrantResult<()> {}

impl<F> MigrationEventCallback for F where F: Send + Sync + Fn(MigrationEventInfo) -> MigrantResult<()> {}

/// Listener registered on a [`crate::common::MigrationEventBus`].
///
/// A listener error is reported by the bus but never aborts a migration run.
#[derive(Clone)]
pub struct MigrationEventListener {
    on_event: Arc<dyn MigrationEventCallback>,
}

impl MigrationEventListener {
    pub fn new(on_event: impl MigrationEventCallback + 'static) -> Self {
        MigrationEventListener {
            on_event: Arc::new(on_event),
        }
    }
}

impl Handle<MigrationEventInfo> for MigrationEventListener {
    fn handle(&self, event: &Event<MigrationEventInfo>) -> Result<(), BasuError> {
        match (self.on_event)(event.data.clone()) {
            Ok(_) => Ok(()),
            Err(e) => Err(BasuError::HandlerError(Error::from(e))),
        }
    }
}

impl Debug for MigrationEventListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationEventListener").finish()
    }
}
