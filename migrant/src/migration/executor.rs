use super::{
    Direction, MigrationEventInfo, MigrationEvents, MigrationPlan, Statement, StatementCollector,
};
use crate::common::MigrationEventBus;
use crate::connection::{Connection, Schema};
use crate::errors::{ErrorKind, MigrantError, MigrantResult};
use crate::ledger::VersionLedger;
use crate::migration_config::MigrationConfig;
use crate::version::Version;
use std::time::{Duration, Instant};

/// What happened to one version of a run.
#[derive(Debug, Clone)]
pub struct VersionOutcome {
    version: String,
    statements: Vec<Statement>,
    elapsed: Duration,
}

impl VersionOutcome {
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Statements the unit produced, executed or, during a dry run, only
    /// collected.
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Result of running a plan.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    direction: Direction,
    dry_run: bool,
    outcomes: Vec<VersionOutcome>,
}

impl ExecutionReport {
    fn new(direction: Direction, dry_run: bool) -> Self {
        ExecutionReport {
            direction,
            dry_run,
            outcomes: Vec::new(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn outcomes(&self) -> &[VersionOutcome] {
        &self.outcomes
    }

    pub fn versions(&self) -> Vec<&str> {
        self.outcomes.iter().map(VersionOutcome::version).collect()
    }

    pub fn statement_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.statements.len()).sum()
    }

    pub fn elapsed(&self) -> Duration {
        self.outcomes.iter().map(|o| o.elapsed).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Renders every collected statement as a SQL script, one section per
    /// version.
    pub fn to_sql_script(&self) -> String {
        let mut script = format!(
            "-- Migrating {} ({} version(s))\n",
            self.direction,
            self.outcomes.len()
        );
        for outcome in &self.outcomes {
            script.push_str(&format!("\n-- Version {}\n", outcome.version));
            for statement in &outcome.statements {
                script.push_str(&statement.to_script());
                script.push('\n');
            }
        }
        script
    }
}

/// Runs migration plans against a connection.
///
/// Each version runs on its own: when its unit is transactional the
/// statements and the ledger write share one transaction, otherwise the ledger
/// is written right after the statements succeed. The first failure stops the
/// plan; versions completed before it stay applied.
pub struct MigrationExecutor {
    connection: Connection,
    ledger: VersionLedger,
    event_bus: MigrationEventBus,
    config: MigrationConfig,
}

impl MigrationExecutor {
    pub fn new(
        connection: Connection,
        ledger: VersionLedger,
        event_bus: MigrationEventBus,
        config: MigrationConfig,
    ) -> Self {
        MigrationExecutor {
            connection,
            ledger,
            event_bus,
            config,
        }
    }

    /// Runs every version of `plan` in order.
    ///
    /// A dry run collects and logs statements without executing them and
    /// leaves the ledger untouched.
    pub fn execute(&self, plan: &MigrationPlan, dry_run: bool) -> MigrantResult<ExecutionReport> {
        let direction = plan.direction();
        let mut report = ExecutionReport::new(direction, dry_run);

        if plan.is_empty() {
            log::info!("No migrations to execute, nothing to migrate");
            return Ok(report);
        }

        log::info!(
            "Migrating {} {} version(s): {}{}",
            direction,
            plan.len(),
            plan.ids().join(", "),
            if dry_run { " (dry run)" } else { "" }
        );

        if !dry_run {
            self.ledger.ensure_initialized(&self.connection)?;
        }

        self.notify(MigrationEvents::MigrationsMigrating, direction, dry_run, None);

        let started = Instant::now();
        for version in plan.versions() {
            let outcome = self.execute_version(version, direction, dry_run)?;
            report.outcomes.push(outcome);
        }

        self.notify(MigrationEvents::MigrationsMigrated, direction, dry_run, None);
        log::info!(
            "Migrated {} version(s) {} in {:?}, {} statement(s)",
            report.outcomes.len(),
            direction,
            started.elapsed(),
            report.statement_count()
        );
        Ok(report)
    }

    fn execute_version(
        &self,
        version: &Version,
        direction: Direction,
        dry_run: bool,
    ) -> MigrantResult<VersionOutcome> {
        let id = version.id();
        let started = Instant::now();
        log::info!("Migrating {} to {}", direction, id);
        self.notify(
            MigrationEvents::VersionExecuting,
            direction,
            dry_run,
            Some(id),
        );

        let schema = self
            .connection
            .introspect_schema()
            .map_err(|e| execution_error(id, direction, e))?;
        let statements = self.collect_statements(version, direction, &schema)?;

        if dry_run {
            for statement in &statements {
                log::info!("(dry run) {}", statement.to_script());
            }
        } else if version.is_transactional() {
            self.run_in_transaction(id, direction, &statements)?;
        } else {
            self.run_statements(id, direction, &statements)?;
            self.write_ledger(id, direction)?;
        }

        let elapsed = started.elapsed();
        log::info!("Migrated {} {} in {:?}", direction, id, elapsed);
        self.notify(MigrationEvents::VersionExecuted, direction, dry_run, Some(id));

        Ok(VersionOutcome {
            version: id.to_string(),
            statements,
            elapsed,
        })
    }

    fn collect_statements(
        &self,
        version: &Version,
        direction: Direction,
        schema: &Schema,
    ) -> MigrantResult<Vec<Statement>> {
        let mut collector = StatementCollector::new();
        let unit = version.unit();
        let collected = match direction {
            Direction::Up => unit.up(schema, &mut collector),
            Direction::Down => unit.down(schema, &mut collector),
        };
        collected.map_err(|e| execution_error(version.id(), direction, e))?;

        if collector.is_empty() {
            log::warn!(
                "Migration {} was executed but did not result in any SQL statements",
                version.id()
            );
        }
        Ok(collector.into_statements())
    }

    fn run_in_transaction(
        &self,
        id: &str,
        direction: Direction,
        statements: &[Statement],
    ) -> MigrantResult<()> {
        self.connection.begin_transaction().map_err(|e| {
            MigrantError::new_with_cause(
                &format!("Failed to begin a transaction for version {}", id),
                ErrorKind::TransactionError,
                e,
            )
        })?;

        let result = self
            .run_statements(id, direction, statements)
            .and_then(|_| self.write_ledger(id, direction));

        match result {
            Ok(_) => self.connection.commit().map_err(|e| {
                self.rollback(id);
                execution_error(id, direction, e)
            }),
            Err(e) => {
                self.rollback(id);
                Err(e)
            }
        }
    }

    fn run_statements(&self, id: &str, direction: Direction, statements: &[Statement]) -> MigrantResult<()> {
        for statement in statements {
            log::debug!("{}", statement.to_script());
            self.connection
                .execute_statement(statement.sql(), statement.params())
                .map_err(|e| {
                    log::error!("Migration {} failed during {}: {}", id, direction, e);
                    execution_error(id, direction, e)
                })?;
        }
        Ok(())
    }

    fn write_ledger(&self, id: &str, direction: Direction) -> MigrantResult<()> {
        match direction {
            Direction::Up => self.ledger.mark_migrated(&self.connection, id),
            Direction::Down => self.ledger.mark_not_migrated(&self.connection, id),
        }
    }

    fn rollback(&self, id: &str) {
        match self.connection.rollback() {
            Ok(_) => log::info!("Rolled back version {}", id),
            Err(e) => log::error!("Failed to roll back version {}: {}", id, e),
        }
    }

    fn notify(&self, event: MigrationEvents, direction: Direction, dry_run: bool, version: Option<&str>) {
        if !self.event_bus.has_listeners() {
            return;
        }
        self.event_bus.notify(MigrationEventInfo::new(
            event,
            self.config.clone(),
            direction,
            dry_run,
            version.map(str::to_string),
        ));
    }
}

fn execution_error(id: &str, direction: Direction, cause: MigrantError) -> MigrantError {
    MigrantError::new_with_cause(
        &format!("Migration {} failed while migrating {}: {}", id, direction, cause),
        ErrorKind::MigrationExecutionError {
            version: id.to_string(),
            direction,
        },
        cause,
    )
}
