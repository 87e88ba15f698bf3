//! Migration units, discovery, planning and execution.
//!
//! A migration is a versioned, reversible change. Each version owns a
//! [`MigrationUnit`] that produces the statements for either direction; the
//! [`MigrationPlanner`] decides which versions must run to reach a target and
//! the [`MigrationExecutor`] runs them one at a time, keeping the version
//! ledger in step.
//!
//! # Writing a migration
//!
//! ```rust,ignore
//! use migrant::migration::{MigrationUnit, StatementCollector};
//!
//! struct CreateUsers;
//!
//! impl MigrationUnit for CreateUsers {
//!     fn up(&self, _schema: &Schema, sql: &mut StatementCollector) -> MigrantResult<()> {
//!         sql.add_sql("CREATE TABLE users (id INTEGER PRIMARY KEY)");
//!         Ok(())
//!     }
//!
//!     fn down(&self, _schema: &Schema, sql: &mut StatementCollector) -> MigrantResult<()> {
//!         sql.add_sql("DROP TABLE users");
//!         Ok(())
//!     }
//! }
//! ```
//!
//! Units that must not run inside a transaction (some engines refuse DDL in
//! one) return `false` from [`MigrationUnit::is_transactional`].

mod event;
mod executor;
mod finder;
mod planner;
mod sql_migration;
mod unit;

pub use event::*;
pub use executor::*;
pub use finder::*;
pub use planner::*;
pub use sql_migration::SqlMigration;
pub use unit::*;

use std::fmt::{Display, Formatter};

/// Direction a migration is applied in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn is_up(&self) -> bool {
        matches!(self, Direction::Up)
    }

    pub fn reverse(&self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}
