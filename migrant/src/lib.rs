//! # Migrant - ordered, reversible database migrations
//!
//! Migrant tracks and applies versioned schema and data changes against a
//! relational database and keeps a durable record, the version ledger, of
//! which changes are applied.
//!
//! ## Key Features
//!
//! - **Discovery**: `.sql` files with `-- up` / `-- down` sections, or any
//!   custom [`migration::MigrationFinder`]
//! - **Planning**: up or down to the latest version, a given version or zero
//! - **Transactions**: a transactional unit and its ledger write commit or roll
//!   back together
//! - **Dry runs**: collect and log every statement without touching the database
//! - **Ledger repair**: mark one, all or a range of versions as applied or not
//! - **Events**: listeners notified before and after every run and version
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use migrant::connection::{Connection, InMemoryConnection};
//! use migrant::migration::{SqlMigration, Target};
//! use migrant::Migrator;
//!
//! let migrator = Migrator::builder()
//!     .connection(Connection::new(InMemoryConnection::new()?))
//!     .add_migration(
//!         "20240101000000",
//!         SqlMigration::parse("-- up\nCREATE TABLE users (id INTEGER);\n-- down\nDROP TABLE users;")?,
//!     )
//!     .build()?;
//!
//! migrator.migrate(&Target::Latest, false)?;
//! migrator.migrate(&Target::Zero, false)?;
//! ```
//!
//! ## Module Organization
//!
//! - [`common`] - Constants, lock helpers and the event bus
//! - [`connection`] - Connection contract and the in-memory connection
//! - [`errors`] - Error types and result definitions
//! - [`ledger`] - The version ledger
//! - [`migration`] - Units, discovery, planning and execution
//! - [`version`] - Versions, the registry and ledger repair
//! - [`migrator`] - The migrator facade
//! - [`migrator_builder`] - Migrator builder
//! - [`migration_config`] - Migrator configuration

pub mod common;
pub mod connection;
pub mod errors;
pub mod ledger;
pub mod migration;
pub mod migration_config;
pub mod migrator;
pub mod migrator_builder;
pub mod version;

pub use migration_config::MigrationConfig;
pub use migrator::{MigrationStatus, Migrator};
pub use migrator_builder::MigratorBuilder;

#[cfg(test)]
#[ctor::ctor]
fn init() {
    colog::init();
}
