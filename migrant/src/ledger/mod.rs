//! Durable record of applied versions.
//!
//! The ledger lives in a table of the target database and is read and written
//! through the same [`crate::connection::Connection`] the migrations use, so a
//! ledger write issued inside a unit's transaction commits or rolls back with
//! it.

mod entry;
mod version_ledger;

pub use entry::LedgerEntry;
pub use version_ledger::VersionLedger;
