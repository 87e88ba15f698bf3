/// Event type name under which every migration event is published.
pub const MIGRANT_EVENT: &str = "migrant_event";

/// Default name of the ledger table.
pub const DEFAULT_TABLE_NAME: &str = "migration_versions";

/// Default name of the ledger column holding version identifiers.
pub const DEFAULT_VERSION_COLUMN: &str = "version";

/// Default name of the ledger column holding the execution timestamp.
pub const DEFAULT_EXECUTED_AT_COLUMN: &str = "executed_at";

/// File name prefix used by the directory finder when no namespace is given.
pub const DEFAULT_FILE_PREFIX: &str = "Version";

/// Extension of migration files discovered on disk.
pub const MIGRATION_FILE_EXTENSION: &str = "sql";

// version aliases
pub const ALIAS_FIRST: &str = "first";
pub const ALIAS_ZERO: &str = "0";
pub const ALIAS_LATEST: &str = "latest";
pub const ALIAS_CURRENT: &str = "current";
pub const ALIAS_PREV: &str = "prev";
pub const ALIAS_NEXT: &str = "next";
