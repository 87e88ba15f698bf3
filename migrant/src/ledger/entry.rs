use chrono::{DateTime, Utc};

/// One applied version as recorded in the ledger table.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LedgerEntry {
    version: String,
    executed_at: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    pub fn new(version: &str, executed_at: Option<DateTime<Utc>>) -> Self {
        LedgerEntry {
            version: version.to_string(),
            executed_at,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// When the version was recorded. `None` for rows written by other tools
    /// or with an unparseable timestamp.
    pub fn executed_at(&self) -> Option<DateTime<Utc>> {
        self.executed_at
    }

    pub(crate) fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}
