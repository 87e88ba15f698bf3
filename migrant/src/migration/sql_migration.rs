use super::{MigrationUnit, StatementCollector};
use crate::connection::Schema;
use crate::errors::{ErrorKind, MigrantError, MigrantResult};
use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};
use std::path::Path;

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Preamble,
    Up,
    Down,
}

/// A migration unit with static SQL for both directions.
///
/// Usually loaded from a file laid out like this:
///
/// ```sql
/// -- description: create the users table
/// -- up
/// CREATE TABLE users (id INTEGER PRIMARY KEY, name VARCHAR(255));
/// INSERT INTO users VALUES (1, 'admin');
/// -- down
/// DROP TABLE users;
/// ```
///
/// Markers are case-insensitive. `-- transactional: false` anywhere in the
/// file makes the unit run without a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlMigration {
    up: Vec<String>,
    down: Vec<String>,
    transactional: bool,
    description: String,
}

impl SqlMigration {
    pub fn new(up: Vec<String>, down: Vec<String>) -> Self {
        SqlMigration {
            up,
            down,
            transactional: true,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_transactional(mut self, transactional: bool) -> Self {
        self.transactional = transactional;
        self
    }

    /// Reads and parses a migration file.
    pub fn from_file(path: &Path) -> MigrantResult<SqlMigration> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MigrantError::new_with_cause(
                &format!("Failed to read migration file {}", path.display()),
                ErrorKind::DiscoveryError,
                e.into(),
            )
        })?;

        SqlMigration::parse(&content).map_err(|e| {
            MigrantError::new_with_cause(
                &format!("Invalid migration file {}", path.display()),
                ErrorKind::DiscoveryError,
                e,
            )
        })
    }

    /// Parses migration text with `-- up` and `-- down` sections.
    pub fn parse(content: &str) -> MigrantResult<SqlMigration> {
        let mut section = Section::Preamble;
        let mut seen_up = false;
        let mut up_text = String::new();
        let mut down_text = String::new();
        let mut migration = SqlMigration::new(Vec::new(), Vec::new());

        for line in content.lines() {
            let trimmed = line.trim();
            if let Some(comment) = trimmed.strip_prefix("--") {
                let comment = comment.trim();
                let lowered = comment.to_lowercase();
                if lowered == "up" {
                    if seen_up {
                        return Err(parse_error("'-- up' marker appears more than once"));
                    }
                    seen_up = true;
                    section = Section::Up;
                } else if lowered == "down" {
                    if section == Section::Down {
                        return Err(parse_error("'-- down' marker appears more than once"));
                    }
                    section = Section::Down;
                } else if let Some(value) = lowered.strip_prefix("transactional:") {
                    migration.transactional = parse_flag(value.trim())?;
                } else if lowered.starts_with("description:") {
                    if let Some((_, description)) = comment.split_once(':') {
                        migration.description = description.trim().to_string();
                    }
                }
                continue;
            }

            match section {
                Section::Preamble if !trimmed.is_empty() => {
                    return Err(parse_error("SQL found before the '-- up' marker"));
                }
                Section::Preamble => {}
                Section::Up => {
                    up_text.push_str(line);
                    up_text.push('\n');
                }
                Section::Down => {
                    down_text.push_str(line);
                    down_text.push('\n');
                }
            }
        }

        if !seen_up {
            return Err(parse_error("missing '-- up' marker"));
        }

        migration.up = split_statements(&up_text)?;
        migration.down = split_statements(&down_text)?;
        Ok(migration)
    }

    pub fn up_statements(&self) -> &[String] {
        &self.up
    }

    pub fn down_statements(&self) -> &[String] {
        &self.down
    }
}

impl MigrationUnit for SqlMigration {
    fn up(&self, _schema: &Schema, collector: &mut StatementCollector) -> MigrantResult<()> {
        for sql in &self.up {
            collector.add_sql(sql);
        }
        Ok(())
    }

    fn down(&self, _schema: &Schema, collector: &mut StatementCollector) -> MigrantResult<()> {
        for sql in &self.down {
            collector.add_sql(sql);
        }
        Ok(())
    }

    fn is_transactional(&self) -> bool {
        self.transactional
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

fn parse_error(message: &str) -> MigrantError {
    MigrantError::new(message, ErrorKind::DiscoveryError)
}

fn parse_flag(value: &str) -> MigrantResult<bool> {
    match value {
        "true" | "yes" | "on" => Ok(true),
        "false" | "no" | "off" => Ok(false),
        other => Err(parse_error(&format!(
            "invalid value '{}' for the transactional marker",
            other
        ))),
    }
}

/// Splits SQL text into statements with the `sqlparser` tokenizer.
///
/// Comments are dropped; every other token keeps its original spelling
/// (escapes inside literals included), so dialect-specific statements split
/// the same way as portable ones.
fn split_statements(text: &str) -> MigrantResult<Vec<String>> {
    let dialect = GenericDialect {};
    let tokens = Tokenizer::new(&dialect, text)
        .with_unescape(false)
        .tokenize()
        .map_err(|e| parse_error(&format!("invalid SQL: {}", e)))?;

    let mut statements = Vec::new();
    let mut current = String::new();
    for token in tokens {
        match token {
            Token::SemiColon => {
                push_statement(&mut statements, &current);
                current.clear();
            }
            Token::Whitespace(Whitespace::SingleLineComment { .. }) => current.push('\n'),
            Token::Whitespace(Whitespace::MultiLineComment(_)) => current.push(' '),
            other => current.push_str(&other.to_string()),
        }
    }
    push_statement(&mut statements, &current);
    Ok(statements)
}

fn push_statement(statements: &mut Vec<String>, text: &str) {
    let statement = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if !statement.is_empty() {
        statements.push(statement);
    }
}
