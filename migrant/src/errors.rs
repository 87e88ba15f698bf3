use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

use crate::migration::Direction;

/// Error kinds for migration operations.
///
/// Callers branch on the kind rather than on message text. Every kind except
/// [`ErrorKind::MigrationExecutionError`] is a plain tag; the execution error
/// carries the version and direction that failed.
///
/// # Examples
///
/// ```rust
/// use migrant::errors::{ErrorKind, MigrantError, MigrantResult};
///
/// fn lookup() -> MigrantResult<()> {
///     Err(MigrantError::new("Unknown version 42", ErrorKind::UnknownVersion))
/// }
///
/// assert_eq!(lookup().unwrap_err().kind(), &ErrorKind::UnknownVersion);
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Discovery
    /// The migration source is unreadable or a discovered name is malformed
    DiscoveryError,

    // Registry consistency
    /// A version with the same identifier is already registered
    DuplicateVersion,
    /// The requested version is not known to the registry
    UnknownVersion,

    // Ledger
    /// Writing to the version ledger failed
    LedgerWriteError,

    // Execution
    /// A statement of a migration unit failed; the plan was aborted
    MigrationExecutionError { version: String, direction: Direction },

    // Administrative
    /// The ledger already holds the requested state for a version
    InvalidState,
    /// An administrative request is malformed (conflicting or missing options)
    InvalidArgument,

    // Collaborators
    /// The connection could not run a statement or query
    ConnectionError,
    /// Beginning, committing or rolling back a transaction failed
    TransactionError,
    /// The configuration is invalid or was changed after it was frozen
    ConfigurationError,
    /// Error in event processing
    EventError,
    /// Generic IO error
    IOError,

    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::DiscoveryError => write!(f, "Discovery error"),
            ErrorKind::DuplicateVersion => write!(f, "Duplicate version"),
            ErrorKind::UnknownVersion => write!(f, "Unknown version"),
            ErrorKind::LedgerWriteError => write!(f, "Ledger write error"),
            ErrorKind::MigrationExecutionError { version, direction } => {
                write!(f, "Migration {} failed while migrating {}", version, direction)
            }
            ErrorKind::InvalidState => write!(f, "Invalid state"),
            ErrorKind::InvalidArgument => write!(f, "Invalid argument"),
            ErrorKind::ConnectionError => write!(f, "Connection error"),
            ErrorKind::TransactionError => write!(f, "Transaction error"),
            ErrorKind::ConfigurationError => write!(f, "Configuration error"),
            ErrorKind::EventError => write!(f, "Event error"),
            ErrorKind::IOError => write!(f, "IO error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Error type for every fallible operation of the crate.
///
/// `MigrantError` carries a message, an [`ErrorKind`], an optional cause and
/// the backtrace captured where it was created. Causes form a chain that is
/// exposed through [`Error::source`].
///
/// # Examples
///
/// ```rust
/// use migrant::errors::{ErrorKind, MigrantError};
///
/// let cause = MigrantError::new("syntax error near DROP", ErrorKind::ConnectionError);
/// let err = MigrantError::new_with_cause("statement failed", ErrorKind::InternalError, cause);
/// assert!(err.cause().is_some());
/// ```
#[derive(Clone)]
pub struct MigrantError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<MigrantError>>,
    backtrace: Arc<Backtrace>,
}

impl MigrantError {
    /// Creates a new error with the given message and kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        MigrantError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    /// Creates a new error that keeps `cause` as its source.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: MigrantError) -> Self {
        MigrantError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&MigrantError> {
        self.cause.as_deref()
    }

    /// Returns the innermost error of the cause chain.
    pub fn root_cause(&self) -> &MigrantError {
        let mut current = self;
        while let Some(cause) = current.cause() {
            current = cause;
        }
        current
    }
}

impl Display for MigrantError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for MigrantError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace),
        }
    }
}

impl Error for MigrantError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// Shorthand for `Result<T, MigrantError>`.
pub type MigrantResult<T> = Result<T, MigrantError>;

impl From<std::io::Error> for MigrantError {
    fn from(err: std::io::Error) -> Self {
        MigrantError::new(&format!("IO error: {}", err), ErrorKind::IOError)
    }
}

impl From<regex::Error> for MigrantError {
    fn from(err: regex::Error) -> Self {
        MigrantError::new(
            &format!("Invalid pattern: {}", err),
            ErrorKind::ConfigurationError,
        )
    }
}

impl From<rusqlite::Error> for MigrantError {
    fn from(err: rusqlite::Error) -> Self {
        MigrantError::new(&format!("Database error: {}", err), ErrorKind::ConnectionError)
    }
}

impl From<String> for MigrantError {
    fn from(msg: String) -> Self {
        MigrantError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for MigrantError {
    fn from(msg: &str) -> Self {
        MigrantError::new(msg, ErrorKind::InternalError)
    }
}
