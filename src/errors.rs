//! Scenario Error Hierarchy
//!
//! Errors are split by who is at fault: the cluster under test violating an
//! invariant the scenario checks, a readiness condition not reached in time,
//! or the surrounding infrastructure (supervisor, client, filesystem) failing.
//! None of them is retried.

use std::time::Duration;

use config::ConfigError;

use crate::ReadinessCondition;
use crate::ServerName;
use crate::StatusDocument;
use crate::TableRef;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An invariant explicitly checked by the scenario did not hold
    #[error("Assertion failed: {message}")]
    Assertion {
        message: String,
        status: Option<Box<StatusDocument>>,
    },

    /// A wait condition was not observed before its deadline. `condition`
    /// is `None` when the server's default condition was awaited.
    #[error(
        "Table {table} did not reach {} within {timeout:?}",
        .condition.map(|c| c.as_str()).unwrap_or("default readiness")
    )]
    ReadinessTimeout {
        table: TableRef,
        condition: Option<ReadinessCondition>,
        timeout: Duration,
        status: Box<StatusDocument>,
    },

    /// Server lifecycle, client or filesystem failures
    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),

    /// Configuration source could not be loaded or deserialized
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// A shutdown request cut the run short
    #[error("Scenario interrupted by shutdown request")]
    Interrupted,
}

#[derive(Debug, thiserror::Error)]
pub enum InfrastructureError {
    #[error("Server {server} failed to start: {reason}")]
    ServerStart { server: ServerName, reason: String },

    #[error("Server {server} failed to stop: {reason}")]
    ServerStop { server: ServerName, reason: String },

    /// Stop completed but the instance did not exit cleanly
    #[error("Server {server} exited uncleanly with code {code}")]
    UncleanExit { server: ServerName, code: i32 },

    #[error("Server {0} is not running")]
    ServerNotRunning(ServerName),

    #[error("Connect to {endpoint} failed: {reason}")]
    Connect { endpoint: String, reason: String },

    /// The server rejected or failed a query
    #[error("Query `{query}` failed: {reason}")]
    Query { query: &'static str, reason: String },

    /// Client-side bound expired before the server answered
    #[error("{operation} did not complete within {duration:?}")]
    OperationTimeout {
        operation: &'static str,
        duration: Duration,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Codec(#[from] bincode::Error),
}

impl Error {
    pub(crate) fn assertion(
        message: impl Into<String>,
        status: Option<StatusDocument>,
    ) -> Self {
        Error::Assertion {
            message: message.into(),
            status: status.map(Box::new),
        }
    }

    /// Status document captured when the error was raised, if any.
    pub fn status_document(&self) -> Option<&StatusDocument> {
        match self {
            Error::Assertion { status, .. } => status.as_deref(),
            Error::ReadinessTimeout { status, .. } => Some(status),
            _ => None,
        }
    }

    pub fn is_assertion(&self) -> bool {
        matches!(self, Error::Assertion { .. })
    }

    pub fn is_readiness_timeout(&self) -> bool {
        matches!(self, Error::ReadinessTimeout { .. })
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Interrupted)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Infrastructure(InfrastructureError::Io(e))
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Infrastructure(InfrastructureError::Codec(e))
    }
}
