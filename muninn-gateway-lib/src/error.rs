use std::fmt;
use thiserror::Error;

/// Errors that can occur in the gateway data plane
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Coordination store error: {0}")]
    Store(#[from] StoreError),

    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("Malformed invalidation payload: {0}")]
    MalformedPayload(String),

    #[error("Metrics error: {0}")]
    Metrics(String),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Failure classes of a coordination store call.
///
/// Every store error is mapped onto one of these at the client boundary so the
/// rate limit service only ever has to match on a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// The call did not complete within its deadline.
    Timeout,
    /// The store could not be reached, or the connection dropped mid-call.
    Connection,
    /// The store answered, but not with something we understand.
    Protocol,
}

impl StoreErrorKind {
    /// Transient failures are worth retrying; protocol failures are not.
    pub fn is_transient(self) -> bool {
        matches!(self, StoreErrorKind::Timeout | StoreErrorKind::Connection)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StoreErrorKind::Timeout => "timeout",
            StoreErrorKind::Connection => "connection",
            StoreErrorKind::Protocol => "protocol",
        }
    }
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct StoreError {
    kind: StoreErrorKind,
    message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Timeout, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Connection, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Protocol, message)
    }

    pub fn kind(&self) -> StoreErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        let kind = if err.is_timeout() {
            StoreErrorKind::Timeout
        } else if err.is_connection_refusal()
            || err.is_connection_dropped()
            || err.is_io_error()
            || err.is_unrecoverable_error()
        {
            StoreErrorKind::Connection
        } else {
            StoreErrorKind::Protocol
        };
        Self::new(kind, err.to_string())
    }
}
