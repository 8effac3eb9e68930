//! Error types for docstore

use thiserror::Error;

/// Result type alias for docstore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for configuration, connection and CRUD operations
///
/// Connection establishment and the liveness probe that follows it are kept
/// as separate variants so callers can tell "never connected" apart from
/// "connected but the server did not answer".
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The driver client could not be created from the configured options
    #[error("Failed to establish MongoDB connection: {0}")]
    Connect(#[source] mongodb::error::Error),

    /// The client was created but the ping against the deployment failed
    #[error("MongoDB liveness probe failed: {0}")]
    Ping(#[source] mongodb::error::Error),

    /// Driver error raised by a CRUD operation, passed through untouched
    #[error("MongoDB error: {0}")]
    MongoDB(#[from] mongodb::error::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// The configured operation timeout elapsed before the driver answered
    #[error("Timeout: {0}")]
    Timeout(String),
}

impl Error {
    /// Returns true if the connection was never established
    pub fn is_connect_failure(&self) -> bool {
        matches!(self, Error::Connect(_))
    }

    /// Returns true if the connection was established but the ping failed
    pub fn is_ping_failure(&self) -> bool {
        matches!(self, Error::Ping(_))
    }

    /// Returns true if an operation deadline elapsed
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }

    /// The underlying driver error, if this error carries one
    pub fn driver_error(&self) -> Option<&mongodb::error::Error> {
        match self {
            Error::Connect(e) | Error::Ping(e) | Error::MongoDB(e) => Some(e),
            _ => None,
        }
    }
}

impl From<bson::ser::Error> for Error {
    fn from(err: bson::ser::Error) -> Self {
        Error::Serialization(format!("BSON serialization error: {}", err))
    }
}

impl From<bson::de::Error> for Error {
    fn from(err: bson::de::Error) -> Self {
        Error::Deserialization(format!("BSON deserialization error: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(err.to_string())
    }
}
