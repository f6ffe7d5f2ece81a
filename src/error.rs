//! Errors returned by the discovery functions.
use std::io;

use thiserror::Error;

/// Failure of a discovery operation.
#[derive(Debug, Error)]
pub enum Error {
    /// A required input is empty or meaningless (e.g. `0.0.0.0`).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A socket or OS table could not be opened, bound or written to.
    #[error("{resource} unavailable: {source}")]
    Unavailable {
        resource: &'static str,
        #[source]
        source: io::Error,
    },

    /// The kernel sent a malformed, truncated or error-flagged frame.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A length does not fit in the space reserved for it.
    #[error("overflow: {0}")]
    Overflow(String),

    /// No matching route, neighbor entry or interface.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation is not available on this platform.
    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn unavailable(resource: &'static str, source: impl Into<io::Error>) -> Self {
        Error::Unavailable {
            resource,
            source: source.into(),
        }
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Error::NotFound(message.into())
    }
}

