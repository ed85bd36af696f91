//! Error kinds shared by the service and client sides.
//!
//! - [`SetupError`]: programmer errors caught while building a service or client
//! - [`ProtocolError`]: pipeline misuse and malformed wire traffic
//! - [`TransportError`]: the round trip itself failed
//! - [`CallError`]: everything that can come out of a single call

use crate::chain::Scope;
use crate::exceptions::{ServiceException, UnknownExceptionError};

/// Wire name used for failures that must not leak their details.
pub const INTERNAL_ERROR: &str = "InternalError";
/// Wire name used when the requested operation has no handler.
pub const UNKNOWN_OPERATION: &str = "UnknownOperation";
/// Wire name used when the request body could not be decoded.
pub const MALFORMED_REQUEST: &str = "MalformedRequest";

/// Exception names the framework uses on the wire and that an API
/// description may therefore not declare.
pub const RESERVED_EXCEPTION_NAMES: [&str; 3] =
    [INTERNAL_ERROR, UNKNOWN_OPERATION, MALFORMED_REQUEST];

/// Errors raised while wiring up a service or client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    #[error("operation is not declared by the api: {name}")]
    UnknownOperation { name: String },
    #[error("handler already registered for operation: {name}")]
    DuplicateHandler { name: String },
    #[error("exception name is reserved by the framework: {name}")]
    ReservedException { name: String },
    #[error("invalid endpoint template {template:?}: {reason}")]
    InvalidTemplate { template: String, reason: String },
    #[error("failed to load api description: {reason}")]
    Description { reason: String },
    #[error("failed to build transport: {reason}")]
    Transport { reason: String },
}

/// Pipeline misuse and malformed wire traffic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("{scope} continuation resumed more than once")]
    ContinuationReused { scope: Scope },
    #[error("{scope} continuation called outside the {scope} scope")]
    OutOfScope { scope: Scope },
    #[error("unknown operation: {name}")]
    UnknownOperation { name: String },
    #[error("malformed wire body: {reason}")]
    MalformedBody { reason: String },
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
    #[error("unexpected response status {status}")]
    UnexpectedStatus { status: u16 },
}

/// The round trip to the remote side failed before a reply was read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("transport timed out")]
    Timeout,
    #[error("transport i/o failure: {0}")]
    Io(String),
}

/// Outcome of a failed call, on either side of the wire.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// A declared exception, raised by a handler or plugin or reconstructed
    /// from an error envelope.
    #[error(transparent)]
    Exception(#[from] ServiceException),
    /// An error envelope whose name the local api does not declare.
    #[error("remote error {name}: {message}")]
    Remote { name: String, message: String },
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    UnknownException(#[from] UnknownExceptionError),
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("server overloaded, try again later")]
    Overloaded,
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CallError {
    /// Name of the exception carried by this error, local or remote.
    #[must_use]
    pub fn exception_name(&self) -> Option<&str> {
        match self {
            CallError::Exception(e) => Some(e.name()),
            CallError::Remote { name, .. } => Some(name),
            _ => None,
        }
    }

    /// True when this is the declared exception `name`.
    #[must_use]
    pub fn is_exception(&self, name: &str) -> bool {
        matches!(self, CallError::Exception(e) if e.name() == name)
    }
}
