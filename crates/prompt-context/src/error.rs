//! Context error types
//!
//! One taxonomy for the whole core. Only configuration and command errors
//! escape to callers; payload and diff errors are folded into rendered
//! output by the renderer.

use thiserror::Error;

/// Result type alias for context operations
pub type ContextResult<T> = Result<T, ContextError>;

/// Errors that can occur while managing or rendering context items
#[derive(Error, Debug)]
pub enum ContextError {
    /// A required host capability was not supplied
    #[error("{capability} must be provided")]
    Configuration { capability: String },

    /// A lazy-diff payload could not be coerced into an argument vector
    #[error("{message}")]
    InvalidPayload { message: String },

    /// The diff subprocess failed, was cancelled or timed out
    #[error("{message}")]
    DiffExecution { message: String },

    /// No command registered under this name
    #[error("unknown command: {name}")]
    UnknownCommand { name: String },

    /// No item with this id in the collection
    #[error("no context item with id {id}")]
    ItemNotFound { id: u64 },

    /// An id argument did not parse as an integer
    #[error("invalid item id: {raw}")]
    InvalidId { raw: String },

    /// A command was invoked with the wrong arguments
    #[error("usage: {usage}")]
    Usage { usage: String },

    /// A host capability ran but reported failure
    #[error("{capability} failed: {message}")]
    Capability { capability: String, message: String },

    /// IO error wrapper
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContextError {
    /// Create a missing-capability error
    pub fn configuration(capability: impl Into<String>) -> Self {
        Self::Configuration {
            capability: capability.into(),
        }
    }

    /// Create an invalid payload error
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }

    /// Create a diff execution error
    pub fn diff_execution(message: impl Into<String>) -> Self {
        Self::DiffExecution {
            message: message.into(),
        }
    }

    /// Create a usage error
    pub fn usage(usage: impl Into<String>) -> Self {
        Self::Usage {
            usage: usage.into(),
        }
    }

    /// Create a capability failure error
    pub fn capability(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Capability {
            capability: capability.into(),
            message: message.into(),
        }
    }

    /// Whether this error means the host wired the manager incorrectly
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}
