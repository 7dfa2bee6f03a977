//! Error types for the ferry kernel.

use thiserror::Error;

/// Errors surfaced by the dock and its gates.
///
/// The coordination protocol itself has no recoverable errors: every wait is
/// paired with a signal by construction. These variants cover setup and the
/// teardown path only.
#[derive(Debug, Error)]
pub enum FerryError {
    /// The configuration failed validation. Every problem found is listed.
    #[error("invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    /// A synchronization resource could not be created.
    #[error("failed to initialize {resource}: {reason}")]
    ResourceInit {
        resource: &'static str,
        reason: String,
    },

    /// A gate was closed by teardown while a passenger was waiting on it.
    #[error("{0} was closed during teardown")]
    Closed(&'static str),
}

pub type Result<T> = std::result::Result<T, FerryError>;
