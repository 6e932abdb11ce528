// error.rs — Error taxonomy for host-side generation
//
// Every fallible host operation returns `CurveError`. Device-side faults are
// not represented here: they live in generated code (see `accessor::DeviceFault`).

use thiserror::Error;

/// Errors raised by registration, layout, generation, and synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CurveError {
    /// Duplicate registration. The existing entry is left untouched.
    #[error("{what} '{name}' is already registered")]
    AlreadyExists { what: &'static str, name: String },

    /// Unregister or lookup of a name that is not present.
    #[error("{what} '{name}' was not found")]
    NotFound { what: &'static str, name: String },

    /// An operation was called out of sequence (double buffer init,
    /// registry mutation after generation started, ...).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The header template and the generator disagree. Never expected in a
    /// correct build.
    #[error("internal error: {0}")]
    InternalError(String),

    /// Rejected configuration or registration parameters.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failure reported by the device module during synchronization.
    #[error("device error: {0}")]
    Device(String),
}

pub type Result<T> = std::result::Result<T, CurveError>;
