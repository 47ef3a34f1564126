//! Bridge error types
//!
//! Recoverable conditions never show up here: a missing symbol, a failed load or
//! an exhausted allocator is reported as `None` by the operation itself. What is
//! left are caller-contract violations and fatal inconsistencies.

use thiserror::Error;

/// Value did not fit the primitive its signature declared
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarshalError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },
}

/// Errors crossing the bridge boundary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// Argument count does not match the declared signature
    #[error("Expected {expected} arguments, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    /// Signature declares a void parameter
    #[error("Parameter {index} of {descriptor} is void")]
    VoidParameter { index: usize, descriptor: String },

    /// Requested size does not fit the platform's addressable range
    #[error("Size {size} is outside the addressable range")]
    SizeOutOfRange { size: i64 },

    /// Platform cannot give each library its own symbol namespace
    #[error("Native library isolation is not supported: {0}")]
    IsolationUnsupported(String),

    /// Process namespace could not be opened
    #[error("Default library is unavailable: {0}")]
    DefaultLibraryUnavailable(String),

    /// Declared signature and actual values disagree at the native boundary
    #[error("Marshal error in {descriptor}: {source}")]
    Marshal {
        descriptor: String,
        source: MarshalError,
    },

    /// Managed callee reported a failure
    #[error("Callee failed: {0}")]
    Callee(String),
}

impl BridgeError {
    /// Whether this error indicates an unrecoverable inconsistency
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::IsolationUnsupported(_)
                | BridgeError::DefaultLibraryUnavailable(_)
                | BridgeError::Marshal { .. }
        )
    }

    /// Whether this error is a bug in the calling code
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            BridgeError::ArityMismatch { .. } | BridgeError::VoidParameter { .. }
        )
    }
}

/// Log a fatal condition and hand it back for propagation
pub(crate) fn escalate(err: BridgeError) -> BridgeError {
    tracing::error!(error = %err, "should not reach here");
    err
}
