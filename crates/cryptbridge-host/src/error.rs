//! Host-raised failures.
//!
//! Two channels reach the host. Operation failures (a bad key, a failed
//! decryption) are ordinary results and travel as `(nil, message)` values.
//! Misuse of the binding itself (wrong argument type, destroyed object,
//! calling a non-function) is raised the way the host raises its own
//! argument and type errors. [`DispatchError`] carries both kinds;
//! [`DispatchError::is_soft`] tells them apart.

use cryptbridge_crypto::CryptoError;
use thiserror::Error;

/// Failure of a call through the host binding.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// The handle was destroyed, collected, or never belonged to this module.
    #[error("invalid {type_name}")]
    InvalidObject {
        /// Type name of the expected object ("crypter", "hasher", "hmac")
        type_name: &'static str,
    },

    /// An argument has the wrong type.
    #[error("bad argument #{position} ({expected} expected, got {actual})")]
    TypeMismatch {
        /// 1-based argument position, `self` included
        position: usize,
        /// Expected host type
        expected: &'static str,
        /// Host type actually passed
        actual: &'static str,
    },

    /// A numeric argument cannot be used as a size.
    #[error("bad argument #{position} (number has no integer representation: {value})")]
    InvalidNumber {
        /// 1-based argument position
        position: usize,
        /// Offending value
        value: f64,
    },

    /// The attribute looked up for a call is not a function.
    #[error("attempt to call '{name}' (a {actual} value)")]
    NotCallable {
        /// Attribute name
        name: String,
        /// Host type found under that name
        actual: &'static str,
    },

    /// A native object could not be created.
    #[error("failed to create object")]
    CreationFailed {
        /// Underlying cause, logged but not shown to the host
        reason: String,
    },

    /// The module has not been initialized, or was deinitialized.
    #[error("module is not initialized")]
    NotInitialized,

    /// A crypter, digest or HMAC operation failed.
    #[error(transparent)]
    Operation(#[from] CryptoError),

    /// A request exceeds a configured limit.
    #[error("requested {requested} bytes, limit is {limit}")]
    LimitExceeded {
        /// Requested size
        requested: usize,
        /// Configured maximum
        limit: usize,
    },

    /// Text passed to a decoder is not valid in its encoding.
    #[error("invalid {encoding}: {reason}")]
    InvalidEncoding {
        /// Encoding that rejected the input
        encoding: &'static str,
        /// Decoder diagnostic
        reason: String,
    },

    /// No hash algorithm has this identifier.
    #[error("unknown hash algorithm '{id}'")]
    UnknownAlgorithm {
        /// Identifier passed by the caller
        id: String,
    },
}

impl DispatchError {
    /// Whether the host receives this as a `(nil, message)` result instead
    /// of a raised error.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            Self::Operation(_)
                | Self::CreationFailed { .. }
                | Self::LimitExceeded { .. }
                | Self::InvalidEncoding { .. }
                | Self::UnknownAlgorithm { .. }
        )
    }
}
