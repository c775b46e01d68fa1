//! Error taxonomy for crypter, digest and HMAC objects.
//!
//! Engines report failures through their own error types. Every one of them is
//! converted to a [`CryptoError`] at the operation boundary, so callers only
//! ever see this enum. The `Display` text is what ends up in front of the
//! host, so messages stay short.

use thiserror::Error;

/// Failures produced by crypter, digest and HMAC operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The requested or supplied key length is not accepted by the algorithm.
    #[error("invalid {algorithm} {role} length: {length}")]
    InvalidKeyLength {
        /// Algorithm that rejected the length
        algorithm: &'static str,
        /// Which key was rejected ("key", "IV", "private key", ...)
        role: &'static str,
        /// Rejected length, in the unit the caller used
        length: usize,
    },

    /// A serialized key could not be parsed.
    #[error("invalid {algorithm} {role} encoding: {reason}")]
    InvalidKeyFormat {
        /// Algorithm the key was meant for
        algorithm: &'static str,
        /// Which key failed to parse
        role: &'static str,
        /// Parser diagnostic
        reason: String,
    },

    /// An operation needed a key that has not been installed yet.
    #[error("{algorithm} {role} was not set")]
    KeyNotSet {
        /// Algorithm of the crypter
        algorithm: &'static str,
        /// Missing key
        role: &'static str,
    },

    /// The algorithm family does not support this call shape.
    #[error("{0}")]
    UnsupportedOperation(&'static str),

    /// A MAC passed for verification has the wrong size.
    #[error("invalid MAC length: expected {expected} bytes, got {actual}")]
    InvalidMacLength {
        /// Digest size of the HMAC object
        expected: usize,
        /// Length of the supplied MAC
        actual: usize,
    },

    /// The underlying engine failed. The message is passed through verbatim.
    #[error("{0}")]
    EngineFailure(String),
}

/// Last-error slot carried by every crypter.
///
/// Overwritten by each failing call, left untouched on success.
#[derive(Debug, Default, Clone)]
pub struct LastError {
    message: String,
}

impl LastError {
    /// Record the error of `result`, if any, and hand the result back.
    pub fn capture<T>(&mut self, result: Result<T, CryptoError>) -> Result<T, CryptoError> {
        if let Err(err) = &result {
            self.message = err.to_string();
        }
        result
    }

    /// Most recent failure description. Empty if nothing failed yet.
    pub fn message(&self) -> &str {
        &self.message
    }
}
