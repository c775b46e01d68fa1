//! Host value model and argument checking.
//!
//! The host is dynamically typed. Everything that crosses the boundary is a
//! [`Value`]; byte strings carry an explicit length and are never assumed to
//! be text. Argument positions are 1-based with the receiver (`self`) at
//! position 1, matching the host's own error messages.

use std::collections::BTreeMap;

use cryptbridge_crypto::HashAlgorithm;

use crate::{
    error::DispatchError,
    handle::{Handle, TypeTag},
};

/// String-keyed host table.
pub type Table = BTreeMap<String, Value>;

/// Largest size a host number carries exactly.
const MAX_EXACT_SIZE: f64 = 9_007_199_254_740_992.0;

/// A host value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absence of a value
    Nil,
    /// Boolean
    Bool(bool),
    /// Number (the host only has doubles)
    Number(f64),
    /// Byte string of explicit length
    Bytes(Vec<u8>),
    /// Table with string keys
    Table(Table),
    /// Callable provided by this module
    Function(Function),
    /// Handle to a native object
    Object(Handle),
}

impl Value {
    /// Host type name, as shown in argument errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Bytes(_) => "string",
            Self::Table(_) => "table",
            Self::Function(_) => "function",
            Self::Object(handle) => handle.tag().name(),
        }
    }

    /// Whether the value is `nil`.
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Borrow the bytes of a string value.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes.as_slice()),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Bytes(value.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Bytes(value.into_bytes())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<Handle> for Value {
    fn from(value: Handle) -> Self {
        Self::Object(value)
    }
}

/// Callables this module hands to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    /// Module-level function from the namespace table
    Module(ModuleFunction),
    /// Entry of a per-type fixed method table
    Method {
        /// Type whose table holds the method
        tag: TypeTag,
        /// Method name
        name: &'static str,
    },
}

/// Module-level functions installed in the namespace table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleFunction {
    /// New AES crypter
    NewSymmetricCrypter,
    /// New RSA crypter
    NewRsaCrypter,
    /// New elliptic-curve crypter
    NewEcCrypter,
    /// New digest object for a fixed algorithm
    Digest(HashAlgorithm),
    /// New HMAC object for a fixed algorithm
    Hmac(HashAlgorithm),
    /// New digest object, algorithm chosen by identifier argument
    NewDigest,
    /// New HMAC object, algorithm chosen by identifier argument
    NewHmac,
    /// Random bytes from the OS generator
    GenerateRandomBytes,
    /// Standard base64 encoding
    Base64Encode,
    /// Standard base64 decoding
    Base64Decode,
}

static NIL: Value = Value::Nil;

/// Positional view over call arguments.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    values: &'a [Value],
}

impl<'a> Args<'a> {
    /// Wrap an argument list.
    pub fn new(values: &'a [Value]) -> Self {
        Self { values }
    }

    /// Argument at 1-based `position`, `nil` when absent.
    pub fn get(&self, position: usize) -> &'a Value {
        position.checked_sub(1).and_then(|i| self.values.get(i)).unwrap_or(&NIL)
    }

    pub(crate) fn mismatch(&self, position: usize, expected: &'static str) -> DispatchError {
        let actual =
            if position > self.values.len() { "no value" } else { self.get(position).type_name() };
        DispatchError::TypeMismatch { position, expected, actual }
    }

    /// Object handle of type `tag`.
    pub fn check_object(&self, position: usize, tag: TypeTag) -> Result<Handle, DispatchError> {
        match self.get(position) {
            Value::Object(handle) if handle.tag() == tag => Ok(*handle),
            _ => Err(self.mismatch(position, tag.name())),
        }
    }

    /// Byte string.
    pub fn check_bytes(&self, position: usize) -> Result<&'a [u8], DispatchError> {
        match self.get(position) {
            Value::Bytes(bytes) => Ok(bytes.as_slice()),
            _ => Err(self.mismatch(position, "string")),
        }
    }

    /// Non-negative size no larger than 2^53. Fractions are truncated.
    pub fn check_size(&self, position: usize) -> Result<usize, DispatchError> {
        match self.get(position) {
            Value::Number(value) if (0.0..=MAX_EXACT_SIZE).contains(value) => Ok(*value as usize),
            Value::Number(value) => Err(DispatchError::InvalidNumber { position, value: *value }),
            _ => Err(self.mismatch(position, "number")),
        }
    }

    /// Optional boolean, `default` when absent or `nil`.
    pub fn opt_bool(&self, position: usize, default: bool) -> Result<bool, DispatchError> {
        match self.get(position) {
            Value::Nil => Ok(default),
            Value::Bool(value) => Ok(*value),
            _ => Err(self.mismatch(position, "boolean")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_arguments_are_nil() {
        let values = [Value::from(1usize)];
        let args = Args::new(&values);

        assert_eq!(args.get(1), &Value::Number(1.0));
        assert!(args.get(2).is_nil());
        assert!(args.get(0).is_nil());
    }

    #[test]
    fn absent_argument_reports_no_value() {
        let args = Args::new(&[]);
        let err = args.check_bytes(2).unwrap_err();

        assert_eq!(err.to_string(), "bad argument #2 (string expected, got no value)");
    }

    #[test]
    fn wrong_type_reports_actual_type() {
        let values = [Value::Nil, Value::Bool(true)];
        let err = Args::new(&values).check_size(2).unwrap_err();

        assert_eq!(
            err,
            DispatchError::TypeMismatch { position: 2, expected: "number", actual: "boolean" }
        );
    }

    #[test]
    fn sizes_truncate_and_reject_negatives() {
        let values = [Value::Number(16.9), Value::Number(-1.0), Value::Number(f64::NAN)];
        let args = Args::new(&values);

        assert_eq!(args.check_size(1), Ok(16));
        assert!(matches!(args.check_size(2), Err(DispatchError::InvalidNumber { .. })));
        assert!(matches!(args.check_size(3), Err(DispatchError::InvalidNumber { .. })));
    }

    #[test]
    fn sizes_beyond_exact_range_are_rejected() {
        let values = [
            Value::Number(9_007_199_254_740_992.0),
            Value::Number(1e30),
            Value::Number(f64::INFINITY),
        ];
        let args = Args::new(&values);

        assert_eq!(args.check_size(1), Ok(1 << 53));
        assert_eq!(
            args.check_size(2),
            Err(DispatchError::InvalidNumber { position: 2, value: 1e30 })
        );
        assert!(matches!(args.check_size(3), Err(DispatchError::InvalidNumber { .. })));
    }

    #[test]
    fn bytes_keep_embedded_zeros() {
        let values = [Value::Bytes(vec![0, 1, 0, 2])];
        assert_eq!(Args::new(&values).check_bytes(1), Ok(&[0u8, 1, 0, 2][..]));
    }

    #[test]
    fn optional_bool_defaults() {
        let values = [Value::Nil, Value::Bool(false), Value::from("yes")];
        let args = Args::new(&values);

        assert_eq!(args.opt_bool(1, true), Ok(true));
        assert_eq!(args.opt_bool(2, true), Ok(false));
        assert_eq!(args.opt_bool(4, true), Ok(true));
        assert!(args.opt_bool(3, true).is_err());
    }
}
