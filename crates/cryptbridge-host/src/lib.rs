//! Cryptbridge Host Binding
//!
//! Exposes cryptbridge crypter, digest and HMAC objects to a dynamically
//! typed scripting host. The host never sees a native type: it holds
//! [`Handle`]s, calls [`Function`]s and receives [`Value`]s.
//!
//! # Lifecycle
//!
//! ```text
//! factory ──▶ Handle ──method calls──▶ Destroy (optional) ──▶ collect (finalizer)
//! ```
//!
//! Handles are generation-checked arena indices, so destroying twice,
//! using a destroyed object or holding on to a collected handle are all
//! ordinary [`DispatchError::InvalidObject`] results.
//!
//! # Errors
//!
//! Operation failures reach the host as `(nil, message)`. Binding misuse is
//! an `Err` for the host to raise as its own argument or type error.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod arena;
pub mod error;
pub mod handle;
pub mod methods;
pub mod module;
pub mod object;
pub mod value;

pub use arena::ObjectArena;
pub use error::DispatchError;
pub use handle::{Handle, TypeTag};
pub use methods::{Method, MethodTable, MethodTables};
pub use module::{GlobalTable, HostGlobals, Module, ModuleConfig, VERSION, VERSION_NUM};
pub use object::NativeObject;
pub use value::{Args, Function, ModuleFunction, Table, Value};
