//! Per-type fixed method tables.
//!
//! Each table is built once at module initialization and is read-only
//! afterwards. Native methods receive the object behind the receiver handle
//! plus the full argument list (receiver at position 1). `Destroy` and
//! `IsValid` act on the handle rather than the object and are resolved by
//! the module.

use std::collections::BTreeMap;

use cryptbridge_crypto::{Crypter, CryptoError, Digester, KeyInstall, Keyed};

use crate::{
    error::DispatchError,
    handle::TypeTag,
    object::NativeObject,
    value::{Args, Value},
};

/// Native implementation of one method.
pub type NativeMethod = fn(&mut NativeObject, &Args<'_>) -> Result<Vec<Value>, DispatchError>;

/// Entry of a fixed method table.
#[derive(Clone, Copy)]
pub enum Method {
    /// Release the native object
    Destroy,
    /// Whether the native object is still alive
    IsValid,
    /// Operation on the native object
    Native(NativeMethod),
}

impl std::fmt::Debug for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Destroy => f.write_str("Destroy"),
            Self::IsValid => f.write_str("IsValid"),
            Self::Native(_) => f.write_str("Native"),
        }
    }
}

/// Read-only method table for one handle type.
#[derive(Debug, Default)]
pub struct MethodTable {
    methods: BTreeMap<&'static str, Method>,
}

impl MethodTable {
    fn with(mut self, name: &'static str, method: Method) -> Self {
        self.methods.insert(name, method);
        self
    }

    fn native(self, name: &'static str, method: NativeMethod) -> Self {
        self.with(name, Method::Native(method))
    }

    /// Method registered under `name`, with the table's copy of the name.
    pub fn get(&self, name: &str) -> Option<(&'static str, Method)> {
        self.methods.get_key_value(name).map(|(name, method)| (*name, *method))
    }

    /// Registered method names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.methods.keys().copied()
    }

    /// Number of registered methods.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// The fixed method tables of every handle type.
#[derive(Debug)]
pub struct MethodTables {
    crypter: MethodTable,
    digest: MethodTable,
    hmac: MethodTable,
}

impl MethodTables {
    /// Build all tables.
    pub fn build() -> Self {
        Self { crypter: crypter_table(), digest: digest_table(), hmac: hmac_table() }
    }

    /// Table for handles tagged `tag`.
    pub fn for_tag(&self, tag: TypeTag) -> &MethodTable {
        match tag {
            TypeTag::Crypter => &self.crypter,
            TypeTag::Digest => &self.digest,
            TypeTag::Hmac => &self.hmac,
        }
    }
}

fn lifecycle() -> MethodTable {
    MethodTable::default().with("Destroy", Method::Destroy).with("IsValid", Method::IsValid)
}

fn crypter_table() -> MethodTable {
    lifecycle()
        .native("AlgorithmName", crypter_algorithm_name)
        .native("MaxPlaintextLength", crypter_max_plaintext_length)
        .native("CiphertextLength", crypter_ciphertext_length)
        .native("FixedMaxPlaintextLength", crypter_fixed_max_plaintext_length)
        .native("FixedCiphertextLength", crypter_fixed_ciphertext_length)
        .native("GetValidPrimaryKeyLength", crypter_valid_primary_key_length)
        .native("GetValidSecondaryKeyLength", crypter_valid_secondary_key_length)
        .native("GeneratePrimaryKey", crypter_generate_primary_key)
        .native("SetPrimaryKey", crypter_set_primary_key)
        .native("GenerateSecondaryKey", crypter_generate_secondary_key)
        .native("SetSecondaryKey", crypter_set_secondary_key)
        .native("Encrypt", crypter_encrypt)
        .native("Decrypt", crypter_decrypt)
        .native("GetLastError", crypter_last_error)
}

fn with_digest(table: MethodTable) -> MethodTable {
    table
        .native("Update", digest_update)
        .native("Final", digest_final)
        .native("Restart", digest_restart)
        .native("CalculateDigest", digest_calculate)
        .native("AlgorithmName", digest_algorithm_name)
        .native("DigestSize", digest_size)
        .native("OptimalBlockSize", digest_block_size)
}

fn digest_table() -> MethodTable {
    with_digest(lifecycle())
}

fn hmac_table() -> MethodTable {
    with_digest(lifecycle())
        .native("SetKey", hmac_set_key)
        .native("MinKeyLength", hmac_min_key_length)
        .native("MaxKeyLength", hmac_max_key_length)
        .native("DefaultKeyLength", hmac_default_key_length)
        .native("GetValidKeyLength", hmac_valid_key_length)
        .native("VerifyHMAC", hmac_verify)
}

fn crypter(object: &mut NativeObject) -> Result<&mut dyn Crypter, DispatchError> {
    let tag = object.tag();
    object.crypter_mut().ok_or(DispatchError::InvalidObject { type_name: tag.name() })
}

fn digester(object: &mut NativeObject) -> Result<&mut dyn Digester, DispatchError> {
    let tag = object.tag();
    object.digester_mut().ok_or(DispatchError::InvalidObject { type_name: tag.name() })
}

fn keyed(object: &mut NativeObject) -> Result<&mut dyn Keyed, DispatchError> {
    let tag = object.tag();
    object.keyed_mut().ok_or(DispatchError::InvalidObject { type_name: tag.name() })
}

fn install(args: &Args<'_>, position: usize) -> Result<KeyInstall, DispatchError> {
    Ok(if args.opt_bool(position, true)? { KeyInstall::Install } else { KeyInstall::Detached })
}

/// Turn a crypter result into host values. Failures become
/// `(nil, last error)`.
fn crypter_reply<T: Into<Value>>(
    crypter: &dyn Crypter,
    result: Result<T, CryptoError>,
) -> Vec<Value> {
    match result {
        Ok(value) => vec![value.into()],
        Err(_) => vec![Value::Nil, Value::from(crypter.last_error())],
    }
}

fn crypter_algorithm_name(
    object: &mut NativeObject,
    _args: &Args<'_>,
) -> Result<Vec<Value>, DispatchError> {
    Ok(vec![Value::from(crypter(object)?.algorithm_name())])
}

fn crypter_max_plaintext_length(
    object: &mut NativeObject,
    args: &Args<'_>,
) -> Result<Vec<Value>, DispatchError> {
    let len = args.check_size(2)?;
    Ok(vec![Value::from(crypter(object)?.max_plaintext_length(len))])
}

fn crypter_ciphertext_length(
    object: &mut NativeObject,
    args: &Args<'_>,
) -> Result<Vec<Value>, DispatchError> {
    let len = args.check_size(2)?;
    Ok(vec![Value::from(crypter(object)?.ciphertext_length(len))])
}

fn crypter_fixed_max_plaintext_length(
    object: &mut NativeObject,
    _args: &Args<'_>,
) -> Result<Vec<Value>, DispatchError> {
    Ok(vec![Value::from(crypter(object)?.fixed_max_plaintext_length())])
}

fn crypter_fixed_ciphertext_length(
    object: &mut NativeObject,
    _args: &Args<'_>,
) -> Result<Vec<Value>, DispatchError> {
    Ok(vec![Value::from(crypter(object)?.fixed_ciphertext_length())])
}

fn crypter_valid_primary_key_length(
    object: &mut NativeObject,
    args: &Args<'_>,
) -> Result<Vec<Value>, DispatchError> {
    let bits = args.check_size(2)?;
    Ok(vec![Value::from(crypter(object)?.valid_primary_key_length(bits))])
}

fn crypter_valid_secondary_key_length(
    object: &mut NativeObject,
    args: &Args<'_>,
) -> Result<Vec<Value>, DispatchError> {
    let bits = args.check_size(2)?;
    Ok(vec![Value::from(crypter(object)?.valid_secondary_key_length(bits))])
}

fn crypter_generate_primary_key(
    object: &mut NativeObject,
    args: &Args<'_>,
) -> Result<Vec<Value>, DispatchError> {
    let bits = args.check_size(2)?;
    let install = install(args, 3)?;
    let crypter = crypter(object)?;
    let result = crypter.generate_primary_key(bits, install);
    Ok(crypter_reply(crypter, result))
}

fn crypter_set_primary_key(
    object: &mut NativeObject,
    args: &Args<'_>,
) -> Result<Vec<Value>, DispatchError> {
    let key = args.check_bytes(2)?;
    let crypter = crypter(object)?;
    let result = crypter.set_primary_key(key).map(|()| true);
    Ok(crypter_reply(crypter, result))
}

/// `GenerateSecondaryKey(bits [, install])` draws a fresh secondary key,
/// `GenerateSecondaryKey(primary [, install])` derives one. Each family
/// supports exactly one of the two shapes.
fn crypter_generate_secondary_key(
    object: &mut NativeObject,
    args: &Args<'_>,
) -> Result<Vec<Value>, DispatchError> {
    let install = install(args, 3)?;
    let crypter = crypter(object)?;
    let result = match args.get(2) {
        Value::Number(_) => crypter.generate_secondary_key(args.check_size(2)?, install),
        Value::Bytes(primary) => crypter.derive_secondary_key(primary, install),
        _ => return Err(args.mismatch(2, "number or string")),
    };
    Ok(crypter_reply(crypter, result))
}

fn crypter_set_secondary_key(
    object: &mut NativeObject,
    args: &Args<'_>,
) -> Result<Vec<Value>, DispatchError> {
    let key = args.check_bytes(2)?;
    let crypter = crypter(object)?;
    let result = crypter.set_secondary_key(key).map(|()| true);
    Ok(crypter_reply(crypter, result))
}

fn crypter_encrypt(
    object: &mut NativeObject,
    args: &Args<'_>,
) -> Result<Vec<Value>, DispatchError> {
    let plaintext = args.check_bytes(2)?;
    let crypter = crypter(object)?;
    let result = crypter.encrypt(plaintext);
    Ok(crypter_reply(crypter, result))
}

fn crypter_decrypt(
    object: &mut NativeObject,
    args: &Args<'_>,
) -> Result<Vec<Value>, DispatchError> {
    let ciphertext = args.check_bytes(2)?;
    let crypter = crypter(object)?;
    let result = crypter.decrypt(ciphertext);
    Ok(crypter_reply(crypter, result))
}

fn crypter_last_error(
    object: &mut NativeObject,
    _args: &Args<'_>,
) -> Result<Vec<Value>, DispatchError> {
    Ok(vec![Value::from(crypter(object)?.last_error())])
}

fn digest_update(object: &mut NativeObject, args: &Args<'_>) -> Result<Vec<Value>, DispatchError> {
    let data = args.check_bytes(2)?;
    digester(object)?.update(data);
    Ok(vec![Value::Bool(true)])
}

fn digest_final(object: &mut NativeObject, _args: &Args<'_>) -> Result<Vec<Value>, DispatchError> {
    Ok(vec![Value::Bytes(digester(object)?.finalize())])
}

fn digest_restart(
    object: &mut NativeObject,
    _args: &Args<'_>,
) -> Result<Vec<Value>, DispatchError> {
    digester(object)?.restart();
    Ok(vec![Value::Bool(true)])
}

fn digest_calculate(
    object: &mut NativeObject,
    args: &Args<'_>,
) -> Result<Vec<Value>, DispatchError> {
    let data = args.check_bytes(2)?;
    Ok(vec![Value::Bytes(digester(object)?.calculate_digest(data))])
}

fn digest_algorithm_name(
    object: &mut NativeObject,
    _args: &Args<'_>,
) -> Result<Vec<Value>, DispatchError> {
    Ok(vec![Value::from(digester(object)?.algorithm_name())])
}

fn digest_size(object: &mut NativeObject, _args: &Args<'_>) -> Result<Vec<Value>, DispatchError> {
    Ok(vec![Value::from(digester(object)?.digest_size())])
}

fn digest_block_size(
    object: &mut NativeObject,
    _args: &Args<'_>,
) -> Result<Vec<Value>, DispatchError> {
    Ok(vec![Value::from(digester(object)?.block_size())])
}

fn hmac_set_key(object: &mut NativeObject, args: &Args<'_>) -> Result<Vec<Value>, DispatchError> {
    let key = args.check_bytes(2)?;
    keyed(object)?.set_key(key)?;
    Ok(vec![Value::Bool(true)])
}

fn hmac_min_key_length(
    object: &mut NativeObject,
    _args: &Args<'_>,
) -> Result<Vec<Value>, DispatchError> {
    Ok(vec![Value::from(keyed(object)?.min_key_length())])
}

fn hmac_max_key_length(
    object: &mut NativeObject,
    _args: &Args<'_>,
) -> Result<Vec<Value>, DispatchError> {
    Ok(vec![Value::from(keyed(object)?.max_key_length())])
}

fn hmac_default_key_length(
    object: &mut NativeObject,
    _args: &Args<'_>,
) -> Result<Vec<Value>, DispatchError> {
    Ok(vec![Value::from(keyed(object)?.default_key_length())])
}

fn hmac_valid_key_length(
    object: &mut NativeObject,
    args: &Args<'_>,
) -> Result<Vec<Value>, DispatchError> {
    let len = args.check_size(2)?;
    Ok(vec![Value::from(keyed(object)?.valid_key_length(len))])
}

fn hmac_verify(object: &mut NativeObject, args: &Args<'_>) -> Result<Vec<Value>, DispatchError> {
    let data = args.check_bytes(2)?;
    let mac = args.check_bytes(3)?;
    let matched = keyed(object)?.verify(data, mac)?;
    Ok(vec![Value::Bool(matched)])
}
