//! Module façade: namespace registration, factories and dispatch.
//!
//! The host hands the module an implementation of [`HostGlobals`] at
//! initialization instead of the module resolving host entry points on its
//! own. Everything the host sees afterwards goes through [`Module::call`]
//! (functions), [`Module::index`] / [`Module::new_index`] (attribute access)
//! and [`Module::collect`] (finalization).
//!
//! Attribute resolution on a handle is two-tier: the type's fixed method
//! table first, then the handle's per-instance attributes. Writes always go
//! to the per-instance attributes, so user data can sit next to the methods
//! but never shadow them.

use base64::Engine as _;
use cryptbridge_crypto::{
    Crypter, CryptoError, CrypterFamily, Digester, HashAlgorithm, Hasher, Hmac, Keyed,
    random_bytes,
};
use tracing::{debug, warn};

use crate::{
    arena::ObjectArena,
    error::DispatchError,
    handle::{Handle, TypeTag},
    methods::{Method, MethodTables},
    object::NativeObject,
    value::{Args, Function, ModuleFunction, Table, Value},
};

/// Module version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Module version as `MAJOR * 10000 + MINOR * 100 + PATCH`.
pub const VERSION_NUM: u32 = version_num(VERSION);

const fn version_num(version: &str) -> u32 {
    let bytes = version.as_bytes();
    let mut parts = [0u32; 3];
    let mut part = 0;
    let mut i = 0;
    while i < bytes.len() && part < parts.len() {
        let byte = bytes[i];
        if byte == b'.' {
            part += 1;
        } else if byte.is_ascii_digit() {
            parts[part] = parts[part] * 10 + (byte - b'0') as u32;
        } else {
            break;
        }
        i += 1;
    }
    parts[0] * 10_000 + parts[1] * 100 + parts[2]
}

/// Module configuration.
#[derive(Debug, Clone)]
pub struct ModuleConfig {
    /// Global name of the namespace table
    pub namespace: String,
    /// Log a warning when an insecure hash algorithm is instantiated
    pub warn_insecure_algorithms: bool,
    /// Length of the random key every new HMAC object starts with, in bytes
    pub hmac_default_key_len: usize,
    /// Largest `GenerateRandomBytes` request, in bytes
    pub max_random_bytes: usize,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            namespace: "crypt".to_string(),
            warn_insecure_algorithms: true,
            hmac_default_key_len: cryptbridge_crypto::DEFAULT_HMAC_KEY_LENGTH,
            max_random_bytes: 1 << 20,
        }
    }
}

/// The host's global namespace, as far as this module needs it.
pub trait HostGlobals {
    /// Install `value` under the global `name`, replacing any previous value.
    fn set_global(&mut self, name: &str, value: Value);

    /// Remove the global `name`, if present.
    fn remove_global(&mut self, name: &str);
}

/// In-memory [`HostGlobals`], for embedding without a real host and for
/// tests.
#[derive(Debug, Default)]
pub struct GlobalTable {
    values: Table,
}

impl GlobalTable {
    /// Create an empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Global `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Follow a dotted path through nested tables (`"crypt.digest.SHA1"`).
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.values.get(segments.next()?)?;
        for segment in segments {
            let Value::Table(table) = current else {
                return None;
            };
            current = table.get(segment)?;
        }
        Some(current)
    }
}

impl HostGlobals for GlobalTable {
    fn set_global(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    fn remove_global(&mut self, name: &str) {
        self.values.remove(name);
    }
}

/// The crypto module as seen by one host.
#[derive(Debug)]
pub struct Module {
    config: ModuleConfig,
    tables: Option<MethodTables>,
    arena: ObjectArena,
}

impl Default for Module {
    fn default() -> Self {
        Self::new(ModuleConfig::default())
    }
}

impl Module {
    /// Create an uninitialized module.
    pub fn new(config: ModuleConfig) -> Self {
        Self { config, tables: None, arena: ObjectArena::new() }
    }

    /// Module configuration.
    pub fn config(&self) -> &ModuleConfig {
        &self.config
    }

    /// Whether [`initialize`](Self::initialize) has run without a matching
    /// [`deinitialize`](Self::deinitialize).
    pub fn is_initialized(&self) -> bool {
        self.tables.is_some()
    }

    /// Build the method tables and install the namespace table. Idempotent.
    pub fn initialize(&mut self, globals: &mut dyn HostGlobals) {
        if self.tables.is_none() {
            self.tables = Some(MethodTables::build());
        }
        globals.set_global(&self.config.namespace, Value::Table(self.namespace_table()));
        debug!(namespace = %self.config.namespace, version = VERSION, "module initialized");
    }

    /// Remove the namespace table and collect every outstanding object.
    /// Idempotent.
    pub fn deinitialize(&mut self, globals: &mut dyn HostGlobals) {
        globals.remove_global(&self.config.namespace);
        let collected = self.arena.clear();
        self.tables = None;
        debug!(namespace = %self.config.namespace, collected, "module deinitialized");
    }

    /// Contents of the namespace table.
    pub fn namespace_table(&self) -> Table {
        let function = |f: ModuleFunction| Value::Function(Function::Module(f));

        let digests: Table = HashAlgorithm::ALL
            .into_iter()
            .map(|alg| (alg.id().to_string(), function(ModuleFunction::Digest(alg))))
            .collect();
        let hmacs: Table = HashAlgorithm::ALL
            .into_iter()
            .filter(|alg| alg.supports_hmac())
            .map(|alg| (alg.id().to_string(), function(ModuleFunction::Hmac(alg))))
            .collect();

        let mut table = Table::new();
        table.insert("Version".to_string(), Value::from(VERSION));
        table.insert("VersionNum".to_string(), Value::Number(f64::from(VERSION_NUM)));
        for (name, f) in [
            ("AES", ModuleFunction::NewSymmetricCrypter),
            ("RSA", ModuleFunction::NewRsaCrypter),
            ("ECP", ModuleFunction::NewEcCrypter),
            ("NewSymmetricCrypter", ModuleFunction::NewSymmetricCrypter),
            ("NewRSACrypter", ModuleFunction::NewRsaCrypter),
            ("NewECCrypter", ModuleFunction::NewEcCrypter),
            ("NewDigest", ModuleFunction::NewDigest),
            ("NewHMAC", ModuleFunction::NewHmac),
            ("GenerateRandomBytes", ModuleFunction::GenerateRandomBytes),
            ("Base64Encode", ModuleFunction::Base64Encode),
            ("Base64Decode", ModuleFunction::Base64Decode),
        ] {
            table.insert(name.to_string(), function(f));
        }
        table.insert("digest".to_string(), Value::Table(digests));
        table.insert("hmac".to_string(), Value::Table(hmacs));
        table
    }

    fn tables(&self) -> Result<&MethodTables, DispatchError> {
        self.tables.as_ref().ok_or(DispatchError::NotInitialized)
    }

    fn ensure_initialized(&self) -> Result<(), DispatchError> {
        self.tables().map(|_| ())
    }

    fn adopt(&mut self, object: NativeObject) -> Result<Handle, DispatchError> {
        self.ensure_initialized()?;
        self.arena.insert(object)
    }

    fn check_algorithm(&self, algorithm: HashAlgorithm) {
        if self.config.warn_insecure_algorithms && !algorithm.is_secure() {
            warn!(algorithm = algorithm.name(), "insecure hash algorithm in use");
        }
    }

    /// New crypter of `family` with no keys installed.
    pub fn new_crypter(&mut self, family: CrypterFamily) -> Result<Handle, DispatchError> {
        self.adopt(NativeObject::Crypter(family.instantiate()))
    }

    /// New AES crypter.
    pub fn new_symmetric_crypter(&mut self) -> Result<Handle, DispatchError> {
        self.new_crypter(CrypterFamily::Symmetric)
    }

    /// New RSA crypter.
    pub fn new_rsa_crypter(&mut self) -> Result<Handle, DispatchError> {
        self.new_crypter(CrypterFamily::Rsa)
    }

    /// New elliptic-curve crypter.
    pub fn new_ec_crypter(&mut self) -> Result<Handle, DispatchError> {
        self.new_crypter(CrypterFamily::EllipticCurve)
    }

    /// New digest object.
    pub fn new_digest(&mut self, algorithm: HashAlgorithm) -> Result<Handle, DispatchError> {
        self.ensure_initialized()?;
        self.check_algorithm(algorithm);
        self.adopt(NativeObject::Digest(Hasher::new(algorithm)))
    }

    /// New HMAC object keyed with a fresh random key.
    pub fn new_hmac(&mut self, algorithm: HashAlgorithm) -> Result<Handle, DispatchError> {
        self.ensure_initialized()?;
        self.check_algorithm(algorithm);
        let hmac = Hmac::with_random_key(algorithm, self.config.hmac_default_key_len).map_err(
            |err| match err {
                CryptoError::UnsupportedOperation(_) => DispatchError::Operation(err),
                other => {
                    debug!(algorithm = algorithm.name(), error = %other, "HMAC creation failed");
                    DispatchError::CreationFailed { reason: other.to_string() }
                },
            },
        )?;
        self.adopt(NativeObject::Hmac(hmac))
    }

    /// `len` bytes from the OS generator.
    pub fn generate_random_bytes(&self, len: usize) -> Result<Vec<u8>, DispatchError> {
        if len > self.config.max_random_bytes {
            return Err(DispatchError::LimitExceeded {
                requested: len,
                limit: self.config.max_random_bytes,
            });
        }
        Ok(random_bytes(len)?)
    }

    /// Crypter behind `handle`.
    pub fn crypter_mut(&mut self, handle: Handle) -> Result<&mut dyn Crypter, DispatchError> {
        self.arena
            .object_mut(handle)?
            .crypter_mut()
            .ok_or(DispatchError::InvalidObject { type_name: handle.tag().name() })
    }

    /// Digest capability behind `handle` (digest or HMAC).
    pub fn digester_mut(&mut self, handle: Handle) -> Result<&mut dyn Digester, DispatchError> {
        self.arena
            .object_mut(handle)?
            .digester_mut()
            .ok_or(DispatchError::InvalidObject { type_name: handle.tag().name() })
    }

    /// Keying capability behind `handle`.
    pub fn hmac_mut(&mut self, handle: Handle) -> Result<&mut dyn Keyed, DispatchError> {
        self.arena
            .object_mut(handle)?
            .keyed_mut()
            .ok_or(DispatchError::InvalidObject { type_name: handle.tag().name() })
    }

    /// Call `function` with `args`.
    ///
    /// Operation failures come back as `Ok([nil, message])`. Only misuse of
    /// the binding (bad arguments, invalid objects) is an `Err`, for the host
    /// to raise.
    pub fn call(
        &mut self,
        function: Function,
        args: &[Value],
    ) -> Result<Vec<Value>, DispatchError> {
        let result = match function {
            Function::Module(f) => self.call_module(f, &Args::new(args)),
            Function::Method { tag, name } => self.call_method(tag, name, args),
        };
        match result {
            Err(err) if err.is_soft() => Ok(vec![Value::Nil, Value::from(err.to_string())]),
            other => other,
        }
    }

    /// Resolve `name` on `handle` and call it with `handle` as receiver.
    pub fn invoke(
        &mut self,
        handle: Handle,
        name: &str,
        args: &[Value],
    ) -> Result<Vec<Value>, DispatchError> {
        let function = match self.index(handle, name)? {
            Value::Function(function) => function,
            other => {
                return Err(DispatchError::NotCallable {
                    name: name.to_string(),
                    actual: other.type_name(),
                });
            },
        };

        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(Value::Object(handle));
        full.extend_from_slice(args);
        self.call(function, &full)
    }

    fn call_module(
        &mut self,
        f: ModuleFunction,
        args: &Args<'_>,
    ) -> Result<Vec<Value>, DispatchError> {
        let handle = match f {
            ModuleFunction::NewSymmetricCrypter => self.new_symmetric_crypter()?,
            ModuleFunction::NewRsaCrypter => self.new_rsa_crypter()?,
            ModuleFunction::NewEcCrypter => self.new_ec_crypter()?,
            ModuleFunction::Digest(alg) => self.new_digest(alg)?,
            ModuleFunction::Hmac(alg) => self.new_hmac(alg)?,
            ModuleFunction::NewDigest => {
                let alg = algorithm_arg(args)?;
                self.new_digest(alg)?
            },
            ModuleFunction::NewHmac => {
                let alg = algorithm_arg(args)?;
                self.new_hmac(alg)?
            },
            ModuleFunction::GenerateRandomBytes => {
                let len = args.check_size(1)?;
                return Ok(vec![Value::Bytes(self.generate_random_bytes(len)?)]);
            },
            ModuleFunction::Base64Encode => {
                let data = args.check_bytes(1)?;
                let encoded = base64::engine::general_purpose::STANDARD.encode(data);
                return Ok(vec![Value::from(encoded)]);
            },
            ModuleFunction::Base64Decode => {
                let text = args.check_bytes(1)?;
                let decoded = base64::engine::general_purpose::STANDARD.decode(text).map_err(
                    |err| DispatchError::InvalidEncoding {
                        encoding: "base64",
                        reason: err.to_string(),
                    },
                )?;
                return Ok(vec![Value::Bytes(decoded)]);
            },
        };
        Ok(vec![Value::Object(handle)])
    }

    fn call_method(
        &mut self,
        tag: TypeTag,
        name: &'static str,
        args: &[Value],
    ) -> Result<Vec<Value>, DispatchError> {
        let Some((_, method)) = self.tables()?.for_tag(tag).get(name) else {
            return Err(DispatchError::NotCallable { name: name.to_string(), actual: "nil" });
        };
        let args = Args::new(args);
        let handle = args.check_object(1, tag)?;

        match method {
            Method::Destroy => {
                self.arena.destroy(handle);
                Ok(Vec::new())
            },
            Method::IsValid => Ok(vec![Value::Bool(self.arena.is_valid(handle))]),
            Method::Native(native) => native(self.arena.object_mut(handle)?, &args),
        }
    }

    /// Read attribute `key` of `handle`: fixed method first, then the
    /// per-instance attribute, else `nil`.
    pub fn index(&self, handle: Handle, key: &str) -> Result<Value, DispatchError> {
        let tables = self.tables()?;
        if !self.arena.is_attached(handle) {
            return Err(DispatchError::InvalidObject { type_name: handle.tag().name() });
        }
        if let Some((name, _)) = tables.for_tag(handle.tag()).get(key) {
            return Ok(Value::Function(Function::Method { tag: handle.tag(), name }));
        }
        self.arena.extra(handle, key)
    }

    /// Write per-instance attribute `key` of `handle`. Fixed methods are
    /// never replaced; a same-named attribute is stored but stays hidden.
    pub fn new_index(
        &mut self,
        handle: Handle,
        key: &str,
        value: Value,
    ) -> Result<(), DispatchError> {
        self.ensure_initialized()?;
        self.arena.set_extra(handle, key, value)
    }

    /// Identity comparison.
    pub fn equals(&self, a: Handle, b: Handle) -> bool {
        a == b
    }

    /// Display form of `handle`: `"<type>: 0x<address>"`.
    pub fn to_string(&self, handle: Handle) -> String {
        format!("{}: 0x{:016x}", handle.tag().name(), handle.address())
    }

    /// Whether `handle` names a live object.
    pub fn is_valid(&self, handle: Handle) -> bool {
        self.arena.is_valid(handle)
    }

    /// Release the native object behind `handle`. Idempotent.
    pub fn destroy(&mut self, handle: Handle) -> bool {
        self.arena.destroy(handle)
    }

    /// Finalizer: release the object and recycle its slot. Idempotent.
    pub fn collect(&mut self, handle: Handle) -> bool {
        self.arena.collect(handle)
    }

    /// Number of objects not yet destroyed.
    pub fn live_objects(&self) -> usize {
        self.arena.live_objects()
    }
}

fn algorithm_arg(args: &Args<'_>) -> Result<HashAlgorithm, DispatchError> {
    let id = String::from_utf8_lossy(args.check_bytes(1)?);
    HashAlgorithm::from_id(&id)
        .ok_or_else(|| DispatchError::UnknownAlgorithm { id: id.into_owned() })
}
