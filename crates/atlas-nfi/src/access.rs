//! Native access surface
//!
//! `NativeAccess` is everything a managed runtime needs from the bridge.
//! `NfiNativeAccess` is the libffi/libloading backend: it owns the signature
//! cache, the library loader and the thread tracker for one bridge instance,
//! built once from configuration and dropped with the subsystem.
//!
//! # Example
//!
//! ```no_run
//! use atlas_config::NfiConfig;
//! use atlas_nfi::{Executable, NativeAccess, NfiNativeAccess, Signature, Value, ValueKind};
//!
//! let access = NfiNativeAccess::new(&NfiConfig::default());
//! let libc = access.load_default_library()?;
//! let abs = access.lookup_symbol(libc, "abs").expect("abs is in libc");
//!
//! let sig = Signature::new(vec![ValueKind::Int], ValueKind::Int);
//! let call = unsafe { access.bind_symbol(abs, &sig)? }.expect("non-null symbol");
//! assert_eq!(call.execute(&[Value::Int(-7)])?, Value::Int(7));
//! # Ok::<(), atlas_nfi::BridgeError>(())
//! ```

use crate::adapter::{CallAdapter, Executable};
use crate::callbacks::{create_closure, NativeClosure, NoopRegistrar, ThreadRegistrar, ThreadTracker};
use crate::caller::ManagedToNative;
use crate::error::BridgeError;
use crate::loader::{LibraryHandle, LibraryLoader, SymbolHandle};
use crate::memory::{Buffer, RawMemory};
use crate::signature::SignatureCache;
use crate::types::Signature;
use atlas_config::NfiConfig;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Operations a native backend provides to the managed runtime
pub trait NativeAccess: Send + Sync {
    /// Load a library; `Ok(None)` on ordinary failure
    fn load_library(&self, path: &Path) -> Result<Option<LibraryHandle>, BridgeError>;

    /// Handle to the process's global symbol namespace
    fn load_default_library(&self) -> Result<LibraryHandle, BridgeError>;

    /// Release a library, where the backend supports it
    fn unload_library(&self, library: LibraryHandle);

    /// Resolve `name`; `None` when missing or null
    fn lookup_symbol(&self, library: LibraryHandle, name: &str) -> Option<SymbolHandle>;

    /// Bind a symbol as a managed→native call
    ///
    /// # Safety
    ///
    /// The symbol's real signature must match `signature`, and its library must
    /// stay loaded while the adapter is used.
    unsafe fn bind_symbol(
        &self,
        symbol: SymbolHandle,
        signature: &Signature,
    ) -> Result<Option<CallAdapter>, BridgeError>;

    /// Expose a managed callable as a native function pointer
    fn create_native_closure(
        &self,
        callable: Arc<dyn Executable>,
        signature: &Signature,
    ) -> Result<NativeClosure, BridgeError>;

    /// Prepare the current thread for calls into managed code
    fn prepare_thread(&self);

    fn allocate(&self, size: i64) -> Result<Option<Buffer>, BridgeError>;

    /// # Safety
    ///
    /// `buffer` must be live and come from this backend.
    unsafe fn reallocate(&self, buffer: Buffer, new_size: i64) -> Result<Option<Buffer>, BridgeError>;

    /// # Safety
    ///
    /// `buffer` must be live and come from this backend; it is dangling after.
    unsafe fn free(&self, buffer: Buffer);
}

/// libffi-backed native access
pub struct NfiNativeAccess {
    signatures: SignatureCache,
    loader: LibraryLoader,
    memory: RawMemory,
    threads: Arc<ThreadTracker>,
}

impl NfiNativeAccess {
    /// Create a bridge instance with no per-thread setup
    pub fn new(config: &NfiConfig) -> Self {
        Self::with_registrar(config, Arc::new(NoopRegistrar))
    }

    /// Create a bridge instance that attaches new native threads via `registrar`
    pub fn with_registrar(config: &NfiConfig, registrar: Arc<dyn ThreadRegistrar>) -> Self {
        let cache = config.cache_signatures();
        debug!(
            cache_signatures = cache,
            isolate = config.isolate_libraries(),
            lazy_binding = config.lazy_binding(),
            "initializing native access"
        );

        Self {
            signatures: SignatureCache::new(cache),
            loader: LibraryLoader::from_config(config),
            memory: RawMemory::new(),
            threads: Arc::new(ThreadTracker::new(registrar)),
        }
    }

    /// Debug counter: NFI signatures created
    pub fn signatures_created(&self) -> u64 {
        self.signatures.signatures_created()
    }

    pub fn signature_cache(&self) -> &SignatureCache {
        &self.signatures
    }

    pub fn loader(&self) -> &LibraryLoader {
        &self.loader
    }

    pub fn threads(&self) -> &Arc<ThreadTracker> {
        &self.threads
    }
}

impl Default for NfiNativeAccess {
    fn default() -> Self {
        Self::new(&NfiConfig::default())
    }
}

impl NativeAccess for NfiNativeAccess {
    fn load_library(&self, path: &Path) -> Result<Option<LibraryHandle>, BridgeError> {
        self.loader.load_library(path)
    }

    fn load_default_library(&self) -> Result<LibraryHandle, BridgeError> {
        self.loader.load_default_library()
    }

    fn unload_library(&self, library: LibraryHandle) {
        self.loader.unload_library(library)
    }

    fn lookup_symbol(&self, library: LibraryHandle, name: &str) -> Option<SymbolHandle> {
        self.loader.lookup_symbol(library, name)
    }

    unsafe fn bind_symbol(
        &self,
        symbol: SymbolHandle,
        signature: &Signature,
    ) -> Result<Option<CallAdapter>, BridgeError> {
        if symbol.is_null() {
            return Ok(None);
        }
        let compiled = self.signatures.compile(signature)?;
        Ok(ManagedToNative::bind(symbol, compiled).map(CallAdapter::from))
    }

    fn create_native_closure(
        &self,
        callable: Arc<dyn Executable>,
        signature: &Signature,
    ) -> Result<NativeClosure, BridgeError> {
        let compiled = self.signatures.compile(signature)?;
        Ok(create_closure(callable, compiled, Arc::clone(&self.threads)))
    }

    fn prepare_thread(&self) {
        self.threads.ensure_prepared();
    }

    fn allocate(&self, size: i64) -> Result<Option<Buffer>, BridgeError> {
        self.memory.allocate(size)
    }

    unsafe fn reallocate(&self, buffer: Buffer, new_size: i64) -> Result<Option<Buffer>, BridgeError> {
        self.memory.reallocate(buffer, new_size)
    }

    unsafe fn free(&self, buffer: Buffer) {
        self.memory.free(buffer)
    }
}

/// Factory for a named native backend
pub trait NativeAccessProvider: Send + Sync {
    /// Stable backend identifier
    fn id(&self) -> &'static str;

    fn create(
        &self,
        config: &NfiConfig,
        registrar: Arc<dyn ThreadRegistrar>,
    ) -> Box<dyn NativeAccess>;
}

/// Provider for `NfiNativeAccess`
#[derive(Debug, Default, Clone, Copy)]
pub struct NfiProvider;

impl NfiProvider {
    pub const ID: &'static str = "nfi-native";
}

impl NativeAccessProvider for NfiProvider {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn create(
        &self,
        config: &NfiConfig,
        registrar: Arc<dyn ThreadRegistrar>,
    ) -> Box<dyn NativeAccess> {
        Box::new(NfiNativeAccess::with_registrar(config, registrar))
    }
}
