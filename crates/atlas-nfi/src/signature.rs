//! Compiled signatures and the signature cache
//!
//! A `Signature` is lowered to its structural descriptor and compiled into a
//! libffi call interface (`Cif`). With caching enabled, structurally equal
//! signatures share one `CompiledSignature`; the map is sharded so first-time
//! compiles of unrelated signatures never wait on each other.

use crate::error::BridgeError;
use crate::types::{NativePrimitive, Signature, ValueKind};
use dashmap::DashMap;
use libffi::middle::{Cif, Type};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// libffi type for a native primitive
pub(crate) fn ffi_type(primitive: NativePrimitive) -> Type {
    match primitive {
        NativePrimitive::Void => Type::void(),
        NativePrimitive::Sint8 => Type::i8(),
        NativePrimitive::Sint16 => Type::i16(),
        NativePrimitive::Sint32 => Type::i32(),
        NativePrimitive::Sint64 => Type::i64(),
        NativePrimitive::Float => Type::f32(),
        NativePrimitive::Double => Type::f64(),
        NativePrimitive::Pointer => Type::pointer(),
    }
}

/// A signature compiled for the native calling convention
///
/// Immutable once built; shared read-only by every adapter that uses it.
pub struct CompiledSignature {
    cif: Cif,
    signature: Signature,
    descriptor: String,
}

// Safety: the Cif is fully prepared at construction and only read afterwards
unsafe impl Send for CompiledSignature {}
unsafe impl Sync for CompiledSignature {}

impl CompiledSignature {
    /// Source signature
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Structural descriptor this signature was compiled from
    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub(crate) fn cif(&self) -> &Cif {
        &self.cif
    }
}

impl std::fmt::Debug for CompiledSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledSignature")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// Cache of compiled signatures keyed by structural equality
pub struct SignatureCache {
    /// `None` when caching is disabled
    cache: Option<DashMap<Signature, Arc<CompiledSignature>>>,
    /// Debug counter: NFI signatures created
    created: AtomicU64,
}

impl SignatureCache {
    /// Create a cache; `enabled == false` compiles every request independently
    pub fn new(enabled: bool) -> Self {
        Self {
            cache: enabled.then(DashMap::new),
            created: AtomicU64::new(0),
        }
    }

    /// Whether equal signatures share a compiled representation
    pub fn is_caching(&self) -> bool {
        self.cache.is_some()
    }

    /// Number of compiles performed so far
    pub fn signatures_created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Number of distinct signatures currently cached
    pub fn cached_count(&self) -> usize {
        self.cache.as_ref().map_or(0, DashMap::len)
    }

    /// Compile a signature, reusing the cached result when caching is enabled
    ///
    /// Rejects signatures with a void parameter; void is only valid as a
    /// return kind.
    pub fn compile(&self, signature: &Signature) -> Result<Arc<CompiledSignature>, BridgeError> {
        validate(signature)?;

        let Some(cache) = &self.cache else {
            return Ok(self.create(signature));
        };

        if let Some(hit) = cache.get(signature) {
            return Ok(Arc::clone(hit.value()));
        }

        // The entry holds its shard locked until the value is published, so
        // racing first compiles of the same key converge on a single result.
        let entry = cache
            .entry(signature.clone())
            .or_insert_with(|| self.create(signature));
        Ok(Arc::clone(entry.value()))
    }

    fn create(&self, signature: &Signature) -> Arc<CompiledSignature> {
        self.created.fetch_add(1, Ordering::Relaxed);
        let descriptor = signature.descriptor();
        debug!(%descriptor, "compiling native signature");

        let cif = Cif::new(
            signature.parameters().iter().map(|k| ffi_type(k.lower())),
            ffi_type(signature.return_kind().lower()),
        );

        Arc::new(CompiledSignature {
            cif,
            signature: signature.clone(),
            descriptor,
        })
    }
}

fn validate(signature: &Signature) -> Result<(), BridgeError> {
    match signature
        .parameters()
        .iter()
        .position(|k| *k == ValueKind::Void)
    {
        Some(index) => Err(BridgeError::VoidParameter {
            index,
            descriptor: signature.descriptor(),
        }),
        None => Ok(()),
    }
}
