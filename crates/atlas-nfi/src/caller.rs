//! Managed→native calls
//!
//! A `ManagedToNative` adapter pairs a resolved entry point with a compiled
//! signature. Binding is the unsafe step; once bound, every call is checked for
//! arity and marshalled according to the declared kinds.

use crate::adapter::{check_arity, Executable};
use crate::error::{escalate, BridgeError};
use crate::loader::SymbolHandle;
use crate::marshal::{call_native, to_managed, to_native};
use crate::signature::CompiledSignature;
use crate::types::Signature;
use crate::value::Value;
use std::sync::Arc;

/// A native entry point bound to a signature
#[derive(Clone)]
pub struct ManagedToNative {
    symbol: SymbolHandle,
    compiled: Arc<CompiledSignature>,
}

impl ManagedToNative {
    /// Bind `symbol` with `compiled`
    ///
    /// Returns `None` for a null symbol.
    ///
    /// # Safety
    ///
    /// The entry point must really have the signature described by `compiled`,
    /// and must stay loaded for as long as the adapter (or any clone) is used.
    pub unsafe fn bind(symbol: SymbolHandle, compiled: Arc<CompiledSignature>) -> Option<Self> {
        if symbol.is_null() {
            return None;
        }
        Some(Self { symbol, compiled })
    }

    pub fn symbol(&self) -> SymbolHandle {
        self.symbol
    }

    pub fn signature(&self) -> &Signature {
        self.compiled.signature()
    }

    pub fn compiled(&self) -> &Arc<CompiledSignature> {
        &self.compiled
    }

    /// Call the entry point with managed-form arguments
    ///
    /// Fails with `ArityMismatch` before touching native code when the argument
    /// count is wrong. A value that does not fit its declared primitive is a
    /// fatal `Marshal` error.
    pub fn execute(&self, args: &[Value]) -> Result<Value, BridgeError> {
        let signature = self.compiled.signature();
        check_arity(signature, args.len())?;

        let native: Vec<Value> = args
            .iter()
            .zip(signature.parameters())
            .map(|(value, kind)| to_native(*kind, *value))
            .collect();

        // Contract established by `bind`
        let raw = unsafe { call_native(&self.compiled, self.symbol.address().as_ptr(), &native) }
            .map_err(|source| {
                escalate(BridgeError::Marshal {
                    descriptor: self.compiled.descriptor().to_string(),
                    source,
                })
            })?;

        Ok(to_managed(signature.return_kind(), raw))
    }
}

impl Executable for ManagedToNative {
    fn execute(&self, args: &[Value]) -> Result<Value, BridgeError> {
        ManagedToNative::execute(self, args)
    }
}

impl std::fmt::Debug for ManagedToNative {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedToNative")
            .field("symbol", &self.symbol.address())
            .field("descriptor", &self.compiled.descriptor())
            .finish()
    }
}
