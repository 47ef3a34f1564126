//! Executable call adapters
//!
//! Every callable the bridge hands out implements `Executable`. `CallAdapter`
//! is the closed set of bridge-built adapters: one per call direction.

use crate::callbacks::NativeToManaged;
use crate::caller::ManagedToNative;
use crate::error::BridgeError;
use crate::types::Signature;
use crate::value::Value;

/// Something that can be invoked with bridge values
pub trait Executable: Send + Sync {
    /// Whether `execute` may be called
    fn is_executable(&self) -> bool {
        true
    }

    /// Invoke with bridge values
    ///
    /// Managed callables and `ManagedToNative` take and return managed-form
    /// values. `NativeToManaged` takes and returns native-form values, as a
    /// native caller would see them.
    fn execute(&self, args: &[Value]) -> Result<Value, BridgeError>;
}

impl<F> Executable for F
where
    F: Fn(&[Value]) -> Result<Value, BridgeError> + Send + Sync,
{
    fn execute(&self, args: &[Value]) -> Result<Value, BridgeError> {
        self(args)
    }
}

/// A bound call in either direction
#[derive(Clone)]
pub enum CallAdapter {
    /// Managed code calling a native entry point; managed-form values in and out
    ManagedToNative(ManagedToNative),
    /// Native code calling back into a managed callable; native-form values in and out
    NativeToManaged(NativeToManaged),
}

impl CallAdapter {
    /// Signature both sides agreed on
    pub fn signature(&self) -> &Signature {
        match self {
            CallAdapter::ManagedToNative(a) => a.signature(),
            CallAdapter::NativeToManaged(a) => a.signature(),
        }
    }
}

impl Executable for CallAdapter {
    fn is_executable(&self) -> bool {
        match self {
            CallAdapter::ManagedToNative(a) => a.is_executable(),
            CallAdapter::NativeToManaged(a) => a.is_executable(),
        }
    }

    fn execute(&self, args: &[Value]) -> Result<Value, BridgeError> {
        match self {
            CallAdapter::ManagedToNative(a) => a.execute(args),
            CallAdapter::NativeToManaged(a) => a.execute(args),
        }
    }
}

impl From<ManagedToNative> for CallAdapter {
    fn from(adapter: ManagedToNative) -> Self {
        CallAdapter::ManagedToNative(adapter)
    }
}

impl From<NativeToManaged> for CallAdapter {
    fn from(adapter: NativeToManaged) -> Self {
        CallAdapter::NativeToManaged(adapter)
    }
}

impl std::fmt::Debug for CallAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let direction = match self {
            CallAdapter::ManagedToNative(_) => "ManagedToNative",
            CallAdapter::NativeToManaged(_) => "NativeToManaged",
        };
        f.debug_tuple(direction)
            .field(&self.signature().descriptor())
            .finish()
    }
}

/// Fail unless exactly `signature.parameter_count()` arguments were supplied
pub(crate) fn check_arity(signature: &Signature, got: usize) -> Result<(), BridgeError> {
    let expected = signature.parameter_count();
    if got != expected {
        return Err(BridgeError::ArityMismatch { expected, got });
    }
    Ok(())
}
