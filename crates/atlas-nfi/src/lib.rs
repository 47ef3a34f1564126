//! Atlas native interop bridge
//!
//! Lets a managed runtime call native code and be called back by it:
//! - Type lowering from value kinds to native ABI primitives (`types`)
//! - Compiled, cached call signatures (`signature`)
//! - Dynamic library loading and symbol lookup (`loader`)
//! - Managed→native calls (`caller`) and native→managed closures (`callbacks`)
//! - Raw buffers outside the managed heap (`memory`)
//!
//! `NfiNativeAccess` ties these together into one context object.
//!
//! # Safety
//!
//! Native calls and closures are only as sound as the signatures they are
//! declared with. Binding a symbol is `unsafe`; once bound, calls are checked
//! for arity and value kinds before any native code runs.

pub mod access;
pub mod adapter;
pub mod callbacks;
pub mod caller;
pub mod error;
pub mod loader;
pub mod marshal;
pub mod memory;
pub mod signature;
pub mod types;
pub mod value;

pub use access::{NativeAccess, NativeAccessProvider, NfiNativeAccess, NfiProvider};
pub use adapter::{CallAdapter, Executable};
pub use callbacks::{NativeClosure, NativeToManaged, NoopRegistrar, ThreadRegistrar};
pub use caller::ManagedToNative;
pub use error::{BridgeError, MarshalError};
pub use loader::{LibraryHandle, LibraryLoader, SymbolHandle};
pub use memory::{Buffer, RawMemory};
pub use signature::{CompiledSignature, SignatureCache};
pub use types::{lower, NativePrimitive, Signature, ValueKind};
pub use value::{ObjectHandle, RawPointer, Value};
