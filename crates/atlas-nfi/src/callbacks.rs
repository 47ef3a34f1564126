//! Native→managed callbacks
//!
//! Exposes a managed callable as a C function pointer. A libffi closure routes
//! every native invocation through a single trampoline which:
//! 1. Prepares the calling thread the first time it is seen
//! 2. Reads the native arguments and converts them to managed form
//! 3. Calls the managed callable
//! 4. Converts the result to native form and writes it to the return slot
//!
//! Neither errors nor panics may cross the C boundary. Both are logged and the
//! native caller receives the zero value of the declared return primitive.

use crate::adapter::{check_arity, Executable};
use crate::error::{escalate, BridgeError};
use crate::loader::SymbolHandle;
use crate::marshal::{read_native, to_managed, to_native, write_native, write_zero};
use crate::signature::CompiledSignature;
use crate::types::Signature;
use crate::value::{RawPointer, Value};
use libffi::low::ffi_cif;
use libffi::middle::Closure;
use libffi::raw::ffi_arg;
use std::ffi::c_void;
use std::mem::ManuallyDrop;
use std::panic::{self, AssertUnwindSafe};
use std::cell::RefCell;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use tracing::{error, trace};

/// Hook the managed runtime uses to attach a native-origin thread
pub trait ThreadRegistrar: Send + Sync {
    /// Prepare the current thread for managed execution
    ///
    /// Called at most once per thread by the bridge; must be idempotent anyway.
    fn prepare_thread(&self);
}

/// Registrar for runtimes that need no per-thread setup
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRegistrar;

impl ThreadRegistrar for NoopRegistrar {
    fn prepare_thread(&self) {}
}

static NEXT_TRACKER_ID: AtomicU64 = AtomicU64::new(0);

thread_local! {
    /// Trackers that have prepared the current thread
    static PREPARED: RefCell<Vec<PreparedMark>> = const { RefCell::new(Vec::new()) };
}

/// Per-thread record that one tracker prepared this thread
///
/// Dropped with the thread's locals, which releases the tracker's live count.
struct PreparedMark {
    tracker: u64,
    live: Weak<AtomicUsize>,
}

impl Drop for PreparedMark {
    fn drop(&mut self) {
        if let Some(live) = self.live.upgrade() {
            live.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

/// Tracks which threads have been prepared
///
/// The record lives in each thread's locals, so exited threads leave nothing
/// behind in the tracker.
pub struct ThreadTracker {
    id: u64,
    live: Arc<AtomicUsize>,
    registrar: Arc<dyn ThreadRegistrar>,
}

impl ThreadTracker {
    pub fn new(registrar: Arc<dyn ThreadRegistrar>) -> Self {
        Self {
            id: NEXT_TRACKER_ID.fetch_add(1, Ordering::Relaxed),
            live: Arc::new(AtomicUsize::new(0)),
            registrar,
        }
    }

    /// Run the registrar hook if the current thread has not been seen yet
    pub fn ensure_prepared(&self) {
        let first_visit = PREPARED
            .try_with(|marks| {
                let mut marks = marks.borrow_mut();
                // Forget trackers that no longer exist
                marks.retain(|m| m.live.strong_count() > 0);
                if marks.iter().any(|m| m.tracker == self.id) {
                    return false;
                }
                self.live.fetch_add(1, Ordering::AcqRel);
                marks.push(PreparedMark {
                    tracker: self.id,
                    live: Arc::downgrade(&self.live),
                });
                true
            })
            // Thread is tearing down its locals; the hook is idempotent
            .unwrap_or(true);

        if first_visit {
            trace!(tracker = self.id, "preparing thread for managed calls");
            self.registrar.prepare_thread();
        }
    }

    /// Number of live threads prepared by this tracker
    pub fn prepared_count(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

impl Default for ThreadTracker {
    fn default() -> Self {
        Self::new(Arc::new(NoopRegistrar))
    }
}

/// A managed callable invoked with native-form arguments
#[derive(Clone)]
pub struct NativeToManaged {
    delegate: Arc<dyn Executable>,
    compiled: Arc<CompiledSignature>,
}

impl NativeToManaged {
    pub fn new(delegate: Arc<dyn Executable>, compiled: Arc<CompiledSignature>) -> Self {
        Self { delegate, compiled }
    }

    pub fn signature(&self) -> &Signature {
        self.compiled.signature()
    }

    pub fn compiled(&self) -> &Arc<CompiledSignature> {
        &self.compiled
    }

    pub fn is_executable(&self) -> bool {
        self.delegate.is_executable()
    }

    /// Dispatch native-form arguments to the managed callable
    ///
    /// The result is returned in native form.
    pub fn execute(&self, args: &[Value]) -> Result<Value, BridgeError> {
        let signature = self.compiled.signature();
        check_arity(signature, args.len())?;

        let managed: Vec<Value> = args
            .iter()
            .zip(signature.parameters())
            .map(|(value, kind)| to_managed(*kind, *value))
            .collect();

        let result = self.delegate.execute(&managed)?;
        Ok(to_native(signature.return_kind(), result))
    }
}

impl Executable for NativeToManaged {
    fn is_executable(&self) -> bool {
        NativeToManaged::is_executable(self)
    }

    fn execute(&self, args: &[Value]) -> Result<Value, BridgeError> {
        NativeToManaged::execute(self, args)
    }
}

/// State a closure's trampoline reads on every call
struct ClosureState {
    adapter: NativeToManaged,
    threads: Arc<ThreadTracker>,
}

/// A C function pointer that calls back into managed code
///
/// The pointer is valid until this value is dropped.
pub struct NativeClosure {
    closure: ManuallyDrop<Closure<'static>>,
    state: NonNull<ClosureState>,
    code: RawPointer,
}

// Safety: the closure code and its state are immutable after construction
unsafe impl Send for NativeClosure {}
unsafe impl Sync for NativeClosure {}

impl NativeClosure {
    /// Native function pointer; cast to the matching `extern "C" fn` type
    pub fn code_ptr(&self) -> RawPointer {
        self.code
    }

    /// The function pointer as a symbol, ready to bind as a native call
    pub fn symbol(&self) -> SymbolHandle {
        SymbolHandle::from_raw(self.code.as_ptr())
    }

    pub fn adapter(&self) -> &NativeToManaged {
        &self.state().adapter
    }

    pub fn signature(&self) -> &Signature {
        self.adapter().signature()
    }

    fn state(&self) -> &ClosureState {
        // Safety: state is freed only in drop
        unsafe { self.state.as_ref() }
    }
}

impl Drop for NativeClosure {
    fn drop(&mut self) {
        // The closure borrows the state, so it goes first
        unsafe {
            ManuallyDrop::drop(&mut self.closure);
            drop(Box::from_raw(self.state.as_ptr()));
        }
    }
}

impl std::fmt::Debug for NativeClosure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeClosure")
            .field("code", &self.code)
            .field("descriptor", &self.adapter().compiled().descriptor())
            .finish()
    }
}

/// Create a native function pointer that dispatches to `callable`
pub fn create_closure(
    callable: Arc<dyn Executable>,
    compiled: Arc<CompiledSignature>,
    threads: Arc<ThreadTracker>,
) -> NativeClosure {
    let cif = compiled.cif().clone();
    let state = NonNull::from(Box::leak(Box::new(ClosureState {
        adapter: NativeToManaged::new(callable, compiled),
        threads,
    })));

    // Safety: the box is released only after the closure is dropped
    let userdata: &'static ClosureState = unsafe { state.as_ref() };
    let closure = Closure::new(cif, trampoline, userdata);
    let code = RawPointer::from_ptr(*closure.code_ptr() as *const c_void);

    NativeClosure {
        closure: ManuallyDrop::new(closure),
        state,
        code,
    }
}

unsafe extern "C" fn trampoline(
    _cif: &ffi_cif,
    result: &mut ffi_arg,
    args: *const *const c_void,
    state: &ClosureState,
) {
    let out = result as *mut ffi_arg as *mut c_void;
    let compiled = state.adapter.compiled();
    let signature = compiled.signature();
    let return_kind = signature.return_kind();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        state.threads.ensure_prepared();

        let values: Vec<Value> = signature
            .parameters()
            .iter()
            .enumerate()
            .map(|(i, kind)| unsafe { read_native(*kind, *args.add(i)) })
            .collect();

        let returned = state.adapter.execute(&values)?;
        unsafe { write_native(return_kind, &returned, out) }.map_err(|source| {
            escalate(BridgeError::Marshal {
                descriptor: compiled.descriptor().to_string(),
                source,
            })
        })
    }));

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            error!(descriptor = compiled.descriptor(), error = %err, "native callback failed");
            write_zero(return_kind, out);
        }
        Err(_) => {
            error!(descriptor = compiled.descriptor(), "native callback panicked");
            write_zero(return_kind, out);
        }
    }
}
