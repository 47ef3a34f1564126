//! Bridge call overhead benchmarks
//!
//! Measures:
//! - Signature compile cost, cached vs uncached
//! - Managed→native call through a bound adapter
//! - Native→managed callback dispatch through a closure

use atlas_nfi::{
    BridgeError, Executable, NativeAccess, NfiNativeAccess, Signature, SignatureCache, SymbolHandle,
    Value, ValueKind,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

extern "C" fn native_add(a: i32, b: i32) -> i32 {
    a.wrapping_add(b)
}

fn add_signature() -> Signature {
    Signature::new(vec![ValueKind::Int, ValueKind::Int], ValueKind::Int)
}

// ============================================================================
// Signature Compilation
// ============================================================================

fn bench_signature_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("signature_compile");
    for cached in [true, false] {
        let cache = SignatureCache::new(cached);
        let sig = add_signature();
        group.bench_with_input(BenchmarkId::from_parameter(cached), &sig, |b, sig| {
            b.iter(|| cache.compile(black_box(sig)))
        });
    }
    group.finish();
}

// ============================================================================
// Call Paths
// ============================================================================

fn bench_managed_to_native(c: &mut Criterion) {
    let access = NfiNativeAccess::default();
    let symbol = SymbolHandle::from_raw(native_add as *const std::ffi::c_void);
    let Ok(Some(adapter)) = (unsafe { access.bind_symbol(symbol, &add_signature()) }) else {
        return;
    };

    c.bench_function("managed_to_native_add", |b| {
        b.iter(|| adapter.execute(black_box(&[Value::Int(20), Value::Int(22)])))
    });
}

fn bench_native_to_managed(c: &mut Criterion) {
    let access = NfiNativeAccess::default();
    let add = |args: &[Value]| -> Result<Value, BridgeError> {
        let a = args[0].as_int().unwrap_or_default();
        let b = args[1].as_int().unwrap_or_default();
        Ok(Value::Int(a.wrapping_add(b)))
    };
    let Ok(closure) = access.create_native_closure(Arc::new(add), &add_signature()) else {
        return;
    };
    let f: extern "C" fn(i32, i32) -> i32 =
        unsafe { std::mem::transmute(closure.code_ptr().as_ptr()) };

    c.bench_function("native_to_managed_add", |b| {
        b.iter(|| f(black_box(20), black_box(22)))
    });
}

criterion_group!(
    benches,
    bench_signature_compile,
    bench_managed_to_native,
    bench_native_to_managed
);
criterion_main!(benches);
