//! End-to-end tests: load, resolve, bind, call

mod common;

use atlas_config::{LoaderConfig, NfiConfig};
use atlas_nfi::{
    BridgeError, CallAdapter, Executable, NativeAccess, NfiNativeAccess, Signature, Value,
    ValueKind,
};
use common::init_tracing;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::path::{Path, PathBuf};

fn bind_libc(access: &NfiNativeAccess, name: &str, signature: &Signature) -> CallAdapter {
    let lib = access.load_default_library().unwrap();
    let symbol = access
        .lookup_symbol(lib, name)
        .unwrap_or_else(|| panic!("{} not found in the default namespace", name));
    unsafe { access.bind_symbol(symbol, signature) }
        .unwrap()
        .expect("resolved symbols are non-null")
}

#[cfg(unix)]
#[rstest]
#[case::negative(-7, 7)]
#[case::positive(12, 12)]
#[case::zero(0, 0)]
fn test_abs_from_default_library(#[case] input: i32, #[case] expected: i32) {
    init_tracing();
    let access = NfiNativeAccess::default();
    let abs = bind_libc(
        &access,
        "abs",
        &Signature::new(vec![ValueKind::Int], ValueKind::Int),
    );

    assert!(abs.is_executable());
    assert_eq!(abs.execute(&[Value::Int(input)]), Ok(Value::Int(expected)));
}

#[cfg(unix)]
#[test]
fn test_labs_sint64() {
    init_tracing();
    let access = NfiNativeAccess::default();
    let labs = bind_libc(
        &access,
        "labs",
        &Signature::new(vec![ValueKind::Long], ValueKind::Long),
    );
    assert_eq!(
        labs.execute(&[Value::Long(-5_000_000_000)]),
        Ok(Value::Long(5_000_000_000))
    );
}

#[cfg(unix)]
#[test]
fn test_strlen_on_raw_buffer() {
    init_tracing();
    let access = NfiNativeAccess::default();
    let strlen = bind_libc(
        &access,
        "strlen",
        &Signature::new(vec![ValueKind::Pointer], ValueKind::Long),
    );

    let text = b"bridge\0";
    let buffer = access.allocate(text.len() as i64).unwrap().unwrap();
    unsafe { buffer.as_mut_slice().copy_from_slice(text) };

    let len = strlen.execute(&[Value::Pointer(buffer.address())]);
    assert_eq!(len, Ok(Value::Long(6)));

    unsafe { access.free(buffer) };
}

#[test]
fn test_bogus_symbol_is_none() {
    init_tracing();
    let access = NfiNativeAccess::default();
    let lib = access.load_default_library().unwrap();
    assert!(access
        .lookup_symbol(lib, "atlas_nfi_no_such_symbol_anywhere")
        .is_none());
}

#[cfg(unix)]
#[test]
fn test_arity_checked_before_native_call() {
    init_tracing();
    let access = NfiNativeAccess::default();
    let abs = bind_libc(
        &access,
        "abs",
        &Signature::new(vec![ValueKind::Int], ValueKind::Int),
    );

    let err = abs.execute(&[Value::Int(1), Value::Int(2)]).unwrap_err();
    assert_eq!(err, BridgeError::ArityMismatch { expected: 1, got: 2 });
    assert!(err.is_contract_violation());
}

#[test]
fn test_missing_library_is_none() {
    init_tracing();
    let access = NfiNativeAccess::default();
    let loaded = access.load_library(Path::new("/definitely/not/here/libnothing.so"));
    assert_eq!(loaded, Ok(None));
}

#[test]
fn test_isolated_loading_is_fatal() {
    init_tracing();
    let config = NfiConfig {
        loader: Some(LoaderConfig {
            isolate: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    };
    let access = NfiNativeAccess::new(&config);
    let err = access.load_library(Path::new("libm.so.6")).unwrap_err();
    assert!(err.is_fatal());
}

#[cfg(target_os = "linux")]
#[test]
fn test_load_libm_and_call_cos() {
    init_tracing();
    let access = NfiNativeAccess::default();
    let Some(libm) = access.load_library(Path::new("libm.so.6")).unwrap() else {
        // Minimal images may ship without a separate libm
        return;
    };

    let again = access.load_library(Path::new("libm.so.6")).unwrap();
    assert_eq!(again, Some(libm));

    let cos = access.lookup_symbol(libm, "cos").expect("cos is in libm");
    let cos = unsafe {
        access
            .bind_symbol(cos, &Signature::new(vec![ValueKind::Double], ValueKind::Double))
            .unwrap()
            .unwrap()
    };
    assert_eq!(cos.execute(&[Value::Double(0.0)]), Ok(Value::Double(1.0)));

    access.unload_library(libm);
    assert!(access.lookup_symbol(libm, "cos").is_some());
}

#[test]
fn test_configured_search_path_is_consulted() {
    init_tracing();
    let config = NfiConfig {
        loader: Some(LoaderConfig {
            search_paths: vec![PathBuf::from("/nonexistent/atlas/libs")],
            ..Default::default()
        }),
        ..Default::default()
    };
    let access = NfiNativeAccess::new(&config);
    assert_eq!(
        access.loader().search_paths()[0],
        PathBuf::from("/nonexistent/atlas/libs")
    );
    assert_eq!(access.load_library(Path::new("nothing_here")), Ok(None));
}

#[test]
fn test_signatures_shared_across_bindings() {
    init_tracing();
    let access = NfiNativeAccess::default();
    let lib = access.load_default_library().unwrap();
    let sig = Signature::new(vec![ValueKind::Int], ValueKind::Int);

    for name in ["abs", "toupper", "tolower"] {
        if let Some(symbol) = access.lookup_symbol(lib, name) {
            let bound = unsafe { access.bind_symbol(symbol, &sig) }.unwrap();
            assert!(bound.is_some());
        }
    }
    assert!(access.signatures_created() <= 1);
}
