//! Lowering, descriptors and signature caching

use atlas_nfi::{lower, NativePrimitive, Signature, SignatureCache, ValueKind};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;
use std::sync::Arc;

#[rstest]
#[case::void(ValueKind::Void, NativePrimitive::Void)]
#[case::bool(ValueKind::Bool, NativePrimitive::Sint8)]
#[case::byte(ValueKind::Byte, NativePrimitive::Sint8)]
#[case::char(ValueKind::Char, NativePrimitive::Sint16)]
#[case::short(ValueKind::Short, NativePrimitive::Sint16)]
#[case::int(ValueKind::Int, NativePrimitive::Sint32)]
#[case::long(ValueKind::Long, NativePrimitive::Sint64)]
#[case::float(ValueKind::Float, NativePrimitive::Float)]
#[case::double(ValueKind::Double, NativePrimitive::Double)]
#[case::object(ValueKind::ObjectHandle, NativePrimitive::Sint64)]
#[case::pointer(ValueKind::Pointer, NativePrimitive::Pointer)]
fn test_lowering_table(#[case] kind: ValueKind, #[case] expected: NativePrimitive) {
    assert_eq!(lower(kind), expected);
}

#[test]
fn test_descriptor_snapshot() {
    let sig = Signature::new(
        vec![ValueKind::Int, ValueKind::Bool, ValueKind::Pointer],
        ValueKind::Double,
    );
    insta::assert_snapshot!(sig.descriptor(), @"(sint32,sint8,pointer):double");

    let every = Signature::new(
        ValueKind::ALL
            .iter()
            .copied()
            .filter(|k| *k != ValueKind::Void)
            .collect::<Vec<_>>(),
        ValueKind::Void,
    );
    insta::assert_snapshot!(
        every.descriptor(),
        @"(sint8,sint8,sint16,sint16,sint32,sint64,float,double,sint64,pointer):void"
    );
}

#[test]
fn test_empty_parameter_list() {
    let sig = Signature::new(Vec::new(), ValueKind::Long);
    assert_eq!(sig.descriptor(), "():sint64");
    assert_eq!(sig.parameter_count(), 0);
}

fn any_kind() -> impl Strategy<Value = ValueKind> {
    proptest::sample::select(ValueKind::ALL.to_vec())
}

fn any_parameter() -> impl Strategy<Value = ValueKind> {
    any_kind().prop_filter("void is return-only", |k| *k != ValueKind::Void)
}

fn any_signature() -> impl Strategy<Value = Signature> {
    (prop::collection::vec(any_parameter(), 0..8), any_kind())
        .prop_map(|(params, ret)| Signature::new(params, ret))
}

proptest! {
    #[test]
    fn prop_descriptor_lists_every_parameter(sig in any_signature()) {
        let descriptor = sig.descriptor();
        let (params, ret) = descriptor
            .strip_prefix('(')
            .and_then(|rest| rest.split_once("):"))
            .expect("descriptor shape");

        let names: Vec<&str> = if params.is_empty() {
            Vec::new()
        } else {
            params.split(',').collect()
        };
        prop_assert_eq!(names.len(), sig.parameter_count());
        for (name, kind) in names.iter().zip(sig.parameters()) {
            prop_assert_eq!(*name, lower(*kind).name());
        }
        prop_assert_eq!(ret, lower(sig.return_kind()).name());
    }

    #[test]
    fn prop_equal_signatures_share_compiled_form(sig in any_signature()) {
        let cache = SignatureCache::new(true);
        let first = cache.compile(&sig).unwrap();
        let second = cache.compile(&sig.clone()).unwrap();
        prop_assert!(Arc::ptr_eq(&first, &second));
        prop_assert_eq!(cache.signatures_created(), 1);
        prop_assert_eq!(first.descriptor(), sig.descriptor());
    }

    #[test]
    fn prop_uncached_compiles_are_independent(sig in any_signature()) {
        let cache = SignatureCache::new(false);
        let first = cache.compile(&sig).unwrap();
        let second = cache.compile(&sig).unwrap();
        prop_assert!(!Arc::ptr_eq(&first, &second));
        prop_assert_eq!(cache.signatures_created(), 2);
    }
}

#[test]
fn test_cache_under_contention() {
    let cache = Arc::new(SignatureCache::new(true));
    let sigs: Vec<Signature> = ValueKind::ALL
        .iter()
        .filter(|k| **k != ValueKind::Void)
        .map(|k| Signature::new(vec![*k], *k))
        .collect();

    std::thread::scope(|scope| {
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let sigs = &sigs;
            scope.spawn(move || {
                for sig in sigs {
                    cache.compile(sig).unwrap();
                }
            });
        }
    });

    assert_eq!(cache.cached_count(), sigs.len());
    assert_eq!(cache.signatures_created(), sigs.len() as u64);
}
