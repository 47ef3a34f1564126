//! Value marshaling - managed ↔ native conversions
//!
//! Two layers:
//! - `to_native()` / `to_managed()`: the directional kind conversions applied by
//!   the call adapters (booleans become bytes, characters become code units)
//! - `NativeArg`, `call_native()`, `read_native()`, `write_native()`: storage and
//!   raw access for native-form values at the libffi boundary
//!
//! # Memory Safety
//!
//! - Argument storage outlives the libffi call that borrows it
//! - Integer returns narrower than a register are read and written through the
//!   full `ffi_sarg` slot libffi reserves for them

use crate::error::MarshalError;
use crate::signature::CompiledSignature;
use crate::types::{NativePrimitive, ValueKind};
use crate::value::{ObjectHandle, RawPointer, Value};
use libffi::middle::{Arg, CodePtr};
use libffi::raw::ffi_sarg;
use std::ffi::c_void;

/// Convert a managed-form value to its native form for `kind`
///
/// `Bool` becomes a 0/1 byte (a byte already given for a `Bool` kind is
/// normalized to 0/1), `Char` becomes a 16-bit code unit and `Void` becomes
/// the no-value token. Every other value passes through.
///
/// # Examples
///
/// ```
/// # use atlas_nfi::marshal::to_native;
/// # use atlas_nfi::types::ValueKind;
/// # use atlas_nfi::value::Value;
/// assert_eq!(to_native(ValueKind::Bool, Value::Bool(true)), Value::Byte(1));
/// assert_eq!(to_native(ValueKind::Char, Value::Char(0x41)), Value::Short(0x41));
/// assert_eq!(to_native(ValueKind::Int, Value::Int(7)), Value::Int(7));
/// ```
pub fn to_native(kind: ValueKind, value: Value) -> Value {
    match (kind, value) {
        (ValueKind::Bool, Value::Bool(b)) => Value::Byte(i8::from(b)),
        (ValueKind::Bool, Value::Byte(b)) => Value::Byte(i8::from(b != 0)),
        (ValueKind::Char, Value::Char(c)) => Value::Short(c as i16),
        (ValueKind::Void, _) => Value::Void,
        (_, v) => v,
    }
}

/// Convert a native-form value to its managed form for `kind`
///
/// Any non-zero byte is `true`. `Void` always yields the no-value token.
///
/// # Examples
///
/// ```
/// # use atlas_nfi::marshal::to_managed;
/// # use atlas_nfi::types::ValueKind;
/// # use atlas_nfi::value::Value;
/// assert_eq!(to_managed(ValueKind::Bool, Value::Byte(1)), Value::Bool(true));
/// assert_eq!(to_managed(ValueKind::Bool, Value::Byte(-1)), Value::Bool(true));
/// assert_eq!(to_managed(ValueKind::Char, Value::Short(-1)), Value::Char(0xFFFF));
/// ```
pub fn to_managed(kind: ValueKind, value: Value) -> Value {
    match (kind, value) {
        (ValueKind::Bool, Value::Byte(b)) => Value::Bool(b != 0),
        (ValueKind::Char, Value::Short(s)) => Value::Char(s as u16),
        (ValueKind::Void, _) => Value::Void,
        (_, v) => v,
    }
}

/// Native argument storage for one libffi call
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum NativeArg {
    Sint8(i8),
    Sint16(i16),
    Sint32(i32),
    Sint64(i64),
    Float(f32),
    Double(f64),
    Pointer(*mut c_void),
}

impl NativeArg {
    /// Encode a native-form value declared as `kind`
    pub(crate) fn encode(kind: ValueKind, value: &Value) -> Result<NativeArg, MarshalError> {
        let arg = match (kind, value) {
            (ValueKind::Bool | ValueKind::Byte, Value::Byte(b)) => NativeArg::Sint8(*b),
            (ValueKind::Char | ValueKind::Short, Value::Short(s)) => NativeArg::Sint16(*s),
            (ValueKind::Int, Value::Int(i)) => NativeArg::Sint32(*i),
            (ValueKind::Long, Value::Long(l)) => NativeArg::Sint64(*l),
            (ValueKind::ObjectHandle, Value::Object(h)) => NativeArg::Sint64(h.0),
            (ValueKind::Float, Value::Float(f)) => NativeArg::Float(*f),
            (ValueKind::Double, Value::Double(d)) => NativeArg::Double(*d),
            (ValueKind::Pointer, Value::Pointer(p)) => NativeArg::Pointer(p.as_ptr()),
            _ => {
                return Err(MarshalError::TypeMismatch {
                    expected: kind.lower().name(),
                    got: value.type_name(),
                })
            }
        };
        Ok(arg)
    }

    fn as_arg(&self) -> Arg {
        match self {
            NativeArg::Sint8(v) => Arg::new(v),
            NativeArg::Sint16(v) => Arg::new(v),
            NativeArg::Sint32(v) => Arg::new(v),
            NativeArg::Sint64(v) => Arg::new(v),
            NativeArg::Float(v) => Arg::new(v),
            NativeArg::Double(v) => Arg::new(v),
            NativeArg::Pointer(v) => Arg::new(v),
        }
    }
}

/// Lift a raw 64-bit result into the value matching `kind`
fn wide_value(kind: ValueKind, raw: i64) -> Value {
    match kind {
        ValueKind::ObjectHandle => Value::Object(ObjectHandle(raw)),
        _ => Value::Long(raw),
    }
}

/// Call `code` through `compiled` with native-form arguments
///
/// The result is native-form as well (`Byte` for booleans, `Short` for chars).
///
/// # Safety
///
/// `code` must point to a function whose real signature matches `compiled`.
pub(crate) unsafe fn call_native(
    compiled: &CompiledSignature,
    code: *const c_void,
    args: &[Value],
) -> Result<Value, MarshalError> {
    let signature = compiled.signature();
    let storage = args
        .iter()
        .zip(signature.parameters())
        .map(|(value, kind)| NativeArg::encode(*kind, value))
        .collect::<Result<Vec<_>, _>>()?;
    let ffi_args: Vec<Arg> = storage.iter().map(NativeArg::as_arg).collect();

    let cif = compiled.cif();
    let fun = CodePtr(code as *mut c_void);
    let kind = signature.return_kind();

    let result = match kind.lower() {
        NativePrimitive::Void => {
            cif.call::<()>(fun, &ffi_args);
            Value::Void
        }
        NativePrimitive::Sint8 => Value::Byte(cif.call::<ffi_sarg>(fun, &ffi_args) as i8),
        NativePrimitive::Sint16 => Value::Short(cif.call::<ffi_sarg>(fun, &ffi_args) as i16),
        NativePrimitive::Sint32 => Value::Int(cif.call::<ffi_sarg>(fun, &ffi_args) as i32),
        NativePrimitive::Sint64 => wide_value(kind, cif.call::<i64>(fun, &ffi_args)),
        NativePrimitive::Float => Value::Float(cif.call::<f32>(fun, &ffi_args)),
        NativePrimitive::Double => Value::Double(cif.call::<f64>(fun, &ffi_args)),
        NativePrimitive::Pointer => Value::Pointer(RawPointer::from_ptr(
            cif.call::<*mut c_void>(fun, &ffi_args),
        )),
    };
    Ok(result)
}

/// Read one native-form argument handed to a closure
///
/// # Safety
///
/// `slot` must point to a live value of the primitive `kind` lowers to.
pub(crate) unsafe fn read_native(kind: ValueKind, slot: *const c_void) -> Value {
    match kind.lower() {
        NativePrimitive::Void => Value::Void,
        NativePrimitive::Sint8 => Value::Byte(*(slot as *const i8)),
        NativePrimitive::Sint16 => Value::Short(*(slot as *const i16)),
        NativePrimitive::Sint32 => Value::Int(*(slot as *const i32)),
        NativePrimitive::Sint64 => wide_value(kind, *(slot as *const i64)),
        NativePrimitive::Float => Value::Float(*(slot as *const f32)),
        NativePrimitive::Double => Value::Double(*(slot as *const f64)),
        NativePrimitive::Pointer => {
            Value::Pointer(RawPointer::from_ptr(*(slot as *const *mut c_void)))
        }
    }
}

/// Write a native-form closure result into libffi's return slot
///
/// # Safety
///
/// `out` must be the return buffer libffi passed to the closure for a
/// function returning the primitive `kind` lowers to.
pub(crate) unsafe fn write_native(
    kind: ValueKind,
    value: &Value,
    out: *mut c_void,
) -> Result<(), MarshalError> {
    if kind == ValueKind::Void {
        return Ok(());
    }
    match NativeArg::encode(kind, value)? {
        NativeArg::Sint8(v) => *(out as *mut ffi_sarg) = v as ffi_sarg,
        NativeArg::Sint16(v) => *(out as *mut ffi_sarg) = v as ffi_sarg,
        NativeArg::Sint32(v) => *(out as *mut ffi_sarg) = v as ffi_sarg,
        NativeArg::Sint64(v) => *(out as *mut i64) = v,
        NativeArg::Float(v) => *(out as *mut f32) = v,
        NativeArg::Double(v) => *(out as *mut f64) = v,
        NativeArg::Pointer(v) => *(out as *mut *mut c_void) = v,
    }
    Ok(())
}

/// Write the zero value of `kind` into libffi's return slot
///
/// # Safety
///
/// Same contract as `write_native()`.
pub(crate) unsafe fn write_zero(kind: ValueKind, out: *mut c_void) {
    match kind.lower() {
        NativePrimitive::Void => {}
        NativePrimitive::Sint8 | NativePrimitive::Sint16 | NativePrimitive::Sint32 => {
            *(out as *mut ffi_sarg) = 0
        }
        NativePrimitive::Sint64 => *(out as *mut i64) = 0,
        NativePrimitive::Float => *(out as *mut f32) = 0.0,
        NativePrimitive::Double => *(out as *mut f64) = 0.0,
        NativePrimitive::Pointer => *(out as *mut *mut c_void) = std::ptr::null_mut(),
    }
}
