//! Values crossing the bridge
//!
//! A single `Value` type serves both sides of the boundary. Managed-form values
//! use `Bool` and `Char`; native-form values carry the same data as `Byte` and
//! `Short` code units. The adapters in `caller` and `callbacks` convert between
//! the two forms, everything else passes through untouched.

use crate::types::ValueKind;
use std::ffi::c_void;
use std::fmt;

/// Managed object reference carried across the boundary as a word-sized integer
///
/// Opaque to native code; the managed runtime owns the mapping to real objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ObjectHandle(pub i64);

impl ObjectHandle {
    /// The null reference
    pub const NULL: ObjectHandle = ObjectHandle(0);

    /// Check whether this is the null reference
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Raw native address
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RawPointer(usize);

impl RawPointer {
    /// The null pointer
    pub const NULL: RawPointer = RawPointer(0);

    /// Wrap a raw pointer
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize)
    }

    /// Wrap a numeric address
    pub const fn from_address(address: usize) -> Self {
        Self(address)
    }

    /// Get the numeric address
    pub fn address(&self) -> usize {
        self.0
    }

    /// Get the address as an untyped pointer
    pub fn as_ptr(&self) -> *mut c_void {
        self.0 as *mut c_void
    }

    /// Check for a null address
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for RawPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawPointer({:#x})", self.0)
    }
}

impl fmt::LowerHex for RawPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// A value on either side of the bridge
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// The canonical "no value" token
    Void,
    /// Logical boolean (managed form)
    Bool(bool),
    /// Signed byte; also the native form of a boolean
    Byte(i8),
    /// Character code unit (managed form)
    Char(u16),
    /// Signed 16-bit integer; also the native form of a character
    Short(i16),
    /// Signed 32-bit integer
    Int(i32),
    /// Signed 64-bit integer
    Long(i64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// Managed object reference
    Object(ObjectHandle),
    /// Raw native pointer
    Pointer(RawPointer),
}

impl Value {
    /// Get the kind this value naturally belongs to
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Void => ValueKind::Void,
            Value::Bool(_) => ValueKind::Bool,
            Value::Byte(_) => ValueKind::Byte,
            Value::Char(_) => ValueKind::Char,
            Value::Short(_) => ValueKind::Short,
            Value::Int(_) => ValueKind::Int,
            Value::Long(_) => ValueKind::Long,
            Value::Float(_) => ValueKind::Float,
            Value::Double(_) => ValueKind::Double,
            Value::Object(_) => ValueKind::ObjectHandle,
            Value::Pointer(_) => ValueKind::Pointer,
        }
    }

    /// Get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        self.kind().display_name()
    }

    /// Build a `Char` from a Rust char in the Basic Multilingual Plane
    ///
    /// Returns `None` for characters that need a surrogate pair.
    pub fn from_char(c: char) -> Option<Value> {
        u16::try_from(u32::from(c)).ok().map(Value::Char)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<RawPointer> {
        match self {
            Value::Pointer(p) => Some(*p),
            _ => None,
        }
    }

    /// Check for the "no value" token
    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i8> for Value {
    fn from(b: i8) -> Self {
        Value::Byte(b)
    }
}

impl From<i16> for Value {
    fn from(s: i16) -> Self {
        Value::Short(s)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<i64> for Value {
    fn from(l: i64) -> Self {
        Value::Long(l)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<ObjectHandle> for Value {
    fn from(h: ObjectHandle) -> Self {
        Value::Object(h)
    }
}

impl From<RawPointer> for Value {
    fn from(p: RawPointer) -> Self {
        Value::Pointer(p)
    }
}
