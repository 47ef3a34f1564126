//! Bridge type system - value kinds and the native primitives they lower to
//!
//! Defines:
//! - `ValueKind`: the closed vocabulary of values that may cross the boundary
//! - `NativePrimitive`: fixed-width ABI primitives understood by libffi
//! - `Signature`: ordered parameter kinds plus a return kind
//!
//! Lowering table:
//! - Void → void
//! - Bool, Byte → sint8
//! - Char, Short → sint16
//! - Int → sint32
//! - Long, ObjectHandle → sint64
//! - Float → float
//! - Double → double
//! - Pointer → pointer

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value kinds that can appear in a bridge signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// No value (return position only)
    Void,
    /// Logical boolean, passed as a single byte
    Bool,
    /// Signed 8-bit integer
    Byte,
    /// UTF-16 code unit
    Char,
    /// Signed 16-bit integer
    Short,
    /// Signed 32-bit integer
    Int,
    /// Signed 64-bit integer
    Long,
    /// 32-bit IEEE 754 float
    Float,
    /// 64-bit IEEE 754 float
    Double,
    /// Managed object reference carried as a word-sized handle
    ObjectHandle,
    /// Raw native pointer
    Pointer,
}

impl ValueKind {
    /// Every value kind, in declaration order
    pub const ALL: [ValueKind; 11] = [
        ValueKind::Void,
        ValueKind::Bool,
        ValueKind::Byte,
        ValueKind::Char,
        ValueKind::Short,
        ValueKind::Int,
        ValueKind::Long,
        ValueKind::Float,
        ValueKind::Double,
        ValueKind::ObjectHandle,
        ValueKind::Pointer,
    ];

    /// Lower this kind to the native primitive used on the wire
    ///
    /// # Examples
    ///
    /// ```
    /// # use atlas_nfi::types::{NativePrimitive, ValueKind};
    /// assert_eq!(ValueKind::Bool.lower(), NativePrimitive::Sint8);
    /// assert_eq!(ValueKind::ObjectHandle.lower(), NativePrimitive::Sint64);
    /// ```
    pub const fn lower(self) -> NativePrimitive {
        match self {
            ValueKind::Void => NativePrimitive::Void,
            ValueKind::Bool | ValueKind::Byte => NativePrimitive::Sint8,
            ValueKind::Char | ValueKind::Short => NativePrimitive::Sint16,
            ValueKind::Int => NativePrimitive::Sint32,
            ValueKind::Long => NativePrimitive::Sint64,
            ValueKind::Float => NativePrimitive::Float,
            ValueKind::Double => NativePrimitive::Double,
            // word-sized handle
            ValueKind::ObjectHandle => NativePrimitive::Sint64,
            ValueKind::Pointer => NativePrimitive::Pointer,
        }
    }

    /// Get a display name for this kind
    pub fn display_name(&self) -> &'static str {
        match self {
            ValueKind::Void => "void",
            ValueKind::Bool => "boolean",
            ValueKind::Byte => "byte",
            ValueKind::Char => "char",
            ValueKind::Short => "short",
            ValueKind::Int => "int",
            ValueKind::Long => "long",
            ValueKind::Float => "float",
            ValueKind::Double => "double",
            ValueKind::ObjectHandle => "object",
            ValueKind::Pointer => "pointer",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Lower a value kind to its native primitive
pub const fn lower(kind: ValueKind) -> NativePrimitive {
    kind.lower()
}

/// Native ABI primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NativePrimitive {
    Void,
    Sint8,
    Sint16,
    Sint32,
    Sint64,
    Float,
    Double,
    Pointer,
}

impl NativePrimitive {
    /// Name used in structural descriptors
    pub fn name(&self) -> &'static str {
        match self {
            NativePrimitive::Void => "void",
            NativePrimitive::Sint8 => "sint8",
            NativePrimitive::Sint16 => "sint16",
            NativePrimitive::Sint32 => "sint32",
            NativePrimitive::Sint64 => "sint64",
            NativePrimitive::Float => "float",
            NativePrimitive::Double => "double",
            NativePrimitive::Pointer => "pointer",
        }
    }
}

impl fmt::Display for NativePrimitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Call signature: ordered parameter kinds plus one return kind
///
/// Signatures compare and hash structurally, so two independently built
/// signatures with the same kinds are interchangeable (and share a cache slot).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    parameters: Vec<ValueKind>,
    return_kind: ValueKind,
}

impl Signature {
    /// Create a signature from its parameter kinds and return kind
    pub fn new(parameters: impl Into<Vec<ValueKind>>, return_kind: ValueKind) -> Self {
        Self {
            parameters: parameters.into(),
            return_kind,
        }
    }

    /// Number of parameters, the arity contract of every adapter built from this signature
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Parameter kind at `index`
    ///
    /// # Panics
    ///
    /// Panics if `index >= parameter_count()`.
    pub fn parameter_kind_at(&self, index: usize) -> ValueKind {
        self.parameters[index]
    }

    /// All parameter kinds in order
    pub fn parameters(&self) -> &[ValueKind] {
        &self.parameters
    }

    /// Return kind
    pub fn return_kind(&self) -> ValueKind {
        self.return_kind
    }

    /// Build the structural descriptor handed to the native-calling subsystem
    ///
    /// # Examples
    ///
    /// ```
    /// # use atlas_nfi::types::{Signature, ValueKind};
    /// let sig = Signature::new(
    ///     [ValueKind::Int, ValueKind::Bool, ValueKind::Pointer],
    ///     ValueKind::Double,
    /// );
    /// assert_eq!(sig.descriptor(), "(sint32,sint8,pointer):double");
    /// ```
    pub fn descriptor(&self) -> String {
        let mut sb = String::with_capacity(64);
        sb.push('(');
        for (i, kind) in self.parameters.iter().enumerate() {
            if i > 0 {
                sb.push(',');
            }
            sb.push_str(kind.lower().name());
        }
        sb.push(')');
        sb.push(':');
        sb.push_str(self.return_kind.lower().name());
        sb
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor())
    }
}
