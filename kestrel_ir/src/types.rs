//! Type system for kestrel IR.
//!
//! Types:
//! - `iN`: fixed-width integer of N bits (`i1` is the comparison result type)
//! - `f32` / `f64`: floating point
//! - `ptr`: opaque pointer with address space
//! - `{T, ...}`: first-class struct of the listed element types
//! - `unit`: result type of instructions that produce no value

use std::ops::BitOr;

/// Floating point type variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatType {
    /// IEEE 754 single precision.
    F32,
    /// IEEE 754 double precision.
    F64,
}

impl FloatType {
    /// Storage size in bytes.
    pub fn bytes(self) -> u64 {
        match self {
            FloatType::F32 => 4,
            FloatType::F64 => 8,
        }
    }
}

/// A type in the kestrel IR.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// Fixed-width integer.
    Int(u32),
    /// Floating point type.
    Float(FloatType),
    /// Opaque pointer with address space.
    Ptr(u32),
    /// First-class aggregate. Element order is significant.
    Struct(Vec<Type>),
    /// No value. Used for stores, terminators and void calls.
    Unit,
}

impl Type {
    pub const I1: Type = Type::Int(1);
    pub const I8: Type = Type::Int(8);
    pub const I32: Type = Type::Int(32);
    pub const I64: Type = Type::Int(64);
    pub const PTR: Type = Type::Ptr(0);

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Float(_))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Type::Int(_))
    }

    pub fn is_ptr(&self) -> bool {
        matches!(self, Type::Ptr(_))
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Type::Unit)
    }

    /// Element types of a struct, `None` for every other type.
    pub fn struct_elements(&self) -> Option<&[Type]> {
        match self {
            Type::Struct(elems) => Some(elems),
            _ => None,
        }
    }
}

/// Attributes attached to a single call or function parameter position.
///
/// Only the attributes needed for indirect returns are modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ParamAttrs(u8);

impl ParamAttrs {
    pub const NONE: ParamAttrs = ParamAttrs(0);
    /// The pointer is the caller-allocated slot the callee writes its result through.
    pub const STRUCT_RET: ParamAttrs = ParamAttrs(1 << 0);
    /// The pointer does not alias any other pointer visible to the callee.
    pub const NO_ALIAS: ParamAttrs = ParamAttrs(1 << 1);

    pub fn contains(self, other: ParamAttrs) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ParamAttrs {
    type Output = ParamAttrs;

    fn bitor(self, rhs: ParamAttrs) -> ParamAttrs {
        ParamAttrs(self.0 | rhs.0)
    }
}

/// A low-level function signature: ordered parameter types, one return type
/// and a positional attribute list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: Vec<Type>,
    /// `None` is a void return.
    pub ret: Option<Type>,
    /// `(parameter index, attributes)`, sorted by index.
    pub attrs: Vec<(u32, ParamAttrs)>,
}

impl Signature {
    pub fn new(params: Vec<Type>, ret: Option<Type>) -> Self {
        Self {
            params,
            ret,
            attrs: Vec::new(),
        }
    }

    /// Attach attributes to parameter `index`, merging with any already present.
    pub fn with_attrs(mut self, index: u32, attrs: ParamAttrs) -> Self {
        match self.attrs.iter_mut().find(|(i, _)| *i == index) {
            Some((_, existing)) => *existing = *existing | attrs,
            None => {
                self.attrs.push((index, attrs));
                self.attrs.sort_by_key(|(i, _)| *i);
            }
        }
        self
    }

    /// Attributes on parameter `index` (empty if none).
    pub fn param_attrs(&self, index: u32) -> ParamAttrs {
        self.attrs
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, a)| *a)
            .unwrap_or_default()
    }
}
