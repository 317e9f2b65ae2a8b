//! Value schemas: how a source value is represented at the machine level.

use kestrel_ir::types::Type;

/// Runtime representation of a source type under the target layout.
///
/// A value is either a fixed list of primitive scalars (possibly empty) or
/// a single aggregate living in memory and handled by address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schema {
    Aggregate { ty: Type, align: u64 },
    Scalars(Vec<Type>),
}

impl Schema {
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Schema::Aggregate { .. })
    }

    /// The scalar types, `None` for an aggregate.
    pub fn scalars(&self) -> Option<&[Type]> {
        match self {
            Schema::Scalars(types) => Some(types),
            Schema::Aggregate { .. } => None,
        }
    }

    /// Number of values in a minimal explosion of this schema.
    pub fn minimal_len(&self) -> usize {
        match self {
            Schema::Aggregate { .. } => 1,
            Schema::Scalars(types) => types.len(),
        }
    }

    /// Low-level parameter types used to pass a value of this schema.
    pub fn arg_types(&self) -> Vec<Type> {
        match self {
            Schema::Aggregate { .. } => vec![Type::PTR],
            Schema::Scalars(types) => types.clone(),
        }
    }

    /// Low-level type a function returns directly for this result schema.
    ///
    /// Aggregates are returned through a caller-provided slot and zero
    /// scalars are a void return; both yield `None`. Several scalars are
    /// returned as a struct of the scalar types in schema order.
    pub fn direct_return_type(&self) -> Option<Type> {
        match self {
            Schema::Aggregate { .. } => None,
            Schema::Scalars(types) => match types.as_slice() {
                [] => None,
                [single] => Some(single.clone()),
                _ => Some(Type::Struct(types.clone())),
            },
        }
    }
}
