//! Schema-shaped source values and memory addresses.

use kestrel_ir::value::ValueRef;

use crate::explosion::{Explosion, ExplosionKind};
use crate::schema::Schema;

/// A computed source value in the shape its schema dictates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RValue {
    Scalars(Vec<ValueRef>),
    /// Address of an aggregate in memory.
    Aggregate(ValueRef),
}

impl RValue {
    pub fn scalar(value: ValueRef) -> Self {
        RValue::Scalars(vec![value])
    }

    pub fn empty() -> Self {
        RValue::Scalars(Vec::new())
    }

    /// Claim one value of `schema` from a minimal explosion.
    pub fn claim(schema: &Schema, src: &mut Explosion) -> Self {
        assert_eq!(
            src.kind(),
            ExplosionKind::Minimal,
            "rvalues are claimed from minimal explosions only"
        );
        match schema {
            Schema::Aggregate { .. } => RValue::Aggregate(src.claim_next()),
            Schema::Scalars(types) => RValue::Scalars(src.claim(types.len())),
        }
    }

    pub fn scalar_values(&self) -> &[ValueRef] {
        match self {
            RValue::Scalars(values) => values,
            RValue::Aggregate(_) => panic!("expected a scalar rvalue, found an aggregate"),
        }
    }

    pub fn address(&self) -> ValueRef {
        match self {
            RValue::Aggregate(addr) => *addr,
            RValue::Scalars(values) => {
                panic!("expected an aggregate rvalue, found {} scalars", values.len())
            }
        }
    }

    /// Append to a minimal explosion. Scalars are added in order, an
    /// aggregate contributes its address.
    pub fn add_to(self, out: &mut Explosion) {
        match self {
            RValue::Scalars(values) => out.add_all(values),
            RValue::Aggregate(addr) => {
                assert_eq!(
                    out.kind(),
                    ExplosionKind::Minimal,
                    "an aggregate address cannot enter a maximal explosion"
                );
                out.add(addr);
            }
        }
    }
}

/// A pointer together with the alignment known for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address {
    pub addr: ValueRef,
    pub align: u64,
}

impl Address {
    pub fn new(addr: ValueRef, align: u64) -> Self {
        Self { addr, align }
    }
}

/// Alignment that still holds `offset` bytes past an address aligned to `align`.
pub fn alignment_at_offset(align: u64, offset: u64) -> u64 {
    if offset == 0 {
        align
    } else {
        align.min(1 << offset.trailing_zeros())
    }
}
