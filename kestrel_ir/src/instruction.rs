//! Instruction definitions for kestrel IR.

use num_bigint::BigInt;

use crate::module::SymbolId;
use crate::types::{ParamAttrs, Signature, Type};
use crate::value::{BlockRef, ValueRef};

/// Origin tracks where an instruction came from (for debug info / profiling).
#[derive(Debug, Clone, Default)]
pub struct Origin {
    /// Source node(s) this was derived from.
    pub sources: Vec<u32>,
}

impl Origin {
    /// Create a synthetic origin (no source).
    pub fn synthetic() -> Self {
        Self { sources: vec![] }
    }

    /// Create an origin from a single source.
    pub fn from_source(id: u32) -> Self {
        Self { sources: vec![id] }
    }
}

/// An instruction in the kestrel IR.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub op: Op,
    /// Result type. `Type::Unit` for instructions without a result.
    pub ty: Type,
    pub origin: Origin,
}

/// Integer comparison predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ICmpOp {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

/// Floating point comparison predicates.
///
/// `O*` predicates are false if either operand is NaN, `U*` predicates are
/// true if either operand is NaN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FCmpOp {
    Oeq,
    Ogt,
    Oge,
    Olt,
    Ole,
    One,
    /// Neither operand is NaN.
    Ord,
    Ueq,
    Ugt,
    Uge,
    Ult,
    Ule,
    Une,
    /// Either operand is NaN.
    Uno,
}

/// Why a placeholder value was emitted instead of a real one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderReason {
    /// Reference to a function declared inside another function's body.
    LocalFunction,
}

/// Instruction opcodes.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Function parameter. Index into the parameter list.
    Param(u32),
    /// Integer constant, truncated to the result width.
    Const(BigInt),
    /// Floating point constant.
    FConst(f64),
    /// Undefined value of the result type.
    Undef,
    /// Stand-in for a value the lowering does not support yet.
    /// Never treated as `undef` by any consumer.
    Placeholder(PlaceholderReason),

    // -- Integer arithmetic --
    Add(ValueRef, ValueRef),
    Sub(ValueRef, ValueRef),
    Mul(ValueRef, ValueRef),
    /// Two's complement negation: neg %a
    Neg(ValueRef),
    /// Bitwise complement: not %a
    Not(ValueRef),
    And(ValueRef, ValueRef),
    Or(ValueRef, ValueRef),
    Xor(ValueRef, ValueRef),
    SDiv(ValueRef, ValueRef),
    UDiv(ValueRef, ValueRef),
    SRem(ValueRef, ValueRef),
    URem(ValueRef, ValueRef),
    /// Signed division known to have no remainder (poison otherwise).
    ExactSDiv(ValueRef, ValueRef),
    /// Unsigned division known to have no remainder (poison otherwise).
    ExactUDiv(ValueRef, ValueRef),

    // -- Floating point arithmetic --
    FAdd(ValueRef, ValueRef),
    FSub(ValueRef, ValueRef),
    FMul(ValueRef, ValueRef),
    FDiv(ValueRef, ValueRef),

    // -- Comparison --
    /// Integer comparison. Returns i1.
    ICmp(ICmpOp, ValueRef, ValueRef),
    /// Floating point comparison. Returns i1.
    FCmp(FCmpOp, ValueRef, ValueRef),

    // -- Memory --
    /// Allocate storage for one value of `ty` in the current frame, returns pointer.
    StackSlot { ty: Type, align: u64 },
    /// Load a value of the instruction's result type from `ptr`.
    Load { ptr: ValueRef, align: u64 },
    /// Store `value` to `ptr`.
    Store {
        value: ValueRef,
        ptr: ValueRef,
        align: u64,
    },
    /// Address of element `index` of the struct `aggregate` stored at `ptr`.
    FieldAddr {
        ptr: ValueRef,
        aggregate: Type,
        index: u32,
    },

    // -- First-class aggregates --
    /// Read element `index` of a struct value.
    ExtractValue(ValueRef, u32),
    /// Copy of the struct value with element `index` replaced.
    InsertValue(ValueRef, ValueRef, u32),

    // -- Symbol --
    /// Address of a function symbol.
    SymbolAddr(SymbolId),

    // -- Call --
    /// Reinterpret an opaque code pointer as a pointer to a function of the
    /// given signature. Not checked at runtime.
    FnCast(ValueRef, Box<Signature>),
    /// Call `callee` with `args` using `sig`; `attrs` are positional.
    Call {
        callee: ValueRef,
        args: Vec<ValueRef>,
        sig: Box<Signature>,
        attrs: Vec<(u32, ParamAttrs)>,
    },

    /// Marker in the entry block before which local storage is allocated.
    /// Must be erased before the function is complete.
    AllocaPoint,

    // -- Terminators (by convention, placed last in a basic block) --
    /// Return from function, with a value unless the return type is void.
    Ret(Option<ValueRef>),
    /// Unconditional branch.
    Br(BlockRef),
    /// Conditional branch: brif cond, then_block, else_block.
    BrIf(ValueRef, BlockRef, BlockRef),
    /// Control flow never reaches this point.
    Unreachable,
}

impl Op {
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Op::Ret(_) | Op::Br(_) | Op::BrIf(..) | Op::Unreachable
        )
    }

    /// Blocks this instruction may transfer control to.
    pub fn successors(&self) -> Vec<BlockRef> {
        match self {
            Op::Br(target) => vec![*target],
            Op::BrIf(_, then_bb, else_bb) => vec![*then_bb, *else_bb],
            _ => Vec::new(),
        }
    }

    /// Values read by this instruction, in operand order.
    pub fn operands(&self) -> Vec<ValueRef> {
        match self {
            Op::Param(_)
            | Op::Const(_)
            | Op::FConst(_)
            | Op::Undef
            | Op::Placeholder(_)
            | Op::StackSlot { .. }
            | Op::SymbolAddr(_)
            | Op::AllocaPoint
            | Op::Br(_)
            | Op::Unreachable => Vec::new(),
            Op::Neg(a) | Op::Not(a) => vec![*a],
            Op::Add(a, b)
            | Op::Sub(a, b)
            | Op::Mul(a, b)
            | Op::And(a, b)
            | Op::Or(a, b)
            | Op::Xor(a, b)
            | Op::SDiv(a, b)
            | Op::UDiv(a, b)
            | Op::SRem(a, b)
            | Op::URem(a, b)
            | Op::ExactSDiv(a, b)
            | Op::ExactUDiv(a, b)
            | Op::FAdd(a, b)
            | Op::FSub(a, b)
            | Op::FMul(a, b)
            | Op::FDiv(a, b)
            | Op::ICmp(_, a, b)
            | Op::FCmp(_, a, b) => vec![*a, *b],
            Op::Load { ptr, .. } | Op::FieldAddr { ptr, .. } => vec![*ptr],
            Op::Store { value, ptr, .. } => vec![*value, *ptr],
            Op::ExtractValue(agg, _) => vec![*agg],
            Op::InsertValue(agg, val, _) => vec![*agg, *val],
            Op::FnCast(v, _) => vec![*v],
            Op::Call { callee, args, .. } => {
                let mut ops = vec![*callee];
                ops.extend_from_slice(args);
                ops
            }
            Op::Ret(val) => val.iter().copied().collect(),
            Op::BrIf(cond, _, _) => vec![*cond],
        }
    }
}
