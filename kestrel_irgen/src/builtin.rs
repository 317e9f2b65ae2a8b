//! Builtin intrinsics lowered inline at the call site.

use kestrel_ir::instruction::{FCmpOp, ICmpOp, Origin};

use crate::ast::{Expr, TypeId};
use crate::explosion::{Explosion, ExplosionKind};
use crate::irgen_function::IrGenFunction;
use crate::rvalue::RValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Xor,
    FDiv,
    SDiv,
    UDiv,
    SRem,
    URem,
    ExactSDiv,
    ExactUDiv,
    ICmp(ICmpOp),
    FCmp(FCmpOp),
}

/// Binary operations whose integer or float form is chosen by the type of
/// the first operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Mul,
    Sub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinOp {
    Unary(UnaryOp),
    Binary(BinaryOp),
    Arithmetic(ArithmeticOp),
}

impl BuiltinOp {
    pub fn from_name(name: &str) -> Option<Self> {
        use BinaryOp::*;
        let op = match name {
            "neg" => BuiltinOp::Unary(UnaryOp::Neg),
            "not" => BuiltinOp::Unary(UnaryOp::Not),

            "and" => BuiltinOp::Binary(And),
            "or" => BuiltinOp::Binary(Or),
            "xor" => BuiltinOp::Binary(Xor),
            "fdiv" => BuiltinOp::Binary(FDiv),
            "sdiv" => BuiltinOp::Binary(SDiv),
            "udiv" => BuiltinOp::Binary(UDiv),
            "srem" => BuiltinOp::Binary(SRem),
            "urem" => BuiltinOp::Binary(URem),
            "sdiv_exact" => BuiltinOp::Binary(ExactSDiv),
            "udiv_exact" => BuiltinOp::Binary(ExactUDiv),

            "cmp_eq" => BuiltinOp::Binary(ICmp(ICmpOp::Eq)),
            "cmp_ne" => BuiltinOp::Binary(ICmp(ICmpOp::Ne)),
            "cmp_slt" => BuiltinOp::Binary(ICmp(ICmpOp::Slt)),
            "cmp_sle" => BuiltinOp::Binary(ICmp(ICmpOp::Sle)),
            "cmp_sgt" => BuiltinOp::Binary(ICmp(ICmpOp::Sgt)),
            "cmp_sge" => BuiltinOp::Binary(ICmp(ICmpOp::Sge)),
            "cmp_ult" => BuiltinOp::Binary(ICmp(ICmpOp::Ult)),
            "cmp_ule" => BuiltinOp::Binary(ICmp(ICmpOp::Ule)),
            "cmp_ugt" => BuiltinOp::Binary(ICmp(ICmpOp::Ugt)),
            "cmp_uge" => BuiltinOp::Binary(ICmp(ICmpOp::Uge)),

            "fcmp_oeq" => BuiltinOp::Binary(FCmp(FCmpOp::Oeq)),
            "fcmp_ogt" => BuiltinOp::Binary(FCmp(FCmpOp::Ogt)),
            "fcmp_oge" => BuiltinOp::Binary(FCmp(FCmpOp::Oge)),
            "fcmp_olt" => BuiltinOp::Binary(FCmp(FCmpOp::Olt)),
            "fcmp_ole" => BuiltinOp::Binary(FCmp(FCmpOp::Ole)),
            "fcmp_one" => BuiltinOp::Binary(FCmp(FCmpOp::One)),
            "fcmp_ord" => BuiltinOp::Binary(FCmp(FCmpOp::Ord)),
            "fcmp_ueq" => BuiltinOp::Binary(FCmp(FCmpOp::Ueq)),
            "fcmp_ugt" => BuiltinOp::Binary(FCmp(FCmpOp::Ugt)),
            "fcmp_uge" => BuiltinOp::Binary(FCmp(FCmpOp::Uge)),
            "fcmp_ult" => BuiltinOp::Binary(FCmp(FCmpOp::Ult)),
            "fcmp_ule" => BuiltinOp::Binary(FCmp(FCmpOp::Ule)),
            "fcmp_une" => BuiltinOp::Binary(FCmp(FCmpOp::Une)),
            "fcmp_uno" => BuiltinOp::Binary(FCmp(FCmpOp::Uno)),

            "add" => BuiltinOp::Arithmetic(ArithmeticOp::Add),
            "mul" => BuiltinOp::Arithmetic(ArithmeticOp::Mul),
            "sub" => BuiltinOp::Arithmetic(ArithmeticOp::Sub),
            _ => return None,
        };
        Some(op)
    }

    pub fn arity(self) -> usize {
        match self {
            BuiltinOp::Unary(_) => 1,
            BuiltinOp::Binary(_) | BuiltinOp::Arithmetic(_) => 2,
        }
    }
}

impl IrGenFunction<'_, '_> {
    /// Lower a call of the builtin `name` to a single IR operation.
    pub fn emit_builtin(&mut self, name: &str, arg: &Expr, result_ty: TypeId) -> RValue {
        let igm = self.igm;
        let result_info = igm.types().get(result_ty);
        assert!(
            !result_info.schema.is_aggregate(),
            "builtin `{name}` cannot produce an aggregate result"
        );
        let op = BuiltinOp::from_name(name)
            .unwrap_or_else(|| panic!("unknown builtin `{name}`"));

        let mut operands = Explosion::new(ExplosionKind::Maximal);
        self.emit_call_args(arg, &mut operands);
        assert_eq!(
            operands.len(),
            op.arity(),
            "builtin `{name}` takes {} operands, got {}",
            op.arity(),
            operands.len()
        );

        let o = Origin::synthetic;
        let b = &mut self.builder;
        let value = match op {
            BuiltinOp::Unary(op) => {
                let a = operands.claim_next();
                match op {
                    UnaryOp::Neg => b.neg(a, o()),
                    UnaryOp::Not => b.not(a, o()),
                }
            }
            BuiltinOp::Binary(op) => {
                let lhs = operands.claim_next();
                let rhs = operands.claim_next();
                match op {
                    BinaryOp::And => b.and(lhs, rhs, o()),
                    BinaryOp::Or => b.or(lhs, rhs, o()),
                    BinaryOp::Xor => b.xor(lhs, rhs, o()),
                    BinaryOp::FDiv => b.fdiv(lhs, rhs, o()),
                    BinaryOp::SDiv => b.sdiv(lhs, rhs, o()),
                    BinaryOp::UDiv => b.udiv(lhs, rhs, o()),
                    BinaryOp::SRem => b.srem(lhs, rhs, o()),
                    BinaryOp::URem => b.urem(lhs, rhs, o()),
                    BinaryOp::ExactSDiv => b.exact_sdiv(lhs, rhs, o()),
                    BinaryOp::ExactUDiv => b.exact_udiv(lhs, rhs, o()),
                    BinaryOp::ICmp(pred) => b.icmp(pred, lhs, rhs, o()),
                    BinaryOp::FCmp(pred) => b.fcmp(pred, lhs, rhs, o()),
                }
            }
            BuiltinOp::Arithmetic(op) => {
                let lhs = operands.claim_next();
                let rhs = operands.claim_next();
                let float = b.value_type(lhs).is_float();
                match (op, float) {
                    (ArithmeticOp::Add, true) => b.fadd(lhs, rhs, o()),
                    (ArithmeticOp::Add, false) => b.add(lhs, rhs, o()),
                    (ArithmeticOp::Mul, true) => b.fmul(lhs, rhs, o()),
                    (ArithmeticOp::Mul, false) => b.mul(lhs, rhs, o()),
                    (ArithmeticOp::Sub, true) => b.fsub(lhs, rhs, o()),
                    (ArithmeticOp::Sub, false) => b.sub(lhs, rhs, o()),
                }
            }
        };
        operands.finish("builtin operands");
        RValue::scalar(value)
    }
}
