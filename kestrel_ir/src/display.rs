//! Cranelift-style text format for kestrel IR.
//!
//! Output format:
//! ```text
//! func @add(i64, i64) -> i64 {
//!   bb0:
//!     v0 = param 0 : i64
//!     v1 = param 1 : i64
//!     v2 = add v0, v1
//!     ret v2
//! }
//! ```
//!
//! Values are numbered sequentially in layout order; instructions without a
//! result are printed without a `vN =` prefix.

use std::collections::HashMap;
use std::fmt;

use crate::function::Function;
use crate::instruction::{FCmpOp, ICmpOp, Op, PlaceholderReason};
use crate::module::{Module, SymbolId, SymbolTable};
use crate::types::{FloatType, ParamAttrs, Signature, Type};
use crate::value::{BlockRef, ValueRef};

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int(bits) => write!(f, "i{bits}"),
            Type::Float(FloatType::F32) => write!(f, "f32"),
            Type::Float(FloatType::F64) => write!(f, "f64"),
            Type::Ptr(0) => write!(f, "ptr"),
            Type::Ptr(space) => write!(f, "ptr({space})"),
            Type::Struct(elems) => {
                write!(f, "{{")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, "}}")
            }
            Type::Unit => write!(f, "unit"),
        }
    }
}

impl fmt::Display for ParamAttrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.contains(ParamAttrs::STRUCT_RET) {
            parts.push("sret");
        }
        if self.contains(ParamAttrs::NO_ALIAS) {
            parts.push("noalias");
        }
        write!(f, "{}", parts.join(" "))
    }
}

/// `ty` followed by the attributes at `index`, e.g. `ptr sret noalias`.
fn fmt_param(ty: &Type, attrs: ParamAttrs) -> String {
    if attrs.is_empty() {
        ty.to_string()
    } else {
        format!("{ty} {attrs}")
    }
}

fn fmt_params(params: &[Type], attrs: &[(u32, ParamAttrs)]) -> String {
    params
        .iter()
        .enumerate()
        .map(|(i, ty)| fmt_param(ty, attr_at(attrs, i as u32)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn attr_at(attrs: &[(u32, ParamAttrs)], index: u32) -> ParamAttrs {
    attrs
        .iter()
        .find(|(i, _)| *i == index)
        .map(|(_, a)| *a)
        .unwrap_or_default()
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn({})", fmt_params(&self.params, &self.attrs))?;
        if let Some(ret) = &self.ret {
            write!(f, " -> {ret}")?;
        }
        Ok(())
    }
}

fn fmt_icmp_op(op: ICmpOp) -> &'static str {
    match op {
        ICmpOp::Eq => "eq",
        ICmpOp::Ne => "ne",
        ICmpOp::Slt => "slt",
        ICmpOp::Sle => "sle",
        ICmpOp::Sgt => "sgt",
        ICmpOp::Sge => "sge",
        ICmpOp::Ult => "ult",
        ICmpOp::Ule => "ule",
        ICmpOp::Ugt => "ugt",
        ICmpOp::Uge => "uge",
    }
}

fn fmt_fcmp_op(op: FCmpOp) -> &'static str {
    match op {
        FCmpOp::Oeq => "oeq",
        FCmpOp::Ogt => "ogt",
        FCmpOp::Oge => "oge",
        FCmpOp::Olt => "olt",
        FCmpOp::Ole => "ole",
        FCmpOp::One => "one",
        FCmpOp::Ord => "ord",
        FCmpOp::Ueq => "ueq",
        FCmpOp::Ugt => "ugt",
        FCmpOp::Uge => "uge",
        FCmpOp::Ult => "ult",
        FCmpOp::Ule => "ule",
        FCmpOp::Une => "une",
        FCmpOp::Uno => "uno",
    }
}

fn fmt_placeholder(reason: PlaceholderReason) -> &'static str {
    match reason {
        PlaceholderReason::LocalFunction => "local_function",
    }
}

/// Display context that tracks value numbering.
struct DisplayCtx<'a> {
    value_names: HashMap<u32, u32>,
    symbols: Option<&'a SymbolTable>,
}

impl<'a> DisplayCtx<'a> {
    /// Number every live value-producing instruction in layout order.
    fn new(func: &Function, symbols: Option<&'a SymbolTable>) -> Self {
        let mut value_names = HashMap::new();
        let mut next = 0;
        for (_, iref, inst) in func.live_insts() {
            if !inst.ty.is_unit() {
                value_names.insert(iref.index(), next);
                next += 1;
            }
        }
        Self {
            value_names,
            symbols,
        }
    }

    /// Format a value as "vN". Values not in a live block print as "v?N".
    fn fmt_val(&self, v: ValueRef) -> String {
        match self.value_names.get(&v.index()) {
            Some(n) => format!("v{n}"),
            None => format!("v?{}", v.index()),
        }
    }

    fn fmt_vals(&self, vals: &[ValueRef]) -> String {
        vals.iter()
            .map(|v| self.fmt_val(*v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn fmt_sym(&self, sym: SymbolId) -> String {
        match self.symbols {
            Some(table) => format!("@{}", table.resolve(sym)),
            None => format!("@{}", sym.0),
        }
    }
}

fn fmt_block(b: BlockRef) -> String {
    format!("bb{}", b.index())
}

/// Format a single instruction (without leading indent).
fn fmt_inst(func: &Function, vref: ValueRef, ctx: &DisplayCtx<'_>) -> String {
    let inst = func.inst(vref.inst());
    let ty = &inst.ty;
    let body = match &inst.op {
        Op::Param(idx) => format!("param {idx} : {ty}"),
        Op::Const(imm) => format!("iconst {imm} : {ty}"),
        Op::FConst(imm) => format!("fconst {imm:?} : {ty}"),
        Op::Undef => format!("undef : {ty}"),
        Op::Placeholder(reason) => format!("placeholder {} : {ty}", fmt_placeholder(*reason)),
        Op::Add(a, b) => format!("add {}, {}", ctx.fmt_val(*a), ctx.fmt_val(*b)),
        Op::Sub(a, b) => format!("sub {}, {}", ctx.fmt_val(*a), ctx.fmt_val(*b)),
        Op::Mul(a, b) => format!("mul {}, {}", ctx.fmt_val(*a), ctx.fmt_val(*b)),
        Op::Neg(a) => format!("neg {}", ctx.fmt_val(*a)),
        Op::Not(a) => format!("not {}", ctx.fmt_val(*a)),
        Op::And(a, b) => format!("and {}, {}", ctx.fmt_val(*a), ctx.fmt_val(*b)),
        Op::Or(a, b) => format!("or {}, {}", ctx.fmt_val(*a), ctx.fmt_val(*b)),
        Op::Xor(a, b) => format!("xor {}, {}", ctx.fmt_val(*a), ctx.fmt_val(*b)),
        Op::SDiv(a, b) => format!("sdiv {}, {}", ctx.fmt_val(*a), ctx.fmt_val(*b)),
        Op::UDiv(a, b) => format!("udiv {}, {}", ctx.fmt_val(*a), ctx.fmt_val(*b)),
        Op::SRem(a, b) => format!("srem {}, {}", ctx.fmt_val(*a), ctx.fmt_val(*b)),
        Op::URem(a, b) => format!("urem {}, {}", ctx.fmt_val(*a), ctx.fmt_val(*b)),
        Op::ExactSDiv(a, b) => format!("sdiv.exact {}, {}", ctx.fmt_val(*a), ctx.fmt_val(*b)),
        Op::ExactUDiv(a, b) => format!("udiv.exact {}, {}", ctx.fmt_val(*a), ctx.fmt_val(*b)),
        Op::FAdd(a, b) => format!("fadd {}, {}", ctx.fmt_val(*a), ctx.fmt_val(*b)),
        Op::FSub(a, b) => format!("fsub {}, {}", ctx.fmt_val(*a), ctx.fmt_val(*b)),
        Op::FMul(a, b) => format!("fmul {}, {}", ctx.fmt_val(*a), ctx.fmt_val(*b)),
        Op::FDiv(a, b) => format!("fdiv {}, {}", ctx.fmt_val(*a), ctx.fmt_val(*b)),
        Op::ICmp(op, a, b) => format!(
            "icmp.{} {}, {}",
            fmt_icmp_op(*op),
            ctx.fmt_val(*a),
            ctx.fmt_val(*b)
        ),
        Op::FCmp(op, a, b) => format!(
            "fcmp.{} {}, {}",
            fmt_fcmp_op(*op),
            ctx.fmt_val(*a),
            ctx.fmt_val(*b)
        ),
        Op::StackSlot { ty, align } => format!("stack_slot {ty}, align {align}"),
        Op::Load { ptr, align } => format!("load {}, align {align} : {ty}", ctx.fmt_val(*ptr)),
        Op::Store { value, ptr, align } => format!(
            "store {}, {}, align {align}",
            ctx.fmt_val(*value),
            ctx.fmt_val(*ptr)
        ),
        Op::FieldAddr {
            ptr,
            aggregate,
            index,
        } => format!("fieldaddr {}, {aggregate}, {index}", ctx.fmt_val(*ptr)),
        Op::ExtractValue(agg, index) => format!("extractvalue {}, {index}", ctx.fmt_val(*agg)),
        Op::InsertValue(agg, val, index) => format!(
            "insertvalue {}, {}, {index}",
            ctx.fmt_val(*agg),
            ctx.fmt_val(*val)
        ),
        Op::SymbolAddr(sym) => format!("symbol_addr {}", ctx.fmt_sym(*sym)),
        Op::FnCast(code, sig) => format!("fn_cast {} to {sig}", ctx.fmt_val(*code)),
        Op::Call {
            callee,
            args,
            attrs,
            ..
        } => {
            let args = args
                .iter()
                .enumerate()
                .map(|(i, a)| {
                    let attr = attr_at(attrs, i as u32);
                    if attr.is_empty() {
                        ctx.fmt_val(*a)
                    } else {
                        format!("{} {attr}", ctx.fmt_val(*a))
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("call {}({args})", ctx.fmt_val(*callee))
        }
        Op::AllocaPoint => "alloca_point".to_string(),
        Op::Ret(Some(v)) => format!("ret {}", ctx.fmt_val(*v)),
        Op::Ret(None) => "ret".to_string(),
        Op::Br(target) => format!("br {}", fmt_block(*target)),
        Op::BrIf(cond, then_bb, else_bb) => format!(
            "brif {}, {}, {}",
            ctx.fmt_val(*cond),
            fmt_block(*then_bb),
            fmt_block(*else_bb)
        ),
        Op::Unreachable => "unreachable".to_string(),
    };
    if ty.is_unit() {
        body
    } else {
        format!("{} = {body}", ctx.fmt_val(vref))
    }
}

fn write_function(
    f: &mut fmt::Formatter<'_>,
    func: &Function,
    symbols: Option<&SymbolTable>,
) -> fmt::Result {
    let ctx = DisplayCtx::new(func, symbols);

    write!(
        f,
        "func {}({})",
        ctx.fmt_sym(func.name),
        fmt_params(&func.params, &func.param_attrs)
    )?;
    if let Some(ret_ty) = &func.ret_ty {
        write!(f, " -> {ret_ty}")?;
    }
    writeln!(f, " {{")?;

    for &bref in &func.layout {
        writeln!(f, "  {}:", fmt_block(bref))?;
        for (iref, _) in func.block_insts(bref) {
            writeln!(f, "    {}", fmt_inst(func, iref.result(), &ctx))?;
        }
    }

    write!(f, "}}")
}

/// A function paired with the symbol table its names resolve through.
pub struct FunctionDisplay<'a> {
    func: &'a Function,
    symbols: &'a SymbolTable,
}

impl Function {
    /// Display with symbol names resolved through `symbols`.
    pub fn display<'a>(&'a self, symbols: &'a SymbolTable) -> FunctionDisplay<'a> {
        FunctionDisplay {
            func: self,
            symbols,
        }
    }
}

impl fmt::Display for FunctionDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_function(f, self.func, Some(self.symbols))
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_function(f, self, None)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, func) in self.functions.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
                writeln!(f)?;
            }
            write_function(f, func, Some(&self.symbols))?;
        }
        Ok(())
    }
}
