//! IR verifier: structural integrity and type-safety checks.
//!
//! Collects all errors rather than stopping at the first one.
//! Entry points: `Module::verify()` and `Function::verify()`.

use std::collections::HashSet;
use std::fmt;

use crate::function::Function;
use crate::instruction::{Instruction, Op};
use crate::module::{Module, SymbolTable};
use crate::types::Type;
use crate::value::{BlockRef, ValueRef};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Location context for a verification error.
#[derive(Debug, Clone)]
pub enum Location {
    Function(String),
    Block(String, u32),
    Instruction(String, u32, u32),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Function(name) => write!(f, "func @{name}"),
            Location::Block(name, bi) => write!(f, "func @{name}, bb{bi}"),
            Location::Instruction(name, bi, ii) => {
                write!(f, "func @{name}, bb{bi}, inst {ii}")
            }
        }
    }
}

/// A single verification error.
#[derive(Debug, Clone)]
pub struct VerifyError {
    pub location: Location,
    pub message: String,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.location, self.message)
    }
}

/// Collected verification results.
#[derive(Debug, Default)]
pub struct VerifyResult {
    pub errors: Vec<VerifyError>,
}

impl VerifyResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, location: Location, message: impl Into<String>) {
        self.errors.push(VerifyError {
            location,
            message: message.into(),
        });
    }
}

impl fmt::Display for VerifyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "verification passed");
        }
        writeln!(
            f,
            "verification failed with {} error(s):",
            self.errors.len()
        )?;
        for e in &self.errors {
            writeln!(f, "  {e}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Per-function verification context
// ---------------------------------------------------------------------------

struct FuncVerifier<'a> {
    func: &'a Function,
    func_name: String,
    /// Instructions placed in live blocks.
    live: HashSet<u32>,
    result: &'a mut VerifyResult,
}

impl<'a> FuncVerifier<'a> {
    fn new(func: &'a Function, func_name: String, result: &'a mut VerifyResult) -> Self {
        let live = func.live_insts().map(|(_, i, _)| i.index()).collect();
        Self {
            func,
            func_name,
            live,
            result,
        }
    }

    fn func_loc(&self) -> Location {
        Location::Function(self.func_name.clone())
    }

    fn block_loc(&self, b: BlockRef) -> Location {
        Location::Block(self.func_name.clone(), b.index())
    }

    fn inst_loc(&self, b: BlockRef, ii: u32) -> Location {
        Location::Instruction(self.func_name.clone(), b.index(), ii)
    }

    fn check_operand(&mut self, v: ValueRef, loc: &Location) {
        if (v.index() as usize) >= self.func.instructions.len() {
            self.result
                .error(loc.clone(), format!("dangling value reference v{}", v.index()));
        } else if !self.live.contains(&v.index()) {
            self.result.error(
                loc.clone(),
                format!("use of value v{} from an erased instruction", v.index()),
            );
        } else if self.func.value_type(v).is_unit() {
            self.result
                .error(loc.clone(), format!("use of v{} which has no value", v.index()));
        }
    }

    fn value_type(&self, v: ValueRef) -> Option<&Type> {
        self.func
            .instructions
            .get(v.index() as usize)
            .map(|i| &i.ty)
    }

    fn expect_type(&mut self, v: ValueRef, expected: &Type, ctx: &str, loc: &Location) {
        if let Some(ty) = self.value_type(v) {
            if ty != expected {
                self.result
                    .error(loc.clone(), format!("{ctx}: expected {expected}, got {ty}"));
            }
        }
    }

    fn expect_ptr(&mut self, v: ValueRef, ctx: &str, loc: &Location) {
        if let Some(ty) = self.value_type(v) {
            if !ty.is_ptr() {
                self.result
                    .error(loc.clone(), format!("{ctx}: expected ptr, got {ty}"));
            }
        }
    }

    fn expect_int(&mut self, v: ValueRef, ctx: &str, loc: &Location) {
        if let Some(ty) = self.value_type(v) {
            if !ty.is_int() {
                self.result
                    .error(loc.clone(), format!("{ctx}: expected integer, got {ty}"));
            }
        }
    }

    fn expect_float(&mut self, v: ValueRef, ctx: &str, loc: &Location) {
        if let Some(ty) = self.value_type(v) {
            if !ty.is_float() {
                self.result
                    .error(loc.clone(), format!("{ctx}: expected float, got {ty}"));
            }
        }
    }

    fn expect_same_type(&mut self, a: ValueRef, b: ValueRef, ctx: &str, loc: &Location) {
        if let (Some(ta), Some(tb)) = (self.value_type(a), self.value_type(b)) {
            if ta != tb {
                self.result
                    .error(loc.clone(), format!("{ctx}: type mismatch {ta} vs {tb}"));
            }
        }
    }

    fn check_branch_target(&mut self, target: BlockRef, loc: &Location) {
        if !self.func.is_live_block(target) {
            self.result.error(
                loc.clone(),
                format!("branch target bb{} is not a live block", target.index()),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Instruction-level type checking
// ---------------------------------------------------------------------------

impl FuncVerifier<'_> {
    fn verify_instruction(&mut self, inst: &Instruction, b: BlockRef, ii: u32) {
        let func = self.func;
        let loc = self.inst_loc(b, ii);

        for v in inst.op.operands() {
            self.check_operand(v, &loc);
        }

        match &inst.op {
            Op::Param(idx) => match func.params.get(*idx as usize) {
                None => self.result.error(
                    loc,
                    format!(
                        "param index {} out of bounds ({} params)",
                        idx,
                        func.params.len()
                    ),
                ),
                Some(declared) if *declared != inst.ty => self.result.error(
                    loc,
                    format!("param {} type {} != declared {}", idx, inst.ty, declared),
                ),
                Some(_) => {}
            },
            Op::Const(_) => {
                if !inst.ty.is_int() {
                    self.result
                        .error(loc, format!("iconst of non-integer type {}", inst.ty));
                }
            }
            Op::FConst(_) => {
                if !inst.ty.is_float() {
                    self.result
                        .error(loc, format!("fconst of non-float type {}", inst.ty));
                }
            }
            Op::Undef | Op::Placeholder(_) => {}
            Op::Neg(a) | Op::Not(a) => self.expect_int(*a, "unary operand", &loc),
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
            | Op::ExactUDiv(a, b) => {
                self.expect_int(*a, "integer lhs", &loc);
                self.expect_same_type(*a, *b, "integer operands", &loc);
            }
            Op::FAdd(a, b) | Op::FSub(a, b) | Op::FMul(a, b) | Op::FDiv(a, b) => {
                self.expect_float(*a, "float lhs", &loc);
                self.expect_same_type(*a, *b, "float operands", &loc);
            }
            Op::ICmp(_, a, b) => self.expect_same_type(*a, *b, "icmp operands", &loc),
            Op::FCmp(_, a, b) => {
                self.expect_float(*a, "fcmp lhs", &loc);
                self.expect_same_type(*a, *b, "fcmp operands", &loc);
            }
            Op::StackSlot { align, .. } => {
                if !align.is_power_of_two() {
                    self.result
                        .error(loc, format!("stack_slot alignment {align} is not a power of two"));
                }
            }
            Op::Load { ptr, .. } => {
                self.expect_ptr(*ptr, "load address", &loc);
                if inst.ty.is_unit() {
                    self.result.error(loc, "load of unit type");
                }
            }
            Op::Store { ptr, .. } => self.expect_ptr(*ptr, "store address", &loc),
            Op::FieldAddr {
                ptr,
                aggregate,
                index,
            } => {
                self.expect_ptr(*ptr, "fieldaddr base", &loc);
                let in_range = aggregate
                    .struct_elements()
                    .is_some_and(|elems| (*index as usize) < elems.len());
                if !in_range {
                    self.result.error(
                        loc,
                        format!("fieldaddr index {index} out of range for {aggregate}"),
                    );
                }
            }
            Op::ExtractValue(agg, index) | Op::InsertValue(agg, _, index) => {
                let in_range = self
                    .value_type(*agg)
                    .and_then(Type::struct_elements)
                    .is_some_and(|elems| (*index as usize) < elems.len());
                if !in_range {
                    self.result.error(
                        loc,
                        format!("aggregate index {index} out of range"),
                    );
                }
            }
            Op::SymbolAddr(_) => {}
            Op::FnCast(code, _) => self.expect_ptr(*code, "fn_cast operand", &loc),
            Op::Call {
                callee,
                args,
                sig,
                attrs,
            } => {
                self.expect_ptr(*callee, "callee", &loc);
                if args.len() != sig.params.len() {
                    self.result.error(
                        loc.clone(),
                        format!(
                            "call passes {} args, signature expects {}",
                            args.len(),
                            sig.params.len()
                        ),
                    );
                }
                for (i, (arg, param)) in args.iter().zip(&sig.params).enumerate() {
                    self.expect_type(*arg, param, &format!("call arg {i}"), &loc);
                }
                for (index, _) in attrs {
                    if (*index as usize) >= args.len() {
                        self.result.error(
                            loc.clone(),
                            format!("call attribute on missing argument {index}"),
                        );
                    }
                }
            }
            Op::AllocaPoint => {
                self.result
                    .error(loc, "alloca point marker left in finished function");
            }
            Op::Ret(val) => match (val, &func.ret_ty) {
                (None, None) => {}
                (Some(v), Some(ret_ty)) => self.expect_type(*v, ret_ty, "return value", &loc),
                (Some(_), None) => self.result.error(loc, "void function returns a value"),
                (None, Some(ret_ty)) => self
                    .result
                    .error(loc, format!("missing return value of type {ret_ty}")),
            },
            Op::Br(target) => self.check_branch_target(*target, &loc),
            Op::BrIf(cond, then_bb, else_bb) => {
                self.expect_type(*cond, &Type::I1, "branch condition", &loc);
                self.check_branch_target(*then_bb, &loc);
                self.check_branch_target(*else_bb, &loc);
            }
            Op::Unreachable => {}
        }
    }

    fn verify_block(&mut self, b: BlockRef) {
        let func = self.func;
        let insts = &func.block(b).insts;
        let Some(&last) = insts.last() else {
            self.result.error(self.block_loc(b), "empty basic block");
            return;
        };
        if !func.inst(last).op.is_terminator() {
            self.result
                .error(self.block_loc(b), "block does not end with a terminator");
        }
        for (ii, &iref) in insts.iter().enumerate() {
            let inst = func.inst(iref);
            if iref != last && inst.op.is_terminator() {
                self.result
                    .error(self.inst_loc(b, ii as u32), "terminator in the middle of a block");
            }
            self.verify_instruction(inst, b, ii as u32);
        }
    }

    fn verify(&mut self) {
        if self.func.layout.is_empty() {
            self.result.error(self.func_loc(), "function has no blocks");
            return;
        }
        let func = self.func;
        for &b in &func.layout {
            self.verify_block(b);
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

impl Function {
    /// Verify this function, resolving its name through `symbols`.
    pub fn verify(&self, symbols: &SymbolTable) -> VerifyResult {
        let mut result = VerifyResult::default();
        let name = symbols.resolve(self.name).to_string();
        FuncVerifier::new(self, name, &mut result).verify();
        result
    }
}

impl Module {
    /// Verify every function in the module.
    pub fn verify(&self) -> VerifyResult {
        let mut result = VerifyResult::default();
        for func in &self.functions {
            let name = self.symbols.resolve(func.name).to_string();
            FuncVerifier::new(func, name, &mut result).verify();
        }
        result
    }
}
