//! Builder API for constructing kestrel IR.
//!
//! The builder has a single current insertion point (the end of one block),
//! or none when the code being emitted is unreachable. Every instruction
//! constructor takes an `Origin`.

use num_bigint::BigInt;

use crate::function::{BasicBlock, Function};
use crate::instruction::{FCmpOp, ICmpOp, Instruction, Op, Origin, PlaceholderReason};
use crate::module::SymbolId;
use crate::types::{ParamAttrs, Signature, Type};
use crate::value::{BlockRef, InstRef, ValueRef};

/// Builder for constructing a function's IR.
pub struct Builder<'a> {
    func: &'a mut Function,
    current_block: Option<BlockRef>,
}

impl<'a> Builder<'a> {
    pub fn new(func: &'a mut Function) -> Self {
        Self {
            func,
            current_block: None,
        }
    }

    /// The function under construction.
    pub fn func(&self) -> &Function {
        &*self.func
    }

    /// Create a new basic block at the end of the layout.
    pub fn create_block(&mut self) -> BlockRef {
        let block = self.alloc_block();
        self.func.layout.push(block);
        block
    }

    /// Create a new basic block placed immediately before `anchor` in the layout.
    pub fn create_block_before(&mut self, anchor: BlockRef) -> BlockRef {
        let block = self.alloc_block();
        match self.func.layout.iter().position(|&b| b == anchor) {
            Some(pos) => self.func.layout.insert(pos, block),
            None => self.func.layout.push(block),
        }
        block
    }

    fn alloc_block(&mut self) -> BlockRef {
        let idx = self.func.blocks.len() as u32;
        self.func.blocks.push(BasicBlock::default());
        BlockRef(idx)
    }

    /// Set the current block for subsequent instructions.
    pub fn switch_to_block(&mut self, block: BlockRef) {
        assert!(
            self.func.is_live_block(block),
            "cannot insert into erased block bb{}",
            block.index()
        );
        self.current_block = Some(block);
    }

    /// Mark the current position as unreachable.
    pub fn clear_insertion_point(&mut self) {
        self.current_block = None;
    }

    pub fn current_block(&self) -> Option<BlockRef> {
        self.current_block
    }

    /// Whether code emitted now would be reachable.
    pub fn has_insertion_point(&self) -> bool {
        self.current_block.is_some()
    }

    fn alloc_inst(&mut self, op: Op, ty: Type, origin: Origin) -> InstRef {
        let idx = self.func.instructions.len() as u32;
        self.func.instructions.push(Instruction { op, ty, origin });
        InstRef(idx)
    }

    fn push_inst(&mut self, op: Op, ty: Type, origin: Origin) -> ValueRef {
        let block = self
            .current_block
            .expect("emitting an instruction without an insertion point");
        let inst = self.alloc_inst(op, ty, origin);
        self.func.blocks[block.index() as usize].insts.push(inst);
        inst.result()
    }

    /// Insert an instruction immediately before `anchor`, wherever it lives.
    /// The current insertion point is unchanged.
    pub fn insert_before(&mut self, anchor: InstRef, op: Op, ty: Type, origin: Origin) -> ValueRef {
        let block = self
            .func
            .inst_block(anchor)
            .expect("insertion anchor is not in a live block");
        let inst = self.alloc_inst(op, ty, origin);
        let insts = &mut self.func.blocks[block.index() as usize].insts;
        let pos = insts
            .iter()
            .position(|&i| i == anchor)
            .expect("anchor vanished from its block");
        insts.insert(pos, inst);
        inst.result()
    }

    /// Unlink an instruction from its block.
    pub fn erase_inst(&mut self, inst: InstRef) {
        if let Some(block) = self.func.inst_block(inst) {
            self.func.blocks[block.index() as usize]
                .insts
                .retain(|&i| i != inst);
        }
    }

    /// Remove a block from the layout. Its instructions die with it.
    pub fn erase_block(&mut self, block: BlockRef) {
        self.func.layout.retain(|&b| b != block);
        self.func.blocks[block.index() as usize].erased = true;
        if self.current_block == Some(block) {
            self.current_block = None;
        }
    }

    pub fn value_type(&self, v: ValueRef) -> &Type {
        self.func.value_type(v)
    }

    /// Create a function parameter reference.
    pub fn param(&mut self, index: u32, ty: Type, origin: Origin) -> ValueRef {
        self.push_inst(Op::Param(index), ty, origin)
    }

    /// Integer constant of the given type.
    pub fn iconst(&mut self, val: impl Into<BigInt>, ty: Type, origin: Origin) -> ValueRef {
        self.push_inst(Op::Const(val.into()), ty, origin)
    }

    /// Floating point constant of the given type.
    pub fn fconst(&mut self, val: f64, ty: Type, origin: Origin) -> ValueRef {
        self.push_inst(Op::FConst(val), ty, origin)
    }

    pub fn undef(&mut self, ty: Type, origin: Origin) -> ValueRef {
        self.push_inst(Op::Undef, ty, origin)
    }

    pub fn placeholder(&mut self, ty: Type, reason: PlaceholderReason, origin: Origin) -> ValueRef {
        self.push_inst(Op::Placeholder(reason), ty, origin)
    }

    fn binary(&mut self, op: Op, a: ValueRef, origin: Origin) -> ValueRef {
        let ty = self.value_type(a).clone();
        self.push_inst(op, ty, origin)
    }

    pub fn add(&mut self, a: ValueRef, b: ValueRef, origin: Origin) -> ValueRef {
        self.binary(Op::Add(a, b), a, origin)
    }

    pub fn sub(&mut self, a: ValueRef, b: ValueRef, origin: Origin) -> ValueRef {
        self.binary(Op::Sub(a, b), a, origin)
    }

    pub fn mul(&mut self, a: ValueRef, b: ValueRef, origin: Origin) -> ValueRef {
        self.binary(Op::Mul(a, b), a, origin)
    }

    pub fn neg(&mut self, a: ValueRef, origin: Origin) -> ValueRef {
        self.binary(Op::Neg(a), a, origin)
    }

    pub fn not(&mut self, a: ValueRef, origin: Origin) -> ValueRef {
        self.binary(Op::Not(a), a, origin)
    }

    pub fn and(&mut self, a: ValueRef, b: ValueRef, origin: Origin) -> ValueRef {
        self.binary(Op::And(a, b), a, origin)
    }

    pub fn or(&mut self, a: ValueRef, b: ValueRef, origin: Origin) -> ValueRef {
        self.binary(Op::Or(a, b), a, origin)
    }

    pub fn xor(&mut self, a: ValueRef, b: ValueRef, origin: Origin) -> ValueRef {
        self.binary(Op::Xor(a, b), a, origin)
    }

    pub fn sdiv(&mut self, a: ValueRef, b: ValueRef, origin: Origin) -> ValueRef {
        self.binary(Op::SDiv(a, b), a, origin)
    }

    pub fn udiv(&mut self, a: ValueRef, b: ValueRef, origin: Origin) -> ValueRef {
        self.binary(Op::UDiv(a, b), a, origin)
    }

    pub fn srem(&mut self, a: ValueRef, b: ValueRef, origin: Origin) -> ValueRef {
        self.binary(Op::SRem(a, b), a, origin)
    }

    pub fn urem(&mut self, a: ValueRef, b: ValueRef, origin: Origin) -> ValueRef {
        self.binary(Op::URem(a, b), a, origin)
    }

    pub fn exact_sdiv(&mut self, a: ValueRef, b: ValueRef, origin: Origin) -> ValueRef {
        self.binary(Op::ExactSDiv(a, b), a, origin)
    }

    pub fn exact_udiv(&mut self, a: ValueRef, b: ValueRef, origin: Origin) -> ValueRef {
        self.binary(Op::ExactUDiv(a, b), a, origin)
    }

    pub fn fadd(&mut self, a: ValueRef, b: ValueRef, origin: Origin) -> ValueRef {
        self.binary(Op::FAdd(a, b), a, origin)
    }

    pub fn fsub(&mut self, a: ValueRef, b: ValueRef, origin: Origin) -> ValueRef {
        self.binary(Op::FSub(a, b), a, origin)
    }

    pub fn fmul(&mut self, a: ValueRef, b: ValueRef, origin: Origin) -> ValueRef {
        self.binary(Op::FMul(a, b), a, origin)
    }

    pub fn fdiv(&mut self, a: ValueRef, b: ValueRef, origin: Origin) -> ValueRef {
        self.binary(Op::FDiv(a, b), a, origin)
    }

    /// Integer comparison. Returns i1.
    pub fn icmp(&mut self, op: ICmpOp, a: ValueRef, b: ValueRef, origin: Origin) -> ValueRef {
        self.push_inst(Op::ICmp(op, a, b), Type::I1, origin)
    }

    /// Floating point comparison. Returns i1.
    pub fn fcmp(&mut self, op: FCmpOp, a: ValueRef, b: ValueRef, origin: Origin) -> ValueRef {
        self.push_inst(Op::FCmp(op, a, b), Type::I1, origin)
    }

    /// Allocate a stack slot immediately before `anchor` (usually the
    /// function's alloca point).
    pub fn stack_slot_before(
        &mut self,
        anchor: InstRef,
        ty: Type,
        align: u64,
        origin: Origin,
    ) -> ValueRef {
        self.insert_before(anchor, Op::StackSlot { ty, align }, Type::PTR, origin)
    }

    /// Place the alloca-point marker at the current insertion point.
    pub fn alloca_point(&mut self, origin: Origin) -> InstRef {
        self.push_inst(Op::AllocaPoint, Type::Unit, origin).inst()
    }

    /// Load a value of type `ty` from `ptr`.
    pub fn load(&mut self, ptr: ValueRef, ty: Type, align: u64, origin: Origin) -> ValueRef {
        self.push_inst(Op::Load { ptr, align }, ty, origin)
    }

    /// Store `value` to `ptr`.
    pub fn store(&mut self, value: ValueRef, ptr: ValueRef, align: u64, origin: Origin) -> ValueRef {
        self.push_inst(Op::Store { value, ptr, align }, Type::Unit, origin)
    }

    /// Address of element `index` of a `aggregate` stored at `ptr`.
    pub fn field_addr(
        &mut self,
        ptr: ValueRef,
        aggregate: Type,
        index: u32,
        origin: Origin,
    ) -> ValueRef {
        self.push_inst(
            Op::FieldAddr {
                ptr,
                aggregate,
                index,
            },
            Type::PTR,
            origin,
        )
    }

    /// Read element `index` of the struct value `agg`.
    pub fn extract_value(&mut self, agg: ValueRef, index: u32, origin: Origin) -> ValueRef {
        let ty = self
            .value_type(agg)
            .struct_elements()
            .and_then(|elems| elems.get(index as usize))
            .cloned()
            .expect("extractvalue index out of range of a struct value");
        self.push_inst(Op::ExtractValue(agg, index), ty, origin)
    }

    /// Replace element `index` of the struct value `agg` with `val`.
    pub fn insert_value(&mut self, agg: ValueRef, val: ValueRef, index: u32, origin: Origin) -> ValueRef {
        let ty = self.value_type(agg).clone();
        self.push_inst(Op::InsertValue(agg, val, index), ty, origin)
    }

    /// Address of a function symbol.
    pub fn symbol_addr(&mut self, sym: SymbolId, origin: Origin) -> ValueRef {
        self.push_inst(Op::SymbolAddr(sym), Type::PTR, origin)
    }

    /// Reinterpret `code` as a pointer to a function of signature `sig`.
    pub fn fn_cast(&mut self, code: ValueRef, sig: Signature, origin: Origin) -> ValueRef {
        self.push_inst(Op::FnCast(code, Box::new(sig)), Type::PTR, origin)
    }

    /// Call `callee` with `args`. The result type is the signature's return
    /// type, or `unit` for a void call.
    pub fn call(
        &mut self,
        callee: ValueRef,
        args: Vec<ValueRef>,
        sig: Signature,
        attrs: Vec<(u32, ParamAttrs)>,
        origin: Origin,
    ) -> ValueRef {
        let ty = sig.ret.clone().unwrap_or(Type::Unit);
        self.push_inst(
            Op::Call {
                callee,
                args,
                sig: Box::new(sig),
                attrs,
            },
            ty,
            origin,
        )
    }

    /// Return from function.
    pub fn ret(&mut self, val: Option<ValueRef>, origin: Origin) -> ValueRef {
        self.push_inst(Op::Ret(val), Type::Unit, origin)
    }

    /// Unconditional branch.
    pub fn br(&mut self, target: BlockRef, origin: Origin) -> ValueRef {
        self.push_inst(Op::Br(target), Type::Unit, origin)
    }

    /// Conditional branch.
    pub fn brif(
        &mut self,
        cond: ValueRef,
        then_block: BlockRef,
        else_block: BlockRef,
        origin: Origin,
    ) -> ValueRef {
        self.push_inst(Op::BrIf(cond, then_block, else_block), Type::Unit, origin)
    }

    pub fn unreachable(&mut self, origin: Origin) -> ValueRef {
        self.push_inst(Op::Unreachable, Type::Unit, origin)
    }
}
