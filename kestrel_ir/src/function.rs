//! Function and basic block definitions.
//!
//! Instructions live in a per-function arena. Each basic block owns the
//! ordered list of instructions placed in it, so instructions can be
//! inserted into any block at any time (e.g. local storage hoisted into the
//! entry block while the body is being emitted). Erasing only unlinks an
//! instruction or block; arena indices stay stable.

use crate::instruction::{Instruction, Op};
use crate::module::SymbolId;
use crate::types::{ParamAttrs, Signature, Type};
use crate::value::{BlockRef, InstRef, ValueRef};

/// A basic block containing a sequence of instructions.
#[derive(Debug, Default)]
pub struct BasicBlock {
    pub insts: Vec<InstRef>,
    /// Erased blocks are kept in the arena but are no longer in the layout.
    pub erased: bool,
}

/// A function in the kestrel IR.
#[derive(Debug)]
pub struct Function {
    pub name: SymbolId,
    pub params: Vec<Type>,
    /// Positional parameter attributes, e.g. the struct-return slot.
    pub param_attrs: Vec<(u32, ParamAttrs)>,
    /// `None` is a void return.
    pub ret_ty: Option<Type>,
    /// Instruction arena.
    pub instructions: Vec<Instruction>,
    /// Block arena.
    pub blocks: Vec<BasicBlock>,
    /// Live blocks in emission order. The first one is the entry block.
    pub layout: Vec<BlockRef>,
}

impl Function {
    pub fn new(name: SymbolId, params: Vec<Type>, ret_ty: Option<Type>) -> Self {
        Self {
            name,
            params,
            param_attrs: Vec::new(),
            ret_ty,
            instructions: Vec::new(),
            blocks: Vec::new(),
            layout: Vec::new(),
        }
    }

    /// Create an empty function whose ABI matches `sig` exactly.
    pub fn from_signature(name: SymbolId, sig: &Signature) -> Self {
        let mut func = Self::new(name, sig.params.clone(), sig.ret.clone());
        func.param_attrs = sig.attrs.clone();
        func
    }

    /// The signature callers must use to call this function.
    pub fn signature(&self) -> Signature {
        Signature {
            params: self.params.clone(),
            ret: self.ret_ty.clone(),
            attrs: self.param_attrs.clone(),
        }
    }

    /// Get an instruction by reference.
    pub fn inst(&self, r: InstRef) -> &Instruction {
        &self.instructions[r.index() as usize]
    }

    /// Get a basic block by reference.
    pub fn block(&self, r: BlockRef) -> &BasicBlock {
        &self.blocks[r.index() as usize]
    }

    /// Reference to the entry block, if any block has been laid out.
    pub fn entry_block(&self) -> Option<BlockRef> {
        self.layout.first().copied()
    }

    pub fn is_live_block(&self, r: BlockRef) -> bool {
        self.blocks
            .get(r.index() as usize)
            .is_some_and(|bb| !bb.erased)
    }

    /// Iterate (InstRef, &Instruction) pairs in a basic block.
    pub fn block_insts(&self, r: BlockRef) -> impl Iterator<Item = (InstRef, &Instruction)> {
        self.block(r)
            .insts
            .iter()
            .map(move |&i| (i, self.inst(i)))
    }

    /// The last instruction of `r` if it is a terminator.
    pub fn terminator(&self, r: BlockRef) -> Option<(InstRef, &Instruction)> {
        let last = *self.block(r).insts.last()?;
        let inst = self.inst(last);
        inst.op.is_terminator().then_some((last, inst))
    }

    /// Block that currently contains instruction `r`.
    pub fn inst_block(&self, r: InstRef) -> Option<BlockRef> {
        self.layout
            .iter()
            .copied()
            .find(|&b| self.block(b).insts.contains(&r))
    }

    /// Every branch in a live block targeting `target`, as
    /// `(predecessor block, branch instruction)`. A conditional branch with
    /// both edges to `target` is listed once per edge.
    pub fn predecessors(&self, target: BlockRef) -> Vec<(BlockRef, InstRef)> {
        let mut preds = Vec::new();
        for &b in &self.layout {
            for (iref, inst) in self.block_insts(b) {
                for succ in inst.op.successors() {
                    if succ == target {
                        preds.push((b, iref));
                    }
                }
            }
        }
        preds
    }

    /// Number of incoming edges to `target`.
    pub fn use_count(&self, target: BlockRef) -> usize {
        self.predecessors(target).len()
    }

    /// Get the type of a value.
    pub fn value_type(&self, v: ValueRef) -> &Type {
        &self.inst(v.inst()).ty
    }

    /// Whether `v` is statically known to be `undef`.
    pub fn is_undef(&self, v: ValueRef) -> bool {
        matches!(self.inst(v.inst()).op, Op::Undef)
    }

    /// Whether `v` is an unsupported-feature placeholder.
    pub fn is_placeholder(&self, v: ValueRef) -> bool {
        matches!(self.inst(v.inst()).op, Op::Placeholder(_))
    }

    /// All instructions in live blocks, in layout order.
    pub fn live_insts(&self) -> impl Iterator<Item = (BlockRef, InstRef, &Instruction)> {
        self.layout.iter().flat_map(move |&b| {
            self.block_insts(b).map(move |(i, inst)| (b, i, inst))
        })
    }
}
