//! Per-function lowering state, prologue and epilogue.
//!
//! Every function is emitted as prologue, body, epilogue. The prologue binds
//! incoming arguments to parameter storage and decides where the result
//! lives. The body branches to a single return block whenever it returns.
//! The epilogue places that block and emits the actual return.

use kestrel_ir::builder::Builder;
use kestrel_ir::function::Function;
use kestrel_ir::instruction::{Op, Origin};
use kestrel_ir::types::Type;
use kestrel_ir::value::{BlockRef, InstRef};
use tracing::trace;

use crate::ast::{FuncDecl, TypeId};
use crate::explosion::{Explosion, ExplosionKind};
use crate::irgen_module::IrGenModule;
use crate::rvalue::{Address, RValue};
use crate::schema::Schema;

/// Where the function's result is kept until it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnSlot {
    /// Nothing to return.
    None,
    /// Caller-provided memory, passed as argument 0.
    Indirect(Address),
    /// Local slot loaded by the epilogue and returned directly.
    Local(Address),
}

/// How the epilogue resolves the return block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnBlockPlacement {
    /// Nothing branches to the return block. It is erased and the return
    /// is emitted at the current position, if that is reachable.
    Discard,
    /// The current position falls through into the return block.
    Fallthrough,
    /// A single unconditional branch reaches the return block. The branch
    /// is removed and the return emitted at the end of its block.
    MergeIntoPredecessor { block: BlockRef, branch: InstRef },
    /// Several edges reach the return block; it stays as is.
    Shared,
}

pub struct IrGenFunction<'a, 'p> {
    pub(crate) igm: &'a IrGenModule<'p>,
    pub(crate) builder: Builder<'a>,
    pub(crate) decl: &'p FuncDecl,
    alloca_point: Option<InstRef>,
    return_block: Option<BlockRef>,
    return_slot: ReturnSlot,
    /// Storage of each formal parameter.
    params: Vec<Address>,
}

impl<'a, 'p> IrGenFunction<'a, 'p> {
    pub fn new(igm: &'a IrGenModule<'p>, func: &'a mut Function, decl: &'p FuncDecl) -> Self {
        Self {
            igm,
            builder: Builder::new(func),
            decl,
            alloca_point: None,
            return_block: None,
            return_slot: ReturnSlot::None,
            params: Vec::new(),
        }
    }

    pub fn builder(&mut self) -> &mut Builder<'a> {
        &mut self.builder
    }

    pub fn func(&self) -> &Function {
        self.builder.func()
    }

    pub fn return_slot(&self) -> ReturnSlot {
        self.return_slot
    }

    pub fn return_block(&self) -> BlockRef {
        match self.return_block {
            Some(block) => block,
            None => panic!("return block requested before the prologue of `{}`", self.decl.name),
        }
    }

    pub fn param_address(&self, index: usize) -> Address {
        self.params[index]
    }

    fn alloca_point(&self) -> InstRef {
        match self.alloca_point {
            Some(point) => point,
            None => panic!("local storage requested outside the body of `{}`", self.decl.name),
        }
    }

    /// Allocate function-scoped stack storage in the entry block.
    pub fn create_stack_slot(&mut self, ty: Type, align: u64) -> Address {
        let point = self.alloca_point();
        let slot = self
            .builder
            .stack_slot_before(point, ty, align, Origin::synthetic());
        Address::new(slot, align)
    }

    /// Reassemble one value of source type `ty` claimed from `src`.
    pub fn implode(&mut self, ty: TypeId, src: &mut Explosion) -> RValue {
        let igm = self.igm;
        let point = self.alloca_point();
        igm.types().get(ty).implode(&mut self.builder, point, src)
    }

    pub fn emit_prologue(&mut self) {
        let igm = self.igm;
        let types = igm.types();
        let origin = Origin::synthetic();

        let entry = self.builder.create_block();
        self.builder.switch_to_block(entry);

        let param_types = self.builder.func().params.clone();
        let mut incoming = Explosion::new(ExplosionKind::Minimal);
        for (i, ty) in param_types.into_iter().enumerate() {
            let v = self.builder.param(i as u32, ty, origin.clone());
            incoming.add(v);
        }

        self.alloca_point = Some(self.builder.alloca_point(origin));
        self.return_block = Some(self.builder.create_block());

        let decl = self.decl;
        let result_info = types.get(types.get(decl.ty).as_function().result());
        self.return_slot = match &result_info.schema {
            Schema::Aggregate { align, .. } => ReturnSlot::Indirect(self.claim_incoming_address(
                &mut incoming,
                *align,
                "the indirect result",
            )),
            Schema::Scalars(scalars) if scalars.is_empty() => ReturnSlot::None,
            Schema::Scalars(_) => ReturnSlot::Local(
                self.create_stack_slot(result_info.storage_type.clone(), result_info.align),
            ),
        };

        for param in &decl.params {
            let info = types.get(param.ty);
            let addr = match &info.schema {
                Schema::Aggregate { align, .. } => self.claim_incoming_address(
                    &mut incoming,
                    *align,
                    &format!("parameter `{}`", param.name),
                ),
                Schema::Scalars(scalars) => {
                    let slot = self.create_stack_slot(info.storage_type.clone(), info.align);
                    let value = RValue::claim(&info.schema, &mut incoming);
                    for (v, expected) in value.scalar_values().iter().zip(scalars) {
                        let actual = self.builder.value_type(*v);
                        assert!(
                            actual == expected,
                            "incoming argument of `{}` has type {actual}, parameter `{}` expects {expected}",
                            decl.name,
                            param.name
                        );
                    }
                    info.store_rvalue(&mut self.builder, value, slot);
                    slot
                }
            };
            self.params.push(addr);
        }

        incoming.finish("function prologue");
    }

    /// Claim the next incoming argument as the address of `what`.
    fn claim_incoming_address(&self, incoming: &mut Explosion, align: u64, what: &str) -> Address {
        let addr = incoming.claim_next();
        let actual = self.builder.value_type(addr);
        assert!(
            actual.is_ptr(),
            "incoming argument of `{}` has type {actual}, {what} expects ptr",
            self.decl.name
        );
        Address::new(addr, align)
    }

    /// Decide how the return block is placed. Does not modify the function.
    pub fn classify_return_block(&self) -> ReturnBlockPlacement {
        let func = self.builder.func();
        let preds = func.predecessors(self.return_block());
        match preds.as_slice() {
            [] => ReturnBlockPlacement::Discard,
            _ if self.builder.has_insertion_point() => ReturnBlockPlacement::Fallthrough,
            [(block, branch)] if matches!(func.inst(*branch).op, Op::Br(_)) => {
                ReturnBlockPlacement::MergeIntoPredecessor {
                    block: *block,
                    branch: *branch,
                }
            }
            _ => ReturnBlockPlacement::Shared,
        }
    }

    pub fn emit_epilogue(&mut self) {
        let return_block = self.return_block();
        let placement = self.classify_return_block();
        trace!(function = %self.decl.name, ?placement, "placing return block");

        match placement {
            ReturnBlockPlacement::Discard => self.builder.erase_block(return_block),
            ReturnBlockPlacement::Fallthrough => {
                self.builder.br(return_block, Origin::synthetic());
                self.builder.switch_to_block(return_block);
            }
            ReturnBlockPlacement::MergeIntoPredecessor { block, branch } => {
                self.builder.erase_inst(branch);
                self.builder.erase_block(return_block);
                self.builder.switch_to_block(block);
            }
            ReturnBlockPlacement::Shared => self.builder.switch_to_block(return_block),
        }

        if self.builder.has_insertion_point() {
            self.emit_return();
        }

        let point = self.alloca_point();
        self.builder.erase_inst(point);
        self.alloca_point = None;
    }

    fn emit_return(&mut self) {
        let origin = Origin::synthetic();
        let slot = match self.return_slot {
            ReturnSlot::None | ReturnSlot::Indirect(_) => {
                self.builder.ret(None, origin);
                return;
            }
            ReturnSlot::Local(slot) => slot,
        };

        let igm = self.igm;
        let types = igm.types();
        let info = types.get(types.get(self.decl.ty).as_function().result());
        let value = info.load_rvalue(&mut self.builder, slot);
        match value.scalar_values() {
            [single] => {
                self.builder.ret(Some(*single), origin);
            }
            values => {
                let Some(ret_ty) = info.schema.direct_return_type() else {
                    panic!("local return slot for a result without a direct return type");
                };
                let mut agg = self.builder.undef(ret_ty, origin.clone());
                for (i, v) in values.iter().enumerate() {
                    agg = self.builder.insert_value(agg, *v, i as u32, origin.clone());
                }
                self.builder.ret(Some(agg), origin);
            }
        }
    }
}
