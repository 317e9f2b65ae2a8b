//! Lowering of the statements and expressions a function body is made of.

use kestrel_ir::instruction::Origin;
use kestrel_ir::types::Type;
use tracing::trace;

use crate::ast::{Expr, ExprKind, Stmt};
use crate::explosion::{Explosion, ExplosionKind};
use crate::irgen_function::{IrGenFunction, ReturnSlot};
use crate::rvalue::RValue;
use crate::schema::Schema;

impl IrGenFunction<'_, '_> {
    /// Emit a statement list. Statements after the insertion point has been
    /// cleared (e.g. following a `return`) are unreachable and skipped.
    pub fn emit_body(&mut self, body: &[Stmt]) {
        for (i, stmt) in body.iter().enumerate() {
            if !self.builder.has_insertion_point() {
                trace!(
                    function = %self.decl.name,
                    skipped = body.len() - i,
                    "dropping unreachable statements"
                );
                return;
            }
            self.emit_stmt(stmt);
        }
    }

    pub fn emit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(expr) => {
                self.emit_rvalue(expr);
            }
            Stmt::Return(value) => self.emit_return_stmt(value.as_ref()),
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => self.emit_if(cond, then_body, else_body),
        }
    }

    /// Store the returned value into the return slot and branch to the
    /// return block.
    fn emit_return_stmt(&mut self, value: Option<&Expr>) {
        if let Some(expr) = value {
            let igm = self.igm;
            let rv = self.emit_rvalue(expr);
            match self.return_slot() {
                ReturnSlot::Indirect(slot) | ReturnSlot::Local(slot) => {
                    igm.types()
                        .get(expr.ty)
                        .store_rvalue(&mut self.builder, rv, slot);
                }
                ReturnSlot::None => {}
            }
        }
        let return_block = self.return_block();
        self.builder.br(return_block, Origin::synthetic());
        self.builder.clear_insertion_point();
    }

    fn emit_if(&mut self, cond: &Expr, then_body: &[Stmt], else_body: &[Stmt]) {
        let cond = match self.emit_rvalue(cond).scalar_values() {
            [c] => *c,
            values => panic!("branch condition exploded to {} values", values.len()),
        };

        let return_block = self.return_block();
        let then_bb = self.builder.create_block_before(return_block);
        let else_bb = self.builder.create_block_before(return_block);
        let cont_bb = self.builder.create_block_before(return_block);
        self.builder
            .brif(cond, then_bb, else_bb, Origin::synthetic());

        for (block, body) in [(then_bb, then_body), (else_bb, else_body)] {
            self.builder.switch_to_block(block);
            self.emit_body(body);
            if self.builder.has_insertion_point() {
                self.builder.br(cont_bb, Origin::synthetic());
            }
        }

        if self.func().use_count(cont_bb) == 0 {
            self.builder.erase_block(cont_bb);
            self.builder.clear_insertion_point();
        } else {
            self.builder.switch_to_block(cont_bb);
        }
    }

    /// Evaluate `expr` into its schema shape.
    pub fn emit_rvalue(&mut self, expr: &Expr) -> RValue {
        let igm = self.igm;
        let types = igm.types();
        let origin = Origin::synthetic();
        match &expr.kind {
            ExprKind::IntLiteral(value) => {
                let ty = types.get(expr.ty).storage_type.clone();
                assert!(ty.is_int(), "integer literal of non-integer type {ty}");
                RValue::scalar(self.builder.iconst(*value, ty, origin))
            }
            ExprKind::FloatLiteral(value) => {
                let ty = types.get(expr.ty).storage_type.clone();
                assert!(ty.is_float(), "float literal of non-float type {ty}");
                RValue::scalar(self.builder.fconst(*value, ty, origin))
            }
            ExprKind::BoolLiteral(value) => {
                RValue::scalar(self.builder.iconst(i64::from(*value), Type::I1, origin))
            }
            ExprKind::Param(index) => {
                let decl = self.decl;
                let info = types.get(decl.params[*index].ty);
                let addr = self.param_address(*index);
                info.load_rvalue(&mut self.builder, addr)
            }
            ExprKind::FuncRef(id) => {
                let mut values = Explosion::new(ExplosionKind::Minimal);
                self.emit_exploded_function_ref(*id, &mut values);
                let rv = RValue::Scalars(values.claim_all());
                values.finish("function reference");
                rv
            }
            ExprKind::Tuple(items) => {
                let info = types.get(expr.ty);
                match &info.schema {
                    Schema::Scalars(_) => {
                        let mut values = Vec::new();
                        for item in items {
                            values.extend_from_slice(self.emit_rvalue(item).scalar_values());
                        }
                        RValue::Scalars(values)
                    }
                    Schema::Aggregate { .. } => {
                        let slot = self.create_stack_slot(info.storage_type.clone(), info.align);
                        for (i, item) in items.iter().enumerate() {
                            let value = self.emit_rvalue(item);
                            let field_addr = info.field_address(&mut self.builder, slot, i);
                            info.fields()[i]
                                .info
                                .store_rvalue(&mut self.builder, value, field_addr);
                        }
                        RValue::Aggregate(slot.addr)
                    }
                }
            }
            ExprKind::Field(base, index) => {
                let value = self.emit_rvalue(base);
                types
                    .get(base.ty)
                    .project_field(&mut self.builder, &value, *index as usize)
            }
            ExprKind::Call { callee, arg } => self.emit_apply(callee, arg, expr.ty),
        }
    }

    /// Evaluate `expr` and append it to `out` in `out`'s explosion kind.
    pub fn emit_exploded_rvalue(&mut self, expr: &Expr, out: &mut Explosion) {
        let igm = self.igm;
        let value = self.emit_rvalue(expr);
        igm.types()
            .get(expr.ty)
            .explode(&mut self.builder, value, out);
    }
}
