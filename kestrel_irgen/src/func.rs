//! Function types: the closure representation, the low-level signatures
//! derived from a function type, and call emission.
//!
//! A function value is a pair `(code, data)` of pointers. Calls pass the
//! arguments in order, with an indirect-result pointer first when the result
//! is an aggregate and the data pointer last unless it is statically `undef`.

use std::cell::OnceCell;
use std::rc::Rc;

use kestrel_ir::builder::Builder;
use kestrel_ir::instruction::{Origin, PlaceholderReason};
use kestrel_ir::types::{ParamAttrs, Signature, Type};
use tracing::debug;

use crate::ast::{DeclContext, Expr, ExprKind, FuncId, TypeId};
use crate::explosion::{Explosion, ExplosionKind};
use crate::irgen_function::IrGenFunction;
use crate::rvalue::{Address, RValue, alignment_at_offset};
use crate::schema::Schema;
use crate::type_info::TypeConverter;

/// Function-type specific part of a lowering descriptor.
///
/// The two signatures are computed independently on first request and then
/// handed out unchanged.
#[derive(Debug)]
pub struct FuncTypeInfo {
    input: TypeId,
    result: TypeId,
    /// Offset of the data pointer within the closure.
    data_offset: u64,
    with_data: OnceCell<Rc<Signature>>,
    without_data: OnceCell<Rc<Signature>>,
}

impl FuncTypeInfo {
    pub(crate) fn new(input: TypeId, result: TypeId, data_offset: u64) -> Self {
        Self {
            input,
            result,
            data_offset,
            with_data: OnceCell::new(),
            without_data: OnceCell::new(),
        }
    }

    /// In-memory layout of every function value: `{code, data}`.
    pub fn closure_type() -> Type {
        Type::Struct(vec![Type::PTR, Type::PTR])
    }

    pub fn input(&self) -> TypeId {
        self.input
    }

    pub fn result(&self) -> TypeId {
        self.result
    }

    /// Low-level signature for calls to this function type, with or without
    /// the trailing data pointer.
    pub fn signature(&self, types: &TypeConverter<'_>, needs_data: bool) -> Rc<Signature> {
        let cell = if needs_data {
            &self.with_data
        } else {
            &self.without_data
        };
        Rc::clone(cell.get_or_init(|| {
            let sig = lower_signature(types, self.input, self.result, needs_data);
            debug!(needs_data, sig = %sig, "computed function signature");
            Rc::new(sig)
        }))
    }

    /// The signature if it has already been computed.
    pub fn cached_signature(&self, needs_data: bool) -> Option<Rc<Signature>> {
        let cell = if needs_data {
            &self.with_data
        } else {
            &self.without_data
        };
        cell.get().cloned()
    }

    pub(crate) fn load(&self, b: &mut Builder<'_>, src: Address, out: &mut Explosion) {
        let code_addr = b.field_addr(src.addr, Self::closure_type(), 0, Origin::synthetic());
        out.add(b.load(code_addr, Type::PTR, src.align, Origin::synthetic()));
        let data_addr = b.field_addr(src.addr, Self::closure_type(), 1, Origin::synthetic());
        let data_align = alignment_at_offset(src.align, self.data_offset);
        out.add(b.load(data_addr, Type::PTR, data_align, Origin::synthetic()));
    }

    pub(crate) fn store(&self, b: &mut Builder<'_>, src: &mut Explosion, dest: Address) {
        let code_addr = b.field_addr(dest.addr, Self::closure_type(), 0, Origin::synthetic());
        b.store(src.claim_next(), code_addr, dest.align, Origin::synthetic());
        let data_addr = b.field_addr(dest.addr, Self::closure_type(), 1, Origin::synthetic());
        let data_align = alignment_at_offset(dest.align, self.data_offset);
        b.store(src.claim_next(), data_addr, data_align, Origin::synthetic());
    }
}

fn lower_signature(
    types: &TypeConverter<'_>,
    input: TypeId,
    result: TypeId,
    needs_data: bool,
) -> Signature {
    let result_schema = types.schema(result);
    let indirect = result_schema.is_aggregate();

    let mut params = Vec::new();
    if indirect {
        params.push(Type::PTR);
    }
    match types.table().tuple_elements(input) {
        Some(elems) => {
            for &elem in elems {
                params.extend(types.get(elem).schema.arg_types());
            }
        }
        None => params.extend(types.get(input).schema.arg_types()),
    }
    if needs_data {
        params.push(Type::PTR);
    }

    let sig = Signature::new(params, result_schema.direct_return_type());
    if indirect {
        sig.with_attrs(0, ParamAttrs::STRUCT_RET | ParamAttrs::NO_ALIAS)
    } else {
        sig
    }
}

/// Arguments of one call under construction, with their positional
/// attributes.
#[derive(Debug)]
pub struct ArgList {
    pub values: Explosion,
    pub attrs: Vec<(u32, ParamAttrs)>,
}

impl Default for ArgList {
    fn default() -> Self {
        Self::new()
    }
}

impl ArgList {
    pub fn new() -> Self {
        Self {
            values: Explosion::new(ExplosionKind::Minimal),
            attrs: Vec::new(),
        }
    }

    /// Append the caller-allocated result slot at the current position.
    pub fn add_indirect_result(&mut self, slot: Address) {
        let index = self.values.len() as u32;
        self.attrs
            .push((index, ParamAttrs::STRUCT_RET | ParamAttrs::NO_ALIAS));
        self.values.add(slot.addr);
    }
}

impl IrGenFunction<'_, '_> {
    /// Explode a reference to a declared function into `(code, data)`.
    pub fn emit_exploded_function_ref(&mut self, id: FuncId, out: &mut Explosion) {
        let igm = self.igm;
        let decl = igm.program().func(id);
        let origin = Origin::synthetic();
        match decl.context {
            DeclContext::Global => {
                let code = self.builder.symbol_addr(igm.symbol(id), origin.clone());
                let data = self.builder.undef(Type::PTR, origin);
                out.add(code);
                out.add(data);
            }
            DeclContext::Local => {
                igm.note_unimplemented(
                    &self.decl.name,
                    format!("reference to local function `{}`", decl.name),
                );
                for _ in 0..2 {
                    let v = self.builder.placeholder(
                        Type::PTR,
                        PlaceholderReason::LocalFunction,
                        origin.clone(),
                    );
                    out.add(v);
                }
            }
            DeclContext::Builtin => panic!(
                "builtin `{}` cannot be used as a function value",
                decl.name
            ),
        }
    }

    /// Name of the builtin `callee` refers to, if it is a direct builtin reference.
    fn builtin_callee(&self, callee: &Expr) -> Option<&str> {
        let ExprKind::FuncRef(id) = &callee.kind else {
            return None;
        };
        let decl = self.igm.program().func(*id);
        (decl.context == DeclContext::Builtin).then_some(decl.name.as_str())
    }

    /// Explode a call argument one tuple level deep into `out`.
    pub(crate) fn emit_call_args(&mut self, arg: &Expr, out: &mut Explosion) {
        let igm = self.igm;
        let types = igm.types();
        match (types.table().tuple_elements(arg.ty), &arg.kind) {
            (Some(_), ExprKind::Tuple(items)) => {
                for item in items {
                    let value = self.emit_rvalue(item);
                    types.get(item.ty).explode(&mut self.builder, value, out);
                }
            }
            (Some(elems), _) => {
                let info = types.get(arg.ty);
                let whole = self.emit_rvalue(arg);
                for index in 0..elems.len() {
                    let field = info.project_field(&mut self.builder, &whole, index);
                    info.fields()[index]
                        .info
                        .explode(&mut self.builder, field, out);
                }
            }
            (None, _) => {
                let value = self.emit_rvalue(arg);
                types.get(arg.ty).explode(&mut self.builder, value, out);
            }
        }
    }

    /// Emit a call of `callee` applied to `arg`, producing a value of
    /// `result_ty` in its schema shape.
    pub fn emit_apply(&mut self, callee: &Expr, arg: &Expr, result_ty: TypeId) -> RValue {
        if let Some(name) = self.builtin_callee(callee) {
            let name = name.to_string();
            return self.emit_builtin(&name, arg, result_ty);
        }

        let igm = self.igm;
        let types = igm.types();
        let callee_info = types.get(callee.ty);
        let func_info = callee_info.as_function();

        let mut callee_values = Explosion::new(ExplosionKind::Maximal);
        self.emit_exploded_rvalue(callee, &mut callee_values);
        let code = callee_values.claim_next();
        let data = callee_values.claim_next();
        callee_values.finish("callee");

        let result_info = types.get(result_ty);
        let mut args = ArgList::new();
        let result_slot = match &result_info.schema {
            Schema::Aggregate { align, .. } => {
                let slot = self.create_stack_slot(result_info.storage_type.clone(), *align);
                args.add_indirect_result(slot);
                Some(slot)
            }
            Schema::Scalars(_) => None,
        };

        self.emit_call_args(arg, &mut args.values);

        let needs_data = !self.builder.func().is_undef(data);
        if needs_data {
            args.values.add(data);
        }
        let sig = func_info.signature(types, needs_data);
        debug!(
            caller = %self.decl.name,
            needs_data,
            sig = %sig,
            "emitting call"
        );

        let origin = Origin::synthetic();
        let code = self.builder.fn_cast(code, (*sig).clone(), origin.clone());
        let call_args = args.values.claim_all();
        args.values.finish("call arguments");
        let call = self
            .builder
            .call(code, call_args, (*sig).clone(), args.attrs, origin.clone());

        if let Some(slot) = result_slot {
            return RValue::Aggregate(slot.addr);
        }
        let count = result_info.schema.minimal_len();
        if count == 1 {
            return RValue::scalar(call);
        }
        let values = (0..count)
            .map(|i| self.builder.extract_value(call, i as u32, origin.clone()))
            .collect();
        RValue::Scalars(values)
    }

    /// Emit a call whose result is an aggregate and return the address it
    /// was written to. Returns `None`, emitting nothing, for scalar results.
    pub fn try_emit_apply_as_address(
        &mut self,
        callee: &Expr,
        arg: &Expr,
        result_ty: TypeId,
    ) -> Option<Address> {
        let igm = self.igm;
        let result_info = igm.types().get(result_ty);
        let Schema::Aggregate { align, .. } = &result_info.schema else {
            return None;
        };
        let value = self.emit_apply(callee, arg, result_ty);
        Some(Address::new(value.address(), *align))
    }

    /// Emit a call and explode its result into `out`.
    pub fn emit_exploded_apply(
        &mut self,
        callee: &Expr,
        arg: &Expr,
        result_ty: TypeId,
        out: &mut Explosion,
    ) {
        let igm = self.igm;
        let value = self.emit_apply(callee, arg, result_ty);
        igm.types()
            .get(result_ty)
            .explode(&mut self.builder, value, out);
    }
}
