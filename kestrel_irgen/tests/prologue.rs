//! Prologue argument mapping, epilogue return-block placement and
//! module verification.

mod common;

use common::Fixture;
use kestrel_ir::function::Function;
use kestrel_ir::instruction::Op;
use kestrel_ir::types::{FloatType, Type};
use kestrel_irgen::ast::{Expr, FuncId, Stmt};
use kestrel_irgen::irgen_function::{IrGenFunction, ReturnBlockPlacement, ReturnSlot};
use kestrel_irgen::{IrGenError, IrGenModule, IrGenOptions};
use pretty_assertions::assert_eq;

/// `f(a: i64, b: (i64, i64), c: i64) -> (i64, i64, i64, i64)`.
fn mixed_params() -> (Fixture, FuncId) {
    let mut fx = Fixture::new();
    let i64_ty = fx.i64_ty;
    let pair = fx.tuple(vec![i64_ty, i64_ty]);
    let quad = fx.tuple(vec![i64_ty; 4]);
    let f = fx.global("f", &[("a", i64_ty), ("b", pair), ("c", i64_ty)], quad);
    (fx, f)
}

/// Run the prologue of `id` against a function with the given parameters.
fn prologue_with_params(fx: &Fixture, id: FuncId, params: Vec<Type>) {
    let igm = IrGenModule::new("test", &fx.program, IrGenOptions::default()).unwrap();
    let decl = fx.program.func(id);
    let mut func = Function::new(igm.symbol(id), params, None);
    let mut igf = IrGenFunction::new(&igm, &mut func, decl);
    igf.emit_prologue();
}

/// Lower `id` by hand, returning the return-block placement chosen by the
/// epilogue and the finished function's text.
fn lower(fx: &Fixture, id: FuncId) -> (ReturnBlockPlacement, Function, String) {
    let igm = IrGenModule::new("test", &fx.program, IrGenOptions::default()).unwrap();
    let decl = fx.program.func(id);
    let sig = igm.function_signature(decl.ty, false);
    let mut func = Function::from_signature(igm.symbol(id), &sig);
    let placement = {
        let mut igf = IrGenFunction::new(&igm, &mut func, decl);
        igf.emit_prologue();
        igf.emit_body(decl.body.as_deref().unwrap_or_default());
        let placement = igf.classify_return_block();
        assert_eq!(igf.classify_return_block(), placement);
        igf.emit_epilogue();
        placement
    };
    let module = igm.finish().unwrap();
    let result = func.verify(&module.symbols);
    assert!(result.is_ok(), "{result}");
    let text = func.display(&module.symbols).to_string();
    (placement, func, text)
}

fn has_alloca_point(func: &Function) -> bool {
    func.live_insts()
        .any(|(_, _, inst)| matches!(inst.op, Op::AllocaPoint))
}

#[test]
fn prologue_claims_every_incoming_argument() {
    let (fx, f) = mixed_params();
    let igm = IrGenModule::new("test", &fx.program, IrGenOptions::default()).unwrap();
    let decl = fx.program.func(f);
    let sig = igm.function_signature(decl.ty, false);
    assert_eq!(
        sig.to_string(),
        "fn(ptr sret noalias, i64, i64, i64, i64)"
    );

    let mut func = Function::from_signature(igm.symbol(f), &sig);
    let mut igf = IrGenFunction::new(&igm, &mut func, decl);
    igf.emit_prologue();

    let ReturnSlot::Indirect(slot) = igf.return_slot() else {
        panic!("aggregate results are returned indirectly");
    };
    assert_eq!(slot.align, 8);
    assert_eq!(igf.func().inst(slot.addr.inst()).op, Op::Param(0));
    let entry = igf.func().entry_block();
    assert!(entry.is_some());
    assert_eq!(igf.func().inst_block(slot.addr.inst()), entry);

    let pair = igf.param_address(1);
    assert_eq!(
        igf.func().inst(pair.addr.inst()).op,
        Op::StackSlot {
            ty: Type::Struct(vec![Type::I64, Type::I64]),
            align: 8,
        }
    );
    let params = igf
        .func()
        .live_insts()
        .filter(|(_, _, inst)| matches!(inst.op, Op::Param(_)))
        .count();
    assert_eq!(params, 5);
}

#[test]
#[should_panic(expected = "from an explosion with 0 left")]
fn prologue_panics_when_arguments_run_out() {
    let (fx, f) = mixed_params();
    prologue_with_params(&fx, f, vec![Type::PTR, Type::I64, Type::I64, Type::I64]);
}

#[test]
#[should_panic(expected = "function prologue left 1 of 6 exploded values unclaimed")]
fn prologue_panics_on_leftover_arguments() {
    let (fx, f) = mixed_params();
    prologue_with_params(&fx, f, vec![Type::PTR, Type::I64, Type::I64, Type::I64, Type::I64, Type::I64]);
}

#[test]
#[should_panic(expected = "incoming argument of `f` has type f64, parameter `a` expects i64")]
fn prologue_panics_on_mistyped_argument() {
    let (fx, f) = mixed_params();
    prologue_with_params(
        &fx,
        f,
        vec![Type::PTR, Type::Float(FloatType::F64), Type::I64, Type::I64, Type::I64],
    );
}

#[test]
#[should_panic(expected = "incoming argument of `f` has type i64, the indirect result expects ptr")]
fn prologue_panics_on_non_pointer_indirect_result() {
    let (fx, f) = mixed_params();
    prologue_with_params(&fx, f, vec![Type::I64; 5]);
}

#[test]
#[should_panic(expected = "incoming argument of `g` has type i64, parameter `q` expects ptr")]
fn prologue_panics_on_non_pointer_aggregate_parameter() {
    let mut fx = Fixture::new();
    let i64_ty = fx.i64_ty;
    let quad = fx.tuple(vec![i64_ty; 4]);
    let g = fx.global("g", &[("q", quad)], i64_ty);
    prologue_with_params(&fx, g, vec![Type::I64]);
}

#[test]
fn single_return_is_merged_into_its_block() {
    let mut fx = Fixture::new();
    let i64_ty = fx.i64_ty;
    let id = fx.global("id", &[("x", i64_ty)], i64_ty);
    let x = fx.param(id, 0);
    fx.define(id, vec![Stmt::Return(Some(x))]);

    let (placement, func, text) = lower(&fx, id);
    assert!(matches!(placement, ReturnBlockPlacement::MergeIntoPredecessor { .. }));
    assert_eq!(func.layout.len(), 1);
    assert!(!has_alloca_point(&func));
    assert!(!text.contains("br "), "{text}");
}

#[test]
fn unreferenced_return_block_is_discarded() {
    let mut fx = Fixture::new();
    let (i64_ty, unit) = (fx.i64_ty, fx.unit);
    let sink = fx.global("sink", &[("x", i64_ty)], unit);
    fx.define(sink, vec![]);

    let (placement, func, text) = lower(&fx, sink);
    assert_eq!(placement, ReturnBlockPlacement::Discard);
    assert_eq!(func.layout.len(), 1);
    assert!(text.ends_with("    ret\n}"), "{text}");
}

#[test]
fn discarded_return_block_at_unreachable_end_emits_nothing() {
    let mut fx = Fixture::new();
    let unit = fx.unit;
    let stuck = fx.global("stuck", &[], unit);
    let igm = IrGenModule::new("test", &fx.program, IrGenOptions::default()).unwrap();
    let decl = fx.program.func(stuck);
    let sig = igm.function_signature(decl.ty, false);
    let mut func = Function::from_signature(igm.symbol(stuck), &sig);
    {
        let mut igf = IrGenFunction::new(&igm, &mut func, decl);
        igf.emit_prologue();
        igf.builder().clear_insertion_point();
        assert_eq!(igf.classify_return_block(), ReturnBlockPlacement::Discard);
        igf.emit_epilogue();
    }
    assert_eq!(func.layout.len(), 1);
    assert_eq!(func.live_insts().count(), 0);
}

#[test]
fn fallthrough_into_return_block() {
    let mut fx = Fixture::new();
    let (bool_ty, unit) = (fx.bool_ty, fx.unit);
    let maybe = fx.global("maybe", &[("c", bool_ty)], unit);
    let c = fx.param(maybe, 0);
    fx.define(
        maybe,
        vec![Stmt::If {
            cond: c,
            then_body: vec![Stmt::Return(None)],
            else_body: vec![],
        }],
    );

    let (placement, func, _) = lower(&fx, maybe);
    assert_eq!(placement, ReturnBlockPlacement::Fallthrough);
    // entry, then, else, the join block and the return block.
    assert_eq!(func.layout.len(), 5);
    let return_block = *func.layout.last().unwrap();
    assert_eq!(func.use_count(return_block), 2);
    assert!(!has_alloca_point(&func));
}

#[test]
fn several_returns_share_the_return_block() {
    let mut fx = Fixture::new();
    let (bool_ty, i64_ty) = (fx.bool_ty, fx.i64_ty);
    let neg = fx.builtin("neg", vec![i64_ty], i64_ty);
    let pick = fx.global("pick", &[("c", bool_ty), ("x", i64_ty)], i64_ty);
    let c = fx.param(pick, 0);
    let x = fx.param(pick, 1);
    let x_again = fx.param(pick, 1);
    let negated = fx.call(neg, vec![x_again]);
    fx.define(
        pick,
        vec![Stmt::If {
            cond: c,
            then_body: vec![Stmt::Return(Some(x))],
            else_body: vec![Stmt::Return(Some(negated))],
        }],
    );

    let (placement, func, text) = lower(&fx, pick);
    assert_eq!(placement, ReturnBlockPlacement::Shared);
    // The join block had no uses and was erased.
    assert_eq!(func.layout.len(), 4);
    assert_eq!(text.matches("ret ").count(), 1, "{text}");
    assert_eq!(text.matches("br bb1").count(), 2, "{text}");
    assert!(text.contains("neg "), "{text}");
}

#[test]
fn statements_after_return_are_skipped() {
    let mut fx = Fixture::new();
    let i64_ty = fx.i64_ty;
    let early = fx.global("early", &[("x", i64_ty)], i64_ty);
    let x = fx.param(early, 0);
    fx.define(
        early,
        vec![Stmt::Return(Some(x)), Stmt::Return(Some(Expr::int(7, i64_ty)))],
    );

    let (_, _, text) = lower(&fx, early);
    assert!(!text.contains("iconst 7"), "{text}");
}

#[test]
fn verification_failure_names_the_function() {
    let mut fx = Fixture::new();
    let (i64_ty, unit) = (fx.i64_ty, fx.unit);
    let bad = fx.global("bad", &[("x", i64_ty)], unit);
    let x = fx.param(bad, 0);
    fx.define(
        bad,
        vec![Stmt::If {
            cond: x,
            then_body: vec![],
            else_body: vec![],
        }],
    );

    let igm = IrGenModule::new("test", &fx.program, IrGenOptions::default()).unwrap();
    igm.emit_all();
    match igm.finish() {
        Err(IrGenError::Verify { function, report }) => {
            assert_eq!(function, "bad");
            assert!(report.contains("branch condition"), "{report}");
        }
        other => panic!("expected a verification error, got {other:?}"),
    }

    let options = IrGenOptions {
        verify: false,
        ..IrGenOptions::default()
    };
    let igm = IrGenModule::new("test", &fx.program, options).unwrap();
    igm.emit_all();
    let module = igm.finish().unwrap();
    assert!(module.function("bad").is_some());
}
