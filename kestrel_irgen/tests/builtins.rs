mod common;

use common::Fixture;
use kestrel_ir::instruction::Op;
use kestrel_irgen::ast::{FuncId, Stmt, TypeId};
use kestrel_irgen::{IrGenModule, IrGenOptions};

/// Define `name(a, b) -> result { return builtin(a, b) }`.
fn binary_wrapper(
    fx: &mut Fixture,
    builtin: &str,
    operand: TypeId,
    result: TypeId,
) -> FuncId {
    let op = fx.builtin(builtin, vec![operand, operand], result);
    let func = fx.global("wrapper", &[("a", operand), ("b", operand)], result);
    let (a, b) = (fx.param(func, 0), fx.param(func, 1));
    let value = fx.call(op, vec![a, b]);
    fx.define(func, vec![Stmt::Return(Some(value))]);
    func
}

fn lowered_ops(builtin: &str, operand: fn(&Fixture) -> TypeId, result: fn(&Fixture) -> TypeId) -> Vec<Op> {
    let mut fx = Fixture::new();
    let (operand, result) = (operand(&fx), result(&fx));
    binary_wrapper(&mut fx, builtin, operand, result);
    let module = fx.compile();
    let func = module.function("wrapper").unwrap();
    func.live_insts().map(|(_, _, inst)| inst.op.clone()).collect()
}

#[test]
fn arithmetic_dispatches_on_operand_type() {
    let int_ops = lowered_ops("add", |fx| fx.i64_ty, |fx| fx.i64_ty);
    assert!(int_ops.iter().any(|op| matches!(op, Op::Add(..))));

    let float_ops = lowered_ops("add", |fx| fx.f64_ty, |fx| fx.f64_ty);
    assert!(float_ops.iter().any(|op| matches!(op, Op::FAdd(..))));
    assert!(!float_ops.iter().any(|op| matches!(op, Op::Add(..))));

    let float_sub = lowered_ops("sub", |fx| fx.f64_ty, |fx| fx.f64_ty);
    assert!(float_sub.iter().any(|op| matches!(op, Op::FSub(..))));
}

#[test]
fn comparisons_produce_i1_results() {
    let mut fx = Fixture::new();
    let (i64_ty, bool_ty) = (fx.i64_ty, fx.bool_ty);
    binary_wrapper(&mut fx, "cmp_sgt", i64_ty, bool_ty);
    let module = fx.compile();
    let text = Fixture::print(&module, "wrapper");
    assert!(text.starts_with("func @wrapper(i64, i64) -> i1 {"), "{text}");
    assert!(text.contains("stack_slot i1, align 1"), "{text}");
    assert!(text.contains("icmp.sgt v"), "{text}");

    let float_cmp = lowered_ops("fcmp_olt", |fx| fx.f64_ty, |fx| fx.bool_ty);
    assert!(float_cmp.iter().any(|op| matches!(op, Op::FCmp(..))));
}

#[test]
fn division_variants_keep_their_exactness() {
    for (name, expected) in [
        ("sdiv", "sdiv v"),
        ("udiv", "udiv v"),
        ("sdiv_exact", "sdiv.exact v"),
        ("udiv_exact", "udiv.exact v"),
        ("srem", "srem v"),
        ("xor", "xor v"),
    ] {
        let mut fx = Fixture::new();
        let i64_ty = fx.i64_ty;
        binary_wrapper(&mut fx, name, i64_ty, i64_ty);
        let module = fx.compile();
        let text = Fixture::print(&module, "wrapper");
        assert!(text.contains(expected), "{name}: {text}");
    }
}

#[test]
fn unary_builtins_take_one_operand() {
    let mut fx = Fixture::new();
    let i64_ty = fx.i64_ty;
    let not = fx.builtin("not", vec![i64_ty], i64_ty);
    let func = fx.global("invert", &[("x", i64_ty)], i64_ty);
    let x = fx.param(func, 0);
    let value = fx.call(not, vec![x]);
    fx.define(func, vec![Stmt::Return(Some(value))]);
    let module = fx.compile();
    assert!(Fixture::print(&module, "invert").contains("not v"));
}

#[test]
#[should_panic(expected = "builtin `neg` takes 1 operands, got 2")]
fn builtin_arity_mismatch_panics() {
    let mut fx = Fixture::new();
    let i64_ty = fx.i64_ty;
    binary_wrapper(&mut fx, "neg", i64_ty, i64_ty);
    fx.compile();
}

#[test]
#[should_panic(expected = "unknown builtin `frobnicate`")]
fn unknown_builtin_panics() {
    let mut fx = Fixture::new();
    let i64_ty = fx.i64_ty;
    binary_wrapper(&mut fx, "frobnicate", i64_ty, i64_ty);
    fx.compile();
}

#[test]
#[should_panic(expected = "builtin `add` cannot produce an aggregate result")]
fn aggregate_builtin_result_panics() {
    let mut fx = Fixture::new();
    let i64_ty = fx.i64_ty;
    let quad = fx.tuple(vec![i64_ty; 4]);
    binary_wrapper(&mut fx, "add", i64_ty, quad);
    fx.compile();
}

#[test]
#[should_panic(expected = "builtin `add` has no module symbol")]
fn builtins_have_no_symbol() {
    let mut fx = Fixture::new();
    let i64_ty = fx.i64_ty;
    let add = fx.builtin("add", vec![i64_ty, i64_ty], i64_ty);
    let igm = IrGenModule::new("test", &fx.program, IrGenOptions::default()).unwrap();
    igm.symbol(add);
}
