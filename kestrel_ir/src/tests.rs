//! Tests for the kestrel IR builder, display and verifier.

use pretty_assertions::assert_eq;

use crate::builder::Builder;
use crate::function::Function;
use crate::instruction::{ICmpOp, Op, Origin, PlaceholderReason};
use crate::module::{Module, SymbolTable};
use crate::types::{ParamAttrs, Signature, Type};

fn new_func(symbols: &mut SymbolTable, name: &str, params: Vec<Type>, ret: Option<Type>) -> Function {
    let sym = symbols.intern(name);
    Function::new(sym, params, ret)
}

#[test]
fn build_add_function() {
    let mut symbols = SymbolTable::new();
    let mut func = new_func(&mut symbols, "add", vec![Type::I64, Type::I64], Some(Type::I64));
    let mut builder = Builder::new(&mut func);

    let entry = builder.create_block();
    builder.switch_to_block(entry);

    let a = builder.param(0, Type::I64, Origin::synthetic());
    let b = builder.param(1, Type::I64, Origin::synthetic());
    let sum = builder.add(a, b, Origin::synthetic());
    builder.ret(Some(sum), Origin::synthetic());

    assert_eq!(func.instructions.len(), 4);
    assert_eq!(func.blocks.len(), 1);
    assert_eq!(func.block_insts(entry).count(), 4);

    assert!(matches!(func.instructions[0].op, Op::Param(0)));
    assert!(matches!(func.instructions[1].op, Op::Param(1)));
    assert!(matches!(func.instructions[2].op, Op::Add(_, _)));
    assert!(matches!(func.instructions[3].op, Op::Ret(Some(_))));
    assert_eq!(func.value_type(sum), &Type::I64);
    assert!(func.verify(&symbols).is_ok());
}

#[test]
fn display_add_function() {
    let mut symbols = SymbolTable::new();
    let mut func = new_func(&mut symbols, "add", vec![Type::I64, Type::I64], Some(Type::I64));
    let mut builder = Builder::new(&mut func);
    let entry = builder.create_block();
    builder.switch_to_block(entry);

    let a = builder.param(0, Type::I64, Origin::synthetic());
    let b = builder.param(1, Type::I64, Origin::synthetic());
    let sum = builder.add(a, b, Origin::synthetic());
    builder.ret(Some(sum), Origin::synthetic());

    let output = format!("{}", func.display(&symbols));
    assert_eq!(
        output,
        "func @add(i64, i64) -> i64 {\n\
         \x20\x20bb0:\n\
         \x20\x20\x20\x20v0 = param 0 : i64\n\
         \x20\x20\x20\x20v1 = param 1 : i64\n\
         \x20\x20\x20\x20v2 = add v0, v1\n\
         \x20\x20\x20\x20ret v2\n\
         }"
    );
}

#[test]
fn display_multi_block_branch() {
    let mut symbols = SymbolTable::new();
    let mut func = new_func(&mut symbols, "max", vec![Type::I64, Type::I64], Some(Type::I64));
    let mut builder = Builder::new(&mut func);

    let bb0 = builder.create_block();
    let bb1 = builder.create_block();
    let bb2 = builder.create_block();

    builder.switch_to_block(bb0);
    let a = builder.param(0, Type::I64, Origin::synthetic());
    let b = builder.param(1, Type::I64, Origin::synthetic());
    let cmp = builder.icmp(ICmpOp::Sgt, a, b, Origin::synthetic());
    builder.brif(cmp, bb1, bb2, Origin::synthetic());

    builder.switch_to_block(bb1);
    builder.ret(Some(a), Origin::synthetic());

    builder.switch_to_block(bb2);
    builder.ret(Some(b), Origin::synthetic());

    let output = format!("{}", func.display(&symbols));
    assert_eq!(
        output,
        "func @max(i64, i64) -> i64 {\n\
         \x20\x20bb0:\n\
         \x20\x20\x20\x20v0 = param 0 : i64\n\
         \x20\x20\x20\x20v1 = param 1 : i64\n\
         \x20\x20\x20\x20v2 = icmp.sgt v0, v1\n\
         \x20\x20\x20\x20brif v2, bb1, bb2\n\
         \x20\x20bb1:\n\
         \x20\x20\x20\x20ret v0\n\
         \x20\x20bb2:\n\
         \x20\x20\x20\x20ret v1\n\
         }"
    );
    assert!(func.verify(&symbols).is_ok());
}

#[test]
fn display_memory_and_call_ops() {
    let mut symbols = SymbolTable::new();
    let callee = symbols.intern("callee");
    let mut func = new_func(&mut symbols, "caller", vec![], None);
    let mut builder = Builder::new(&mut func);
    let entry = builder.create_block();
    builder.switch_to_block(entry);

    let pair = Type::Struct(vec![Type::I64, Type::I64]);
    let marker = builder.alloca_point(Origin::synthetic());
    let slot = builder.stack_slot_before(marker, pair.clone(), 8, Origin::synthetic());
    let code = builder.symbol_addr(callee, Origin::synthetic());
    let sig = Signature::new(vec![Type::PTR], None)
        .with_attrs(0, ParamAttrs::STRUCT_RET | ParamAttrs::NO_ALIAS);
    let fnptr = builder.fn_cast(code, sig.clone(), Origin::synthetic());
    builder.call(fnptr, vec![slot], sig.clone(), sig.attrs.clone(), Origin::synthetic());
    let field = builder.field_addr(slot, pair, 1, Origin::synthetic());
    builder.load(field, Type::I64, 8, Origin::synthetic());
    builder.ret(None, Origin::synthetic());
    builder.erase_inst(marker);

    let output = format!("{}", func.display(&symbols));
    assert_eq!(
        output,
        "func @caller() {\n\
         \x20\x20bb0:\n\
         \x20\x20\x20\x20v0 = stack_slot {i64, i64}, align 8\n\
         \x20\x20\x20\x20v1 = symbol_addr @callee\n\
         \x20\x20\x20\x20v2 = fn_cast v1 to fn(ptr sret noalias)\n\
         \x20\x20\x20\x20call v2(v0 sret noalias)\n\
         \x20\x20\x20\x20v3 = fieldaddr v0, {i64, i64}, 1\n\
         \x20\x20\x20\x20v4 = load v3, align 8 : i64\n\
         \x20\x20\x20\x20ret\n\
         }"
    );
    assert!(func.verify(&symbols).is_ok());
}

#[test]
fn display_aggregate_value_ops() {
    let mut symbols = SymbolTable::new();
    let pair = Type::Struct(vec![Type::I64, Type::PTR]);
    let mut func = new_func(&mut symbols, "pack", vec![Type::I64, Type::PTR], Some(pair.clone()));
    let mut builder = Builder::new(&mut func);
    let entry = builder.create_block();
    builder.switch_to_block(entry);

    let a = builder.param(0, Type::I64, Origin::synthetic());
    let p = builder.param(1, Type::PTR, Origin::synthetic());
    let agg = builder.undef(pair, Origin::synthetic());
    let agg = builder.insert_value(agg, a, 0, Origin::synthetic());
    let agg = builder.insert_value(agg, p, 1, Origin::synthetic());
    let back = builder.extract_value(agg, 1, Origin::synthetic());
    assert_eq!(builder.value_type(back), &Type::PTR);
    builder.ret(Some(agg), Origin::synthetic());

    let output = format!("{}", func.display(&symbols));
    assert_eq!(
        output,
        "func @pack(i64, ptr) -> {i64, ptr} {\n\
         \x20\x20bb0:\n\
         \x20\x20\x20\x20v0 = param 0 : i64\n\
         \x20\x20\x20\x20v1 = param 1 : ptr\n\
         \x20\x20\x20\x20v2 = undef : {i64, ptr}\n\
         \x20\x20\x20\x20v3 = insertvalue v2, v0, 0\n\
         \x20\x20\x20\x20v4 = insertvalue v3, v1, 1\n\
         \x20\x20\x20\x20v5 = extractvalue v4, 1\n\
         \x20\x20\x20\x20ret v4\n\
         }"
    );
}

#[test]
fn display_placeholder_and_division_ops() {
    let mut symbols = SymbolTable::new();
    let mut func = new_func(&mut symbols, "divs", vec![Type::I32, Type::I32], Some(Type::I32));
    let mut builder = Builder::new(&mut func);
    let entry = builder.create_block();
    builder.switch_to_block(entry);

    let a = builder.param(0, Type::I32, Origin::synthetic());
    let b = builder.param(1, Type::I32, Origin::synthetic());
    builder.exact_sdiv(a, b, Origin::synthetic());
    builder.urem(a, b, Origin::synthetic());
    builder.placeholder(Type::PTR, PlaceholderReason::LocalFunction, Origin::synthetic());
    builder.ret(Some(a), Origin::synthetic());

    let output = format!("{}", func.display(&symbols));
    assert!(output.contains("v2 = sdiv.exact v0, v1"), "{output}");
    assert!(output.contains("v3 = urem v0, v1"), "{output}");
    assert!(output.contains("v4 = placeholder local_function : ptr"), "{output}");
}

#[test]
fn signature_attrs_merge_and_sort() {
    let sig = Signature::new(vec![Type::PTR, Type::I64, Type::PTR], Some(Type::I64))
        .with_attrs(2, ParamAttrs::NO_ALIAS)
        .with_attrs(0, ParamAttrs::STRUCT_RET)
        .with_attrs(0, ParamAttrs::NO_ALIAS);

    assert_eq!(
        sig.attrs,
        vec![
            (0, ParamAttrs::STRUCT_RET | ParamAttrs::NO_ALIAS),
            (2, ParamAttrs::NO_ALIAS),
        ]
    );
    assert!(sig.param_attrs(0).contains(ParamAttrs::STRUCT_RET));
    assert!(sig.param_attrs(1).is_empty());
    assert_eq!(
        sig.to_string(),
        "fn(ptr sret noalias, i64, ptr noalias) -> i64"
    );
}

#[test]
fn insert_before_keeps_insertion_point() {
    let mut symbols = SymbolTable::new();
    let mut func = new_func(&mut symbols, "slots", vec![], None);
    let mut builder = Builder::new(&mut func);
    let entry = builder.create_block();
    builder.switch_to_block(entry);

    let marker = builder.alloca_point(Origin::synthetic());
    let body = builder.create_block();
    builder.br(body, Origin::synthetic());
    builder.switch_to_block(body);
    let slot = builder.stack_slot_before(marker, Type::I64, 8, Origin::synthetic());
    let one = builder.iconst(1, Type::I64, Origin::synthetic());
    builder.store(one, slot, 8, Origin::synthetic());
    builder.ret(None, Origin::synthetic());
    assert_eq!(builder.current_block(), Some(body));

    let entry_insts: Vec<_> = func.block(entry).insts.clone();
    assert_eq!(entry_insts, vec![slot.inst(), marker, entry_insts[2]]);
    assert_eq!(func.inst_block(slot.inst()), Some(entry));
}

#[test]
fn erase_block_clears_insertion_point() {
    let mut symbols = SymbolTable::new();
    let mut func = new_func(&mut symbols, "f", vec![], None);
    let mut builder = Builder::new(&mut func);
    let entry = builder.create_block();
    let dead = builder.create_block();
    builder.switch_to_block(dead);
    builder.erase_block(dead);

    assert!(!builder.has_insertion_point());
    builder.switch_to_block(entry);
    builder.ret(None, Origin::synthetic());

    assert_eq!(func.layout, vec![entry]);
    assert!(!func.is_live_block(dead));
}

#[test]
fn create_block_before_orders_layout() {
    let mut symbols = SymbolTable::new();
    let mut func = new_func(&mut symbols, "f", vec![], None);
    let mut builder = Builder::new(&mut func);
    let entry = builder.create_block();
    let ret = builder.create_block();
    let mid = builder.create_block_before(ret);

    assert_eq!(func.layout, vec![entry, mid, ret]);
}

#[test]
fn predecessors_count_each_edge() {
    let mut symbols = SymbolTable::new();
    let mut func = new_func(&mut symbols, "f", vec![Type::I1], None);
    let mut builder = Builder::new(&mut func);
    let entry = builder.create_block();
    let exit = builder.create_block();
    builder.switch_to_block(entry);
    let c = builder.param(0, Type::I1, Origin::synthetic());
    let branch = builder.brif(c, exit, exit, Origin::synthetic());
    builder.switch_to_block(exit);
    builder.ret(None, Origin::synthetic());

    assert_eq!(
        func.predecessors(exit),
        vec![(entry, branch.inst()), (entry, branch.inst())]
    );
    assert_eq!(func.use_count(entry), 0);
}

#[test]
#[should_panic(expected = "without an insertion point")]
fn emitting_without_insertion_point_panics() {
    let mut symbols = SymbolTable::new();
    let mut func = new_func(&mut symbols, "f", vec![], None);
    let mut builder = Builder::new(&mut func);
    builder.create_block();
    builder.iconst(0, Type::I64, Origin::synthetic());
}

#[test]
fn verify_reports_type_errors() {
    let mut symbols = SymbolTable::new();
    let mut func = new_func(&mut symbols, "bad", vec![Type::I64], Some(Type::I64));
    let mut builder = Builder::new(&mut func);
    let entry = builder.create_block();
    builder.switch_to_block(entry);
    let a = builder.param(0, Type::I64, Origin::synthetic());
    let f = builder.fconst(1.0, Type::Float(crate::types::FloatType::F64), Origin::synthetic());
    builder.add(a, f, Origin::synthetic());
    builder.ret(Some(f), Origin::synthetic());

    let result = func.verify(&symbols);
    assert!(!result.is_ok());
    let text = result.to_string();
    assert!(text.contains("integer operands: type mismatch i64 vs f64"), "{text}");
    assert!(text.contains("return value: expected i64, got f64"), "{text}");
}

#[test]
fn verify_rejects_leftover_alloca_point_and_bad_call() {
    let mut symbols = SymbolTable::new();
    let mut func = new_func(&mut symbols, "bad_call", vec![], None);
    let mut builder = Builder::new(&mut func);
    let entry = builder.create_block();
    builder.switch_to_block(entry);
    builder.alloca_point(Origin::synthetic());
    let code = builder.undef(Type::PTR, Origin::synthetic());
    let sig = Signature::new(vec![Type::I64, Type::I64], None);
    let x = builder.iconst(3, Type::I64, Origin::synthetic());
    builder.call(code, vec![x], sig, vec![(4, ParamAttrs::NO_ALIAS)], Origin::synthetic());
    builder.ret(None, Origin::synthetic());

    let result = func.verify(&symbols);
    let messages: Vec<_> = result.errors.iter().map(|e| e.message.as_str()).collect();
    assert!(messages.contains(&"alloca point marker left in finished function"));
    assert!(messages.contains(&"call passes 1 args, signature expects 2"));
    assert!(messages.contains(&"call attribute on missing argument 4"));
}

#[test]
fn verify_rejects_unterminated_and_empty_blocks() {
    let mut module = Module::new("m");
    let sym = module.intern("open");
    let mut func = Function::new(sym, vec![], None);
    let mut builder = Builder::new(&mut func);
    let entry = builder.create_block();
    builder.create_block();
    builder.switch_to_block(entry);
    builder.iconst(0, Type::I64, Origin::synthetic());
    module.add_function(func);

    let result = module.verify();
    let messages: Vec<_> = result.errors.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(
        messages,
        vec!["block does not end with a terminator", "empty basic block"]
    );
    assert_eq!(
        result.errors[0].location.to_string(),
        "func @open, bb0"
    );
}

#[test]
fn verify_rejects_use_of_erased_value() {
    let mut symbols = SymbolTable::new();
    let mut func = new_func(&mut symbols, "f", vec![], Some(Type::I64));
    let mut builder = Builder::new(&mut func);
    let entry = builder.create_block();
    builder.switch_to_block(entry);
    let v = builder.iconst(7, Type::I64, Origin::synthetic());
    builder.ret(Some(v), Origin::synthetic());
    builder.erase_inst(v.inst());

    let result = func.verify(&symbols);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(
        result.errors[0].message,
        format!("use of value v{} from an erased instruction", v.index())
    );
}

#[test]
fn module_display_separates_functions() {
    let mut module = Module::new("m");
    for name in ["a", "b"] {
        let sym = module.intern(name);
        let mut func = Function::new(sym, vec![], None);
        let mut builder = Builder::new(&mut func);
        let entry = builder.create_block();
        builder.switch_to_block(entry);
        builder.ret(None, Origin::synthetic());
        module.add_function(func);
    }

    assert_eq!(
        module.to_string(),
        "func @a() {\n  bb0:\n    ret\n}\n\nfunc @b() {\n  bb0:\n    ret\n}"
    );
    assert!(module.function("b").is_some());
    assert!(module.function("c").is_none());
}

#[test]
#[should_panic(expected = "function @twice is defined twice")]
fn module_rejects_duplicate_definitions() {
    let mut module = Module::new("m");
    let sym = module.intern("twice");
    module.add_function(Function::new(sym, vec![], None));
    assert!(module.is_defined(sym));
    module.add_function(Function::new(sym, vec![], None));
}
