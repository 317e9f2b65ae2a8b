//! Shared helpers for building typed programs in integration tests.

#![allow(dead_code)]

use kestrel_ir::module::Module;
use kestrel_ir::types::FloatType;
use kestrel_irgen::ast::{DeclContext, Expr, FuncDecl, FuncId, ParamDecl, Program, Stmt, TypeId};
use kestrel_irgen::{IrGenModule, IrGenOptions};

pub struct Fixture {
    pub program: Program,
    pub i64_ty: TypeId,
    pub f64_ty: TypeId,
    pub bool_ty: TypeId,
    pub unit: TypeId,
}

impl Fixture {
    pub fn new() -> Self {
        let mut program = Program::new();
        let i64_ty = program.types.int(64);
        let f64_ty = program.types.float(FloatType::F64);
        let bool_ty = program.types.bool();
        let unit = program.types.unit();
        Self {
            program,
            i64_ty,
            f64_ty,
            bool_ty,
            unit,
        }
    }

    pub fn tuple(&mut self, elems: Vec<TypeId>) -> TypeId {
        self.program.types.tuple(elems)
    }

    /// Function type taking `params` as a tuple.
    pub fn fn_type(&mut self, params: Vec<TypeId>, result: TypeId) -> TypeId {
        let input = self.program.types.tuple(params);
        self.program.types.function(input, result)
    }

    pub fn builtin(&mut self, name: &str, params: Vec<TypeId>, result: TypeId) -> FuncId {
        let ty = self.fn_type(params, result);
        self.program.add_builtin(name, ty)
    }

    /// Declare a function. Give it a body with `define`.
    pub fn declare(
        &mut self,
        name: &str,
        context: DeclContext,
        params: &[(&str, TypeId)],
        result: TypeId,
    ) -> FuncId {
        let ty = self.fn_type(params.iter().map(|(_, ty)| *ty).collect(), result);
        self.program.add_func(FuncDecl {
            name: name.to_string(),
            context,
            ty,
            params: params
                .iter()
                .map(|(name, ty)| ParamDecl {
                    name: name.to_string(),
                    ty: *ty,
                })
                .collect(),
            body: None,
        })
    }

    pub fn global(&mut self, name: &str, params: &[(&str, TypeId)], result: TypeId) -> FuncId {
        self.declare(name, DeclContext::Global, params, result)
    }

    pub fn define(&mut self, id: FuncId, body: Vec<Stmt>) {
        self.program.funcs[id.0 as usize].body = Some(body);
    }

    pub fn param(&self, func: FuncId, index: usize) -> Expr {
        Expr::param(index, self.program.func(func).params[index].ty)
    }

    pub fn func_ref(&self, id: FuncId) -> Expr {
        Expr::func_ref(id, self.program.func(id).ty)
    }

    pub fn int(&self, value: i64) -> Expr {
        Expr::int(value, self.i64_ty)
    }

    /// Tuple literal typed after its elements.
    pub fn args(&mut self, items: Vec<Expr>) -> Expr {
        let ty = self.tuple(items.iter().map(|e| e.ty).collect());
        Expr::tuple(items, ty)
    }

    /// Call `callee` (any function-typed expression) with the tuple of `items`.
    pub fn call_value(&mut self, callee: Expr, items: Vec<Expr>) -> Expr {
        let (_, result) = self
            .program
            .types
            .function_parts(callee.ty)
            .expect("callee is not a function");
        let arg = self.args(items);
        Expr::call(callee, arg, result)
    }

    pub fn call(&mut self, callee: FuncId, items: Vec<Expr>) -> Expr {
        let callee = self.func_ref(callee);
        self.call_value(callee, items)
    }

    pub fn compile(&self) -> Module {
        let igm = IrGenModule::new("test", &self.program, IrGenOptions::default())
            .expect("default options are valid");
        igm.emit_all();
        igm.finish().expect("lowered module should verify")
    }

    /// Printed IR of function `name` in `module`.
    pub fn print(module: &Module, name: &str) -> String {
        let func = module
            .function(name)
            .unwrap_or_else(|| panic!("no function @{name}"));
        func.display(&module.symbols).to_string()
    }
}
