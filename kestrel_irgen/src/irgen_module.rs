//! Per-compilation-unit lowering state.

use std::cell::RefCell;
use std::rc::Rc;

use kestrel_ir::function::Function;
use kestrel_ir::module::{Module, SymbolId};
use kestrel_ir::types::Signature;
use tracing::{debug, warn};

use crate::ast::{DeclContext, FuncId, Program, TypeId};
use crate::config::IrGenOptions;
use crate::error::{IrGenError, Result};
use crate::irgen_function::IrGenFunction;
use crate::type_info::TypeConverter;

/// A source feature the lowering replaced with a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unimplemented {
    /// Function being emitted when the feature was hit.
    pub function: String,
    pub feature: String,
}

/// Lowers the functions of one `Program` into one IR `Module`.
pub struct IrGenModule<'p> {
    program: &'p Program,
    options: IrGenOptions,
    types: TypeConverter<'p>,
    module: RefCell<Module>,
    /// Module symbol of each non-builtin declaration, indexed by `FuncId`.
    func_symbols: Vec<Option<SymbolId>>,
    unimplemented: RefCell<Vec<Unimplemented>>,
}

impl<'p> IrGenModule<'p> {
    pub fn new(name: &str, program: &'p Program, options: IrGenOptions) -> Result<Self> {
        options.validate()?;
        let mut module = Module::new(name);
        let func_symbols = program
            .funcs
            .iter()
            .map(|decl| match decl.context {
                DeclContext::Builtin => None,
                DeclContext::Global | DeclContext::Local => Some(module.intern(&decl.name)),
            })
            .collect();
        Ok(Self {
            program,
            types: TypeConverter::new(&program.types, &options),
            options,
            module: RefCell::new(module),
            func_symbols,
            unimplemented: RefCell::new(Vec::new()),
        })
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    pub fn options(&self) -> &IrGenOptions {
        &self.options
    }

    pub fn types(&self) -> &TypeConverter<'p> {
        &self.types
    }

    pub fn symbol(&self, id: FuncId) -> SymbolId {
        match self.func_symbols[id.0 as usize] {
            Some(sym) => sym,
            None => panic!(
                "builtin `{}` has no module symbol",
                self.program.func(id).name
            ),
        }
    }

    /// Signature for calls to function type `ty`.
    pub fn function_signature(&self, ty: TypeId, with_data: bool) -> Rc<Signature> {
        self.types
            .get(ty)
            .as_function()
            .signature(&self.types, with_data)
    }

    /// Record a feature that was lowered to a placeholder.
    pub fn note_unimplemented(&self, function: &str, feature: String) {
        warn!(function, feature = %feature, "emitting placeholder for unsupported feature");
        self.unimplemented.borrow_mut().push(Unimplemented {
            function: function.to_string(),
            feature,
        });
    }

    pub fn unimplemented(&self) -> Vec<Unimplemented> {
        self.unimplemented.borrow().clone()
    }

    /// Emit the definition of global function `id`. Declarations without a
    /// body produce nothing.
    pub fn emit_global_function(&self, id: FuncId) {
        let program = self.program;
        let decl = program.func(id);
        assert_eq!(
            decl.context,
            DeclContext::Global,
            "`{}` is not a global function",
            decl.name
        );
        let Some(body) = &decl.body else {
            debug!(name = %decl.name, "skipping bodiless declaration");
            return;
        };

        let sig = self.function_signature(decl.ty, false);
        debug!(name = %decl.name, sig = %sig, "emitting function");
        let mut func = Function::from_signature(self.symbol(id), &sig);
        {
            let mut igf = IrGenFunction::new(self, &mut func, decl);
            igf.emit_prologue();
            igf.emit_body(body);
            igf.emit_epilogue();
        }
        self.module.borrow_mut().add_function(func);
    }

    /// Emit every global function that has a body, in declaration order.
    pub fn emit_all(&self) {
        let program = self.program;
        for id in program.func_ids() {
            let decl = program.func(id);
            if decl.context == DeclContext::Global && decl.body.is_some() {
                self.emit_global_function(id);
            }
        }
    }

    /// Finish lowering and hand out the module, verifying it first when
    /// `IrGenOptions::verify` is set.
    pub fn finish(self) -> Result<Module> {
        let verify = self.options.verify;
        let module = self.module.into_inner();
        if verify {
            for func in &module.functions {
                let result = func.verify(&module.symbols);
                if !result.is_ok() {
                    return Err(IrGenError::Verify {
                        function: module.resolve(func.name).to_string(),
                        report: result.to_string(),
                    });
                }
            }
        }
        Ok(module)
    }
}
