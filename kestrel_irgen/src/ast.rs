//! Typed source model consumed by the lowering.
//!
//! Name resolution and type checking happen before this point: every
//! expression carries its interned source type and every function reference
//! is resolved to a declaration.

use std::collections::HashMap;

use kestrel_ir::types::FloatType;

/// Interned source type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Integer of the given bit width.
    Int(u32),
    Float(FloatType),
    Bool,
    /// Anonymous product. The empty tuple is the unit type.
    Tuple(Vec<TypeId>),
    /// Nominal product.
    Struct { name: String, fields: Vec<TypeId> },
    /// Function value. Multiple parameters are modeled as a tuple input.
    Function { input: TypeId, result: TypeId },
}

/// Structural interner for source types. Equal kinds share one `TypeId`.
#[derive(Debug, Default)]
pub struct TypeTable {
    kinds: Vec<TypeKind>,
    lookup: HashMap<TypeKind, TypeId>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, kind: TypeKind) -> TypeId {
        if let Some(&id) = self.lookup.get(&kind) {
            return id;
        }
        let id = TypeId(self.kinds.len() as u32);
        self.kinds.push(kind.clone());
        self.lookup.insert(kind, id);
        id
    }

    pub fn get(&self, id: TypeId) -> &TypeKind {
        &self.kinds[id.0 as usize]
    }

    pub fn int(&mut self, bits: u32) -> TypeId {
        self.intern(TypeKind::Int(bits))
    }

    pub fn float(&mut self, ty: FloatType) -> TypeId {
        self.intern(TypeKind::Float(ty))
    }

    pub fn bool(&mut self) -> TypeId {
        self.intern(TypeKind::Bool)
    }

    pub fn tuple(&mut self, elems: Vec<TypeId>) -> TypeId {
        self.intern(TypeKind::Tuple(elems))
    }

    pub fn unit(&mut self) -> TypeId {
        self.tuple(Vec::new())
    }

    pub fn structure(&mut self, name: &str, fields: Vec<TypeId>) -> TypeId {
        self.intern(TypeKind::Struct {
            name: name.to_string(),
            fields,
        })
    }

    pub fn function(&mut self, input: TypeId, result: TypeId) -> TypeId {
        self.intern(TypeKind::Function { input, result })
    }

    /// Element types of a tuple, `None` for every other kind.
    pub fn tuple_elements(&self, id: TypeId) -> Option<&[TypeId]> {
        match self.get(id) {
            TypeKind::Tuple(elems) => Some(elems),
            _ => None,
        }
    }

    /// `(input, result)` of a function type.
    pub fn function_parts(&self, id: TypeId) -> Option<(TypeId, TypeId)> {
        match self.get(id) {
            TypeKind::Function { input, result } => Some((*input, *result)),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

/// Index of a declaration in `Program::funcs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub u32);

/// Where a function declaration lives, which decides how references to it
/// are lowered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclContext {
    /// Primitive operation lowered inline at every call site.
    Builtin,
    /// Top-level function with a module symbol.
    Global,
    /// Function declared inside another function's body.
    Local,
}

#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: String,
    pub ty: TypeId,
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub name: String,
    pub context: DeclContext,
    /// Always a function type.
    pub ty: TypeId,
    /// One entry per element of a tuple input, otherwise exactly one.
    pub params: Vec<ParamDecl>,
    /// `None` for a declaration without a definition.
    pub body: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: TypeId,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    IntLiteral(i64),
    FloatLiteral(f64),
    BoolLiteral(bool),
    /// Formal parameter of the enclosing function.
    Param(usize),
    FuncRef(FuncId),
    Tuple(Vec<Expr>),
    /// Element of a tuple or struct value.
    Field(Box<Expr>, u32),
    /// Application of a function value to a single (possibly tuple) argument.
    Call { callee: Box<Expr>, arg: Box<Expr> },
}

impl Expr {
    pub fn new(kind: ExprKind, ty: TypeId) -> Self {
        Self { kind, ty }
    }

    pub fn int(value: i64, ty: TypeId) -> Self {
        Self::new(ExprKind::IntLiteral(value), ty)
    }

    pub fn float(value: f64, ty: TypeId) -> Self {
        Self::new(ExprKind::FloatLiteral(value), ty)
    }

    pub fn boolean(value: bool, ty: TypeId) -> Self {
        Self::new(ExprKind::BoolLiteral(value), ty)
    }

    pub fn param(index: usize, ty: TypeId) -> Self {
        Self::new(ExprKind::Param(index), ty)
    }

    pub fn func_ref(id: FuncId, ty: TypeId) -> Self {
        Self::new(ExprKind::FuncRef(id), ty)
    }

    pub fn tuple(elems: Vec<Expr>, ty: TypeId) -> Self {
        Self::new(ExprKind::Tuple(elems), ty)
    }

    pub fn field(base: Expr, index: u32, ty: TypeId) -> Self {
        Self::new(ExprKind::Field(Box::new(base), index), ty)
    }

    pub fn call(callee: Expr, arg: Expr, ty: TypeId) -> Self {
        Self::new(
            ExprKind::Call {
                callee: Box::new(callee),
                arg: Box::new(arg),
            },
            ty,
        )
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    /// Evaluate for side effects and discard the value.
    Expr(Expr),
    Return(Option<Expr>),
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
}

/// A type-checked compilation unit.
#[derive(Debug, Default)]
pub struct Program {
    pub types: TypeTable,
    pub funcs: Vec<FuncDecl>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_func(&mut self, decl: FuncDecl) -> FuncId {
        let id = FuncId(self.funcs.len() as u32);
        self.funcs.push(decl);
        id
    }

    pub fn func(&self, id: FuncId) -> &FuncDecl {
        &self.funcs[id.0 as usize]
    }

    /// Declare a builtin of function type `ty`.
    pub fn add_builtin(&mut self, name: &str, ty: TypeId) -> FuncId {
        self.add_func(FuncDecl {
            name: name.to_string(),
            context: DeclContext::Builtin,
            ty,
            params: Vec::new(),
            body: None,
        })
    }

    /// The function ids in declaration order.
    pub fn func_ids(&self) -> impl Iterator<Item = FuncId> + use<> {
        (0..self.funcs.len() as u32).map(FuncId)
    }
}
