//! Compilation unit: the lowered functions and the names they refer to.
//!
//! Function names and call targets are `SymbolId`s into the module's
//! `SymbolTable`, so a symbol may be referenced before (or without) being
//! defined in this module.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use crate::function::Function;

/// Index into a `SymbolTable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    names: Vec<String>,
    ids: HashMap<String, SymbolId>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for `name`, allocating one on first use.
    pub fn intern(&mut self, name: &str) -> SymbolId {
        match self.ids.entry(name.to_string()) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => {
                let id = SymbolId(self.names.len() as u32);
                self.names.push(e.key().clone());
                *e.insert(id)
            }
        }
    }

    pub fn resolve(&self, id: SymbolId) -> &str {
        &self.names[id.0 as usize]
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.ids.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

pub struct Module {
    pub name: String,
    pub symbols: SymbolTable,
    /// Definitions in the order they were added.
    pub functions: Vec<Function>,
    defined: HashMap<SymbolId, usize>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbols: SymbolTable::new(),
            functions: Vec::new(),
            defined: HashMap::new(),
        }
    }

    pub fn intern(&mut self, name: &str) -> SymbolId {
        self.symbols.intern(name)
    }

    pub fn resolve(&self, id: SymbolId) -> &str {
        self.symbols.resolve(id)
    }

    /// Add the definition of `func.name`. Each symbol is defined once.
    pub fn add_function(&mut self, func: Function) {
        let index = self.functions.len();
        if self.defined.insert(func.name, index).is_some() {
            panic!("function @{} is defined twice", self.resolve(func.name));
        }
        self.functions.push(func);
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        let id = self.symbols.lookup(name)?;
        self.defined.get(&id).map(|&i| &self.functions[i])
    }

    pub fn is_defined(&self, id: SymbolId) -> bool {
        self.defined.contains_key(&id)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let defined: Vec<&str> = self
            .functions
            .iter()
            .map(|func| self.resolve(func.name))
            .collect();
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("symbols", &self.symbols.len())
            .field("functions", &defined)
            .finish()
    }
}
