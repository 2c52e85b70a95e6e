//! Arenas that intern variables and memory locations.
//!
//! A factory hands out small index handles ([`Variable`], [`MemLoc`]) and
//! keeps a lookup table from the structural key to the index, so that
//! interning the same key twice returns the same handle. Factories use
//! interior locking and can be shared by reference between the front end
//! and concurrent analyses.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::RwLock;

use crate::number::IntType;
use crate::types::{CallId, FunctionId, MemLoc, Variable};

/// Hash-consing arena: `put` returns the index of an equal key if one
/// already exists, otherwise appends the key.
#[derive(Debug)]
pub(crate) struct Interner<K> {
    keys: Vec<K>,
    index: HashMap<K, u32>,
}

impl<K> Default for Interner<K> {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K> Interner<K>
where
    K: Clone + Eq + Hash,
{
    pub(crate) fn get(&self, key: &K) -> Option<u32> {
        self.index.get(key).copied()
    }

    pub(crate) fn put(&mut self, key: K) -> u32 {
        if let Some(i) = self.index.get(&key) {
            return *i;
        }
        let i = u32::try_from(self.keys.len()).expect("arena is full");
        self.keys.push(key.clone());
        self.index.insert(key, i);
        i
    }

    pub(crate) fn key(&self, i: u32) -> &K {
        &self.keys[i as usize]
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }
}

/// Structural identity of a variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VariableKey {
    /// Named program variable (locals are expected to be uniquely named by the front end).
    Named(String),
    /// Contents of a memory location that is not itself a variable.
    Cell(MemLoc),
}

#[derive(Debug, Default)]
struct VariableTable {
    interner: Interner<VariableKey>,
    types: HashMap<u32, IntType>,
}

/// Factory of [`Variable`] handles.
#[derive(Debug, Default)]
pub struct VariableFactory {
    table: RwLock<VariableTable>,
}

impl VariableFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the variable with the given name.
    pub fn named(&self, name: &str) -> Variable {
        let key = VariableKey::Named(name.to_string());
        if let Some(i) = self.table.read().interner.get(&key) {
            return Variable::new(i);
        }
        Variable::new(self.table.write().interner.put(key))
    }

    /// Get or create a named variable of the given machine integer type.
    pub fn typed(&self, name: &str, ty: IntType) -> Variable {
        let var = self.named(name);
        self.table.write().types.insert(var.index() as u32, ty);
        var
    }

    /// Get or create the synthetic variable holding the contents of `loc`.
    pub fn cell(&self, loc: MemLoc) -> Variable {
        let key = VariableKey::Cell(loc);
        if let Some(i) = self.table.read().interner.get(&key) {
            return Variable::new(i);
        }
        Variable::new(self.table.write().interner.put(key))
    }

    /// Declared machine integer type of a variable, if the front end gave one.
    pub fn int_type(&self, var: Variable) -> Option<IntType> {
        self.table.read().types.get(&(var.index() as u32)).copied()
    }

    pub fn key(&self, var: Variable) -> VariableKey {
        self.table.read().interner.key(var.index() as u32).clone()
    }

    /// Human-readable name, used by `Display` helpers and logs.
    pub fn name(&self, var: Variable) -> String {
        match self.key(var) {
            VariableKey::Named(name) => name,
            VariableKey::Cell(loc) => format!("*{}", loc),
        }
    }

    pub fn len(&self) -> usize {
        self.table.read().interner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Kind of an abstract memory location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemKind {
    /// Address of a program variable (`&x`); its contents is the variable itself.
    Variable(Variable),
    /// Global object by name.
    Global(String),
    /// All objects allocated at one call site.
    Alloc(CallId),
    /// Code of a function (target of function pointers).
    Function(FunctionId),
}

/// Factory of [`MemLoc`] handles.
#[derive(Debug, Default)]
pub struct MemoryFactory {
    interner: RwLock<Interner<MemKind>>,
}

impl MemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&self, kind: MemKind) -> MemLoc {
        if let Some(i) = self.interner.read().get(&kind) {
            return MemLoc::new(i);
        }
        MemLoc::new(self.interner.write().put(kind))
    }

    pub fn variable(&self, var: Variable) -> MemLoc {
        self.intern(MemKind::Variable(var))
    }

    pub fn global(&self, name: &str) -> MemLoc {
        self.intern(MemKind::Global(name.to_string()))
    }

    pub fn alloc(&self, site: CallId) -> MemLoc {
        self.intern(MemKind::Alloc(site))
    }

    pub fn function(&self, fun: FunctionId) -> MemLoc {
        self.intern(MemKind::Function(fun))
    }

    pub fn kind(&self, loc: MemLoc) -> MemKind {
        self.interner.read().key(loc.index() as u32).clone()
    }

    /// The function behind a function location, if `loc` is one.
    pub fn as_function(&self, loc: MemLoc) -> Option<FunctionId> {
        match self.kind(loc) {
            MemKind::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Variable holding the contents of `loc`.
    ///
    /// The contents of `&x` is `x` itself; other locations get a synthetic cell variable.
    pub fn cell(&self, loc: MemLoc, vars: &VariableFactory) -> Variable {
        match self.kind(loc) {
            MemKind::Variable(v) => v,
            _ => vars.cell(loc),
        }
    }

    /// Whether a location may stand for several concrete objects (forbids strong updates).
    pub fn is_summary(&self, loc: MemLoc) -> bool {
        matches!(self.kind(loc), MemKind::Alloc(_))
    }

    pub fn len(&self) -> usize {
        self.interner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number::Signedness;

    #[test]
    fn test_variables_are_interned() {
        let vars = VariableFactory::new();
        let x = vars.named("x");
        let y = vars.named("y");
        assert_ne!(x, y);
        assert_eq!(vars.named("x"), x);
        assert_eq!(vars.len(), 2);
        assert_eq!(vars.name(y), "y");
    }

    #[test]
    fn test_typed_variable() {
        let vars = VariableFactory::new();
        let ty = IntType::new(8, Signedness::Unsigned);
        let c = vars.typed("c", ty);
        assert_eq!(vars.int_type(c), Some(ty));
        assert_eq!(vars.int_type(vars.named("d")), None);
    }

    #[test]
    fn test_cells() {
        let vars = VariableFactory::new();
        let mems = MemoryFactory::new();
        let x = vars.named("x");
        let lx = mems.variable(x);
        let g = mems.global("g");
        assert_eq!(mems.variable(x), lx);
        assert_eq!(mems.cell(lx, &vars), x);
        let cg = mems.cell(g, &vars);
        assert_ne!(cg, x);
        assert_eq!(mems.cell(g, &vars), cg);
        assert_eq!(vars.key(cg), VariableKey::Cell(g));
    }

    #[test]
    fn test_function_locations() {
        let mems = MemoryFactory::new();
        let f = mems.function(FunctionId(3));
        assert_eq!(mems.as_function(f), Some(FunctionId(3)));
        assert_eq!(mems.as_function(mems.global("g")), None);
        assert!(mems.is_summary(mems.alloc(CallId(1))));
        assert!(!mems.is_summary(f));
    }
}
