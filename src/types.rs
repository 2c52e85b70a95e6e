//! Type-safe handles for the entities the engine talks about.
//!
//! Every handle is a small index into an arena owned by a factory
//! (see [`factory`][crate::factory]) or by the program representation
//! (see [`cfg`][crate::cfg]). Handles are `Copy`, totally ordered and
//! hashable. The order is only used for deterministic iteration, never
//! for semantics.
use std::fmt;

/// A program variable or a synthetic variable (e.g. a memory cell).
///
/// # Invariants
///
/// - Two equal handles always denote the same variable.
/// - Handles are only meaningful for the [`VariableFactory`][crate::factory::VariableFactory]
///   that produced them.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Variable(u32);

impl Variable {
    /// Creates a variable handle from its raw index.
    pub const fn new(index: u32) -> Self {
        Variable(index)
    }

    /// Returns the raw index as a `usize`.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// An abstract memory location (local, global, allocation site, function).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MemLoc(u32);

impl MemLoc {
    pub const fn new(index: u32) -> Self {
        MemLoc(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MemLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// A function of the analyzed [`Program`][crate::cfg::Program].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FunctionId(pub u32);

impl FunctionId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

/// A basic block inside one control flow graph (0 is the entry).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BlockId(pub usize);

impl BlockId {
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// A call statement.
///
/// Call identifiers are unique across the whole program, so a `CallId`
/// alone names a call site.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CallId(pub u32);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call#{}", self.0)
    }
}

/// An interned calling context, see [`CallContextFactory`][crate::context::CallContextFactory].
///
/// # Invariants
///
/// - `ContextId::EMPTY` (index 0) is the empty context of the program entry point.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ContextId(u32);

impl ContextId {
    /// The empty calling context.
    pub const EMPTY: ContextId = ContextId(0);

    pub(crate) const fn new(index: u32) -> Self {
        ContextId(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_order() {
        let v1 = Variable::new(1);
        let v2 = Variable::new(2);
        assert_eq!(v1.index(), 1);
        assert!(v1 < v2);
        assert_eq!(v2.to_string(), "v2");
    }

    #[test]
    fn test_empty_context() {
        assert!(ContextId::EMPTY.is_empty());
        assert!(!ContextId::new(3).is_empty());
        assert_eq!(ContextId::new(3).index(), 3);
    }

    #[test]
    fn test_display() {
        assert_eq!(BlockId(4).to_string(), "B4");
        assert_eq!(CallId(7).to_string(), "call#7");
        assert_eq!(FunctionId(2).to_string(), "f2");
        assert_eq!(MemLoc::new(9).to_string(), "@9");
    }
}
