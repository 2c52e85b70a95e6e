//! Program representation consumed by the engine.
//!
//! A [`Program`] is a set of [`Function`]s; a defined function has a body,
//! a [`Cfg`] of [`BasicBlock`]s. Each block holds a sequence of
//! [`Statement`]s and ends with a [`Terminator`]. The CFG is built once by
//! the front end (see [`CfgBuilder`]) and is immutable during analysis.
//!
//! ## Example
//!
//! ```rust
//! use fixpoint_rs::cfg::{CfgBuilder, Statement};
//! use fixpoint_rs::expr::Expr;
//! use fixpoint_rs::factory::VariableFactory;
//!
//! let vars = VariableFactory::new();
//! let i = vars.named("i");
//!
//! let mut builder = CfgBuilder::new();
//! let entry = builder.entry();
//! let head = builder.new_block("head");
//! let body = builder.new_block("body");
//! let exit = builder.new_block("exit");
//!
//! builder.add_statement(entry, Statement::assign(i, Expr::constant(0)));
//! builder.add_goto(entry, head);
//! builder.add_branch(head, Expr::var(i).lt(Expr::constant(10)), body, exit);
//! builder.add_statement(body, Statement::assign(i, Expr::var(i).add(Expr::constant(1))));
//! builder.add_goto(body, head);
//! builder.add_return(exit);
//!
//! let cfg = builder.build();
//! assert_eq!(cfg.predecessors(head).len(), 2);
//! ```

use std::collections::BTreeSet;
use std::fmt;

use crate::expr::{Expr, Operand, Predicate};
use crate::types::{BlockId, CallId, FunctionId, MemLoc, Variable};

/// Target of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    Direct(FunctionId),
    /// Call through a function pointer.
    Indirect(Variable),
}

/// A call statement: `result = callee(args...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub id: CallId,
    pub callee: Callee,
    pub args: Vec<Operand>,
    pub result: Option<Variable>,
}

/// A statement within a basic block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Integer assignment: `lhs = rhs`
    Assign { lhs: Variable, rhs: Expr },
    /// Assumption (comparison that filters the state)
    Assume(Predicate),
    /// Non-deterministic value
    Havoc(Variable),
    /// `lhs = &loc`
    AddressOf { lhs: Variable, loc: MemLoc },
    /// `lhs = null`
    Null { lhs: Variable },
    /// Pointer arithmetic: `lhs = base + offset` (bytes)
    PointerShift { lhs: Variable, base: Variable, offset: Expr },
    /// `ptr == null` or `ptr != null`
    AssumeNull { ptr: Variable, is_null: bool },
    /// `lhs = *ptr`
    Load { lhs: Variable, ptr: Variable },
    /// `*ptr = value`
    Store { ptr: Variable, value: Operand },
    Call(CallSite),
}

impl Statement {
    pub fn assign(lhs: Variable, rhs: impl Into<Expr>) -> Self {
        Statement::Assign { lhs, rhs: rhs.into() }
    }

    /// Pointer copy: `lhs = base`
    pub fn copy_pointer(lhs: Variable, base: Variable) -> Self {
        Statement::PointerShift {
            lhs,
            base,
            offset: Expr::constant(0),
        }
    }

    /// Variables read or written by this statement.
    pub fn variables(&self) -> Vec<Variable> {
        let mut vars = Vec::new();
        match self {
            Statement::Assign { lhs, rhs } => {
                vars.push(*lhs);
                vars.extend(rhs.variables());
            }
            Statement::Assume(p) => collect_predicate(p, &mut vars),
            Statement::Havoc(x) | Statement::Null { lhs: x } | Statement::AddressOf { lhs: x, .. } => vars.push(*x),
            Statement::PointerShift { lhs, base, offset } => {
                vars.push(*lhs);
                vars.push(*base);
                vars.extend(offset.variables());
            }
            Statement::AssumeNull { ptr, .. } => vars.push(*ptr),
            Statement::Load { lhs, ptr } => {
                vars.push(*lhs);
                vars.push(*ptr);
            }
            Statement::Store { ptr, value } => {
                vars.push(*ptr);
                vars.extend(value.as_var());
            }
            Statement::Call(call) => {
                if let Callee::Indirect(p) = call.callee {
                    vars.push(p);
                }
                vars.extend(call.args.iter().filter_map(|a| a.as_var()));
                vars.extend(call.result);
            }
        }
        vars
    }
}

fn collect_predicate(p: &Predicate, vars: &mut Vec<Variable>) {
    match p {
        Predicate::True | Predicate::False => {}
        Predicate::Cmp(_, a, b) => {
            vars.extend(a.variables());
            vars.extend(b.variables());
        }
        Predicate::Not(q) => collect_predicate(q, vars),
        Predicate::And(q, r) | Predicate::Or(q, r) => {
            collect_predicate(q, vars);
            collect_predicate(r, vars);
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Assign { lhs, rhs } => write!(f, "{} = {}", lhs, rhs),
            Statement::Assume(p) => write!(f, "assume({})", p),
            Statement::Havoc(x) => write!(f, "{} = havoc()", x),
            Statement::AddressOf { lhs, loc } => write!(f, "{} = &{}", lhs, loc),
            Statement::Null { lhs } => write!(f, "{} = null", lhs),
            Statement::PointerShift { lhs, base, offset } => write!(f, "{} = {} +p {}", lhs, base, offset),
            Statement::AssumeNull { ptr, is_null } => {
                write!(f, "assume({} {} null)", ptr, if *is_null { "==" } else { "!=" })
            }
            Statement::Load { lhs, ptr } => write!(f, "{} = *{}", lhs, ptr),
            Statement::Store { ptr, value } => write!(f, "*{} = {}", ptr, value),
            Statement::Call(call) => {
                if let Some(r) = call.result {
                    write!(f, "{} = ", r)?;
                }
                match &call.callee {
                    Callee::Direct(fun) => write!(f, "{}", fun)?,
                    Callee::Indirect(p) => write!(f, "(*{})", p)?,
                }
                let args: Vec<String> = call.args.iter().map(|a| a.to_string()).collect();
                write!(f, "({}) [{}]", args.join(", "), call.id)
            }
        }
    }
}

/// How control flow leaves a basic block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    /// Unconditional jump to another block.
    Goto(BlockId),
    /// Conditional branch: `condition` holds on the edge to `then`,
    /// its negation on the edge to `otherwise`.
    Branch {
        condition: Predicate,
        then: BlockId,
        otherwise: BlockId,
    },
    /// Function return.
    Return,
    /// No successor.
    Unreachable,
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Goto(target) => write!(f, "goto {}", target),
            Terminator::Branch {
                condition,
                then,
                otherwise,
            } => write!(f, "if {} then {} else {}", condition, then, otherwise),
            Terminator::Return => write!(f, "return"),
            Terminator::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// A basic block in the CFG.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    /// Human-readable label.
    pub label: String,
    pub statements: Vec<Statement>,
    pub terminator: Terminator,
}

impl BasicBlock {
    fn new(id: BlockId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            statements: Vec::new(),
            terminator: Terminator::Unreachable,
        }
    }

    /// Successor block IDs from the terminator.
    pub fn successors(&self) -> Vec<BlockId> {
        match &self.terminator {
            Terminator::Goto(target) => vec![*target],
            Terminator::Branch { then, otherwise, .. } => {
                if then == otherwise {
                    vec![*then]
                } else {
                    vec![*then, *otherwise]
                }
            }
            Terminator::Return | Terminator::Unreachable => vec![],
        }
    }
}

/// A CFG edge with the condition assumed when taking it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: BlockId,
    pub to: BlockId,
    /// `None` for unconditional edges.
    pub guard: Option<Predicate>,
}

/// Control flow graph of one function body.
///
/// # Invariants
///
/// - Exactly one entry block.
/// - Every terminator target is a block of this graph.
#[derive(Debug, Clone)]
pub struct Cfg {
    blocks: Vec<BasicBlock>,
    entry: BlockId,
    in_edges: Vec<Vec<Edge>>,
}

impl Cfg {
    fn new(blocks: Vec<BasicBlock>, entry: BlockId) -> Self {
        let mut in_edges: Vec<Vec<Edge>> = vec![Vec::new(); blocks.len()];
        for block in &blocks {
            match &block.terminator {
                Terminator::Goto(to) => in_edges[to.0].push(Edge {
                    from: block.id,
                    to: *to,
                    guard: None,
                }),
                Terminator::Branch {
                    condition,
                    then,
                    otherwise,
                } if then == otherwise => in_edges[then.0].push(Edge {
                    from: block.id,
                    to: *then,
                    guard: Some(condition.clone().or(condition.negate())),
                }),
                Terminator::Branch {
                    condition,
                    then,
                    otherwise,
                } => {
                    in_edges[then.0].push(Edge {
                        from: block.id,
                        to: *then,
                        guard: Some(condition.clone()),
                    });
                    in_edges[otherwise.0].push(Edge {
                        from: block.id,
                        to: *otherwise,
                        guard: Some(condition.negate()),
                    });
                }
                Terminator::Return | Terminator::Unreachable => {}
            }
        }
        Self {
            blocks,
            entry,
            in_edges,
        }
    }

    pub fn entry(&self) -> BlockId {
        self.entry
    }

    /// Get a block by ID.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a block of this graph.
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.0]
    }

    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    pub fn successors(&self, id: BlockId) -> Vec<BlockId> {
        self.block(id).successors()
    }

    pub fn predecessors(&self, id: BlockId) -> Vec<BlockId> {
        let mut preds: Vec<BlockId> = self.in_edges[id.0].iter().map(|e| e.from).collect();
        preds.dedup();
        preds
    }

    /// Incoming edges of a block, with their guards.
    pub fn in_edges(&self, id: BlockId) -> &[Edge] {
        &self.in_edges[id.0]
    }

    /// Blocks ending with [`Terminator::Return`].
    pub fn exits(&self) -> Vec<BlockId> {
        self.blocks
            .iter()
            .filter(|b| matches!(b.terminator, Terminator::Return))
            .map(|b| b.id)
            .collect()
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn num_edges(&self) -> usize {
        self.in_edges.iter().map(|e| e.len()).sum()
    }

    /// Call sites of the body, in block order.
    pub fn calls(&self) -> impl Iterator<Item = &CallSite> {
        self.blocks.iter().flat_map(|b| {
            b.statements.iter().filter_map(|s| match s {
                Statement::Call(call) => Some(call),
                _ => None,
            })
        })
    }

    /// Every variable mentioned by the body.
    pub fn variables(&self) -> BTreeSet<Variable> {
        let mut vars = BTreeSet::new();
        for block in &self.blocks {
            for stmt in &block.statements {
                vars.extend(stmt.variables());
            }
            if let Terminator::Branch { condition, .. } = &block.terminator {
                let mut cond_vars = Vec::new();
                collect_predicate(condition, &mut cond_vars);
                vars.extend(cond_vars);
            }
        }
        vars
    }
}

impl fmt::Display for Cfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            writeln!(f, "{} ({}):", block.id, block.label)?;
            for stmt in &block.statements {
                writeln!(f, "    {}", stmt)?;
            }
            writeln!(f, "    {}", block.terminator)?;
        }
        Ok(())
    }
}

/// Builder for constructing CFGs incrementally.
#[derive(Debug)]
pub struct CfgBuilder {
    blocks: Vec<BasicBlock>,
    entry: Option<BlockId>,
}

impl CfgBuilder {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            entry: None,
        }
    }

    /// Get or create the entry block.
    pub fn entry(&mut self) -> BlockId {
        if let Some(entry) = self.entry {
            entry
        } else {
            let id = self.new_block("entry");
            self.entry = Some(id);
            id
        }
    }

    /// Create a new basic block with a label.
    pub fn new_block(&mut self, label: impl Into<String>) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(BasicBlock::new(id, label));
        id
    }

    pub fn add_statement(&mut self, block: BlockId, stmt: Statement) {
        self.blocks[block.0].statements.push(stmt);
    }

    pub fn set_terminator(&mut self, block: BlockId, terminator: Terminator) {
        self.blocks[block.0].terminator = terminator;
    }

    pub fn add_return(&mut self, block: BlockId) {
        self.set_terminator(block, Terminator::Return);
    }

    pub fn add_goto(&mut self, from: BlockId, to: BlockId) {
        self.set_terminator(from, Terminator::Goto(to));
    }

    pub fn add_branch(&mut self, block: BlockId, condition: Predicate, then: BlockId, otherwise: BlockId) {
        self.set_terminator(
            block,
            Terminator::Branch {
                condition,
                then,
                otherwise,
            },
        );
    }

    /// Build the CFG.
    ///
    /// # Panics
    ///
    /// Panics if a terminator targets a block that was not created by this builder.
    pub fn build(mut self) -> Cfg {
        let entry = self.entry();
        let n = self.blocks.len();
        for block in &self.blocks {
            for succ in block.successors() {
                assert!(succ.0 < n, "{} jumps to unknown block {}", block.id, succ);
            }
        }
        Cfg::new(self.blocks, entry)
    }
}

impl Default for CfgBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A function of the analyzed program.
#[derive(Debug, Clone)]
pub struct Function {
    pub id: FunctionId,
    pub name: String,
    pub params: Vec<Variable>,
    /// Variable holding the returned value, assigned by the body before `return`.
    pub result: Option<Variable>,
    /// `None` for functions that are only declared.
    pub body: Option<Cfg>,
}

impl Function {
    pub fn is_defined(&self) -> bool {
        self.body.is_some()
    }

    /// Parameters, result and every variable of the body.
    pub fn locals(&self) -> BTreeSet<Variable> {
        let mut vars = self.body.as_ref().map(|b| b.variables()).unwrap_or_default();
        vars.extend(self.params.iter().copied());
        vars.extend(self.result);
        vars
    }
}

/// The analyzed program: functions and global memory locations.
#[derive(Debug, Clone, Default)]
pub struct Program {
    functions: Vec<Function>,
    globals: Vec<MemLoc>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a function without a body.
    pub fn declare(&mut self, name: impl Into<String>, params: Vec<Variable>, result: Option<Variable>) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        self.functions.push(Function {
            id,
            name: name.into(),
            params,
            result,
            body: None,
        });
        id
    }

    /// Give a body to a declared function.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not declared in this program.
    pub fn define(&mut self, id: FunctionId, body: Cfg) {
        self.functions[id.index()].body = Some(body);
    }

    pub fn add_global(&mut self, loc: MemLoc) {
        self.globals.push(loc);
    }

    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id.index())
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    pub fn globals(&self) -> &[MemLoc] {
        &self.globals
    }
}
