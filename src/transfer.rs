//! Abstract transfer functions for statements, edges and calls.

use std::marker::PhantomData;

use crate::cfg::{CallSite, Callee, Function, Statement};
use crate::expr::{Expr, Operand, Predicate};
use crate::factory::{MemKind, MemoryFactory, VariableFactory, VariableKey};
use crate::interval::Interval;
use crate::lattice::Lattice;
use crate::numeric::NumericDomain;
use crate::pointer::Nullity;
use crate::types::{FunctionId, MemLoc, Variable};
use crate::value::ValueDomain;

/// What a call may call, given the state at the call site.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CallTarget {
    /// Exactly one function.
    Function(FunctionId),
    /// The called pointer is null: the call never returns normally.
    Null,
    /// Unresolved (several targets, or unknown).
    Unknown,
}

/// Conservative effect applied when a call is not analyzed through the callee body.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CallEffect {
    /// Callee is declared but has no body (library function).
    Extern,
    /// Callee has a body but is not inlined (recursive call).
    UnknownInternal,
    /// Callee could not be resolved.
    Unknown,
}

/// Assumptions made by [`CallEffect`]s.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CallEffectPolicy {
    /// Whether extern functions may write through their pointer arguments.
    pub extern_writes_through_pointers: bool,
    /// Whether an unknown call result is bounded by its declared machine integer type.
    pub bound_result_by_type: bool,
}

impl Default for CallEffectPolicy {
    fn default() -> Self {
        Self {
            extern_writes_through_pointers: false,
            bound_result_by_type: true,
        }
    }
}

/// Abstract semantics of the program representation: `⟦stmt⟧♯: Domain → Domain`.
///
/// Call statements are interpreted by the fixpoint driver, which resolves
/// the callee with [`resolve_callee`](Self::resolve_callee), then either
/// inlines it (binding parameters with [`match_down`](Self::match_down)
/// and results with [`match_up`](Self::match_up)) or applies a
/// [`call_effect`](Self::call_effect).
pub trait Transfer {
    type Domain: Lattice;

    /// Apply a statement. A [`Statement::Call`] is treated as an unknown call.
    fn exec(&self, stmt: &Statement, pre: Self::Domain) -> Self::Domain;

    /// Assume the guard of a CFG edge.
    fn exec_edge(&self, guard: &Predicate, pre: Self::Domain) -> Self::Domain;

    fn resolve_callee(&self, call: &CallSite, pre: &Self::Domain) -> CallTarget;

    /// Entry value of `callee` for the call site state `pre`.
    fn match_down(&self, call: &CallSite, callee: &Function, pre: &Self::Domain) -> Self::Domain;

    /// State after the call, from the join of the callee exits.
    fn match_up(&self, call: &CallSite, callee: &Function, exit: &Self::Domain) -> Self::Domain;

    fn call_effect(&self, call: &CallSite, effect: CallEffect, pre: Self::Domain) -> Self::Domain;
}

/// Transfer function over [`ValueDomain`]: any [`NumericDomain`] for
/// integers, points-to sets with nullity for pointers.
///
/// Memory is field-insensitive: each memory location has one cell
/// variable, obtained from the [`MemoryFactory`]. A store through a pointer
/// to a single non-summary location is a strong update; any other store is
/// weak (joined with the previous contents).
#[derive(Debug)]
pub struct NumericalTransfer<'a, N> {
    vars: &'a VariableFactory,
    mems: &'a MemoryFactory,
    policy: CallEffectPolicy,
    _domain: PhantomData<fn() -> N>,
}

impl<'a, N: NumericDomain> NumericalTransfer<'a, N> {
    pub fn new(vars: &'a VariableFactory, mems: &'a MemoryFactory) -> Self {
        Self {
            vars,
            mems,
            policy: CallEffectPolicy::default(),
            _domain: PhantomData,
        }
    }

    pub fn with_policy(mut self, policy: CallEffectPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &CallEffectPolicy {
        &self.policy
    }

    /// `dst := src`, as an integer and as a pointer.
    fn copy_var(&self, state: &mut ValueDomain<N>, dst: Variable, src: Variable) {
        if dst == src {
            return;
        }
        let pointer = state.pointers().get(src);
        state.update_numeric(|n| n.assign_var(dst, src));
        state.update_pointers(|p| p.set(dst, pointer));
    }

    fn copy_operand(&self, state: &mut ValueDomain<N>, dst: Variable, src: &Operand) {
        match src {
            Operand::Var(y) => self.copy_var(state, dst, *y),
            Operand::Int(c) => {
                state.update_numeric(|n| n.assign(dst, &Expr::Const(c.clone())));
                state.update_pointers(|p| p.remove(dst));
            }
            Operand::Null => {
                state.update_numeric(|n| n.forget(dst));
                state.update_pointers(|p| p.assign_null(dst));
            }
        }
    }

    fn havoc(&self, state: &mut ValueDomain<N>, x: Variable, bound_by_type: bool) {
        state.forget(x);
        if bound_by_type {
            if let Some(ty) = self.vars.int_type(x) {
                state.update_numeric(|n| n.refine_interval(x, &Interval::for_type(ty)));
            }
        }
    }

    fn cell(&self, loc: MemLoc) -> Variable {
        self.mems.cell(loc, self.vars)
    }

    /// Forget the contents of every memory location.
    fn forget_memory(&self, state: &mut ValueDomain<N>) {
        self.forget_cells(state, |_| true);
        for i in 0..self.mems.len() {
            if let MemKind::Variable(v) = self.mems.kind(MemLoc::new(i as u32)) {
                state.forget(v);
            }
        }
    }

    /// Forget the synthetic cells of the state whose location satisfies `pred`.
    fn forget_cells(&self, state: &mut ValueDomain<N>, pred: impl Fn(MemLoc) -> bool) {
        let mut vars = state.numeric().variables();
        vars.extend(state.pointers().iter().map(|(x, _)| *x));
        for x in vars {
            if let VariableKey::Cell(loc) = self.vars.key(x) {
                if pred(loc) {
                    state.forget(x);
                }
            }
        }
    }

    /// Write `value` into every location `ptr` may point to.
    fn store(&self, state: &mut ValueDomain<N>, ptr: Variable, value: &Operand) {
        let target = state.pointers().get(ptr);
        if target.nullity() == Nullity::Null {
            log::debug!("store through null pointer {}", ptr);
            state.set_to_bottom();
            return;
        }
        match target.points_to().locations() {
            None => {
                log::debug!("store through unknown pointer {}, forgetting memory", ptr);
                self.forget_memory(state);
            }
            Some(locs) => {
                let strong = locs.len() == 1 && locs.iter().all(|l| !self.mems.is_summary(*l));
                for loc in locs {
                    let cell = self.cell(*loc);
                    if strong {
                        self.copy_operand(state, cell, value);
                    } else {
                        let mut updated = state.clone();
                        self.copy_operand(&mut updated, cell, value);
                        *state = state.join(&updated);
                    }
                }
            }
        }
        state.update_pointers(|p| p.assume_nullity(ptr, false));
    }

    /// `lhs := *ptr`
    fn load(&self, state: &mut ValueDomain<N>, lhs: Variable, ptr: Variable) {
        let target = state.pointers().get(ptr);
        if target.nullity() == Nullity::Null {
            log::debug!("load through null pointer {}", ptr);
            state.set_to_bottom();
            return;
        }
        state.update_pointers(|p| p.assume_nullity(ptr, false));
        match target.points_to().locations() {
            None => state.forget(lhs),
            Some(locs) => {
                let mut result = ValueDomain::bottom();
                for loc in locs {
                    let mut s = state.clone();
                    self.copy_var(&mut s, lhs, self.cell(*loc));
                    result = result.join(&s);
                }
                *state = result;
            }
        }
    }

    /// Forget what a call may write: memory reachable from pointer arguments and globals.
    fn invalidate(&self, state: &mut ValueDomain<N>, call: &CallSite) {
        for arg in call.args.iter().filter_map(|a| a.as_var()) {
            if self.vars.int_type(arg).is_some() {
                continue;
            }
            let value = state.pointers().get(arg);
            if !value.nullity().may_be_non_null() {
                continue;
            }
            match value.points_to().locations() {
                None => {
                    self.forget_memory(state);
                    return;
                }
                Some(locs) => {
                    for loc in locs {
                        state.forget(self.cell(*loc));
                    }
                }
            }
        }
        self.forget_cells(state, |loc| matches!(self.mems.kind(loc), MemKind::Global(_)));
    }
}

/// Interval of an expression, from the intervals of its variables.
pub fn eval_interval<N: NumericDomain>(n: &N, e: &Expr) -> Interval {
    if n.is_bottom() {
        return Interval::bottom();
    }
    match e {
        Expr::Var(x) => n.interval_of(*x),
        Expr::Const(c) => Interval::singleton(c.clone()),
        Expr::Add(a, b) => eval_interval(n, a).add(&eval_interval(n, b)),
        Expr::Sub(a, b) => eval_interval(n, a).sub(&eval_interval(n, b)),
        Expr::Mul(a, b) => eval_interval(n, a).mul(&eval_interval(n, b)),
        Expr::Div(a, b) => eval_interval(n, a).div(&eval_interval(n, b)),
        Expr::Rem(a, b) => eval_interval(n, a).rem(&eval_interval(n, b)),
        Expr::Neg(a) => eval_interval(n, a).neg(),
    }
}

impl<N: NumericDomain> Transfer for NumericalTransfer<'_, N> {
    type Domain = ValueDomain<N>;

    fn exec(&self, stmt: &Statement, pre: Self::Domain) -> Self::Domain {
        if pre.is_bottom() {
            return pre;
        }
        let mut post = pre;
        match stmt {
            Statement::Assign { lhs, rhs } => {
                post.update_numeric(|n| n.assign(*lhs, rhs));
                post.update_pointers(|p| p.remove(*lhs));
            }
            Statement::Assume(p) => post.update_numeric(|n| n.assume(p)),
            Statement::Havoc(x) => self.havoc(&mut post, *x, true),
            Statement::AddressOf { lhs, loc } => {
                post.update_numeric(|n| n.forget(*lhs));
                post.update_pointers(|p| p.assign_address(*lhs, *loc));
            }
            Statement::Null { lhs } => {
                post.update_numeric(|n| n.forget(*lhs));
                post.update_pointers(|p| p.assign_null(*lhs));
            }
            Statement::PointerShift { lhs, base, offset } => {
                let delta = eval_interval(post.numeric(), offset);
                post.update_numeric(|n| n.forget(*lhs));
                post.update_pointers(|p| p.assign_pointer(*lhs, *base, &delta));
            }
            Statement::AssumeNull { ptr, is_null } => post.update_pointers(|p| p.assume_nullity(*ptr, *is_null)),
            Statement::Load { lhs, ptr } => self.load(&mut post, *lhs, *ptr),
            Statement::Store { ptr, value } => self.store(&mut post, *ptr, value),
            Statement::Call(call) => post = self.call_effect(call, CallEffect::Unknown, post),
        }
        post
    }

    fn exec_edge(&self, guard: &Predicate, pre: Self::Domain) -> Self::Domain {
        let mut post = pre;
        post.update_numeric(|n| n.assume(guard));
        post
    }

    fn resolve_callee(&self, call: &CallSite, pre: &Self::Domain) -> CallTarget {
        match call.callee {
            Callee::Direct(f) => CallTarget::Function(f),
            Callee::Indirect(p) => {
                let value = pre.pointers().get(p);
                if value.nullity() == Nullity::Null {
                    return CallTarget::Null;
                }
                match value.points_to().as_singleton().and_then(|loc| self.mems.as_function(loc)) {
                    Some(f) => CallTarget::Function(f),
                    None => {
                        log::debug!("unresolved indirect call {} through {}", call.id, p);
                        CallTarget::Unknown
                    }
                }
            }
        }
    }

    fn match_down(&self, call: &CallSite, callee: &Function, pre: &Self::Domain) -> Self::Domain {
        let mut entry = pre.clone();
        if let Callee::Indirect(p) = call.callee {
            entry.update_pointers(|ptr| ptr.assume_nullity(p, false));
        }
        for (formal, actual) in callee.params.iter().zip(&call.args) {
            self.copy_operand(&mut entry, *formal, actual);
        }
        entry
    }

    fn match_up(&self, call: &CallSite, callee: &Function, exit: &Self::Domain) -> Self::Domain {
        let mut post = exit.clone();
        if let Some(res) = call.result {
            match callee.result {
                Some(ret) => self.copy_var(&mut post, res, ret),
                None => post.forget(res),
            }
        }
        for x in callee.locals() {
            if Some(x) != call.result {
                post.forget(x);
            }
        }
        post
    }

    fn call_effect(&self, call: &CallSite, effect: CallEffect, pre: Self::Domain) -> Self::Domain {
        let mut post = pre;
        if post.is_bottom() {
            return post;
        }
        let writes = match effect {
            CallEffect::Extern => self.policy.extern_writes_through_pointers,
            CallEffect::UnknownInternal | CallEffect::Unknown => true,
        };
        if writes {
            self.invalidate(&mut post, call);
        }
        if let Some(res) = call.result {
            self.havoc(&mut post, res, self.policy.bound_result_by_type);
        }
        post
    }
}
