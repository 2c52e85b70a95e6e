//! Interprocedural analysis driver.
//!
//! The [`Analyzer`] computes the fixpoint of an entry function and inlines
//! callees dynamically: on a call to a defined function it runs a nested
//! [`FunctionFixpoint`] of the callee, seeded with the call site state, or
//! reuses the summary stored in the [`FixpointCache`] if it was computed
//! from the same entry value. Calls that cannot be inlined (unresolved,
//! extern, recursive) use the [`CallEffect`]s of the transfer function.
//!
//! Once the entry fixpoint has converged, a collection pass replays the
//! calls with the converged states and records the invariants of every
//! reached `(function, context)` in [`AnalysisResults`].

use std::collections::{BTreeMap, HashMap};

use crate::cache::FixpointCache;
use crate::cfg::{BasicBlock, CallSite, Cfg, Function, Program, Statement};
use crate::context::CallContextFactory;
use crate::error::{AnalysisError, Result};
use crate::expr::Predicate;
use crate::fixpoint::{BlockSemantics, FunctionFixpoint};
use crate::lattice::Lattice;
use crate::params::AnalysisOptions;
use crate::progress::ScopeKind;
use crate::transfer::{CallEffect, CallTarget, Transfer};
use crate::types::{BlockId, ContextId, FunctionId};
use crate::wto::Wto;

/// Converged invariants of one function in one calling context.
#[derive(Debug, Clone)]
pub struct FunctionInvariants<D> {
    pub function: FunctionId,
    pub context: ContextId,
    pre: Vec<D>,
    post: Vec<D>,
    exit: D,
}

impl<D: Lattice> FunctionInvariants<D> {
    /// Invariant at the start of `block`.
    pub fn pre(&self, block: BlockId) -> &D {
        &self.pre[block.0]
    }

    /// Invariant at the end of `block`.
    pub fn post(&self, block: BlockId) -> &D {
        &self.post[block.0]
    }

    /// Join of the values at the exits.
    pub fn exit(&self) -> &D {
        &self.exit
    }

    pub fn is_reachable(&self, block: BlockId) -> bool {
        !self.pre[block.0].is_bottom()
    }

    fn join_with(&mut self, other: &Self) {
        for (a, b) in self.pre.iter_mut().zip(&other.pre) {
            a.join_with(b);
        }
        for (a, b) in self.post.iter_mut().zip(&other.post) {
            a.join_with(b);
        }
        self.exit.join_with(&other.exit);
    }
}

/// Result of analyzing one entry point.
#[derive(Debug, Clone)]
pub struct AnalysisResults<D> {
    entry: FunctionId,
    invariants: BTreeMap<(FunctionId, ContextId), FunctionInvariants<D>>,
}

impl<D: Lattice> AnalysisResults<D> {
    fn new(entry: FunctionId) -> Self {
        Self {
            entry,
            invariants: BTreeMap::new(),
        }
    }

    fn record(&mut self, inv: FunctionInvariants<D>) {
        match self.invariants.get_mut(&(inv.function, inv.context)) {
            Some(existing) => existing.join_with(&inv),
            None => {
                self.invariants.insert((inv.function, inv.context), inv);
            }
        }
    }

    pub fn entry(&self) -> FunctionId {
        self.entry
    }

    /// Invariants of the entry function.
    pub fn entry_invariants(&self) -> Option<&FunctionInvariants<D>> {
        self.get(self.entry, ContextId::EMPTY)
    }

    pub fn get(&self, function: FunctionId, context: ContextId) -> Option<&FunctionInvariants<D>> {
        self.invariants.get(&(function, context))
    }

    /// Contexts in which `function` was reached.
    pub fn contexts(&self, function: FunctionId) -> Vec<ContextId> {
        self.invariants.keys().filter(|(f, _)| *f == function).map(|(_, c)| *c).collect()
    }

    /// Invariants of `function`, joined over all its contexts.
    pub fn function(&self, function: FunctionId) -> Option<FunctionInvariants<D>> {
        let mut joined: Option<FunctionInvariants<D>> = None;
        for inv in self.invariants.values().filter(|inv| inv.function == function) {
            if let Some(j) = joined.as_mut() {
                j.join_with(inv);
            } else {
                let mut first = inv.clone();
                first.context = ContextId::EMPTY;
                joined = Some(first);
            }
        }
        joined
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionInvariants<D>> {
        self.invariants.values()
    }

    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

/// Interprocedural analyzer over a [`Program`].
///
/// The analyzer can be shared between threads analyzing different entry
/// points: the cache and context factory lock internally, and each
/// fixpoint owns its invariants.
pub struct Analyzer<'p, T: Transfer> {
    program: &'p Program,
    transfer: T,
    options: AnalysisOptions,
    contexts: CallContextFactory,
    cache: FixpointCache<T::Domain>,
    wtos: HashMap<FunctionId, Wto>,
}

impl<'p, T: Transfer> Analyzer<'p, T> {
    pub fn new(program: &'p Program, transfer: T, options: AnalysisOptions) -> Self {
        let wtos = program
            .functions()
            .iter()
            .filter_map(|f| f.body.as_ref().map(|cfg| (f.id, Wto::new(cfg))))
            .collect();
        Self {
            program,
            transfer,
            options,
            contexts: CallContextFactory::new(),
            cache: FixpointCache::new(),
            wtos,
        }
    }

    pub fn program(&self) -> &'p Program {
        self.program
    }

    pub fn transfer(&self) -> &T {
        &self.transfer
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    pub fn cache(&self) -> &FixpointCache<T::Domain> {
        &self.cache
    }

    pub fn contexts(&self) -> &CallContextFactory {
        &self.contexts
    }

    fn body(&self, function: FunctionId) -> Result<(&'p Function, &'p Cfg)> {
        let fun = self
            .program
            .function(function)
            .ok_or(AnalysisError::UnknownFunction { function })?;
        let cfg = fun.body.as_ref().ok_or(AnalysisError::MissingBody { function })?;
        Ok((fun, cfg))
    }

    /// Analyze the program from `entry`, whose entry block starts in `init`.
    ///
    /// # Errors
    ///
    /// - [`AnalysisError::UnknownFunction`] / [`AnalysisError::MissingBody`]
    ///   if `entry` cannot be analyzed.
    /// - [`AnalysisError::UnreachableEntry`] if `init` is bottom.
    /// - [`AnalysisError::NoConvergence`] if any fixpoint (including a callee's) diverges.
    pub fn analyze(&self, entry: FunctionId, init: T::Domain) -> Result<AnalysisResults<T::Domain>> {
        let (fun, _) = self.body(entry)?;
        let _scope = self.options.logger.scope(ScopeKind::Function, &fun.name);
        let mut stack = vec![entry];
        let fp = self.run_fixpoint(fun, ContextId::EMPTY, init, &mut stack)?;

        let mut results = AnalysisResults::new(entry);
        {
            let _scope = self.options.logger.scope(ScopeKind::Collection, &fun.name);
            self.collect(fun, ContextId::EMPTY, &fp, &mut stack, &mut results)?;
        }
        log::debug!(
            "analysis of {} done: {} function contexts, cache {:?}",
            fun.name,
            results.len(),
            self.cache.stats()
        );
        Ok(results)
    }

    /// Analyze several entry points; a failure of one does not stop the others.
    pub fn analyze_all<I>(&self, entries: I) -> Vec<(FunctionId, Result<AnalysisResults<T::Domain>>)>
    where
        I: IntoIterator<Item = (FunctionId, T::Domain)>,
    {
        entries
            .into_iter()
            .map(|(entry, init)| {
                let result = self.analyze(entry, init);
                if let Err(e) = &result {
                    log::warn!("analysis of {} failed: {}", entry, e);
                }
                (entry, result)
            })
            .collect()
    }

    fn run_fixpoint(
        &self,
        fun: &'p Function,
        context: ContextId,
        init: T::Domain,
        stack: &mut Vec<FunctionId>,
    ) -> Result<FunctionFixpoint<'_, T::Domain>> {
        let (_, cfg) = self.body(fun.id)?;
        let wto = self
            .wtos
            .get(&fun.id)
            .ok_or(AnalysisError::MissingBody { function: fun.id })?;
        let mut fp = FunctionFixpoint::new(fun.id, cfg, wto, self.options.params_for(fun.id), &self.options.logger);
        let mut sem = CallSemantics {
            analyzer: self,
            function: fun.id,
            context,
            stack,
        };
        fp.run(init, &mut sem)?;
        Ok(fp)
    }

    /// State after `call`, analyzing the callee if it can be inlined.
    ///
    /// With `results`, the callee is always re-analyzed and its invariants
    /// are collected.
    fn exec_call(
        &self,
        caller: FunctionId,
        context: ContextId,
        call: &CallSite,
        pre: T::Domain,
        stack: &mut Vec<FunctionId>,
        results: Option<&mut AnalysisResults<T::Domain>>,
    ) -> Result<T::Domain> {
        let target = match self.transfer.resolve_callee(call, &pre) {
            CallTarget::Null => {
                log::debug!("{} calls a null pointer", call.id);
                return Ok(T::Domain::bottom());
            }
            CallTarget::Unknown => return Ok(self.transfer.call_effect(call, CallEffect::Unknown, pre)),
            CallTarget::Function(f) => f,
        };
        let callee = self
            .program
            .function(target)
            .ok_or(AnalysisError::UnknownFunction { function: target })?;
        if !callee.is_defined() {
            return Ok(self.transfer.call_effect(call, CallEffect::Extern, pre));
        }
        if stack.contains(&target) {
            log::debug!("recursive call to {} at {}, not inlined", callee.name, call.id);
            return Ok(self.transfer.call_effect(call, CallEffect::UnknownInternal, pre));
        }

        let entry = self.transfer.match_down(call, callee, &pre);
        if entry.is_bottom() {
            return Ok(T::Domain::bottom());
        }
        let callee_context =
            self.contexts
                .callee_context(context, call.id, caller, self.options.context_sensitivity);
        let use_cache = self.options.use_fixpoint_cache;

        let exit = match results {
            None => {
                if use_cache {
                    if let Some(summary) = self.cache.fetch(call.id, target, &entry) {
                        log::trace!("cache hit for {} at {}", callee.name, call.id);
                        return Ok(self.transfer.match_up(call, callee, &summary.exit));
                    }
                }
                let _scope = self.options.logger.scope(ScopeKind::Callee, &callee.name);
                stack.push(target);
                let fp = self.run_fixpoint(callee, callee_context, entry.clone(), stack);
                stack.pop();
                fp?.exit()
            }
            Some(results) => {
                stack.push(target);
                let collected = self
                    .run_fixpoint(callee, callee_context, entry.clone(), stack)
                    .and_then(|fp| {
                        self.collect(callee, callee_context, &fp, stack, results)?;
                        Ok(fp.exit())
                    });
                stack.pop();
                collected?
            }
        };
        if use_cache {
            self.cache.store(call.id, target, entry, exit.clone());
        }
        Ok(self.transfer.match_up(call, callee, &exit))
    }

    /// Record the invariants of `fp` and replay its calls to collect callees.
    fn collect(
        &self,
        fun: &'p Function,
        context: ContextId,
        fp: &FunctionFixpoint<'_, T::Domain>,
        stack: &mut Vec<FunctionId>,
        results: &mut AnalysisResults<T::Domain>,
    ) -> Result<()> {
        let cfg = fp.cfg();
        for block in cfg.blocks() {
            let mut state = fp.pre(block.id).clone();
            for stmt in &block.statements {
                if state.is_bottom() {
                    break;
                }
                state = match stmt {
                    Statement::Call(call) => self.exec_call(fun.id, context, call, state, stack, Some(&mut *results))?,
                    _ => self.transfer.exec(stmt, state),
                };
            }
        }
        let n = cfg.num_blocks();
        results.record(FunctionInvariants {
            function: fun.id,
            context,
            pre: (0..n).map(|b| fp.pre(BlockId(b)).clone()).collect(),
            post: (0..n).map(|b| fp.post(BlockId(b)).clone()).collect(),
            exit: fp.exit(),
        });
        Ok(())
    }
}

/// Block semantics used inside the analyzer: calls go through [`Analyzer::exec_call`].
struct CallSemantics<'a, 'p, T: Transfer> {
    analyzer: &'a Analyzer<'p, T>,
    function: FunctionId,
    context: ContextId,
    stack: &'a mut Vec<FunctionId>,
}

impl<T: Transfer> BlockSemantics for CallSemantics<'_, '_, T> {
    type Domain = T::Domain;

    fn analyze_block(&mut self, block: &BasicBlock, pre: T::Domain) -> Result<T::Domain> {
        let mut state = pre;
        for stmt in &block.statements {
            if state.is_bottom() {
                break;
            }
            state = match stmt {
                Statement::Call(call) => {
                    self.analyzer
                        .exec_call(self.function, self.context, call, state, self.stack, None)?
                }
                _ => self.analyzer.transfer.exec(stmt, state),
            };
        }
        Ok(state)
    }

    fn analyze_edge(&mut self, guard: &Predicate, post: T::Domain) -> T::Domain {
        self.analyzer.transfer.exec_edge(guard, post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::{Callee, CfgBuilder};
    use crate::expr::{Expr, Operand};
    use crate::factory::{MemoryFactory, VariableFactory};
    use crate::interval::{Interval, IntervalDomain};
    use crate::params::ContextSensitivity;
    use crate::transfer::NumericalTransfer;
    use crate::types::{CallId, Variable};
    use crate::value::ValueDomain;
    use test_log::test;

    type State = ValueDomain<IntervalDomain>;

    /// `inc(n) { return n + 1; }`
    fn declare_inc(program: &mut Program, vars: &VariableFactory) -> FunctionId {
        let (n, ret) = (vars.named("inc.n"), vars.named("inc.ret"));
        let f = program.declare("inc", vec![n], Some(ret));
        let mut b = CfgBuilder::new();
        let entry = b.entry();
        b.add_statement(entry, Statement::assign(ret, Expr::var(n).add(Expr::constant(1))));
        b.add_return(entry);
        program.define(f, b.build());
        f
    }

    fn call(id: u32, callee: FunctionId, arg: Variable, result: Variable) -> Statement {
        Statement::Call(CallSite {
            id: CallId(id),
            callee: Callee::Direct(callee),
            args: vec![Operand::Var(arg)],
            result: Some(result),
        })
    }

    #[test]
    fn test_inline_callee() {
        let vars = VariableFactory::new();
        let mems = MemoryFactory::new();
        let mut program = Program::new();
        let inc = declare_inc(&mut program, &vars);
        let (x, y) = (vars.named("x"), vars.named("y"));
        let main = program.declare("main", vec![], None);
        let mut b = CfgBuilder::new();
        let entry = b.entry();
        b.add_statement(entry, Statement::assign(x, Expr::constant(41)));
        b.add_statement(entry, call(1, inc, x, y));
        b.add_return(entry);
        program.define(main, b.build());

        let analyzer = Analyzer::new(&program, NumericalTransfer::<IntervalDomain>::new(&vars, &mems), AnalysisOptions::default());
        let results = analyzer.analyze(main, State::top()).unwrap();
        let inv = results.entry_invariants().unwrap();
        assert_eq!(inv.exit().numeric().get(y), Interval::singleton(42));
        // Callee locals do not leak into the caller.
        assert!(inv.exit().numeric().get(vars.named("inc.ret")).is_top());
        assert_eq!(results.contexts(inc).len(), 1);
    }

    #[test]
    fn test_recursion_is_not_inlined() {
        let vars = VariableFactory::new();
        let mems = MemoryFactory::new();
        let mut program = Program::new();
        let (n, ret) = (vars.named("rec.n"), vars.named("rec.ret"));
        let rec = program.declare("rec", vec![n], Some(ret));
        let mut b = CfgBuilder::new();
        let entry = b.entry();
        b.add_statement(entry, call(1, rec, n, ret));
        b.add_return(entry);
        program.define(rec, b.build());

        let analyzer = Analyzer::new(&program, NumericalTransfer::<IntervalDomain>::new(&vars, &mems), AnalysisOptions::default());
        let results = analyzer.analyze(rec, State::top()).unwrap();
        assert!(results.entry_invariants().unwrap().exit().numeric().get(ret).is_top());
    }

    #[test]
    fn test_extern_call() {
        let vars = VariableFactory::new();
        let mems = MemoryFactory::new();
        let mut program = Program::new();
        let ext = program.declare("rand", vec![], None);
        let (x, y) = (vars.named("x"), vars.named("y"));
        let main = program.declare("main", vec![], None);
        let mut b = CfgBuilder::new();
        let entry = b.entry();
        b.add_statement(entry, Statement::assign(x, Expr::constant(1)));
        b.add_statement(entry, Statement::assign(y, Expr::constant(1)));
        b.add_statement(entry, call(1, ext, x, y));
        b.add_return(entry);
        program.define(main, b.build());

        let analyzer = Analyzer::new(&program, NumericalTransfer::<IntervalDomain>::new(&vars, &mems), AnalysisOptions::default());
        let results = analyzer.analyze(main, State::top()).unwrap();
        let exit = results.entry_invariants().unwrap().exit().clone();
        assert_eq!(exit.numeric().get(x), Interval::singleton(1));
        assert!(exit.numeric().get(y).is_top());
        assert_eq!(analyzer.cache().stats().entries, 0);
    }

    #[test]
    fn test_missing_and_unknown_entries() {
        let vars = VariableFactory::new();
        let mems = MemoryFactory::new();
        let mut program = Program::new();
        let decl = program.declare("decl", vec![], None);
        let analyzer = Analyzer::new(&program, NumericalTransfer::<IntervalDomain>::new(&vars, &mems), AnalysisOptions::default());
        assert_eq!(
            analyzer.analyze(decl, State::top()).unwrap_err(),
            AnalysisError::MissingBody { function: decl }
        );
        assert_eq!(
            analyzer.analyze(FunctionId(9), State::top()).unwrap_err(),
            AnalysisError::UnknownFunction { function: FunctionId(9) }
        );
    }

    #[test]
    fn test_insensitive_contexts_are_joined() {
        let vars = VariableFactory::new();
        let mems = MemoryFactory::new();
        let mut program = Program::new();
        let inc = declare_inc(&mut program, &vars);
        let (a, b_, ra, rb) = (vars.named("a"), vars.named("b"), vars.named("ra"), vars.named("rb"));
        let main = program.declare("main", vec![], None);
        let mut b = CfgBuilder::new();
        let entry = b.entry();
        b.add_statement(entry, Statement::assign(a, Expr::constant(1)));
        b.add_statement(entry, Statement::assign(b_, Expr::constant(10)));
        b.add_statement(entry, call(1, inc, a, ra));
        b.add_statement(entry, call(2, inc, b_, rb));
        b.add_return(entry);
        program.define(main, b.build());

        let options = AnalysisOptions::default().with_context_sensitivity(ContextSensitivity::Insensitive);
        let analyzer = Analyzer::new(&program, NumericalTransfer::<IntervalDomain>::new(&vars, &mems), options);
        let results = analyzer.analyze(main, State::top()).unwrap();
        assert_eq!(results.contexts(inc), vec![ContextId::EMPTY]);
        let joined = results.function(inc).unwrap();
        assert_eq!(joined.exit().numeric().get(vars.named("inc.ret")), Interval::finite(2, 11));
        let exit = results.entry_invariants().unwrap().exit().clone();
        assert_eq!(exit.numeric().get(ra), Interval::singleton(2));
        assert_eq!(exit.numeric().get(rb), Interval::singleton(11));
    }
}
