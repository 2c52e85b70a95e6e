//! Intraprocedural fixpoint iterator.
//!
//! [`FunctionFixpoint`] computes the invariants of one CFG following its
//! [`Wto`]. Plain vertices are analyzed once. A cycle is iterated with the
//! interleaved strategy:
//!
//! 1. *Increasing* iterations from the head: the new pre-invariant of the
//!    head is extrapolated ([`FixpointParameters::widening_delay`] plain
//!    joins, then widening) until it is stable (`new_pre ⊑ pre`).
//! 2. *Decreasing* iterations: the pre-invariant is refined with narrowing
//!    (or meet) until no refinement happens or the bound
//!    [`FixpointParameters::narrowing_iterations`] is reached.
//!
//! The semantics of blocks and edges are supplied by a [`BlockSemantics`],
//! which is how the interprocedural driver plugs calls in.

use crate::cfg::{BasicBlock, Cfg, Statement};
use crate::error::{AnalysisError, Result};
use crate::expr::Predicate;
use crate::lattice::Lattice;
use crate::params::{FixpointParameters, NarrowingStrategy, WideningStrategy};
use crate::progress::{Phase, ProgressLogger, ScopeKind};
use crate::transfer::{CallTarget, Transfer};
use crate::types::{BlockId, FunctionId};
use crate::wto::{Wto, WtoComponent};

/// Abstract semantics of the blocks and edges of a CFG.
pub trait BlockSemantics {
    type Domain: Lattice;

    /// Post-invariant of `block` from its pre-invariant.
    fn analyze_block(&mut self, block: &BasicBlock, pre: Self::Domain) -> Result<Self::Domain>;

    /// Value flowing along an edge guarded by `guard`.
    fn analyze_edge(&mut self, guard: &Predicate, post: Self::Domain) -> Self::Domain;
}

/// Block semantics of a [`Transfer`] without interprocedural analysis:
/// calls use [`Transfer::exec`] (an unknown call) unless they call null.
#[derive(Debug)]
pub struct Intraprocedural<'t, T>(pub &'t T);

impl<T: Transfer> BlockSemantics for Intraprocedural<'_, T> {
    type Domain = T::Domain;

    fn analyze_block(&mut self, block: &BasicBlock, pre: T::Domain) -> Result<T::Domain> {
        let mut state = pre;
        for stmt in &block.statements {
            if state.is_bottom() {
                break;
            }
            state = match stmt {
                Statement::Call(call) if self.0.resolve_callee(call, &state) == CallTarget::Null => T::Domain::bottom(),
                _ => self.0.exec(stmt, state),
            };
        }
        Ok(state)
    }

    fn analyze_edge(&mut self, guard: &Predicate, post: T::Domain) -> T::Domain {
        self.0.exec_edge(guard, post)
    }
}

/// Fixpoint of one function body.
#[derive(Debug)]
pub struct FunctionFixpoint<'a, D> {
    function: FunctionId,
    cfg: &'a Cfg,
    wto: &'a Wto,
    params: &'a FixpointParameters,
    logger: &'a ProgressLogger,
    pre: Vec<D>,
    post: Vec<D>,
}

impl<'a, D: Lattice> FunctionFixpoint<'a, D> {
    pub fn new(
        function: FunctionId,
        cfg: &'a Cfg,
        wto: &'a Wto,
        params: &'a FixpointParameters,
        logger: &'a ProgressLogger,
    ) -> Self {
        let n = cfg.num_blocks();
        Self {
            function,
            cfg,
            wto,
            params,
            logger,
            pre: vec![D::bottom(); n],
            post: vec![D::bottom(); n],
        }
    }

    pub fn function(&self) -> FunctionId {
        self.function
    }

    pub fn cfg(&self) -> &'a Cfg {
        self.cfg
    }

    /// Invariant at the start of `block` (bottom if unreachable).
    pub fn pre(&self, block: BlockId) -> &D {
        &self.pre[block.0]
    }

    /// Invariant at the end of `block` (bottom if unreachable).
    pub fn post(&self, block: BlockId) -> &D {
        &self.post[block.0]
    }

    /// Join of the post-invariants of the exit blocks.
    pub fn exit(&self) -> D {
        D::join_all(self.cfg.exits().into_iter().map(|b| &self.post[b.0]))
    }

    pub fn into_invariants(self) -> (Vec<D>, Vec<D>) {
        (self.pre, self.post)
    }

    /// Compute the invariants of the body, starting from `init` at the entry.
    ///
    /// # Errors
    ///
    /// - [`AnalysisError::UnreachableEntry`] if `init` is bottom.
    /// - [`AnalysisError::NoConvergence`] if a loop head needs more than
    ///   [`FixpointParameters::max_iterations`] increasing iterations.
    /// - Any error of the block semantics.
    pub fn run<S>(&mut self, init: D, sem: &mut S) -> Result<()>
    where
        S: BlockSemantics<Domain = D>,
    {
        if init.is_bottom() {
            return Err(AnalysisError::UnreachableEntry {
                function: self.function,
            });
        }
        self.pre.fill(D::bottom());
        self.post.fill(D::bottom());
        let wto = self.wto;
        for component in wto.components() {
            self.visit(component, &init, sem)?;
        }
        log::debug!("fixpoint of {} converged", self.function);
        Ok(())
    }

    /// Join of the values flowing into `block` (and `init` for the entry).
    fn default_pre<S>(&self, block: BlockId, init: &D, sem: &mut S) -> D
    where
        S: BlockSemantics<Domain = D>,
    {
        let mut pre = if block == self.cfg.entry() {
            init.clone()
        } else {
            D::bottom()
        };
        for edge in self.cfg.in_edges(block) {
            let post = &self.post[edge.from.0];
            if post.is_bottom() {
                continue;
            }
            let value = match &edge.guard {
                None => post.clone(),
                Some(guard) => sem.analyze_edge(guard, post.clone()),
            };
            pre.join_with(&value);
        }
        pre
    }

    fn analyze<S>(&mut self, block: BlockId, pre: D, sem: &mut S) -> Result<()>
    where
        S: BlockSemantics<Domain = D>,
    {
        let post = if pre.is_bottom() {
            D::bottom()
        } else {
            sem.analyze_block(self.cfg.block(block), pre.clone())?
        };
        self.pre[block.0] = pre;
        self.post[block.0] = post;
        Ok(())
    }

    fn visit<S>(&mut self, component: &WtoComponent, init: &D, sem: &mut S) -> Result<()>
    where
        S: BlockSemantics<Domain = D>,
    {
        match component {
            WtoComponent::Vertex(v) => {
                let pre = self.default_pre(*v, init, sem);
                self.analyze(*v, pre, sem)
            }
            WtoComponent::Cycle { head, components } => self.visit_cycle(*head, components, init, sem),
        }
    }

    fn visit_cycle<S>(&mut self, head: BlockId, components: &[WtoComponent], init: &D, sem: &mut S) -> Result<()>
    where
        S: BlockSemantics<Domain = D>,
    {
        let logger = self.logger;
        let _scope = logger.scope(ScopeKind::Cycle, format_args!("{} in {}", head, self.function));
        let mut pre = self.default_pre(head, init, sem);

        let mut iteration = 1;
        loop {
            if iteration > self.params.max_iterations {
                return Err(AnalysisError::NoConvergence {
                    function: self.function,
                    head,
                    iterations: self.params.max_iterations,
                });
            }
            logger.iteration(head, Phase::Increasing, iteration);
            self.analyze(head, pre.clone(), sem)?;
            for c in components {
                self.visit(c, init, sem)?;
            }
            let new_pre = self.default_pre(head, init, sem);
            if new_pre.leq(&pre) {
                // Post-fixpoint: the first decreasing iteration starts from new_pre.
                pre = new_pre;
                break;
            }
            pre = self.extrapolate(head, iteration, &pre, &new_pre);
            iteration += 1;
        }

        let mut iteration = 1;
        loop {
            logger.iteration(head, Phase::Decreasing, iteration);
            self.analyze(head, pre.clone(), sem)?;
            for c in components {
                self.visit(c, init, sem)?;
            }
            let new_pre = self.default_pre(head, init, sem);
            if pre.leq(&new_pre) {
                break;
            }
            if self.params.narrowing_iterations.is_some_and(|max| iteration > max) || iteration >= self.params.max_iterations {
                break;
            }
            pre = self.refine(head, iteration, &pre, &new_pre);
            iteration += 1;
        }
        Ok(())
    }

    fn extrapolate(&self, head: BlockId, iteration: usize, pre: &D, new_pre: &D) -> D {
        let delay = self.params.widening_delay;
        if iteration <= delay || (iteration - delay) % self.params.widening_period != 0 {
            return pre.join(new_pre);
        }
        match self.params.widening_strategy {
            WideningStrategy::Join => pre.join(new_pre),
            WideningStrategy::Widen => match self.params.widening_hints.get(head) {
                Some(threshold) if iteration == delay + 1 => pre.widen_threshold(new_pre, threshold),
                _ => pre.widen(new_pre),
            },
        }
    }

    fn refine(&self, head: BlockId, iteration: usize, pre: &D, new_pre: &D) -> D {
        match self.params.narrowing_strategy {
            NarrowingStrategy::Meet => pre.meet(new_pre),
            NarrowingStrategy::Narrow => match self.params.widening_hints.get(head) {
                Some(threshold) if iteration == 1 => pre.narrow_threshold(new_pre, threshold),
                _ => pre.narrow(new_pre),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::CfgBuilder;
    use crate::expr::Expr;
    use crate::factory::{MemoryFactory, VariableFactory};
    use crate::interval::{Interval, IntervalDomain};
    use crate::numeric::NumericDomain;
    use crate::product::NumericProduct;
    use crate::transfer::NumericalTransfer;
    use crate::types::Variable;
    use crate::value::ValueDomain;
    use test_log::test;

    /// `i = 0; s = 0; while (i < n) { i++; s++; }`
    fn counting_loop(i: Variable, s: Variable, n: i64) -> Cfg {
        let mut b = CfgBuilder::new();
        let entry = b.entry();
        let head = b.new_block("head");
        let body = b.new_block("body");
        let exit = b.new_block("exit");
        b.add_statement(entry, Statement::assign(i, Expr::constant(0)));
        b.add_statement(entry, Statement::assign(s, Expr::constant(0)));
        b.add_goto(entry, head);
        b.add_branch(head, Expr::var(i).lt(Expr::constant(n)), body, exit);
        b.add_statement(body, Statement::assign(i, Expr::var(i).add(Expr::constant(1))));
        b.add_statement(body, Statement::assign(s, Expr::var(s).add(Expr::constant(1))));
        b.add_goto(body, head);
        b.add_return(exit);
        b.build()
    }

    const HEAD: BlockId = BlockId(1);
    const EXIT: BlockId = BlockId(3);

    #[test]
    fn test_loop_with_intervals() {
        let vars = VariableFactory::new();
        let mems = MemoryFactory::new();
        let (i, s) = (vars.named("i"), vars.named("s"));
        let cfg = counting_loop(i, s, 10);
        let wto = Wto::new(&cfg);
        let params = FixpointParameters::default();
        let logger = ProgressLogger::default();
        let transfer = NumericalTransfer::<IntervalDomain>::new(&vars, &mems);

        let mut fp = FunctionFixpoint::new(FunctionId(0), &cfg, &wto, &params, &logger);
        fp.run(ValueDomain::top(), &mut Intraprocedural(&transfer)).unwrap();

        assert_eq!(fp.pre(HEAD).numeric().get(i), Interval::finite(0, 10));
        assert_eq!(fp.post(EXIT).numeric().get(i), Interval::singleton(10));
        // Without relations, s is only bounded below.
        assert_eq!(fp.pre(HEAD).numeric().get(s), Interval::at_least(0));
    }

    #[test]
    fn test_loop_with_equalities_bounds_both_counters() {
        let vars = VariableFactory::new();
        let mems = MemoryFactory::new();
        let (i, s) = (vars.named("i"), vars.named("s"));
        let cfg = counting_loop(i, s, 10);
        let wto = Wto::new(&cfg);
        let params = FixpointParameters::default();
        let logger = ProgressLogger::default();
        let transfer = NumericalTransfer::<NumericProduct>::new(&vars, &mems);

        let mut fp = FunctionFixpoint::new(FunctionId(0), &cfg, &wto, &params, &logger);
        fp.run(ValueDomain::top(), &mut Intraprocedural(&transfer)).unwrap();

        assert_eq!(fp.pre(HEAD).numeric().interval_of(s), Interval::finite(0, 10));
        let s_exit = fp.exit().numeric().interval_of(s);
        assert!(s_exit.leq(&Interval::finite(0, 10)));
        assert_eq!(s_exit, Interval::singleton(10));
    }

    #[test]
    fn test_join_strategy_reports_no_convergence() {
        let vars = VariableFactory::new();
        let mems = MemoryFactory::new();
        let i = vars.named("i");
        let mut b = CfgBuilder::new();
        let entry = b.entry();
        let head = b.new_block("head");
        b.add_statement(entry, Statement::assign(i, Expr::constant(0)));
        b.add_goto(entry, head);
        b.add_statement(head, Statement::assign(i, Expr::var(i).add(Expr::constant(1))));
        b.add_goto(head, head);
        let cfg = b.build();
        let wto = Wto::new(&cfg);
        let params = FixpointParameters::new()
            .with_widening_strategy(WideningStrategy::Join)
            .with_max_iterations(20);
        let logger = ProgressLogger::default();
        let transfer = NumericalTransfer::<IntervalDomain>::new(&vars, &mems);

        let mut fp = FunctionFixpoint::new(FunctionId(4), &cfg, &wto, &params, &logger);
        let err = fp.run(ValueDomain::top(), &mut Intraprocedural(&transfer)).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::NoConvergence {
                function: FunctionId(4),
                head,
                iterations: 20
            }
        );
    }

    #[test]
    fn test_bottom_entry_is_reported() {
        let vars = VariableFactory::new();
        let mems = MemoryFactory::new();
        let (i, s) = (vars.named("i"), vars.named("s"));
        let cfg = counting_loop(i, s, 3);
        let wto = Wto::new(&cfg);
        let params = FixpointParameters::default();
        let logger = ProgressLogger::default();
        let transfer = NumericalTransfer::<IntervalDomain>::new(&vars, &mems);

        let mut fp = FunctionFixpoint::new(FunctionId(1), &cfg, &wto, &params, &logger);
        let err = fp.run(ValueDomain::bottom(), &mut Intraprocedural(&transfer)).unwrap_err();
        assert_eq!(err, AnalysisError::UnreachableEntry { function: FunctionId(1) });
    }

    #[test]
    fn test_extrapolation_policy() {
        let vars = VariableFactory::new();
        let (i, s) = (vars.named("i"), vars.named("s"));
        let cfg = counting_loop(i, s, 10);
        let wto = Wto::new(&cfg);
        let logger = ProgressLogger::default();
        let params = FixpointParameters::new().with_widening_delay(2).with_widening_hint(HEAD, 100);
        let fp = FunctionFixpoint::<Interval>::new(FunctionId(0), &cfg, &wto, &params, &logger);

        let (a, b) = (Interval::finite(0, 1), Interval::finite(0, 2));
        // Delayed: plain join.
        assert_eq!(fp.extrapolate(HEAD, 2, &a, &b), Interval::finite(0, 2));
        // First widening stops at the threshold, later ones do not.
        assert_eq!(fp.extrapolate(HEAD, 3, &a, &b), Interval::finite(0, 100));
        assert_eq!(fp.extrapolate(HEAD, 4, &a, &b), Interval::at_least(0));
        // Heads without a hint widen to infinity.
        assert_eq!(fp.extrapolate(BlockId(2), 3, &a, &b), Interval::at_least(0));

        let wide = Interval::at_least(0);
        assert_eq!(fp.refine(HEAD, 1, &wide, &Interval::finite(0, 10)), Interval::finite(0, 10));
    }

    #[test]
    fn test_widening_period() {
        let vars = VariableFactory::new();
        let (i, s) = (vars.named("i"), vars.named("s"));
        let cfg = counting_loop(i, s, 10);
        let wto = Wto::new(&cfg);
        let logger = ProgressLogger::default();
        let params = FixpointParameters::new().with_widening_delay(0).with_widening_period(2);
        let fp = FunctionFixpoint::<Interval>::new(FunctionId(0), &cfg, &wto, &params, &logger);

        let (a, b) = (Interval::finite(0, 1), Interval::finite(0, 2));
        assert_eq!(fp.extrapolate(HEAD, 1, &a, &b), Interval::finite(0, 2));
        assert_eq!(fp.extrapolate(HEAD, 2, &a, &b), Interval::at_least(0));
    }

    #[test]
    fn test_unreachable_block_stays_bottom() {
        let vars = VariableFactory::new();
        let mems = MemoryFactory::new();
        let x = vars.named("x");
        let mut b = CfgBuilder::new();
        let entry = b.entry();
        let then = b.new_block("then");
        let exit = b.new_block("exit");
        b.add_statement(entry, Statement::assign(x, Expr::constant(1)));
        b.add_branch(entry, Expr::var(x).gt(Expr::constant(5)), then, exit);
        b.add_goto(then, exit);
        b.add_return(exit);
        let cfg = b.build();
        let wto = Wto::new(&cfg);
        let params = FixpointParameters::default();
        let logger = ProgressLogger::default();
        let transfer = NumericalTransfer::<IntervalDomain>::new(&vars, &mems);

        let mut fp = FunctionFixpoint::new(FunctionId(0), &cfg, &wto, &params, &logger);
        fp.run(ValueDomain::top(), &mut Intraprocedural(&transfer)).unwrap();
        assert!(fp.pre(then).is_bottom());
        assert_eq!(fp.pre(exit).numeric().get(x), Interval::singleton(1));
    }
}
