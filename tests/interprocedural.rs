use test_log::test;

use fixpoint_rs::analyzer::Analyzer;
use fixpoint_rs::cfg::{CallSite, Callee, CfgBuilder, Program, Statement};
use fixpoint_rs::error::AnalysisError;
use fixpoint_rs::expr::{Expr, Operand};
use fixpoint_rs::factory::{MemoryFactory, VariableFactory};
use fixpoint_rs::interval::{Interval, IntervalDomain};
use fixpoint_rs::lattice::Lattice;
use fixpoint_rs::params::AnalysisOptions;
use fixpoint_rs::transfer::NumericalTransfer;
use fixpoint_rs::types::{CallId, ContextId, FunctionId, Variable};
use fixpoint_rs::value::ValueDomain;

type State = ValueDomain<IntervalDomain>;

fn call(id: u32, callee: Callee, arg: Variable, result: Variable) -> Statement {
    Statement::Call(CallSite {
        id: CallId(id),
        callee,
        args: vec![Operand::Var(arg)],
        result: Some(result),
    })
}

/// ```text
/// int inc(int n)    { return n + 1; }
/// int twice(int x)  { int r = inc(x); return r + 1; }   // call #3
/// void main() {
///     int a = 1, b = 10;
///     int ra = twice(a);                                 // call #1
///     int rb = twice(b);                                 // call #2
/// }
/// ```
struct Fixture {
    program: Program,
    main: FunctionId,
    twice: FunctionId,
    inc: FunctionId,
    ra: Variable,
    rb: Variable,
}

fn fixture(vars: &VariableFactory) -> Fixture {
    let mut program = Program::new();

    let (n, inc_ret) = (vars.named("inc.n"), vars.named("inc.ret"));
    let inc = program.declare("inc", vec![n], Some(inc_ret));
    let mut b = CfgBuilder::new();
    let entry = b.entry();
    b.add_statement(entry, Statement::assign(inc_ret, Expr::var(n).add(Expr::constant(1))));
    b.add_return(entry);
    program.define(inc, b.build());

    let (x, r, twice_ret) = (vars.named("twice.x"), vars.named("twice.r"), vars.named("twice.ret"));
    let twice = program.declare("twice", vec![x], Some(twice_ret));
    let mut b = CfgBuilder::new();
    let entry = b.entry();
    b.add_statement(entry, call(3, Callee::Direct(inc), x, r));
    b.add_statement(entry, Statement::assign(twice_ret, Expr::var(r).add(Expr::constant(1))));
    b.add_return(entry);
    program.define(twice, b.build());

    let (a, bv, ra, rb) = (vars.named("a"), vars.named("b"), vars.named("ra"), vars.named("rb"));
    let main = program.declare("main", vec![], None);
    let mut b = CfgBuilder::new();
    let entry = b.entry();
    b.add_statement(entry, Statement::assign(a, Expr::constant(1)));
    b.add_statement(entry, Statement::assign(bv, Expr::constant(10)));
    b.add_statement(entry, call(1, Callee::Direct(twice), a, ra));
    b.add_statement(entry, call(2, Callee::Direct(twice), bv, rb));
    b.add_return(entry);
    program.define(main, b.build());

    Fixture {
        program,
        main,
        twice,
        inc,
        ra,
        rb,
    }
}

#[test]
fn test_two_call_sites_do_not_contaminate() {
    let vars = VariableFactory::new();
    let mems = MemoryFactory::new();
    let fx = fixture(&vars);
    let analyzer = Analyzer::new(&fx.program, NumericalTransfer::<IntervalDomain>::new(&vars, &mems), AnalysisOptions::default());

    let results = analyzer.analyze(fx.main, State::top()).unwrap();
    let exit = results.entry_invariants().unwrap().exit().clone();
    assert_eq!(exit.numeric().get(fx.ra), Interval::singleton(3));
    assert_eq!(exit.numeric().get(fx.rb), Interval::singleton(12));

    // One context of `twice` per call site, and one of `inc` below each.
    assert_eq!(results.contexts(fx.twice).len(), 2);
    assert_eq!(results.contexts(fx.inc).len(), 2);
    let ctx1 = analyzer.contexts().push(ContextId::EMPTY, CallId(1), fx.main);
    let ctx2 = analyzer.contexts().push(ContextId::EMPTY, CallId(2), fx.main);
    let twice_ret = vars.named("twice.ret");
    let at1 = results.get(fx.twice, ctx1).unwrap();
    let at2 = results.get(fx.twice, ctx2).unwrap();
    assert_eq!(at1.exit().numeric().get(twice_ret), Interval::singleton(3));
    assert_eq!(at2.exit().numeric().get(twice_ret), Interval::singleton(12));

    let joined = results.function(fx.twice).unwrap();
    assert_eq!(joined.exit().numeric().get(twice_ret), Interval::finite(3, 12));
}

#[test]
fn test_cache_reuse_and_erase() {
    let vars = VariableFactory::new();
    let mems = MemoryFactory::new();
    let fx = fixture(&vars);
    let analyzer = Analyzer::new(&fx.program, NumericalTransfer::<IntervalDomain>::new(&vars, &mems), AnalysisOptions::default());

    analyzer.analyze(fx.main, State::top()).unwrap();
    let first = analyzer.cache().stats();
    assert_eq!(first.hits, 0);
    assert!(analyzer.cache().get(CallId(1), fx.twice).is_some());

    // Same entry values: both calls of `main` are hits.
    let again = analyzer.analyze(fx.main, State::top()).unwrap();
    let second = analyzer.cache().stats();
    assert_eq!(second.hits, 2);
    assert_eq!(again.entry_invariants().unwrap().exit().numeric().get(fx.rb), Interval::singleton(12));

    // An erased summary is recomputed, not served stale.
    assert!(analyzer.cache().erase(CallId(2), fx.twice));
    assert!(analyzer.cache().get(CallId(2), fx.twice).is_none());
    let third_results = analyzer.analyze(fx.main, State::top()).unwrap();
    let third = analyzer.cache().stats();
    assert!(third.misses > second.misses);
    assert!(analyzer.cache().get(CallId(2), fx.twice).is_some());
    assert_eq!(third_results.entry_invariants().unwrap().exit().numeric().get(fx.rb), Interval::singleton(12));
}

#[test]
fn test_cache_disabled() {
    let vars = VariableFactory::new();
    let mems = MemoryFactory::new();
    let fx = fixture(&vars);
    let options = AnalysisOptions::default().with_fixpoint_cache(false);
    let analyzer = Analyzer::new(&fx.program, NumericalTransfer::<IntervalDomain>::new(&vars, &mems), options);
    let results = analyzer.analyze(fx.main, State::top()).unwrap();
    assert_eq!(results.entry_invariants().unwrap().exit().numeric().get(fx.ra), Interval::singleton(3));
    assert!(analyzer.cache().is_empty());
    assert_eq!(analyzer.cache().stats().hits + analyzer.cache().stats().misses, 0);
}

#[test]
fn test_function_pointers() {
    let vars = VariableFactory::new();
    let mems = MemoryFactory::new();
    let mut fx = fixture(&vars);
    let (f, g, y) = (vars.named("fp"), vars.named("gp"), vars.named("y"));

    let indirect = fx.program.declare("indirect", vec![], None);
    let mut b = CfgBuilder::new();
    let entry = b.entry();
    b.add_statement(entry, Statement::AddressOf { lhs: f, loc: mems.function(fx.inc) });
    b.add_statement(entry, Statement::assign(y, Expr::constant(4)));
    b.add_statement(entry, call(10, Callee::Indirect(f), y, y));
    b.add_return(entry);
    fx.program.define(indirect, b.build());

    let null_call = fx.program.declare("null_call", vec![], None);
    let mut b = CfgBuilder::new();
    let entry = b.entry();
    b.add_statement(entry, Statement::Null { lhs: g });
    b.add_statement(entry, call(11, Callee::Indirect(g), y, y));
    b.add_return(entry);
    fx.program.define(null_call, b.build());

    let analyzer = Analyzer::new(&fx.program, NumericalTransfer::<IntervalDomain>::new(&vars, &mems), AnalysisOptions::default());
    let results = analyzer.analyze(indirect, State::top()).unwrap();
    assert_eq!(results.entry_invariants().unwrap().exit().numeric().get(y), Interval::singleton(5));

    let results = analyzer.analyze(null_call, State::top()).unwrap();
    assert!(results.entry_invariants().unwrap().exit().is_bottom());
}

#[test]
fn test_analyze_all_continues_after_failure() {
    let vars = VariableFactory::new();
    let mems = MemoryFactory::new();
    let mut fx = fixture(&vars);
    let declared = fx.program.declare("declared", vec![], None);
    let analyzer = Analyzer::new(&fx.program, NumericalTransfer::<IntervalDomain>::new(&vars, &mems), AnalysisOptions::default());

    let results = analyzer.analyze_all([
        (declared, State::top()),
        (fx.main, State::bottom()),
        (FunctionId(42), State::top()),
        (fx.main, State::top()),
    ]);
    assert_eq!(results.len(), 4);
    assert_eq!(results[0].1.as_ref().unwrap_err(), &AnalysisError::MissingBody { function: declared });
    assert_eq!(results[1].1.as_ref().unwrap_err(), &AnalysisError::UnreachableEntry { function: fx.main });
    assert_eq!(
        results[2].1.as_ref().unwrap_err(),
        &AnalysisError::UnknownFunction { function: FunctionId(42) }
    );
    let main = results[3].1.as_ref().unwrap();
    assert_eq!(main.entry_invariants().unwrap().exit().numeric().get(fx.ra), Interval::singleton(3));
}

#[test]
fn test_concurrent_entry_points_share_cache() {
    let vars = VariableFactory::new();
    let mems = MemoryFactory::new();
    let fx = fixture(&vars);
    let analyzer = Analyzer::new(&fx.program, NumericalTransfer::<IntervalDomain>::new(&vars, &mems), AnalysisOptions::default());

    let exits: Vec<State> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(|| {
                    let results = analyzer.analyze(fx.main, State::top()).unwrap();
                    results.entry_invariants().unwrap().exit().clone()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for exit in &exits {
        assert_eq!(exit.numeric().get(fx.ra), Interval::singleton(3));
        assert_eq!(exit.numeric().get(fx.rb), Interval::singleton(12));
    }
    assert_eq!(analyzer.cache().stats().entries, 3);
}
