//! Benchmarks for domain operations, the fixpoint iterator and the
//! interprocedural driver.
//!
//! Run with:
//! ```bash
//! cargo bench --bench fixpoint
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use fixpoint_rs::analyzer::Analyzer;
use fixpoint_rs::cfg::{CallSite, Callee, Cfg, CfgBuilder, Program, Statement};
use fixpoint_rs::expr::{Expr, Operand};
use fixpoint_rs::factory::{MemoryFactory, VariableFactory};
use fixpoint_rs::interval::{Interval, IntervalDomain};
use fixpoint_rs::lattice::Lattice;
use fixpoint_rs::numeric::NumericDomain;
use fixpoint_rs::params::AnalysisOptions;
use fixpoint_rs::product::NumericProduct;
use fixpoint_rs::transfer::NumericalTransfer;
use fixpoint_rs::types::{CallId, FunctionId, Variable};
use fixpoint_rs::value::ValueDomain;

/// `depth` nested counting loops over the variables `vs`, each bounded by `n`.
fn nested_loops(vs: &[Variable], n: i64) -> Cfg {
    let mut b = CfgBuilder::new();
    let entry = b.entry();
    let mut prev = entry;
    let mut heads = Vec::new();
    for &v in vs {
        let head = b.new_block(format!("head_{}", v));
        let body = b.new_block(format!("body_{}", v));
        b.add_statement(prev, Statement::assign(v, Expr::constant(0)));
        b.add_goto(prev, head);
        heads.push((head, body, v));
        prev = body;
    }
    let exit = b.new_block("exit");
    // Innermost body increments; each loop exits to the enclosing body tail.
    for (k, &(head, body, v)) in heads.iter().enumerate().rev() {
        let after = if k == 0 { exit } else { b.new_block("latch") };
        if k + 1 == heads.len() {
            b.add_statement(body, Statement::assign(v, Expr::var(v).add(Expr::constant(1))));
            b.add_goto(body, head);
        }
        b.add_branch(head, Expr::var(v).lt(Expr::constant(n)), body, after);
        if k > 0 {
            let (outer_head, _, outer_v) = heads[k - 1];
            b.add_statement(after, Statement::assign(outer_v, Expr::var(outer_v).add(Expr::constant(1))));
            b.add_goto(after, outer_head);
        }
    }
    b.add_return(exit);
    b.build()
}

fn loop_program(vars: &VariableFactory, depth: usize, n: i64) -> (Program, FunctionId) {
    let vs: Vec<Variable> = (0..depth).map(|k| vars.named(&format!("i{}", k))).collect();
    let mut program = Program::new();
    let main = program.declare("main", vec![], None);
    program.define(main, nested_loops(&vs, n));
    (program, main)
}

/// A chain `f0 -> f1 -> ... -> f{len-1}`, each function calling the next twice.
fn call_chain(vars: &VariableFactory, len: usize) -> (Program, FunctionId) {
    let mut program = Program::new();
    let funs: Vec<(FunctionId, Variable, Variable)> = (0..len)
        .map(|k| {
            let (x, r) = (vars.named(&format!("f{}.x", k)), vars.named(&format!("f{}.r", k)));
            (program.declare(format!("f{}", k), vec![x], Some(r)), x, r)
        })
        .collect();
    let mut call_id = 0;
    for (k, &(f, x, r)) in funs.iter().enumerate() {
        let mut b = CfgBuilder::new();
        let entry = b.entry();
        match funs.get(k + 1) {
            Some(&(g, _, _)) => {
                for _ in 0..2 {
                    call_id += 1;
                    b.add_statement(
                        entry,
                        Statement::Call(CallSite {
                            id: CallId(call_id),
                            callee: Callee::Direct(g),
                            args: vec![Operand::Var(x)],
                            result: Some(r),
                        }),
                    );
                }
            }
            None => b.add_statement(entry, Statement::assign(r, Expr::var(x).add(Expr::constant(1)))),
        }
        b.add_return(entry);
        program.define(f, b.build());
    }
    (program, funs[0].0)
}

fn analyze<N: NumericDomain>(program: &Program, entry: FunctionId, vars: &VariableFactory, mems: &MemoryFactory, options: AnalysisOptions) {
    let analyzer = Analyzer::new(program, NumericalTransfer::<N>::new(vars, mems), options);
    let results = analyzer.analyze(entry, ValueDomain::top());
    assert!(results.is_ok());
}

// ============================================================================
// Benchmark: Domain operations
// ============================================================================

fn bench_domain_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("domain");

    let a = Interval::finite(-1000, 1000);
    let b = Interval::finite(0, 5000);
    group.bench_function("interval/join", |bench| bench.iter(|| a.join(&b)));
    group.bench_function("interval/widen", |bench| bench.iter(|| a.widen(&b)));
    group.bench_function("interval/mul", |bench| bench.iter(|| a.mul(&b)));

    for n in [8, 64] {
        let vars = VariableFactory::new();
        let vs: Vec<Variable> = (0..n).map(|k| vars.named(&format!("x{}", k))).collect();
        group.bench_with_input(BenchmarkId::new("product/assign_chain", n), &n, |bench, _| {
            bench.iter(|| {
                let mut d = NumericProduct::top();
                d.assign(vs[0], &Expr::constant(3));
                for w in vs.windows(2) {
                    d.assign(w[1], &Expr::var(w[0]).add(Expr::constant(2)));
                }
                d
            })
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Nested loops
// ============================================================================

fn bench_nested_loops(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixpoint/loops");

    for depth in [1, 2, 4] {
        let vars = VariableFactory::new();
        let mems = MemoryFactory::new();
        let (program, main) = loop_program(&vars, depth, 100);

        group.bench_with_input(BenchmarkId::new("interval", depth), &depth, |b, _| {
            b.iter(|| analyze::<IntervalDomain>(&program, main, &vars, &mems, AnalysisOptions::default()))
        });
        group.bench_with_input(BenchmarkId::new("product", depth), &depth, |b, _| {
            b.iter(|| analyze::<NumericProduct>(&program, main, &vars, &mems, AnalysisOptions::default()))
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Call chains, with and without the fixpoint cache
// ============================================================================

fn bench_call_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("fixpoint/calls");

    for len in [4, 8, 12] {
        let vars = VariableFactory::new();
        let mems = MemoryFactory::new();
        let (program, entry) = call_chain(&vars, len);

        for cache in [true, false] {
            let name = if cache { "cached" } else { "uncached" };
            group.bench_with_input(BenchmarkId::new(name, len), &len, |b, _| {
                b.iter(|| {
                    let options = AnalysisOptions::default().with_fixpoint_cache(cache);
                    analyze::<IntervalDomain>(&program, entry, &vars, &mems, options)
                })
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_domain_ops, bench_nested_loops, bench_call_chain);
criterion_main!(benches);
