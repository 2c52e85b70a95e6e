use clap::{Parser, ValueEnum};

use fixpoint_rs::analyzer::{AnalysisResults, Analyzer};
use fixpoint_rs::cfg::{CallSite, Callee, CfgBuilder, Program, Statement};
use fixpoint_rs::expr::{Expr, Operand};
use fixpoint_rs::factory::{MemoryFactory, VariableFactory};
use fixpoint_rs::interval::IntervalDomain;
use fixpoint_rs::lattice::Lattice;
use fixpoint_rs::numeric::NumericDomain;
use fixpoint_rs::params::{AnalysisOptions, ContextSensitivity, FixpointParameters};
use fixpoint_rs::product::NumericProduct;
use fixpoint_rs::transfer::NumericalTransfer;
use fixpoint_rs::types::{CallId, FunctionId, Variable};
use fixpoint_rs::value::ValueDomain;

#[derive(Debug, Copy, Clone, ValueEnum)]
enum Domain {
    /// Intervals only.
    Interval,
    /// Intervals, congruences and equalities.
    Product,
}

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Loop bound.
    #[arg(value_name = "INT", default_value = "100")]
    n: i64,

    /// Loop step.
    #[clap(long, value_name = "INT", default_value = "2")]
    step: i64,

    /// Numerical domain.
    #[clap(long, value_enum, default_value = "product")]
    domain: Domain,

    /// Number of joins before widening.
    #[clap(long, value_name = "INT", default_value = "1")]
    widening_delay: usize,

    /// Maximum number of narrowing iterations.
    #[clap(long, value_name = "INT")]
    narrowing: Option<usize>,

    /// Call-string depth (0 for a context-insensitive analysis).
    #[clap(long, value_name = "INT", default_value = "1")]
    depth: usize,

    /// Disable the fixpoint cache.
    #[clap(long)]
    no_cache: bool,
}

struct Demo {
    program: Program,
    main: FunctionId,
    shown: Vec<(String, Variable)>,
}

/// ```text
/// int clamp(int v) { if (v > 50) v = 50; return v; }
///
/// void main() {
///     int i = 0, s = 0, x = 0;
///     int *p = &x;
///     while (i < n) {
///         i = i + step;
///         s = clamp(i);
///         *p = s;
///     }
///     int y = *p;
/// }
/// ```
fn build_program(vars: &VariableFactory, mems: &MemoryFactory, n: i64, step: i64) -> Demo {
    let mut program = Program::new();

    let (v, ret) = (vars.named("clamp.v"), vars.named("clamp.ret"));
    let clamp = program.declare("clamp", vec![v], Some(ret));
    let mut b = CfgBuilder::new();
    let entry = b.entry();
    let cap = b.new_block("cap");
    let done = b.new_block("done");
    b.add_branch(entry, Expr::var(v).gt(Expr::constant(50)), cap, done);
    b.add_statement(cap, Statement::assign(v, Expr::constant(50)));
    b.add_goto(cap, done);
    b.add_statement(done, Statement::assign(ret, Expr::var(v)));
    b.add_return(done);
    program.define(clamp, b.build());

    let (i, s, x, y, p) = (
        vars.named("i"),
        vars.named("s"),
        vars.named("x"),
        vars.named("y"),
        vars.named("p"),
    );
    let main = program.declare("main", vec![], None);
    let mut b = CfgBuilder::new();
    let entry = b.entry();
    let head = b.new_block("head");
    let body = b.new_block("body");
    let exit = b.new_block("exit");
    b.add_statement(entry, Statement::assign(i, Expr::constant(0)));
    b.add_statement(entry, Statement::assign(s, Expr::constant(0)));
    b.add_statement(entry, Statement::assign(x, Expr::constant(0)));
    b.add_statement(entry, Statement::AddressOf { lhs: p, loc: mems.variable(x) });
    b.add_goto(entry, head);
    b.add_branch(head, Expr::var(i).lt(Expr::constant(n)), body, exit);
    b.add_statement(body, Statement::assign(i, Expr::var(i).add(Expr::constant(step))));
    b.add_statement(
        body,
        Statement::Call(CallSite {
            id: CallId(1),
            callee: Callee::Direct(clamp),
            args: vec![Operand::Var(i)],
            result: Some(s),
        }),
    );
    b.add_statement(body, Statement::Store { ptr: p, value: Operand::Var(s) });
    b.add_goto(body, head);
    b.add_statement(exit, Statement::Load { lhs: y, ptr: p });
    b.add_return(exit);
    program.define(main, b.build());

    let shown = [("i", i), ("s", s), ("x", x), ("y", y)]
        .into_iter()
        .map(|(name, var)| (name.to_string(), var))
        .collect();
    Demo { program, main, shown }
}

fn print_results<N: NumericDomain>(demo: &Demo, results: &AnalysisResults<ValueDomain<N>>) {
    let Some(inv) = results.entry_invariants() else {
        println!("no invariants for main");
        return;
    };
    let Some(cfg) = demo.program.function(demo.main).and_then(|f| f.body.as_ref()) else {
        return;
    };
    for block in cfg.blocks() {
        let pre = inv.pre(block.id);
        println!("{} ({}):", block.id, block.label);
        if pre.is_bottom() {
            println!("    unreachable");
            continue;
        }
        for (name, var) in demo.shown.iter() {
            let n = pre.numeric();
            println!("    {:>2} in {} and {}", name, n.interval_of(*var), n.congruence_of(*var));
        }
    }
    println!("exit:");
    for (name, var) in demo.shown.iter() {
        println!("    {:>2} in {}", name, inv.exit().numeric().interval_of(*var));
    }
}

fn run<N: NumericDomain>(args: &Cli, demo: &Demo, vars: &VariableFactory, mems: &MemoryFactory) -> color_eyre::Result<()> {
    let params = FixpointParameters::default()
        .with_widening_delay(args.widening_delay)
        .with_narrowing_iterations(args.narrowing);
    let sensitivity = if args.depth == 0 {
        ContextSensitivity::Insensitive
    } else {
        ContextSensitivity::CallString { depth: args.depth }
    };
    let options = AnalysisOptions::default()
        .with_params(params)
        .with_context_sensitivity(sensitivity)
        .with_fixpoint_cache(!args.no_cache);

    let transfer = NumericalTransfer::<N>::new(vars, mems);
    let analyzer = Analyzer::new(&demo.program, transfer, options);
    let results = analyzer.analyze(demo.main, ValueDomain::top())?;
    print_results(demo, &results);

    let stats = analyzer.cache().stats();
    println!(
        "cache: {} hits, {} misses, {} entries (hit rate {:.2})",
        stats.hits,
        stats.misses,
        stats.entries,
        stats.hit_rate()
    );
    Ok(())
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let args = Cli::parse();
    println!("args = {:?}", args);

    let vars = VariableFactory::new();
    let mems = MemoryFactory::new();
    let demo = build_program(&vars, &mems, args.n, args.step);
    for fun in demo.program.functions() {
        if let Some(cfg) = &fun.body {
            println!("fn {}:\n{}", fun.name, cfg);
        }
    }

    match args.domain {
        Domain::Interval => run::<IntervalDomain>(&args, &demo, &vars, &mems)?,
        Domain::Product => run::<NumericProduct>(&args, &demo, &vars, &mems)?,
    }

    println!("Done in {:.2} s", time_total.elapsed().as_secs_f64());
    Ok(())
}
