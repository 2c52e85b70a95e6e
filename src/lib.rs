//! # fixpoint-rs: an abstract interpretation engine
//!
//! **`fixpoint-rs`** computes sound over-approximations of the values of
//! program variables at every point of a program. It is built around a
//! small set of pieces:
//!
//! - a [`Lattice`][crate::lattice::Lattice] contract that every abstract domain implements,
//! - numerical domains (intervals, congruences, variable equalities) and their reduced products,
//! - a points-to domain with nullity for pointer variables,
//! - a weak-topological-order fixpoint iterator with widening and narrowing,
//! - an interprocedural driver that inlines callees per calling context and
//!   memoizes callee summaries in a fixpoint cache.
//!
//! ## What is abstract interpretation?
//!
//! Instead of running a program on concrete values, the analysis runs it on
//! *abstract* values, each standing for a set of concrete ones (for example,
//! the interval `[0, 10]` stands for the integers between 0 and 10). Loops are
//! handled by iterating until the abstract states stop changing; *widening*
//! forces this to happen in finitely many steps, and *narrowing* recovers some
//! of the precision lost by widening.
//!
//! ## Basic Usage
//!
//! ```rust
//! use fixpoint_rs::analyzer::Analyzer;
//! use fixpoint_rs::cfg::{CfgBuilder, Program, Statement};
//! use fixpoint_rs::expr::Expr;
//! use fixpoint_rs::factory::{MemoryFactory, VariableFactory};
//! use fixpoint_rs::interval::{Interval, IntervalDomain};
//! use fixpoint_rs::lattice::Lattice;
//! use fixpoint_rs::params::AnalysisOptions;
//! use fixpoint_rs::transfer::NumericalTransfer;
//! use fixpoint_rs::value::ValueDomain;
//!
//! let vars = VariableFactory::new();
//! let mems = MemoryFactory::new();
//! let i = vars.named("i");
//!
//! // i = 0; while (i < 10) { i = i + 1; }
//! let mut b = CfgBuilder::new();
//! let entry = b.entry();
//! let head = b.new_block("head");
//! let body = b.new_block("body");
//! let exit = b.new_block("exit");
//! b.add_statement(entry, Statement::assign(i, Expr::constant(0)));
//! b.add_goto(entry, head);
//! b.add_branch(head, Expr::var(i).lt(Expr::constant(10)), body, exit);
//! b.add_statement(body, Statement::assign(i, Expr::var(i).add(Expr::constant(1))));
//! b.add_goto(body, head);
//! b.add_return(exit);
//!
//! let mut program = Program::new();
//! let main = program.declare("main", vec![], None);
//! program.define(main, b.build());
//!
//! let transfer = NumericalTransfer::<IntervalDomain>::new(&vars, &mems);
//! let analyzer = Analyzer::new(&program, transfer, AnalysisOptions::default());
//! let results = analyzer.analyze(main, ValueDomain::top())?;
//!
//! let inv = results.entry_invariants().unwrap();
//! assert_eq!(inv.pre(head).numeric().get(i), Interval::finite(0, 10));
//! assert_eq!(inv.exit().numeric().get(i), Interval::singleton(10));
//! # Ok::<(), fixpoint_rs::error::AnalysisError>(())
//! ```
//!
//! ## Core Components
//!
//! - **[`lattice`]**: The lattice contract shared by all domains.
//! - **[`interval`]**, **[`congruence`]**, **[`equality`]**: Numerical domains.
//! - **[`product`]**: Reduced products of numerical domains.
//! - **[`pointer`]**, **[`value`]**: Pointer analysis and the combined memory state.
//! - **[`fixpoint`]**: The intraprocedural WTO iterator.
//! - **[`analyzer`]**: Interprocedural analysis, calling contexts and the fixpoint cache.

pub mod analyzer;
pub mod cache;
pub mod cfg;
pub mod congruence;
pub mod context;
pub mod env;
pub mod equality;
pub mod error;
pub mod expr;
pub mod factory;
pub mod fixpoint;
pub mod interval;
pub mod lattice;
pub mod number;
pub mod numeric;
pub mod params;
pub mod pointer;
pub mod product;
pub mod progress;
pub mod transfer;
pub mod types;
pub mod value;
pub mod wto;
