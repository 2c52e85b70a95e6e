//! Numerical abstract domain interface.

use num_bigint::BigInt;

use crate::congruence::Congruence;
use crate::expr::{CmpOp, Expr, Predicate};
use crate::interval::Interval;
use crate::lattice::Lattice;
use crate::types::Variable;

/// Numerical abstract domain over integer variables.
///
/// Extends [`Lattice`] with the transfer operations used by the fixpoint
/// engine. Mutating operations keep bottom absorbing: once a value is
/// bottom, every operation leaves it bottom.
///
/// Every domain exports what it knows about a variable as an interval and
/// as a congruence, and accepts such facts back. Relational domains may also
/// export offset equalities. [`ReducedProduct`](crate::product::ReducedProduct)
/// exchanges these facts between its components.
pub trait NumericDomain: Lattice {
    /// `x := e`
    fn assign(&mut self, x: Variable, e: &Expr);

    /// Assume `lhs op rhs` holds.
    fn add_constraint(&mut self, op: CmpOp, lhs: &Expr, rhs: &Expr);

    /// Remove every constraint on `x`.
    fn forget(&mut self, x: Variable);

    fn interval_of(&self, x: Variable) -> Interval;

    fn congruence_of(&self, x: Variable) -> Congruence;

    /// Meet the value of `x` with `i`.
    fn refine_interval(&mut self, x: Variable, i: &Interval);

    /// Meet the value of `x` with `c`.
    fn refine_congruence(&mut self, x: Variable, c: &Congruence);

    /// Variables this value constrains.
    fn variables(&self) -> Vec<Variable>;

    /// Known equalities `x = y + k`.
    fn equalities(&self) -> Vec<(Variable, Variable, BigInt)> {
        Vec::new()
    }

    fn set_to_bottom(&mut self) {
        *self = Self::bottom();
    }

    /// Assume a predicate holds.
    fn assume(&mut self, p: &Predicate) {
        if self.is_bottom() {
            return;
        }
        match p {
            Predicate::True => {}
            Predicate::False => self.set_to_bottom(),
            Predicate::Cmp(op, lhs, rhs) => self.add_constraint(*op, lhs, rhs),
            Predicate::Not(q) => self.assume(&q.negate()),
            Predicate::And(q, r) => {
                self.assume(q);
                self.assume(r);
            }
            Predicate::Or(q, r) => {
                let mut left = self.clone();
                left.assume(q);
                self.assume(r);
                *self = left.join(self);
            }
        }
    }

    /// `x := any value of i`
    fn set_interval(&mut self, x: Variable, i: &Interval) {
        self.forget(x);
        self.refine_interval(x, i);
    }

    /// `x := y`
    fn assign_var(&mut self, x: Variable, y: Variable) {
        self.assign(x, &Expr::Var(y));
    }

    fn constant_of(&self, x: Variable) -> Option<BigInt> {
        self.interval_of(x).as_singleton()
    }
}
