//! Reduced product of numerical domains.
//!
//! [`ReducedProduct`] combines two [`NumericDomain`]s; nesting products
//! combines any number of them. Every operation is applied to both
//! components, then a reduction propagates facts between them:
//!
//! - the interval and congruence of each variable are met across the
//!   components and reduced against each other (a congruence moves
//!   interval bounds inward to the nearest member of the class, and a
//!   bounded interval may pin a congruence down to one value);
//! - offset equalities `x = y + k` exported by any component carry the
//!   facts of `y` over to `x` and back.
//!
//! The reduction repeats until no component changes, so its result does
//! not depend on the order in which components and variables are visited.
//! If any component becomes bottom, the whole product is bottom.

use std::fmt;

use num_bigint::BigInt;

use crate::congruence::{Congruence, CongruenceDomain};
use crate::env::NumValue;
use crate::equality::EqualityDomain;
use crate::expr::{CmpOp, Expr};
use crate::interval::{Interval, IntervalDomain};
use crate::lattice::Lattice;
use crate::numeric::NumericDomain;
use crate::types::Variable;

/// Upper bound on reduction rounds. Each round is sound on its own, so
/// stopping early only loses precision.
const MAX_REDUCTION_ROUNDS: usize = 16;

/// Reduced product of two numerical domains.
///
/// # Invariants
///
/// - The value is reduced: no component can be refined further by the facts
///   exported by the other (up to [`MAX_REDUCTION_ROUNDS`]).
/// - Either both components are bottom or none is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReducedProduct<D1, D2> {
    d1: D1,
    d2: D2,
}

/// Intervals reduced with congruences.
pub type IntervalCongruence = ReducedProduct<IntervalDomain, CongruenceDomain>;

/// Intervals and congruences, reduced through offset equalities.
pub type NumericProduct = ReducedProduct<IntervalCongruence, EqualityDomain>;

impl<D1, D2> ReducedProduct<D1, D2>
where
    D1: NumericDomain + PartialEq,
    D2: NumericDomain + PartialEq,
{
    /// Create a reduced product from two component values.
    pub fn new(d1: D1, d2: D2) -> Self {
        let mut p = Self { d1, d2 };
        p.reduce();
        p
    }

    pub fn d1(&self) -> &D1 {
        &self.d1
    }

    pub fn d2(&self) -> &D2 {
        &self.d2
    }

    pub fn into_parts(self) -> (D1, D2) {
        (self.d1, self.d2)
    }

    fn collapse_if_bottom(&mut self) -> bool {
        if self.d1.is_bottom() || self.d2.is_bottom() {
            self.d1 = D1::bottom();
            self.d2 = D2::bottom();
            true
        } else {
            false
        }
    }

    fn reduce(&mut self) {
        for _ in 0..MAX_REDUCTION_ROUNDS {
            if self.collapse_if_bottom() {
                return;
            }
            let before = (self.d1.clone(), self.d2.clone());
            self.reduce_step();
            if self.d1 == before.0 && self.d2 == before.1 {
                break;
            }
        }
        self.collapse_if_bottom();
    }

    fn reduce_step(&mut self) {
        let mut vars = self.d1.variables();
        vars.extend(self.d2.variables());
        vars.sort();
        vars.dedup();
        for x in vars {
            let i = self.d1.interval_of(x).meet(&self.d2.interval_of(x));
            let c = self.d1.congruence_of(x).meet(&self.d2.congruence_of(x));
            let i = i.refine_with_congruence(&c);
            let c = c.refine_with_interval(&i);
            if !self.refine_both(x, &i, &c) {
                return;
            }
        }

        let mut eqs = self.d1.equalities();
        eqs.extend(self.d2.equalities());
        for (x, y, k) in eqs {
            // x = y + k
            let ki = Interval::singleton(k.clone());
            let kc = Congruence::constant(k);
            let (ix, cx) = (self.interval_of(x), self.congruence_of(x));
            let (iy, cy) = (self.interval_of(y), self.congruence_of(y));
            if !self.refine_both(x, &ix.meet(&iy.add(&ki)), &cx.meet(&cy.add(&kc))) {
                return;
            }
            if !self.refine_both(y, &iy.meet(&ix.sub(&ki)), &cy.meet(&cx.sub(&kc))) {
                return;
            }
        }
    }

    /// Push facts on `x` into both components. Returns `false` once bottom.
    fn refine_both(&mut self, x: Variable, i: &Interval, c: &Congruence) -> bool {
        if i.is_bottom() || c.is_bottom() {
            self.d1 = D1::bottom();
            self.d2 = D2::bottom();
            return false;
        }
        refine_component(&mut self.d1, x, i, c);
        refine_component(&mut self.d2, x, i, c);
        !self.collapse_if_bottom()
    }
}

fn refine_component<D: NumericDomain>(d: &mut D, x: Variable, i: &Interval, c: &Congruence) {
    if !i.is_top() && !d.interval_of(x).leq(i) {
        d.refine_interval(x, i);
    }
    if !c.is_top() && !d.congruence_of(x).leq(c) {
        d.refine_congruence(x, c);
    }
}

impl<D1, D2> Default for ReducedProduct<D1, D2>
where
    D1: NumericDomain + PartialEq,
    D2: NumericDomain + PartialEq,
{
    fn default() -> Self {
        Self::top()
    }
}

impl<D1, D2> Lattice for ReducedProduct<D1, D2>
where
    D1: NumericDomain + PartialEq,
    D2: NumericDomain + PartialEq,
{
    fn bottom() -> Self {
        Self {
            d1: D1::bottom(),
            d2: D2::bottom(),
        }
    }

    fn top() -> Self {
        Self {
            d1: D1::top(),
            d2: D2::top(),
        }
    }

    fn is_bottom(&self) -> bool {
        self.d1.is_bottom() || self.d2.is_bottom()
    }

    fn is_top(&self) -> bool {
        self.d1.is_top() && self.d2.is_top()
    }

    fn leq(&self, other: &Self) -> bool {
        if self.is_bottom() {
            return true;
        }
        if other.is_bottom() {
            return false;
        }
        self.d1.leq(&other.d1) && self.d2.leq(&other.d2)
    }

    fn join(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        Self::new(self.d1.join(&other.d1), self.d2.join(&other.d2))
    }

    fn widen(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        Self::new(self.d1.widen(&other.d1), self.d2.widen(&other.d2))
    }

    fn meet(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom();
        }
        Self::new(self.d1.meet(&other.d1), self.d2.meet(&other.d2))
    }

    fn narrow(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom();
        }
        Self::new(self.d1.narrow(&other.d1), self.d2.narrow(&other.d2))
    }

    fn widen_threshold(&self, other: &Self, threshold: &BigInt) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        Self::new(
            self.d1.widen_threshold(&other.d1, threshold),
            self.d2.widen_threshold(&other.d2, threshold),
        )
    }

    fn narrow_threshold(&self, other: &Self, threshold: &BigInt) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::bottom();
        }
        Self::new(
            self.d1.narrow_threshold(&other.d1, threshold),
            self.d2.narrow_threshold(&other.d2, threshold),
        )
    }
}

impl<D1, D2> NumericDomain for ReducedProduct<D1, D2>
where
    D1: NumericDomain + PartialEq,
    D2: NumericDomain + PartialEq,
{
    fn assign(&mut self, x: Variable, e: &Expr) {
        if self.is_bottom() {
            return;
        }
        self.d1.assign(x, e);
        self.d2.assign(x, e);
        self.reduce();
    }

    fn add_constraint(&mut self, op: CmpOp, lhs: &Expr, rhs: &Expr) {
        if self.is_bottom() {
            return;
        }
        self.d1.add_constraint(op, lhs, rhs);
        self.d2.add_constraint(op, lhs, rhs);
        self.reduce();
    }

    fn forget(&mut self, x: Variable) {
        self.d1.forget(x);
        self.d2.forget(x);
    }

    fn interval_of(&self, x: Variable) -> Interval {
        self.d1.interval_of(x).meet(&self.d2.interval_of(x))
    }

    fn congruence_of(&self, x: Variable) -> Congruence {
        self.d1.congruence_of(x).meet(&self.d2.congruence_of(x))
    }

    fn refine_interval(&mut self, x: Variable, i: &Interval) {
        if self.is_bottom() {
            return;
        }
        self.d1.refine_interval(x, i);
        self.d2.refine_interval(x, i);
        self.reduce();
    }

    fn refine_congruence(&mut self, x: Variable, c: &Congruence) {
        if self.is_bottom() {
            return;
        }
        self.d1.refine_congruence(x, c);
        self.d2.refine_congruence(x, c);
        self.reduce();
    }

    fn variables(&self) -> Vec<Variable> {
        let mut vars = self.d1.variables();
        vars.extend(self.d2.variables());
        vars.sort();
        vars.dedup();
        vars
    }

    fn equalities(&self) -> Vec<(Variable, Variable, BigInt)> {
        let mut eqs = self.d1.equalities();
        eqs.extend(self.d2.equalities());
        eqs
    }
}

impl<D1: fmt::Display, D2: fmt::Display> fmt::Display for ReducedProduct<D1, D2> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} x {})", self.d1, self.d2)
    }
}
