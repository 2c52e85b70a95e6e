//! Separate (non-relational) environments: `Variable -> value`.
//!
//! An [`Environment`] is either bottom or a finite map where every absent
//! variable is implicitly top. Values are kept normalized: top values are
//! never stored, and storing a bottom value turns the whole environment
//! into bottom.

use std::collections::BTreeMap;
use std::fmt;

use num_bigint::BigInt;

use crate::congruence::Congruence;
use crate::expr::{CmpOp, Expr};
use crate::interval::Interval;
use crate::lattice::Lattice;
use crate::numeric::NumericDomain;
use crate::types::Variable;

/// Value lattice of a single integer variable, with arithmetic.
///
/// Implemented by [`Interval`] and [`Congruence`]. Besides the abstract
/// arithmetic, every value can export the facts it knows as an interval
/// and a congruence, and be refined by such facts; the reduced product
/// relies on this.
pub trait NumValue: Lattice + PartialEq {
    fn constant(n: &BigInt) -> Self;

    fn as_constant(&self) -> Option<BigInt>;

    fn add(&self, other: &Self) -> Self;
    fn sub(&self, other: &Self) -> Self;
    fn mul(&self, other: &Self) -> Self;
    fn div(&self, other: &Self) -> Self;
    fn rem(&self, other: &Self) -> Self;
    fn neg(&self) -> Self;

    /// Values of `self` that may satisfy `self op other`.
    fn refine_cmp(&self, op: CmpOp, other: &Self) -> Self;

    fn to_interval(&self) -> Interval;

    fn to_congruence(&self) -> Congruence;

    fn refine_with_interval(&self, i: &Interval) -> Self;

    fn refine_with_congruence(&self, c: &Congruence) -> Self;
}

/// Map from variables to values of `V`, with a bottom sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment<V> {
    map: BTreeMap<Variable, V>,
    is_bottom: bool,
}

impl<V: Lattice> Default for Environment<V> {
    fn default() -> Self {
        Self::top()
    }
}

impl<V: Lattice> Environment<V> {
    /// Value of `x` (top if unconstrained, bottom if the environment is bottom).
    pub fn get(&self, x: Variable) -> V {
        if self.is_bottom {
            return V::bottom();
        }
        self.map.get(&x).cloned().unwrap_or_else(V::top)
    }

    pub fn set(&mut self, x: Variable, value: V) {
        if self.is_bottom {
            return;
        }
        if value.is_bottom() {
            self.set_to_bottom();
        } else if value.is_top() {
            self.map.remove(&x);
        } else {
            self.map.insert(x, value);
        }
    }

    pub fn set_to_bottom(&mut self) {
        self.map.clear();
        self.is_bottom = true;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &V)> {
        self.map.iter()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn remove(&mut self, x: Variable) {
        if !self.is_bottom {
            self.map.remove(&x);
        }
    }

    fn combine(&self, other: &Self, f: impl Fn(&V, &V) -> V, union: bool) -> Self {
        let mut result = Self::top();
        let keys: Vec<Variable> = if union {
            let mut keys: Vec<Variable> = self.map.keys().chain(other.map.keys()).copied().collect();
            keys.sort();
            keys.dedup();
            keys
        } else {
            self.map.keys().filter(|k| other.map.contains_key(k)).copied().collect()
        };
        for x in keys {
            result.set(x, f(&self.get(x), &other.get(x)));
            if result.is_bottom {
                break;
            }
        }
        result
    }
}

impl<V: NumValue> Environment<V> {
    /// Abstract evaluation of an expression.
    pub fn eval(&self, e: &Expr) -> V {
        if self.is_bottom {
            return V::bottom();
        }
        match e {
            Expr::Var(x) => self.get(*x),
            Expr::Const(c) => V::constant(c),
            Expr::Add(a, b) => self.eval(a).add(&self.eval(b)),
            Expr::Sub(a, b) => self.eval(a).sub(&self.eval(b)),
            Expr::Mul(a, b) => self.eval(a).mul(&self.eval(b)),
            Expr::Div(a, b) => self.eval(a).div(&self.eval(b)),
            Expr::Rem(a, b) => self.eval(a).rem(&self.eval(b)),
            Expr::Neg(a) => self.eval(a).neg(),
        }
    }

    /// `x := e`
    pub fn assign(&mut self, x: Variable, e: &Expr) {
        if self.is_bottom {
            return;
        }
        let v = self.eval(e);
        self.set(x, v);
    }

    /// Assume `lhs op rhs`.
    ///
    /// Sides of the form `y + c` are solved for `y`; other sides only
    /// contribute a feasibility check.
    pub fn add_constraint(&mut self, op: CmpOp, lhs: &Expr, rhs: &Expr) {
        if self.is_bottom {
            return;
        }
        let l = self.eval(lhs);
        let r = self.eval(rhs);
        if l.refine_cmp(op, &r).is_bottom() {
            self.set_to_bottom();
            return;
        }
        if let Some((x, c)) = lhs.as_var_offset() {
            // x + c op r  =>  x op r - c
            let target = r.sub(&V::constant(&c));
            let refined = self.get(x).refine_cmp(op, &target);
            self.set(x, refined);
        }
        if let Some((y, c)) = rhs.as_var_offset() {
            // l op y + c  =>  y flip(op) l - c
            let target = l.sub(&V::constant(&c));
            let refined = self.get(y).refine_cmp(op.flip(), &target);
            self.set(y, refined);
        }
    }
}

impl<V: Lattice> Lattice for Environment<V> {
    fn bottom() -> Self {
        Self {
            map: BTreeMap::new(),
            is_bottom: true,
        }
    }

    fn top() -> Self {
        Self {
            map: BTreeMap::new(),
            is_bottom: false,
        }
    }

    fn is_bottom(&self) -> bool {
        self.is_bottom
    }

    fn is_top(&self) -> bool {
        !self.is_bottom && self.map.is_empty()
    }

    fn leq(&self, other: &Self) -> bool {
        if self.is_bottom {
            return true;
        }
        if other.is_bottom {
            return false;
        }
        other.map.iter().all(|(x, v)| self.get(*x).leq(v))
    }

    fn join(&self, other: &Self) -> Self {
        if self.is_bottom {
            return other.clone();
        }
        if other.is_bottom {
            return self.clone();
        }
        self.combine(other, |a, b| a.join(b), false)
    }

    fn widen(&self, other: &Self) -> Self {
        if self.is_bottom {
            return other.clone();
        }
        if other.is_bottom {
            return self.clone();
        }
        self.combine(other, |a, b| a.widen(b), false)
    }

    fn meet(&self, other: &Self) -> Self {
        if self.is_bottom || other.is_bottom {
            return Self::bottom();
        }
        self.combine(other, |a, b| a.meet(b), true)
    }

    fn narrow(&self, other: &Self) -> Self {
        if self.is_bottom || other.is_bottom {
            return Self::bottom();
        }
        self.combine(other, |a, b| a.narrow(b), true)
    }

    fn widen_threshold(&self, other: &Self, threshold: &BigInt) -> Self {
        if self.is_bottom {
            return other.clone();
        }
        if other.is_bottom {
            return self.clone();
        }
        self.combine(other, |a, b| a.widen_threshold(b, threshold), false)
    }

    fn narrow_threshold(&self, other: &Self, threshold: &BigInt) -> Self {
        if self.is_bottom || other.is_bottom {
            return Self::bottom();
        }
        self.combine(other, |a, b| a.narrow_threshold(b, threshold), true)
    }
}

impl<V: NumValue> NumericDomain for Environment<V> {
    fn assign(&mut self, x: Variable, e: &Expr) {
        Environment::assign(self, x, e);
    }

    fn add_constraint(&mut self, op: CmpOp, lhs: &Expr, rhs: &Expr) {
        Environment::add_constraint(self, op, lhs, rhs);
    }

    fn forget(&mut self, x: Variable) {
        self.remove(x);
    }

    fn interval_of(&self, x: Variable) -> Interval {
        self.get(x).to_interval()
    }

    fn congruence_of(&self, x: Variable) -> Congruence {
        self.get(x).to_congruence()
    }

    fn refine_interval(&mut self, x: Variable, i: &Interval) {
        let v = self.get(x).refine_with_interval(i);
        self.set(x, v);
    }

    fn refine_congruence(&mut self, x: Variable, c: &Congruence) {
        let v = self.get(x).refine_with_congruence(c);
        self.set(x, v);
    }

    fn variables(&self) -> Vec<Variable> {
        self.map.keys().copied().collect()
    }
}

impl<V: fmt::Display> fmt::Display for Environment<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bottom {
            return write!(f, "_|_");
        }
        write!(f, "{{")?;
        for (i, (x, v)) in self.map.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} -> {}", x, v)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::IntervalDomain;
    use crate::lattice::tests::check_lattice_laws;

    fn v(i: u32) -> Variable {
        Variable::new(i)
    }

    #[test]
    fn test_absent_is_top() {
        let env = IntervalDomain::top();
        assert!(env.get(v(0)).is_top());
        let bot = IntervalDomain::bottom();
        assert!(bot.get(v(0)).is_bottom());
    }

    #[test]
    fn test_assign_constant_round_trip() {
        let mut env = IntervalDomain::top();
        env.assign(v(0), &Expr::constant(7));
        assert_eq!(env.get(v(0)), Interval::singleton(7));
        env.assign(v(1), &Expr::var(v(0)).mul(Expr::constant(3)));
        assert_eq!(env.get(v(1)), Interval::singleton(21));
    }

    #[test]
    fn test_constraint_clips_and_collapses() {
        let mut env = IntervalDomain::top();
        env.set(v(0), Interval::finite(0, 100));
        env.add_constraint(CmpOp::Le, &Expr::var(v(0)), &Expr::constant(10));
        assert_eq!(env.get(v(0)), Interval::finite(0, 10));
        env.add_constraint(CmpOp::Gt, &Expr::var(v(0)).add(Expr::constant(1)), &Expr::constant(5));
        assert_eq!(env.get(v(0)), Interval::finite(5, 10));
        env.add_constraint(CmpOp::Gt, &Expr::var(v(0)), &Expr::constant(10));
        assert!(env.is_bottom());
        // bottom is absorbing
        env.assign(v(1), &Expr::constant(0));
        assert!(env.is_bottom());
    }

    #[test]
    fn test_equality_constraint_propagates_both_ways() {
        let mut env = IntervalDomain::top();
        env.set(v(0), Interval::finite(0, 10));
        env.set(v(1), Interval::finite(5, 20));
        env.add_constraint(CmpOp::Eq, &Expr::var(v(0)), &Expr::var(v(1)));
        assert_eq!(env.get(v(0)), Interval::finite(5, 10));
        assert_eq!(env.get(v(1)), Interval::finite(5, 10));
    }

    #[test]
    fn test_join_drops_one_sided_variables() {
        let mut a = IntervalDomain::top();
        a.set(v(0), Interval::finite(0, 1));
        a.set(v(1), Interval::finite(0, 1));
        let mut b = IntervalDomain::top();
        b.set(v(0), Interval::finite(5, 6));
        let j = a.join(&b);
        assert_eq!(j.get(v(0)), Interval::finite(0, 6));
        assert!(j.get(v(1)).is_top());
        assert_eq!(j.len(), 1);
    }

    #[test]
    fn test_environment_lattice_laws() {
        let mut samples = vec![IntervalDomain::bottom(), IntervalDomain::top()];
        for (lo, hi) in [(0, 0), (0, 10), (-5, 5), (10, 20)] {
            let mut e = IntervalDomain::top();
            e.set(v(0), Interval::finite(lo, hi));
            samples.push(e.clone());
            e.set(v(1), Interval::finite(lo - 1, hi + 1));
            samples.push(e);
        }
        check_lattice_laws(&samples);
    }
}
