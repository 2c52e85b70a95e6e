//! Interval abstract domain.
//!
//! Each variable is bound to `[lb, ub]` over [`Bound`]. Intervals are
//! simple and cheap, and lose every relation between variables; the
//! reduced product recovers some of it (see [`crate::product`]).

use std::cmp::{max, min};
use std::fmt;

use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};

use crate::congruence::Congruence;
use crate::env::{Environment, NumValue};
use crate::expr::CmpOp;
use crate::lattice::Lattice;
use crate::number::{next_congruent, prev_congruent, Bound, IntType};

/// Interval `[lb, ub]`.
///
/// # Invariants
///
/// - A non-empty interval has `lb <= ub`, `lb != +∞` and `ub != -∞`.
/// - Every empty interval is represented by the single value `[+∞, -∞]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Interval {
    lb: Bound,
    ub: Bound,
}

/// Separate interval domain: `Variable -> Interval`.
pub type IntervalDomain = Environment<Interval>;

impl Interval {
    /// Interval `[lb, ub]`, or bottom when the bounds cross.
    pub fn new(lb: Bound, ub: Bound) -> Self {
        if lb > ub || lb == Bound::PosInf || ub == Bound::NegInf {
            Self::empty()
        } else {
            Self { lb, ub }
        }
    }

    fn empty() -> Self {
        Self {
            lb: Bound::PosInf,
            ub: Bound::NegInf,
        }
    }

    pub fn finite(lb: impl Into<BigInt>, ub: impl Into<BigInt>) -> Self {
        Self::new(Bound::Finite(lb.into()), Bound::Finite(ub.into()))
    }

    pub fn singleton(n: impl Into<BigInt>) -> Self {
        let n = n.into();
        Self::new(Bound::Finite(n.clone()), Bound::Finite(n))
    }

    /// `[n, +∞]`
    pub fn at_least(n: impl Into<BigInt>) -> Self {
        Self::new(Bound::Finite(n.into()), Bound::PosInf)
    }

    /// `[-∞, n]`
    pub fn at_most(n: impl Into<BigInt>) -> Self {
        Self::new(Bound::NegInf, Bound::Finite(n.into()))
    }

    /// Range of a machine integer type.
    pub fn for_type(ty: IntType) -> Self {
        Self::finite(ty.min(), ty.max())
    }

    pub fn lb(&self) -> &Bound {
        &self.lb
    }

    pub fn ub(&self) -> &Bound {
        &self.ub
    }

    /// The only element of a singleton interval.
    pub fn as_singleton(&self) -> Option<BigInt> {
        match (&self.lb, &self.ub) {
            (Bound::Finite(a), Bound::Finite(b)) if a == b => Some(a.clone()),
            _ => None,
        }
    }

    pub fn contains(&self, n: &BigInt) -> bool {
        let n = Bound::Finite(n.clone());
        !self.is_bottom() && self.lb <= n && n <= self.ub
    }

    pub fn contains_zero(&self) -> bool {
        self.contains(&BigInt::zero())
    }

    pub fn add(&self, other: &Interval) -> Interval {
        if self.is_bottom() || other.is_bottom() {
            return Self::empty();
        }
        Interval::new(self.lb.add(&other.lb), self.ub.add(&other.ub))
    }

    pub fn sub(&self, other: &Interval) -> Interval {
        if self.is_bottom() || other.is_bottom() {
            return Self::empty();
        }
        Interval::new(self.lb.sub(&other.ub), self.ub.sub(&other.lb))
    }

    pub fn neg(&self) -> Interval {
        if self.is_bottom() {
            return Self::empty();
        }
        Interval::new(self.ub.neg(), self.lb.neg())
    }

    pub fn mul(&self, other: &Interval) -> Interval {
        if self.is_bottom() || other.is_bottom() {
            return Self::empty();
        }
        let corners = [
            self.lb.mul(&other.lb),
            self.lb.mul(&other.ub),
            self.ub.mul(&other.lb),
            self.ub.mul(&other.ub),
        ];
        Self::hull(&corners)
    }

    /// Truncating division.
    ///
    /// The divisor is split into its negative and positive parts; zero is
    /// excluded since division by zero has no result. Dividing by `[0, 0]`
    /// is bottom.
    pub fn div(&self, other: &Interval) -> Interval {
        if self.is_bottom() || other.is_bottom() {
            return Self::empty();
        }
        let negative = other.meet(&Interval::at_most(-1));
        let positive = other.meet(&Interval::at_least(1));
        self.div_nonzero(&negative).join(&self.div_nonzero(&positive))
    }

    fn div_nonzero(&self, divisor: &Interval) -> Interval {
        if divisor.is_bottom() {
            return Self::empty();
        }
        let corners = [
            self.lb.div(&divisor.lb),
            self.lb.div(&divisor.ub),
            self.ub.div(&divisor.lb),
            self.ub.div(&divisor.ub),
        ];
        Self::hull(&corners)
    }

    /// Truncating remainder (the sign follows the dividend).
    pub fn rem(&self, other: &Interval) -> Interval {
        if self.is_bottom() || other.is_bottom() {
            return Self::empty();
        }
        if let (Some(a), Some(b)) = (self.as_singleton(), other.as_singleton()) {
            if b.is_zero() {
                return Self::empty();
            }
            return Interval::singleton(a % b);
        }
        if other.as_singleton().is_some_and(|b| b.is_zero()) {
            return Self::empty();
        }
        // |x % y| < max(|y.lb|, |y.ub|)
        let bound = match (&other.lb, &other.ub) {
            (Bound::Finite(a), Bound::Finite(b)) => Bound::Finite(max(a.abs(), b.abs()) - BigInt::one()),
            _ => Bound::PosInf,
        };
        let zero = Bound::zero();
        if self.lb >= zero {
            Interval::new(zero, min(self.ub.clone(), bound))
        } else if self.ub <= zero {
            Interval::new(max(self.lb.clone(), bound.neg()), zero)
        } else {
            Interval::new(max(self.lb.clone(), bound.neg()), min(self.ub.clone(), bound))
        }
    }

    fn hull(bounds: &[Bound]) -> Interval {
        let lb = bounds.iter().min().cloned().unwrap_or(Bound::NegInf);
        let ub = bounds.iter().max().cloned().unwrap_or(Bound::PosInf);
        Interval::new(lb, ub)
    }
}

impl Lattice for Interval {
    fn bottom() -> Self {
        Self::empty()
    }

    fn top() -> Self {
        Self {
            lb: Bound::NegInf,
            ub: Bound::PosInf,
        }
    }

    fn is_bottom(&self) -> bool {
        self.lb > self.ub
    }

    fn is_top(&self) -> bool {
        self.lb == Bound::NegInf && self.ub == Bound::PosInf
    }

    fn leq(&self, other: &Self) -> bool {
        if self.is_bottom() {
            return true;
        }
        if other.is_bottom() {
            return false;
        }
        other.lb <= self.lb && self.ub <= other.ub
    }

    fn join(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        Interval {
            lb: min(&self.lb, &other.lb).clone(),
            ub: max(&self.ub, &other.ub).clone(),
        }
    }

    fn widen(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let lb = if other.lb < self.lb { Bound::NegInf } else { self.lb.clone() };
        let ub = if other.ub > self.ub { Bound::PosInf } else { self.ub.clone() };
        Interval { lb, ub }
    }

    fn meet(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::empty();
        }
        Interval::new(max(&self.lb, &other.lb).clone(), min(&self.ub, &other.ub).clone())
    }

    fn narrow(&self, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::empty();
        }
        let lb = if self.lb == Bound::NegInf { other.lb.clone() } else { self.lb.clone() };
        let ub = if self.ub == Bound::PosInf { other.ub.clone() } else { self.ub.clone() };
        Interval::new(lb, ub)
    }

    fn widen_threshold(&self, other: &Self, threshold: &BigInt) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        let t = Bound::Finite(threshold.clone());
        let lb = if other.lb < self.lb {
            if t <= other.lb {
                t.clone()
            } else {
                Bound::NegInf
            }
        } else {
            self.lb.clone()
        };
        let ub = if other.ub > self.ub {
            if t >= other.ub {
                t
            } else {
                Bound::PosInf
            }
        } else {
            self.ub.clone()
        };
        Interval { lb, ub }
    }

    fn narrow_threshold(&self, other: &Self, threshold: &BigInt) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::empty();
        }
        let t = Bound::Finite(threshold.clone());
        let lb = if self.lb == Bound::NegInf || self.lb == t {
            other.lb.clone()
        } else {
            self.lb.clone()
        };
        let ub = if self.ub == Bound::PosInf || self.ub == t {
            other.ub.clone()
        } else {
            self.ub.clone()
        };
        Interval::new(lb, ub)
    }
}

impl NumValue for Interval {
    fn constant(n: &BigInt) -> Self {
        Interval::singleton(n.clone())
    }

    fn as_constant(&self) -> Option<BigInt> {
        self.as_singleton()
    }

    fn add(&self, other: &Self) -> Self {
        Interval::add(self, other)
    }

    fn sub(&self, other: &Self) -> Self {
        Interval::sub(self, other)
    }

    fn mul(&self, other: &Self) -> Self {
        Interval::mul(self, other)
    }

    fn div(&self, other: &Self) -> Self {
        Interval::div(self, other)
    }

    fn rem(&self, other: &Self) -> Self {
        Interval::rem(self, other)
    }

    fn neg(&self) -> Self {
        Interval::neg(self)
    }

    fn refine_cmp(&self, op: CmpOp, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Self::empty();
        }
        let one = Bound::finite(1);
        match op {
            CmpOp::Eq => self.meet(other),
            CmpOp::Ne => match other.as_singleton() {
                Some(c) => {
                    let c = Bound::Finite(c);
                    if self.lb == c && self.ub == c {
                        Self::empty()
                    } else if self.lb == c {
                        Interval::new(c.add(&one), self.ub.clone())
                    } else if self.ub == c {
                        Interval::new(self.lb.clone(), c.sub(&one))
                    } else {
                        self.clone()
                    }
                }
                None => self.clone(),
            },
            CmpOp::Lt => self.meet(&Interval::new(Bound::NegInf, other.ub.sub(&one))),
            CmpOp::Le => self.meet(&Interval::new(Bound::NegInf, other.ub.clone())),
            CmpOp::Gt => self.meet(&Interval::new(other.lb.add(&one), Bound::PosInf)),
            CmpOp::Ge => self.meet(&Interval::new(other.lb.clone(), Bound::PosInf)),
        }
    }

    fn to_interval(&self) -> Interval {
        self.clone()
    }

    fn to_congruence(&self) -> Congruence {
        if self.is_bottom() {
            return Congruence::bottom();
        }
        match self.as_singleton() {
            Some(c) => Congruence::constant(c),
            None => Congruence::top(),
        }
    }

    fn refine_with_interval(&self, other: &Interval) -> Self {
        self.meet(other)
    }

    /// Move finite bounds inward to the nearest members of the congruence class.
    fn refine_with_congruence(&self, c: &Congruence) -> Self {
        if self.is_bottom() || c.is_bottom() {
            return Self::empty();
        }
        match c {
            Congruence::Val { modulus, residue } if modulus.is_zero() => {
                if self.contains(residue) {
                    Interval::singleton(residue.clone())
                } else {
                    Self::empty()
                }
            }
            Congruence::Val { modulus, residue } => {
                let lb = match &self.lb {
                    Bound::Finite(l) => Bound::Finite(next_congruent(l, modulus, residue)),
                    b => b.clone(),
                };
                let ub = match &self.ub {
                    Bound::Finite(u) => Bound::Finite(prev_congruent(u, modulus, residue)),
                    b => b.clone(),
                };
                Interval::new(lb, ub)
            }
            Congruence::Bottom => Self::empty(),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bottom() {
            write!(f, "_|_")
        } else {
            write!(f, "[{}, {}]", self.lb, self.ub)
        }
    }
}
