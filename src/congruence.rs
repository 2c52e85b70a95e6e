//! Congruence abstract domain.
//!
//! Tracks `x ≡ b (mod a)`, written `aℤ+b`. Useful for loop strides,
//! alignment and parity.

use std::fmt;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

use crate::env::{Environment, NumValue};
use crate::error::DomainError;
use crate::expr::CmpOp;
use crate::interval::Interval;
use crate::lattice::Lattice;
use crate::number::{mod_floor, next_congruent, prev_congruent, Bound};

/// Congruence class `aℤ+b`.
///
/// # Representation
///
/// - `modulus = 0`: the single value `residue`.
/// - `modulus > 0`: `0 <= residue < modulus`.
/// - `modulus = 1`: every integer (top).
///
/// The order is divisibility: `(a₁, b₁) ⊑ (a₂, b₂)` iff `a₂ | a₁` and `b₁ ≡ b₂ (mod a₂)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Congruence {
    Bottom,
    Val { modulus: BigInt, residue: BigInt },
}

/// Separate congruence domain: `Variable -> Congruence`.
pub type CongruenceDomain = Environment<Congruence>;

impl Congruence {
    /// Create `aℤ+b`, normalizing the residue.
    ///
    /// # Panics
    ///
    /// Panics on a negative modulus; use [`try_new`](Self::try_new) for unchecked input.
    pub fn new(modulus: impl Into<BigInt>, residue: impl Into<BigInt>) -> Self {
        match Self::try_new(modulus, residue) {
            Ok(c) => c,
            Err(e) => panic!("{}", e),
        }
    }

    pub fn try_new(modulus: impl Into<BigInt>, residue: impl Into<BigInt>) -> Result<Self, DomainError> {
        let modulus = modulus.into();
        let residue = residue.into();
        if modulus.is_negative() {
            return Err(DomainError::InvalidModulus(modulus));
        }
        Ok(Self::normalized(modulus, residue))
    }

    fn normalized(modulus: BigInt, residue: BigInt) -> Self {
        if modulus.is_zero() {
            Congruence::Val { modulus, residue }
        } else {
            let residue = mod_floor(&residue, &modulus);
            Congruence::Val { modulus, residue }
        }
    }

    pub fn constant(n: impl Into<BigInt>) -> Self {
        Congruence::Val {
            modulus: BigInt::zero(),
            residue: n.into(),
        }
    }

    pub fn modulus(&self) -> Option<&BigInt> {
        match self {
            Congruence::Val { modulus, .. } => Some(modulus),
            Congruence::Bottom => None,
        }
    }

    pub fn residue(&self) -> Option<&BigInt> {
        match self {
            Congruence::Val { residue, .. } => Some(residue),
            Congruence::Bottom => None,
        }
    }

    pub fn as_singleton(&self) -> Option<BigInt> {
        match self {
            Congruence::Val { modulus, residue } if modulus.is_zero() => Some(residue.clone()),
            _ => None,
        }
    }

    pub fn contains(&self, n: &BigInt) -> bool {
        match self {
            Congruence::Bottom => false,
            Congruence::Val { modulus, residue } if modulus.is_zero() => n == residue,
            Congruence::Val { modulus, residue } => mod_floor(&(n - residue), modulus).is_zero(),
        }
    }

    pub fn add(&self, other: &Congruence) -> Congruence {
        match (self, other) {
            (Congruence::Val { modulus: a1, residue: b1 }, Congruence::Val { modulus: a2, residue: b2 }) => {
                Self::normalized(a1.gcd(a2), b1 + b2)
            }
            _ => Congruence::Bottom,
        }
    }

    pub fn neg(&self) -> Congruence {
        match self {
            Congruence::Val { modulus, residue } => Self::normalized(modulus.clone(), -residue),
            Congruence::Bottom => Congruence::Bottom,
        }
    }

    pub fn sub(&self, other: &Congruence) -> Congruence {
        self.add(&other.neg())
    }

    /// `(a₁ℤ+b₁)(a₂ℤ+b₂) ⊆ gcd(a₁a₂, a₁b₂, a₂b₁)ℤ + b₁b₂`
    pub fn mul(&self, other: &Congruence) -> Congruence {
        match (self, other) {
            (Congruence::Val { modulus: a1, residue: b1 }, Congruence::Val { modulus: a2, residue: b2 }) => {
                let m = (a1 * a2).gcd(&(a1 * b2)).gcd(&(a2 * b1));
                Self::normalized(m, b1 * b2)
            }
            _ => Congruence::Bottom,
        }
    }

    /// Truncating division. Precise for constants and for exact division by a constant.
    pub fn div(&self, other: &Congruence) -> Congruence {
        if self.is_bottom() || other.is_bottom() {
            return Congruence::Bottom;
        }
        let Some(c) = other.as_singleton() else {
            return Congruence::top();
        };
        if c.is_zero() {
            return Congruence::Bottom;
        }
        if let Some(n) = self.as_singleton() {
            return Congruence::constant(n / c);
        }
        match self {
            // Every member is a multiple of c, so the division is exact.
            Congruence::Val { modulus, residue } if modulus.is_multiple_of(&c) && residue.is_multiple_of(&c) => {
                Self::normalized((modulus / &c).abs(), residue / &c)
            }
            _ => Congruence::top(),
        }
    }

    /// Truncating remainder.
    pub fn rem(&self, other: &Congruence) -> Congruence {
        if self.is_bottom() || other.is_bottom() {
            return Congruence::Bottom;
        }
        let Some(c) = other.as_singleton() else {
            return Congruence::top();
        };
        if c.is_zero() {
            return Congruence::Bottom;
        }
        if let Some(n) = self.as_singleton() {
            return Congruence::constant(n % c);
        }
        match self {
            Congruence::Val { modulus, residue } if modulus.is_multiple_of(&c) && residue.is_multiple_of(&c) => {
                Congruence::constant(0)
            }
            _ => Congruence::top(),
        }
    }
}

impl Lattice for Congruence {
    fn bottom() -> Self {
        Congruence::Bottom
    }

    fn top() -> Self {
        Congruence::Val {
            modulus: BigInt::one(),
            residue: BigInt::zero(),
        }
    }

    fn is_bottom(&self) -> bool {
        matches!(self, Congruence::Bottom)
    }

    fn is_top(&self) -> bool {
        matches!(self, Congruence::Val { modulus, .. } if modulus.is_one())
    }

    fn leq(&self, other: &Self) -> bool {
        match (self, other) {
            (Congruence::Bottom, _) => true,
            (_, Congruence::Bottom) => false,
            (Congruence::Val { modulus: a1, residue: b1 }, Congruence::Val { modulus: a2, residue: b2 }) => {
                if a2.is_zero() {
                    a1.is_zero() && b1 == b2
                } else {
                    a1.is_multiple_of(a2) && mod_floor(&(b1 - b2), a2).is_zero()
                }
            }
        }
    }

    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (Congruence::Bottom, c) | (c, Congruence::Bottom) => c.clone(),
            (Congruence::Val { modulus: a1, residue: b1 }, Congruence::Val { modulus: a2, residue: b2 }) => {
                let m = a1.gcd(a2).gcd(&(b1 - b2).abs());
                Self::normalized(m, b1.clone())
            }
        }
    }

    /// Ascending chains are finite (the modulus strictly decreases by divisibility).
    fn widen(&self, other: &Self) -> Self {
        self.join(other)
    }

    /// Intersection by the Chinese remainder theorem.
    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (Congruence::Bottom, _) | (_, Congruence::Bottom) => Congruence::Bottom,
            (Congruence::Val { modulus: a1, residue: b1 }, _) if a1.is_zero() => {
                if other.contains(b1) {
                    self.clone()
                } else {
                    Congruence::Bottom
                }
            }
            (_, Congruence::Val { modulus: a2, residue: b2 }) if a2.is_zero() => {
                if self.contains(b2) {
                    other.clone()
                } else {
                    Congruence::Bottom
                }
            }
            (Congruence::Val { modulus: a1, residue: b1 }, Congruence::Val { modulus: a2, residue: b2 }) => {
                // a1*x + a2*y = g
                let e = a1.extended_gcd(a2);
                let g = e.gcd;
                let diff = b2 - b1;
                if !diff.is_multiple_of(&g) {
                    return Congruence::Bottom;
                }
                let lcm = a1 / &g * a2;
                let t = mod_floor(&(e.x * (&diff / &g)), &(a2 / &g));
                Self::normalized(lcm, b1 + a1 * t)
            }
        }
    }

    fn narrow(&self, other: &Self) -> Self {
        self.meet(other)
    }
}

impl NumValue for Congruence {
    fn constant(n: &BigInt) -> Self {
        Congruence::constant(n.clone())
    }

    fn as_constant(&self) -> Option<BigInt> {
        self.as_singleton()
    }

    fn add(&self, other: &Self) -> Self {
        Congruence::add(self, other)
    }

    fn sub(&self, other: &Self) -> Self {
        Congruence::sub(self, other)
    }

    fn mul(&self, other: &Self) -> Self {
        Congruence::mul(self, other)
    }

    fn div(&self, other: &Self) -> Self {
        Congruence::div(self, other)
    }

    fn rem(&self, other: &Self) -> Self {
        Congruence::rem(self, other)
    }

    fn neg(&self) -> Self {
        Congruence::neg(self)
    }

    fn refine_cmp(&self, op: CmpOp, other: &Self) -> Self {
        if self.is_bottom() || other.is_bottom() {
            return Congruence::Bottom;
        }
        if op == CmpOp::Eq {
            return self.meet(other);
        }
        match (self.as_singleton(), other.as_singleton()) {
            (Some(a), Some(b)) if !op.eval(&a, &b) => Congruence::Bottom,
            _ => self.clone(),
        }
    }

    fn to_interval(&self) -> Interval {
        match self {
            Congruence::Bottom => Interval::bottom(),
            _ => match self.as_singleton() {
                Some(n) => Interval::singleton(n),
                None => Interval::top(),
            },
        }
    }

    fn to_congruence(&self) -> Congruence {
        self.clone()
    }

    /// A bounded interval may pin the class down to a single member, or show it empty.
    fn refine_with_interval(&self, i: &Interval) -> Self {
        if self.is_bottom() || i.is_bottom() {
            return Congruence::Bottom;
        }
        let Congruence::Val { modulus, residue } = self else {
            return Congruence::Bottom;
        };
        if modulus.is_zero() {
            return if i.contains(residue) {
                self.clone()
            } else {
                Congruence::Bottom
            };
        }
        match (i.lb(), i.ub()) {
            (Bound::Finite(l), Bound::Finite(u)) => {
                let lo = next_congruent(l, modulus, residue);
                let hi = prev_congruent(u, modulus, residue);
                if lo > hi {
                    Congruence::Bottom
                } else if lo == hi {
                    Congruence::constant(lo)
                } else {
                    self.clone()
                }
            }
            _ => self.clone(),
        }
    }

    fn refine_with_congruence(&self, c: &Congruence) -> Self {
        self.meet(c)
    }
}

impl fmt::Display for Congruence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Congruence::Bottom => write!(f, "_|_"),
            Congruence::Val { modulus, residue } if modulus.is_zero() => write!(f, "{}", residue),
            Congruence::Val { modulus, .. } if modulus.is_one() => write!(f, "Z"),
            Congruence::Val { modulus, residue } => write!(f, "{}Z+{}", modulus, residue),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::tests::check_lattice_laws;

    #[test]
    fn test_congruence_lattice() {
        let even = Congruence::new(2, 0);
        let four = Congruence::new(4, 0);
        let odd = Congruence::new(2, 1);

        assert!(four.leq(&even));
        assert!(!even.leq(&four));
        assert!(even.leq(&Congruence::top()));

        let two_mod_4 = Congruence::new(4, 2);
        assert_eq!(four.join(&two_mod_4), even);
        assert!(even.join(&odd).is_top());
        assert!(even.meet(&odd).is_bottom());
    }

    #[test]
    fn test_join_of_constants() {
        let j = Congruence::constant(2).join(&Congruence::constant(4));
        assert_eq!(j, Congruence::new(2, 0));
        assert_eq!(j.modulus(), Some(&BigInt::from(2)));
        assert_eq!(j.residue(), Some(&BigInt::from(0)));
    }

    #[test]
    fn test_meet_chinese_remainder() {
        // x ≡ 2 (mod 3) ∧ x ≡ 3 (mod 5)  =>  x ≡ 8 (mod 15)
        let m = Congruence::new(3, 2).meet(&Congruence::new(5, 3));
        assert_eq!(m, Congruence::new(15, 8));
        // x ≡ 2 (mod 4) ∧ x ≡ 0 (mod 6)  =>  x ≡ 6 (mod 12)
        let m = Congruence::new(4, 2).meet(&Congruence::new(6, 0));
        assert_eq!(m, Congruence::new(12, 6));
        assert!(Congruence::new(4, 1).meet(&Congruence::new(6, 0)).is_bottom());
        assert_eq!(Congruence::new(3, 1).meet(&Congruence::constant(7)), Congruence::constant(7));
        assert!(Congruence::new(3, 1).meet(&Congruence::constant(8)).is_bottom());
    }

    #[test]
    fn test_invalid_modulus() {
        assert_eq!(
            Congruence::try_new(-3, 1),
            Err(DomainError::InvalidModulus(BigInt::from(-3)))
        );
        assert_eq!(Congruence::try_new(3, -1), Ok(Congruence::new(3, 2)));
    }

    #[test]
    #[should_panic(expected = "invalid congruence modulus")]
    fn test_new_panics_on_negative_modulus() {
        Congruence::new(-2, 0);
    }

    #[test]
    fn test_congruence_arithmetic() {
        let even = Congruence::new(2, 0);
        let one = Congruence::constant(1);
        assert_eq!(even.add(&one), Congruence::new(2, 1));
        assert_eq!(even.mul(&Congruence::constant(2)), Congruence::new(4, 0));
        assert_eq!(Congruence::new(3, 1).mul(&Congruence::new(3, 1)), Congruence::new(3, 1));
        assert_eq!(Congruence::new(4, 2).div(&Congruence::constant(2)), Congruence::new(2, 1));
        assert_eq!(Congruence::new(6, 0).rem(&Congruence::constant(3)), Congruence::constant(0));
        assert!(Congruence::new(6, 1).rem(&Congruence::constant(3)).is_top());
        assert_eq!(Congruence::constant(7).rem(&Congruence::constant(-2)), Congruence::constant(1));
        assert!(even.div(&Congruence::constant(0)).is_bottom());
    }

    #[test]
    fn test_refine_with_interval() {
        let c = Congruence::new(3, 1);
        assert_eq!(c.refine_with_interval(&Interval::finite(2, 5)), Congruence::constant(4));
        assert!(c.refine_with_interval(&Interval::finite(2, 3)).is_bottom());
        assert_eq!(c.refine_with_interval(&Interval::finite(0, 10)), c);
        assert_eq!(c.refine_with_interval(&Interval::at_least(0)), c);
    }

    #[test]
    fn test_display() {
        assert_eq!(Congruence::new(3, 1).to_string(), "3Z+1");
        assert_eq!(Congruence::constant(5).to_string(), "5");
        assert_eq!(Congruence::top().to_string(), "Z");
    }

    #[test]
    fn test_congruence_lattice_laws() {
        let samples = vec![
            Congruence::bottom(),
            Congruence::top(),
            Congruence::constant(0),
            Congruence::constant(4),
            Congruence::new(2, 0),
            Congruence::new(2, 1),
            Congruence::new(3, 1),
            Congruence::new(6, 4),
        ];
        check_lattice_laws(&samples);
    }
}
