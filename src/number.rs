//! Numbers: unbounded integers with infinities, and bounded machine integers.
//!
//! [`Bound`] is the endpoint type of intervals. It is either a finite
//! arbitrary-precision integer ([`BigInt`]) or one of the two infinities.
//! Arithmetic follows the extended-integer conventions:
//!
//! ```text
//! +∞ + n  = +∞          -∞ + n  = -∞
//! +∞ * n  = ±∞          0 * ±∞  = 0
//! n / ±∞  = 0
//! ```
//!
//! `+∞ + -∞` has no meaning; interval operations never produce it, and
//! reaching it is a contract violation (panic).
//!
//! [`MachineInt`] is a fixed-width integer with wrap-around semantics,
//! used to describe the range of a typed variable.

use std::cmp::Ordering;
use std::fmt;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

/// Endpoint of an interval: `-∞`, a finite integer, or `+∞`.
///
/// The derived order is the expected total order `-∞ < n < +∞`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bound {
    NegInf,
    Finite(BigInt),
    PosInf,
}

impl Bound {
    pub fn finite(n: impl Into<BigInt>) -> Self {
        Bound::Finite(n.into())
    }

    pub fn zero() -> Self {
        Bound::Finite(BigInt::zero())
    }

    pub fn is_finite(&self) -> bool {
        matches!(self, Bound::Finite(_))
    }

    pub fn is_infinite(&self) -> bool {
        !self.is_finite()
    }

    pub fn as_finite(&self) -> Option<&BigInt> {
        match self {
            Bound::Finite(n) => Some(n),
            _ => None,
        }
    }

    /// Sign as an ordering against zero.
    fn sign(&self) -> Ordering {
        match self {
            Bound::NegInf => Ordering::Less,
            Bound::PosInf => Ordering::Greater,
            Bound::Finite(n) => n.cmp(&BigInt::zero()),
        }
    }

    fn infinity(sign: Ordering) -> Bound {
        match sign {
            Ordering::Less => Bound::NegInf,
            Ordering::Greater => Bound::PosInf,
            Ordering::Equal => Bound::zero(),
        }
    }

    pub fn add(&self, other: &Bound) -> Bound {
        match (self, other) {
            (Bound::Finite(a), Bound::Finite(b)) => Bound::Finite(a + b),
            (Bound::NegInf, Bound::PosInf) | (Bound::PosInf, Bound::NegInf) => {
                panic!("undefined bound arithmetic: +oo + -oo")
            }
            (Bound::NegInf, _) | (_, Bound::NegInf) => Bound::NegInf,
            (Bound::PosInf, _) | (_, Bound::PosInf) => Bound::PosInf,
        }
    }

    pub fn sub(&self, other: &Bound) -> Bound {
        self.add(&other.neg())
    }

    pub fn neg(&self) -> Bound {
        match self {
            Bound::NegInf => Bound::PosInf,
            Bound::Finite(n) => Bound::Finite(-n),
            Bound::PosInf => Bound::NegInf,
        }
    }

    pub fn mul(&self, other: &Bound) -> Bound {
        match (self, other) {
            (Bound::Finite(a), Bound::Finite(b)) => Bound::Finite(a * b),
            _ => Bound::infinity(product_sign(self.sign(), other.sign())),
        }
    }

    /// Division truncating toward zero, the way machine integer division does.
    ///
    /// # Panics
    ///
    /// Panics if `other` is zero; callers split divisors around zero first.
    pub fn div(&self, other: &Bound) -> Bound {
        match (self, other) {
            (_, Bound::Finite(b)) if b.is_zero() => panic!("bound division by zero"),
            (Bound::Finite(a), Bound::Finite(b)) => Bound::Finite(a / b),
            (Bound::Finite(_), _) => Bound::zero(),
            _ => Bound::infinity(product_sign(self.sign(), other.sign())),
        }
    }
}

fn product_sign(a: Ordering, b: Ordering) -> Ordering {
    match (a, b) {
        (Ordering::Equal, _) | (_, Ordering::Equal) => Ordering::Equal,
        (x, y) if x == y => Ordering::Greater,
        _ => Ordering::Less,
    }
}

impl From<i64> for Bound {
    fn from(n: i64) -> Self {
        Bound::Finite(BigInt::from(n))
    }
}

impl From<BigInt> for Bound {
    fn from(n: BigInt) -> Self {
        Bound::Finite(n)
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::NegInf => write!(f, "-oo"),
            Bound::Finite(n) => write!(f, "{}", n),
            Bound::PosInf => write!(f, "+oo"),
        }
    }
}

/// Non-negative remainder of `a` modulo `|m|` (`m != 0`).
pub fn mod_floor(a: &BigInt, m: &BigInt) -> BigInt {
    a.mod_floor(&m.abs())
}

/// Smallest `x >= lb` with `x ≡ r (mod m)`, for `m > 0`.
pub fn next_congruent(lb: &BigInt, m: &BigInt, r: &BigInt) -> BigInt {
    lb + mod_floor(&(r - lb), m)
}

/// Largest `x <= ub` with `x ≡ r (mod m)`, for `m > 0`.
pub fn prev_congruent(ub: &BigInt, m: &BigInt, r: &BigInt) -> BigInt {
    ub - mod_floor(&(ub - r), m)
}

/// Signedness of a machine integer type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Signedness {
    Signed,
    Unsigned,
}

/// Machine integer type: bit-width and signedness.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct IntType {
    pub bit_width: u32,
    pub signedness: Signedness,
}

impl IntType {
    /// # Panics
    ///
    /// Panics if `bit_width == 0`.
    pub fn new(bit_width: u32, signedness: Signedness) -> Self {
        assert!(bit_width > 0, "bit-width must be positive");
        Self { bit_width, signedness }
    }

    pub fn min(&self) -> BigInt {
        match self.signedness {
            Signedness::Unsigned => BigInt::zero(),
            Signedness::Signed => -(BigInt::one() << (self.bit_width - 1)),
        }
    }

    pub fn max(&self) -> BigInt {
        match self.signedness {
            Signedness::Unsigned => (BigInt::one() << self.bit_width) - BigInt::one(),
            Signedness::Signed => (BigInt::one() << (self.bit_width - 1)) - BigInt::one(),
        }
    }

    /// Wrap an unbounded integer into the range of this type (two's complement).
    pub fn wrap(&self, n: &BigInt) -> BigInt {
        let modulus = BigInt::one() << self.bit_width;
        let r = n.mod_floor(&modulus);
        match self.signedness {
            Signedness::Signed if r > self.max() => r - modulus,
            _ => r,
        }
    }

    pub fn contains(&self, n: &BigInt) -> bool {
        *n >= self.min() && *n <= self.max()
    }
}

impl fmt::Display for IntType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self.signedness {
            Signedness::Signed => "si",
            Signedness::Unsigned => "ui",
        };
        write!(f, "{}{}", s, self.bit_width)
    }
}

/// Fixed-width integer with wrap-around arithmetic.
///
/// # Invariants
///
/// - `value` is always within `[ty.min(), ty.max()]`.
/// - Binary operations require both operands to have the same type;
///   mixing widths or signedness is a contract violation and panics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MachineInt {
    value: BigInt,
    ty: IntType,
}

impl MachineInt {
    pub fn new(value: impl Into<BigInt>, ty: IntType) -> Self {
        let value = ty.wrap(&value.into());
        Self { value, ty }
    }

    pub fn min(ty: IntType) -> Self {
        Self { value: ty.min(), ty }
    }

    pub fn max(ty: IntType) -> Self {
        Self { value: ty.max(), ty }
    }

    pub fn value(&self) -> &BigInt {
        &self.value
    }

    pub fn ty(&self) -> IntType {
        self.ty
    }

    fn check_compatible(&self, other: &MachineInt) {
        assert_eq!(
            self.ty, other.ty,
            "machine integer operands with different types: {} and {}",
            self.ty, other.ty
        );
    }

    pub fn add(&self, other: &MachineInt) -> MachineInt {
        self.check_compatible(other);
        MachineInt::new(&self.value + &other.value, self.ty)
    }

    pub fn sub(&self, other: &MachineInt) -> MachineInt {
        self.check_compatible(other);
        MachineInt::new(&self.value - &other.value, self.ty)
    }

    pub fn mul(&self, other: &MachineInt) -> MachineInt {
        self.check_compatible(other);
        MachineInt::new(&self.value * &other.value, self.ty)
    }

    /// Same bit pattern reinterpreted with another signedness.
    pub fn cast(&self, signedness: Signedness) -> MachineInt {
        MachineInt::new(self.value.clone(), IntType::new(self.ty.bit_width, signedness))
    }
}

impl PartialOrd for MachineInt {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.ty == other.ty {
            Some(self.value.cmp(&other.value))
        } else {
            None
        }
    }
}

impl fmt::Display for MachineInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.value, self.ty)
    }
}
