//! Combined program state: numerical facts plus pointer facts.

use std::fmt;

use num_bigint::BigInt;

use crate::lattice::Lattice;
use crate::numeric::NumericDomain;
use crate::pointer::PointerDomain;
use crate::types::Variable;

/// Abstract state used by [`NumericalTransfer`](crate::transfer::NumericalTransfer).
///
/// Integer variables (including memory cells) live in `numeric`, pointer
/// variables in `pointers`. The state is bottom as soon as either part is.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueDomain<N> {
    numeric: N,
    pointers: PointerDomain,
}

impl<N: NumericDomain> ValueDomain<N> {
    pub fn new(numeric: N, pointers: PointerDomain) -> Self {
        if numeric.is_bottom() || pointers.is_bottom() {
            Self::bottom()
        } else {
            Self { numeric, pointers }
        }
    }

    pub fn numeric(&self) -> &N {
        &self.numeric
    }

    pub fn pointers(&self) -> &PointerDomain {
        &self.pointers
    }

    /// Mutate the numerical part, keeping the state normalized.
    pub fn update_numeric(&mut self, f: impl FnOnce(&mut N)) {
        if self.is_bottom() {
            return;
        }
        f(&mut self.numeric);
        if self.numeric.is_bottom() {
            self.set_to_bottom();
        }
    }

    /// Mutate the pointer part, keeping the state normalized.
    pub fn update_pointers(&mut self, f: impl FnOnce(&mut PointerDomain)) {
        if self.is_bottom() {
            return;
        }
        f(&mut self.pointers);
        if self.pointers.is_bottom() {
            self.set_to_bottom();
        }
    }

    /// Forget everything known about `x`, as an integer and as a pointer.
    pub fn forget(&mut self, x: Variable) {
        if self.is_bottom() {
            return;
        }
        self.numeric.forget(x);
        self.pointers.remove(x);
    }

    pub fn set_to_bottom(&mut self) {
        *self = Self::bottom();
    }

    fn lift(&self, other: &Self, fn_num: impl Fn(&N, &N) -> N, fn_ptr: impl Fn(&PointerDomain, &PointerDomain) -> PointerDomain) -> Self {
        Self::new(fn_num(&self.numeric, &other.numeric), fn_ptr(&self.pointers, &other.pointers))
    }
}

impl<N: NumericDomain> Lattice for ValueDomain<N> {
    fn bottom() -> Self {
        Self {
            numeric: N::bottom(),
            pointers: PointerDomain::bottom(),
        }
    }

    fn top() -> Self {
        Self {
            numeric: N::top(),
            pointers: PointerDomain::top(),
        }
    }

    fn is_bottom(&self) -> bool {
        self.numeric.is_bottom() || self.pointers.is_bottom()
    }

    fn is_top(&self) -> bool {
        self.numeric.is_top() && self.pointers.is_top()
    }

    fn leq(&self, other: &Self) -> bool {
        if self.is_bottom() {
            return true;
        }
        if other.is_bottom() {
            return false;
        }
        self.numeric.leq(&other.numeric) && self.pointers.leq(&other.pointers)
    }

    fn join(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        self.lift(other, |a, b| a.join(b), |a, b| a.join(b))
    }

    fn widen(&self, other: &Self) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        self.lift(other, |a, b| a.widen(b), |a, b| a.widen(b))
    }

    fn meet(&self, other: &Self) -> Self {
        self.lift(other, |a, b| a.meet(b), |a, b| a.meet(b))
    }

    fn narrow(&self, other: &Self) -> Self {
        self.lift(other, |a, b| a.narrow(b), |a, b| a.narrow(b))
    }

    fn widen_threshold(&self, other: &Self, threshold: &BigInt) -> Self {
        if self.is_bottom() {
            return other.clone();
        }
        if other.is_bottom() {
            return self.clone();
        }
        self.lift(other, |a, b| a.widen_threshold(b, threshold), |a, b| a.widen(b))
    }

    fn narrow_threshold(&self, other: &Self, threshold: &BigInt) -> Self {
        self.lift(other, |a, b| a.narrow_threshold(b, threshold), |a, b| a.narrow(b))
    }
}

impl<N: NumericDomain> Default for ValueDomain<N> {
    fn default() -> Self {
        Self::top()
    }
}

impl<N: fmt::Display + NumericDomain> fmt::Display for ValueDomain<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bottom() {
            return write!(f, "_|_");
        }
        write!(f, "({}, {})", self.numeric, self.pointers)
    }
}
