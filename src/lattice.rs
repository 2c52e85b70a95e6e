//! The lattice contract every abstract domain satisfies.

use std::fmt::Debug;

use num_bigint::BigInt;

/// Abstract domain interface.
///
/// An abstract value denotes a set of concrete program states. The
/// implementation is a lattice with a partial order ([`leq`](Self::leq)),
/// a least element (⊥, "no reachable state") and a greatest element
/// (⊤, "any state").
///
/// # Lattice Properties
///
/// An implementation must satisfy:
/// - `leq` is reflexive and transitive.
/// - `join` is commutative, associative and idempotent, and bounds both operands:
///   `a ⊑ a ⊔ b` and `b ⊑ a ⊔ b`.
/// - `⊥` is the identity of `join` and absorbing for `meet`, and every
///   operation on ⊥ other than `join`/`widen` yields ⊥.
/// - `widen` bounds both operands, and any sequence `x₀, x₁ = x₀ ∇ y₀, x₂ = x₁ ∇ y₁, …`
///   stabilizes after finitely many steps.
/// - `a ⊓ b ⊑ a △ b ⊑ a` for narrowing, and decreasing sequences built
///   with `narrow` stabilize.
///
/// The engine cannot check monotonicity at runtime: an implementation whose
/// `join` does not bound its operands breaks the soundness of every
/// fixpoint built on it.
pub trait Lattice: Clone + Debug {
    /// The bottom element (`⊥`): the empty set of states.
    fn bottom() -> Self;

    /// The top element (`⊤`): no information.
    fn top() -> Self;

    fn is_bottom(&self) -> bool;

    fn is_top(&self) -> bool;

    /// Partial order: `self ⊑ other`.
    fn leq(&self, other: &Self) -> bool;

    /// Join (`⊔`): least upper bound.
    fn join(&self, other: &Self) -> Self;

    /// Widening (`∇`).
    fn widen(&self, other: &Self) -> Self;

    /// Meet (`⊓`): greatest lower bound.
    fn meet(&self, other: &Self) -> Self;

    /// Narrowing (`△`).
    fn narrow(&self, other: &Self) -> Self;

    /// Widening that stops at `threshold` instead of jumping to infinity.
    ///
    /// Domains without a notion of threshold fall back to [`widen`](Self::widen).
    fn widen_threshold(&self, other: &Self, _threshold: &BigInt) -> Self {
        self.widen(other)
    }

    /// Narrowing that may refine a bound equal to `threshold`.
    fn narrow_threshold(&self, other: &Self, _threshold: &BigInt) -> Self {
        self.narrow(other)
    }

    /// Lattice equality: `self ⊑ other ∧ other ⊑ self`.
    fn equals(&self, other: &Self) -> bool {
        self.leq(other) && other.leq(self)
    }

    fn join_with(&mut self, other: &Self) {
        *self = self.join(other);
    }

    fn meet_with(&mut self, other: &Self) {
        *self = self.meet(other);
    }

    /// Join of an arbitrary number of values (`⊥` when empty).
    fn join_all<'a, I>(values: I) -> Self
    where
        Self: 'a,
        I: IntoIterator<Item = &'a Self>,
    {
        values.into_iter().fold(Self::bottom(), |acc, v| acc.join(v))
    }
}
