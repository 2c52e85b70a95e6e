//! Pointer abstract domain: points-to sets, offsets and nullity.
//!
//! A pointer variable is abstracted by a [`PointerValue`]: the set of
//! memory locations it may point into, the interval of byte offsets into
//! that location, and whether it may be null. The pointer state of a
//! program point is a [`PointerDomain`], i.e. an [`Environment`] of
//! pointer values.

use std::collections::BTreeSet;
use std::fmt;

use crate::env::Environment;
use crate::interval::Interval;
use crate::lattice::Lattice;
use crate::types::{MemLoc, Variable};

/// Set of memory locations, or every location (top).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PointsToSet {
    Top,
    /// The empty set is bottom.
    Set(BTreeSet<MemLoc>),
}

impl PointsToSet {
    pub fn singleton(loc: MemLoc) -> Self {
        PointsToSet::Set(BTreeSet::from([loc]))
    }

    pub fn from_locations(locs: impl IntoIterator<Item = MemLoc>) -> Self {
        PointsToSet::Set(locs.into_iter().collect())
    }

    /// Locations of a finite set, `None` for top.
    pub fn locations(&self) -> Option<&BTreeSet<MemLoc>> {
        match self {
            PointsToSet::Top => None,
            PointsToSet::Set(s) => Some(s),
        }
    }

    pub fn contains(&self, loc: MemLoc) -> bool {
        match self {
            PointsToSet::Top => true,
            PointsToSet::Set(s) => s.contains(&loc),
        }
    }

    pub fn as_singleton(&self) -> Option<MemLoc> {
        match self {
            PointsToSet::Set(s) if s.len() == 1 => s.iter().next().copied(),
            _ => None,
        }
    }
}

impl Lattice for PointsToSet {
    fn bottom() -> Self {
        PointsToSet::Set(BTreeSet::new())
    }

    fn top() -> Self {
        PointsToSet::Top
    }

    fn is_bottom(&self) -> bool {
        matches!(self, PointsToSet::Set(s) if s.is_empty())
    }

    fn is_top(&self) -> bool {
        matches!(self, PointsToSet::Top)
    }

    fn leq(&self, other: &Self) -> bool {
        match (self, other) {
            (_, PointsToSet::Top) => true,
            (PointsToSet::Top, _) => false,
            (PointsToSet::Set(a), PointsToSet::Set(b)) => a.is_subset(b),
        }
    }

    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (PointsToSet::Top, _) | (_, PointsToSet::Top) => PointsToSet::Top,
            (PointsToSet::Set(a), PointsToSet::Set(b)) => PointsToSet::Set(a.union(b).copied().collect()),
        }
    }

    /// Locations are finite, so join terminates.
    fn widen(&self, other: &Self) -> Self {
        self.join(other)
    }

    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (PointsToSet::Top, x) | (x, PointsToSet::Top) => x.clone(),
            (PointsToSet::Set(a), PointsToSet::Set(b)) => PointsToSet::Set(a.intersection(b).copied().collect()),
        }
    }

    fn narrow(&self, other: &Self) -> Self {
        self.meet(other)
    }
}

/// Nullity lattice: `⊥ < Null, NonNull < ⊤`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Nullity {
    Bottom,
    Null,
    NonNull,
    Top,
}

impl Nullity {
    pub fn may_be_null(self) -> bool {
        matches!(self, Nullity::Null | Nullity::Top)
    }

    pub fn may_be_non_null(self) -> bool {
        matches!(self, Nullity::NonNull | Nullity::Top)
    }
}

impl Lattice for Nullity {
    fn bottom() -> Self {
        Nullity::Bottom
    }

    fn top() -> Self {
        Nullity::Top
    }

    fn is_bottom(&self) -> bool {
        *self == Nullity::Bottom
    }

    fn is_top(&self) -> bool {
        *self == Nullity::Top
    }

    fn leq(&self, other: &Self) -> bool {
        self == other || *self == Nullity::Bottom || *other == Nullity::Top
    }

    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (a, b) if a == b => *a,
            (Nullity::Bottom, x) | (x, Nullity::Bottom) => *x,
            _ => Nullity::Top,
        }
    }

    fn widen(&self, other: &Self) -> Self {
        self.join(other)
    }

    fn meet(&self, other: &Self) -> Self {
        match (self, other) {
            (a, b) if a == b => *a,
            (Nullity::Top, x) | (x, Nullity::Top) => *x,
            _ => Nullity::Bottom,
        }
    }

    fn narrow(&self, other: &Self) -> Self {
        self.meet(other)
    }
}

/// Abstract pointer: `null` (if [`Nullity`] allows it) or an address
/// `loc + offset` with `loc` in the points-to set.
///
/// # Invariants
///
/// - A definitely-null value has an empty points-to set and a bottom offset.
/// - A value that may not be null but has no address is bottom.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PointerValue {
    points_to: PointsToSet,
    offset: Interval,
    nullity: Nullity,
}

impl PointerValue {
    pub fn new(points_to: PointsToSet, offset: Interval, nullity: Nullity) -> Self {
        let has_address = !points_to.is_bottom() && !offset.is_bottom();
        match nullity {
            Nullity::Bottom => Self::bottom(),
            Nullity::Null => Self::null(),
            Nullity::NonNull if !has_address => Self::bottom(),
            Nullity::Top if !has_address => Self::null(),
            _ => Self {
                points_to,
                offset,
                nullity,
            },
        }
    }

    pub fn null() -> Self {
        Self {
            points_to: PointsToSet::bottom(),
            offset: Interval::bottom(),
            nullity: Nullity::Null,
        }
    }

    /// `&loc` (offset zero, non-null).
    pub fn address(loc: MemLoc) -> Self {
        Self {
            points_to: PointsToSet::singleton(loc),
            offset: Interval::singleton(0),
            nullity: Nullity::NonNull,
        }
    }

    pub fn points_to(&self) -> &PointsToSet {
        &self.points_to
    }

    pub fn offset(&self) -> &Interval {
        &self.offset
    }

    pub fn nullity(&self) -> Nullity {
        self.nullity
    }

    /// `self + delta` (pointer arithmetic in bytes).
    pub fn shift(&self, delta: &Interval) -> Self {
        if self.nullity == Nullity::Null {
            return self.clone();
        }
        PointerValue::new(self.points_to.clone(), self.offset.add(delta), self.nullity)
    }

    /// The non-null part of this value.
    pub fn assume_non_null(&self) -> Self {
        PointerValue::new(self.points_to.clone(), self.offset.clone(), self.nullity.meet(&Nullity::NonNull))
    }

    /// The null part of this value.
    pub fn assume_null(&self) -> Self {
        if self.nullity.may_be_null() {
            Self::null()
        } else {
            Self::bottom()
        }
    }
}

impl Lattice for PointerValue {
    fn bottom() -> Self {
        Self {
            points_to: PointsToSet::bottom(),
            offset: Interval::bottom(),
            nullity: Nullity::Bottom,
        }
    }

    fn top() -> Self {
        Self {
            points_to: PointsToSet::Top,
            offset: Interval::top(),
            nullity: Nullity::Top,
        }
    }

    fn is_bottom(&self) -> bool {
        self.nullity.is_bottom()
    }

    fn is_top(&self) -> bool {
        self.points_to.is_top() && self.offset.is_top() && self.nullity.is_top()
    }

    fn leq(&self, other: &Self) -> bool {
        self.nullity.leq(&other.nullity) && self.points_to.leq(&other.points_to) && self.offset.leq(&other.offset)
    }

    fn join(&self, other: &Self) -> Self {
        PointerValue::new(
            self.points_to.join(&other.points_to),
            self.offset.join(&other.offset),
            self.nullity.join(&other.nullity),
        )
    }

    fn widen(&self, other: &Self) -> Self {
        PointerValue::new(
            self.points_to.widen(&other.points_to),
            self.offset.widen(&other.offset),
            self.nullity.widen(&other.nullity),
        )
    }

    fn meet(&self, other: &Self) -> Self {
        PointerValue::new(
            self.points_to.meet(&other.points_to),
            self.offset.meet(&other.offset),
            self.nullity.meet(&other.nullity),
        )
    }

    fn narrow(&self, other: &Self) -> Self {
        PointerValue::new(
            self.points_to.narrow(&other.points_to),
            self.offset.narrow(&other.offset),
            self.nullity.narrow(&other.nullity),
        )
    }
}

impl fmt::Display for PointerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.nullity, &self.points_to) {
            (Nullity::Bottom, _) => write!(f, "_|_"),
            (Nullity::Null, _) => write!(f, "null"),
            (n, pts) => {
                match pts {
                    PointsToSet::Top => write!(f, "{{T}}")?,
                    PointsToSet::Set(s) => {
                        let locs: Vec<String> = s.iter().map(|l| l.to_string()).collect();
                        write!(f, "{{{}}}", locs.join(", "))?;
                    }
                }
                write!(f, " + {}", self.offset)?;
                if *n == Nullity::Top {
                    write!(f, " (maybe null)")?;
                }
                Ok(())
            }
        }
    }
}

/// Pointer state: `Variable -> PointerValue`.
pub type PointerDomain = Environment<PointerValue>;

impl Environment<PointerValue> {
    pub fn points_to(&self, p: Variable) -> PointsToSet {
        self.get(p).points_to
    }

    pub fn nullity(&self, p: Variable) -> Nullity {
        self.get(p).nullity
    }

    /// `p := null`
    pub fn assign_null(&mut self, p: Variable) {
        self.set(p, PointerValue::null());
    }

    /// `p := &loc`
    pub fn assign_address(&mut self, p: Variable, loc: MemLoc) {
        self.set(p, PointerValue::address(loc));
    }

    /// `p := q + delta`
    pub fn assign_pointer(&mut self, p: Variable, q: Variable, delta: &Interval) {
        let v = self.get(q).shift(delta);
        self.set(p, v);
    }

    /// Assume `p == null` (`is_null`) or `p != null`.
    pub fn assume_nullity(&mut self, p: Variable, is_null: bool) {
        let v = self.get(p);
        let refined = if is_null { v.assume_null() } else { v.assume_non_null() };
        self.set(p, refined);
    }
}
