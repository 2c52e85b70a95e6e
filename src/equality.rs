//! Offset-equality domain: conjunctions of `x = y + c` and `x = c`.
//!
//! A weakly relational domain kept as a union-find with offsets. Each
//! class has a representative (its smallest node) and every other member
//! stores its offset to the representative. Constants are equalities with
//! a distinguished zero node, which is the smallest node of all and
//! therefore always the representative of its class.
//!
//! The domain carries no bounds by itself. Inside a
//! [`ReducedProduct`](crate::product::ReducedProduct) its equalities
//! carry interval and congruence facts from one variable to another,
//! e.g. a loop counter's bound to a variable that moves in lockstep.

use std::collections::BTreeMap;
use std::fmt;

use num_bigint::BigInt;
use num_traits::Zero;

use crate::congruence::Congruence;
use crate::expr::{CmpOp, Expr};
use crate::interval::Interval;
use crate::lattice::Lattice;
use crate::numeric::NumericDomain;
use crate::types::Variable;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Node {
    Zero,
    Var(Variable),
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Zero => write!(f, "0"),
            Node::Var(v) => write!(f, "{}", v),
        }
    }
}

/// Conjunction of offset equalities.
///
/// # Invariants
///
/// - `parent` maps every non-representative member straight to its representative
///   (no chains): `member = representative + offset`.
/// - The representative of a class is its smallest node.
/// - A bottom value has an empty `parent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqualityDomain {
    parent: BTreeMap<Node, (Node, BigInt)>,
    is_bottom: bool,
}

impl Default for EqualityDomain {
    fn default() -> Self {
        Self::top()
    }
}

impl EqualityDomain {
    fn find(&self, n: Node) -> (Node, BigInt) {
        match self.parent.get(&n) {
            Some((r, o)) => (*r, o.clone()),
            None => (n, BigInt::zero()),
        }
    }

    fn members(&self, rep: Node) -> Vec<(Node, BigInt)> {
        self.parent
            .iter()
            .filter(|(_, (r, _))| *r == rep)
            .map(|(m, (_, o))| (*m, o.clone()))
            .collect()
    }

    fn nodes(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> = self.parent.iter().flat_map(|(m, (r, _))| [*m, *r]).collect();
        nodes.sort();
        nodes.dedup();
        nodes
    }

    /// Record `a = b + c`.
    fn relate(&mut self, a: Node, b: Node, c: BigInt) {
        if self.is_bottom {
            return;
        }
        let (ra, oa) = self.find(a);
        let (rb, ob) = self.find(b);
        if ra == rb {
            if oa != ob + c {
                self.set_to_bottom();
            }
            return;
        }
        // ra = rb + d
        let d = ob + c - oa;
        let (keep, drop, shift) = if rb < ra { (rb, ra, d) } else { (ra, rb, -d) };
        for (m, om) in self.members(drop) {
            self.parent.insert(m, (keep, om + &shift));
        }
        self.parent.insert(drop, (keep, shift));
    }

    /// Remove `n` from its class.
    fn remove(&mut self, n: Node) {
        if self.parent.remove(&n).is_some() {
            return;
        }
        let members = self.members(n);
        let Some((new_rep, o_new)) = members.iter().min_by_key(|(m, _)| *m).cloned() else {
            return;
        };
        // m = n + om and new_rep = n + o_new
        self.parent.remove(&new_rep);
        for (m, om) in members {
            if m != new_rep {
                self.parent.insert(m, (new_rep, om - &o_new));
            }
        }
    }

    /// `x := x + c`
    fn shift(&mut self, x: Variable, c: &BigInt) {
        let x = Node::Var(x);
        if let Some((_, o)) = self.parent.get_mut(&x) {
            *o += c;
            return;
        }
        for (r, o) in self.parent.values_mut() {
            if *r == x {
                *o -= c;
            }
        }
    }

    /// `e` as `node + offset` with `node` a representative.
    fn resolve(&self, e: &Expr) -> Option<(Node, BigInt)> {
        if let Some(k) = e.as_constant() {
            return Some((Node::Zero, k.clone()));
        }
        let (y, c) = e.as_var_offset()?;
        let (r, o) = self.find(Node::Var(y));
        Some((r, o + c))
    }

    fn as_node_offset(e: &Expr) -> Option<(Node, BigInt)> {
        if let Some(k) = e.as_constant() {
            return Some((Node::Zero, k.clone()));
        }
        e.as_var_offset().map(|(y, c)| (Node::Var(y), c))
    }

    /// Constant value of `x`, if `x` is in the class of zero.
    pub fn constant(&self, x: Variable) -> Option<BigInt> {
        match self.find(Node::Var(x)) {
            (Node::Zero, o) if !self.is_bottom => Some(o),
            _ => None,
        }
    }

    /// Whether `x = y + k` is known, and for which `k`.
    pub fn offset(&self, x: Variable, y: Variable) -> Option<BigInt> {
        if self.is_bottom {
            return None;
        }
        let (rx, ox) = self.find(Node::Var(x));
        let (ry, oy) = self.find(Node::Var(y));
        (rx == ry).then(|| ox - oy)
    }
}

impl Lattice for EqualityDomain {
    fn bottom() -> Self {
        Self {
            parent: BTreeMap::new(),
            is_bottom: true,
        }
    }

    fn top() -> Self {
        Self {
            parent: BTreeMap::new(),
            is_bottom: false,
        }
    }

    fn is_bottom(&self) -> bool {
        self.is_bottom
    }

    fn is_top(&self) -> bool {
        !self.is_bottom && self.parent.is_empty()
    }

    fn leq(&self, other: &Self) -> bool {
        if self.is_bottom {
            return true;
        }
        if other.is_bottom {
            return false;
        }
        other.parent.iter().all(|(m, (r, o))| {
            let (rm, om) = self.find(*m);
            let (rr, or) = self.find(*r);
            rm == rr && om - or == *o
        })
    }

    /// Keeps the equalities valid in both operands.
    ///
    /// Two nodes stay related iff they share a class on both sides with the
    /// same offset difference, which groups nodes by
    /// `(representative in self, representative in other, offset difference)`.
    fn join(&self, other: &Self) -> Self {
        if self.is_bottom {
            return other.clone();
        }
        if other.is_bottom {
            return self.clone();
        }
        let mut nodes = self.nodes();
        nodes.extend(other.nodes());
        nodes.sort();
        nodes.dedup();

        let mut groups: BTreeMap<(Node, Node, BigInt), Vec<(Node, BigInt)>> = BTreeMap::new();
        for n in nodes {
            let (ra, oa) = self.find(n);
            let (rb, ob) = other.find(n);
            let diff = &oa - ob;
            groups.entry((ra, rb, diff)).or_default().push((n, oa));
        }

        let mut result = Self::top();
        for members in groups.into_values() {
            // nodes were visited in order, so the first one is the smallest
            let Some(((rep, o_rep), rest)) = members.split_first() else {
                continue;
            };
            for (m, om) in rest {
                result.parent.insert(*m, (*rep, om - o_rep));
            }
        }
        result
    }

    fn widen(&self, other: &Self) -> Self {
        self.join(other)
    }

    fn meet(&self, other: &Self) -> Self {
        if self.is_bottom || other.is_bottom {
            return Self::bottom();
        }
        let mut result = self.clone();
        for (m, (r, o)) in &other.parent {
            result.relate(*m, *r, o.clone());
        }
        result
    }

    fn narrow(&self, other: &Self) -> Self {
        self.meet(other)
    }
}

impl NumericDomain for EqualityDomain {
    fn assign(&mut self, x: Variable, e: &Expr) {
        if self.is_bottom {
            return;
        }
        match Self::as_node_offset(e) {
            Some((Node::Var(y), c)) if y == x => self.shift(x, &c),
            Some((n, c)) => {
                self.remove(Node::Var(x));
                self.relate(Node::Var(x), n, c);
            }
            None => self.remove(Node::Var(x)),
        }
    }

    fn add_constraint(&mut self, op: CmpOp, lhs: &Expr, rhs: &Expr) {
        if self.is_bottom {
            return;
        }
        let (Some((rl, ol)), Some((rr, or))) = (self.resolve(lhs), self.resolve(rhs)) else {
            return;
        };
        if rl == rr {
            // lhs - rhs is known
            if !op.eval(&(ol - or), &BigInt::zero()) {
                self.set_to_bottom();
            }
            return;
        }
        if op == CmpOp::Eq {
            // rl + ol = rr + or
            self.relate(rl, rr, or - ol);
        }
    }

    fn forget(&mut self, x: Variable) {
        if !self.is_bottom {
            self.remove(Node::Var(x));
        }
    }

    fn interval_of(&self, x: Variable) -> Interval {
        if self.is_bottom {
            return Interval::bottom();
        }
        match self.constant(x) {
            Some(c) => Interval::singleton(c),
            None => Interval::top(),
        }
    }

    fn congruence_of(&self, x: Variable) -> Congruence {
        if self.is_bottom {
            return Congruence::bottom();
        }
        match self.constant(x) {
            Some(c) => Congruence::constant(c),
            None => Congruence::top(),
        }
    }

    fn refine_interval(&mut self, x: Variable, i: &Interval) {
        if self.is_bottom {
            return;
        }
        if i.is_bottom() {
            self.set_to_bottom();
        } else if let Some(c) = self.constant(x) {
            if !i.contains(&c) {
                self.set_to_bottom();
            }
        } else if let Some(c) = i.as_singleton() {
            self.relate(Node::Var(x), Node::Zero, c);
        }
    }

    fn refine_congruence(&mut self, x: Variable, c: &Congruence) {
        if self.is_bottom {
            return;
        }
        if c.is_bottom() {
            self.set_to_bottom();
        } else if let Some(k) = self.constant(x) {
            if !c.contains(&k) {
                self.set_to_bottom();
            }
        } else if let Some(k) = c.as_singleton() {
            self.relate(Node::Var(x), Node::Zero, k);
        }
    }

    fn variables(&self) -> Vec<Variable> {
        self.nodes()
            .into_iter()
            .filter_map(|n| match n {
                Node::Var(v) => Some(v),
                Node::Zero => None,
            })
            .collect()
    }

    fn equalities(&self) -> Vec<(Variable, Variable, BigInt)> {
        self.parent
            .iter()
            .filter_map(|(m, (r, o))| match (m, r) {
                (Node::Var(x), Node::Var(y)) => Some((*x, *y, o.clone())),
                _ => None,
            })
            .collect()
    }

    fn set_to_bottom(&mut self) {
        self.parent.clear();
        self.is_bottom = true;
    }
}

impl fmt::Display for EqualityDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bottom {
            return write!(f, "_|_");
        }
        write!(f, "{{")?;
        for (i, (m, (r, o))) in self.parent.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match r {
                Node::Zero => write!(f, "{} = {}", m, o)?,
                _ => write!(f, "{} = {} + {}", m, r, o)?,
            }
        }
        write!(f, "}}")
    }
}
