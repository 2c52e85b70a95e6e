//! Integer expressions and predicates over [`Variable`]s.

use std::fmt;

use num_bigint::BigInt;
use num_traits::Zero;

use crate::types::Variable;

/// Integer expression (right-hand side of assignments).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    /// Variable reference
    Var(Variable),
    /// Constant value
    Const(BigInt),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    /// Division truncating toward zero
    Div(Box<Expr>, Box<Expr>),
    /// Remainder with the sign of the dividend
    Rem(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
}

impl Expr {
    pub fn var(var: Variable) -> Self {
        Expr::Var(var)
    }

    pub fn constant(value: impl Into<BigInt>) -> Self {
        Expr::Const(value.into())
    }

    pub fn add(self, other: Self) -> Self {
        Expr::Add(Box::new(self), Box::new(other))
    }

    pub fn sub(self, other: Self) -> Self {
        Expr::Sub(Box::new(self), Box::new(other))
    }

    pub fn mul(self, other: Self) -> Self {
        Expr::Mul(Box::new(self), Box::new(other))
    }

    pub fn div(self, other: Self) -> Self {
        Expr::Div(Box::new(self), Box::new(other))
    }

    pub fn rem(self, other: Self) -> Self {
        Expr::Rem(Box::new(self), Box::new(other))
    }

    pub fn neg(self) -> Self {
        Expr::Neg(Box::new(self))
    }

    pub fn eq(self, other: Self) -> Predicate {
        Predicate::Cmp(CmpOp::Eq, self, other)
    }

    pub fn ne(self, other: Self) -> Predicate {
        Predicate::Cmp(CmpOp::Ne, self, other)
    }

    pub fn lt(self, other: Self) -> Predicate {
        Predicate::Cmp(CmpOp::Lt, self, other)
    }

    pub fn le(self, other: Self) -> Predicate {
        Predicate::Cmp(CmpOp::Le, self, other)
    }

    pub fn gt(self, other: Self) -> Predicate {
        Predicate::Cmp(CmpOp::Gt, self, other)
    }

    pub fn ge(self, other: Self) -> Predicate {
        Predicate::Cmp(CmpOp::Ge, self, other)
    }

    /// Match `y + c`, `c + y`, `y - c` or `y` (where `c` is a constant).
    pub fn as_var_offset(&self) -> Option<(Variable, BigInt)> {
        match self {
            Expr::Var(y) => Some((*y, BigInt::zero())),
            Expr::Add(a, b) => match (a.as_ref(), b.as_ref()) {
                (Expr::Var(y), Expr::Const(c)) | (Expr::Const(c), Expr::Var(y)) => Some((*y, c.clone())),
                _ => None,
            },
            Expr::Sub(a, b) => match (a.as_ref(), b.as_ref()) {
                (Expr::Var(y), Expr::Const(c)) => Some((*y, -c)),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&BigInt> {
        match self {
            Expr::Const(c) => Some(c),
            _ => None,
        }
    }

    /// Variables read by the expression, in order of appearance.
    pub fn variables(&self) -> Vec<Variable> {
        let mut vars = Vec::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables(&self, out: &mut Vec<Variable>) {
        match self {
            Expr::Var(v) => {
                if !out.contains(v) {
                    out.push(*v);
                }
            }
            Expr::Const(_) => {}
            Expr::Neg(e) => e.collect_variables(out),
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) | Expr::Rem(a, b) => {
                a.collect_variables(out);
                b.collect_variables(out);
            }
        }
    }
}

impl From<Variable> for Expr {
    fn from(v: Variable) -> Self {
        Expr::Var(v)
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::Const(BigInt::from(n))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var(v) => write!(f, "{}", v),
            Expr::Const(c) => write!(f, "{}", c),
            Expr::Add(a, b) => write!(f, "({} + {})", a, b),
            Expr::Sub(a, b) => write!(f, "({} - {})", a, b),
            Expr::Mul(a, b) => write!(f, "({} * {})", a, b),
            Expr::Div(a, b) => write!(f, "({} / {})", a, b),
            Expr::Rem(a, b) => write!(f, "({} % {})", a, b),
            Expr::Neg(e) => write!(f, "-{}", e),
        }
    }
}

/// Comparison operator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// Operator of the negated comparison: `!(a op b)` is `a op.negate() b`.
    pub fn negate(self) -> CmpOp {
        match self {
            CmpOp::Eq => CmpOp::Ne,
            CmpOp::Ne => CmpOp::Eq,
            CmpOp::Lt => CmpOp::Ge,
            CmpOp::Le => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Le,
            CmpOp::Ge => CmpOp::Lt,
        }
    }

    /// Operator with swapped operands: `a op b` is `b op.flip() a`.
    pub fn flip(self) -> CmpOp {
        match self {
            CmpOp::Eq => CmpOp::Eq,
            CmpOp::Ne => CmpOp::Ne,
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Ge => CmpOp::Le,
        }
    }

    pub fn eval(self, a: &BigInt, b: &BigInt) -> bool {
        match self {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        };
        write!(f, "{}", s)
    }
}

/// Boolean condition over integer expressions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    True,
    False,
    Cmp(CmpOp, Expr, Expr),
    Not(Box<Predicate>),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
}

impl Predicate {
    pub fn cmp(op: CmpOp, lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Predicate::Cmp(op, lhs.into(), rhs.into())
    }

    pub fn not(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    pub fn and(self, other: Self) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Self) -> Self {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    /// Negation pushed down to the comparisons (De Morgan), with no `Not` left.
    pub fn negate(&self) -> Predicate {
        match self {
            Predicate::True => Predicate::False,
            Predicate::False => Predicate::True,
            Predicate::Cmp(op, a, b) => Predicate::Cmp(op.negate(), a.clone(), b.clone()),
            Predicate::Not(p) => p.normalize(),
            Predicate::And(p, q) => p.negate().or(q.negate()),
            Predicate::Or(p, q) => p.negate().and(q.negate()),
        }
    }

    /// Same predicate with every `Not` eliminated.
    pub fn normalize(&self) -> Predicate {
        match self {
            Predicate::Not(p) => p.negate(),
            Predicate::And(p, q) => p.normalize().and(q.normalize()),
            Predicate::Or(p, q) => p.normalize().or(q.normalize()),
            other => other.clone(),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::True => write!(f, "true"),
            Predicate::False => write!(f, "false"),
            Predicate::Cmp(op, a, b) => write!(f, "{} {} {}", a, op, b),
            Predicate::Not(p) => write!(f, "!({})", p),
            Predicate::And(p, q) => write!(f, "({} && {})", p, q),
            Predicate::Or(p, q) => write!(f, "({} || {})", p, q),
        }
    }
}

/// Atomic operand of a pointer or call statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Var(Variable),
    Int(BigInt),
    /// The null pointer constant
    Null,
}

impl Operand {
    pub fn as_var(&self) -> Option<Variable> {
        match self {
            Operand::Var(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<Variable> for Operand {
    fn from(v: Variable) -> Self {
        Operand::Var(v)
    }
}

impl From<i64> for Operand {
    fn from(n: i64) -> Self {
        Operand::Int(BigInt::from(n))
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Var(v) => write!(f, "{}", v),
            Operand::Int(n) => write!(f, "{}", n),
            Operand::Null => write!(f, "null"),
        }
    }
}
