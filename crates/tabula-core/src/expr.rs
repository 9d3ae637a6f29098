//! Typed expression DSL.
//!
//! Expressions are built with small constructor functions and method
//! chains, and compiled against an entity by
//! [`ExpressionCompiler`](crate::compiler::ExpressionCompiler):
//!
//! ```rust
//! use tabula_core::expr::{prop, value};
//!
//! // active = 1 AND (age + 1) * 2 > 40
//! let filter = prop("active")
//!     .eq(value(true))
//!     .and(((prop("age") + 1) * 2).gt(40));
//! ```
//!
//! Arithmetic and bitwise operators are overloaded on [`Expr`] only.
//! Comparisons are methods (`eq`, `lt`, ...) because they build SQL
//! rather than compare values.

use std::ops;

use chrono::NaiveDateTime;

use crate::types::CanonicalType;
use crate::value::{SqlValue, ToSqlValue};

/// Binary operators available in expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Rem,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `LIKE`
    Like,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `AND`
    And,
    /// `OR`
    Or,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
}

/// Unary operators available in expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation.
    Neg,
    /// Logical negation.
    Not,
}

/// A typed expression over an entity's properties.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A field of the subject entity, by Rust field name.
    Property(String),
    /// A literal value.
    Constant(SqlValue),
    /// A scalar value supplied at execution time.
    Arg,
    /// A list of values supplied at execution time.
    ArrayArg,
    /// A binary operation.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// A unary operation.
    Unary {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// A function call by name. Only recognized names compile.
    Call {
        /// Function name.
        name: String,
        /// Arguments.
        args: Vec<Expr>,
    },
    /// `CASE [operand] WHEN .. THEN .. [ELSE ..] END`.
    Case {
        /// Value compared against each `WHEN`, if any.
        operand: Option<Box<Expr>>,
        /// `(when, then)` pairs.
        whens: Vec<(Expr, Expr)>,
        /// `ELSE` branch.
        otherwise: Option<Box<Expr>>,
    },
    /// `CAST(expr AS type)`.
    Cast {
        /// Operand.
        operand: Box<Expr>,
        /// Target type.
        target: CanonicalType,
    },
    /// A parenthesized list.
    Tuple(Vec<Expr>),
    /// `expr AS alias`.
    Alias {
        /// Operand.
        operand: Box<Expr>,
        /// Alias name.
        alias: String,
    },
    /// `*`.
    All,
    /// `ROW_NUMBER() OVER (PARTITION BY .. ORDER BY ..)`.
    RowNumber {
        /// Partition expressions.
        partition_by: Vec<Expr>,
        /// Order expressions with a descending flag.
        order_by: Vec<(Expr, bool)>,
    },
}

/// References a property of the subject entity.
#[must_use]
pub fn prop(name: impl Into<String>) -> Expr {
    Expr::Property(name.into())
}

/// Wraps any convertible value as a constant.
#[must_use]
pub fn value(v: impl ToSqlValue) -> Expr {
    Expr::Constant(v.to_sql_value())
}

/// A scalar argument slot bound at execution time.
#[must_use]
pub const fn arg() -> Expr {
    Expr::Arg
}

/// An array argument slot bound at execution time.
#[must_use]
pub const fn array_arg() -> Expr {
    Expr::ArrayArg
}

/// A function call by name.
#[must_use]
pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Expr {
    Expr::Call {
        name: name.into(),
        args,
    }
}

/// `COUNT(*)`.
#[must_use]
pub fn count_all() -> Expr {
    call("count", Vec::new())
}

/// `COUNT(expr)`.
#[must_use]
pub fn count(expr: impl Into<Expr>) -> Expr {
    call("count", vec![expr.into()])
}

/// `COUNT(DISTINCT expr)`.
#[must_use]
pub fn count_distinct(expr: impl Into<Expr>) -> Expr {
    call("count_distinct", vec![expr.into()])
}

/// `SUM(expr)`.
#[must_use]
pub fn sum(expr: impl Into<Expr>) -> Expr {
    call("sum", vec![expr.into()])
}

/// `AVG(expr)`.
#[must_use]
pub fn avg(expr: impl Into<Expr>) -> Expr {
    call("avg", vec![expr.into()])
}

/// `MIN(expr)`.
#[must_use]
pub fn min(expr: impl Into<Expr>) -> Expr {
    call("min", vec![expr.into()])
}

/// `MAX(expr)`.
#[must_use]
pub fn max(expr: impl Into<Expr>) -> Expr {
    call("max", vec![expr.into()])
}

/// `COALESCE(a, b, ..)`.
#[must_use]
pub fn coalesce(exprs: Vec<Expr>) -> Expr {
    call("coalesce", exprs)
}

/// Conditional value: `CASE WHEN condition THEN then ELSE otherwise END`.
#[must_use]
pub fn if_then(condition: Expr, then: impl Into<Expr>, otherwise: impl Into<Expr>) -> Expr {
    call("if", vec![condition, then.into(), otherwise.into()])
}

/// Starts a searched `CASE` expression.
#[must_use]
pub const fn case() -> CaseBuilder {
    CaseBuilder {
        operand: None,
        whens: Vec::new(),
    }
}

/// Starts a simple `CASE operand WHEN ..` expression.
#[must_use]
pub fn case_of(operand: impl Into<Expr>) -> CaseBuilder {
    CaseBuilder {
        operand: Some(Box::new(operand.into())),
        whens: Vec::new(),
    }
}

/// A parenthesized list of expressions.
#[must_use]
pub fn tuple(items: Vec<Expr>) -> Expr {
    call("tuple", items)
}

/// Membership test: `needle IN haystack`, where the haystack is a tuple or
/// an array argument.
#[must_use]
pub fn any(needle: impl Into<Expr>, haystack: Expr) -> Expr {
    call("any", vec![needle.into(), haystack])
}

/// Starts a `ROW_NUMBER() OVER (..)` window.
#[must_use]
pub const fn row_number() -> Expr {
    Expr::RowNumber {
        partition_by: Vec::new(),
        order_by: Vec::new(),
    }
}

/// Builder for `CASE` expressions.
#[derive(Debug, Clone)]
pub struct CaseBuilder {
    operand: Option<Box<Expr>>,
    whens: Vec<(Expr, Expr)>,
}

impl CaseBuilder {
    /// Adds a `WHEN .. THEN ..` branch.
    #[must_use]
    pub fn when(mut self, condition: impl Into<Expr>, result: impl Into<Expr>) -> Self {
        self.whens.push((condition.into(), result.into()));
        self
    }

    /// Closes the expression with an `ELSE` branch.
    #[must_use]
    pub fn otherwise(self, result: impl Into<Expr>) -> Expr {
        Expr::Case {
            operand: self.operand,
            whens: self.whens,
            otherwise: Some(Box::new(result.into())),
        }
    }

    /// Closes the expression without an `ELSE` branch.
    #[must_use]
    pub fn end(self) -> Expr {
        Expr::Case {
            operand: self.operand,
            whens: self.whens,
            otherwise: None,
        }
    }
}

impl Expr {
    fn binary(self, op: BinaryOp, right: impl Into<Self>) -> Self {
        Self::Binary {
            op,
            left: Box::new(self),
            right: Box::new(right.into()),
        }
    }

    /// `self = other`; against a NULL constant this compiles to `IS NULL`.
    #[must_use]
    pub fn eq(self, other: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Eq, other)
    }

    /// `self <> other`; against a NULL constant this compiles to `IS NOT NULL`.
    #[must_use]
    pub fn ne(self, other: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Ne, other)
    }

    /// `self < other`.
    #[must_use]
    pub fn lt(self, other: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Lt, other)
    }

    /// `self <= other`.
    #[must_use]
    pub fn le(self, other: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Le, other)
    }

    /// `self > other`.
    #[must_use]
    pub fn gt(self, other: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Gt, other)
    }

    /// `self >= other`.
    #[must_use]
    pub fn ge(self, other: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Ge, other)
    }

    /// `self LIKE pattern`.
    #[must_use]
    pub fn like(self, pattern: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Like, pattern)
    }

    /// Logical `AND`.
    #[must_use]
    pub fn and(self, other: impl Into<Self>) -> Self {
        self.binary(BinaryOp::And, other)
    }

    /// Logical `OR`.
    #[must_use]
    pub fn or(self, other: impl Into<Self>) -> Self {
        self.binary(BinaryOp::Or, other)
    }

    /// `self IN (..)`, shorthand for [`any`].
    #[must_use]
    pub fn is_in(self, haystack: Self) -> Self {
        any(self, haystack)
    }

    /// `CAST(self AS target)`.
    #[must_use]
    pub fn cast(self, target: CanonicalType) -> Self {
        Self::Cast {
            operand: Box::new(self),
            target,
        }
    }

    /// `self AS alias`.
    #[must_use]
    pub fn alias(self, alias: impl Into<String>) -> Self {
        Self::Alias {
            operand: Box::new(self),
            alias: alias.into(),
        }
    }

    /// Adds a `PARTITION BY` term to a [`row_number`] window.
    ///
    /// Has no effect on other expressions.
    #[must_use]
    pub fn partition_by(mut self, expr: impl Into<Self>) -> Self {
        if let Self::RowNumber { partition_by, .. } = &mut self {
            partition_by.push(expr.into());
        }
        self
    }

    /// Adds an `ORDER BY` term to a [`row_number`] window.
    ///
    /// Has no effect on other expressions.
    #[must_use]
    pub fn order_by(mut self, expr: impl Into<Self>, descending: bool) -> Self {
        if let Self::RowNumber { order_by, .. } = &mut self {
            order_by.push((expr.into(), descending));
        }
        self
    }
}

macro_rules! impl_from_value {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for Expr {
                fn from(v: $ty) -> Self {
                    Self::Constant(v.to_sql_value())
                }
            }
        )+
    };
}

impl_from_value!(
    SqlValue,
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    f32,
    f64,
    char,
    String,
    &str,
    NaiveDateTime,
    Vec<u8>
);

impl<T: ToSqlValue> From<Option<T>> for Expr {
    fn from(v: Option<T>) -> Self {
        Self::Constant(v.to_sql_value())
    }
}

macro_rules! impl_binary_operator {
    ($($trait:ident :: $method:ident => $op:ident),+ $(,)?) => {
        $(
            impl<R: Into<Expr>> ops::$trait<R> for Expr {
                type Output = Self;

                fn $method(self, rhs: R) -> Self {
                    self.binary(BinaryOp::$op, rhs)
                }
            }
        )+
    };
}

impl_binary_operator!(
    Add::add => Add,
    Sub::sub => Sub,
    Mul::mul => Mul,
    Div::div => Div,
    Rem::rem => Rem,
    BitAnd::bitand => BitAnd,
    BitOr::bitor => BitOr,
    BitXor::bitxor => BitXor,
    Shl::shl => Shl,
    Shr::shr => Shr,
);

impl ops::Neg for Expr {
    type Output = Self;

    fn neg(self) -> Self {
        Self::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(self),
        }
    }
}

impl ops::Not for Expr {
    type Output = Self;

    fn not(self) -> Self {
        Self::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operators_build_tree() {
        let expr = (prop("a") + prop("b")) * 2;
        match expr {
            Expr::Binary { op, left, right } => {
                assert_eq!(op, BinaryOp::Mul);
                assert!(matches!(*left, Expr::Binary { op: BinaryOp::Add, .. }));
                assert!(matches!(*right, Expr::Constant(SqlValue::Int(2))));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_not_and_neg() {
        assert!(matches!(!prop("a"), Expr::Unary { op: UnaryOp::Not, .. }));
        assert!(matches!(-prop("a"), Expr::Unary { op: UnaryOp::Neg, .. }));
    }

    #[test]
    fn test_none_is_null_constant() {
        let expr: Expr = None::<i32>.into();
        assert!(matches!(expr, Expr::Constant(SqlValue::Null)));
    }

    #[test]
    fn test_row_number_builder() {
        let expr = row_number()
            .partition_by(prop("group_id"))
            .order_by(prop("created"), true);
        match expr {
            Expr::RowNumber {
                partition_by,
                order_by,
            } => {
                assert_eq!(partition_by.len(), 1);
                assert_eq!(order_by.len(), 1);
                assert!(order_by[0].1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
