//! Intermediate SQL representation.
//!
//! A [`Token`] tree is what the expression compiler produces and what the
//! statement builders assemble. Rendering a tree appends text and parameter
//! slots to an [`OperationBuilder`](crate::operation::OperationBuilder); it
//! never mutates the tree and never performs I/O, so the same tree rendered
//! with the same dialect and alias always yields the same text and
//! parameter order.

mod render;

pub(crate) use render::render_order;

use crate::types::CanonicalType;
use crate::value::SqlValue;

/// Binary SQL operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Modulo,
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `=`
    Equal,
    /// `<>`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessOrEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterOrEqual,
    /// `LIKE`
    Like,
    /// `IS`
    Is,
    /// `IS NOT`
    IsNot,
    /// `IN`
    In,
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
    ShiftLeft,
    /// `>>`
    ShiftRight,
}

impl Operator {
    /// Binding priority; lower numbers bind tighter.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Multiply | Self::Divide | Self::Modulo => 0,
            Self::Add | Self::Subtract => 1,
            Self::Equal
            | Self::NotEqual
            | Self::Less
            | Self::LessOrEqual
            | Self::Greater
            | Self::GreaterOrEqual
            | Self::Like
            | Self::Is
            | Self::IsNot
            | Self::In => 3,
            Self::BitAnd => 4,
            Self::BitOr => 5,
            Self::BitXor => 6,
            Self::And => 7,
            Self::Or => 8,
            Self::ShiftLeft | Self::ShiftRight => 9,
        }
    }

    /// SQL spelling.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::Like => "LIKE",
            Self::Is => "IS",
            Self::IsNot => "IS NOT",
            Self::In => "IN",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::And => "AND",
            Self::Or => "OR",
            Self::ShiftLeft => "<<",
            Self::ShiftRight => ">>",
        }
    }
}

/// Unary SQL operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    /// `-x`
    Negate,
    /// `NOT x`
    Not,
}

impl UnaryOperator {
    /// Binding priority, on the same scale as [`Operator::priority`].
    #[must_use]
    pub const fn priority(self) -> u8 {
        2
    }

    /// SQL spelling, including any trailing space.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Negate => "-",
            Self::Not => "NOT ",
        }
    }
}

/// Recognized aggregate and scalar functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    /// `COUNT`
    Count,
    /// `SUM`
    Sum,
    /// `AVG`
    Avg,
    /// `MIN`
    Min,
    /// `MAX`
    Max,
    /// `COALESCE`
    Coalesce,
    /// `LOWER`
    Lower,
    /// `UPPER`
    Upper,
    /// `LENGTH`
    Length,
    /// `ABS`
    Abs,
}

impl Function {
    /// SQL function name.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Coalesce => "COALESCE",
            Self::Lower => "LOWER",
            Self::Upper => "UPPER",
            Self::Length => "LENGTH",
            Self::Abs => "ABS",
        }
    }

    /// Whether the function aggregates rows.
    #[must_use]
    pub const fn is_aggregate(self) -> bool {
        matches!(
            self,
            Self::Count | Self::Sum | Self::Avg | Self::Min | Self::Max
        )
    }
}

/// One `WHEN .. THEN ..` branch.
#[derive(Debug, Clone, PartialEq)]
pub struct When {
    /// Condition, or the compared value in a simple `CASE`.
    pub condition: Token,
    /// Result.
    pub result: Token,
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    /// Ordered expression.
    pub token: Token,
    /// `DESC` when set.
    pub descending: bool,
}

/// A node of the intermediate SQL representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A column, optionally qualified by a table alias.
    Column {
        /// Table alias.
        alias: Option<String>,
        /// Column name.
        name: String,
    },
    /// A literal value; NULL renders inline, anything else as a parameter.
    Constant(SqlValue),
    /// A call-time argument slot.
    Argument {
        /// Whether the slot takes a list of values.
        array: bool,
    },
    /// A binary operation.
    Operation {
        /// Left operand.
        left: Box<Token>,
        /// Operator.
        op: Operator,
        /// Right operand.
        right: Box<Token>,
    },
    /// A unary operation.
    Unary {
        /// Operator.
        op: UnaryOperator,
        /// Operand.
        operand: Box<Token>,
    },
    /// A function call. `COUNT` without arguments renders `COUNT(*)`.
    Function {
        /// Function.
        function: Function,
        /// Arguments.
        args: Vec<Token>,
        /// `DISTINCT` modifier.
        distinct: bool,
    },
    /// `CASE [operand] WHEN .. END`.
    Case {
        /// Compared value for a simple `CASE`.
        operand: Option<Box<Token>>,
        /// Branches.
        whens: Vec<When>,
        /// `ELSE` branch.
        otherwise: Option<Box<Token>>,
    },
    /// Two-way conditional, rendered as a searched `CASE`.
    If {
        /// Condition.
        condition: Box<Token>,
        /// Value when true.
        then: Box<Token>,
        /// Value otherwise.
        otherwise: Box<Token>,
    },
    /// `CAST(operand AS native)`.
    Cast {
        /// Operand.
        operand: Box<Token>,
        /// Target type, mapped by the dialect.
        target: CanonicalType,
    },
    /// `(a, b, ..)`.
    Tuple(Vec<Token>),
    /// `operand AS "alias"`.
    Alias {
        /// Operand.
        operand: Box<Token>,
        /// Alias.
        alias: String,
    },
    /// `*` or `alias.*`.
    AllColumns {
        /// Table alias.
        alias: Option<String>,
    },
    /// `ROW_NUMBER() OVER (PARTITION BY .. ORDER BY ..)`.
    RowNumberOver {
        /// Partition terms.
        partition_by: Vec<Token>,
        /// Order terms.
        order_by: Vec<OrderTerm>,
    },
    /// Paging clause in the dialect's syntax; renders nothing when both
    /// bounds are absent.
    LimitOffset {
        /// Maximum row count.
        limit: Option<u64>,
        /// Rows skipped.
        offset: Option<u64>,
        /// Whether the statement already has an `ORDER BY`.
        ordered: bool,
    },
}

impl Token {
    /// Unqualified column.
    #[must_use]
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column {
            alias: None,
            name: name.into(),
        }
    }

    /// Binary operation.
    #[must_use]
    pub fn operation(left: Self, op: Operator, right: Self) -> Self {
        Self::Operation {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Priority of the node when it appears as an operand, `None` when the
    /// node is atomic.
    #[must_use]
    pub const fn priority(&self) -> Option<u8> {
        match self {
            Self::Operation { op, .. } => Some(op.priority()),
            Self::Unary { op, .. } => Some(op.priority()),
            _ => None,
        }
    }
}
