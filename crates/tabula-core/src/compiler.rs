//! Expression compilation.
//!
//! [`ExpressionCompiler`] lowers an [`Expr`] into a [`Token`] tree against
//! one entity descriptor. Property references resolve to mapped columns,
//! recognized calls become function, conditional, tuple or window tokens,
//! and anything else is rejected before any SQL is produced.

use std::sync::Arc;

use crate::dialect::Dialect;
use crate::entity::EntityDescriptor;
use crate::error::{Error, Result};
use crate::expr::{BinaryOp, Expr, UnaryOp};
use crate::operation::{OperationBuilder, PreparedOperation};
use crate::token::{Function, Operator, OrderTerm, Token, UnaryOperator, When};
use crate::value::SqlValue;

/// Options for one compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Resolve properties ignoring ASCII case.
    pub case_insensitive: bool,
    /// Table alias qualifying every column.
    pub alias: Option<String>,
}

impl CompileOptions {
    /// Exact-case resolution, no alias.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            case_insensitive: false,
            alias: None,
        }
    }

    /// Sets case-insensitive property resolution.
    #[must_use]
    pub const fn case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    /// Qualifies columns with a table alias.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// Compiles expressions against one entity.
#[derive(Debug, Clone)]
pub struct ExpressionCompiler<'a> {
    descriptor: &'a EntityDescriptor,
    options: CompileOptions,
}

impl<'a> ExpressionCompiler<'a> {
    /// Creates a compiler for `descriptor`.
    #[must_use]
    pub const fn new(descriptor: &'a EntityDescriptor, options: CompileOptions) -> Self {
        Self {
            descriptor,
            options,
        }
    }

    /// Lowers `expr` into a token tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PropertyNotFound`] for a property with no mapped
    /// column and [`Error::UnsupportedConstruct`] for an unrecognized call.
    pub fn compile(&self, expr: &Expr) -> Result<Token> {
        match expr {
            Expr::Property(name) => self.column(name),
            Expr::Constant(value) => Ok(Token::Constant(value.clone())),
            Expr::Arg => Ok(Token::Argument { array: false }),
            Expr::ArrayArg => Ok(Token::Argument { array: true }),
            Expr::Binary { op, left, right } => self.binary(*op, left, right),
            Expr::Unary { op, operand } => Ok(Token::Unary {
                op: match op {
                    UnaryOp::Neg => UnaryOperator::Negate,
                    UnaryOp::Not => UnaryOperator::Not,
                },
                operand: Box::new(self.compile(operand)?),
            }),
            Expr::Call { name, args } => self.call(name, args),
            Expr::Case {
                operand,
                whens,
                otherwise,
            } => Ok(Token::Case {
                operand: operand
                    .as_deref()
                    .map(|o| self.compile(o).map(Box::new))
                    .transpose()?,
                whens: whens
                    .iter()
                    .map(|(condition, result)| {
                        Ok(When {
                            condition: self.compile(condition)?,
                            result: self.compile(result)?,
                        })
                    })
                    .collect::<Result<_>>()?,
                otherwise: otherwise
                    .as_deref()
                    .map(|o| self.compile(o).map(Box::new))
                    .transpose()?,
            }),
            Expr::Cast { operand, target } => Ok(Token::Cast {
                operand: Box::new(self.compile(operand)?),
                target: target.clone(),
            }),
            Expr::Tuple(items) => Ok(Token::Tuple(self.compile_all(items)?)),
            Expr::Alias { operand, alias } => Ok(Token::Alias {
                operand: Box::new(self.compile(operand)?),
                alias: alias.clone(),
            }),
            Expr::All => Ok(Token::AllColumns {
                alias: self.options.alias.clone(),
            }),
            Expr::RowNumber {
                partition_by,
                order_by,
            } => Ok(Token::RowNumberOver {
                partition_by: self.compile_all(partition_by)?,
                order_by: order_by
                    .iter()
                    .map(|(expr, descending)| {
                        Ok(OrderTerm {
                            token: self.compile(expr)?,
                            descending: *descending,
                        })
                    })
                    .collect::<Result<_>>()?,
            }),
        }
    }

    /// Compiles `expr` and renders it into a standalone prepared operation.
    ///
    /// # Errors
    ///
    /// Same as [`compile`](Self::compile).
    pub fn prepare(&self, expr: &Expr, dialect: Arc<dyn Dialect>) -> Result<PreparedOperation> {
        let token = self.compile(expr)?;
        let mut builder = OperationBuilder::new(dialect);
        builder.token(&token);
        Ok(builder.build())
    }

    fn compile_all(&self, exprs: &[Expr]) -> Result<Vec<Token>> {
        exprs.iter().map(|e| self.compile(e)).collect()
    }

    fn column(&self, property: &str) -> Result<Token> {
        let column = self
            .descriptor
            .column_for_field(property, self.options.case_insensitive)
            .ok_or_else(|| Error::PropertyNotFound {
                property: property.to_string(),
                entity: self.descriptor.name.clone(),
                known: self.descriptor.column_names(),
            })?;
        Ok(Token::Column {
            alias: self.options.alias.clone(),
            name: column.name.clone(),
        })
    }

    fn binary(&self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Token> {
        let is_null = |e: &Expr| matches!(e, Expr::Constant(SqlValue::Null));
        let operator = match op {
            BinaryOp::Eq if is_null(left) || is_null(right) => Operator::Is,
            BinaryOp::Ne if is_null(left) || is_null(right) => Operator::IsNot,
            other => operator(other),
        };
        // `NULL IS x` is not valid SQL; keep the NULL on the right.
        let (left, right) = if matches!(operator, Operator::Is | Operator::IsNot) && is_null(left) {
            (right, left)
        } else {
            (left, right)
        };
        Ok(Token::operation(
            self.compile(left)?,
            operator,
            self.compile(right)?,
        ))
    }

    fn call(&self, name: &str, args: &[Expr]) -> Result<Token> {
        let lowered = name.to_ascii_lowercase();
        let function = |function: Function, distinct: bool| -> Result<Token> {
            Ok(Token::Function {
                function,
                args: self.compile_all(args)?,
                distinct,
            })
        };

        match (lowered.as_str(), args.len()) {
            ("count", 0 | 1) => function(Function::Count, false),
            ("count_distinct", 1) => function(Function::Count, true),
            ("sum", 1) => function(Function::Sum, false),
            ("avg", 1) => function(Function::Avg, false),
            ("min", 1) => function(Function::Min, false),
            ("max", 1) => function(Function::Max, false),
            ("coalesce", n) if n > 0 => function(Function::Coalesce, false),
            ("lower", 1) => function(Function::Lower, false),
            ("upper", 1) => function(Function::Upper, false),
            ("length", 1) => function(Function::Length, false),
            ("abs", 1) => function(Function::Abs, false),
            ("if", 3) => Ok(Token::If {
                condition: Box::new(self.compile(&args[0])?),
                then: Box::new(self.compile(&args[1])?),
                otherwise: Box::new(self.compile(&args[2])?),
            }),
            ("tuple", n) if n > 0 => Ok(Token::Tuple(self.compile_all(args)?)),
            ("any", 2) => Ok(Token::operation(
                self.compile(&args[0])?,
                Operator::In,
                self.compile(&args[1])?,
            )),
            (_, n) => Err(Error::UnsupportedConstruct(format!(
                "function '{name}' with {n} argument(s)"
            ))),
        }
    }
}

const fn operator(op: BinaryOp) -> Operator {
    match op {
        BinaryOp::Mul => Operator::Multiply,
        BinaryOp::Div => Operator::Divide,
        BinaryOp::Rem => Operator::Modulo,
        BinaryOp::Add => Operator::Add,
        BinaryOp::Sub => Operator::Subtract,
        BinaryOp::Eq => Operator::Equal,
        BinaryOp::Ne => Operator::NotEqual,
        BinaryOp::Lt => Operator::Less,
        BinaryOp::Le => Operator::LessOrEqual,
        BinaryOp::Gt => Operator::Greater,
        BinaryOp::Ge => Operator::GreaterOrEqual,
        BinaryOp::Like => Operator::Like,
        BinaryOp::BitAnd => Operator::BitAnd,
        BinaryOp::BitOr => Operator::BitOr,
        BinaryOp::BitXor => Operator::BitXor,
        BinaryOp::And => Operator::And,
        BinaryOp::Or => Operator::Or,
        BinaryOp::Shl => Operator::ShiftLeft,
        BinaryOp::Shr => Operator::ShiftRight,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SqliteDialect;
    use crate::entity::{EntityMapping, FieldMapping};
    use crate::expr::{
        any, array_arg, call, case, coalesce, count_all, count_distinct, if_then, prop, row_number,
        sum, tuple, value,
    };
    use crate::operation::Arg;

    fn people() -> EntityDescriptor {
        EntityDescriptor::build(
            &EntityMapping::table("people")
                .field(FieldMapping::new("id", "i64").primary_key().autoincrement())
                .field(FieldMapping::new("Name", "String"))
                .field(FieldMapping::new("age", "i32"))
                .field(FieldMapping::new("nick", "Option<String>").column("alias_name")),
        )
        .unwrap()
    }

    fn render(expr: &Expr, options: CompileOptions) -> (String, Vec<SqlValue>) {
        let descriptor = people();
        let op = ExpressionCompiler::new(&descriptor, options)
            .prepare(expr, Arc::new(SqliteDialect::new()))
            .unwrap();
        let statement = op.statement(&[]).unwrap();
        (statement.sql, statement.params)
    }

    #[test]
    fn test_property_resolves_to_column() {
        let (sql, params) = render(&prop("Name").eq(prop("Name")), CompileOptions::new());
        assert_eq!(sql, r#""name" = "name""#);
        assert!(params.is_empty());

        let (sql, _) = render(&prop("nick").eq("x"), CompileOptions::new());
        assert_eq!(sql, r#""alias_name" = ?"#);
    }

    #[test]
    fn test_case_insensitive_resolution() {
        let descriptor = people();
        let exact = ExpressionCompiler::new(&descriptor, CompileOptions::new());
        assert!(exact.compile(&prop("name")).is_err());

        let relaxed =
            ExpressionCompiler::new(&descriptor, CompileOptions::new().case_insensitive(true));
        assert_eq!(relaxed.compile(&prop("NAME")).unwrap(), Token::column("name"));
    }

    #[test]
    fn test_unknown_property_lists_columns() {
        let descriptor = people();
        let err = ExpressionCompiler::new(&descriptor, CompileOptions::new())
            .compile(&prop("email").eq("a@b"))
            .unwrap_err();
        assert_eq!(
            err,
            Error::PropertyNotFound {
                property: String::from("email"),
                entity: String::from("people"),
                known: vec![
                    String::from("id"),
                    String::from("name"),
                    String::from("age"),
                    String::from("alias_name"),
                ],
            }
        );
        assert!(err.to_string().contains("known columns: id, name, age, alias_name"));
    }

    #[test]
    fn test_precedence() {
        let (sql, _) = render(&((prop("age") + prop("id")) * prop("age")), CompileOptions::new());
        assert_eq!(sql, r#"("age" + "id") * "age""#);

        let (sql, _) = render(&(prop("age") * prop("id") + prop("age")), CompileOptions::new());
        assert_eq!(sql, r#""age" * "id" + "age""#);
    }

    #[test]
    fn test_null_comparisons_become_is() {
        let (sql, params) = render(&prop("nick").eq(None::<String>), CompileOptions::new());
        assert_eq!(sql, r#""alias_name" IS NULL"#);
        assert!(params.is_empty());

        let (sql, _) = render(&value(SqlValue::Null).ne(prop("nick")), CompileOptions::new());
        assert_eq!(sql, r#""alias_name" IS NOT NULL"#);
    }

    #[test]
    fn test_alias_qualifies_columns() {
        let (sql, _) = render(&prop("age").gt(18), CompileOptions::new().alias("p"));
        assert_eq!(sql, r#""p"."age" > ?"#);
    }

    #[test]
    fn test_recognized_calls() {
        let (sql, _) = render(&count_all(), CompileOptions::new());
        assert_eq!(sql, "COUNT(*)");

        let (sql, _) = render(&count_distinct(prop("age")), CompileOptions::new());
        assert_eq!(sql, r#"COUNT(DISTINCT "age")"#);

        let (sql, _) = render(&sum(prop("age")).alias("total"), CompileOptions::new());
        assert_eq!(sql, r#"SUM("age") AS "total""#);

        let (sql, params) = render(
            &coalesce(vec![prop("nick"), value("anon")]),
            CompileOptions::new(),
        );
        assert_eq!(sql, r#"COALESCE("alias_name", ?)"#);
        assert_eq!(params, vec![SqlValue::Text(String::from("anon"))]);

        let (sql, _) = render(&call("UPPER", vec![prop("Name")]), CompileOptions::new());
        assert_eq!(sql, r#"UPPER("name")"#);
    }

    #[test]
    fn test_conditionals() {
        let (sql, params) = render(
            &if_then(prop("age").ge(18), "adult", "minor"),
            CompileOptions::new(),
        );
        assert_eq!(sql, r#"CASE WHEN "age" >= ? THEN ? ELSE ? END"#);
        assert_eq!(params.len(), 3);

        let (sql, _) = render(
            &case()
                .when(prop("age").lt(13), "child")
                .when(prop("age").lt(20), "teen")
                .otherwise("adult"),
            CompileOptions::new(),
        );
        assert_eq!(
            sql,
            r#"CASE WHEN "age" < ? THEN ? WHEN "age" < ? THEN ? ELSE ? END"#
        );
    }

    #[test]
    fn test_membership() {
        let (sql, params) = render(
            &any(prop("age"), tuple(vec![value(1), value(2)])),
            CompileOptions::new(),
        );
        assert_eq!(sql, r#""age" IN (?, ?)"#);
        assert_eq!(params, vec![SqlValue::Int(1), SqlValue::Int(2)]);

        let descriptor = people();
        let op = ExpressionCompiler::new(&descriptor, CompileOptions::new())
            .prepare(&prop("id").is_in(array_arg()), Arc::new(SqliteDialect::new()))
            .unwrap();
        let statement = op.statement(&[Arg::array([7, 8, 9])]).unwrap();
        assert_eq!(statement.sql, r#""id" IN (?,?,?)"#);
    }

    #[test]
    fn test_window() {
        let (sql, _) = render(
            &row_number()
                .partition_by(prop("age"))
                .order_by(prop("id"), true),
            CompileOptions::new(),
        );
        assert_eq!(
            sql,
            r#"ROW_NUMBER() OVER (PARTITION BY "age" ORDER BY "id" DESC)"#
        );
    }

    #[test]
    fn test_unsupported_calls_are_rejected() {
        let descriptor = people();
        let compiler = ExpressionCompiler::new(&descriptor, CompileOptions::new());

        let err = compiler
            .compile(&call("soundex", vec![prop("Name")]))
            .unwrap_err();
        assert_eq!(
            err,
            Error::UnsupportedConstruct(String::from("function 'soundex' with 1 argument(s)"))
        );

        assert!(compiler.compile(&call("if", vec![prop("age")])).is_err());
    }
}
