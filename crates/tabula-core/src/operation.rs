//! Parameterized command assembly.
//!
//! An [`OperationBuilder`] accumulates SQL text, captured parameters and
//! call-time argument slots. [`OperationBuilder::build`] freezes them into a
//! reusable [`PreparedOperation`], which renders a concrete [`Statement`]
//! for each set of call-time arguments.
//!
//! ```rust
//! use std::sync::Arc;
//! use tabula_core::dialect::SqliteDialect;
//! use tabula_core::operation::{Arg, OperationBuilder};
//!
//! let mut builder = OperationBuilder::new(Arc::new(SqliteDialect::new()));
//! builder.text("DELETE FROM ").quoted("users").text(" WHERE ").quoted("id");
//! builder.text(" IN (").array_arg().text(")");
//! let op = builder.build();
//!
//! let statement = op.statement(&[Arg::array([1, 2, 3])]).unwrap();
//! assert_eq!(statement.sql, r#"DELETE FROM "users" WHERE "id" IN (?,?,?)"#);
//! assert_eq!(statement.params.len(), 3);
//! ```

use std::fmt;
use std::sync::Arc;

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::token::Token;
use crate::value::{SqlValue, ToSqlValue};

/// A call-time argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Fills a scalar slot.
    Value(SqlValue),
    /// Fills an array slot; each element gets its own marker.
    Array(Vec<SqlValue>),
}

impl Arg {
    /// Scalar argument.
    #[must_use]
    pub fn value(v: impl ToSqlValue) -> Self {
        Self::Value(v.to_sql_value())
    }

    /// Array argument.
    #[must_use]
    pub fn array<T: ToSqlValue>(values: impl IntoIterator<Item = T>) -> Self {
        Self::Array(values.into_iter().map(ToSqlValue::to_sql_value).collect())
    }
}

/// A rendered statement, ready for a driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// SQL text with dialect markers.
    pub sql: String,
    /// Parameters in marker order.
    pub params: Vec<SqlValue>,
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Fragment {
    Text(String),
    Value(SqlValue),
    Arg,
    ArrayArg,
}

/// Incremental builder for a [`PreparedOperation`].
#[derive(Debug, Clone)]
pub struct OperationBuilder {
    dialect: Arc<dyn Dialect>,
    fragments: Vec<Fragment>,
}

impl OperationBuilder {
    /// Creates an empty builder bound to a dialect.
    #[must_use]
    pub fn new(dialect: Arc<dyn Dialect>) -> Self {
        Self {
            dialect,
            fragments: Vec::new(),
        }
    }

    /// The bound dialect.
    #[must_use]
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Appends literal SQL text.
    pub fn text(&mut self, text: &str) -> &mut Self {
        if let Some(Fragment::Text(last)) = self.fragments.last_mut() {
            last.push_str(text);
        } else if !text.is_empty() {
            self.fragments.push(Fragment::Text(text.to_string()));
        }
        self
    }

    /// Appends a dialect-quoted identifier.
    pub fn quoted(&mut self, identifier: &str) -> &mut Self {
        let quoted = self.dialect.quote_identifier(identifier);
        self.text(&quoted)
    }

    /// Appends a captured parameter.
    ///
    /// NULL is written inline and takes no parameter slot.
    pub fn param(&mut self, value: impl ToSqlValue) -> &mut Self {
        let value = value.to_sql_value();
        if value.is_null() {
            return self.text("NULL");
        }
        self.fragments.push(Fragment::Value(value));
        self
    }

    /// Appends a scalar slot filled at execution time.
    pub fn arg(&mut self) -> &mut Self {
        self.fragments.push(Fragment::Arg);
        self
    }

    /// Appends an array slot whose marker count follows the argument length.
    pub fn array_arg(&mut self) -> &mut Self {
        self.fragments.push(Fragment::ArrayArg);
        self
    }

    /// Appends a rendered token.
    pub fn token(&mut self, token: &Token) -> &mut Self {
        token.render(self);
        self
    }

    /// Returns `true` when nothing has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Freezes the builder.
    #[must_use]
    pub fn build(self) -> PreparedOperation {
        PreparedOperation::new(self.dialect, self.fragments)
    }
}

/// A dialect-bound, reusable, parameterized command.
///
/// Captured parameters never change between executions. Without array
/// slots the SQL text is rendered once and reused; with array slots it is
/// rebuilt per call since the marker count varies.
#[derive(Debug, Clone)]
pub struct PreparedOperation {
    dialect: Arc<dyn Dialect>,
    fragments: Vec<Fragment>,
    cached_sql: Option<String>,
    slots: usize,
}

impl PreparedOperation {
    fn new(dialect: Arc<dyn Dialect>, fragments: Vec<Fragment>) -> Self {
        let slots = fragments
            .iter()
            .filter(|f| matches!(f, Fragment::Arg | Fragment::ArrayArg))
            .count();
        let has_arrays = fragments.iter().any(|f| matches!(f, Fragment::ArrayArg));
        let mut op = Self {
            dialect,
            fragments,
            cached_sql: None,
            slots,
        };
        if !has_arrays {
            let scalar_args = vec![Arg::Value(SqlValue::Null); slots];
            op.cached_sql = Some(op.render(&scalar_args, false).sql);
        }
        op
    }

    /// The bound dialect.
    #[must_use]
    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.dialect
    }

    /// SQL text, when it does not depend on call-time arguments.
    #[must_use]
    pub fn sql(&self) -> Option<&str> {
        self.cached_sql.as_deref()
    }

    /// Number of call-time slots (scalar and array).
    #[must_use]
    pub const fn slot_count(&self) -> usize {
        self.slots
    }

    /// Whether any slot is array-sized.
    #[must_use]
    pub const fn has_array_slots(&self) -> bool {
        self.cached_sql.is_none()
    }

    /// Renders the statement for one set of call-time arguments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ArgumentMismatch`] when the number of arguments
    /// differs from [`slot_count`](Self::slot_count) or an argument's shape
    /// does not match its slot.
    pub fn statement(&self, args: &[Arg]) -> Result<Statement> {
        if args.len() != self.slots {
            return Err(Error::ArgumentMismatch(format!(
                "expected {} argument(s), got {}",
                self.slots,
                args.len()
            )));
        }
        for (position, (fragment, arg)) in self
            .fragments
            .iter()
            .filter(|f| matches!(f, Fragment::Arg | Fragment::ArrayArg))
            .zip(args)
            .enumerate()
        {
            match (fragment, arg) {
                (Fragment::Arg, Arg::Value(_)) | (Fragment::ArrayArg, Arg::Array(_)) => {}
                (Fragment::Arg, Arg::Array(_)) => {
                    return Err(Error::ArgumentMismatch(format!(
                        "argument {position} is an array but the slot is scalar"
                    )));
                }
                _ => {
                    return Err(Error::ArgumentMismatch(format!(
                        "argument {position} is scalar but the slot is an array"
                    )));
                }
            }
        }

        match &self.cached_sql {
            Some(sql) => Ok(Statement {
                sql: sql.clone(),
                params: self.render(args, true).params,
            }),
            None => Ok(self.render(args, true)),
        }
    }

    fn render(&self, args: &[Arg], with_params: bool) -> Statement {
        let mut sql = String::new();
        let mut params = Vec::new();
        let mut marker = 0;
        let mut args = args.iter();

        let mut bind = |sql: &mut String, params: &mut Vec<SqlValue>, value: &SqlValue| {
            marker += 1;
            sql.push_str(&self.dialect.parameter_marker(marker));
            if with_params {
                params.push(self.dialect.convert_value(value.clone()));
            }
        };

        for fragment in &self.fragments {
            match fragment {
                Fragment::Text(text) => sql.push_str(text),
                Fragment::Value(value) => bind(&mut sql, &mut params, value),
                Fragment::Arg => {
                    if let Some(Arg::Value(value)) = args.next() {
                        bind(&mut sql, &mut params, value);
                    }
                }
                Fragment::ArrayArg => {
                    if let Some(Arg::Array(values)) = args.next() {
                        if values.is_empty() {
                            // Matches nothing and stays valid in every dialect.
                            sql.push_str("NULL");
                        }
                        for (i, value) in values.iter().enumerate() {
                            if i > 0 {
                                sql.push(',');
                            }
                            bind(&mut sql, &mut params, value);
                        }
                    }
                }
            }
        }

        Statement { sql, params }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MsSqlDialect, PostgresDialect, SqliteDialect};

    fn sqlite() -> OperationBuilder {
        OperationBuilder::new(Arc::new(SqliteDialect::new()))
    }

    #[test]
    fn test_static_params_are_reused() {
        let mut builder = sqlite();
        builder.text("SELECT * FROM t WHERE a = ").param(5).text(" AND b = ").arg();
        let op = builder.build();
        assert_eq!(op.sql(), Some("SELECT * FROM t WHERE a = ? AND b = ?"));

        let first = op.statement(&[Arg::value("x")]).unwrap();
        let second = op.statement(&[Arg::value("y")]).unwrap();
        assert_eq!(first.params, vec![SqlValue::Int(5), SqlValue::Text("x".into())]);
        assert_eq!(second.params, vec![SqlValue::Int(5), SqlValue::Text("y".into())]);
        assert_eq!(first.sql, second.sql);
    }

    #[test]
    fn test_array_slot_expands_per_call() {
        let mut builder = sqlite();
        builder.text("DELETE FROM t WHERE id IN (").array_arg().text(")");
        let op = builder.build();
        assert!(op.has_array_slots());
        assert_eq!(op.sql(), None);

        let three = op.statement(&[Arg::array([1, 2, 3])]).unwrap();
        assert_eq!(three.sql, "DELETE FROM t WHERE id IN (?,?,?)");
        assert_eq!(
            three.params,
            vec![SqlValue::Int(1), SqlValue::Int(2), SqlValue::Int(3)]
        );

        let one = op.statement(&[Arg::array([9])]).unwrap();
        assert_eq!(one.sql, "DELETE FROM t WHERE id IN (?)");
    }

    #[test]
    fn test_empty_array_renders_null() {
        let mut builder = sqlite();
        builder.text("id IN (").array_arg().text(")");
        let statement = builder.build().statement(&[Arg::Array(Vec::new())]).unwrap();
        assert_eq!(statement.sql, "id IN (NULL)");
        assert!(statement.params.is_empty());
    }

    #[test]
    fn test_null_param_is_inline() {
        let mut builder = sqlite();
        builder.text("a = ").param(None::<i32>);
        let statement = builder.build().statement(&[]).unwrap();
        assert_eq!(statement.sql, "a = NULL");
        assert!(statement.params.is_empty());
    }

    #[test]
    fn test_numbered_markers() {
        let mut builder = OperationBuilder::new(Arc::new(PostgresDialect::new()));
        builder.text("a = ").param(1).text(" AND b IN (").array_arg().text(")");
        let statement = builder.build().statement(&[Arg::array(["x", "y"])]).unwrap();
        assert_eq!(statement.sql, "a = $1 AND b IN ($2,$3)");

        let mut builder = OperationBuilder::new(Arc::new(MsSqlDialect::new()));
        builder.text("a = ").param(1).text(" AND b = ").arg();
        let statement = builder.build().statement(&[Arg::value(2)]).unwrap();
        assert_eq!(statement.sql, "a = @p1 AND b = @p2");
    }

    #[test]
    fn test_argument_count_mismatch() {
        let mut builder = sqlite();
        builder.text("a = ").arg();
        let op = builder.build();
        assert!(matches!(op.statement(&[]), Err(Error::ArgumentMismatch(_))));
    }

    #[test]
    fn test_argument_shape_mismatch() {
        let mut builder = sqlite();
        builder.text("a IN (").array_arg().text(")");
        let op = builder.build();
        assert!(matches!(
            op.statement(&[Arg::value(1)]),
            Err(Error::ArgumentMismatch(_))
        ));
    }

    #[test]
    fn test_sqlite_converts_booleans() {
        let mut builder = sqlite();
        builder.text("flag = ").param(true);
        let statement = builder.build().statement(&[]).unwrap();
        assert_eq!(statement.params, vec![SqlValue::Int(1)]);
    }

    #[test]
    fn test_quoted_identifiers_escape_quotes() {
        let mut builder = sqlite();
        builder.quoted(r#"we"ird"#);
        assert_eq!(builder.build().sql(), Some(r#""we""ird""#));
    }
}
