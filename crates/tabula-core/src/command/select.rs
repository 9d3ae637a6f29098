//! SELECT statement builder.

use std::sync::Arc;

use crate::compiler::{CompileOptions, ExpressionCompiler};
use crate::dialect::Dialect;
use crate::entity::EntityDescriptor;
use crate::error::Result;
use crate::expr::Expr;
use crate::operation::{OperationBuilder, PreparedOperation};
use crate::token::{render_order, OrderTerm, Token};

/// A SELECT over one entity.
///
/// Without explicit columns every mapped column is listed by name, in
/// declaration order.
///
/// ```rust
/// use std::sync::Arc;
/// use tabula_core::command::SelectQuery;
/// use tabula_core::dialect::SqliteDialect;
/// use tabula_core::entity::{EntityDescriptor, EntityMapping, FieldMapping};
/// use tabula_core::expr::prop;
///
/// let users = EntityDescriptor::build(
///     &EntityMapping::table("users")
///         .field(FieldMapping::new("id", "i64").primary_key())
///         .field(FieldMapping::new("name", "String")),
/// )
/// .unwrap();
///
/// let op = SelectQuery::new(Arc::new(users))
///     .filter(prop("name").like("a%"))
///     .order_by(prop("id"))
///     .limit(10)
///     .build(Arc::new(SqliteDialect::new()))
///     .unwrap();
/// assert_eq!(
///     op.sql(),
///     Some(r#"SELECT "id", "name" FROM "users" WHERE "name" LIKE ? ORDER BY "id" LIMIT 10"#)
/// );
/// ```
#[derive(Debug, Clone)]
pub struct SelectQuery {
    descriptor: Arc<EntityDescriptor>,
    options: CompileOptions,
    columns: Vec<Expr>,
    filter: Option<Expr>,
    group_by: Vec<Expr>,
    order_by: Vec<(Expr, bool)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SelectQuery {
    /// Starts a query over `descriptor`.
    #[must_use]
    pub fn new(descriptor: Arc<EntityDescriptor>) -> Self {
        Self {
            descriptor,
            options: CompileOptions::new(),
            columns: Vec::new(),
            filter: None,
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Aliases the table and qualifies every column with the alias.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.options = self.options.alias(alias);
        self
    }

    /// Resolves properties ignoring ASCII case.
    #[must_use]
    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.options = self.options.case_insensitive(enabled);
        self
    }

    /// Adds a projected expression.
    #[must_use]
    pub fn column(mut self, expr: Expr) -> Self {
        self.columns.push(expr);
        self
    }

    /// Adds a filter, combined with earlier filters by `AND`.
    #[must_use]
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    /// Adds a `GROUP BY` term.
    #[must_use]
    pub fn group_by(mut self, expr: Expr) -> Self {
        self.group_by.push(expr);
        self
    }

    /// Adds an ascending `ORDER BY` term.
    #[must_use]
    pub fn order_by(mut self, expr: Expr) -> Self {
        self.order_by.push((expr, false));
        self
    }

    /// Adds a descending `ORDER BY` term.
    #[must_use]
    pub fn order_by_desc(mut self, expr: Expr) -> Self {
        self.order_by.push((expr, true));
        self
    }

    /// Caps the number of rows.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skips rows.
    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Compiles every clause and renders the statement.
    ///
    /// # Errors
    ///
    /// Returns the first compilation error of any clause.
    pub fn build(&self, dialect: Arc<dyn Dialect>) -> Result<PreparedOperation> {
        let compiler = ExpressionCompiler::new(&self.descriptor, self.options.clone());
        let alias = self.options.alias.as_deref();

        let unmapped = self.descriptor.columns.is_empty();
        let projection: Vec<Token> = if self.columns.is_empty() && unmapped {
            vec![Token::AllColumns {
                alias: alias.map(str::to_string),
            }]
        } else if self.columns.is_empty() {
            self.descriptor
                .columns
                .iter()
                .map(|c| Token::Column {
                    alias: alias.map(str::to_string),
                    name: c.name.clone(),
                })
                .collect()
        } else {
            self.columns
                .iter()
                .map(|e| compiler.compile(e))
                .collect::<Result<_>>()?
        };
        let filter = self.filter.as_ref().map(|f| compiler.compile(f)).transpose()?;
        let group_by = self
            .group_by
            .iter()
            .map(|e| compiler.compile(e))
            .collect::<Result<Vec<_>>>()?;
        let order_by = self
            .order_by
            .iter()
            .map(|(e, descending)| {
                Ok(OrderTerm {
                    token: compiler.compile(e)?,
                    descending: *descending,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut out = OperationBuilder::new(dialect);
        out.text("SELECT ");
        for (i, token) in projection.iter().enumerate() {
            if i > 0 {
                out.text(", ");
            }
            out.token(token);
        }
        out.text(" FROM ").quoted(&self.descriptor.name);
        if let Some(alias) = alias {
            out.text(" AS ").quoted(alias);
        }
        if let Some(filter) = &filter {
            out.text(" WHERE ").token(filter);
        }
        if !group_by.is_empty() {
            out.text(" GROUP BY ");
            for (i, token) in group_by.iter().enumerate() {
                if i > 0 {
                    out.text(", ");
                }
                out.token(token);
            }
        }
        if !order_by.is_empty() {
            out.text(" ORDER BY ");
            render_order(&mut out, &order_by);
        }
        if self.limit.is_some() || self.offset.is_some() {
            out.text(" ").token(&Token::LimitOffset {
                limit: self.limit,
                offset: self.offset,
                ordered: !order_by.is_empty(),
            });
        }
        Ok(out.build())
    }
}
