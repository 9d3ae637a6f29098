//! Token rendering.

use super::{Operator, OrderTerm, Token, UnaryOperator, When};
use crate::operation::OperationBuilder;

impl Token {
    /// Appends this token's SQL to `out`.
    pub fn render(&self, out: &mut OperationBuilder) {
        match self {
            Self::Column { alias, name } => {
                if let Some(alias) = alias {
                    out.quoted(alias).text(".");
                }
                out.quoted(name);
            }
            Self::Constant(value) => {
                if value.is_null() {
                    out.text("NULL");
                } else {
                    out.param(value.clone());
                }
            }
            Self::Argument { array: false } => {
                out.arg();
            }
            Self::Argument { array: true } => {
                out.array_arg();
            }
            Self::Operation { left, op, right } => render_operation(out, left, *op, right),
            Self::Unary { op, operand } => {
                out.text(op.as_sql());
                if operand.priority().is_some() {
                    render_wrapped(out, operand);
                } else {
                    operand.render(out);
                }
            }
            Self::Function {
                function,
                args,
                distinct,
            } => {
                out.text(function.as_sql()).text("(");
                if *distinct {
                    out.text("DISTINCT ");
                }
                if args.is_empty() {
                    out.text("*");
                } else {
                    render_list(out, args);
                }
                out.text(")");
            }
            Self::Case {
                operand,
                whens,
                otherwise,
            } => {
                out.text("CASE");
                if let Some(operand) = operand {
                    out.text(" ");
                    operand.render(out);
                }
                for When { condition, result } in whens {
                    out.text(" WHEN ");
                    condition.render(out);
                    out.text(" THEN ");
                    result.render(out);
                }
                if let Some(otherwise) = otherwise {
                    out.text(" ELSE ");
                    otherwise.render(out);
                }
                out.text(" END");
            }
            Self::If {
                condition,
                then,
                otherwise,
            } => {
                out.text("CASE WHEN ");
                condition.render(out);
                out.text(" THEN ");
                then.render(out);
                out.text(" ELSE ");
                otherwise.render(out);
                out.text(" END");
            }
            Self::Cast { operand, target } => {
                let native = out.dialect().native_type(target, None);
                out.text("CAST(");
                operand.render(out);
                out.text(" AS ").text(&native).text(")");
            }
            Self::Tuple(items) => {
                out.text("(");
                render_list(out, items);
                out.text(")");
            }
            Self::Alias { operand, alias } => {
                operand.render(out);
                out.text(" AS ").quoted(alias);
            }
            Self::AllColumns { alias } => {
                if let Some(alias) = alias {
                    out.quoted(alias).text(".");
                }
                out.text("*");
            }
            Self::RowNumberOver {
                partition_by,
                order_by,
            } => {
                out.text("ROW_NUMBER() OVER (");
                if !partition_by.is_empty() {
                    out.text("PARTITION BY ");
                    render_list(out, partition_by);
                }
                if !order_by.is_empty() {
                    if !partition_by.is_empty() {
                        out.text(" ");
                    }
                    out.text("ORDER BY ");
                    render_order(out, order_by);
                }
                out.text(")");
            }
            Self::LimitOffset {
                limit,
                offset,
                ordered,
            } => {
                let clause = out.dialect().limit_offset(*limit, *offset, *ordered);
                out.text(&clause);
            }
        }
    }
}

fn render_operation(out: &mut OperationBuilder, left: &Token, op: Operator, right: &Token) {
    render_operand(out, left, op, false);
    out.text(" ").text(op.as_sql()).text(" ");
    if op == Operator::In {
        match right {
            Token::Tuple(_) => right.render(out),
            _ => render_wrapped(out, right),
        }
    } else {
        render_operand(out, right, op, true);
    }
}

fn render_operand(out: &mut OperationBuilder, operand: &Token, parent: Operator, is_right: bool) {
    if needs_parens(operand, parent, is_right) {
        render_wrapped(out, operand);
    } else {
        operand.render(out);
    }
}

/// An operand is wrapped when rendering it bare would regroup the
/// expression: it binds looser than its parent, or it sits on the right of
/// an operator of the same priority.
fn needs_parens(operand: &Token, parent: Operator, is_right: bool) -> bool {
    let parent_priority = parent.priority();
    match operand {
        Token::Operation { op, .. } => {
            let priority = op.priority();
            priority > parent_priority || (is_right && priority == parent_priority)
        }
        // SQL parses NOT looser than every comparison and arithmetic operator.
        Token::Unary {
            op: UnaryOperator::Not,
            ..
        } => parent_priority < Operator::And.priority(),
        Token::Unary { op, .. } => op.priority() > parent_priority,
        _ => false,
    }
}

fn render_wrapped(out: &mut OperationBuilder, token: &Token) {
    out.text("(");
    token.render(out);
    out.text(")");
}

fn render_list(out: &mut OperationBuilder, tokens: &[Token]) {
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            out.text(", ");
        }
        token.render(out);
    }
}

pub(crate) fn render_order(out: &mut OperationBuilder, terms: &[OrderTerm]) {
    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            out.text(", ");
        }
        term.token.render(out);
        if term.descending {
            out.text(" DESC");
        }
    }
}
