//! SQL emission for expression trees.
//!
//! Two modes share one walker: inline literals (display, logs, tests) and
//! `$n` placeholders with the values collected in a [`ParamContext`].

use crate::ast::values::quote_literal;
use crate::ast::*;

/// Trait for converting AST nodes to SQL.
pub trait ToSql {
    /// Convert this node to a SQL string with literals inlined.
    fn to_sql(&self) -> String;

    /// Convert this node to SQL with `$n` placeholders, collecting values into `ctx`.
    fn to_sql_params(&self, ctx: &mut ParamContext) -> String;
}

/// Context for parameterized query building.
///
/// Created per statement; nothing is shared between compilations.
#[derive(Debug, Default)]
pub struct ParamContext {
    /// Current parameter index (1-based for Postgres $1, $2, etc.)
    pub index: usize,
    /// Collected parameter values in order
    pub params: Vec<Value>,
}

impl ParamContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value and return the placeholder for it.
    pub fn add_param(&mut self, value: Value) -> String {
        self.index += 1;
        self.params.push(value);
        format!("${}", self.index)
    }
}

enum Emit<'a> {
    Inline,
    Params(&'a mut ParamContext),
}

impl Emit<'_> {
    fn value(&mut self, value: &Value) -> String {
        match value {
            // NULL and booleans are keywords, never placeholders
            Value::Null | Value::Bool(_) => value.to_sql_literal(),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(|v| self.value(v)).collect();
                format!("ARRAY[{}]", parts.join(", "))
            }
            _ => match self {
                Emit::Inline => value.to_sql_literal(),
                Emit::Params(ctx) => ctx.add_param(value.clone()),
            },
        }
    }
}

impl ToSql for Expr {
    fn to_sql(&self) -> String {
        render(self, &mut Emit::Inline)
    }

    fn to_sql_params(&self, ctx: &mut ParamContext) -> String {
        render(self, &mut Emit::Params(ctx))
    }
}

fn render(expr: &Expr, emit: &mut Emit<'_>) -> String {
    match expr {
        Expr::Star => "*".to_string(),
        Expr::Column(name) => quote_qualified(name),
        Expr::Literal(value) => emit.value(value),
        Expr::Raw(sql) => sql.clone(),
        Expr::Function { name, args } => {
            format!("{}({})", name, render_list(args, emit))
        }
        Expr::Special { name, args } => {
            let parts: Vec<String> = args
                .iter()
                .map(|(keyword, arg)| match keyword {
                    Some(kw) => format!("{} {}", kw, render(arg, emit)),
                    None => render(arg, emit),
                })
                .collect();
            format!("{}({})", name, parts.join(" "))
        }
        Expr::Binary { left, op, right } => format!(
            "{} {} {}",
            render_operand(left, emit),
            op,
            render_operand(right, emit)
        ),
        Expr::Cast { expr, target_type } => {
            format!("CAST({} AS {})", render(expr, emit), target_type)
        }
        Expr::Compare { left, op, right } => render_compare(left, *op, right, emit),
        Expr::Between {
            expr,
            low,
            high,
            symmetric,
        } => format!(
            "{} BETWEEN {}{} AND {}",
            render_operand(expr, emit),
            if *symmetric { "SYMMETRIC " } else { "" },
            render_operand(low, emit),
            render_operand(high, emit)
        ),
        Expr::Logical { op, operands } => match operands.as_slice() {
            [] => match op {
                LogicalOp::And => "TRUE".to_string(),
                LogicalOp::Or => "FALSE".to_string(),
            },
            [single] => render(single, emit),
            _ => {
                let joiner = format!(" {} ", op.sql_keyword());
                let parts: Vec<String> = operands
                    .iter()
                    .map(|operand| match operand {
                        Expr::Logical { operands: inner, .. } if inner.len() > 1 => {
                            format!("({})", render(operand, emit))
                        }
                        _ => render(operand, emit),
                    })
                    .collect();
                parts.join(&joiner)
            }
        },
        Expr::JsonAccess {
            base,
            path,
            as_text,
        } => render_json_access(render_operand(base, emit), path, *as_text),
        Expr::Array(items) => format!("ARRAY[{}]", render_list(items, emit)),
        Expr::Aggregate {
            name,
            args,
            distinct,
            within_group,
        } => {
            let mut sql = format!(
                "{}({}{})",
                name,
                if *distinct { "DISTINCT " } else { "" },
                render_list(args, emit)
            );
            if let Some(order) = within_group {
                sql.push_str(&format!(" WITHIN GROUP (ORDER BY {})", render(order, emit)));
            }
            sql
        }
        Expr::Window { function, clauses } => {
            let parts: Vec<String> = clauses.iter().map(|c| render_clause(c, emit)).collect();
            format!("{} OVER ({})", render(function, emit), parts.join(" "))
        }
        Expr::Aliased { expr, alias } => {
            format!("{} AS {}", render(expr, emit), quote_ident(alias))
        }
    }
}

fn render_list(items: &[Expr], emit: &mut Emit<'_>) -> String {
    items
        .iter()
        .map(|e| render(e, emit))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Operands of infix operators get parentheses when they are themselves infix.
fn render_operand(expr: &Expr, emit: &mut Emit<'_>) -> String {
    if expr.is_compound() {
        format!("({})", render(expr, emit))
    } else {
        render(expr, emit)
    }
}

fn render_compare(left: &Expr, op: Operator, right: &Expr, emit: &mut Emit<'_>) -> String {
    let lhs = render_operand(left, emit);

    if let Expr::Literal(value) = right {
        match (op, value) {
            (Operator::Eq | Operator::Is, Value::Null) => return format!("{} IS NULL", lhs),
            (Operator::Ne | Operator::IsNot, Value::Null) => {
                return format!("{} IS NOT NULL", lhs);
            }
            (Operator::In, Value::Array(items)) if items.is_empty() => return "FALSE".to_string(),
            (Operator::NotIn, Value::Array(items)) if items.is_empty() => {
                return "TRUE".to_string();
            }
            (Operator::In | Operator::NotIn, Value::Array(items)) => {
                let parts: Vec<String> = items.iter().map(|v| emit.value(v)).collect();
                return format!("{} {} ({})", lhs, op, parts.join(", "));
            }
            _ => {}
        }
    }

    if op.is_list() {
        if let Expr::Array(items) = right {
            return format!("{} {} ({})", lhs, op, render_list(items, emit));
        }
        return format!("{} {} ({})", lhs, op, render(right, emit));
    }

    format!("{} {} {}", lhs, op, render_operand(right, emit))
}

fn render_json_access(mut sql: String, path: &JsonPath, as_text: bool) -> String {
    if path.is_root() {
        if as_text {
            sql.push_str(" #>> '{}'");
        }
        return sql;
    }

    let last = path.segments.len() - 1;
    for (i, segment) in path.segments.iter().enumerate() {
        sql.push_str(if as_text && i == last { "->>" } else { "->" });
        match segment {
            PathSegment::Key(key) => sql.push_str(&quote_literal(key)),
            PathSegment::Index(index) => sql.push_str(&index.to_string()),
        }
    }
    sql
}

fn render_clause(clause: &WindowClause, emit: &mut Emit<'_>) -> String {
    match clause {
        WindowClause::PartitionBy(exprs) => format!("PARTITION BY {}", render_list(exprs, emit)),
        WindowClause::OrderBy(keys) => {
            let parts: Vec<String> = keys
                .iter()
                .map(|(expr, order)| format!("{} {}", render(expr, emit), order.sql_suffix()))
                .collect();
            format!("ORDER BY {}", parts.join(", "))
        }
        WindowClause::Frame { unit, spec } => {
            format!("{} BETWEEN {} AND {}", unit, spec.between, spec.and)
        }
        WindowClause::Exclude(option) => format!("EXCLUDE {}", option),
    }
}

const RESERVED: &[&str] = &[
    "all", "and", "any", "as", "asc", "between", "by", "case", "check", "column", "default",
    "desc", "distinct", "else", "end", "false", "from", "group", "groups", "in", "is", "limit",
    "not", "null", "offset", "on", "or", "order", "over", "partition", "primary", "range",
    "references", "rows", "select", "table", "then", "true", "user", "when", "where", "window",
];

/// Quote an identifier unless it is a plain lowercase, non-reserved name.
pub fn quote_ident(ident: &str) -> String {
    let mut chars = ident.chars();
    let plain = match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {
            chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        _ => false,
    };
    if plain && !RESERVED.contains(&ident) {
        ident.to_string()
    } else {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

/// Quote each part of a possibly qualified name (`table.column`, `t.*`).
pub fn quote_qualified(name: &str) -> String {
    name.split('.')
        .map(|part| if part == "*" { part.to_string() } else { quote_ident(part) })
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cmp(column: &str, op: Operator, value: impl Into<Value>) -> Expr {
        Expr::Compare {
            left: Box::new(col(column)),
            op,
            right: Box::new(lit(value)),
        }
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("salary"), "salary");
        assert_eq!(quote_ident("createdAt"), "\"createdAt\"");
        assert_eq!(quote_ident("order"), "\"order\"");
        assert_eq!(quote_qualified("e.first_name"), "e.first_name");
    }

    #[test]
    fn test_compare_inline() {
        assert_eq!(cmp("age", Operator::Gt, 30).to_sql(), "age > 30");
        assert_eq!(cmp("name", Operator::Eq, "Ann").to_sql(), "name = 'Ann'");
    }

    #[test]
    fn test_compare_null_becomes_is_null() {
        assert_eq!(cmp("deleted_at", Operator::Eq, Value::Null).to_sql(), "deleted_at IS NULL");
        assert_eq!(
            cmp("deleted_at", Operator::Ne, Value::Null).to_sql(),
            "deleted_at IS NOT NULL"
        );
    }

    #[test]
    fn test_in_list_expansion() {
        assert_eq!(cmp("id", Operator::In, vec![1, 2, 3]).to_sql(), "id IN (1, 2, 3)");
        assert_eq!(cmp("id", Operator::In, Vec::<i64>::new()).to_sql(), "FALSE");
        assert_eq!(cmp("id", Operator::NotIn, Vec::<i64>::new()).to_sql(), "TRUE");
    }

    #[test]
    fn test_params_collected_in_order() {
        let expr = Expr::Logical {
            op: LogicalOp::And,
            operands: vec![
                cmp("name", Operator::Eq, "Ann"),
                cmp("id", Operator::In, vec![4, 5]),
                cmp("active", Operator::Eq, true),
            ],
        };
        let mut ctx = ParamContext::new();
        let sql = expr.to_sql_params(&mut ctx);
        assert_eq!(sql, "name = $1 AND id IN ($2, $3) AND active = TRUE");
        assert_eq!(
            ctx.params,
            vec![Value::Text("Ann".into()), Value::Int(4), Value::Int(5)]
        );
    }

    #[test]
    fn test_nested_logical_parenthesized() {
        let inner = Expr::Logical {
            op: LogicalOp::Or,
            operands: vec![cmp("a", Operator::Eq, 1), cmp("b", Operator::Eq, 2)],
        };
        let expr = Expr::Logical {
            op: LogicalOp::And,
            operands: vec![cmp("c", Operator::Eq, 3), inner],
        };
        assert_eq!(expr.to_sql(), "c = 3 AND (a = 1 OR b = 2)");
    }

    #[test]
    fn test_json_access() {
        let path = JsonPath::root().key("skills").index(0);
        let json = Expr::JsonAccess {
            base: Box::new(col("profile")),
            path: path.clone(),
            as_text: false,
        };
        assert_eq!(json.to_sql(), "profile->'skills'->0");
        let text = Expr::JsonAccess {
            base: Box::new(col("profile")),
            path,
            as_text: true,
        };
        assert_eq!(text.to_sql(), "profile->'skills'->>0");
    }

    #[test]
    fn test_window_render() {
        let expr = Expr::Window {
            function: Box::new(Expr::Aggregate {
                name: "SUM".into(),
                args: vec![col("salary")],
                distinct: false,
                within_group: None,
            }),
            clauses: vec![
                WindowClause::OrderBy(vec![(col("salary"), SortOrder::Asc)]),
                WindowClause::Frame {
                    unit: FrameUnit::Rows,
                    spec: FrameSpec::new(Boundary::Preceding(1), Boundary::CurrentRow).unwrap(),
                },
            ],
        };
        assert_eq!(
            expr.to_sql(),
            "SUM(salary) OVER (ORDER BY salary ASC ROWS BETWEEN 1 PRECEDING AND CURRENT ROW)"
        );
    }
}
