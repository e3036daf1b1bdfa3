//! Structured SQL predicate tree and its text rendering.
//!
//! Values never enter SQL text directly. [`Renderer::bound`] emits numbered
//! placeholders and collects parameters; [`Renderer::inline`] renders quoted
//! literals for display only.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::criteria::{LogicOperator, Value};
use crate::vocab::TimeUnit;

/// Target SQL dialect; decides placeholder and date-arithmetic syntax.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    Sqlite,
}

impl Dialect {
    pub fn as_str(self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Some(Dialect::Postgres),
            "sqlite" | "sqlite3" => Some(Dialect::Sqlite),
            _ => None,
        }
    }
}

/// Qualified column: table alias plus catalogued column name.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ColumnRef {
    pub alias: &'static str,
    pub column: &'static str,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Gt,
    GtEq,
    Lt,
    LtEq,
}

impl CmpOp {
    fn as_str(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::NotEq => "!=",
            CmpOp::Gt => ">",
            CmpOp::GtEq => ">=",
            CmpOp::Lt => "<",
            CmpOp::LtEq => "<=",
        }
    }
}

/// Table joined onto `transactions t` inside a subquery.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Join {
    ProductLines,
    Stores,
}

impl Join {
    fn clause(self) -> &'static str {
        match self {
            Join::ProductLines => " JOIN product_lines p ON p.product_line_id = t.product_line_id",
            Join::Stores => " JOIN stores s ON s.store_id = t.store_id",
        }
    }
}

/// Start of a recency window counted back from now.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RecencyWindow {
    pub unit: TimeUnit,
    pub value: i64,
}

/// Correlated subquery over the customer's transactions.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Subquery {
    pub joins: Vec<Join>,
    pub filters: Vec<SqlExpr>,
    pub window: Option<RecencyWindow>,
    /// `HAVING COUNT(*) >= n` after grouping by customer.
    pub min_count: Option<i64>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Aggregate {
    Min,
    Max,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SqlExpr {
    True,
    Compare {
        column: ColumnRef,
        op: CmpOp,
        value: Value,
    },
    Between {
        column: ColumnRef,
        low: Value,
        high: Value,
    },
    /// `pattern` is already escaped and carries its `%` wildcards.
    Like {
        column: ColumnRef,
        pattern: String,
        negated: bool,
    },
    IsNull {
        column: ColumnRef,
        negated: bool,
    },
    Exists {
        negated: bool,
        subquery: Subquery,
    },
    /// `(SELECT MIN|MAX(t.transaction_date) ...) >= window start`.
    EventDate {
        aggregate: Aggregate,
        subquery: Subquery,
        window: RecencyWindow,
    },
    Junction {
        op: LogicOperator,
        items: Vec<SqlExpr>,
    },
}

/// Escapes LIKE metacharacters so `raw` matches literally.
pub fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Serializes an [`SqlExpr`] for one dialect.
pub struct Renderer {
    dialect: Dialect,
    inline: bool,
    params: Vec<Value>,
}

impl Renderer {
    /// Renderer that binds every value as a numbered parameter.
    pub fn bound(dialect: Dialect) -> Self {
        Self {
            dialect,
            inline: false,
            params: Vec::new(),
        }
    }

    /// Renderer that writes values as quoted literals.
    pub fn inline(dialect: Dialect) -> Self {
        Self {
            dialect,
            inline: true,
            params: Vec::new(),
        }
    }

    pub fn render(mut self, expr: &SqlExpr) -> (String, Vec<Value>) {
        let mut out = String::new();
        self.write_expr(&mut out, expr, false);
        (out, self.params)
    }

    fn value(&mut self, value: &Value) -> String {
        if self.inline {
            return literal(value);
        }
        self.params.push(value.clone());
        let n = self.params.len();
        match self.dialect {
            Dialect::Postgres => format!("${n}"),
            Dialect::Sqlite => format!("?{n}"),
        }
    }

    fn window_start(&mut self, window: RecencyWindow) -> String {
        match self.dialect {
            Dialect::Postgres => {
                let field = window.unit.code();
                let amount = self.value(&Value::Int(window.value));
                format!("NOW() - make_interval({field} => {amount})")
            }
            Dialect::Sqlite => {
                let modifier = match window.unit {
                    TimeUnit::Days => format!("-{} days", window.value),
                    TimeUnit::Weeks => format!("-{} days", window.value.saturating_mul(7)),
                    TimeUnit::Months => format!("-{} months", window.value),
                };
                let modifier = self.value(&Value::String(modifier));
                format!("date('now', {modifier})")
            }
        }
    }

    fn write_expr(&mut self, out: &mut String, expr: &SqlExpr, nested: bool) {
        match expr {
            SqlExpr::True => out.push_str("TRUE"),
            SqlExpr::Compare { column, op, value } => {
                let rhs = self.value(value);
                let _ = write!(out, "{}.{} {} {rhs}", column.alias, column.column, op.as_str());
            }
            SqlExpr::Between { column, low, high } => {
                let low = self.value(low);
                let high = self.value(high);
                let _ = write!(out, "{}.{} BETWEEN {low} AND {high}", column.alias, column.column);
            }
            SqlExpr::Like {
                column,
                pattern,
                negated,
            } => {
                let rhs = self.value(&Value::String(pattern.clone()));
                let not = if *negated { "NOT " } else { "" };
                let _ = write!(
                    out,
                    "{}.{} {not}LIKE {rhs} ESCAPE '\\'",
                    column.alias, column.column
                );
            }
            SqlExpr::IsNull { column, negated } => {
                let not = if *negated { "NOT " } else { "" };
                let _ = write!(out, "{}.{} IS {not}NULL", column.alias, column.column);
            }
            SqlExpr::Exists { negated, subquery } => {
                if *negated {
                    out.push_str("NOT ");
                }
                out.push_str("EXISTS (SELECT 1");
                self.write_subquery_body(out, subquery);
                out.push(')');
            }
            SqlExpr::EventDate {
                aggregate,
                subquery,
                window,
            } => {
                let func = match aggregate {
                    Aggregate::Min => "MIN",
                    Aggregate::Max => "MAX",
                };
                let _ = write!(out, "(SELECT {func}(t.transaction_date)");
                self.write_subquery_body(out, subquery);
                out.push_str(") >= ");
                let start = self.window_start(*window);
                out.push_str(&start);
            }
            SqlExpr::Junction { op, items } => match items.as_slice() {
                [] => out.push_str("TRUE"),
                [single] => self.write_expr(out, single, nested),
                _ => {
                    if nested {
                        out.push('(');
                    }
                    let sep = format!(" {} ", op.as_str());
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            out.push_str(&sep);
                        }
                        self.write_expr(out, item, true);
                    }
                    if nested {
                        out.push(')');
                    }
                }
            },
        }
    }

    fn write_subquery_body(&mut self, out: &mut String, subquery: &Subquery) {
        out.push_str(" FROM transactions t");
        let mut joins = subquery.joins.clone();
        joins.sort();
        joins.dedup();
        for join in joins {
            out.push_str(join.clause());
        }
        out.push_str(" WHERE t.customer_id = c.customer_id");
        for filter in &subquery.filters {
            out.push_str(" AND ");
            self.write_expr(out, filter, true);
        }
        if let Some(window) = subquery.window {
            let start = self.window_start(window);
            let _ = write!(out, " AND t.transaction_date >= {start}");
        }
        if let Some(min) = subquery.min_count {
            let rhs = self.value(&Value::Int(min));
            let _ = write!(out, " GROUP BY t.customer_id HAVING COUNT(*) >= {rhs}");
        }
    }
}

/// Display literal; strings single-quoted with quotes doubled.
fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(_) | Value::Float(_) => value.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
    }
}
