#![forbid(unsafe_code)]

//! Predicate compiler: storage tree to a parameterized SQL boolean
//! expression over `customers c`.
//!
//! Identifiers only ever come from the field schema catalog; values are
//! always bound. Customer columns compile to plain comparisons. Columns of
//! transactions, product lines and stores compile to a correlated `EXISTS`
//! over the customer's transactions. Event conditions compile to `EXISTS`
//! with a `HAVING COUNT(*)` threshold, `NOT EXISTS`, or a first/last
//! transaction date test, scoped to the recency window when one is set.

pub mod expr;

use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing::warn;

use crate::canonical::{StorageTree, StoredAttribute, StoredCondition, StoredEvent};
use crate::criteria::Value;
use crate::error::{CompileError, Result};
use crate::vocab::schema::{self, CUSTOMERS, PRODUCT_LINES, STORES, TRANSACTIONS};
use crate::vocab::{EventConditionType, FieldType, FrequencyQualifier, TimeUnit};

pub use expr::{
    escape_like, Aggregate, CmpOp, ColumnRef, Dialect, Join, RecencyWindow, Renderer, SqlExpr,
    Subquery,
};

/// Compiled predicate: SQL text with placeholders plus bound parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledPredicate {
    pub sql: String,
    pub params: Vec<Value>,
    pub dialect: Dialect,
    expr: SqlExpr,
}

impl CompiledPredicate {
    pub fn from_expr(expr: SqlExpr, dialect: Dialect) -> Self {
        let (sql, params) = Renderer::bound(dialect).render(&expr);
        Self {
            sql,
            params,
            dialect,
            expr,
        }
    }

    pub fn expr(&self) -> &SqlExpr {
        &self.expr
    }

    /// Display rendering with values written as literals. Never execute it.
    pub fn inline(&self) -> String {
        Renderer::inline(self.dialect).render(&self.expr).0
    }

    /// Full statement selecting the matching customers.
    pub fn select_customers(&self) -> String {
        format!("SELECT c.* FROM customers c WHERE {}", self.sql)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Int(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

/// Compiles `tree` for `dialect`.
pub fn compile(tree: &StorageTree, dialect: Dialect) -> Result<CompiledPredicate> {
    Ok(CompiledPredicate::from_expr(build(tree)?, dialect))
}

/// Builds the expression tree. Root conditions and groups are joined with
/// the root operator; each group is its own parenthesized junction.
pub fn build(tree: &StorageTree) -> Result<SqlExpr> {
    let mut items = Vec::with_capacity(tree.conditions.len() + tree.condition_groups.len());
    for condition in &tree.conditions {
        items.push(condition_expr(condition)?);
    }
    for group in &tree.condition_groups {
        if group.conditions.is_empty() {
            continue;
        }
        let members = group
            .conditions
            .iter()
            .map(condition_expr)
            .collect::<Result<Vec<_>>>()?;
        items.push(SqlExpr::Junction {
            op: group.operator,
            items: members,
        });
    }
    Ok(match items.len() {
        0 => SqlExpr::True,
        _ => SqlExpr::Junction {
            op: tree.root_operator,
            items,
        },
    })
}

fn condition_expr(condition: &StoredCondition) -> Result<SqlExpr> {
    match condition {
        StoredCondition::Attribute(attr) => attribute_expr(attr),
        StoredCondition::Event(event) => event_expr(event),
    }
}

/// Catalog entry for a stored attribute; a blank dataset is located by
/// column name.
fn resolve_column(attr: &StoredAttribute) -> Result<&'static schema::FieldSchema> {
    let found = if attr.dataset_key.trim().is_empty() {
        schema::locate(&attr.column_key)
    } else {
        schema::lookup(&attr.dataset_key, &attr.column_key)
    };
    found.ok_or_else(|| CompileError::UnknownColumn {
        dataset: attr.dataset_key.clone(),
        column: attr.column_key.clone(),
    })
}

fn alias_for(dataset: &str) -> &'static str {
    match dataset {
        TRANSACTIONS => "t",
        PRODUCT_LINES => "p",
        STORES => "s",
        _ => "c",
    }
}

fn join_for(dataset: &str) -> Option<Join> {
    match dataset {
        PRODUCT_LINES => Some(Join::ProductLines),
        STORES => Some(Join::Stores),
        _ => None,
    }
}

fn attribute_expr(attr: &StoredAttribute) -> Result<SqlExpr> {
    let field = resolve_column(attr)?;
    let predicate = column_predicate(field, attr)?;
    if field.dataset == CUSTOMERS {
        return Ok(predicate);
    }
    Ok(SqlExpr::Exists {
        negated: false,
        subquery: Subquery {
            joins: join_for(field.dataset).into_iter().collect(),
            filters: vec![predicate],
            window: None,
            min_count: None,
        },
    })
}

/// Bare comparison against the column's alias, without any subquery.
fn column_predicate(field: &schema::FieldSchema, attr: &StoredAttribute) -> Result<SqlExpr> {
    let column = ColumnRef {
        alias: alias_for(field.dataset),
        column: field.column,
    };
    let ty = field.field_type;
    let compare = |op: CmpOp| -> Result<SqlExpr> {
        Ok(SqlExpr::Compare {
            column,
            op,
            value: typed_value(field, ty, &attr.value)?,
        })
    };
    let like = |prefix: &str, suffix: &str, negated: bool| SqlExpr::Like {
        column,
        pattern: format!("{prefix}{}{suffix}", escape_like(&attr.value)),
        negated,
    };
    let unsupported = || CompileError::UnsupportedOperator {
        operator: attr.operator.clone(),
        field_type: ty.as_str().to_string(),
    };

    match (ty, attr.operator.as_str()) {
        (_, "is_null") => Ok(SqlExpr::IsNull {
            column,
            negated: false,
        }),
        (_, "is_not_null") => Ok(SqlExpr::IsNull {
            column,
            negated: true,
        }),
        (FieldType::Boolean, "is_true" | "is_false") => Ok(SqlExpr::Compare {
            column,
            op: CmpOp::Eq,
            value: Value::Bool(attr.operator == "is_true"),
        }),
        (FieldType::Boolean, _) => Err(unsupported()),
        (_, "equals") => compare(CmpOp::Eq),
        (_, "not_equals") => compare(CmpOp::NotEq),
        (FieldType::Number, "greater_than") | (FieldType::Datetime, "after") => compare(CmpOp::Gt),
        (FieldType::Number, "greater_than_or_equal") => compare(CmpOp::GtEq),
        (FieldType::Number, "less_than") | (FieldType::Datetime, "before") => compare(CmpOp::Lt),
        (FieldType::Number, "less_than_or_equal") => compare(CmpOp::LtEq),
        (FieldType::Number | FieldType::Datetime, "between") => Ok(SqlExpr::Between {
            column,
            low: typed_value(field, ty, &attr.value)?,
            high: typed_value(field, ty, &attr.value2)?,
        }),
        (FieldType::Text, "contains") => Ok(like("%", "%", false)),
        (FieldType::Text, "not_contains") => Ok(like("%", "%", true)),
        (FieldType::Text, "starts_with") => Ok(like("", "%", false)),
        (FieldType::Text, "ends_with") => Ok(like("%", "", false)),
        _ => Err(unsupported()),
    }
}

/// Converts a stored (stringified) value into a typed parameter.
fn typed_value(field: &schema::FieldSchema, ty: FieldType, raw: &str) -> Result<Value> {
    let invalid = || CompileError::InvalidValue {
        column: format!("{}.{}", field.dataset, field.column),
        value: raw.to_string(),
    };
    match ty {
        FieldType::Number => Value::number_from_str(raw).ok_or_else(invalid),
        FieldType::Datetime => {
            let trimmed = raw.trim();
            let valid = Date::parse(trimmed, format_description!("[year]-[month]-[day]")).is_ok()
                || OffsetDateTime::parse(trimmed, &Rfc3339).is_ok();
            if valid {
                Ok(Value::String(trimmed.to_string()))
            } else {
                Err(invalid())
            }
        }
        FieldType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(invalid()),
        },
        FieldType::Text | FieldType::Array => Ok(Value::String(raw.to_string())),
    }
}

fn event_window(event: &StoredEvent) -> Option<RecencyWindow> {
    let unit = TimeUnit::parse(event.time_period.as_deref()?)?;
    let value = event.time_value?;
    (value > 0).then_some(RecencyWindow { unit, value })
}

fn event_expr(event: &StoredEvent) -> Result<SqlExpr> {
    let mut joins = Vec::new();
    let mut filters = Vec::with_capacity(event.attribute_conditions.len());
    for nested in &event.attribute_conditions {
        let field = resolve_column(nested)?;
        joins.extend(join_for(field.dataset));
        filters.push(column_predicate(field, nested)?);
    }
    let window = event_window(event);
    let event_type = EventConditionType::parse_or_default(&event.event_type).0;

    Ok(match event_type {
        EventConditionType::Performed => {
            let qualifier = FrequencyQualifier::parse_or_default(&event.frequency).0;
            if qualifier != FrequencyQualifier::AtLeast {
                warn!(
                    event = %event.column_key,
                    qualifier = qualifier.code(),
                    count = event.count,
                    "sql.frequency_qualifier_unenforced"
                );
            }
            SqlExpr::Exists {
                negated: false,
                subquery: Subquery {
                    joins,
                    filters,
                    window,
                    min_count: Some(event.count.max(1)),
                },
            }
        }
        EventConditionType::NotPerformed => SqlExpr::Exists {
            negated: true,
            subquery: Subquery {
                joins,
                filters,
                window,
                min_count: None,
            },
        },
        EventConditionType::FirstTime | EventConditionType::LastTime => {
            let aggregate = if event_type == EventConditionType::FirstTime {
                Aggregate::Min
            } else {
                Aggregate::Max
            };
            let subquery = Subquery {
                joins,
                filters,
                window: None,
                min_count: None,
            };
            match window {
                Some(window) => SqlExpr::EventDate {
                    aggregate,
                    subquery,
                    window,
                },
                None => SqlExpr::Exists {
                    negated: false,
                    subquery,
                },
            }
        }
    })
}
