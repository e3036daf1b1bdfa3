#![forbid(unsafe_code)]

//! Input contract for criteria trees.
//!
//! Trees arrive either from the deterministic extractor or from an external
//! generator as loosely-shaped JSON. This module is the boundary: every
//! condition is classified exactly once into [`Condition::Attribute`] or
//! [`Condition::Event`], and anything matching neither is rejected (strict
//! parsing) or skipped with a warning (lenient parsing).

pub mod value;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CriteriaError;
pub use value::Value;

/// Boolean connective for a tree root or a condition group.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum LogicOperator {
    #[default]
    And,
    Or,
}

impl LogicOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            LogicOperator::And => "AND",
            LogicOperator::Or => "OR",
        }
    }

    /// Case-insensitive parse; anything other than `or` is AND.
    pub fn parse_lenient(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("or") {
            LogicOperator::Or
        } else {
            LogicOperator::And
        }
    }
}

impl fmt::Display for LogicOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LogicOperator {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LogicOperator {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        Ok(LogicOperator::parse_lenient(&raw))
    }
}

/// Comparison against one scalar column.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AttributeCondition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    pub value: Value,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub value2: Value,
}

impl AttributeCondition {
    pub fn new(
        dataset: impl Into<String>,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            dataset: Some(dataset.into()),
            field: Some(field.into()),
            operator: Some(operator.into()),
            value: value.into(),
            value2: Value::Null,
        }
    }

    pub fn with_value2(mut self, value2: impl Into<Value>) -> Self {
        self.value2 = value2.into();
        self
    }
}

/// Event-count qualifier as supplied; the qualifier string is validated later.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frequency {
    pub operator: String,
    pub value: i64,
}

/// Recency window as supplied; the unit string is validated later.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePeriod {
    pub unit: String,
    pub value: i64,
}

/// Behavioural condition over transaction history.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EventCondition {
    pub event_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_condition_type: Option<String>,
    /// Direct comparison (purchase amount) when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_period: Option<TimePeriod>,
    #[serde(
        rename = "attributeConditions",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub attribute_conditions: Vec<AttributeCondition>,
}

impl EventCondition {
    /// True when the event carries its own operator + value (amount form).
    pub fn has_direct_comparison(&self) -> bool {
        self.operator.is_some() && !self.value.is_blank()
    }
}

/// A single condition, discriminated at the input boundary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", try_from = "RawCondition")]
pub enum Condition {
    Attribute(AttributeCondition),
    Event(EventCondition),
}

/// Sibling bucket of conditions sharing one operator.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionGroup {
    #[serde(default)]
    pub operator: LogicOperator,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Criteria tree in input-contract form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CriteriaTree {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, alias = "conditionGroups")]
    pub condition_groups: Vec<ConditionGroup>,
    #[serde(default, alias = "rootOperator")]
    pub logic_operator: LogicOperator,
}

impl CriteriaTree {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self {
            conditions,
            ..Self::default()
        }
    }

    pub fn with_operator(mut self, op: LogicOperator) -> Self {
        self.logic_operator = op;
        self
    }

    pub fn with_group(mut self, group: ConditionGroup) -> Self {
        self.condition_groups.push(group);
        self
    }

    /// Conditions at the root plus those in every group.
    pub fn condition_count(&self) -> usize {
        self.conditions.len()
            + self
                .condition_groups
                .iter()
                .map(|g| g.conditions.len())
                .sum::<usize>()
    }

    /// Strict parse: any unclassifiable condition is an error.
    pub fn from_json_strict(raw: &str) -> Result<Self, CriteriaError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Lenient parse: malformed pieces degrade to defaults and are logged;
    /// a payload that is not an object yields the empty tree.
    pub fn from_json(raw: &serde_json::Value) -> Self {
        let Some(obj) = raw.as_object() else {
            warn!(kind = json_kind(raw), "criteria.malformed_input");
            return Self::default();
        };
        let logic_operator = obj
            .get("logic_operator")
            .or_else(|| obj.get("rootOperator"))
            .and_then(|v| v.as_str())
            .map(LogicOperator::parse_lenient)
            .unwrap_or_default();
        let conditions = lenient_conditions(obj.get("conditions"), "root");
        let groups = obj
            .get("condition_groups")
            .or_else(|| obj.get("conditionGroups"))
            .and_then(|v| v.as_array())
            .map(|groups| {
                groups
                    .iter()
                    .filter_map(|g| {
                        let Some(g) = g.as_object() else {
                            warn!("criteria.group_not_object");
                            return None;
                        };
                        Some(ConditionGroup {
                            operator: g
                                .get("operator")
                                .and_then(|v| v.as_str())
                                .map(LogicOperator::parse_lenient)
                                .unwrap_or_default(),
                            conditions: lenient_conditions(g.get("conditions"), "group"),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            conditions,
            condition_groups: groups,
            logic_operator,
        }
    }

    /// Lenient parse from text; invalid JSON yields the empty tree.
    pub fn from_json_str(raw: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(value) => Self::from_json(&value),
            Err(err) => {
                warn!(error = %err, "criteria.malformed_input");
                Self::default()
            }
        }
    }
}

fn lenient_conditions(raw: Option<&serde_json::Value>, scope: &'static str) -> Vec<Condition> {
    let Some(items) = raw.and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let parsed = serde_json::from_value::<RawCondition>(item.clone())
                .map_err(|err| err.to_string())
                .and_then(|raw| Condition::try_from(raw).map_err(|err| err.to_string()));
            match parsed {
                Ok(condition) => Some(condition),
                Err(reason) => {
                    warn!(scope, index, %reason, "criteria.condition_skipped");
                    None
                }
            }
        })
        .collect()
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Wire shape before classification; every field optional.
#[derive(Debug, Default, Deserialize)]
struct RawCondition {
    #[serde(rename = "type")]
    kind: Option<String>,
    dataset: Option<String>,
    field: Option<String>,
    operator: Option<serde_json::Value>,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    value2: serde_json::Value,
    event_name: Option<String>,
    event_condition_type: Option<String>,
    frequency: Option<serde_json::Value>,
    time_period: Option<serde_json::Value>,
    #[serde(alias = "attributeConditions")]
    attribute_conditions: Option<Vec<serde_json::Value>>,
}

impl TryFrom<RawCondition> for Condition {
    type Error = CriteriaError;

    fn try_from(raw: RawCondition) -> Result<Self, Self::Error> {
        let kind = raw.kind.as_deref().map(|k| k.trim().to_ascii_lowercase());
        match kind.as_deref() {
            Some("event") => Ok(Condition::Event(raw.into_event())),
            Some("attribute") => Ok(Condition::Attribute(raw.into_attribute())),
            None if raw.event_name.is_some() => Ok(Condition::Event(raw.into_event())),
            None if raw.field.is_some() => Ok(Condition::Attribute(raw.into_attribute())),
            Some(other) => Err(CriteriaError::UnrecognizedCondition(format!(
                "unknown condition type '{other}'"
            ))),
            None => Err(CriteriaError::UnrecognizedCondition(
                "condition has neither a field nor an event_name".into(),
            )),
        }
    }
}

impl RawCondition {
    fn into_attribute(self) -> AttributeCondition {
        AttributeCondition {
            dataset: self.dataset,
            field: self.field,
            operator: self.operator.as_ref().and_then(operator_text),
            value: Value::from_json(&self.value),
            value2: Value::from_json(&self.value2),
        }
    }

    fn into_event(self) -> EventCondition {
        let attribute_conditions = self
            .attribute_conditions
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<RawCondition>(item) {
                Ok(nested) => Some(nested.into_attribute()),
                Err(err) => {
                    warn!(error = %err, "criteria.nested_condition_skipped");
                    None
                }
            })
            .collect();
        EventCondition {
            event_name: self.event_name.unwrap_or_else(|| "purchase".to_string()),
            event_condition_type: self.event_condition_type,
            operator: self.operator.as_ref().and_then(operator_text),
            value: Value::from_json(&self.value),
            frequency: self.frequency.as_ref().map(parse_frequency),
            time_period: self.time_period.as_ref().and_then(parse_time_period),
            attribute_conditions,
        }
    }
}

fn operator_text(raw: &serde_json::Value) -> Option<String> {
    raw.as_str().map(str::to_string)
}

fn count_of(raw: Option<&serde_json::Value>) -> Option<i64> {
    raw.map(Value::from_json).and_then(|v| v.as_i64())
}

fn parse_frequency(raw: &serde_json::Value) -> Frequency {
    if let Some(count) = count_of(Some(raw)) {
        return Frequency {
            operator: "at_least".to_string(),
            value: count,
        };
    }
    let operator = raw
        .get("operator")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let value = count_of(raw.get("value")).unwrap_or_else(|| {
        warn!("criteria.frequency_value_defaulted");
        1
    });
    Frequency { operator, value }
}

fn parse_time_period(raw: &serde_json::Value) -> Option<TimePeriod> {
    if raw.is_null() {
        return None;
    }
    let unit = raw
        .get("unit")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let value = count_of(raw.get("value")).unwrap_or_else(|| {
        warn!("criteria.time_value_defaulted");
        1
    });
    Some(TimePeriod { unit, value })
}
