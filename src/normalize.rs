#![forbid(unsafe_code)]

//! Criteria validator and normalizer.
//!
//! Validates a candidate tree against the vocabulary registry, substituting
//! documented defaults for anything unrecognized, and re-applies value
//! standardization. The caller's tree is never mutated; a new tree is
//! returned. Normalizing an already normalized tree is a no-op.

use std::time::Instant;

use tracing::{debug, warn};

use crate::criteria::{
    AttributeCondition, Condition, ConditionGroup, CriteriaTree, EventCondition, Frequency,
    TimePeriod, Value,
};
use crate::extract::AGE_BETWEEN;
use crate::mapper::age_range_dates;
use crate::resolve::ValueResolver;
use crate::vocab::schema::{self, CUSTOMERS, TRANSACTIONS};
use crate::vocab::{
    match_operator, EventConditionType, FieldType, FrequencyQualifier, OperatorMatch, TimeUnit,
};

pub struct Normalizer<'a> {
    resolver: &'a ValueResolver,
    current_year: i32,
    deadline: Option<Instant>,
}

impl<'a> Normalizer<'a> {
    pub fn new(resolver: &'a ValueResolver, current_year: i32) -> Self {
        Self {
            resolver,
            current_year,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Returns a validated copy of `tree`.
    pub fn normalize(&self, tree: &CriteriaTree) -> CriteriaTree {
        CriteriaTree {
            conditions: tree
                .conditions
                .iter()
                .map(|c| self.normalize_condition(c))
                .collect(),
            condition_groups: tree
                .condition_groups
                .iter()
                .map(|group| ConditionGroup {
                    operator: group.operator,
                    conditions: group
                        .conditions
                        .iter()
                        .map(|c| self.normalize_condition(c))
                        .collect(),
                })
                .collect(),
            logic_operator: tree.logic_operator,
        }
    }

    /// Lenient entry point for untyped payloads. Anything that is not a JSON
    /// object normalizes to the empty tree.
    pub fn normalize_json(&self, raw: &serde_json::Value) -> CriteriaTree {
        if !raw.is_object() {
            warn!("normalize.malformed_input");
            return CriteriaTree::default();
        }
        self.normalize(&CriteriaTree::from_json(raw))
    }

    pub fn normalize_condition(&self, condition: &Condition) -> Condition {
        match condition {
            Condition::Attribute(attr) => {
                Condition::Attribute(self.normalize_attribute(attr, CUSTOMERS))
            }
            Condition::Event(event) => Condition::Event(self.normalize_event(event)),
        }
    }

    fn normalize_attribute(
        &self,
        attr: &AttributeCondition,
        default_dataset: &str,
    ) -> AttributeCondition {
        let field = attr.field.clone();
        let column = field.as_deref().unwrap_or_default();
        let dataset = attr.dataset.clone().unwrap_or_else(|| {
            schema::locate(column)
                .map(|f| f.dataset)
                .unwrap_or(default_dataset)
                .to_string()
        });
        let field_type = schema::field_type(&dataset, column);

        if attr.operator.as_deref() == Some(AGE_BETWEEN) {
            if let (Some(youngest), Some(oldest)) = (attr.value.as_i64(), attr.value2.as_i64()) {
                match age_range_dates(self.current_year, youngest, oldest) {
                    Some((from, to)) => {
                        return AttributeCondition {
                            dataset: Some(dataset),
                            field,
                            operator: Some("between".to_string()),
                            value: Value::String(from),
                            value2: Value::String(to),
                        };
                    }
                    None => warn!(column, youngest, oldest, "normalize.age_range_rejected"),
                }
            }
        }

        let operator = validated_operator(field_type, attr.operator.as_deref(), column);
        let (value, value2) = match schema::mapping_category(&dataset, column) {
            Some(category) => (
                self.standardize(category, &attr.value),
                self.standardize(category, &attr.value2),
            ),
            None => (attr.value.clone(), attr.value2.clone()),
        };
        AttributeCondition {
            dataset: Some(dataset),
            field,
            operator: Some(operator.to_string()),
            value,
            value2,
        }
    }

    fn standardize(&self, category: &str, value: &Value) -> Value {
        match value.as_str() {
            Some(raw) if !raw.trim().is_empty() => {
                Value::String(self.resolver.standardize_within(category, raw, self.deadline))
            }
            _ => value.clone(),
        }
    }

    fn normalize_event(&self, event: &EventCondition) -> EventCondition {
        let event_type = match event.event_condition_type.as_deref() {
            Some(raw) => {
                let (parsed, defaulted) = EventConditionType::parse_or_default(raw);
                if defaulted {
                    warn!(supplied = raw, default = parsed.code(), "normalize.event_type_defaulted");
                }
                parsed
            }
            None => EventConditionType::default(),
        };

        let frequency = event.frequency.as_ref().map(|freq| {
            let (qualifier, defaulted) = FrequencyQualifier::parse_or_default(&freq.operator);
            if defaulted {
                warn!(
                    supplied = %freq.operator,
                    default = qualifier.code(),
                    "normalize.frequency_defaulted"
                );
            }
            Frequency {
                operator: qualifier.code().to_string(),
                value: freq.value.max(0),
            }
        });

        let time_period = event.time_period.as_ref().map(|period| {
            let unit = parse_time_unit(&period.unit).unwrap_or_else(|| {
                let fallback = TimeUnit::default();
                warn!(supplied = %period.unit, default = fallback.code(), "normalize.time_unit_defaulted");
                fallback
            });
            TimePeriod {
                unit: unit.code().to_string(),
                value: period.value.max(0),
            }
        });

        let operator = event
            .operator
            .as_deref()
            .map(|op| validated_operator(FieldType::Number, Some(op), "amount").to_string());

        EventCondition {
            event_name: event.event_name.clone(),
            event_condition_type: Some(event_type.code().to_string()),
            operator,
            value: event.value.clone(),
            frequency,
            time_period,
            attribute_conditions: event
                .attribute_conditions
                .iter()
                .map(|nested| self.normalize_attribute(nested, TRANSACTIONS))
                .collect(),
        }
    }
}

/// Accepts plural codes and their singular forms ("month").
fn parse_time_unit(raw: &str) -> Option<TimeUnit> {
    TimeUnit::parse(raw).or_else(|| TimeUnit::parse(&format!("{}s", raw.trim())))
}

fn validated_operator(field_type: FieldType, supplied: Option<&str>, column: &str) -> &'static str {
    let matched = match_operator(field_type, supplied.unwrap_or_default());
    match matched {
        OperatorMatch::Defaulted(code) => {
            if supplied.is_some() {
                warn!(
                    column,
                    supplied = supplied.unwrap_or_default(),
                    field_type = field_type.as_str(),
                    default = code,
                    "normalize.operator_defaulted"
                );
            } else {
                debug!(column, default = code, "normalize.operator_defaulted");
            }
        }
        OperatorMatch::Label(code) => {
            debug!(column, code, "normalize.operator_label_matched");
        }
        OperatorMatch::Code(_) => {}
    }
    matched.code()
}
