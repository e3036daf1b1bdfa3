#![forbid(unsafe_code)]

//! Canonicalizer: flattens a validated criteria tree into the persisted
//! storage shape.
//!
//! Two id counters are used. Top-level conditions (root or group members)
//! count from 1, restarting in every group; nested event attribute conditions
//! count from 1, restarting in every event. Groups are numbered on their own.
//! `size` is always recomputed. Nothing is dropped: unknown datasets and
//! columns are kept verbatim.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::criteria::{
    AttributeCondition, Condition, CriteriaTree, EventCondition, LogicOperator, Value,
};
use crate::vocab::schema::{self, TRANSACTIONS};
use crate::vocab::{EventConditionType, FrequencyQualifier};

/// Column a direct event comparison (purchase amount) is stored against.
pub const AMOUNT_COLUMN: &str = "total_amount";

/// Persisted criteria tree.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageTree {
    #[serde(default)]
    pub size: usize,
    #[serde(default)]
    pub root_operator: LogicOperator,
    #[serde(default)]
    pub conditions: Vec<StoredCondition>,
    #[serde(default)]
    pub condition_groups: Vec<StoredGroup>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoredCondition {
    Attribute(StoredAttribute),
    Event(StoredEvent),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoredAttribute {
    pub id: u32,
    pub dataset_key: String,
    pub column_key: String,
    pub operator: String,
    pub value: String,
    pub value2: String,
    pub logic_operator: LogicOperator,
    pub chosen: bool,
    pub selected: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoredEvent {
    pub id: u32,
    /// Event name, e.g. `purchase`.
    pub column_key: String,
    pub event_type: String,
    /// Frequency qualifier code.
    pub frequency: String,
    pub count: i64,
    pub time_period: Option<String>,
    pub time_value: Option<i64>,
    pub attribute_conditions: Vec<StoredAttribute>,
    pub logic_operator: LogicOperator,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoredGroup {
    pub id: u32,
    pub operator: LogicOperator,
    pub conditions: Vec<StoredCondition>,
}

impl StorageTree {
    /// Fail-safe tree: AND root, no conditions.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.condition_count() == 0
    }

    /// Root conditions plus every group member.
    pub fn condition_count(&self) -> usize {
        self.conditions.len()
            + self
                .condition_groups
                .iter()
                .map(|g| g.conditions.len())
                .sum::<usize>()
    }

    /// Parses a persisted tree; the stored `size` is not trusted.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        let mut tree: StorageTree = serde_json::from_str(raw)?;
        tree.size = tree.condition_count();
        Ok(tree)
    }
}

/// Stable id counter starting at 1.
#[derive(Default)]
struct IdCounter(u32);

impl IdCounter {
    fn next(&mut self) -> u32 {
        self.0 += 1;
        self.0
    }
}

/// Flattens `tree` into its storage shape.
pub fn canonicalize(tree: &CriteriaTree) -> StorageTree {
    let root = tree.logic_operator;
    let mut top = IdCounter::default();
    let conditions: Vec<StoredCondition> = tree
        .conditions
        .iter()
        .map(|c| store_condition(c, top.next(), root))
        .collect();

    let mut group_ids = IdCounter::default();
    let condition_groups: Vec<StoredGroup> = tree
        .condition_groups
        .iter()
        .map(|group| {
            let mut member = IdCounter::default();
            StoredGroup {
                id: group_ids.next(),
                operator: group.operator,
                conditions: group
                    .conditions
                    .iter()
                    .map(|c| store_condition(c, member.next(), root))
                    .collect(),
            }
        })
        .collect();

    let mut stored = StorageTree {
        size: 0,
        root_operator: root,
        conditions,
        condition_groups,
    };
    stored.size = stored.condition_count();
    stored
}

fn store_condition(condition: &Condition, id: u32, root: LogicOperator) -> StoredCondition {
    match condition {
        Condition::Attribute(attr) => StoredCondition::Attribute(store_attribute(attr, id, root, None)),
        Condition::Event(event) => StoredCondition::Event(store_event(event, id, root)),
    }
}

fn store_attribute(
    attr: &AttributeCondition,
    id: u32,
    logic_operator: LogicOperator,
    default_dataset: Option<&str>,
) -> StoredAttribute {
    let column_key = attr.field.clone().unwrap_or_default();
    let dataset_key = match (&attr.dataset, default_dataset) {
        (Some(dataset), _) => dataset.clone(),
        (None, fallback) => schema::locate(&column_key)
            .map(|f| f.dataset)
            .or(fallback)
            .unwrap_or_default()
            .to_string(),
    };
    let field_type = schema::field_type(&dataset_key, &column_key);
    let operator = attr
        .operator
        .clone()
        .unwrap_or_else(|| field_type.default_operator().to_string());
    if schema::lookup(&dataset_key, &column_key).is_none() {
        debug!(dataset = %dataset_key, column = %column_key, "canonical.unmapped_field");
    }
    StoredAttribute {
        id,
        dataset_key,
        column_key,
        operator,
        value: attr.value.to_string(),
        value2: attr.value2.to_string(),
        logic_operator,
        chosen: false,
        selected: false,
    }
}

fn store_event(event: &EventCondition, id: u32, root: LogicOperator) -> StoredEvent {
    let mut nested_ids = IdCounter::default();
    let mut attribute_conditions = Vec::with_capacity(event.attribute_conditions.len() + 1);
    if event.has_direct_comparison() {
        let synthesized = AttributeCondition {
            dataset: Some(TRANSACTIONS.to_string()),
            field: Some(AMOUNT_COLUMN.to_string()),
            operator: event.operator.clone(),
            value: event.value.clone(),
            value2: Value::Null,
        };
        attribute_conditions.push(store_attribute(
            &synthesized,
            nested_ids.next(),
            LogicOperator::And,
            None,
        ));
    }
    for nested in &event.attribute_conditions {
        attribute_conditions.push(store_attribute(
            nested,
            nested_ids.next(),
            LogicOperator::And,
            Some(TRANSACTIONS),
        ));
    }

    let (frequency, count) = match &event.frequency {
        Some(freq) => (freq.operator.clone(), freq.value),
        None => (FrequencyQualifier::default().code().to_string(), 1),
    };
    StoredEvent {
        id,
        column_key: event.event_name.clone(),
        event_type: event
            .event_condition_type
            .clone()
            .unwrap_or_else(|| EventConditionType::default().code().to_string()),
        frequency,
        count,
        time_period: event.time_period.as_ref().map(|p| p.unit.clone()),
        time_value: event.time_period.as_ref().map(|p| p.value),
        attribute_conditions,
        logic_operator: root,
    }
}
