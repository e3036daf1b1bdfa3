//! Readable rendering of a storage tree, for audit trails and previews.

use crate::canonical::{StorageTree, StoredAttribute, StoredCondition, StoredEvent};
use crate::vocab::{describe_operator, schema, EventConditionType, FrequencyQualifier};

/// Describes `tree` as a single sentence, e.g.
/// `gender equals F AND purchase performed at least 1 time in the last 3 months`.
pub fn describe(tree: &StorageTree) -> String {
    let mut parts: Vec<String> = tree.conditions.iter().map(describe_condition).collect();
    for group in &tree.condition_groups {
        let members: Vec<String> = group.conditions.iter().map(describe_condition).collect();
        match members.len() {
            0 => {}
            1 => parts.extend(members),
            _ => parts.push(format!("({})", members.join(&format!(" {} ", group.operator)))),
        }
    }
    if parts.is_empty() {
        return "all customers".to_string();
    }
    parts.join(&format!(" {} ", tree.root_operator))
}

pub fn describe_condition(condition: &StoredCondition) -> String {
    match condition {
        StoredCondition::Attribute(attr) => describe_attribute(attr),
        StoredCondition::Event(event) => describe_event(event),
    }
}

fn operator_words(attr: &StoredAttribute) -> String {
    let field_type = schema::field_type(&attr.dataset_key, &attr.column_key);
    describe_operator(field_type, &attr.operator)
        .map(|d| d.label.to_lowercase())
        .unwrap_or_else(|| attr.operator.replace('_', " "))
}

fn describe_attribute(attr: &StoredAttribute) -> String {
    let words = operator_words(attr);
    match attr.operator.as_str() {
        "is_null" | "is_not_null" | "is_true" | "is_false" | "is_empty" | "is_not_empty" => {
            format!("{} {words}", attr.column_key)
        }
        "between" => format!(
            "{} {words} {} and {}",
            attr.column_key, attr.value, attr.value2
        ),
        _ => format!("{} {words} {}", attr.column_key, attr.value),
    }
}

fn describe_event(event: &StoredEvent) -> String {
    let event_type = EventConditionType::parse_or_default(&event.event_type).0;
    let mut out = match event_type {
        EventConditionType::Performed => {
            let qualifier = FrequencyQualifier::parse_or_default(&event.frequency).0;
            let times = if event.count == 1 { "time" } else { "times" };
            format!(
                "{} performed {} {} {times}",
                event.column_key,
                qualifier.code().replace('_', " "),
                event.count
            )
        }
        EventConditionType::NotPerformed => format!("{} not performed", event.column_key),
        EventConditionType::FirstTime => format!("{} first performed", event.column_key),
        EventConditionType::LastTime => format!("{} last performed", event.column_key),
    };
    if let (Some(unit), Some(value)) = (event.time_period.as_deref(), event.time_value) {
        let unit = if value == 1 {
            unit.strip_suffix('s').unwrap_or(unit)
        } else {
            unit
        };
        out.push_str(&format!(" in the last {value} {unit}"));
    }
    if !event.attribute_conditions.is_empty() {
        let filters: Vec<String> = event
            .attribute_conditions
            .iter()
            .map(describe_attribute)
            .collect();
        out.push_str(" with ");
        out.push_str(&filters.join(" and "));
    }
    out
}
