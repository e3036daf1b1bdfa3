//! Semantic mapper: raw extractor entities to typed input-contract conditions.
//!
//! Derived semantics are expanded here (an age range becomes a birth-date
//! interval) and enumerated attribute values are standardized through the
//! value resolver. Event entities are translated structurally; validating
//! their vocabulary is the normalizer's job.

use std::time::Instant;

use crate::criteria::{
    AttributeCondition, Condition, CriteriaTree, EventCondition, Frequency, TimePeriod, Value,
};
use crate::extract::{EventMeasure, RawEntity, Window, AGE_BETWEEN};
use crate::resolve::ValueResolver;
use crate::vocab::{schema, EventConditionType};

/// Largest age accepted as a range bound.
pub const MAX_AGE: i64 = 150;

/// Birth-date interval covering everyone aged `youngest..=oldest` in `year`.
///
/// Someone aged `oldest` was born no earlier than `year - oldest`; someone
/// aged `youngest` no later than `year - youngest`. `None` when either bound
/// falls outside `0..=MAX_AGE`.
pub fn age_range_dates(year: i32, youngest: i64, oldest: i64) -> Option<(String, String)> {
    let (youngest, oldest) = if youngest <= oldest {
        (youngest, oldest)
    } else {
        (oldest, youngest)
    };
    if youngest < 0 || oldest > MAX_AGE {
        return None;
    }
    let year = i64::from(year);
    Some((
        format!("{:04}-01-01", year.checked_sub(oldest)?),
        format!("{:04}-12-31", year.checked_sub(youngest)?),
    ))
}

pub struct Mapper<'a> {
    resolver: &'a ValueResolver,
    current_year: i32,
    deadline: Option<Instant>,
}

impl<'a> Mapper<'a> {
    pub fn new(resolver: &'a ValueResolver, current_year: i32) -> Self {
        Self {
            resolver,
            current_year,
            deadline: None,
        }
    }

    /// Bounds the resolver's store lookups for this mapping pass.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Maps every entity, preserving order, into a root-level AND tree.
    pub fn map(&self, entities: &[RawEntity]) -> CriteriaTree {
        CriteriaTree::new(entities.iter().map(|e| self.map_entity(e)).collect())
    }

    pub fn map_entity(&self, entity: &RawEntity) -> Condition {
        match entity {
            RawEntity::Attribute {
                dataset,
                field,
                operator,
                value,
                value2,
            } => Condition::Attribute(self.map_attribute(dataset, field, operator, value, value2)),
            RawEntity::Event {
                event_name,
                measure,
            } => Condition::Event(map_event(event_name, measure)),
        }
    }

    fn map_attribute(
        &self,
        dataset: &str,
        field: &str,
        operator: &str,
        value: &Value,
        value2: &Value,
    ) -> AttributeCondition {
        if operator == AGE_BETWEEN {
            if let (Some(youngest), Some(oldest)) = (value.as_i64(), value2.as_i64()) {
                if let Some((from, to)) = age_range_dates(self.current_year, youngest, oldest) {
                    return AttributeCondition::new(dataset, field, "between", from).with_value2(to);
                }
            }
        }
        let value = match (schema::mapping_category(dataset, field), value.as_str()) {
            (Some(category), Some(raw)) => {
                Value::String(self.resolver.resolve_within(category, raw, self.deadline))
            }
            _ => value.clone(),
        };
        AttributeCondition::new(dataset, field, operator, value).with_value2(value2.clone())
    }
}

fn time_period(window: &Window) -> TimePeriod {
    TimePeriod {
        unit: window.unit.code().to_string(),
        value: window.value,
    }
}

fn map_event(event_name: &str, measure: &EventMeasure) -> EventCondition {
    let mut event = EventCondition {
        event_name: event_name.to_string(),
        event_condition_type: Some(EventConditionType::Performed.code().to_string()),
        ..EventCondition::default()
    };
    match measure {
        EventMeasure::Performed {
            qualifier,
            count,
            window,
        } => {
            event.frequency = Some(Frequency {
                operator: qualifier.code().to_string(),
                value: *count,
            });
            event.time_period = Some(time_period(window));
        }
        EventMeasure::Amount {
            operator,
            value,
            window,
        } => {
            event.operator = Some((*operator).to_string());
            event.value = value.clone();
            event.time_period = window.as_ref().map(time_period);
        }
    }
    event
}
