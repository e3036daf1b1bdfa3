#![allow(missing_docs)]

use std::sync::Arc;

use segment_criteria::{
    explain, CompilerOptions, Condition, ConditionGroup, CriteriaCompiler, CriteriaTree, Dialect,
    InMemoryMappingStore, LogicOperator, MappingRecord, StoredCondition, Value,
};
use serde_json::json;

fn compiler() -> CriteriaCompiler {
    CriteriaCompiler::new(CompilerOptions::default().with_current_year(2025))
}

#[test]
fn sentence_to_storage_tree() {
    let tree = compiler().compile_text(
        "female customers in Los Angeles who purchased at least 1 time in the last 3 months",
    );
    assert_eq!(tree.root_operator, LogicOperator::And);
    assert_eq!(tree.size, 3);

    let attrs: Vec<(&str, &str)> = tree
        .conditions
        .iter()
        .filter_map(|c| match c {
            StoredCondition::Attribute(a) => Some((a.column_key.as_str(), a.value.as_str())),
            StoredCondition::Event(_) => None,
        })
        .collect();
    assert_eq!(attrs, [("gender", "F"), ("city", "Los Angeles")]);

    let StoredCondition::Event(event) = &tree.conditions[2] else {
        panic!("expected event condition last");
    };
    assert_eq!(event.column_key, "purchase");
    assert_eq!(event.event_type, "performed");
    assert_eq!((event.frequency.as_str(), event.count), ("at_least", 1));
    assert_eq!(event.time_period.as_deref(), Some("months"));
    assert_eq!(event.time_value, Some(3));

    let ids: Vec<u32> = tree
        .conditions
        .iter()
        .map(|c| match c {
            StoredCondition::Attribute(a) => a.id,
            StoredCondition::Event(e) => e.id,
        })
        .collect();
    assert_eq!(ids, [1, 2, 3]);
}

#[test]
fn vietnamese_sentence() {
    let tree = compiler().compile_text("khách hàng nữ ở Hà Nội từ 25 đến 35 tuổi");
    let attrs: Vec<(String, String, String, String)> = tree
        .conditions
        .iter()
        .filter_map(|c| match c {
            StoredCondition::Attribute(a) => Some((
                a.column_key.clone(),
                a.operator.clone(),
                a.value.clone(),
                a.value2.clone(),
            )),
            StoredCondition::Event(_) => None,
        })
        .collect();
    assert_eq!(
        attrs,
        [
            ("gender".into(), "equals".into(), "F".into(), "".into()),
            ("city".into(), "equals".into(), "Ha Noi".into(), "".into()),
            (
                "birth_date".into(),
                "between".into(),
                "1990-01-01".into(),
                "2000-12-31".into()
            ),
        ]
    );
}

#[test]
fn stored_mappings_take_precedence() {
    let store = InMemoryMappingStore::with_records([
        MappingRecord::new("city", "la", "Los Angeles"),
        MappingRecord::new("product_category", "electronics", "Consumer Electronics"),
    ]);
    let compiler = CriteriaCompiler::with_store(
        Arc::new(store),
        CompilerOptions::default().with_current_year(2025),
    );
    let tree = compiler.compile_text("men in LA who like electronics");
    let values: Vec<&str> = tree
        .conditions
        .iter()
        .filter_map(|c| match c {
            StoredCondition::Attribute(a) => Some(a.value.as_str()),
            StoredCondition::Event(_) => None,
        })
        .collect();
    assert_eq!(values, ["M", "Los Angeles", "Consumer Electronics"]);
}

#[test]
fn groups_keep_size_and_sql_structure() {
    let tree = CriteriaTree::new(vec![
        Condition::Attribute(segment_criteria::AttributeCondition::new(
            "customers", "gender", "equals", "nam",
        )),
        Condition::Attribute(segment_criteria::AttributeCondition::new(
            "customers", "is_active", "is_true", Value::Null,
        )),
    ])
    .with_group(ConditionGroup {
        operator: LogicOperator::Or,
        conditions: vec![
            Condition::Attribute(segment_criteria::AttributeCondition::new(
                "customers", "city", "equals", "hcm",
            )),
            Condition::Attribute(segment_criteria::AttributeCondition::new(
                "stores", "city", "equals", "hn",
            )),
            Condition::Attribute(segment_criteria::AttributeCondition::new(
                "transactions", "payment_method", "equals", "tiền mặt",
            )),
        ],
    });
    let compiler = compiler();
    let stored = compiler.compile_tree(&tree);
    assert_eq!(stored.size, 5);

    let compiled = compiler.compile_sql(&stored).unwrap();
    assert_eq!(
        compiled.inline(),
        "c.gender = 'M' AND c.is_active = TRUE AND (c.city = 'Ho Chi Minh City' \
         OR EXISTS (SELECT 1 FROM transactions t JOIN stores s ON s.store_id = t.store_id \
         WHERE t.customer_id = c.customer_id AND s.city = 'Ha Noi') \
         OR EXISTS (SELECT 1 FROM transactions t WHERE t.customer_id = c.customer_id \
         AND t.payment_method = 'Cash'))"
    );
    assert_eq!(compiled.params.len(), 5);
    assert_eq!(compiled.dialect, Dialect::Postgres);
}

#[test]
fn generator_payload_round_trip() {
    let compiler = compiler();
    let stored = compiler.compile_json(&json!({
        "logic_operator": "AND",
        "conditions": [
            {
                "type": "event",
                "event_name": "purchase",
                "event_condition_type": "not_performed",
                "time_period": { "unit": "days", "value": 90 }
            },
            { "type": "attribute", "dataset": "customers", "field": "birth_date", "operator": "before", "value": "1980-01-01" }
        ]
    }));
    assert_eq!(
        explain::describe(&stored),
        "purchase not performed in the last 90 days AND birth_date before 1980-01-01"
    );
    let compiled = compiler.compile_sql(&stored).unwrap();
    assert_eq!(
        compiled.sql,
        "NOT EXISTS (SELECT 1 FROM transactions t WHERE t.customer_id = c.customer_id \
         AND t.transaction_date >= NOW() - make_interval(days => $1)) AND c.birth_date < $2"
    );
}

#[test]
fn amount_sentence_synthesizes_nested_condition() {
    let compiler = compiler();
    let tree = compiler.compile_text("customers who spent over 2 million in the past 6 months");
    assert_eq!(tree.size, 1);
    let StoredCondition::Event(event) = &tree.conditions[0] else {
        panic!("expected event");
    };
    let nested = &event.attribute_conditions[0];
    assert_eq!(nested.column_key, "total_amount");
    assert_eq!(nested.operator, "greater_than");
    assert_eq!(nested.value, "2000000");
    assert_eq!(event.time_value, Some(6));

    let compiled = compiler.compile_sql(&tree).unwrap();
    assert!(compiled.inline().contains("t.total_amount > 2000000"));
    assert!(compiled.inline().contains("HAVING COUNT(*) >= 1"));
}
