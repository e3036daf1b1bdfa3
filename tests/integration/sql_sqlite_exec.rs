#![allow(missing_docs)]

use std::sync::Arc;

use rusqlite::{params_from_iter, Connection};
use segment_criteria::criteria::TimePeriod;
use segment_criteria::{
    AttributeCondition, CompiledPredicate, CompilerOptions, Condition, CriteriaCompiler,
    CriteriaTree, Dialect, EventCondition, InMemoryMappingStore, MappingRecord,
};

const SCHEMA: &str = "
CREATE TABLE customers (
    customer_id INTEGER PRIMARY KEY,
    full_name TEXT,
    email TEXT,
    phone TEXT,
    gender TEXT,
    birth_date TEXT,
    city TEXT,
    registration_date TEXT,
    is_active INTEGER
);
CREATE TABLE stores (
    store_id INTEGER PRIMARY KEY,
    store_name TEXT,
    store_type TEXT,
    city TEXT,
    region TEXT,
    opening_date TEXT
);
CREATE TABLE product_lines (
    product_line_id INTEGER PRIMARY KEY,
    name TEXT,
    category TEXT,
    brand TEXT,
    unit_price REAL
);
CREATE TABLE transactions (
    transaction_id INTEGER PRIMARY KEY,
    customer_id INTEGER,
    store_id INTEGER,
    product_line_id INTEGER,
    quantity INTEGER,
    unit_price REAL,
    total_amount REAL,
    payment_method TEXT,
    transaction_date TEXT
);
INSERT INTO customers VALUES
    (1, 'Ann Lee', 'ann@example.com', NULL, 'F', '1992-05-01', 'Los Angeles', '2020-01-01', 1),
    (2, 'Bob Tran', 'bob@example.com', NULL, 'M', '1980-02-02', 'Ha Noi', '2019-06-01', 1),
    (3, 'Cat Vo', NULL, NULL, 'F', '2001-03-03', 'Ha Noi', '2023-03-01', 0);
INSERT INTO stores VALUES
    (1, 'Downtown', 'Supermarket', 'Los Angeles', 'West', '2010-01-01'),
    (2, 'Old Quarter', 'Convenience Store', 'Ha Noi', 'North', '2015-01-01');
INSERT INTO product_lines VALUES
    (1, 'Phone', 'Electronics', 'Acme', 150.0),
    (2, 'Dress', 'Fashion', 'Silk', 300.0);
INSERT INTO transactions VALUES
    (1, 1, 1, 1, 1, 150.0, 150.0, 'Cash', date('now', '-10 days')),
    (2, 1, 1, 2, 2, 300.0, 600.0, 'Card', date('now', '-20 days')),
    (3, 2, 2, 1, 1, 50.0, 50.0, 'E-Wallet', date('now', '-200 days')),
    (4, 3, 2, 2, 1, 300.0, 300.0, 'Cash', date('now', '-5 days'));
";

fn seeded() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    conn
}

fn compiler() -> CriteriaCompiler {
    let store = InMemoryMappingStore::with_records([MappingRecord::new(
        "product_category",
        "electronics",
        "Electronics",
    )]);
    CriteriaCompiler::with_store(
        Arc::new(store),
        CompilerOptions::default()
            .with_dialect(Dialect::Sqlite)
            .with_current_year(2025),
    )
}

fn matching_ids(conn: &Connection, compiled: &CompiledPredicate) -> Vec<i64> {
    let sql = format!("{} ORDER BY c.customer_id", compiled.select_customers());
    let mut stmt = conn.prepare(&sql).unwrap();
    let rows = stmt
        .query_map(params_from_iter(compiled.params.iter()), |row| {
            row.get::<_, i64>("customer_id")
        })
        .unwrap();
    rows.map(|r| r.unwrap()).collect()
}

fn run_tree(tree: CriteriaTree) -> Vec<i64> {
    let compiler = compiler();
    let stored = compiler.compile_tree(&tree);
    let compiled = compiler.compile_sql(&stored).unwrap();
    matching_ids(&seeded(), &compiled)
}

fn run_text(text: &str) -> Vec<i64> {
    let compiler = compiler();
    let stored = compiler.compile_text(text);
    let compiled = compiler.compile_sql(&stored).unwrap();
    matching_ids(&seeded(), &compiled)
}

fn purchase(event_type: &str) -> EventCondition {
    EventCondition {
        event_name: "purchase".into(),
        event_condition_type: Some(event_type.into()),
        ..EventCondition::default()
    }
}

#[test]
fn frequency_within_window() {
    assert_eq!(
        run_text("female customers who purchased at least 2 times in the last 3 months"),
        [1]
    );
}

#[test]
fn age_range_from_text() {
    assert_eq!(run_text("customers aged 20 to 40"), [1, 3]);
}

#[test]
fn amount_between_on_transactions() {
    let tree = CriteriaTree::new(vec![Condition::Attribute(
        AttributeCondition::new("transactions", "total_amount", "between", 100).with_value2(500),
    )]);
    assert_eq!(run_tree(tree), [1, 3]);
}

#[test]
fn nested_product_category_joins_product_lines() {
    let mut event = purchase("performed");
    event.attribute_conditions = vec![AttributeCondition::new(
        "product_lines",
        "category",
        "equals",
        "electronics",
    )];
    assert_eq!(run_tree(CriteriaTree::new(vec![Condition::Event(event)])), [1, 2]);
}

#[test]
fn store_columns_join_stores() {
    let tree = CriteriaTree::new(vec![Condition::Attribute(AttributeCondition::new(
        "stores",
        "store_type",
        "equals",
        "siêu thị",
    ))]);
    assert_eq!(run_tree(tree), [1]);
}

#[test]
fn not_performed_and_last_time_windows() {
    let mut lapsed = purchase("not_performed");
    lapsed.time_period = Some(TimePeriod {
        unit: "days".into(),
        value: 30,
    });
    assert_eq!(run_tree(CriteriaTree::new(vec![Condition::Event(lapsed)])), [2]);

    let mut recent = purchase("last_time");
    recent.time_period = Some(TimePeriod {
        unit: "weeks".into(),
        value: 1,
    });
    assert_eq!(run_tree(CriteriaTree::new(vec![Condition::Event(recent)])), [3]);
}

#[test]
fn text_and_boolean_operators_execute() {
    let tree = CriteriaTree::new(vec![
        Condition::Attribute(AttributeCondition::new("customers", "full_name", "starts_with", "B")),
        Condition::Attribute(AttributeCondition::new("customers", "is_active", "is_true", "")),
    ]);
    assert_eq!(run_tree(tree), [2]);

    let inactive = CriteriaTree::new(vec![Condition::Attribute(AttributeCondition::new(
        "customers",
        "is_active",
        "is_false",
        "",
    ))]);
    assert_eq!(run_tree(inactive), [3]);

    let no_email = CriteriaTree::new(vec![Condition::Attribute(AttributeCondition::new(
        "customers",
        "email",
        "is_null",
        "",
    ))]);
    assert_eq!(run_tree(no_email), [3]);
}

#[test]
fn like_metacharacters_match_literally() {
    let tree = CriteriaTree::new(vec![Condition::Attribute(AttributeCondition::new(
        "customers",
        "email",
        "contains",
        "_",
    ))]);
    assert!(run_tree(tree).is_empty());
}

#[test]
fn empty_tree_selects_everyone() {
    assert_eq!(run_tree(CriteriaTree::default()), [1, 2, 3]);
}
