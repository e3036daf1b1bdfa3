//! Field schema catalog for the customers / transactions / product_lines /
//! stores datasets.
//!
//! The catalog answers two questions: what comparison type a column has (so
//! operators can be validated) and which value-mapping category, if any,
//! standardizes its values. Unknown columns infer as text.

use super::FieldType;

/// Dataset every criteria tree is ultimately evaluated against.
pub const CUSTOMERS: &str = "customers";
pub const TRANSACTIONS: &str = "transactions";
pub const PRODUCT_LINES: &str = "product_lines";
pub const STORES: &str = "stores";

/// Value-mapping category names.
pub mod category {
    pub const GENDER: &str = "gender";
    pub const CITY: &str = "city";
    pub const PAYMENT_METHOD: &str = "payment_method";
    pub const STORE_TYPE: &str = "store_type";
    pub const PRODUCT_CATEGORY: &str = "product_category";
}

/// Catalog entry for a single column.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FieldSchema {
    pub dataset: &'static str,
    pub column: &'static str,
    pub field_type: FieldType,
    /// Value-mapping category applied to values of this column.
    pub mapping: Option<&'static str>,
}

const fn field(
    dataset: &'static str,
    column: &'static str,
    field_type: FieldType,
    mapping: Option<&'static str>,
) -> FieldSchema {
    FieldSchema {
        dataset,
        column,
        field_type,
        mapping,
    }
}

use FieldType::{Boolean, Datetime, Number, Text};

static FIELDS: &[FieldSchema] = &[
    field(CUSTOMERS, "customer_id", Number, None),
    field(CUSTOMERS, "full_name", Text, None),
    field(CUSTOMERS, "email", Text, None),
    field(CUSTOMERS, "phone", Text, None),
    field(CUSTOMERS, "gender", Text, Some(category::GENDER)),
    field(CUSTOMERS, "birth_date", Datetime, None),
    field(CUSTOMERS, "city", Text, Some(category::CITY)),
    field(CUSTOMERS, "registration_date", Datetime, None),
    field(CUSTOMERS, "is_active", Boolean, None),
    field(TRANSACTIONS, "transaction_id", Number, None),
    field(TRANSACTIONS, "customer_id", Number, None),
    field(TRANSACTIONS, "store_id", Number, None),
    field(TRANSACTIONS, "product_line_id", Number, None),
    field(TRANSACTIONS, "quantity", Number, None),
    field(TRANSACTIONS, "unit_price", Number, None),
    field(TRANSACTIONS, "total_amount", Number, None),
    field(TRANSACTIONS, "payment_method", Text, Some(category::PAYMENT_METHOD)),
    field(TRANSACTIONS, "transaction_date", Datetime, None),
    field(PRODUCT_LINES, "product_line_id", Number, None),
    field(PRODUCT_LINES, "name", Text, None),
    field(PRODUCT_LINES, "category", Text, Some(category::PRODUCT_CATEGORY)),
    field(PRODUCT_LINES, "brand", Text, None),
    field(PRODUCT_LINES, "unit_price", Number, None),
    field(STORES, "store_id", Number, None),
    field(STORES, "store_name", Text, None),
    field(STORES, "store_type", Text, Some(category::STORE_TYPE)),
    field(STORES, "city", Text, Some(category::CITY)),
    field(STORES, "region", Text, None),
    field(STORES, "opening_date", Datetime, None),
];

/// Every catalogued column.
pub fn fields() -> &'static [FieldSchema] {
    FIELDS
}

/// Known dataset names, customers first.
pub fn datasets() -> [&'static str; 4] {
    [CUSTOMERS, TRANSACTIONS, PRODUCT_LINES, STORES]
}

/// Catalog entry for `dataset.column`, if catalogued.
pub fn lookup(dataset: &str, column: &str) -> Option<&'static FieldSchema> {
    FIELDS
        .iter()
        .find(|f| f.dataset == dataset && f.column == column)
}

/// First dataset (customers first) that defines `column`.
pub fn locate(column: &str) -> Option<&'static FieldSchema> {
    FIELDS.iter().find(|f| f.column == column)
}

/// Comparison type for `dataset.column`; text when uncatalogued.
pub fn field_type(dataset: &str, column: &str) -> FieldType {
    lookup(dataset, column)
        .map(|f| f.field_type)
        .unwrap_or(FieldType::Text)
}

/// Value-mapping category for `dataset.column`, if any.
pub fn mapping_category(dataset: &str, column: &str) -> Option<&'static str> {
    lookup(dataset, column).and_then(|f| f.mapping)
}

pub fn is_known_dataset(dataset: &str) -> bool {
    datasets().contains(&dataset)
}
