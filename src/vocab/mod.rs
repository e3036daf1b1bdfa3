#![forbid(unsafe_code)]

//! Vocabulary registry.
//!
//! Static enumerations of the operators each field type accepts, plus the
//! event-condition types, frequency qualifiers, and time-period units the
//! criteria language understands. Everything here is read-only data; the
//! normalizer and predicate compiler consult it but never extend it.

pub mod schema;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Comparison type of a field, used to pick the legal operator set.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Datetime,
    Boolean,
    Array,
}

impl FieldType {
    /// Every field type, in registry order.
    pub const ALL: [FieldType; 5] = [
        FieldType::Text,
        FieldType::Number,
        FieldType::Datetime,
        FieldType::Boolean,
        FieldType::Array,
    ];

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Datetime => "datetime",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
        }
    }

    /// Operators registered for this type. The first entry is the default.
    pub fn operators(self) -> &'static [OperatorDescriptor] {
        match self {
            FieldType::Text => TEXT_OPERATORS,
            FieldType::Number => NUMBER_OPERATORS,
            FieldType::Datetime => DATETIME_OPERATORS,
            FieldType::Boolean => BOOLEAN_OPERATORS,
            FieldType::Array => ARRAY_OPERATORS,
        }
    }

    /// Operator substituted when a supplied operator cannot be matched.
    pub fn default_operator(self) -> &'static str {
        self.operators()[0].code
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator code plus the label shown to users (and accepted as input).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OperatorDescriptor {
    pub code: &'static str,
    pub label: &'static str,
}

const fn op(code: &'static str, label: &'static str) -> OperatorDescriptor {
    OperatorDescriptor { code, label }
}

const TEXT_OPERATORS: &[OperatorDescriptor] = &[
    op("equals", "Equals"),
    op("not_equals", "Does not equal"),
    op("contains", "Contains"),
    op("not_contains", "Does not contain"),
    op("starts_with", "Starts with"),
    op("ends_with", "Ends with"),
    op("is_null", "Is empty"),
    op("is_not_null", "Is not empty"),
];

const NUMBER_OPERATORS: &[OperatorDescriptor] = &[
    op("equals", "Equals"),
    op("not_equals", "Does not equal"),
    op("greater_than", "Greater than"),
    op("greater_than_or_equal", "Greater than or equal"),
    op("less_than", "Less than"),
    op("less_than_or_equal", "Less than or equal"),
    op("between", "Between"),
    op("is_null", "Is empty"),
    op("is_not_null", "Is not empty"),
];

const DATETIME_OPERATORS: &[OperatorDescriptor] = &[
    op("equals", "On"),
    op("not_equals", "Not on"),
    op("before", "Before"),
    op("after", "After"),
    op("between", "Between"),
    op("is_null", "Is empty"),
    op("is_not_null", "Is not empty"),
];

const BOOLEAN_OPERATORS: &[OperatorDescriptor] = &[
    op("is_true", "Is true"),
    op("is_false", "Is false"),
    op("is_null", "Is empty"),
    op("is_not_null", "Is not empty"),
];

const ARRAY_OPERATORS: &[OperatorDescriptor] = &[
    op("contains", "Contains"),
    op("not_contains", "Does not contain"),
    op("is_empty", "Is empty"),
    op("is_not_empty", "Is not empty"),
];

/// Outcome of validating an operator against a field type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OperatorMatch {
    /// Supplied string is a registered code.
    Code(&'static str),
    /// Supplied string matched a label case-insensitively.
    Label(&'static str),
    /// Nothing matched; the type's first operator was substituted.
    Defaulted(&'static str),
}

impl OperatorMatch {
    /// Registered operator code chosen by validation.
    pub fn code(self) -> &'static str {
        match self {
            OperatorMatch::Code(code)
            | OperatorMatch::Label(code)
            | OperatorMatch::Defaulted(code) => code,
        }
    }

    pub fn is_defaulted(self) -> bool {
        matches!(self, OperatorMatch::Defaulted(_))
    }
}

/// Resolves `raw` to a registered operator for `field_type`.
///
/// Exact code match wins, then a case-insensitive label match, then the
/// type's first registered operator. Never fails.
pub fn match_operator(field_type: FieldType, raw: &str) -> OperatorMatch {
    let operators = field_type.operators();
    if let Some(found) = operators.iter().find(|d| d.code == raw) {
        return OperatorMatch::Code(found.code);
    }
    let trimmed = raw.trim();
    if let Some(found) = operators
        .iter()
        .find(|d| d.label.eq_ignore_ascii_case(trimmed))
    {
        return OperatorMatch::Label(found.code);
    }
    OperatorMatch::Defaulted(field_type.default_operator())
}

/// Shorthand for [`match_operator`] returning only the chosen code.
pub fn validate_operator(field_type: FieldType, raw: &str) -> &'static str {
    match_operator(field_type, raw).code()
}

/// Looks up the descriptor for a registered operator code.
pub fn describe_operator(field_type: FieldType, code: &str) -> Option<&'static OperatorDescriptor> {
    field_type.operators().iter().find(|d| d.code == code)
}

/// Defines a closed vocabulary enum with string codes and a default.
macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident default $default:ident {
            $($variant:ident => $code:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every registered value, in registry order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire code of this value.
            pub fn code(self) -> &'static str {
                match self {
                    $($name::$variant => $code),+
                }
            }

            /// Parses a wire code; matching ignores case and surrounding space.
            pub fn parse(raw: &str) -> Option<Self> {
                let raw = raw.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.code().eq_ignore_ascii_case(raw))
            }

            /// Parses a wire code, substituting the documented default.
            pub fn parse_or_default(raw: &str) -> (Self, bool) {
                match Self::parse(raw) {
                    Some(v) => (v, false),
                    None => (Self::default(), true),
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.code())
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.serialize_str(self.code())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(d)?;
                Ok(Self::parse_or_default(&raw).0)
            }
        }
    };
}

vocabulary! {
    /// Behavioural test applied to an event.
    EventConditionType default Performed {
        Performed => "performed",
        NotPerformed => "not_performed",
        FirstTime => "first_time",
        LastTime => "last_time",
    }
}

vocabulary! {
    /// Comparator applied to an event count.
    FrequencyQualifier default AtLeast {
        AtLeast => "at_least",
        AtMost => "at_most",
        Exactly => "exactly",
    }
}

vocabulary! {
    /// Unit of a recency window.
    TimeUnit default Days {
        Days => "days",
        Weeks => "weeks",
        Months => "months",
    }
}
