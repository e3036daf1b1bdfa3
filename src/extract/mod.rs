#![forbid(unsafe_code)]

//! Deterministic entity extraction from free text.
//!
//! The text is lower-cased and passed through the synonym table, then a fixed
//! list of independent patterns is evaluated in order: gender, locality, age
//! range, purchase frequency, purchase amount, product category. Each pattern
//! fires at most once. Results are not deduplicated or merged; a sentence
//! nothing matches yields an empty list.

pub mod synonyms;

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::criteria::Value;
use crate::vocab::schema::{CUSTOMERS, PRODUCT_LINES};
use crate::vocab::{FrequencyQualifier, TimeUnit};

/// Operator emitted for age ranges; the mapper turns it into a date range.
pub const AGE_BETWEEN: &str = "age_between";

/// Event name for every behavioural entity the extractor emits.
pub const PURCHASE_EVENT: &str = "purchase";

/// Transient condition candidate produced by one extraction call.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawEntity {
    Attribute {
        dataset: &'static str,
        field: &'static str,
        operator: &'static str,
        value: Value,
        #[serde(skip_serializing_if = "Value::is_null")]
        value2: Value,
    },
    Event {
        event_name: &'static str,
        #[serde(flatten)]
        measure: EventMeasure,
    },
}

/// What an event entity measures.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event_condition_type", rename_all = "snake_case")]
pub enum EventMeasure {
    /// "N times within M units".
    Performed {
        qualifier: FrequencyQualifier,
        count: i64,
        window: Window,
    },
    /// "spent V", optionally bounded to a recency window.
    Amount {
        operator: &'static str,
        value: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        window: Option<Window>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Window {
    pub unit: TimeUnit,
    pub value: i64,
}

struct Patterns {
    gender: Regex,
    locality_cue: Regex,
    span_delimiter: Regex,
    age_prefixed: Regex,
    age_suffixed: Regex,
    frequency: Regex,
    amount: Regex,
    window: Regex,
    category: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |src: &str| Regex::new(src).expect("static extraction pattern");
        let category_words = PRODUCT_CATEGORIES
            .iter()
            .flat_map(|(words, _)| words.iter())
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|");
        Patterns {
            gender: re(r"\b(female|male)\b"),
            locality_cue: re(r"\b(?:living in|located in|based in|in|at|from)\s+"),
            span_delimiter: re(
                r"[,.;:!?()]|\b(?:who|whom|that|which|with|and|or|aged|age|purchased|spent|paid|between|from|in|at|within|during|since)\b",
            ),
            age_prefixed: re(
                r"\bage(?:d)?\s+(?:from\s+|between\s+)?(\d{1,3})\s*(?:to|and|-)\s*(\d{1,3})\b",
            ),
            age_suffixed: re(
                r"\b(?:from|between)\s+(\d{1,3})\s*(?:to|and|-)\s*(\d{1,3})\s*(?:years?|yrs?)\b",
            ),
            frequency: re(
                r"\b(\d+)\s*(?:times?|x)\s+(?:with)?in\s+(?:the\s+)?(?:(?:last|past)\s+)?(?:(\d+)\s*)?(days?|weeks?|months?)\b",
            ),
            amount: re(
                r"\b(?:spent|paid|spending)\s+(?:(more than|over|above|at least|less than|under|below|at most|exactly)\s+)?\$?(\d[\d,]*(?:\.\d+)?)\s*(k|m|thousand|million)?\b",
            ),
            window: re(
                r"\b(?:with)?in\s+(?:the\s+)?(?:last|past)\s+(?:(\d+)\s*)?(days?|weeks?|months?)\b",
            ),
            category: re(&format!(r"\b(?:{category_words})\b")),
        }
    })
}

/// Keywords (longest first within a row) and the raw category they denote.
static PRODUCT_CATEGORIES: &[(&[&str], &str)] = &[
    (&["electronics", "electronic", "gadgets"], "electronics"),
    (&["fashion", "clothing", "clothes", "apparel"], "fashion"),
    (&["groceries", "grocery", "food"], "groceries"),
    (&["beauty", "cosmetics", "skincare"], "beauty"),
    (&["home appliances", "appliances"], "home appliances"),
    (&["sportswear", "sports", "sport"], "sports"),
    (&["books", "book"], "books"),
    (&["toys", "toy"], "toys"),
];

/// First words that mark a locality cue as a time or quantity phrase.
const NON_PLACE_LEADS: &[&str] = &[
    "the", "last", "past", "within", "least", "most", "a", "an", "all", "this",
];

/// Extracts raw entities from `text`. Never fails; may return nothing.
pub fn extract(text: &str) -> Vec<RawEntity> {
    let lowered = text.to_lowercase();
    let normalized = synonyms::apply(&lowered);
    let text = normalized.as_ref();
    let p = patterns();

    let mut entities = Vec::new();
    entities.extend(gender(p, text));
    entities.extend(locality(p, text));
    entities.extend(age_range(p, text));
    entities.extend(frequency(p, text));
    entities.extend(amount(p, text));
    entities.extend(product_category(p, text));
    debug!(count = entities.len(), "extract.entities");
    entities
}

fn attribute(dataset: &'static str, field: &'static str, operator: &'static str, value: Value) -> RawEntity {
    RawEntity::Attribute {
        dataset,
        field,
        operator,
        value,
        value2: Value::Null,
    }
}

fn gender(p: &Patterns, text: &str) -> Option<RawEntity> {
    let caps = p.gender.captures(text)?;
    Some(attribute(CUSTOMERS, "gender", "equals", Value::from(&caps[1])))
}

fn locality(p: &Patterns, text: &str) -> Option<RawEntity> {
    for cue in p.locality_cue.find_iter(text) {
        let rest = &text[cue.end()..];
        if rest.starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        let first_word = rest.split_whitespace().next().unwrap_or_default();
        if NON_PLACE_LEADS.contains(&first_word) {
            continue;
        }
        let end = p
            .span_delimiter
            .find(rest)
            .map(|m| m.start())
            .unwrap_or(rest.len());
        let span = rest[..end].trim();
        if span.chars().count() <= 1 {
            continue;
        }
        return Some(attribute(CUSTOMERS, "city", "equals", Value::from(span)));
    }
    None
}

fn age_range(p: &Patterns, text: &str) -> Option<RawEntity> {
    let caps = p
        .age_prefixed
        .captures(text)
        .or_else(|| p.age_suffixed.captures(text))?;
    let a: i64 = caps[1].parse().ok()?;
    let b: i64 = caps[2].parse().ok()?;
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    Some(RawEntity::Attribute {
        dataset: CUSTOMERS,
        field: "birth_date",
        operator: AGE_BETWEEN,
        value: Value::Int(low),
        value2: Value::Int(high),
    })
}

/// Qualifier precedence follows the order the tokens are checked:
/// at most, then exactly, then the at-least default.
fn qualifier(text: &str) -> FrequencyQualifier {
    if text.contains("at most") {
        FrequencyQualifier::AtMost
    } else if text.contains("exactly") {
        FrequencyQualifier::Exactly
    } else {
        FrequencyQualifier::AtLeast
    }
}

fn time_unit(raw: &str) -> TimeUnit {
    let plural = if raw.ends_with('s') {
        raw.to_string()
    } else {
        format!("{raw}s")
    };
    TimeUnit::parse_or_default(&plural).0
}

fn window_from(count: Option<regex::Match<'_>>, unit: &str) -> Window {
    Window {
        unit: time_unit(unit),
        value: count.and_then(|m| m.as_str().parse().ok()).unwrap_or(1),
    }
}

fn frequency(p: &Patterns, text: &str) -> Option<RawEntity> {
    let caps = p.frequency.captures(text)?;
    let count: i64 = caps[1].parse().ok()?;
    Some(RawEntity::Event {
        event_name: PURCHASE_EVENT,
        measure: EventMeasure::Performed {
            qualifier: qualifier(text),
            count,
            window: window_from(caps.get(2), &caps[3]),
        },
    })
}

fn amount(p: &Patterns, text: &str) -> Option<RawEntity> {
    let caps = p.amount.captures(text)?;
    let operator = match caps.get(1).map(|m| m.as_str()) {
        Some("more than" | "over" | "above") => "greater_than",
        Some("less than" | "under" | "below") => "less_than",
        Some("at most") => "less_than_or_equal",
        Some("exactly") => "equals",
        Some(_) | None => "greater_than_or_equal",
    };
    let base: f64 = caps[2].replace(',', "").parse().ok()?;
    let multiplier = match caps.get(3).map(|m| m.as_str()) {
        Some("k" | "thousand") => 1_000.0,
        Some("m" | "million") => 1_000_000.0,
        _ => 1.0,
    };
    let amount = base * multiplier;
    let value = if amount.fract() == 0.0 && amount.abs() < 9.0e15 {
        Value::Int(amount as i64)
    } else {
        Value::Float(amount)
    };
    let tail = &text[caps.get(0).map_or(0, |m| m.end())..];
    let window = p
        .window
        .captures(tail)
        .map(|w| window_from(w.get(1), &w[2]));
    Some(RawEntity::Event {
        event_name: PURCHASE_EVENT,
        measure: EventMeasure::Amount {
            operator,
            value,
            window,
        },
    })
}

fn product_category(p: &Patterns, text: &str) -> Option<RawEntity> {
    let found = p.category.find(text)?.as_str();
    let raw = PRODUCT_CATEGORIES
        .iter()
        .find(|(words, _)| words.contains(&found))
        .map(|(_, raw)| *raw)?;
    Some(attribute(PRODUCT_LINES, "category", "equals", Value::from(raw)))
}
