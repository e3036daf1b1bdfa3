//! Whole-word synonym substitution applied before pattern matching.
//!
//! Maps Vietnamese cue words and common English variants onto the small
//! English vocabulary the extraction patterns understand. Longer phrases are
//! tried first so "phụ nữ" wins over "nữ". Bare "nam" is left alone: it is
//! also part of place names such as "Nam Định" and "Hà Nam".

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

static SYNONYMS: &[(&str, &str)] = &[
    // customers / gender
    ("khách hàng", "customers"),
    ("phụ nữ", "female"),
    ("đàn ông", "male"),
    ("nam giới", "male"),
    ("nữ", "female"),
    ("women", "female"),
    ("woman", "female"),
    ("ladies", "female"),
    ("lady", "female"),
    ("girls", "female"),
    ("men", "male"),
    ("man", "male"),
    ("gentlemen", "male"),
    ("boys", "male"),
    // locality
    ("sống ở", "living in"),
    ("sống tại", "living in"),
    ("ở", "in"),
    ("tại", "in"),
    // purchasing
    ("mua hàng", "purchased"),
    ("mua", "purchased"),
    ("bought", "purchased"),
    ("buy", "purchased"),
    ("purchase", "purchased"),
    ("ordered", "purchased"),
    ("shopped", "purchased"),
    ("once", "1 time"),
    ("twice", "2 times"),
    ("lần", "times"),
    ("trong vòng", "within"),
    ("trong", "in"),
    ("gần đây", "last"),
    ("qua", "last"),
    ("ngày", "days"),
    ("tuần", "weeks"),
    ("tháng", "months"),
    // qualifiers
    ("ít nhất", "at least"),
    ("tối thiểu", "at least"),
    ("nhiều nhất", "at most"),
    ("tối đa", "at most"),
    ("đúng", "exactly"),
    // ages
    ("từ", "from"),
    ("đến", "to"),
    ("tới", "to"),
    ("tuổi", "years old"),
    // spending
    ("chi tiêu", "spent"),
    ("tiêu", "spent"),
    ("spend", "spent"),
    ("trên", "over"),
    ("dưới", "under"),
    // product categories
    ("điện tử", "electronics"),
    ("thời trang", "fashion"),
    ("mỹ phẩm", "beauty"),
    ("thực phẩm", "groceries"),
    ("đồ gia dụng", "home appliances"),
    ("thể thao", "sports"),
    ("sách", "books"),
    ("đồ chơi", "toys"),
];

struct SynonymTable {
    pattern: Regex,
    replacements: HashMap<&'static str, &'static str>,
}

fn table() -> &'static SynonymTable {
    static TABLE: OnceLock<SynonymTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut phrases: Vec<&str> = SYNONYMS.iter().map(|(from, _)| *from).collect();
        phrases.sort_by_key(|p| std::cmp::Reverse(p.chars().count()));
        let alternation = phrases
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");
        SynonymTable {
            pattern: Regex::new(&format!(r"\b(?:{alternation})\b")).expect("static synonym pattern"),
            replacements: SYNONYMS.iter().copied().collect(),
        }
    })
}

/// Replaces every whole-word synonym in already lower-cased text.
pub fn apply(text: &str) -> Cow<'_, str> {
    let table = table();
    table.pattern.replace_all(text, |caps: &Captures<'_>| {
        let matched = &caps[0];
        table
            .replacements
            .get(matched)
            .copied()
            .unwrap_or(matched)
            .to_string()
    })
}
