//! Declarative standardization rules.
//!
//! Each mapping category owns an ordered rule list; the first rule whose
//! pattern matches the normalized input wins. Categories without a rule set
//! (or whose rules all miss) fall through to the category's fallback.

use crate::vocab::schema::category;

/// How a rule pattern is compared with the normalized input.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MatchKind {
    /// Pattern appears anywhere in the input.
    Contains,
    /// Pattern equals the whole input.
    Exact,
}

#[derive(Debug)]
pub struct Rule {
    pub patterns: &'static [&'static str],
    pub kind: MatchKind,
    pub standard: &'static str,
}

/// What happens when no rule matches.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Fallback {
    /// Caller passes the normalized input through unchanged.
    PassThrough,
    /// Every word is capitalized (place names).
    TitleCase,
}

#[derive(Debug)]
pub struct RuleSet {
    pub category: &'static str,
    pub rules: &'static [Rule],
    pub fallback: Fallback,
}

const fn contains(patterns: &'static [&'static str], standard: &'static str) -> Rule {
    Rule {
        patterns,
        kind: MatchKind::Contains,
        standard,
    }
}

const fn exact(patterns: &'static [&'static str], standard: &'static str) -> Rule {
    Rule {
        patterns,
        kind: MatchKind::Exact,
        standard,
    }
}

// Female patterns precede male ones: "female" and "woman" contain "male"
// and "man".
static RULE_SETS: &[RuleSet] = &[
    RuleSet {
        category: category::GENDER,
        rules: &[
            contains(&["female", "woman", "women", "girl", "lady", "nu"], "F"),
            exact(&["f"], "F"),
            contains(&["male", "man", "men", "boy", "nam"], "M"),
            exact(&["m"], "M"),
        ],
        fallback: Fallback::PassThrough,
    },
    RuleSet {
        category: category::PAYMENT_METHOD,
        rules: &[
            contains(&["cash", "tien mat"], "Cash"),
            contains(&["e-wallet", "ewallet", "wallet", "momo", "zalopay", "vi dien tu"], "E-Wallet"),
            contains(&["credit", "debit", "card", "the tin dung"], "Card"),
            contains(&["transfer", "chuyen khoan"], "Bank Transfer"),
        ],
        fallback: Fallback::PassThrough,
    },
    RuleSet {
        category: category::STORE_TYPE,
        rules: &[
            contains(&["supermarket", "sieu thi"], "Supermarket"),
            contains(&["convenience", "tien loi"], "Convenience Store"),
            contains(&["mall", "trung tam thuong mai"], "Shopping Mall"),
            contains(&["online", "truc tuyen"], "Online"),
        ],
        fallback: Fallback::PassThrough,
    },
    RuleSet {
        category: category::CITY,
        rules: &[
            exact(
                &["hcm", "tphcm", "saigon", "sai gon", "ho chi minh", "ho chi minh city"],
                "Ho Chi Minh City",
            ),
            exact(&["hn", "hanoi", "ha noi"], "Ha Noi"),
        ],
        fallback: Fallback::TitleCase,
    },
];

/// Rule set registered for `category`.
pub fn rule_set(category: &str) -> Option<&'static RuleSet> {
    RULE_SETS.iter().find(|set| set.category == category)
}

impl Rule {
    fn matches(&self, normalized: &str) -> bool {
        self.patterns.iter().any(|pattern| match self.kind {
            MatchKind::Contains => normalized.contains(pattern),
            MatchKind::Exact => normalized == *pattern,
        })
    }
}

impl RuleSet {
    /// Whether `value` is, verbatim, the standard value of one of the rules.
    pub fn is_standard(&self, value: &str) -> bool {
        self.rules.iter().any(|rule| rule.standard == value)
    }

    /// Applies the rules, then the fallback. `None` means pass-through.
    pub fn apply(&self, normalized: &str) -> Option<String> {
        if let Some(rule) = self.rules.iter().find(|rule| rule.matches(normalized)) {
            return Some(rule.standard.to_string());
        }
        match self.fallback {
            Fallback::PassThrough => None,
            Fallback::TitleCase => Some(title_case(normalized)),
        }
    }
}

/// Capitalizes the first letter of every word; hyphenated parts count as
/// words. Idempotent on its own output.
pub fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut at_word_start = true;
    for ch in input.chars() {
        if ch.is_whitespace() || ch == '-' {
            at_word_start = true;
            out.push(ch);
        } else if at_word_start {
            out.extend(ch.to_uppercase());
            at_word_start = false;
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    out
}
