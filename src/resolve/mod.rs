#![forbid(unsafe_code)]

//! Value resolver: turns free-form spellings into standard values.
//!
//! Resolution order, first success wins:
//! 1. exact match in the mapping store for the category,
//! 2. fuzzy match (Sørensen–Dice) against every stored input of the category,
//! 3. the category's ordered rule table,
//! 4. pass-through of the normalized input.
//!
//! [`ValueResolver::standardize_within`] first keeps values that already are
//! a standard value of the category, so standardizing is idempotent.
//!
//! The resolver never fails. A store error or an exhausted lookup budget
//! degrades to steps 3–4 and is logged; degraded answers are not memoized.

pub mod cache;
pub mod rules;
pub mod store;

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace, warn};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

pub use cache::ResolverCache;
pub use store::{InMemoryMappingStore, MappingRecord, MappingStore, SqliteMappingStore};

/// Default minimum similarity for a fuzzy match.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.8;

/// Trim, lowercase, strip diacritics, collapse inner whitespace.
pub fn normalize_text(raw: &str) -> String {
    let stripped: String = raw
        .trim()
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if c == 'đ' { 'd' } else { c })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Which step produced a resolved value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ResolutionSource {
    Cache,
    Exact,
    Fuzzy { score: f64 },
    Rule,
    PassThrough,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub value: String,
    pub source: ResolutionSource,
    /// Store was skipped or failed; the answer may change once it recovers.
    pub degraded: bool,
}

pub struct ValueResolver {
    store: Arc<dyn MappingStore>,
    cache: Arc<ResolverCache>,
    scope: String,
    fuzzy_threshold: f64,
}

impl ValueResolver {
    pub fn new(store: Arc<dyn MappingStore>, cache: Arc<ResolverCache>) -> Self {
        Self {
            store,
            cache,
            scope: String::new(),
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }

    /// Resolver with an empty in-memory store and a private cache.
    pub fn standalone() -> Self {
        Self::new(
            Arc::new(InMemoryMappingStore::new()),
            Arc::new(ResolverCache::default()),
        )
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.fuzzy_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Cache scope for this resolver's store. Resolvers over different
    /// stores that share a cache need distinct scopes.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn cache(&self) -> &Arc<ResolverCache> {
        &self.cache
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Standard value for `raw` in `category`.
    pub fn resolve(&self, category: &str, raw: &str) -> String {
        self.resolve_detailed(category, raw, None).value
    }

    /// Like [`resolve`](Self::resolve), skipping the store once `deadline`
    /// has passed.
    pub fn resolve_within(&self, category: &str, raw: &str, deadline: Option<Instant>) -> String {
        self.resolve_detailed(category, raw, deadline).value
    }

    /// Keeps `raw` when it already is a standard value of `category` (a rule
    /// standard or a store mapping's standard value), otherwise resolves it.
    pub fn standardize_within(
        &self,
        category: &str,
        raw: &str,
        deadline: Option<Instant>,
    ) -> String {
        if self.is_standard(category, raw, deadline) {
            trace!(category, value = raw, "resolve.already_standard");
            return raw.to_string();
        }
        self.resolve_within(category, raw, deadline)
    }

    fn is_standard(&self, category: &str, value: &str, deadline: Option<Instant>) -> bool {
        if rules::rule_set(category).is_some_and(|set| set.is_standard(value)) {
            return true;
        }
        if expired(deadline) {
            return false;
        }
        match self.store.has_standard(category, value) {
            Ok(found) => found,
            Err(err) => {
                warn!(category, stage = "standard", error = %err, "resolve.store_unavailable");
                false
            }
        }
    }

    pub fn resolve_detailed(
        &self,
        category: &str,
        raw: &str,
        deadline: Option<Instant>,
    ) -> Resolution {
        let normalized = normalize_text(raw);
        if normalized.is_empty() {
            return Resolution {
                value: normalized,
                source: ResolutionSource::PassThrough,
                degraded: false,
            };
        }
        if let Some(value) = self.cache.get(&self.scope, category, &normalized) {
            trace!(category, input = %normalized, "resolve.cache_hit");
            return Resolution {
                value,
                source: ResolutionSource::Cache,
                degraded: false,
            };
        }

        let (stored, degraded) = self.lookup_store(category, &normalized, deadline);
        let resolution = match stored {
            Some((value, source)) => Resolution {
                value,
                source,
                degraded,
            },
            None => match rules::rule_set(category).and_then(|set| set.apply(&normalized)) {
                Some(value) => Resolution {
                    value,
                    source: ResolutionSource::Rule,
                    degraded,
                },
                None => Resolution {
                    value: normalized.clone(),
                    source: ResolutionSource::PassThrough,
                    degraded,
                },
            },
        };
        if !resolution.degraded {
            self.cache
                .insert(&self.scope, category, &normalized, resolution.value.clone());
        }
        resolution
    }

    /// Exact then fuzzy lookup. The flag reports a degraded lookup.
    fn lookup_store(
        &self,
        category: &str,
        normalized: &str,
        deadline: Option<Instant>,
    ) -> (Option<(String, ResolutionSource)>, bool) {
        if expired(deadline) {
            warn!(category, stage = "exact", "resolve.deadline_exceeded");
            return (None, true);
        }
        match self.store.exact(category, normalized) {
            Ok(Some(value)) => return (Some((value, ResolutionSource::Exact)), false),
            Ok(None) => {}
            Err(err) => {
                warn!(category, stage = "exact", error = %err, "resolve.store_unavailable");
                return (None, true);
            }
        }
        if expired(deadline) {
            warn!(category, stage = "fuzzy", "resolve.deadline_exceeded");
            return (None, true);
        }
        let records = match self.store.all_for(category) {
            Ok(records) => records,
            Err(err) => {
                warn!(category, stage = "fuzzy", error = %err, "resolve.store_unavailable");
                return (None, true);
            }
        };
        let mut best: Option<(f64, String)> = None;
        for record in records {
            let score = strsim::sorensen_dice(normalized, &normalize_text(&record.input_value));
            if best.as_ref().map_or(true, |(top, _)| score > *top) {
                best = Some((score, record.standard_value));
            }
        }
        match best {
            Some((score, value)) if score >= self.fuzzy_threshold => {
                debug!(category, input = %normalized, score, standard = %value, "resolve.fuzzy_match");
                (Some((value, ResolutionSource::Fuzzy { score })), false)
            }
            _ => (None, false),
        }
    }
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}
