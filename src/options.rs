use std::time::Duration;

use crate::resolve::DEFAULT_FUZZY_THRESHOLD;
use crate::sql::Dialect;

/// Tuning knobs for a [`CriteriaCompiler`](crate::pipeline::CriteriaCompiler).
#[derive(Clone, Debug, PartialEq)]
pub struct CompilerOptions {
    /// Minimum Sørensen–Dice score accepted as a fuzzy match (inclusive).
    pub fuzzy_threshold: f64,
    /// Total resolver cache entries across all shards.
    pub cache_capacity: usize,
    /// Number of independently locked cache shards.
    pub cache_shards: usize,
    /// Time allowed for mapping-store lookups per compile call. Once spent,
    /// the resolver skips the store and uses rules or pass-through.
    pub lookup_budget: Option<Duration>,
    /// Dialect used by `compile_sql`.
    pub dialect: Dialect,
    /// Year used for age-range arithmetic; the current UTC year when unset.
    pub current_year: Option<i32>,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            cache_capacity: 4096,
            cache_shards: 8,
            lookup_budget: None,
            dialect: Dialect::Postgres,
            current_year: None,
        }
    }
}

impl CompilerOptions {
    pub fn with_fuzzy_threshold(mut self, threshold: f64) -> Self {
        self.fuzzy_threshold = threshold;
        self
    }

    pub fn with_cache(mut self, capacity: usize, shards: usize) -> Self {
        self.cache_capacity = capacity;
        self.cache_shards = shards;
        self
    }

    pub fn with_lookup_budget(mut self, budget: Duration) -> Self {
        self.lookup_budget = Some(budget);
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_current_year(mut self, year: i32) -> Self {
        self.current_year = Some(year);
        self
    }
}
