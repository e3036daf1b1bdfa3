#![forbid(unsafe_code)]

//! Orchestration of the compile pipeline.
//!
//! text -> extract -> map, or an external generator's tree, then
//! normalize -> canonicalize, and optionally compile to SQL.

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::canonical::{canonicalize, StorageTree};
use crate::criteria::CriteriaTree;
use crate::error::{CompileError, GeneratorError};
use crate::extract::{extract, RawEntity};
use crate::mapper::Mapper;
use crate::normalize::Normalizer;
use crate::options::CompilerOptions;
use crate::resolve::{InMemoryMappingStore, MappingStore, ResolverCache, ValueResolver};
use crate::sql::{compile, CompiledPredicate};

/// External natural-language-to-criteria collaborator.
pub trait CriteriaGenerator {
    /// Produces a criteria tree for `text` or declines. `Err` is reserved
    /// for technical failures.
    fn generate(&self, text: &str) -> Result<GeneratorReply, GeneratorError>;
}

/// What a generator answered.
#[derive(Clone, Debug, PartialEq)]
pub enum GeneratorReply {
    Criteria(CriteriaTree),
    Rejected { message: String },
}

#[derive(Deserialize)]
struct RejectionEnvelope {
    #[serde(default)]
    rejected: bool,
    #[serde(default)]
    message: String,
}

impl GeneratorReply {
    /// Parses a raw reply: `{"rejected": true, "message": ...}` or an
    /// input-contract tree.
    pub fn from_json_str(raw: &str) -> Result<Self, GeneratorError> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        if !value.is_object() {
            return Err(GeneratorError::MalformedReply(
                <serde_json::Error as serde::de::Error>::custom("reply is not a JSON object"),
            ));
        }
        let envelope = RejectionEnvelope::deserialize(&value)?;
        if envelope.rejected {
            return Ok(GeneratorReply::Rejected {
                message: envelope.message,
            });
        }
        Ok(GeneratorReply::Criteria(CriteriaTree::from_json(&value)))
    }
}

/// Result of a compile that may be declined upstream.
#[derive(Clone, Debug, PartialEq)]
pub enum CompileOutcome {
    Compiled(StorageTree),
    Rejected { message: String },
}

/// Owns a resolver and runs the pipeline stages with one set of options.
pub struct CriteriaCompiler {
    resolver: ValueResolver,
    options: CompilerOptions,
}

impl CriteriaCompiler {
    /// Compiler backed by an empty in-memory mapping store.
    pub fn new(options: CompilerOptions) -> Self {
        Self::with_store(Arc::new(InMemoryMappingStore::new()), options)
    }

    pub fn with_store(store: Arc<dyn MappingStore>, options: CompilerOptions) -> Self {
        let cache = Arc::new(ResolverCache::new(
            options.cache_shards,
            options.cache_capacity,
        ));
        Self::with_store_and_cache(store, cache, "", options)
    }

    /// Shares `cache` with other compilers. Entries are keyed by `scope`, so
    /// compilers over different stores (one per tenant, say) must pass
    /// different scopes; compilers over the same store may share one.
    pub fn with_store_and_cache(
        store: Arc<dyn MappingStore>,
        cache: Arc<ResolverCache>,
        scope: impl Into<String>,
        options: CompilerOptions,
    ) -> Self {
        let resolver = ValueResolver::new(store, cache)
            .with_scope(scope)
            .with_threshold(options.fuzzy_threshold);
        Self { resolver, options }
    }

    pub fn resolver(&self) -> &ValueResolver {
        &self.resolver
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    fn current_year(&self) -> i32 {
        self.options
            .current_year
            .unwrap_or_else(|| OffsetDateTime::now_utc().year())
    }

    fn deadline(&self) -> Option<Instant> {
        self.options
            .lookup_budget
            .and_then(|budget| Instant::now().checked_add(budget))
    }

    pub fn extract(&self, text: &str) -> Vec<RawEntity> {
        extract(text)
    }

    pub fn map(&self, entities: &[RawEntity]) -> CriteriaTree {
        Mapper::new(&self.resolver, self.current_year())
            .with_deadline(self.deadline())
            .map(entities)
    }

    pub fn normalize(&self, tree: &CriteriaTree) -> CriteriaTree {
        Normalizer::new(&self.resolver, self.current_year())
            .with_deadline(self.deadline())
            .normalize(tree)
    }

    pub fn canonicalize(&self, tree: &CriteriaTree) -> StorageTree {
        canonicalize(tree)
    }

    /// Deterministic path: extract, map, normalize, canonicalize.
    pub fn compile_text(&self, text: &str) -> StorageTree {
        let entities = self.extract(text);
        let tree = self.map(&entities);
        self.compile_tree(&tree)
    }

    /// Normalizes and canonicalizes an input-contract tree.
    pub fn compile_tree(&self, tree: &CriteriaTree) -> StorageTree {
        let normalized = self.normalize(tree);
        let stored = canonicalize(&normalized);
        debug!(size = stored.size, root = %stored.root_operator, "pipeline.compiled");
        stored
    }

    /// Lenient path for untyped payloads; malformed input yields the empty
    /// tree.
    pub fn compile_json(&self, raw: &serde_json::Value) -> StorageTree {
        let normalized = Normalizer::new(&self.resolver, self.current_year())
            .with_deadline(self.deadline())
            .normalize_json(raw);
        canonicalize(&normalized)
    }

    /// Asks `generator` first. A rejection is passed through; a technical
    /// failure falls back to the deterministic extractor.
    pub fn compile_with_generator(
        &self,
        text: &str,
        generator: &dyn CriteriaGenerator,
    ) -> CompileOutcome {
        match generator.generate(text) {
            Ok(GeneratorReply::Criteria(tree)) => CompileOutcome::Compiled(self.compile_tree(&tree)),
            Ok(GeneratorReply::Rejected { message }) => {
                warn!(%message, "pipeline.generator_rejected");
                CompileOutcome::Rejected { message }
            }
            Err(err) => {
                warn!(error = %err, "pipeline.generator_failed");
                CompileOutcome::Compiled(self.compile_text(text))
            }
        }
    }

    /// Compiles a storage tree with the configured dialect.
    pub fn compile_sql(&self, tree: &StorageTree) -> Result<CompiledPredicate, CompileError> {
        compile(tree, self.options.dialect)
    }
}

impl Default for CriteriaCompiler {
    fn default() -> Self {
        Self::new(CompilerOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::StoredCondition;

    struct Scripted(Result<&'static str, &'static str>);

    impl CriteriaGenerator for Scripted {
        fn generate(&self, _: &str) -> Result<GeneratorReply, GeneratorError> {
            match self.0 {
                Ok(raw) => GeneratorReply::from_json_str(raw),
                Err(reason) => Err(GeneratorError::Unavailable(reason.to_string())),
            }
        }
    }

    fn compiler() -> CriteriaCompiler {
        CriteriaCompiler::new(CompilerOptions::default().with_current_year(2025))
    }

    #[test]
    fn rejection_is_not_an_error() {
        let outcome = compiler().compile_with_generator(
            "who will churn next year",
            &Scripted(Ok(r#"{"rejected": true, "message": "cannot predict churn"}"#)),
        );
        assert_eq!(
            outcome,
            CompileOutcome::Rejected {
                message: "cannot predict churn".into()
            }
        );
    }

    #[test]
    fn generator_tree_is_normalized() {
        let outcome = compiler().compile_with_generator(
            "ignored",
            &Scripted(Ok(
                r#"{"logic_operator":"or","conditions":[{"field":"gender","operator":"Equals","value":"nữ"}]}"#,
            )),
        );
        let CompileOutcome::Compiled(tree) = outcome else {
            panic!("expected compiled tree");
        };
        assert_eq!(tree.root_operator.as_str(), "OR");
        let StoredCondition::Attribute(a) = &tree.conditions[0] else {
            panic!("expected attribute");
        };
        assert_eq!((a.operator.as_str(), a.value.as_str()), ("equals", "F"));
    }

    #[test]
    fn technical_failure_falls_back_to_extractor() {
        let outcome = compiler()
            .compile_with_generator("male customers", &Scripted(Err("connection refused")));
        let CompileOutcome::Compiled(tree) = outcome else {
            panic!("expected compiled tree");
        };
        assert_eq!(tree.size, 1);
    }

    #[test]
    fn malformed_reply_is_a_technical_error() {
        assert!(matches!(
            GeneratorReply::from_json_str("[1,2]"),
            Err(GeneratorError::MalformedReply(_))
        ));
        assert!(GeneratorReply::from_json_str("not json").is_err());
    }

    #[test]
    fn non_object_payload_compiles_to_empty_tree() {
        let tree = compiler().compile_json(&serde_json::json!(null));
        assert_eq!(tree, StorageTree::empty());
        assert_eq!(compiler().compile_sql(&tree).unwrap().sql, "TRUE");
    }
}
