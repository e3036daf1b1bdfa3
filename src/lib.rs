//! Segment criteria compiler.
//!
//! Turns a customer-segmentation request, either free text or a structured
//! tree from an external generator, into a canonical storage tree and a
//! parameterized SQL predicate over the customers / transactions /
//! product_lines / stores schema.

pub mod canonical;
pub mod criteria;
pub mod error;
pub mod explain;
pub mod extract;
pub mod mapper;
pub mod normalize;
pub mod options;
pub mod pipeline;
pub mod resolve;
pub mod sql;
pub mod vocab;

pub use canonical::{canonicalize, StorageTree, StoredAttribute, StoredCondition, StoredEvent, StoredGroup};
pub use criteria::{
    AttributeCondition, Condition, ConditionGroup, CriteriaTree, EventCondition, LogicOperator,
    Value,
};
pub use error::{CompileError, CriteriaError, GeneratorError, MappingStoreError};
pub use options::CompilerOptions;
pub use pipeline::{CompileOutcome, CriteriaCompiler, CriteriaGenerator, GeneratorReply};
pub use resolve::{
    InMemoryMappingStore, MappingRecord, MappingStore, ResolverCache, SqliteMappingStore, ValueResolver,
};
pub use sql::{CompiledPredicate, Dialect};
