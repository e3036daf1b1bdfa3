#![allow(missing_docs)]

use std::sync::Arc;

use segment_criteria::resolve::{ResolutionSource, ResolverCache};
use segment_criteria::{
    CompilerOptions, CriteriaCompiler, InMemoryMappingStore, MappingRecord, MappingStore,
    SqliteMappingStore, StorageTree, StoredCondition, ValueResolver,
};

fn attribute_values(tree: &StorageTree) -> Vec<String> {
    tree.conditions
        .iter()
        .filter_map(|c| match c {
            StoredCondition::Attribute(a) => Some(a.value.clone()),
            StoredCondition::Event(_) => None,
        })
        .collect()
}

#[test]
fn sqlite_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mappings.db");
    {
        let store = SqliteMappingStore::open(&path).unwrap();
        store
            .upsert(&MappingRecord::new("city", "Sài Gòn", "Ho Chi Minh City"))
            .unwrap();
        store
            .upsert(&MappingRecord::new("city", "big apple", "New York"))
            .unwrap();
    }

    let reopened = SqliteMappingStore::open(&path).unwrap();
    assert_eq!(reopened.count().unwrap(), 2);
    assert_eq!(
        reopened.exact("city", "sai gon").unwrap().as_deref(),
        Some("Ho Chi Minh City")
    );
    let inputs: Vec<String> = reopened
        .all_for("city")
        .unwrap()
        .into_iter()
        .map(|r| r.input_value)
        .collect();
    assert_eq!(inputs, ["sai gon", "big apple"]);
}

#[test]
fn resolver_over_sqlite_store() {
    let store = SqliteMappingStore::open_in_memory().unwrap();
    store
        .upsert(&MappingRecord::new("product_category", "electronics", "Electronics"))
        .unwrap();
    let resolver = ValueResolver::new(Arc::new(store), Arc::new(ResolverCache::default()));

    let exact = resolver.resolve_detailed("product_category", "ELECTRONICS", None);
    assert_eq!(exact.value, "Electronics");
    assert_eq!(exact.source, ResolutionSource::Exact);

    let fuzzy = resolver.resolve_detailed("product_category", "electronic", None);
    assert_eq!(fuzzy.value, "Electronics");
    assert!(matches!(fuzzy.source, ResolutionSource::Fuzzy { .. }));

    let rule = resolver.resolve_detailed("gender", "phụ nữ", None);
    assert_eq!(rule.value, "F");
    assert_eq!(rule.source, ResolutionSource::Rule);
}

#[test]
fn compiler_uses_sqlite_mappings() {
    let store = SqliteMappingStore::open_in_memory().unwrap();
    store
        .upsert(&MappingRecord::new("city", "big apple", "New York"))
        .unwrap();
    let compiler = CriteriaCompiler::with_store(
        Arc::new(store),
        CompilerOptions::default().with_current_year(2025),
    );
    let tree = compiler.compile_text("male customers in Big Apple");
    assert_eq!(attribute_values(&tree), ["M", "New York"]);
}

#[test]
fn shared_cache_spans_compilers_of_one_scope() {
    let cache = Arc::new(ResolverCache::new(4, 64));
    let first = CriteriaCompiler::with_store_and_cache(
        Arc::new(InMemoryMappingStore::with_records([MappingRecord::new(
            "city",
            "la",
            "Los Angeles",
        )])),
        Arc::clone(&cache),
        "west",
        CompilerOptions::default(),
    );
    assert_eq!(first.resolver().resolve("city", "LA"), "Los Angeles");
    assert_eq!(cache.get("west", "city", "la").as_deref(), Some("Los Angeles"));

    let second = CriteriaCompiler::with_store_and_cache(
        Arc::new(InMemoryMappingStore::new()),
        Arc::clone(&cache),
        "west",
        CompilerOptions::default(),
    );
    let hit = second.resolver().resolve_detailed("city", "la", None);
    assert_eq!(hit.value, "Los Angeles");
    assert_eq!(hit.source, ResolutionSource::Cache);

    cache.clear();
    assert_eq!(second.resolver().resolve("city", "la"), "La");
}

#[test]
fn tenants_sharing_a_cache_keep_their_own_mappings() {
    let cache = Arc::new(ResolverCache::new(4, 64));
    let tenant = |scope: &str, standard: &str| {
        CriteriaCompiler::with_store_and_cache(
            Arc::new(InMemoryMappingStore::with_records([MappingRecord::new(
                "city", "la", standard,
            )])),
            Arc::clone(&cache),
            scope,
            CompilerOptions::default().with_current_year(2025),
        )
    };
    let us = tenant("tenant-us", "Los Angeles");
    let ng = tenant("tenant-ng", "Lagos");

    assert_eq!(attribute_values(&us.compile_text("customers in LA")), ["Los Angeles"]);
    assert_eq!(attribute_values(&ng.compile_text("customers in LA")), ["Lagos"]);
    assert_eq!(attribute_values(&us.compile_text("customers in LA")), ["Los Angeles"]);
}
