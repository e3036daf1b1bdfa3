#![forbid(unsafe_code)]

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use segment_criteria::{
    CompilerOptions, CriteriaCompiler, Dialect, InMemoryMappingStore, MappingRecord,
};

const SENTENCES: &[(&str, &str)] = &[
    ("gender_city", "female customers in Los Angeles"),
    (
        "frequency",
        "male customers aged 25 to 35 who purchased at least 3 times in the last 2 months",
    ),
    ("amount", "customers who spent over 2 million in the past 6 months"),
    ("vietnamese", "khách hàng nữ ở Hà Nội từ 25 đến 35 tuổi"),
];

fn compile_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline/compile_text");
    group.throughput(Throughput::Elements(1));
    for dialect in [Dialect::Postgres, Dialect::Sqlite] {
        let compiler = seeded_compiler(dialect);
        for (name, text) in SENTENCES {
            group.bench_with_input(
                BenchmarkId::new(dialect.as_str(), name),
                text,
                |b, text| {
                    b.iter(|| {
                        let tree = compiler.compile_text(black_box(text));
                        compiler.compile_sql(&tree).map(|compiled| compiled.params.len())
                    });
                },
            );
        }
    }
    group.finish();

    let mut group = c.benchmark_group("pipeline/compile_sql");
    let compiler = seeded_compiler(Dialect::Postgres);
    let trees: Vec<_> = SENTENCES
        .iter()
        .map(|(name, text)| (*name, compiler.compile_text(text)))
        .collect();
    for (name, tree) in &trees {
        group.bench_with_input(BenchmarkId::from_parameter(name), tree, |b, tree| {
            b.iter(|| compiler.compile_sql(black_box(tree)));
        });
    }
    group.finish();
}

fn seeded_compiler(dialect: Dialect) -> CriteriaCompiler {
    let store = InMemoryMappingStore::with_records((0..500).map(|i| {
        MappingRecord::new("city", &format!("district {i}"), format!("District {i}"))
    }));
    CriteriaCompiler::with_store(
        Arc::new(store),
        CompilerOptions::default()
            .with_dialect(dialect)
            .with_current_year(2025),
    )
}

criterion_group!(benches, compile_pipeline);
criterion_main!(benches);
