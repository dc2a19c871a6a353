use criterion::{criterion_group, criterion_main, Criterion};
use dbframe::cache::EstimateSize;
use dbframe::{CachedValue, Predicate, TableSchema, Value};

fn schema() -> TableSchema {
    TableSchema::new(
        "trees",
        [
            ("id", "INTEGER"),
            ("species", "TEXT"),
            ("height", "REAL"),
            ("planted", "TEXT"),
        ],
    )
}

fn wide_predicate(t: &TableSchema, terms: usize) -> Predicate {
    let id = t.column("id").unwrap();
    let species = t.column("species").unwrap();
    let height = t.column("height").unwrap();
    let mut p = Predicate::not_null(height);
    for i in 0..terms as i64 {
        let leaf = (Predicate::gt(id, i).unwrap() & Predicate::between(height, i, i + 5).unwrap())
            | Predicate::is_in(species, ["oak", "ash", "elm"]).unwrap();
        p = p & !leaf;
    }
    p
}

fn bench_predicate_compile(c: &mut Criterion) {
    let t = schema();
    let pred = wide_predicate(&t, 64);
    c.bench_function("predicate_compile_64", |b| {
        b.iter(|| {
            let _ = pred.compile(&t).unwrap();
        })
    });
}

fn bench_size_estimate(c: &mut Criterion) {
    let counts = CachedValue::Counts(
        (0..4096)
            .map(|i| (Value::Text(format!("species-{}", i % 300)), i))
            .collect(),
    );
    let seq = CachedValue::Sequence((0..4096).map(|i| Value::Float(i as f64 * 0.5)).collect());
    c.bench_function("estimate_counts_4096", |b| {
        b.iter(|| counts.estimated_size())
    });
    c.bench_function("estimate_sequence_4096", |b| b.iter(|| seq.estimated_size()));
}

criterion_group!(benches, bench_predicate_compile, bench_size_estimate);
criterion_main!(benches);
