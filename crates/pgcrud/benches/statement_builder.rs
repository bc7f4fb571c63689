//! Benchmark statement building from dynamic JSON input.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pgcrud::{ColumnValues, statement};
use serde_json::{Map, Value, json};

fn row(width: usize) -> ColumnValues {
    let mut object = Map::new();
    for i in 0..width {
        let value = match i % 4 {
            0 => json!(i),
            1 => json!(format!("value-{i}")),
            2 => json!(i % 2 == 0),
            _ => json!({"nested": i}),
        };
        object.insert(format!("col_{i}"), value);
    }
    ColumnValues::from_json(Value::Object(object)).unwrap_or_default()
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    for width in [4, 16, 64] {
        let values = row(width);
        group.bench_with_input(BenchmarkId::from_parameter(width), &values, |b, values| {
            b.iter(|| {
                let sql = statement::insert("public", "bench", black_box(values)).unwrap();
                black_box(sql.to_sql())
            })
        });
    }
    group.finish();
}

fn bench_update(c: &mut Criterion) {
    let set = row(8);
    let condition = ColumnValues::new().with("id", 42).with("tenant", "acme");
    c.bench_function("update/8+2", |b| {
        b.iter(|| {
            let sql = statement::update("public", "bench", black_box(&set), Some(&condition)).unwrap();
            black_box((sql.to_sql(), sql.typed_params().len()))
        })
    });
}

fn bench_normalize(c: &mut Criterion) {
    let doc = json!({"id": 1, "name": "John", "score": 9.5, "tags": ["a", "b"], "big": 9_000_000_000i64});
    c.bench_function("normalize/json_object", |b| {
        b.iter(|| ColumnValues::from_json(black_box(doc.clone())))
    });
}

criterion_group!(benches, bench_insert, bench_update, bench_normalize);
criterion_main!(benches);
