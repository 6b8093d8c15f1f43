use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use myorm::{AdapterRegistry, MySqlDialect, Select, Table, WhereCondition};
use std::sync::Arc;

/// Build a Select over `t` with `n` columns and `n` single-condition OR groups:
/// SELECT `t`.`col0` AS 't.col0', ... FROM `t` WHERE `t`.`col0` = 0 OR ...
fn build_select(n: usize) -> Select {
    let table = Table::new("t").expect("valid table name");
    let mut select = Select::new(AdapterRegistry::new(), table, Arc::new(MySqlDialect));
    for i in 0..n {
        select.add_column(format!("col{i}")).expect("valid column");
    }
    for i in 0..n {
        select
            .where_([WhereCondition::eq("t", format!("col{i}"), i as i64)])
            .expect("valid condition");
    }
    select
}

fn bench_to_sql(c: &mut Criterion) {
    let mut group = c.benchmark_group("select/to_sql");

    for n in [1, 5, 10, 50, 100] {
        let select = build_select(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &select, |b, select| {
            b.iter(|| black_box(select.to_sql()));
        });
    }

    group.finish();
}

fn bench_build_and_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("select/build_and_render");

    for n in [1, 5, 10, 50, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let select = build_select(n);
                black_box(select.build().expect("valid select"));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_to_sql, bench_build_and_render);
criterion_main!(benches);
