use criterion::{
    BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main,
};

use std::sync::Arc;

use bakehouse_bakery::{BankAccount, Bakery, Employee, Task};
use bakehouse_infra::{InMemoryBackend, IntegrityEngine};
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;

/// Bakery with `staff` employees, each holding three tasks and a bank account.
fn populated_bakery(staff: usize) -> Bakery {
    let now = Utc::now();
    let mut bakery = Bakery::new("Central", "12345678000199").with_postal_code("50000-000");
    for n in 0..staff {
        let mut member = Employee::new(format!("Padeiro {}", "x".repeat(n % 40 + 1)), "Padeiro")
            .with_documents("123.456.789-09", "equipe@padaria.com")
            .with_salary(Decimal::new(180_000, 2))
            .with_hire_date(NaiveDate::from_ymd_opt(2021, 3, 1).unwrap());
        for _ in 0..3 {
            member.assign(Task::new("Preparar massa", now, now + Duration::days(3)));
        }
        member.set_bank_account(BankAccount::new("Banco do Brasil", "1234-5", "99887-6"));
        bakery.hire(member);
    }
    bakery
}

fn engine() -> IntegrityEngine<InMemoryBackend> {
    IntegrityEngine::new(InMemoryBackend::new()).unwrap()
}

fn bench_cascade_save(c: &mut Criterion) {
    let mut group = c.benchmark_group("cascade_save");

    for staff in [1usize, 10, 50] {
        // bakery + staff × (employee + 3 tasks + account)
        group.throughput(Throughput::Elements((1 + staff * 5) as u64));
        group.bench_with_input(BenchmarkId::new("populated_bakery", staff), &staff, |b, &staff| {
            b.iter_batched(
                || (engine(), populated_bakery(staff)),
                |(engine, mut bakery)| {
                    black_box(engine.save(&mut bakery).unwrap());
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_cascade_delete(c: &mut Criterion) {
    let mut group = c.benchmark_group("cascade_delete");

    for staff in [1usize, 10, 50] {
        group.throughput(Throughput::Elements((1 + staff * 5) as u64));
        group.bench_with_input(BenchmarkId::new("populated_bakery", staff), &staff, |b, &staff| {
            b.iter_batched(
                || {
                    let engine = engine();
                    let mut bakery = populated_bakery(staff);
                    engine.save(&mut bakery).unwrap();
                    (engine, bakery)
                },
                |(engine, bakery)| {
                    engine.delete(&bakery).unwrap();
                    black_box(engine);
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_index_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("index_rebuild");

    for staff in [10usize, 100] {
        let backend = Arc::new(InMemoryBackend::new());
        IntegrityEngine::new(backend.clone())
            .unwrap()
            .save(&mut populated_bakery(staff))
            .unwrap();

        group.bench_with_input(BenchmarkId::new("from_backend", staff), &backend, |b, backend| {
            b.iter(|| black_box(IntegrityEngine::new(backend.clone()).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_cascade_save,
    bench_cascade_delete,
    bench_index_rebuild
);
criterion_main!(benches);
