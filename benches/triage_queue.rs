//! Benchmark for aggregation and triage ordering

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use sla_triage::engine::{aggregate, triage, SortBy, ThresholdPolicy, TriageQuery};
use sla_triage::models::{Case, CaseStatus, Priority, SlaRecord, SlaTargets};
use uuid::Uuid;

fn create_fleet(size: usize) -> (Vec<Case>, Vec<SlaRecord>) {
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
    let priorities = [Priority::High, Priority::Medium, Priority::Low];

    (0..size)
        .map(|n| {
            let case = Case {
                id: Uuid::from_u128(n as u128),
                protocol: format!("PRT-{:06}", n),
                customer_name: format!("Customer {}", n % 500),
                case_type: ["billing", "technical", "outage"][n % 3].to_string(),
                priority: priorities[n % 3],
                status: CaseStatus::InProgress,
                created_at: t0 + Duration::minutes((n % 600) as i64),
            };
            let mut record = SlaRecord::new(&case, SlaTargets::new(60, 480));
            if n % 4 == 0 {
                let _ = record.pause(case.created_at + Duration::minutes(10), "customer");
                let _ = record.resume(case.created_at + Duration::minutes(40));
            }
            (case, record)
        })
        .unzip()
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");
    group.throughput(Throughput::Elements(10_000));

    let (_, records) = create_fleet(10_000);
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 16, 0, 0).unwrap();
    let policy = ThresholdPolicy::default();

    group.bench_function("aggregate_10000_records", |b| {
        b.iter(|| black_box(aggregate(black_box(&records), now, &policy)));
    });

    group.finish();
}

fn bench_triage(c: &mut Criterion) {
    let mut group = c.benchmark_group("triage");
    group.throughput(Throughput::Elements(10_000));

    let (cases, records) = create_fleet(10_000);
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 16, 0, 0).unwrap();
    let report = aggregate(&records, now, &ThresholdPolicy::default());

    for (name, query) in [
        ("sort_by_sla", TriageQuery::default()),
        (
            "sort_by_priority_with_search",
            TriageQuery {
                sort_by: SortBy::Priority,
                search: Some("customer 4".to_string()),
                ..TriageQuery::default()
            },
        ),
    ] {
        group.bench_function(name, |b| {
            b.iter_batched(
                || cases.clone(),
                |cases| black_box(triage(cases, &report, &query)),
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_aggregate, bench_triage);
criterion_main!(benches);
