//! Criterion benchmarks for the dispatch hot path.
//!
//! Run with: `cargo bench -p pricespan-runner`
//!
//! The provider is in-memory, so these measure pool setup, task spawn,
//! aggregation and table appends rather than network time.

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use pricespan_core::aggregate;
use pricespan_core::data::{DataError, HistoryProvider, RetryPolicy};
use pricespan_core::domain::{
    DateRange, InstrumentClass, Market, PricePoint, PriceSeries, QueryVariant, SymbolRecord,
};
use pricespan_runner::{DispatchEngine, ResultTable, SilentProgress};

/// Two years of synthetic daily closes per symbol.
struct SyntheticHistory;

impl HistoryProvider for SyntheticHistory {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn query_history(
        &self,
        code: &str,
        variant: QueryVariant,
        range: &DateRange,
    ) -> Result<PriceSeries, DataError> {
        Ok(synthetic_series(code, variant, range, 500))
    }
}

fn synthetic_series(code: &str, variant: QueryVariant, range: &DateRange, n: usize) -> PriceSeries {
    let points = (0..n)
        .map(|i| PricePoint {
            date: range.start + chrono::Duration::days(i as i64),
            close: 10.0 + ((i * 7919) % 1000) as f64 * 0.01,
        })
        .collect();
    PriceSeries::new(code, variant, points)
}

fn range() -> DateRange {
    DateRange::trailing(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(), 730)
}

fn symbols(n: usize) -> Vec<SymbolRecord> {
    (0..n)
        .map(|i| SymbolRecord {
            code: format!("{:06}", i),
            display_name: format!("S{i}"),
            last_price: Some(12.0),
            instrument_class: InstrumentClass::AShare,
        })
        .collect()
}

/// Benchmark aggregation of one series
fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");

    for len in [250, 500, 2500].iter() {
        let series = synthetic_series("600000", QueryVariant::DOMESTIC_FORWARD, &range(), *len);
        group.bench_with_input(BenchmarkId::from_parameter(len), len, |b, _| {
            b.iter(|| {
                let _ = aggregate(black_box(&series));
            });
        });
    }

    group.finish();
}

/// Benchmark a full batch across worker counts
fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.sample_size(20);

    let syms = symbols(1000);
    let range = range();

    for workers in [1, 4, 16].iter() {
        let engine = DispatchEngine::new(&SyntheticHistory, RetryPolicy::immediate(1), *workers);
        group.bench_with_input(BenchmarkId::from_parameter(workers), workers, |b, _| {
            b.iter(|| {
                let report = engine
                    .run(Market::AShare, black_box(&syms), &range, &SilentProgress)
                    .unwrap();
                black_box(report.rows.len());
            });
        });
    }

    group.finish();
}

/// Benchmark contended appends to the result table
fn bench_table_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_append");

    let rows: Vec<_> = symbols(1000)
        .iter()
        .map(|s| pricespan_core::domain::AggregateRow::from_symbol(s, 11.0, 9.0))
        .collect();

    group.bench_function("1000_rows_4_threads", |b| {
        b.iter(|| {
            let table = ResultTable::with_capacity(rows.len());
            std::thread::scope(|scope| {
                for chunk in rows.chunks(250) {
                    let table = &table;
                    scope.spawn(move || {
                        for row in chunk {
                            table.append(row.clone());
                        }
                    });
                }
            });
            black_box(table.len());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_aggregate, bench_dispatch, bench_table_append);

criterion_main!(benches);
