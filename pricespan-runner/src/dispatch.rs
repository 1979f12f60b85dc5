//! Dispatch engine: one fetch+aggregate task per symbol on a bounded pool.
//!
//! Each batch builds a private rayon pool (never the global one) and spawns
//! one task per symbol inside a scope. Tasks share only the result table,
//! the failure log and the completion counter; a task failure is recorded
//! and never reaches its siblings. The scope joins every task before the
//! table is consumed.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use thiserror::Error;

use pricespan_core::aggregate;
use pricespan_core::data::{HistoryProvider, RetryPolicy, SeriesFetcher};
use pricespan_core::domain::{AggregateRow, DateRange, Market, SymbolRecord};

use crate::progress::{BatchCounts, ScanProgress};
use crate::table::{Append, ResultTable};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to build worker pool with {workers} threads: {source}")]
    Pool {
        workers: usize,
        source: rayon::ThreadPoolBuildError,
    },
}

/// Why a symbol produced no row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Every variant of every attempt failed.
    Fetch { attempts: u32 },
    /// The fetch succeeded but held no usable closes.
    EmptySeries,
    /// The task panicked.
    Panicked,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolFailure {
    pub code: String,
    pub kind: FailureKind,
    pub cause: String,
}

/// Everything one batch produced.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub market: Market,
    pub range: DateRange,
    /// One row per successfully aggregated symbol, in completion order.
    pub rows: Vec<AggregateRow>,
    pub failures: Vec<SymbolFailure>,
    /// Rows dropped because their code was already in the table.
    pub duplicates: usize,
}

impl BatchReport {
    /// Totals for progress reporting.
    pub fn counts(&self) -> BatchCounts {
        BatchCounts {
            total: self.rows.len() + self.failures.len() + self.duplicates,
            succeeded: self.rows.len(),
            failed: self.failures.len(),
            duplicates: self.duplicates,
        }
    }
}

pub struct DispatchEngine<'a> {
    provider: &'a dyn HistoryProvider,
    policy: RetryPolicy,
    workers: usize,
}

impl<'a> DispatchEngine<'a> {
    /// Engine running at most `workers` tasks at once (at least 1).
    pub fn new(provider: &'a dyn HistoryProvider, policy: RetryPolicy, workers: usize) -> Self {
        Self {
            provider,
            policy,
            workers: workers.max(1),
        }
    }

    /// Configured pool size.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Fetch and aggregate every symbol over `range`. Returns once all tasks
    /// have finished.
    pub fn run(
        &self,
        market: Market,
        symbols: &[SymbolRecord],
        range: &DateRange,
        progress: &dyn ScanProgress,
    ) -> Result<BatchReport, EngineError> {
        let total = symbols.len();
        progress.on_batch_start(market, total);

        if symbols.is_empty() {
            let report = BatchReport {
                market,
                range: *range,
                rows: Vec::new(),
                failures: Vec::new(),
                duplicates: 0,
            };
            progress.on_batch_complete(market, &report.counts());
            return Ok(report);
        }

        let threads = self.workers.min(total);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("pricespan-worker-{i}"))
            .build()
            .map_err(|source| EngineError::Pool {
                workers: threads,
                source,
            })?;

        let fetcher = SeriesFetcher::new(self.provider, self.policy);
        let table = ResultTable::with_capacity(total);
        let failures = Mutex::new(Vec::new());
        let duplicates = AtomicUsize::new(0);
        let completed = AtomicUsize::new(0);

        log::debug!("{market}: {total} symbols on {threads} workers, range {range}");

        pool.scope(|scope| {
            for symbol in symbols {
                let (fetcher, table, failures) = (&fetcher, &table, &failures);
                let (duplicates, completed) = (&duplicates, &completed);
                scope.spawn(move |_| {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        process_symbol(fetcher, symbol, range)
                    }))
                    .unwrap_or_else(|payload| {
                        Err(SymbolFailure {
                            code: symbol.code.clone(),
                            kind: FailureKind::Panicked,
                            cause: panic_message(payload.as_ref()),
                        })
                    });

                    let ok = match result {
                        Ok(row) => {
                            log::debug!(
                                "{}: max {} min {}",
                                row.code,
                                row.period_max,
                                row.period_min
                            );
                            if table.append(row) == Append::Duplicate {
                                duplicates.fetch_add(1, Ordering::Relaxed);
                                log::warn!("{}: duplicate row dropped", symbol.code);
                            }
                            true
                        }
                        Err(failure) => {
                            log_failure(&failure);
                            failures
                                .lock()
                                .unwrap_or_else(|poisoned| poisoned.into_inner())
                                .push(failure);
                            false
                        }
                    };

                    let done = completed.fetch_add(1, Ordering::AcqRel) + 1;
                    progress.on_symbol_done(&symbol.code, done, total, ok);
                });
            }
        });

        let report = BatchReport {
            market,
            range: *range,
            rows: table.into_rows(),
            failures: failures
                .into_inner()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
            duplicates: duplicates.into_inner(),
        };
        progress.on_batch_complete(market, &report.counts());
        Ok(report)
    }
}

/// Fetch → aggregate → row for one symbol.
pub fn process_symbol(
    fetcher: &SeriesFetcher<'_>,
    symbol: &SymbolRecord,
    range: &DateRange,
) -> Result<AggregateRow, SymbolFailure> {
    let outcome = fetcher
        .fetch(&symbol.code, symbol.instrument_class, range)
        .map_err(|f| SymbolFailure {
            code: f.code,
            kind: FailureKind::Fetch {
                attempts: f.attempts,
            },
            cause: f.cause.to_string(),
        })?;

    let extrema = aggregate(&outcome.series).map_err(|e| SymbolFailure {
        code: symbol.code.clone(),
        kind: FailureKind::EmptySeries,
        cause: e.to_string(),
    })?;

    Ok(AggregateRow::from_symbol(
        symbol,
        extrema.max_close,
        extrema.min_close,
    ))
}

fn log_failure(failure: &SymbolFailure) {
    match failure.kind {
        FailureKind::Fetch { attempts } => log::warn!(
            "{}: skipped after {attempts} attempt(s): {}",
            failure.code,
            failure.cause
        ),
        FailureKind::EmptySeries => log::warn!("{}: skipped: {}", failure.code, failure.cause),
        FailureKind::Panicked => {
            log::error!("{}: task panicked: {}", failure.code, failure.cause)
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into())
}
