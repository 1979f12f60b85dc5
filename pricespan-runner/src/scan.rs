//! Scan pipeline: directory → dispatch → export, once per market.

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

use pricespan_core::data::{DataError, DirectorySource, HistoryProvider};
use pricespan_core::domain::{DateRange, Market};

use crate::config::ScanConfig;
use crate::dispatch::{BatchReport, DispatchEngine, EngineError};
use crate::export::ReportExporter;
use crate::progress::ScanProgress;

/// Errors that abort a scan. Per-symbol failures and per-market export
/// failures never surface here; see [`MarketSummary::export_error`].
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("symbol directory failed: {0}")]
    Directory(#[from] DataError),

    #[error("worker pool: {0}")]
    Pool(#[from] EngineError),
}

/// What happened to one market.
#[derive(Debug)]
pub struct MarketSummary {
    pub market: Market,
    /// Symbols listed by the directory.
    pub listed: usize,
    /// `None` when the directory listed nothing and the market was skipped.
    pub batch: Option<BatchReport>,
    /// Report location; `None` when there was nothing to export or the
    /// export failed.
    pub report_path: Option<PathBuf>,
    /// Why the export failed. The batch stays available in `batch`.
    pub export_error: Option<anyhow::Error>,
}

#[derive(Debug)]
pub struct ScanSummary {
    pub range: DateRange,
    pub markets: Vec<MarketSummary>,
}

impl ScanSummary {
    /// Rows aggregated across every market.
    pub fn total_rows(&self) -> usize {
        self.markets
            .iter()
            .filter_map(|m| m.batch.as_ref())
            .map(|b| b.rows.len())
            .sum()
    }

    /// Symbols skipped across every market.
    pub fn total_failures(&self) -> usize {
        self.markets
            .iter()
            .filter_map(|m| m.batch.as_ref())
            .map(|b| b.failures.len())
            .sum()
    }

    /// Markets whose report could not be written.
    pub fn failed_exports(&self) -> impl Iterator<Item = &MarketSummary> {
        self.markets.iter().filter(|m| m.export_error.is_some())
    }
}

/// Collaborators of one scan.
pub struct ScanContext<'a> {
    pub directory: &'a dyn DirectorySource,
    pub history: &'a dyn HistoryProvider,
    pub exporter: &'a dyn ReportExporter,
    pub progress: &'a dyn ScanProgress,
}

/// Run every configured market. The date range is computed once from
/// `today` and shared by every batch.
///
/// A failed export is recorded on its market and the scan moves on to the
/// next market.
pub fn run_scan(
    config: &ScanConfig,
    ctx: &ScanContext<'_>,
    today: NaiveDate,
) -> Result<ScanSummary, ScanError> {
    let range = DateRange::trailing(today, config.lookback_days);
    let engine = DispatchEngine::new(ctx.history, config.retry_policy(), config.worker_count());

    log::info!(
        "scan {range}: markets {:?}, {} workers, {} attempts per symbol",
        config.markets,
        engine.workers(),
        config.retry.max_attempts
    );

    let mut markets = Vec::with_capacity(config.markets.len());
    for &market in &config.markets {
        markets.push(scan_market(market, &range, &engine, ctx)?);
    }

    Ok(ScanSummary { range, markets })
}

fn scan_market(
    market: Market,
    range: &DateRange,
    engine: &DispatchEngine<'_>,
    ctx: &ScanContext<'_>,
) -> Result<MarketSummary, ScanError> {
    let symbols = ctx.directory.list_symbols(market)?;
    if symbols.is_empty() {
        log::warn!("{market}: directory listed no symbols; skipping");
        return Ok(MarketSummary {
            market,
            listed: 0,
            batch: None,
            report_path: None,
            export_error: None,
        });
    }

    let batch = engine.run(market, &symbols, range, ctx.progress)?;

    let (report_path, export_error) = if batch.rows.is_empty() {
        log::warn!("{market}: no rows aggregated; export skipped");
        (None, None)
    } else {
        match ctx.exporter.export(market, range, &batch.rows) {
            Ok(path) => (Some(path), None),
            Err(error) => {
                log::error!(
                    "{market}: export of {} rows failed: {error:#}",
                    batch.rows.len()
                );
                (None, Some(error))
            }
        }
    };

    Ok(MarketSummary {
        market,
        listed: symbols.len(),
        batch: Some(batch),
        report_path,
        export_error,
    })
}
