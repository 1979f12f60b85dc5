//! Report export: the finished table as a dated CSV file.
//!
//! Columns: `code, name, current_price, period_max, period_min`, plus
//! `ratio_pct` (current price as a percentage of the period high) when
//! enabled. Rows are written sorted by code.

use std::path::PathBuf;

use anyhow::{Context, Result};

use pricespan_core::domain::{AggregateRow, DateRange, Market};

const BASE_COLUMNS: [&str; 5] = ["code", "name", "current_price", "period_max", "period_min"];
const RATIO_COLUMN: &str = "ratio_pct";

/// Persists one market's finished rows.
pub trait ReportExporter: Send + Sync {
    /// Write `rows` and return where they went. Never called with no rows.
    fn export(&self, market: Market, range: &DateRange, rows: &[AggregateRow]) -> Result<PathBuf>;
}

fn fmt_price(v: f64) -> String {
    format!("{v:.2}")
}

/// Render rows as CSV text.
pub fn rows_to_csv(rows: &[AggregateRow], include_ratio: bool) -> Result<String> {
    let mut sorted: Vec<&AggregateRow> = rows.iter().collect();
    sorted.sort_by(|a, b| a.code.cmp(&b.code));

    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header: Vec<&str> = BASE_COLUMNS.to_vec();
    if include_ratio {
        header.push(RATIO_COLUMN);
    }
    wtr.write_record(&header)?;

    for row in sorted {
        let mut record = vec![
            row.code.clone(),
            row.display_name.clone(),
            row.last_price.map(fmt_price).unwrap_or_default(),
            fmt_price(row.period_max),
            fmt_price(row.period_min),
        ];
        if include_ratio {
            record.push(row.ratio_pct().map(fmt_price).unwrap_or_default());
        }
        wtr.write_record(&record)?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Writes `{output_dir}/{prefix}_{market}_{YYYYMMDD}.csv`, dated by the
/// range's end.
#[derive(Debug, Clone)]
pub struct CsvExporter {
    output_dir: PathBuf,
    file_prefix: String,
    include_ratio: bool,
}

impl CsvExporter {
    /// Exporter writing into `output_dir`, created on first export.
    pub fn new(output_dir: impl Into<PathBuf>, file_prefix: impl Into<String>, include_ratio: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            file_prefix: file_prefix.into(),
            include_ratio,
        }
    }

    /// Report path for `market`, dated by the range end.
    pub fn file_path(&self, market: Market, range: &DateRange) -> PathBuf {
        self.output_dir.join(format!(
            "{}_{}_{}.csv",
            self.file_prefix,
            market.tag(),
            range.end_param()
        ))
    }
}

impl ReportExporter for CsvExporter {
    fn export(&self, market: Market, range: &DateRange, rows: &[AggregateRow]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("failed to create report dir: {}", self.output_dir.display())
        })?;

        let path = self.file_path(market, range);
        let csv = rows_to_csv(rows, self.include_ratio)?;
        std::fs::write(&path, csv)
            .with_context(|| format!("failed to write report: {}", path.display()))?;

        log::info!("{market}: wrote {} rows to {}", rows.len(), path.display());
        Ok(path)
    }
}
