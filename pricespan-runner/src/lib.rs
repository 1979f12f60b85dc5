//! pricespan runner: batch orchestration on top of `pricespan-core`.
//!
//! - Scan configuration (TOML, with defaults and validation)
//! - Append-only result table with uniqueness by code
//! - Dispatch engine: one task per symbol on a bounded private pool
//! - Progress callbacks
//! - CSV report export
//! - Scan pipeline: directory → dispatch → export per market

pub mod config;
pub mod dispatch;
pub mod export;
pub mod progress;
pub mod scan;
pub mod table;

pub use config::{ConfigError, ScanConfig};
pub use dispatch::{process_symbol, BatchReport, DispatchEngine, EngineError, FailureKind, SymbolFailure};
pub use export::{rows_to_csv, CsvExporter, ReportExporter};
pub use progress::{BatchCounts, LogProgress, ScanProgress, SilentProgress};
pub use scan::{run_scan, MarketSummary, ScanContext, ScanError, ScanSummary};
pub use table::{Append, ResultTable};
