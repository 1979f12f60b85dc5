//! pricespan CLI: scan markets for trailing price extrema.
//!
//! Commands:
//! - `scan`: list every symbol of the configured markets, fetch each one's
//!   daily closes concurrently and export a CSV report per market
//! - `history`: fetch and aggregate a single symbol
//! - `config`: print the default configuration as TOML

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

use pricespan_core::aggregate;
use pricespan_core::data::{
    CircuitBreaker, EastmoneyClient, FallbackDirectory, SeriesFetcher, SinaDirectory,
};
use pricespan_core::domain::{
    canonical_code, DateRange, InstrumentClass, Market, MAX_LOOKBACK_DAYS,
};
use pricespan_runner::{run_scan, CsvExporter, LogProgress, ScanConfig, ScanContext, ScanSummary};

#[derive(Parser)]
#[command(
    name = "pricespan",
    about = "pricespan: trailing high/low scanner for listed equities"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan whole markets and export one CSV report per market.
    Scan {
        /// Path to a TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Market to scan (repeatable). Overrides the config file.
        #[arg(long = "market", value_enum)]
        markets: Vec<MarketArg>,

        /// Worker pool size.
        #[arg(long)]
        workers: Option<usize>,

        /// Trailing window in calendar days.
        #[arg(long)]
        lookback_days: Option<u32>,

        /// Directory for CSV reports.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Omit the ratio_pct column.
        #[arg(long, default_value_t = false)]
        no_ratio: bool,

        /// End of the window (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,
    },
    /// Fetch one symbol and print its period extrema.
    History {
        /// Symbol code, e.g. 600000 or 00700.
        code: String,

        /// Trailing window in calendar days.
        #[arg(long, default_value_t = pricespan_core::domain::DEFAULT_LOOKBACK_DAYS)]
        lookback_days: u32,

        /// End of the window (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,
    },
    /// Print the default configuration as TOML.
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum MarketArg {
    AShare,
    HShare,
}

impl From<MarketArg> for Market {
    fn from(arg: MarketArg) -> Self {
        match arg {
            MarketArg::AShare => Market::AShare,
            MarketArg::HShare => Market::HShare,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            config,
            markets,
            workers,
            lookback_days,
            output_dir,
            no_ratio,
            end,
        } => {
            let mut scan_config = match config {
                Some(path) => ScanConfig::from_file(&path)?,
                None => ScanConfig::default(),
            };
            if !markets.is_empty() {
                scan_config.markets = markets.into_iter().map(Market::from).collect();
            }
            if workers.is_some() {
                scan_config.workers = workers;
            }
            if let Some(days) = lookback_days {
                scan_config.lookback_days = days;
            }
            if let Some(dir) = output_dir {
                scan_config.report.output_dir = dir;
            }
            if no_ratio {
                scan_config.report.include_ratio = false;
            }
            scan_config.validate()?;
            run_scan_cmd(&scan_config, parse_end(end.as_deref())?)
        }
        Commands::History {
            code,
            lookback_days,
            end,
        } => run_history(&code, lookback_days, parse_end(end.as_deref())?),
        Commands::Config => {
            print!("{}", ScanConfig::default().to_toml()?);
            Ok(())
        }
    }
}

fn parse_end(end: Option<&str>) -> Result<NaiveDate> {
    match end {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid --end date '{s}' (expected YYYY-MM-DD)")),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn run_scan_cmd(config: &ScanConfig, today: NaiveDate) -> Result<()> {
    let settings = config.http_settings();
    let circuit_breaker = Arc::new(CircuitBreaker::new(settings.breaker_cooldown));

    let history = EastmoneyClient::new(&settings, Arc::clone(&circuit_breaker))?;
    let directory = FallbackDirectory::new(
        Box::new(SinaDirectory::new(&settings)?),
        Box::new(EastmoneyClient::new(&settings, Arc::clone(&circuit_breaker))?),
    );
    let exporter = CsvExporter::new(
        &config.report.output_dir,
        config.report.file_prefix.clone(),
        config.report.include_ratio,
    );
    let progress = LogProgress::default();

    let ctx = ScanContext {
        directory: &directory,
        history: &history,
        exporter: &exporter,
        progress: &progress,
    };

    let summary = run_scan(config, &ctx, today)?;
    print_summary(&summary);

    let failed: Vec<String> = summary
        .failed_exports()
        .map(|m| m.market.to_string())
        .collect();
    if !failed.is_empty() {
        bail!("report export failed for: {}", failed.join(", "));
    }
    Ok(())
}

fn print_summary(summary: &ScanSummary) {
    println!("Window: {}", summary.range);
    for market in &summary.markets {
        match &market.batch {
            None => println!("  {:<8} no symbols listed", market.market),
            Some(batch) => {
                let counts = batch.counts();
                println!(
                    "  {:<8} listed {:>5}  rows {:>5}  failed {:>4}  duplicates {}",
                    market.market, market.listed, counts.succeeded, counts.failed, counts.duplicates
                );
            }
        }
        if let Some(path) = &market.report_path {
            println!("           report: {}", path.display());
        }
        if let Some(error) = &market.export_error {
            println!("           export failed: {error:#}");
        }
    }
    println!(
        "Total: {} rows, {} failures",
        summary.total_rows(),
        summary.total_failures()
    );
}

fn run_history(raw_code: &str, lookback_days: u32, today: NaiveDate) -> Result<()> {
    if lookback_days == 0 || lookback_days > MAX_LOOKBACK_DAYS {
        bail!("--lookback-days must be between 1 and {MAX_LOOKBACK_DAYS}");
    }
    let code = canonical_code(raw_code)?;
    let Some(class) = InstrumentClass::classify(&code) else {
        bail!("'{code}' is neither a 6-digit A-share nor a 5-digit H-share code");
    };

    let config = ScanConfig::default();
    let settings = config.http_settings();
    let circuit_breaker = Arc::new(CircuitBreaker::new(settings.breaker_cooldown));
    let provider = EastmoneyClient::new(&settings, circuit_breaker)?;
    let fetcher = SeriesFetcher::new(&provider, config.retry_policy());

    let range = DateRange::trailing(today, lookback_days);
    log::info!(
        "{code}: fetching {range} (up to {} attempts)",
        fetcher.policy().max_attempts
    );

    let outcome = fetcher.fetch(&code, class, &range)?;
    let extrema = aggregate(&outcome.series)?;

    println!("Symbol:   {code}");
    println!("Window:   {range}");
    println!(
        "Source:   {} (attempt {})",
        outcome.variant, outcome.attempts
    );
    println!("Closes:   {}", outcome.series.len());
    println!("High:     {:.2}", extrema.max_close);
    println!("Low:      {:.2}", extrema.min_close);
    Ok(())
}
