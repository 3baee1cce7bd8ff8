//! CLI definition and dispatch.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvPriceAdapter;
use crate::adapters::csv_report_adapter::{CsvReportAdapter, read_entry_report};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::kline_converter::{ConvertOptions, convert_klines};
use crate::domain::backtest::{self, BacktestSettings, EntryRecord, TradeRecord};
use crate::domain::config_validation::{
    read_strategy_params, read_timezone, validate_backtest_config, validate_signal_config,
    validate_strategy_config,
};
use crate::domain::error::LadderError;
use crate::domain::metrics::{OutcomeSummary, ReportAnalysis, TradeSummary, hold_by_water_count};
use crate::domain::price_series::{PriceSeries, YearMonth, parse_local_timestamp};
use crate::domain::signal::{SignalThresholds, compute_signals};
use crate::domain::strategy::StrategyParams;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PriceDataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "laddersim", about = "Leveraged averaging-ladder backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Inputs shared by the backtest subcommands.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Converted minute CSV with `date` and `close` columns
    pub data: PathBuf,
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Calendar month to simulate (YYYY-MM)
    #[arg(short, long)]
    pub month: Option<String>,
    /// Base path for report files
    #[arg(short, long)]
    pub output: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert a raw exchange kline CSV into a minute CSV
    Convert {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write dates in Asia/Seoul
        #[arg(long)]
        kst: bool,
        #[arg(long)]
        no_overwrite: bool,
    },
    /// Simulate a long entry at every bar of the month
    Exhaustive {
        #[command(flatten)]
        run: RunArgs,
        /// Single-step positions without averaging
        #[arg(long)]
        no_scale: bool,
    },
    /// Simulate long entries only at drop signals
    Signal {
        #[command(flatten)]
        run: RunArgs,
        /// Use the averaging ladder
        #[arg(long)]
        scale: bool,
    },
    /// Chain alternating long/short positions on drop signals
    Reversal {
        #[command(flatten)]
        run: RunArgs,
        /// First instant considered for entry
        #[arg(long)]
        start: Option<String>,
        /// Use the averaging ladder
        #[arg(long)]
        scale: bool,
    },
    /// Date, hour and lookback tables for entry reports
    Analyze {
        /// Entry report CSV; may be repeated
        #[arg(short, long, required = true)]
        report: Vec<PathBuf>,
        /// Minute CSV used for lookback returns
        #[arg(long)]
        price: PathBuf,
        #[arg(short, long)]
        month: Option<String>,
        #[arg(long, default_value = ".")]
        output_dir: String,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Convert {
            input,
            output,
            kst,
            no_overwrite,
        } => run_convert(&input, output, kst, !no_overwrite),
        Command::Exhaustive { run, no_scale } => run_exhaustive(&run, no_scale),
        Command::Signal { run, scale } => run_signal(&run, scale),
        Command::Reversal { run, start, scale } => run_reversal(&run, start.as_deref(), scale),
        Command::Analyze {
            report,
            price,
            month,
            output_dir,
            config,
        } => run_analyze(&report, &price, month.as_deref(), &output_dir, config.as_deref()),
        Command::Validate { config } => run_validate(&config),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// An absent path yields an empty config, so every key takes its default.
pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, LadderError> {
    match path {
        Some(p) => {
            eprintln!("Loading config from {}", p.display());
            FileConfigAdapter::from_file(p)
        }
        None => Ok(FileConfigAdapter::empty()),
    }
}

pub fn build_strategy_params(adapter: &dyn ConfigPort) -> Result<StrategyParams, LadderError> {
    let params = read_strategy_params(adapter)?;
    params.validate()?;
    Ok(params)
}

pub fn build_thresholds(adapter: &dyn ConfigPort) -> Result<SignalThresholds, LadderError> {
    match adapter.get_string("signals", "thresholds") {
        Some(raw) => SignalThresholds::parse(&raw),
        None => Ok(SignalThresholds::default()),
    }
}

pub fn build_backtest_settings(adapter: &dyn ConfigPort) -> Result<BacktestSettings, LadderError> {
    let d = BacktestSettings::default();
    let month = match adapter.get_string("backtest", "month") {
        Some(raw) => YearMonth::parse(&raw)?,
        None => d.month,
    };
    let timezone = read_timezone(adapter, "backtest", d.timezone)?;
    let start_time = adapter
        .get_string("backtest", "start_time")
        .map(|raw| parse_start_time(&raw, timezone))
        .transpose()?;
    Ok(BacktestSettings {
        month,
        start_time,
        timezone,
        parallel: adapter.get_bool("backtest", "parallel", d.parallel),
        report_timezone: read_timezone(adapter, "report", d.report_timezone)?,
    })
}

fn parse_start_time(raw: &str, tz: Tz) -> Result<DateTime<Utc>, LadderError> {
    parse_local_timestamp(raw, tz).ok_or_else(|| {
        LadderError::invalid("backtest", "start_time", format!("'{raw}' is not a timestamp"))
    })
}

/// Validated config, strategy and the month's price bars.
pub struct RunContext {
    pub config: FileConfigAdapter,
    pub params: StrategyParams,
    pub settings: BacktestSettings,
    pub series: PriceSeries,
}

pub fn prepare_run(run: &RunArgs) -> Result<RunContext, LadderError> {
    // Stage 1: Load and validate config
    let config = load_config(run.config.as_deref())?;
    validate_strategy_config(&config)?;
    validate_signal_config(&config)?;
    validate_backtest_config(&config)?;

    // Stage 2: Build strategy and settings
    let params = build_strategy_params(&config)?;
    let mut settings = build_backtest_settings(&config)?;
    if let Some(month) = &run.month {
        settings.month = YearMonth::parse(month)?;
    }

    // Stage 3: Load prices and select the month
    eprintln!("Loading prices from {}", run.data.display());
    let all = CsvPriceAdapter::new(run.data.clone()).load_prices()?;
    let series = all.filter_month(settings.month, settings.timezone);
    if series.is_empty() {
        return Err(LadderError::EmptyMonth {
            month: settings.month.to_string(),
        });
    }
    eprintln!(
        "Selected {} of {} bars for {} ({})",
        series.len(),
        all.len(),
        settings.month,
        settings.timezone
    );

    Ok(RunContext {
        config,
        params,
        settings,
        series,
    })
}

fn run_convert(
    input: &Path,
    output: Option<PathBuf>,
    to_kst: bool,
    overwrite: bool,
) -> Result<(), LadderError> {
    eprintln!("Converting {}", input.display());
    let summary = convert_klines(
        input,
        &ConvertOptions {
            output,
            to_kst,
            overwrite,
        },
    )?;
    eprintln!(
        "Wrote {} rows to {} ({} dropped)",
        summary.rows,
        summary.output.display(),
        summary.dropped
    );
    Ok(())
}

fn run_exhaustive(run: &RunArgs, no_scale: bool) -> Result<(), LadderError> {
    let mut ctx = prepare_run(run)?;
    if no_scale {
        ctx.params = ctx.params.no_scale();
    }
    let records = backtest::run_exhaustive(&ctx.series, &ctx.params, ctx.settings.parallel)?;
    let default_base = if no_scale { "no_scale_report" } else { "sim_report" };
    write_entry_reports(&ctx, run.output.as_deref().unwrap_or(default_base), &records)?;
    print_entry_summary(&records);
    Ok(())
}

fn run_signal(run: &RunArgs, scale: bool) -> Result<(), LadderError> {
    let mut ctx = prepare_run(run)?;
    if !scale {
        ctx.params = ctx.params.no_scale();
    }
    let thresholds = build_thresholds(&ctx.config)?;
    eprintln!("Signal thresholds: {thresholds}");
    let signals = compute_signals(&ctx.series, &thresholds);
    let records =
        backtest::run_on_signals(&ctx.series, &signals, &ctx.params, ctx.settings.parallel)?;
    write_entry_reports(&ctx, run.output.as_deref().unwrap_or("signal_report"), &records)?;
    print_entry_summary(&records);
    Ok(())
}

fn run_reversal(run: &RunArgs, start: Option<&str>, scale: bool) -> Result<(), LadderError> {
    let mut ctx = prepare_run(run)?;
    if !scale {
        ctx.params = ctx.params.no_scale();
    }
    if let Some(raw) = start {
        ctx.settings.start_time = Some(parse_start_time(raw, ctx.settings.timezone)?);
    }
    let start_time = ctx.settings.start_time.unwrap_or_else(|| ctx.series.time(0));
    let thresholds = build_thresholds(&ctx.config)?;
    let signals = compute_signals(&ctx.series, &thresholds);
    eprintln!("Chaining trades from {start_time}");

    let trades = backtest::run_reversal(&ctx.series, &signals, &ctx.params, start_time)?;
    let reporter = CsvReportAdapter::new(ctx.params.drop_fractions.len());
    let base = run.output.as_deref().unwrap_or("reversal_backtest");
    for path in reporter.write_trades(base, &trades)? {
        eprintln!("Report written to {path}");
    }
    print_trade_summary(&trades);
    Ok(())
}

fn run_analyze(
    reports: &[PathBuf],
    price: &Path,
    month: Option<&str>,
    output_dir: &str,
    config: Option<&Path>,
) -> Result<(), LadderError> {
    let adapter = load_config(config)?;
    validate_backtest_config(&adapter)?;
    let mut settings = build_backtest_settings(&adapter)?;
    if let Some(month) = month {
        settings.month = YearMonth::parse(month)?;
    }

    let prices = CsvPriceAdapter::new(price.to_path_buf()).load_prices()?;
    let mut entries = Vec::new();
    for report in reports {
        eprintln!("Reading report {}", report.display());
        entries.extend(read_entry_report(report)?);
    }

    let analysis =
        ReportAnalysis::compute(&entries, &prices, settings.month, settings.report_timezone);
    let written = CsvReportAdapter::new(0).write_analysis(output_dir, settings.month, &analysis)?;
    for path in &written {
        eprintln!("Report written to {path}");
    }

    eprintln!("\nHighest liquidation hours ({}):", settings.report_timezone);
    for h in analysis.hours.iter().take(3) {
        eprintln!("  {:02}h  {}/{} ({:.2}%)", h.hour, h.liq, h.total, h.liq_pct);
    }
    match analysis.optimized.tp_rate {
        Some(rate) => eprintln!(
            "Optimized TP rate: {rate:.2}% over {} entries",
            analysis.optimized.total_entries
        ),
        None => eprintln!("Optimized TP rate: no entries left after filtering"),
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), LadderError> {
    let adapter = load_config(Some(config_path))?;
    validate_strategy_config(&adapter)?;
    validate_signal_config(&adapter)?;
    validate_backtest_config(&adapter)?;

    let params = build_strategy_params(&adapter)?;
    let thresholds = build_thresholds(&adapter)?;
    let settings = build_backtest_settings(&adapter)?;

    eprintln!("\nStrategy:");
    eprintln!("  leverage:        {}x", params.leverage);
    eprintln!("  target return:   {:.2}%", params.net_target_return * 100.0);
    eprintln!("  take-profit move {:.4}%", params.take_profit_move() * 100.0);
    eprintln!("  margin:          {} + {} per step", params.initial_margin, params.add_margin);
    eprintln!("  drop fractions:  {:?}", params.drop_fractions);
    eprintln!("\nSignals: {thresholds}");
    eprintln!("Month: {} ({})", settings.month, settings.timezone);
    eprintln!("\nConfiguration is valid.");
    Ok(())
}

fn write_entry_reports(
    ctx: &RunContext,
    base: &str,
    records: &[EntryRecord],
) -> Result<(), LadderError> {
    let reporter = CsvReportAdapter::new(ctx.params.drop_fractions.len());
    for path in reporter.write_entries(base, records)? {
        eprintln!("Report written to {path}");
    }
    Ok(())
}

fn print_outcomes(s: &OutcomeSummary) {
    eprintln!("  TP:   {:>6} ({:.2}%)", s.tp, s.tp_rate());
    eprintln!("  LIQ:  {:>6} ({:.2}%)", s.liq, s.liq_rate());
    eprintln!("  OPEN: {:>6} ({:.2}%)", s.open, s.open_rate());
}

fn print_entry_summary(records: &[EntryRecord]) {
    let summary = OutcomeSummary::from_outcomes(records.iter().map(|r| r.result.outcome));
    eprintln!("\nEntries: {}", summary.total);
    print_outcomes(&summary);
    let holds = hold_by_water_count(records);
    if !holds.is_empty() {
        eprintln!("\nMean hold by ladder advances:");
        for (waters, hold) in holds {
            eprintln!("  {waters}: {hold:.1} bars");
        }
    }
}

fn print_trade_summary(trades: &[TradeRecord]) {
    let summary = TradeSummary::compute(trades);
    eprintln!("\nTrades: {}", summary.outcomes.total);
    print_outcomes(&summary.outcomes);
    eprintln!("  Total PnL: {:.2}", summary.total_pnl);
    eprintln!("  Avg PnL:   {:.2}", summary.avg_pnl);
}
