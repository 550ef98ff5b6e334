//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{Level, info};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::paper_venue::{PaperConfig, PaperVenue};
use crate::adapters::synthetic_feed::{SyntheticFeedConfig, SyntheticPriceFeed};
use crate::adapters::trade_export::TradeExportAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestReport};
use crate::domain::candle::{Candle, generate_synthetic_candles};
use crate::domain::config_validation::{
    validate_backtest_config, validate_live_config, validate_risk_config,
    validate_strategy_config,
};
use crate::domain::engine::TradingEngine;
use crate::domain::error::EngineError;
use crate::domain::instrument::InstrumentRegistry;
use crate::domain::risk::RiskLimits;
use crate::domain::scheduler::Scheduler;
use crate::domain::strategy::{EngineConfig, StrategyConfig};
use crate::ports::candle_port::CandlePort;
use crate::ports::config_port::ConfigPort;

#[derive(Parser, Debug)]
#[command(name = "autotrader", about = "Indicator-driven trading engine and backtester")]
pub struct Cli {
    /// trace, debug, info, warn or error
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay the signal logic over historical or synthetic candles
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Candle CSV; overrides [backtest] csv
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Write closed trades to this CSV file
        #[arg(long)]
        trades_out: Option<PathBuf>,
    },
    /// Run the decision loop against the in-memory paper venue
    Paper {
        #[arg(short, long)]
        config: PathBuf,
        /// Stop after this many cycles instead of waiting for Ctrl-C
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn parse_log_level(raw: &str) -> Level {
    match raw.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

pub async fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            csv,
            trades_out,
        } => run_backtest(&config, csv.as_ref(), trades_out.as_ref()),
        Command::Paper { config, cycles } => run_paper(&config, cycles).await,
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: EngineError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

fn out_of_range(section: &str, key: &str, reason: String) -> EngineError {
    EngineError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}

/// Unsigned integer setting; negative values are a config error, not a default.
fn get_u64(adapter: &dyn ConfigPort, section: &str, key: &str, default: u64) -> Result<u64, EngineError> {
    let raw = adapter.get_int(section, key, i64::try_from(default).unwrap_or(i64::MAX));
    u64::try_from(raw)
        .map_err(|_| out_of_range(section, key, format!("must be non-negative, got {}", raw)))
}

fn get_usize(adapter: &dyn ConfigPort, section: &str, key: &str, default: usize) -> Result<usize, EngineError> {
    let value = get_u64(adapter, section, key, default as u64)?;
    usize::try_from(value).map_err(|_| out_of_range(section, key, format!("{} is too large", value)))
}

fn get_u32(adapter: &dyn ConfigPort, section: &str, key: &str, default: u32) -> Result<u32, EngineError> {
    let value = get_u64(adapter, section, key, u64::from(default))?;
    u32::try_from(value).map_err(|_| out_of_range(section, key, format!("{} is too large", value)))
}

pub fn build_engine_config(adapter: &dyn ConfigPort) -> Result<EngineConfig, EngineError> {
    let defaults = EngineConfig::default();
    let instruments = adapter
        .get_string("engine", "instruments")
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_uppercase)
                .collect()
        })
        .unwrap_or(defaults.instruments);
    let config = EngineConfig {
        instruments,
        cycle_interval_secs: get_u64(
            adapter,
            "engine",
            "cycle_interval_secs",
            defaults.cycle_interval_secs,
        )?,
        window_size: get_usize(adapter, "engine", "window_size", defaults.window_size)?,
    };
    config.validate()?;
    Ok(config)
}

pub fn build_strategy_config(adapter: &dyn ConfigPort) -> Result<StrategyConfig, EngineError> {
    let d = StrategyConfig::default();
    let config = StrategyConfig {
        position_size_pct: adapter.get_decimal("strategy", "position_size_pct", d.position_size_pct),
        take_profit_pct: adapter.get_decimal("strategy", "take_profit_pct", d.take_profit_pct),
        stop_loss_pct: adapter.get_decimal("strategy", "stop_loss_pct", d.stop_loss_pct),
        trailing_activation_pct: adapter.get_decimal(
            "strategy",
            "trailing_activation_pct",
            d.trailing_activation_pct,
        ),
        max_open_positions: get_usize(adapter, "strategy", "max_open_positions", d.max_open_positions)?,
        min_trade_size: adapter.get_decimal("strategy", "min_trade_size", d.min_trade_size),
        max_slippage_bps: get_u32(adapter, "strategy", "max_slippage_bps", d.max_slippage_bps)?,
        min_confidence: adapter.get_decimal("strategy", "min_confidence", d.min_confidence),
    };
    config.validate()?;
    Ok(config)
}

pub fn build_risk_limits(adapter: &dyn ConfigPort) -> Result<RiskLimits, EngineError> {
    let d = RiskLimits::default();
    let limits = RiskLimits {
        initial_capital: adapter.get_decimal("risk", "initial_capital", d.initial_capital),
        max_drawdown_pct: adapter.get_decimal("risk", "max_drawdown_pct", d.max_drawdown_pct),
        max_daily_loss_pct: adapter.get_decimal("risk", "max_daily_loss_pct", d.max_daily_loss_pct),
        max_position_size_pct: adapter.get_decimal(
            "risk",
            "max_position_size_pct",
            d.max_position_size_pct,
        ),
        min_reserve: adapter.get_decimal("risk", "min_reserve", d.min_reserve),
        max_trades_per_hour: get_u32(adapter, "risk", "max_trades_per_hour", d.max_trades_per_hour)?,
        loss_cooldown_secs: get_u64(adapter, "risk", "loss_cooldown_secs", d.loss_cooldown_secs)?,
    };
    limits.validate()?;
    Ok(limits)
}

/// `[backtest] initial_capital` falls back to `[risk] initial_capital`.
pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, EngineError> {
    let d = BacktestConfig::default();
    let risk_capital = adapter.get_decimal("risk", "initial_capital", d.initial_capital);
    let config = BacktestConfig {
        initial_capital: adapter.get_decimal("backtest", "initial_capital", risk_capital),
        fee_pct: adapter.get_decimal("backtest", "fee_pct", d.fee_pct),
        slippage_pct: adapter.get_decimal("backtest", "slippage_pct", d.slippage_pct),
        warmup_candles: get_usize(adapter, "backtest", "warmup_candles", d.warmup_candles)?,
        lookback: get_usize(adapter, "backtest", "lookback", d.lookback)?,
    };
    config.validate()?;
    Ok(config)
}

pub fn build_paper_config(adapter: &dyn ConfigPort) -> Result<PaperConfig, EngineError> {
    let d = PaperConfig::default();
    let risk_capital = adapter.get_decimal("risk", "initial_capital", d.initial_balance);
    let config = PaperConfig {
        initial_balance: adapter.get_decimal("paper", "initial_balance", risk_capital),
        fee_pct: adapter.get_decimal("paper", "fee_pct", d.fee_pct),
        slippage_pct: adapter.get_decimal("paper", "slippage_pct", d.slippage_pct),
    };
    config.validate()?;
    Ok(config)
}

pub fn build_feed_config(adapter: &dyn ConfigPort) -> Result<SyntheticFeedConfig, EngineError> {
    let d = SyntheticFeedConfig::default();
    Ok(SyntheticFeedConfig {
        start_price: adapter.get_decimal("paper", "start_price", d.start_price),
        volatility_pct: adapter.get_decimal("paper", "volatility_pct", d.volatility_pct),
        drift_pct: adapter.get_decimal("paper", "drift_pct", d.drift_pct),
        seed: get_u64(adapter, "paper", "seed", d.seed)?,
    })
}

/// Candles from `csv_override`, then `[backtest] csv`, else a synthetic series.
pub fn load_candles(
    adapter: &dyn ConfigPort,
    csv_override: Option<&PathBuf>,
) -> Result<Vec<Candle>, EngineError> {
    let csv_path = csv_override
        .cloned()
        .or_else(|| adapter.get_string("backtest", "csv").map(PathBuf::from));
    match csv_path {
        Some(path) => {
            eprintln!("Loading candles from {}", path.display());
            CsvAdapter::new(path).fetch_candles()
        }
        None => {
            let count = get_usize(adapter, "backtest", "candles", 500)?;
            let seed = get_u64(adapter, "backtest", "seed", 42)?;
            eprintln!("Generating {} synthetic candles (seed {})", count, seed);
            generate_synthetic_candles(
                count,
                adapter.get_decimal("backtest", "start_price", dec!(100)),
                adapter.get_decimal("backtest", "volatility_pct", dec!(1)),
                adapter.get_decimal("backtest", "drift_pct", Decimal::ZERO),
                seed,
            )
        }
    }
}

fn run_backtest(
    config_path: &PathBuf,
    csv_override: Option<&PathBuf>,
    trades_out: Option<&PathBuf>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let validated = validate_backtest_config(&adapter)
        .and_then(|_| validate_strategy_config(&adapter))
        .and_then(|_| validate_risk_config(&adapter));
    if let Err(e) = validated {
        return fail(e);
    }

    let strategy = match build_strategy_config(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let bt_config = match build_backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    let candles = match load_candles(&adapter, csv_override) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    eprintln!(
        "Running backtest: {} candles, capital {}",
        candles.len(),
        bt_config.initial_capital
    );
    let report = match backtest_engine::run_backtest(&candles, &bt_config, &strategy) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    print_backtest_summary(&report);

    if let Some(path) = trades_out {
        if let Err(e) = TradeExportAdapter::write_file(path, &report.trades) {
            return fail(e);
        }
        eprintln!("\nTrades written to: {}", path.display());
    }
    ExitCode::SUCCESS
}

pub fn print_backtest_summary(report: &BacktestReport) {
    eprintln!("\n=== Backtest Results ===");
    eprintln!("Initial Capital:  {:.2}", report.initial_capital);
    eprintln!("Final Capital:    {:.2}", report.final_capital);
    eprintln!("Total Return:     {:.2}%", report.total_return_pct);
    eprintln!("Peak Capital:     {:.2}", report.peak_capital);
    eprintln!("Max Drawdown:     -{:.2}%", report.max_drawdown_pct);
    eprintln!("Sharpe Ratio:     {:.2}", report.sharpe_ratio);
    eprintln!("Total Trades:     {}", report.statistics.total_trades);
    eprintln!("Win Rate:         {:.1}%", report.win_rate);
    eprintln!("Profit Factor:    {:.2}", report.profit_factor);
    eprintln!("Avg Holding:      {:.1} candles", report.avg_holding_candles);
    eprintln!("Fees Paid:        {:.2}", report.total_fees);

    if !report.trades.is_empty() {
        eprintln!("\n=== Trades ===");
        for t in &report.trades {
            let pnl_sign = if t.pnl >= Decimal::ZERO { "+" } else { "" };
            eprintln!(
                "  {} -> {}  {:.4} -> {:.4}  {}{:.2} ({})",
                t.entry_time.format("%Y-%m-%d %H:%M"),
                t.exit_time.format("%Y-%m-%d %H:%M"),
                t.entry_price,
                t.exit_price,
                pnl_sign,
                t.pnl,
                t.reason,
            );
        }
    }
}

async fn run_paper(config_path: &PathBuf, cycles: Option<u64>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_live_config(&adapter) {
        return fail(e);
    }

    let built = build_engine_config(&adapter).and_then(|engine| {
        Ok((
            engine,
            build_strategy_config(&adapter)?,
            build_risk_limits(&adapter)?,
            build_paper_config(&adapter)?,
        ))
    });
    let (engine_config, strategy, limits, paper) = match built {
        Ok(parts) => parts,
        Err(e) => return fail(e),
    };

    let registry = InstrumentRegistry::default();
    let venue = match PaperVenue::new(registry.clone(), paper) {
        Ok(v) => Arc::new(v),
        Err(e) => return fail(e),
    };
    let feed = match build_feed_config(&adapter)
        .and_then(|feed_config| SyntheticPriceFeed::new(venue.clone(), feed_config))
    {
        Ok(f) => Arc::new(f),
        Err(e) => return fail(e),
    };

    let period = Duration::from_secs(engine_config.cycle_interval_secs);
    let symbols = engine_config.instruments.join(", ");
    let engine = match TradingEngine::new(engine_config, strategy, limits, registry, feed, venue.clone()) {
        Ok(e) => e,
        Err(e) => return fail(e),
    };

    let mut scheduler = Scheduler::new(Arc::new(Mutex::new(engine)), period);
    if let Some(n) = cycles {
        scheduler = scheduler.with_max_cycles(n);
    }
    let scheduler = Arc::new(scheduler);

    eprintln!(
        "Paper trading {} every {}s (Ctrl-C to stop)",
        symbols,
        period.as_secs()
    );

    let stopper = scheduler.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C");
            stopper.stop();
        }
    });

    let completed = scheduler.run().await;
    signal.abort();

    let liquidation = scheduler.emergency_stop().await;

    let engine = scheduler.engine().lock().await;
    let stats = engine.statistics();
    let quote_balance = match engine.registry().quote_instrument() {
        Ok(q) => venue.balance(q.id).await,
        Err(e) => return fail(e),
    };

    eprintln!("\n=== Paper Session ===");
    eprintln!("Cycles:           {}", completed);
    eprintln!("Total Trades:     {}", stats.total_trades);
    eprintln!("Winning Trades:   {}", stats.winning_trades);
    eprintln!("Losing Trades:    {}", stats.losing_trades);
    eprintln!("Win Rate:         {:.1}%", stats.win_rate());
    eprintln!("Net PnL:          {:.2}", stats.net_pnl);
    eprintln!("Max Drawdown:     {:.2}", stats.max_drawdown);
    eprintln!("Final Balance:    {:.2}", quote_balance);

    for p in engine.ledger().closed_positions() {
        if let Some(exit) = &p.exit {
            eprintln!(
                "  {} {}  {:.4} -> {:.4}  {:.2} ({})",
                p.id, p.symbol, p.entry_price, exit.price, exit.pnl, exit.reason
            );
        }
    }

    match liquidation.failures.into_iter().next() {
        Some(e) => fail(e),
        None => ExitCode::SUCCESS,
    }
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let validated = validate_live_config(&adapter).and_then(|_| validate_backtest_config(&adapter));
    if let Err(e) = validated {
        return fail(e);
    }

    let built = build_engine_config(&adapter).and_then(|engine| {
        Ok((
            engine,
            build_strategy_config(&adapter)?,
            build_risk_limits(&adapter)?,
            build_backtest_config(&adapter)?,
            build_paper_config(&adapter)?,
        ))
    });
    let (engine, strategy, limits, backtest, paper) = match built {
        Ok(parts) => parts,
        Err(e) => return fail(e),
    };

    let registry = InstrumentRegistry::default();
    for symbol in &engine.instruments {
        if let Err(e) = registry.resolve(symbol) {
            return fail(e);
        }
    }
    eprintln!("Config validated successfully");

    eprintln!("\nEngine:");
    eprintln!("  instruments: {}", engine.instruments.join(", "));
    eprintln!("  interval:    {}s", engine.cycle_interval_secs);
    eprintln!("  window:      {}", engine.window_size);
    eprintln!("\nStrategy:");
    eprintln!("  size:        {}%", strategy.position_size_pct);
    eprintln!("  take profit: {}%", strategy.take_profit_pct);
    eprintln!("  stop loss:   {}%", strategy.stop_loss_pct);
    eprintln!("  max open:    {}", strategy.max_open_positions);
    eprintln!("  confidence:  {}", strategy.min_confidence);
    eprintln!("\nRisk:");
    eprintln!("  capital:     {}", limits.initial_capital);
    eprintln!("  drawdown:    {}%", limits.max_drawdown_pct);
    eprintln!("  daily loss:  {}%", limits.max_daily_loss_pct);
    eprintln!("  reserve:     {}", limits.min_reserve);
    eprintln!("\nBacktest:");
    eprintln!("  capital:     {}", backtest.initial_capital);
    eprintln!("  fee:         {}%", backtest.fee_pct);
    eprintln!("  slippage:    {}%", backtest.slippage_pct);
    eprintln!("\nPaper:");
    eprintln!("  balance:     {}", paper.initial_balance);

    ExitCode::SUCCESS
}
