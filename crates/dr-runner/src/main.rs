//! # dr-runner
//!
//! Command-line entry point for the directional futures bot.
//!
//! Loads a JSON configuration file once and passes it to each component.
//!
//! # Usage
//!
//! ```bash
//! dr-runner --config config.json run
//! dr-runner --config config.json signal
//! dr-runner --config config.json train --output model.json --epochs 2500 --simulation sim.json
//! dr-runner --config config.json positions
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dr_core::config::AppConfig;
use dr_core::time_util::now_ms;
use dr_core::{BotError, SignalRecord, close_prices, parse_klines};
use dr_engine::{EngineSettings, JsonlSink, LogSink, TradingEngine};
use dr_model::{SignalModel, TrainParams, Trainer, simulate};
use dr_td::RetryExecutor;
use dr_td::binance::{FuturesClient, FuturesClientConfig};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Directional futures trading bot.
#[derive(Parser)]
#[command(name = "dr-runner", about = "Directional futures trading bot")]
struct Cli {
    /// Configuration file path (JSON).
    #[arg(short, long, global = true, default_value = "config.json")]
    config: PathBuf,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Log directory override for file output.
    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the live trading loop until Ctrl+C.
    Run,
    /// Compute and print the current signal without trading.
    Signal,
    /// Train a model on historical closes and write the model file.
    Train(TrainArgs),
    /// Print open positions and the margin balance.
    Positions,
}

#[derive(Args)]
struct TrainArgs {
    /// Where to write the trained model.
    #[arg(long)]
    output: PathBuf,

    /// JSON file with close prices or raw klines; fetched from the exchange when omitted.
    #[arg(long)]
    closes: Option<PathBuf>,

    /// Training differences.
    #[arg(long, default_value_t = 1000)]
    n: usize,

    /// Held-out differences.
    #[arg(long, default_value_t = 200)]
    p: usize,

    /// Lookback window.
    #[arg(long, default_value_t = 15)]
    m: usize,

    #[arg(long, default_value_t = 2500)]
    epochs: usize,

    #[arg(long, default_value_t = 0.001)]
    commission: f64,

    #[arg(long, default_value_t = 0.3)]
    learning_rate: f64,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Dataset label stored in the model file.
    #[arg(long)]
    name: Option<String>,

    /// Write the held-out backtest ledger to this JSON file.
    #[arg(long)]
    simulation: Option<PathBuf>,

    /// Quote funds the held-out backtest starts with.
    #[arg(long, default_value_t = 1000.0)]
    start_funds: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config = dr_core::config::load_config(&cli.config)?;

    // 2. Initialize logging
    let log_level = cli.log_level.as_deref().unwrap_or(&config.bot.log_level);
    let log_dir = cli.log_dir.as_deref().or(config.bot.log_path.as_deref());
    dr_core::logging::init_logging(log_level, log_dir, &config.bot.module_name);

    info!("dr-runner starting, config={}", cli.config.display());
    config.log_summary();

    let result = match cli.command {
        Command::Run => run(&config).await,
        Command::Signal => signal(&config).await,
        Command::Train(args) => train(&config, args).await,
        Command::Positions => positions(&config).await,
    };
    if let Err(e) = &result {
        error!("dr-runner failed: {e:#}");
    }
    result
}

async fn run(config: &AppConfig) -> Result<()> {
    if config.trading.execute_trades && (config.exchange.api_key.is_empty() || config.exchange.secret_key.is_empty()) {
        return Err(BotError::Config("api_key and secret_key are required when execute_trades is enabled".into()).into());
    }

    let model = SignalModel::from_file(&config.model.path)?;
    info!("loaded model: {}", config.model.model_id());

    let client = FuturesClient::new(FuturesClientConfig::from_app(config));
    client.ping().await.context("exchange unreachable")?;

    let retry = RetryExecutor::from_config(&config.retry);
    let settings = EngineSettings::from_config(config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    match &config.signal_log.path {
        Some(path) => {
            let sink = JsonlSink::new(path);
            info!("recording signals to {}", sink.path().display());
            TradingEngine::new(client, model, sink, retry, settings).run(shutdown_rx).await?;
        }
        None => {
            TradingEngine::new(client, model, LogSink, retry, settings).run(shutdown_rx).await?;
        }
    }

    info!("trading loop stopped, goodbye");
    Ok(())
}

async fn signal(config: &AppConfig) -> Result<()> {
    let model = SignalModel::from_file(&config.model.path)?;
    let client = FuturesClient::new(FuturesClientConfig::from_app(config));

    let pair = config.trading.symbol.pair();
    let candles =
        client.get_candles(&pair, config.trading.interval.as_str(), config.trading.candle_limit, None, None).await?;
    let closes = close_prices(&candles);
    let (side, ft) = model.get_signal(&closes)?;

    let price = closes.last().copied().unwrap_or_default();
    let record = SignalRecord::new(config.model.model_id(), now_ms(), side, ft, price);
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

async fn train(config: &AppConfig, args: TrainArgs) -> Result<()> {
    let pair = config.trading.symbol.pair();
    let interval = config.trading.interval;

    let closes = match &args.closes {
        Some(path) => read_closes(path)?,
        None => {
            // One extra difference plus the still-open candle.
            let limit = u32::try_from(args.n + args.p + 2).context("training window too large")?;
            let client = FuturesClient::new(FuturesClientConfig::from_app(config));
            let mut candles = client.get_candles(&pair, interval.as_str(), limit, None, None).await?;
            candles.pop();
            close_prices(&candles)
        }
    };
    info!("training on {} closes", closes.len());
    let held_out = closes[closes.len().saturating_sub(args.p)..].to_vec();

    let params = TrainParams {
        n: args.n,
        p: args.p,
        m: args.m,
        epochs: args.epochs,
        commission: args.commission,
        learning_rate: args.learning_rate,
        seed: args.seed,
        dataset_name: Some(args.name.unwrap_or_else(|| format!("{pair}-{interval}"))),
    };
    let trainer = Trainer::new(params);
    let state = tokio::task::spawn_blocking(move || trainer.train(&closes)).await.context("training task panicked")??;

    state.save(&args.output)?;
    info!("model written to {}", args.output.display());

    match simulate(&held_out, &state, args.commission, args.start_funds) {
        Ok(report) => {
            info!(
                "held-out backtest: model total={:.2}, buy/hold total={:.2}",
                report.model_total, report.buy_hold_total
            );
            if let Some(path) = &args.simulation {
                let json = serde_json::to_string_pretty(&report)?;
                std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
                info!("backtest ledger written to {}", path.display());
            }
        }
        Err(e) => warn!("held-out backtest skipped: {e:#}"),
    }
    Ok(())
}

/// Close prices from a JSON array of numbers or of raw kline rows.
fn read_closes(path: &Path) -> Result<Vec<f64>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))?;
    if let Ok(closes) = serde_json::from_value::<Vec<f64>>(value.clone()) {
        return Ok(closes);
    }
    Ok(close_prices(&parse_klines(&value)?))
}

async fn positions(config: &AppConfig) -> Result<()> {
    let client = FuturesClient::new(FuturesClientConfig::from_app(config));

    let open = client.get_open_positions().await?;
    if open.is_empty() {
        println!("no open positions");
    }
    for p in &open {
        println!(
            "{:<12} {:<6} amount={} entry={} upnl={}",
            p.symbol,
            p.side(),
            p.amount(),
            p.entry_price,
            p.unrealized_pnl
        );
    }
    println!("margin balance: {}", client.margin_balance().await?);
    Ok(())
}
