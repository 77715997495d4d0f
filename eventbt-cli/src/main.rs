//! eventbt CLI: run backtests and parameter sweeps.
//!
//! Commands:
//! - `run`: execute a backtest from a TOML config file or named preset
//! - `sweep`: run a strategy's parameter grid over one price table

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use eventbt_core::strategy::ForecastParams;
use eventbt_runner::{
    load_series, run_single_backtest, save_artifacts, BacktestResult, DataConfig, ParamGrid,
    ParamSweep, Preset, RunConfig, SyntheticConfig,
};

#[derive(Parser)]
#[command(name = "eventbt", about = "eventbt: bar-by-bar strategy backtester")]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Log level used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file or named preset.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Named preset: ma_crossover, rolling_forecast.
        #[arg(long)]
        preset: Option<String>,

        #[command(flatten)]
        data: DataArgs,

        /// Starting balance (overrides the config file).
        #[arg(long)]
        initial_balance: Option<f64>,

        /// Output directory for result artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Print the summary without writing artifacts.
        #[arg(long, default_value_t = false)]
        no_save: bool,
    },
    /// Run every point of a preset's parameter grid over one price table.
    Sweep {
        /// Named preset: ma_crossover, rolling_forecast.
        #[arg(long)]
        preset: String,

        #[command(flatten)]
        data: DataArgs,

        /// Starting balance for every run.
        #[arg(long, default_value_t = 10_000.0)]
        initial_balance: f64,

        /// Run grid points one at a time.
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
}

#[derive(clap::Args)]
struct DataArgs {
    /// Price table CSV (timestamp, open, high, low, close, volume).
    #[arg(long)]
    data: Option<PathBuf>,

    /// Use a seeded synthetic random walk instead of a CSV.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Bars to generate with --synthetic.
    #[arg(long, default_value_t = 504)]
    bars: usize,

    /// Seed for --synthetic.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

impl DataArgs {
    fn to_config(&self) -> Result<DataConfig> {
        match (&self.data, self.synthetic) {
            (Some(_), true) => bail!("--data and --synthetic are mutually exclusive"),
            (Some(path), false) => Ok(DataConfig::Csv { path: path.clone() }),
            (None, true) => Ok(DataConfig::Synthetic(SyntheticConfig {
                bars: self.bars,
                seed: self.seed,
                ..SyntheticConfig::default()
            })),
            (None, false) => bail!("one of --data or --synthetic is required"),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs);

    match cli.command {
        Commands::Run {
            config,
            preset,
            data,
            initial_balance,
            output_dir,
            no_save,
        } => run_backtest_cmd(
            config,
            preset,
            &data,
            initial_balance,
            (!no_save).then_some(output_dir.as_path()),
        ),
        Commands::Sweep {
            preset,
            data,
            initial_balance,
            sequential,
        } => run_sweep_cmd(&preset, &data, initial_balance, sequential),
    }
}

/// Logs go to stderr so stdout stays clean for the summary.
fn init_logging(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr);
        let _ = subscriber.with(fmt_layer).try_init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr);
        let _ = subscriber.with(fmt_layer).try_init();
    }
}

fn parse_preset(name: &str) -> Result<Preset> {
    match name {
        "ma_crossover" => Ok(Preset::MaCrossover),
        "rolling_forecast" => Ok(Preset::RollingForecast),
        _ => bail!("unknown preset '{name}'. Valid: ma_crossover, rolling_forecast"),
    }
}

fn run_backtest_cmd(
    config_path: Option<PathBuf>,
    preset_name: Option<String>,
    data: &DataArgs,
    initial_balance: Option<f64>,
    output_dir: Option<&Path>,
) -> Result<()> {
    let mut config = match (config_path, preset_name) {
        (Some(_), Some(_)) => bail!("--config and --preset are mutually exclusive"),
        (None, None) => bail!("one of --config or --preset is required"),
        (Some(path), None) => {
            let mut config = RunConfig::from_file(&path)
                .with_context(|| format!("loading config {}", path.display()))?;
            if data.data.is_some() || data.synthetic {
                config.data = data.to_config()?;
            }
            config
        }
        (None, Some(name)) => RunConfig::preset(parse_preset(&name)?, data.to_config()?),
    };
    if let Some(balance) = initial_balance {
        config.engine.initial_balance = balance;
    }

    let result = run_single_backtest(&config).context("backtest failed")?;
    print_summary(&result);

    if let Some(dir) = output_dir {
        let run_dir = save_artifacts(&result, dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn run_sweep_cmd(
    preset_name: &str,
    data: &DataArgs,
    initial_balance: f64,
    sequential: bool,
) -> Result<()> {
    let preset = parse_preset(preset_name)?;
    let mut base = RunConfig::preset(preset, data.to_config()?);
    base.engine.initial_balance = initial_balance;
    base.validate()?;

    let grid = match preset {
        Preset::MaCrossover => ParamGrid::ma_crossover_default(),
        Preset::RollingForecast => ParamGrid::RollingForecast {
            base: ForecastParams::default(),
            windows: vec![60, 120, 200],
            thresholds: vec![0.0, 0.0005, 0.001],
        },
    };

    let loaded = load_series(&base.data).context("loading price table")?;
    let results = ParamSweep::new()
        .with_parallelism(!sequential)
        .sweep(&grid, &base, &loaded)
        .context("sweep failed")?;

    println!(
        "{:<40} {:>8} {:>14} {:>12}",
        "Strategy", "Trades", "Final", "Net PnL"
    );
    println!("{}", "-".repeat(77));
    for result in results.all() {
        println!(
            "{:<40} {:>8} {:>14.2} {:>12.2}",
            format!("{} {}", result.report.strategy, grid_label(&result.config)),
            result.report.summary.total_trades,
            result.final_balance(),
            result.net_pnl()
        );
    }
    if let Some(best) = results.best_by_final_balance() {
        println!();
        println!(
            "Best: {} {} (final balance {:.2})",
            best.report.strategy,
            grid_label(&best.config),
            best.final_balance()
        );
    }
    Ok(())
}

fn grid_label(config: &RunConfig) -> String {
    use eventbt_runner::StrategyConfig;
    match &config.strategy {
        StrategyConfig::MaCrossover(p) => format!("{}/{}", p.short_window, p.long_window),
        StrategyConfig::RollingForecast(p) => format!("w={} t={}", p.window, p.long_threshold),
    }
}

fn print_summary(result: &BacktestResult) {
    let report = &result.report;
    let summary = &report.summary;

    println!("=== Backtest Result ===");
    println!("Strategy:       {}", report.strategy);
    println!("Run ID:         {}", result.run_id);
    println!("Dataset hash:   {}", result.dataset_hash);
    if result.synthetic {
        println!("WARNING: synthetic data");
    }
    println!("Bars:           {}", report.bar_count);
    if report.decisions.insufficient_data {
        println!("WARNING: series too short for any decision");
    }
    println!(
        "Decisions:      {} evaluated, {} skipped",
        report.decisions.evaluated, report.decisions.skipped
    );
    println!();
    println!("--- Balance ---");
    println!("Initial:        {:.2}", report.initial_balance);
    println!("Final:          {:.2}", report.final_balance);
    println!("Net PnL:        {:.2}", result.net_pnl());
    println!();
    println!("--- Trades ---");
    println!(
        "Total:          {} ({} long, {} short)",
        summary.total_trades, summary.long_trades, summary.short_trades
    );
    println!("Winning:        {}", summary.winning_trades);
    println!("Forced exits:   {}", report.counters.forced_exits);
    println!("Rejected:       {}", report.counters.rejected_entries);
    if let Some(avg) = summary.avg_return_pct {
        println!("Avg return:     {avg:.4}%");
    }
    if let Some(bars) = summary.avg_bars_held {
        println!("Avg bars held:  {bars:.1}");
    }
}
