//! RegimeLab CLI — train, backtest, and inspect configuration.
//!
//! Commands:
//! - `train` — fit the HMM on the train split and save a model bundle
//! - `backtest` — run the regime-gated backtest with a saved bundle
//! - `run` — train then backtest in one pass
//! - `config` — print the effective configuration as TOML

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use regimelab_core::domain::{Regime, StateLabel};
use regimelab_runner::export::save_artifacts;
use regimelab_runner::{
    load_csv, run_backtest, train_model, BacktestResult, ModelBundle, PipelineConfig,
};

/// Trades shown in the backtest report.
const SAMPLE_TRADES: usize = 15;

/// Width of the label column in the activity block.
const LABEL_WIDTH: usize = 17;

#[derive(Parser)]
#[command(
    name = "regimelab",
    about = "RegimeLab CLI — HMM regime detection and regime-gated backtesting"
)]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the HMM on the training split and save the model bundle.
    Train {
        /// Input CSV (overrides `[data].csv_path`).
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Where to write the bundle (overrides `[output].model_path`).
        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// Backtest a saved model bundle on the test split.
    Backtest {
        /// Input CSV (overrides `[data].csv_path`).
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Model bundle to load (overrides `[output].model_path`).
        #[arg(long)]
        model: Option<PathBuf>,

        /// Results directory (overrides `[output].results_dir`).
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Train and backtest in one pass.
    Run {
        /// Input CSV (overrides `[data].csv_path`).
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Results directory (overrides `[output].results_dir`).
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Print the effective configuration as TOML.
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Train { csv, model } => {
            apply_overrides(&mut config, csv, model, None);
            run_train(&config).map(|_| ())
        }
        Commands::Backtest {
            csv,
            model,
            output_dir,
        } => {
            apply_overrides(&mut config, csv, model, output_dir);
            run_backtest_cmd(&config, None)
        }
        Commands::Run { csv, output_dir } => {
            apply_overrides(&mut config, csv, None, output_dir);
            let bundle = run_train(&config)?;
            run_backtest_cmd(&config, Some(bundle))
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(p) => {
            info!(path = %p.display(), "loading config");
            PipelineConfig::from_file(p)
                .with_context(|| format!("failed to load config {}", p.display()))
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn apply_overrides(
    config: &mut PipelineConfig,
    csv: Option<PathBuf>,
    model: Option<PathBuf>,
    output_dir: Option<PathBuf>,
) {
    if let Some(p) = csv {
        config.data.csv_path = p;
    }
    if let Some(p) = model {
        config.output.model_path = p;
    }
    if let Some(p) = output_dir {
        config.output.results_dir = p;
    }
}

fn run_train(config: &PipelineConfig) -> Result<ModelBundle> {
    config.validate()?;
    let series = load_csv(&config.data.csv_path)
        .with_context(|| format!("failed to load {}", config.data.csv_path.display()))?;
    let bundle = train_model(&series.bars, config, &series.dataset_hash)?;
    bundle
        .save(&config.output.model_path)
        .with_context(|| format!("failed to save {}", config.output.model_path.display()))?;

    print_state_analysis(&bundle);
    println!();
    println!("Model saved to: {}", config.output.model_path.display());
    Ok(bundle)
}

fn run_backtest_cmd(config: &PipelineConfig, trained: Option<ModelBundle>) -> Result<()> {
    config.validate()?;
    let bundle = match trained {
        Some(b) => b,
        None => ModelBundle::load(&config.output.model_path).with_context(|| {
            format!(
                "failed to load model bundle {} (run `regimelab train` first)",
                config.output.model_path.display()
            )
        })?,
    };
    let series = load_csv(&config.data.csv_path)
        .with_context(|| format!("failed to load {}", config.data.csv_path.display()))?;
    let result = run_backtest(&series.bars, &bundle, config, &series.dataset_hash)?;

    print_report(&result);

    let out = save_artifacts(&result, config, &config.output.results_dir)?;
    println!();
    println!("Artifacts saved to: {}", out.display());
    Ok(())
}

fn print_state_analysis(bundle: &ModelBundle) {
    let model = &bundle.model;
    let t = &bundle.training;
    println!();
    println!("=== State Analysis ===");
    println!("Ticker:         {}", t.ticker);
    println!("Training:       {} to {}", t.train_start, t.train_end);
    println!("Observations:   {}", t.n_observations);
    println!(
        "EM:             {} iterations, converged={}, log-likelihood={:.3}",
        bundle.fit.iterations, bundle.fit.converged, bundle.fit.log_likelihood
    );

    for (state, (mean, emission)) in model.means().iter().zip(model.emissions()).enumerate() {
        let label = bundle
            .labeling
            .label(state)
            .map(|l| l.to_string())
            .unwrap_or_default();
        println!();
        println!("State {state} ({label}):");
        println!("  Mean Return:  {:+.4}% daily", mean[0] * 100.0);
        println!("  Mean Energy:  {:.6}", mean[1]);
        let c = emission.covariance();
        println!(
            "  Covariance (normalized): [[{:.4}, {:.4}], [{:.4}, {:.4}]]",
            c[0][0], c[0][1], c[1][0], c[1][1]
        );
    }

    println!();
    println!("Transition Matrix:");
    for row in model.transition().rows() {
        let cells: Vec<String> = row.iter().map(|p| format!("{p:.4}")).collect();
        println!("  [{}]", cells.join(", "));
    }

    let total: usize = bundle.state_distribution.values().sum();
    println!();
    println!("Training State Distribution:");
    for (state, count) in &bundle.state_distribution {
        let pct = if total > 0 {
            *count as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        println!("  State {state}: {count} days ({pct:.1}%)");
    }
}

fn print_report(result: &BacktestResult) {
    let m = &result.metrics;
    println!();
    println!("=== Backtest Report (Regime-Aware Risk Gate) ===");
    println!("Ticker:         {}", result.ticker);
    println!("Period:         {} to {}", result.start_date, result.end_date);
    println!(
        "Trading Days:   {} ({} skipped)",
        m.trading_days, result.skipped_days
    );
    println!();
    println!("--- Performance ---");
    println!("Initial Capital: ${:.2}", m.initial_capital);
    println!("Final Value:     ${:.2}", m.final_value);
    println!("Strategy Return: {:+.2}%", m.total_return * 100.0);
    println!("Buy & Hold:      {:+.2}%", m.buy_hold_return * 100.0);
    println!("Excess Return:   {:+.2}%", m.excess_return * 100.0);
    let equity = result.equity_curve();
    if !equity.is_empty() {
        let peak = equity.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let low = equity.iter().copied().fold(f64::INFINITY, f64::min);
        println!("Peak Value:      ${peak:.2}");
        println!("Lowest Value:    ${low:.2}");
    }
    println!();
    println!("--- Risk ---");
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!();
    println!("--- Trading Activity ---");
    println!("{}", field("Buy Orders", m.num_buys));
    println!("{}", field("Sell Orders", m.num_sells));
    println!("{}", field("Holds", m.num_holds));
    println!("{}", field("Executed", m.orders_executed));
    println!("{}", field("Blocked", m.orders_blocked));
    println!("{}", field("Stop-Loss Exits", m.stop_loss_exits));
    println!(
        "{}",
        field("Time Invested", format!("{:.1}%", m.time_invested * 100.0))
    );
    println!();
    println!("--- Regime Distribution ---");
    for (regime, share) in &m.regime_distribution {
        println!("  {regime}: {:.1}%", share * 100.0);
    }
    println!("--- State Distribution ---");
    for (state, days) in &m.state_distribution {
        println!("  State {state}: {days} days");
    }
    println!();
    println!("--- Sample Trades (first {SAMPLE_TRADES}) ---");
    for r in result.trades().take(SAMPLE_TRADES) {
        let regime = match r.regime {
            Regime::Desirable => StateLabel::Bull.to_string(),
            Regime::Undesirable => StateLabel::Bear.to_string(),
        };
        let stop = if r.stop_triggered { " [stop]" } else { "" };
        println!(
            "  {}: {:<4} @ ${:.2} | Regime={} | Value=${:.2}{}",
            r.date, r.action, r.price, regime, r.total_value, stop
        );
    }
}

/// `label:` padded to a fixed column so values line up.
fn field(label: &str, value: impl std::fmt::Display) -> String {
    format!("{:<width$}{value}", format!("{label}:"), width = LABEL_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_values_share_one_column() {
        let labels = [
            "Buy Orders",
            "Sell Orders",
            "Holds",
            "Executed",
            "Blocked",
            "Stop-Loss Exits",
            "Time Invested",
        ];
        for label in labels {
            let line = field(label, 42);
            assert_eq!(line.find("42"), Some(LABEL_WIDTH), "{line}");
            assert!(line[..LABEL_WIDTH].ends_with(' '), "{line}");
        }
        assert_eq!(field("Stop-Loss Exits", 3), "Stop-Loss Exits: 3");
    }
}
