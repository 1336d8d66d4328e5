//! CRASHSIM: martingale crash-game strategy and offline simulator
//!
//! Entry point. Loads configuration, initialises structured logging and
//! runs a simulation, a grid sweep or a genetic parameter search. Logs go
//! to stderr so `--json` output on stdout stays machine-readable.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{Table, Tabled};
use tracing::info;

use crashsim::backtest::games::generate_games;
use crashsim::backtest::optimizer::{run_optimizer, OptimizeReport, SearchParam};
use crashsim::backtest::runner::Simulator;
use crashsim::backtest::statistics::Statistics;
use crashsim::backtest::sweep::{run_sweep, ParamRange, SweepReport};
use crashsim::config::AppConfig;
use crashsim::strategy::martingale::Martingale;
use crashsim::types::GameResult;

const BANNER: &str = r#"
  ___ ___    _   ___ _  _ ___ ___ __  __
 / __| _ \  /_\ / __| || / __|_ _|  \/  |
| (__|   / / _ \\__ \ __ \__ \| || |\/| |
 \___|_|_\/_/ \_\___/_||_|___/___|_|  |_|

  Martingale crash-game simulator v0.1.0
"#;

/// Crashsim - simulate a martingale crash-game strategy.
#[derive(Parser, Debug)]
#[command(name = "crashsim")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Skip ASCII art banner
    #[arg(long, global = true)]
    no_banner: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the strategy over generated games
    Simulate(SimulateArgs),

    /// Run the strategy over a grid of parameter values
    Sweep(SweepArgs),

    /// Search parameter values with a genetic algorithm
    Optimize(OptimizeArgs),
}

impl Cli {
    fn json(&self) -> bool {
        match &self.command {
            Commands::Simulate(args) => args.json,
            Commands::Sweep(args) => args.json,
            Commands::Optimize(args) => args.json,
        }
    }

    fn show_banner(&self) -> bool {
        !self.no_banner && !self.json()
    }
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    /// Override number of games per run
    #[arg(long)]
    games: Option<usize>,

    /// Override seed hash
    #[arg(long)]
    seed: Option<String>,

    /// Number of consecutive runs over the hash chain (statistics are averaged)
    #[arg(long, default_value_t = 1)]
    runs: usize,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct SweepArgs {
    /// Parameter range as key:min,max,step (repeatable)
    #[arg(short, long = "param", required = true)]
    params: Vec<ParamRange>,

    /// Override number of games
    #[arg(long)]
    games: Option<usize>,

    /// Override seed hash
    #[arg(long)]
    seed: Option<String>,

    /// Show only the best N combinations
    #[arg(long, default_value_t = 10)]
    top: usize,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct OptimizeArgs {
    /// Search space as key:kind:values, kind one of continuous, integer,
    /// payout or choice (repeatable)
    #[arg(short, long = "param", required = true)]
    params: Vec<SearchParam>,

    /// Override number of games
    #[arg(long)]
    games: Option<usize>,

    /// Override seed hash
    #[arg(long)]
    seed: Option<String>,

    /// Override population size
    #[arg(long)]
    population: Option<usize>,

    /// Override number of generations
    #[arg(long)]
    generations: Option<usize>,

    /// Seed the search RNG for a reproducible run
    #[arg(long)]
    rng_seed: Option<u64>,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Tabled)]
struct StatRow {
    #[tabled(rename = "Statistic")]
    name: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct SweepRow {
    #[tabled(rename = "Rank")]
    rank: usize,
    #[tabled(rename = "Parameters")]
    params: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Profit")]
    profit: i64,
    #[tabled(rename = "Balance")]
    balance: i64,
    #[tabled(rename = "Games")]
    games: usize,
}

#[derive(Tabled)]
struct RankRow {
    #[tabled(rename = "Rank")]
    rank: usize,
    #[tabled(rename = "Parameters")]
    params: String,
    #[tabled(rename = "Metric")]
    metric: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cli = Cli::parse();
    init_logging();

    if cli.show_banner() {
        println!("{BANNER}");
    }

    let cfg = AppConfig::load(&cli.config)?;
    let strategy_config = cfg.strategy_config()?;
    info!(
        config = %cli.config.display(),
        strategy = %strategy_config,
        balance = cfg.simulation.initial_balance,
        "Configuration loaded"
    );

    match cli.command {
        Commands::Simulate(args) => simulate(cfg, args),
        Commands::Sweep(args) => sweep(cfg, args).await,
        Commands::Optimize(args) => optimize(cfg, args).await,
    }
}

fn simulate(mut cfg: AppConfig, args: SimulateArgs) -> Result<()> {
    if let Some(games) = args.games {
        cfg.simulation.num_games = games;
    }
    if let Some(seed) = args.seed {
        cfg.simulation.seed_hash = seed;
    }
    let strategy_config = cfg.strategy_config()?;
    let runs = args.runs.max(1);
    let per_run = cfg.simulation.num_games;

    let games = generate_games(&cfg.simulation.seed_hash, per_run * runs)
        .context("Failed to generate games")?;
    let simulator = Simulator::new(cfg.simulation);

    let mut reports = Vec::with_capacity(runs);
    for chunk in games.chunks(per_run.max(1)) {
        let mut strategy = Martingale::new(strategy_config.clone());
        reports.push(simulator.run(&mut strategy, chunk)?);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    let rows: Vec<(&'static str, f64)> = if reports.len() == 1 {
        reports[0].statistics.rows()
    } else {
        let stats: Vec<Statistics> = reports.iter().map(|r| r.statistics.clone()).collect();
        Statistics::average(&stats)
    };
    print_table(
        rows.into_iter()
            .map(|(name, value)| StatRow {
                name,
                value: format_value(value),
            })
            .collect::<Vec<_>>(),
    );

    for report in &reports {
        if let Some(reason) = &report.stop_reason {
            println!("  run {} stopped after {} games: {reason}", report.run_id, report.games);
        }
        for line in &report.logs {
            println!("  {line}");
        }
    }

    Ok(())
}

async fn sweep(mut cfg: AppConfig, args: SweepArgs) -> Result<()> {
    if let Some(games) = args.games {
        cfg.simulation.num_games = games;
    }
    if let Some(seed) = args.seed {
        cfg.simulation.seed_hash = seed;
    }
    let base = cfg.strategy_config()?;

    let games: Arc<[GameResult]> = generate_games(&cfg.simulation.seed_hash, cfg.simulation.num_games)
        .context("Failed to generate games")?
        .into();

    let report = run_sweep(&cfg.simulation, &base, &args.params, games).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_sweep(&report, args.top);
    Ok(())
}

async fn optimize(mut cfg: AppConfig, args: OptimizeArgs) -> Result<()> {
    if let Some(games) = args.games {
        cfg.simulation.num_games = games;
    }
    if let Some(seed) = args.seed {
        cfg.simulation.seed_hash = seed;
    }
    if let Some(population) = args.population {
        cfg.optimizer.population_size = population;
    }
    if let Some(generations) = args.generations {
        cfg.optimizer.generations = generations;
    }
    if args.rng_seed.is_some() {
        cfg.optimizer.rng_seed = args.rng_seed;
    }
    let base = cfg.strategy_config()?;

    let games: Arc<[GameResult]> = generate_games(&cfg.simulation.seed_hash, cfg.simulation.num_games)
        .context("Failed to generate games")?
        .into();

    let report = run_optimizer(&cfg.simulation, &base, args.params, &cfg.optimizer, games).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_optimize(&report);
    Ok(())
}

fn format_params(params: &[(String, f64)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={}", format_value(*v)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_optimize(report: &OptimizeReport) {
    let rows: Vec<RankRow> = report
        .top
        .iter()
        .map(|r| RankRow {
            rank: r.rank,
            params: format_params(&r.params),
            metric: format!("{:.6}", r.metric),
        })
        .collect();
    print_table(rows);

    println!(
        "  best: {} (metric {:.6}, {} simulations over {} generations)",
        format_params(&report.best_params),
        report.best_metric,
        report.simulations,
        report.generations.len()
    );
}

fn print_sweep(report: &SweepReport, top: usize) {
    let rows: Vec<SweepRow> = report
        .outcomes
        .iter()
        .take(top)
        .enumerate()
        .map(|(i, o)| SweepRow {
            rank: i + 1,
            params: format_params(&o.params),
            metric: format!("{:.6}", o.metric),
            profit: o.profit,
            balance: o.final_balance,
            games: o.games,
        })
        .collect();
    print_table(rows);

    for skipped in &report.skipped {
        println!("  skipped {:?}: {}", skipped.params, skipped.reason);
    }
}

fn print_table<T: Tabled>(rows: Vec<T>) {
    let table = Table::new(rows).to_string();
    for line in table.lines() {
        println!("  {}", line);
    }
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

/// Initialise the `tracing` subscriber on stderr.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("crashsim=info"));

    let json_logging = std::env::var("CRASHSIM_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
