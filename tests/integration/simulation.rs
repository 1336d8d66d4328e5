//! Full simulation harness.
//!
//! Generates games from a seed hash and replays them through the
//! martingale strategy on the simulated engine.

use std::sync::Arc;

use crashsim::backtest::games::generate_games;
use crashsim::backtest::optimizer::{run_optimizer, SearchParam, TOP_RESULTS};
use crashsim::backtest::runner::Simulator;
use crashsim::backtest::statistics::Statistics;
use crashsim::backtest::sweep::{run_sweep, ParamRange};
use crashsim::config::{AppConfig, OptimizerConfig};
use crashsim::strategy::martingale::Martingale;
use crashsim::types::GameResult;

const CONFIG: &str = r#"
[simulation]
initial_balance = 1000000
seed_hash = "86d5c4a0f3b2e1d0c9b8a7f6e5d4c3b2a1f0e9d8c7b6a5f4e3d2c1b0a9f8e7d6"
num_games = 1000
capture_logs = true

[strategy.baseBet]
type = "balance"
label = "Base Bet"
value = 100

[strategy.payout]
type = "multiplier"
label = "Payout"
value = 2

[strategy.waitNum]
type = "number"
label = "Wait Skips"
value = 3
"#;

#[test]
fn test_simulation_from_config() {
    let cfg = AppConfig::parse(CONFIG).unwrap();
    let strategy_config = cfg.strategy_config().unwrap();
    let simulator = Simulator::new(cfg.simulation.clone());
    let games = simulator.generate().unwrap();

    let mut strategy = Martingale::new(strategy_config);
    let report = simulator.run(&mut strategy, &games).unwrap();
    let stats = &report.statistics;

    assert!(report.games > 0 && report.games <= 1000);
    assert_eq!(stats.games_total, report.games as u64);
    assert_eq!(stats.games_played + stats.games_skipped, stats.games_total);
    assert_eq!(stats.games_won + stats.games_lost, stats.games_played);
    assert_eq!(stats.balance, report.final_balance);
    assert_eq!(report.user.bets, stats.games_played);
    assert_eq!(report.user.wagered, stats.total_wagered);
    assert_eq!(report.user.profit, stats.profit);
    assert!(stats.lowest_bet.unwrap_or(100) >= 100);
    assert!(report.logs[0].starts_with("LOG: baseBet"));
}

#[test]
fn test_every_bet_is_a_rounded_multiple() {
    let cfg = AppConfig::parse(CONFIG).unwrap();
    let simulator = Simulator::new(cfg.simulation.clone());
    let games = simulator.generate().unwrap();

    let mut strategy = Martingale::new(cfg.strategy_config().unwrap());
    let report = simulator.run(&mut strategy, &games).unwrap();

    if let Some(high) = report.statistics.highest_bet {
        assert_eq!(high % 100, 0);
    }
    if let Some(low) = report.statistics.lowest_bet {
        assert_eq!(low % 100, 0);
    }
}

#[test]
fn test_report_serialises() {
    let cfg = AppConfig::parse(CONFIG).unwrap();
    let simulator = Simulator::new(cfg.simulation.clone());
    let games = generate_games(&cfg.simulation.seed_hash, 50).unwrap();

    let mut strategy = Martingale::new(cfg.strategy_config().unwrap());
    let report = simulator.run(&mut strategy, &games).unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["strategy"], "martingale");
    assert_eq!(json["games"], 50);
    assert!(json["statistics"]["profit"].is_i64());
}

#[test]
fn test_averaged_runs() {
    let cfg = AppConfig::parse(CONFIG).unwrap();
    let simulator = Simulator::new(cfg.simulation.clone());
    let games = generate_games(&cfg.simulation.seed_hash, 300).unwrap();

    let runs: Vec<Statistics> = games
        .chunks(100)
        .map(|chunk| {
            let mut strategy = Martingale::new(cfg.strategy_config().unwrap());
            simulator.run(&mut strategy, chunk).unwrap().statistics
        })
        .collect();

    let avg = Statistics::average(&runs);
    let total = avg.iter().find(|(name, _)| *name == "games_total").unwrap().1;
    assert!(total > 0.0 && total <= 100.0);
    assert_eq!(runs.len(), 3);
}

#[tokio::test]
async fn test_sweep_over_payouts() {
    let cfg = AppConfig::parse(CONFIG).unwrap();
    let games: Arc<[GameResult]> = generate_games(&cfg.simulation.seed_hash, 200)
        .unwrap()
        .into();
    let ranges: Vec<ParamRange> = vec!["payout:1.5,2.5,0.5".parse().unwrap()];

    let report = run_sweep(&cfg.simulation, &cfg.strategy_config().unwrap(), &ranges, games)
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 3);
    assert!(report.skipped.is_empty());
    let best = report.best().unwrap();
    assert!(report.outcomes.iter().all(|o| best.metric <= o.metric));
}

#[tokio::test]
async fn test_optimizer_from_config() {
    let text = format!("{CONFIG}\n[optimizer]\npopulation_size = 6\ngenerations = 3\nelite_size = 2\ntournament_size = 3\nrng_seed = 42\n");
    let cfg = AppConfig::parse(&text).unwrap();
    assert_eq!(cfg.optimizer.population_size, 6);
    assert_eq!(cfg.optimizer.max_mutation_rate, OptimizerConfig::default().max_mutation_rate);

    let games: Arc<[GameResult]> = generate_games(&cfg.simulation.seed_hash, 200)
        .unwrap()
        .into();
    let params: Vec<SearchParam> = vec![
        "payout:payout:1.5,5".parse().unwrap(),
        "waitNum:integer:0,5".parse().unwrap(),
    ];

    let report = run_optimizer(
        &cfg.simulation,
        &cfg.strategy_config().unwrap(),
        params,
        &cfg.optimizer,
        games,
    )
    .await
    .unwrap();

    assert_eq!(report.generations.len(), 3);
    assert!(report.top.len() <= TOP_RESULTS);
    assert!(report.simulations <= 6 * 4);
    assert_eq!(report.best_params.len(), 2);
    let payout = report.best_params[0].1;
    assert!((1.5..=5.0).contains(&payout));
}
